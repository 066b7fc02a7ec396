use crate::analyzer::divergence::{DivergenceDetector, DivergenceMode};
use crate::config_loader::{ConfigError, ConfigFormat, ConfigLoader, ConfigResult, ConfigValidation};
use crate::model::{MarketType, Timeframe};
use crate::monitor::schedule::parse_hour;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// 24시간 가격 변동률 조건 (%)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceChangeCondition {
    /// 이 값 이하이면 하락 알림
    #[serde(default)]
    pub min: Option<f64>,
    /// 이 값 이상이면 상승 알림
    #[serde(default)]
    pub max: Option<f64>,
}

/// 사이클 간 거래량 변화 조건
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeChangeCondition {
    /// 이전 관측 대비 배수가 이 값 이상이면 알림
    pub min: f64,
}

/// RSI 과매수/과매도 조건
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RsiConditionsConfig {
    pub enabled: bool,
    pub timeframes: Vec<Timeframe>,
    pub periods: Vec<usize>,
    pub oversold: f64,
    pub overbought: f64,
}

impl Default for RsiConditionsConfig {
    fn default() -> Self {
        RsiConditionsConfig {
            enabled: true,
            timeframes: vec![Timeframe::Minute5, Timeframe::Minute15],
            periods: vec![7, 14, 21],
            oversold: 30.0,
            overbought: 70.0,
        }
    }
}

/// RSI 다이버전스 조건
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DivergenceConditionsConfig {
    pub enabled: bool,
    pub timeframes: Vec<Timeframe>,
    pub rsi_period: usize,
    pub left_bars: usize,
    pub right_bars: usize,
    /// 두 피벗 사이 허용 거리 [min, max]
    pub lookback_range: [usize; 2],
    pub include_hidden: bool,
    /// 피벗 모드에서 끝에서부터 이 캔들 수 이내의 피벗만 사용
    pub recent_bars_only: usize,
    /// 룩백 모드 검사 깊이
    pub lookback_periods: usize,
    pub mode: DivergenceMode,
}

impl Default for DivergenceConditionsConfig {
    fn default() -> Self {
        DivergenceConditionsConfig {
            enabled: false,
            timeframes: vec![Timeframe::Minute5, Timeframe::Minute15],
            rsi_period: 14,
            left_bars: 5,
            right_bars: 5,
            lookback_range: [5, 60],
            include_hidden: false,
            recent_bars_only: 5,
            lookback_periods: 15,
            mode: DivergenceMode::Combined,
        }
    }
}

impl DivergenceConditionsConfig {
    /// 설정값으로 다이버전스 탐지기 생성
    pub fn detector(&self) -> DivergenceDetector {
        DivergenceDetector {
            rsi_period: self.rsi_period,
            left_bars: self.left_bars,
            right_bars: self.right_bars,
            lookback_range: (self.lookback_range[0], self.lookback_range[1]),
            recent_bars_only: match self.mode {
                DivergenceMode::Pivot => Some(self.recent_bars_only),
                DivergenceMode::Combined => None,
            },
            lookback_periods: self.lookback_periods,
        }
    }
}

/// 알림 조건 묶음
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionsConfig {
    pub price_change_24h_percent: Option<PriceChangeCondition>,
    pub volume_change_24h: Option<VolumeChangeCondition>,
    pub rsi_conditions: RsiConditionsConfig,
    pub divergence_conditions: DivergenceConditionsConfig,
}

impl Default for ConditionsConfig {
    fn default() -> Self {
        ConditionsConfig {
            price_change_24h_percent: Some(PriceChangeCondition {
                min: Some(-10.0),
                max: Some(15.0),
            }),
            volume_change_24h: Some(VolumeChangeCondition { min: 1.5 }),
            rsi_conditions: RsiConditionsConfig::default(),
            divergence_conditions: DivergenceConditionsConfig::default(),
        }
    }
}

/// 알림 쿨다운 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertCooldownConfig {
    pub enabled: bool,
    pub cooldown_minutes: u32,
    /// false면 심볼 단위로 하나의 쿨다운을 공유
    pub per_condition_type: bool,
    /// `cooldown_minutes`의 몇 배가 지난 항목을 정리할지
    pub prune_after_multiplier: u32,
}

impl Default for AlertCooldownConfig {
    fn default() -> Self {
        AlertCooldownConfig {
            enabled: false,
            cooldown_minutes: 30,
            per_condition_type: true,
            prune_after_multiplier: 4,
        }
    }
}

/// 조용한 시간 구간 ("HH:MM")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuietHoursConfig {
    pub start: String,
    pub end: String,
}

impl Default for QuietHoursConfig {
    fn default() -> Self {
        QuietHoursConfig {
            start: "22:00".to_string(),
            end: "08:00".to_string(),
        }
    }
}

/// 주말 전용 조용한 시간
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeekendQuietHoursConfig {
    pub enabled: bool,
    pub start: String,
    pub end: String,
}

impl Default for WeekendQuietHoursConfig {
    fn default() -> Self {
        WeekendQuietHoursConfig {
            enabled: false,
            start: "22:00".to_string(),
            end: "08:00".to_string(),
        }
    }
}

/// 알림음 허용 시간 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationScheduleConfig {
    pub enabled: bool,
    /// IANA 시간대 이름
    pub timezone: String,
    pub quiet_hours: QuietHoursConfig,
    pub disable_weekends: bool,
    pub weekend_quiet_hours: WeekendQuietHoursConfig,
}

impl Default for NotificationScheduleConfig {
    fn default() -> Self {
        NotificationScheduleConfig {
            enabled: false,
            timezone: "Asia/Seoul".to_string(),
            quiet_hours: QuietHoursConfig::default(),
            disable_weekends: false,
            weekend_quiet_hours: WeekendQuietHoursConfig::default(),
        }
    }
}

/// 텔레그램 봇 설정
///
/// 환경 변수 `TELEGRAM_BOT_TOKEN`, `TELEGRAM_CHAT_ID`가 있으면 파일 값보다 우선합니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
}

impl TelegramConfig {
    /// 환경 변수 값으로 덮어쓰기
    pub fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var("TELEGRAM_BOT_TOKEN") {
            if !token.trim().is_empty() {
                self.bot_token = Some(token);
            }
        }
        if let Ok(chat_id) = std::env::var("TELEGRAM_CHAT_ID") {
            if !chat_id.trim().is_empty() {
                self.chat_id = Some(chat_id);
            }
        }
    }

    /// 토큰과 채팅 ID가 모두 있으면 반환
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.bot_token.as_deref(), self.chat_id.as_deref()) {
            (Some(token), Some(chat_id)) if !token.is_empty() && !chat_id.is_empty() => {
                Some((token, chat_id))
            }
            _ => None,
        }
    }
}

/// 관심 종목
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchlistEntry {
    pub symbol: String,
    /// 알림 헤더에 표시할 이름
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// 거래 대금 상위 종목 요약 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DailySummaryConfig {
    pub enabled: bool,
    /// 발송 시각 (스케줄 시간대 기준 시)
    pub hour: u32,
    pub count: usize,
}

impl Default for DailySummaryConfig {
    fn default() -> Self {
        DailySummaryConfig {
            enabled: true,
            hour: 9,
            count: 5,
        }
    }
}

/// 모니터 전체 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub market_type: MarketType,
    /// 거래 대금 상위 몇 개 종목을 볼지 (0이면 관심 종목만)
    pub top_volume_limit: usize,
    pub max_alerts_per_cycle: usize,
    pub check_interval_minutes: u32,
    pub conditions: ConditionsConfig,
    pub alert_cooldown: AlertCooldownConfig,
    pub notification_schedule: NotificationScheduleConfig,
    pub telegram: TelegramConfig,
    pub watchlist: Vec<WatchlistEntry>,
    pub daily_summary: DailySummaryConfig,
    /// 알림 메시지 사이 간격 (밀리초)
    pub send_interval_ms: u64,
    /// 사이클 실패 후 대기 시간 (초)
    pub error_backoff_seconds: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            market_type: MarketType::Futures,
            top_volume_limit: 50,
            max_alerts_per_cycle: 5,
            check_interval_minutes: 30,
            conditions: ConditionsConfig::default(),
            alert_cooldown: AlertCooldownConfig::default(),
            notification_schedule: NotificationScheduleConfig::default(),
            telegram: TelegramConfig::default(),
            watchlist: Vec::new(),
            daily_summary: DailySummaryConfig::default(),
            send_interval_ms: 1000,
            error_backoff_seconds: 60,
        }
    }
}

fn validation_error(msg: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(msg.into())
}

impl ConfigValidation for RsiConditionsConfig {
    fn validate(&self) -> ConfigResult<()> {
        if !self.enabled {
            return Ok(());
        }

        if self.timeframes.is_empty() {
            return Err(validation_error("RSI 타임프레임이 비어 있습니다"));
        }

        if self.periods.is_empty() {
            return Err(validation_error("RSI 기간 목록이 비어 있습니다"));
        }

        if self.periods.iter().any(|p| *p < 2) {
            return Err(validation_error("RSI 기간은 2 이상이어야 합니다"));
        }

        if self.oversold >= self.overbought {
            return Err(validation_error(format!(
                "과매도 기준({})은 과매수 기준({})보다 작아야 합니다",
                self.oversold, self.overbought
            )));
        }

        Ok(())
    }
}

impl ConfigValidation for DivergenceConditionsConfig {
    fn validate(&self) -> ConfigResult<()> {
        if !self.enabled {
            return Ok(());
        }

        if self.timeframes.is_empty() {
            return Err(validation_error("다이버전스 타임프레임이 비어 있습니다"));
        }

        if self.rsi_period < 2 {
            return Err(validation_error("다이버전스 RSI 기간은 2 이상이어야 합니다"));
        }

        if self.lookback_range[0] > self.lookback_range[1] {
            return Err(validation_error(format!(
                "lookback_range 최소값({})이 최대값({})보다 큽니다",
                self.lookback_range[0], self.lookback_range[1]
            )));
        }

        Ok(())
    }
}

impl ConfigValidation for NotificationScheduleConfig {
    fn validate(&self) -> ConfigResult<()> {
        if chrono_tz::Tz::from_str(&self.timezone).is_err() {
            return Err(validation_error(format!(
                "알 수 없는 시간대: {}",
                self.timezone
            )));
        }

        parse_hour(&self.quiet_hours.start).map_err(validation_error)?;
        parse_hour(&self.quiet_hours.end).map_err(validation_error)?;

        if self.weekend_quiet_hours.enabled {
            parse_hour(&self.weekend_quiet_hours.start).map_err(validation_error)?;
            parse_hour(&self.weekend_quiet_hours.end).map_err(validation_error)?;
        }

        Ok(())
    }
}

impl ConfigValidation for MonitorConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.check_interval_minutes == 0 {
            return Err(validation_error("check_interval_minutes는 0보다 커야 합니다"));
        }

        if self.alert_cooldown.enabled && self.alert_cooldown.cooldown_minutes == 0 {
            return Err(validation_error(
                "쿨다운이 활성화된 경우 cooldown_minutes는 0보다 커야 합니다",
            ));
        }

        if self.daily_summary.hour > 23 {
            return Err(validation_error(format!(
                "daily_summary.hour는 0-23 범위여야 합니다: {}",
                self.daily_summary.hour
            )));
        }

        self.conditions.rsi_conditions.validate()?;
        self.conditions.divergence_conditions.validate()?;
        self.notification_schedule.validate()?;

        Ok(())
    }
}

impl MonitorConfig {
    /// 설정 파일 로드 후 환경 변수 적용
    ///
    /// 파일 형식은 확장자(.toml / .json)로 판단합니다.
    pub fn load(path: &Path) -> ConfigResult<MonitorConfig> {
        let mut config: MonitorConfig = ConfigLoader::load_from_file(path, ConfigFormat::Auto)?;
        config.telegram.apply_env_overrides();
        Ok(config)
    }

    /// 활성화된 RSI/다이버전스 조건의 모든 타임프레임
    pub fn active_timeframes(&self) -> Vec<Timeframe> {
        let mut timeframes = Vec::new();
        if self.conditions.rsi_conditions.enabled {
            timeframes.extend(self.conditions.rsi_conditions.timeframes.iter().copied());
        }
        if self.conditions.divergence_conditions.enabled {
            timeframes.extend(self.conditions.divergence_conditions.timeframes.iter().copied());
        }
        timeframes
    }

    /// 관심 종목 표시 이름
    pub fn display_name(&self, symbol: &str) -> Option<&str> {
        self.watchlist
            .iter()
            .find(|entry| entry.symbol == symbol)
            .and_then(|entry| entry.name.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_toml() {
        let config =
            ConfigLoader::load_from_string::<MonitorConfig>("", ConfigFormat::Toml).unwrap();
        assert_eq!(config, MonitorConfig::default());
        assert_eq!(config.market_type, MarketType::Futures);
        assert_eq!(config.top_volume_limit, 50);
        assert_eq!(config.send_interval_ms, 1000);
        assert_eq!(config.conditions.divergence_conditions.mode, DivergenceMode::Combined);
    }

    #[test]
    fn test_nested_toml() {
        let toml_str = r#"
            market_type = "spot"
            check_interval_minutes = 15

            [conditions.rsi_conditions]
            timeframes = ["1h", "4h"]
            periods = [14]

            [conditions.divergence_conditions]
            enabled = true
            mode = "pivot"
            lookback_range = [3, 30]

            [notification_schedule]
            enabled = true
            timezone = "UTC"
            quiet_hours = { start = "23:00", end = "09:00" }

            [[watchlist]]
            symbol = "BTCUSDT"
            name = "Bitcoin"
        "#;
        let config =
            ConfigLoader::load_from_string::<MonitorConfig>(toml_str, ConfigFormat::Toml).unwrap();
        assert_eq!(config.market_type, MarketType::Spot);
        assert_eq!(
            config.conditions.rsi_conditions.timeframes,
            vec![Timeframe::Hour1, Timeframe::Hour4]
        );
        assert_eq!(config.conditions.divergence_conditions.mode, DivergenceMode::Pivot);
        assert_eq!(config.display_name("BTCUSDT"), Some("Bitcoin"));
        assert_eq!(config.active_timeframes().len(), 4);

        let detector = config.conditions.divergence_conditions.detector();
        assert_eq!(detector.lookback_range, (3, 30));
        assert_eq!(detector.recent_bars_only, Some(5));
    }

    #[test]
    fn test_unknown_timeframe_fails_at_load() {
        let toml_str = r#"
            [conditions.rsi_conditions]
            timeframes = ["3m"]
        "#;
        let result = ConfigLoader::load_from_string::<MonitorConfig>(toml_str, ConfigFormat::Toml);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_validation_failures() {
        let mut config = MonitorConfig::default();
        config.notification_schedule.quiet_hours.start = "25:00".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));

        let mut config = MonitorConfig::default();
        config.notification_schedule.timezone = "Mars/Olympus".to_string();
        assert!(config.validate().is_err());

        let mut config = MonitorConfig::default();
        config.conditions.rsi_conditions.oversold = 70.0;
        assert!(config.validate().is_err());

        let mut config = MonitorConfig::default();
        config.conditions.divergence_conditions.enabled = true;
        config.conditions.divergence_conditions.lookback_range = [10, 5];
        assert!(config.validate().is_err());

        let mut config = MonitorConfig::default();
        config.alert_cooldown.enabled = true;
        config.alert_cooldown.cooldown_minutes = 0;
        assert!(config.validate().is_err());

        let mut config = MonitorConfig::default();
        config.check_interval_minutes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_telegram_credentials() {
        let mut telegram = TelegramConfig::default();
        assert!(telegram.credentials().is_none());
        telegram.bot_token = Some("token".to_string());
        telegram.chat_id = Some("42".to_string());
        assert_eq!(telegram.credentials(), Some(("token", "42")));
    }
}
