use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{Debug, Display};
use std::str::FromStr;

/// 캔들(OHLCV) 데이터에 접근하기 위한 트레이트
///
/// 거래소별 캔들 구현체가 공통으로 제공해야 하는 값들을 정의합니다.
pub trait Candle: Clone + Debug + Display + Send + Sync + PartialEq {
    /// 시가
    fn open_price(&self) -> f64;
    /// 고가
    fn high_price(&self) -> f64;
    /// 저가
    fn low_price(&self) -> f64;
    /// 종가
    fn close_price(&self) -> f64;
    /// 거래량
    fn volume(&self) -> f64;
    /// 캔들 시작 시각 (UTC)
    fn datetime(&self) -> DateTime<Utc>;
}

/// 거래소에서 받아온 기본 OHLCV 캔들
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OhlcvCandle {
    /// 캔들 시작 시각 (초 단위 유닉스 타임스탬프, UTC)
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl OhlcvCandle {
    /// 새 캔들 생성
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        OhlcvCandle {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

impl Display for OhlcvCandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Candle(t={}, o={}, h={}, l={}, c={}, v={})",
            self.timestamp, self.open, self.high, self.low, self.close, self.volume
        )
    }
}

impl Candle for OhlcvCandle {
    fn open_price(&self) -> f64 {
        self.open
    }
    fn high_price(&self) -> f64 {
        self.high
    }
    fn low_price(&self) -> f64 {
        self.low
    }
    fn close_price(&self) -> f64 {
        self.close
    }
    fn volume(&self) -> f64 {
        self.volume
    }
    fn datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.timestamp, 0).unwrap_or_default()
    }
}

/// 분석에 사용하는 캔들 주기
///
/// 거래소별 간격 문자열은 이 어휘로만 매핑됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Timeframe {
    Minute1,
    Minute5,
    Minute15,
    Hour1,
    Hour4,
    Day1,
}

impl Timeframe {
    /// 지원하는 모든 주기
    pub const ALL: [Timeframe; 6] = [
        Timeframe::Minute1,
        Timeframe::Minute5,
        Timeframe::Minute15,
        Timeframe::Hour1,
        Timeframe::Hour4,
        Timeframe::Day1,
    ];

    /// 표준 주기 문자열 ("1m", "5m", ...)
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::Minute1 => "1m",
            Timeframe::Minute5 => "5m",
            Timeframe::Minute15 => "15m",
            Timeframe::Hour1 => "1h",
            Timeframe::Hour4 => "4h",
            Timeframe::Day1 => "1d",
        }
    }

    /// 주기의 분 단위 길이
    pub fn minutes(&self) -> u32 {
        match self {
            Timeframe::Minute1 => 1,
            Timeframe::Minute5 => 5,
            Timeframe::Minute15 => 15,
            Timeframe::Hour1 => 60,
            Timeframe::Hour4 => 240,
            Timeframe::Day1 => 1440,
        }
    }
}

impl Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Timeframe::ALL
            .iter()
            .find(|tf| tf.as_str() == s.trim())
            .copied()
            .ok_or_else(|| format!("지원되지 않는 타임프레임: {}", s))
    }
}

impl TryFrom<String> for Timeframe {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Timeframe> for String {
    fn from(value: Timeframe) -> Self {
        value.as_str().to_string()
    }
}

/// 모니터링 대상 시장 유형
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketType {
    /// 현물
    Spot,
    /// USDT 무기한 선물
    #[default]
    Futures,
}

impl Display for MarketType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarketType::Spot => write!(f, "Spot"),
            MarketType::Futures => write!(f, "Futures"),
        }
    }
}

/// 24시간 티커 스냅샷
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub symbol: String,
    /// 최근 체결가
    pub last_price: f64,
    /// 24시간 가격 변동률 (%)
    pub change_percent_24h: f64,
    /// 24시간 최고가
    pub high_price: f64,
    /// 24시간 최저가
    pub low_price: f64,
    /// 24시간 거래 대금 (견적 통화 기준)
    pub quote_volume: f64,
}

/// 알림 조건 유형
///
/// 쿨다운 키의 조건 태그로 사용됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionType {
    /// 24시간 가격 하락 임계값 도달
    PriceDrop,
    /// 24시간 가격 상승 임계값 도달
    PriceRise,
    /// 거래량 급증
    VolumeSurge,
    /// RSI 과매도
    RsiOversold,
    /// RSI 과매수
    RsiOverbought,
    /// RSI 다이버전스
    Divergence,
}

impl ConditionType {
    /// 캐시 키에 들어가는 태그 문자열
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionType::PriceDrop => "price_drop",
            ConditionType::PriceRise => "price_rise",
            ConditionType::VolumeSurge => "volume_surge",
            ConditionType::RsiOversold => "rsi_oversold",
            ConditionType::RsiOverbought => "rsi_overbought",
            ConditionType::Divergence => "divergence",
        }
    }
}

impl Display for ConditionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 쿨다운 필터를 거치기 전의 알림 후보
#[derive(Debug, Clone, PartialEq)]
pub struct AlertCandidate {
    pub symbol: String,
    pub condition_type: ConditionType,
    /// 세부 조건 (타임프레임, 다이버전스 종류, 임계값 등)
    pub qualifier: String,
    /// 사용자에게 보여줄 알림 문구
    pub message: String,
}

impl AlertCandidate {
    pub fn new(
        symbol: &str,
        condition_type: ConditionType,
        qualifier: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        AlertCandidate {
            symbol: symbol.to_string(),
            condition_type,
            qualifier: qualifier.into(),
            message: message.into(),
        }
    }
}

/// 심볼별 마지막 관측값
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolSnapshot {
    pub price: f64,
    pub volume: f64,
    pub observed_at: DateTime<Utc>,
}

/// 사이클 간 거래량 변화율 계산을 위한 심볼별 상태
///
/// 심볼을 처음 관측할 때 생성되고 매 사이클 덮어씁니다.
#[derive(Debug, Default)]
pub struct MonitorState {
    entries: HashMap<String, SymbolSnapshot>,
}

impl MonitorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// 이전 관측 대비 거래량 배수
    ///
    /// 이전 관측이 없거나 이전 거래량이 0 이하이면 1을 반환합니다.
    pub fn volume_change(&self, symbol: &str, current_volume: f64) -> f64 {
        match self.entries.get(symbol) {
            Some(prev) if prev.volume > 0.0 => current_volume / prev.volume,
            _ => 1.0,
        }
    }

    /// 심볼의 최신 관측값 저장
    pub fn record(&mut self, symbol: &str, snapshot: SymbolSnapshot) {
        self.entries.insert(symbol.to_string(), snapshot);
    }

    pub fn get(&self, symbol: &str) -> Option<&SymbolSnapshot> {
        self.entries.get(symbol)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `max_age`보다 오래 관측되지 않은 심볼 제거
    ///
    /// # Returns
    /// * `usize` - 제거된 항목 수
    pub fn prune(&mut self, now: DateTime<Utc>, max_age: chrono::Duration) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, snapshot| now - snapshot.observed_at <= max_age);
        before - self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_timeframe_parse() {
        assert_eq!("5m".parse::<Timeframe>().unwrap(), Timeframe::Minute5);
        assert_eq!("4h".parse::<Timeframe>().unwrap(), Timeframe::Hour4);
        assert!("3m".parse::<Timeframe>().is_err());
        assert!("1w".parse::<Timeframe>().is_err());
    }

    #[test]
    fn test_timeframe_minutes() {
        assert_eq!(Timeframe::Minute15.minutes(), 15);
        assert_eq!(Timeframe::Hour1.minutes(), 60);
        assert_eq!(Timeframe::Day1.minutes(), 1440);
    }

    #[test]
    fn test_volume_change_defaults_to_one() {
        let mut state = MonitorState::new();
        assert_eq!(state.volume_change("BTCUSDT", 500.0), 1.0);

        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        state.record(
            "BTCUSDT",
            SymbolSnapshot {
                price: 100.0,
                volume: 0.0,
                observed_at: now,
            },
        );
        assert_eq!(state.volume_change("BTCUSDT", 500.0), 1.0);

        state.record(
            "BTCUSDT",
            SymbolSnapshot {
                price: 100.0,
                volume: 250.0,
                observed_at: now,
            },
        );
        assert_eq!(state.volume_change("BTCUSDT", 500.0), 2.0);
    }

    #[test]
    fn test_monitor_state_prune() {
        let mut state = MonitorState::new();
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        state.record(
            "OLD",
            SymbolSnapshot {
                price: 1.0,
                volume: 1.0,
                observed_at: now - Duration::hours(30),
            },
        );
        state.record(
            "NEW",
            SymbolSnapshot {
                price: 1.0,
                volume: 1.0,
                observed_at: now - Duration::hours(1),
            },
        );

        assert_eq!(state.prune(now, Duration::hours(24)), 1);
        assert!(state.get("OLD").is_none());
        assert!(state.get("NEW").is_some());
    }
}
