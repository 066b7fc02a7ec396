use crate::config::{MonitorConfig, NotificationScheduleConfig};
use crate::config_loader::{ConfigError, ConfigResult};
use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike};
use chrono_tz::Tz;
use std::str::FromStr;

/// "HH:MM" 문자열에서 시(hour)만 추출
///
/// 분은 형식 검사만 하고 비교에는 사용하지 않습니다.
///
/// # Returns
/// * `Result<u32, String>` - 0-23 범위의 시 또는 오류 메시지
pub fn parse_hour(value: &str) -> Result<u32, String> {
    let mut parts = value.trim().split(':');
    let (hour, minute) = match (parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(m), None) => (h, m),
        _ => return Err(format!("시간 형식이 올바르지 않습니다 (HH:MM): {}", value)),
    };

    let hour: u32 = hour
        .parse()
        .map_err(|_| format!("시(hour)를 해석할 수 없습니다: {}", value))?;
    let minute: u32 = minute
        .parse()
        .map_err(|_| format!("분(minute)을 해석할 수 없습니다: {}", value))?;

    if hour > 23 || minute > 59 {
        return Err(format!("시간 범위를 벗어났습니다: {}", value));
    }
    Ok(hour)
}

/// 타임프레임 문자열을 분 단위로 변환
///
/// `m`은 그대로, `h`는 60배, `d`는 1440배이며 해석할 수 없으면 5분입니다.
pub fn timeframe_to_minutes(timeframe: &str) -> u32 {
    let timeframe = timeframe.trim();
    let (number, multiplier) = if let Some(n) = timeframe.strip_suffix('m') {
        (n, 1)
    } else if let Some(n) = timeframe.strip_suffix('h') {
        (n, 60)
    } else if let Some(n) = timeframe.strip_suffix('d') {
        (n, 1440)
    } else {
        return 5;
    };

    number.parse::<u32>().map(|n| n * multiplier).unwrap_or(5)
}

/// 활성화된 조건의 타임프레임 중 가장 짧은 것 (분)
///
/// 설정된 타임프레임이 없으면 `check_interval_minutes`를 반환합니다.
pub fn smallest_timeframe_minutes(config: &MonitorConfig) -> u32 {
    config
        .active_timeframes()
        .iter()
        .map(|tf| timeframe_to_minutes(tf.as_str()))
        .min()
        .unwrap_or(config.check_interval_minutes)
}

/// 다음 캔들 마감 시각 계산
///
/// 자정부터 지난 분을 주기로 내림한 뒤 한 주기를 더합니다.
/// 결과가 `now` 이후가 아니면 한 주기를 더 더합니다.
///
/// # Arguments
/// * `timeframe_minutes` - 캔들 주기 (분)
/// * `now` - 기준 시각
///
/// # Returns
/// * `DateTime<T>` - `now`보다 엄격하게 늦은 다음 마감 시각
pub fn next_candle_close<T: TimeZone>(timeframe_minutes: u32, now: &DateTime<T>) -> DateTime<T> {
    let period = Duration::minutes(i64::from(timeframe_minutes.max(1)));
    let midnight = now.clone()
        - Duration::seconds(i64::from(now.num_seconds_from_midnight()))
        - Duration::nanoseconds(i64::from(now.nanosecond()));

    let minutes_since_midnight = i64::from(now.hour() * 60 + now.minute());
    let period_minutes = period.num_minutes();
    let next_start = (minutes_since_midnight / period_minutes) * period_minutes + period_minutes;

    let mut next = midnight + Duration::minutes(next_start);
    if next <= *now {
        next += period;
    }
    next
}

/// 조용한 시간 구간 (시 단위)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuietWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl QuietWindow {
    pub fn parse(start: &str, end: &str) -> Result<QuietWindow, String> {
        Ok(QuietWindow {
            start_hour: parse_hour(start)?,
            end_hour: parse_hour(end)?,
        })
    }

    /// 해당 시가 조용한 시간인지 확인
    ///
    /// `start <= end`면 양 끝을 포함한 [start, end]가 조용한 시간이고,
    /// 자정을 넘기면 `hour >= start || hour < end`입니다.
    pub fn is_quiet(&self, hour: u32) -> bool {
        if self.start_hour <= self.end_hour {
            self.start_hour <= hour && hour <= self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

/// 알림음 허용 여부를 결정하는 스케줄러
///
/// 허용되지 않는 시각의 알림도 버리지 않고 무음으로 보냅니다.
#[derive(Debug, Clone)]
pub struct NotificationScheduler {
    enabled: bool,
    timezone: Tz,
    quiet_window: QuietWindow,
    weekend_window: Option<QuietWindow>,
    disable_weekends: bool,
}

impl NotificationScheduler {
    /// 설정으로 스케줄러 생성
    ///
    /// 시간 문자열이나 시간대가 잘못되면 시작 전에 실패합니다.
    pub fn new(config: &NotificationScheduleConfig) -> ConfigResult<NotificationScheduler> {
        let timezone = Tz::from_str(&config.timezone).map_err(|_| {
            ConfigError::ValidationError(format!("알 수 없는 시간대: {}", config.timezone))
        })?;

        let quiet_window = QuietWindow::parse(&config.quiet_hours.start, &config.quiet_hours.end)
            .map_err(ConfigError::ValidationError)?;

        let weekend_window = if config.weekend_quiet_hours.enabled {
            Some(
                QuietWindow::parse(
                    &config.weekend_quiet_hours.start,
                    &config.weekend_quiet_hours.end,
                )
                .map_err(ConfigError::ValidationError)?,
            )
        } else {
            None
        };

        Ok(NotificationScheduler {
            enabled: config.enabled,
            timezone,
            quiet_window,
            weekend_window,
            disable_weekends: config.disable_weekends,
        })
    }

    /// 항상 허용하는 스케줄러
    pub fn disabled() -> NotificationScheduler {
        NotificationScheduler {
            enabled: false,
            timezone: Tz::UTC,
            quiet_window: QuietWindow {
                start_hour: 22,
                end_hour: 8,
            },
            weekend_window: None,
            disable_weekends: false,
        }
    }

    /// 표시와 판단에 사용하는 시간대
    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// 주어진 시각에 알림음을 울려도 되는지 확인
    ///
    /// 시각은 설정된 시간대로 변환한 뒤 판단합니다. 토요일과 일요일이 주말입니다.
    pub fn is_notification_allowed<T: TimeZone>(&self, now: &DateTime<T>) -> bool {
        if !self.enabled {
            return true;
        }

        let local = now.with_timezone(&self.timezone);
        let is_weekend = local.weekday().num_days_from_monday() >= 5;

        if is_weekend && self.disable_weekends {
            log::info!("주말 알림 비활성화: {}", local.format("%Y-%m-%d %H:%M:%S"));
            return false;
        }

        let window = match (is_weekend, self.weekend_window) {
            (true, Some(weekend)) => weekend,
            _ => self.quiet_window,
        };

        let allowed = !window.is_quiet(local.hour());
        if !allowed {
            log::info!(
                "조용한 시간 알림 무음 처리: {} ({:02}시 ~ {:02}시)",
                local.format("%Y-%m-%d %H:%M:%S"),
                window.start_hour,
                window.end_hour
            );
        }
        allowed
    }
}
