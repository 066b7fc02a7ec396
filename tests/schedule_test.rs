use chrono::{TimeZone, Utc};
use chrono_tz::Asia::Seoul;
use crypto_monitor::config::{MonitorConfig, NotificationScheduleConfig, QuietHoursConfig};
use crypto_monitor::config_loader::ConfigError;
use crypto_monitor::model::Timeframe;
use crypto_monitor::monitor::schedule::{
    NotificationScheduler, next_candle_close, smallest_timeframe_minutes,
};

fn schedule(timezone: &str, start: &str, end: &str) -> NotificationScheduleConfig {
    NotificationScheduleConfig {
        enabled: true,
        timezone: timezone.to_string(),
        quiet_hours: QuietHoursConfig {
            start: start.to_string(),
            end: end.to_string(),
        },
        ..NotificationScheduleConfig::default()
    }
}

#[test]
fn test_wrapping_quiet_hours() {
    let scheduler = NotificationScheduler::new(&schedule("UTC", "23:00", "09:00")).unwrap();
    // 2024-01-03 수요일
    let at = |h| Utc.with_ymd_and_hms(2024, 1, 3, h, 0, 0).unwrap();

    assert!(!scheduler.is_notification_allowed(&at(23)));
    assert!(!scheduler.is_notification_allowed(&at(8)));
    assert!(scheduler.is_notification_allowed(&at(9)));
    assert!(scheduler.is_notification_allowed(&at(12)));
}

#[test]
fn test_minutes_are_ignored() {
    let scheduler = NotificationScheduler::new(&schedule("UTC", "12:30", "13:45")).unwrap();
    let noon = Utc.with_ymd_and_hms(2024, 1, 3, 12, 5, 0).unwrap();
    let one_fifty = Utc.with_ymd_and_hms(2024, 1, 3, 13, 50, 0).unwrap();
    assert!(!scheduler.is_notification_allowed(&noon));
    assert!(!scheduler.is_notification_allowed(&one_fifty));
}

#[test]
fn test_local_timezone_is_used() {
    let scheduler = NotificationScheduler::new(&schedule("Asia/Seoul", "22:00", "08:00")).unwrap();
    // UTC 14:00 = 서울 23:00
    let late = Utc.with_ymd_and_hms(2024, 1, 3, 14, 0, 0).unwrap();
    // UTC 01:00 = 서울 10:00
    let morning = Utc.with_ymd_and_hms(2024, 1, 3, 1, 0, 0).unwrap();

    assert!(!scheduler.is_notification_allowed(&late));
    assert!(scheduler.is_notification_allowed(&morning));
    assert!(scheduler.is_notification_allowed(&morning.with_timezone(&Seoul)));
}

#[test]
fn test_disable_weekends() {
    let mut config = schedule("Asia/Seoul", "22:00", "08:00");
    config.disable_weekends = true;
    let scheduler = NotificationScheduler::new(&config).unwrap();

    // UTC 금요일 16:00 = 서울 토요일 01:00
    let saturday_local = Utc.with_ymd_and_hms(2024, 1, 5, 16, 0, 0).unwrap();
    // 서울 토요일 12:00
    let saturday_noon = Seoul.with_ymd_and_hms(2024, 1, 6, 12, 0, 0).unwrap();
    // 서울 금요일 12:00
    let friday_noon = Seoul.with_ymd_and_hms(2024, 1, 5, 12, 0, 0).unwrap();

    assert!(!scheduler.is_notification_allowed(&saturday_local));
    assert!(!scheduler.is_notification_allowed(&saturday_noon));
    assert!(scheduler.is_notification_allowed(&friday_noon));
}

#[test]
fn test_weekend_window_replaces_default() {
    let mut config = schedule("UTC", "22:00", "08:00");
    config.weekend_quiet_hours.enabled = true;
    config.weekend_quiet_hours.start = "00:00".to_string();
    config.weekend_quiet_hours.end = "10:00".to_string();
    let scheduler = NotificationScheduler::new(&config).unwrap();

    let sunday_nine = Utc.with_ymd_and_hms(2024, 1, 7, 9, 0, 0).unwrap();
    let sunday_late = Utc.with_ymd_and_hms(2024, 1, 7, 23, 0, 0).unwrap();
    let monday_nine = Utc.with_ymd_and_hms(2024, 1, 8, 9, 0, 0).unwrap();

    assert!(!scheduler.is_notification_allowed(&sunday_nine));
    assert!(scheduler.is_notification_allowed(&sunday_late));
    assert!(scheduler.is_notification_allowed(&monday_nine));
}

#[test]
fn test_disabled_schedule_always_allows() {
    let mut config = schedule("UTC", "00:00", "23:00");
    config.enabled = false;
    config.disable_weekends = true;
    let scheduler = NotificationScheduler::new(&config).unwrap();
    let saturday = Utc.with_ymd_and_hms(2024, 1, 6, 3, 0, 0).unwrap();
    assert!(scheduler.is_notification_allowed(&saturday));
}

#[test]
fn test_malformed_schedule_fails_fast() {
    let result = NotificationScheduler::new(&schedule("UTC", "7pm", "08:00"));
    assert!(matches!(result, Err(ConfigError::ValidationError(_))));

    let result = NotificationScheduler::new(&schedule("Nowhere/City", "22:00", "08:00"));
    assert!(result.is_err());
}

#[test]
fn test_next_candle_close_is_strictly_future() {
    let at = |h, m, s| Utc.with_ymd_and_hms(2024, 1, 3, h, m, s).unwrap();
    assert_eq!(next_candle_close(15, &at(0, 7, 0)), at(0, 15, 0));
    assert_eq!(next_candle_close(15, &at(0, 15, 0)), at(0, 30, 0));
    assert_eq!(next_candle_close(5, &at(10, 4, 59)), at(10, 5, 0));
    assert_eq!(next_candle_close(240, &at(3, 0, 0)), at(4, 0, 0));

    let local = Seoul.with_ymd_and_hms(2024, 1, 3, 9, 59, 30).unwrap();
    assert_eq!(
        next_candle_close(60, &local),
        Seoul.with_ymd_and_hms(2024, 1, 3, 10, 0, 0).unwrap()
    );
}

#[test]
fn test_smallest_timeframe() {
    let mut config = MonitorConfig::default();
    config.conditions.rsi_conditions.timeframes = vec![Timeframe::Minute15, Timeframe::Hour1];
    assert_eq!(smallest_timeframe_minutes(&config), 15);

    config.conditions.divergence_conditions.enabled = true;
    config.conditions.divergence_conditions.timeframes = vec![Timeframe::Minute5];
    assert_eq!(smallest_timeframe_minutes(&config), 5);

    config.conditions.rsi_conditions.enabled = false;
    config.conditions.divergence_conditions.enabled = false;
    assert_eq!(smallest_timeframe_minutes(&config), config.check_interval_minutes);
}
