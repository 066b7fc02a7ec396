use crate::config::AlertCooldownConfig;
use crate::model::ConditionType;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// 알림 중복 방지 캐시
///
/// 키별 마지막 발송 시각을 기억하고, `cooldown_minutes` 안에 같은 키의 알림이
/// 다시 나가지 않도록 막습니다. 현재 시각은 호출 측이 넘깁니다.
#[derive(Debug, Clone)]
pub struct CooldownCache {
    enabled: bool,
    cooldown: Duration,
    per_condition_type: bool,
    prune_after: Duration,
    entries: HashMap<String, DateTime<Utc>>,
}

impl CooldownCache {
    pub fn new(config: &AlertCooldownConfig) -> CooldownCache {
        let cooldown = Duration::minutes(i64::from(config.cooldown_minutes));
        CooldownCache {
            enabled: config.enabled,
            cooldown,
            per_condition_type: config.per_condition_type,
            prune_after: cooldown * config.prune_after_multiplier.max(1) as i32,
            entries: HashMap::new(),
        }
    }

    /// 캐시 키 생성
    ///
    /// 조건별 쿨다운이면 `{symbol}_{condition}[_{qualifier}]`, 아니면 심볼만 사용합니다.
    pub fn key(&self, symbol: &str, condition_type: ConditionType, qualifier: &str) -> String {
        if !self.per_condition_type {
            return symbol.to_string();
        }
        if qualifier.is_empty() {
            format!("{}_{}", symbol, condition_type.as_str())
        } else {
            format!("{}_{}_{}", symbol, condition_type.as_str(), qualifier)
        }
    }

    /// 키가 쿨다운 중인지 확인
    pub fn is_in_cooldown(&self, key: &str, now: DateTime<Utc>) -> bool {
        if !self.enabled {
            return false;
        }

        match self.entries.get(key) {
            Some(last) => {
                let elapsed = now - *last;
                if elapsed < self.cooldown {
                    log::debug!(
                        "알림 쿨다운 중: {} ({}분 경과/{}분 필요)",
                        key,
                        elapsed.num_minutes(),
                        self.cooldown.num_minutes()
                    );
                    return true;
                }
                false
            }
            None => false,
        }
    }

    /// 마지막 발송 시각 갱신
    ///
    /// 쿨다운이 꺼져 있으면 아무것도 하지 않습니다.
    pub fn update(&mut self, key: &str, now: DateTime<Utc>) {
        if self.enabled {
            self.entries.insert(key.to_string(), now);
        }
    }

    /// 쿨다운이 아니면 갱신하고 true 반환
    pub fn try_acquire(&mut self, key: &str, now: DateTime<Utc>) -> bool {
        if self.is_in_cooldown(key, now) {
            return false;
        }
        self.update(key, now);
        true
    }

    /// 오래된 항목 정리
    ///
    /// # Returns
    /// * `usize` - 제거된 항목 수
    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        let prune_after = self.prune_after;
        self.entries.retain(|_, last| now - *last <= prune_after);
        let removed = before - self.entries.len();
        if removed > 0 {
            log::debug!("쿨다운 캐시 {}개 항목 정리", removed);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn config(enabled: bool, per_condition_type: bool) -> AlertCooldownConfig {
        AlertCooldownConfig {
            enabled,
            cooldown_minutes: 30,
            per_condition_type,
            prune_after_multiplier: 4,
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_key_schemes() {
        let cache = CooldownCache::new(&config(true, true));
        assert_eq!(
            cache.key("BTCUSDT", ConditionType::RsiOversold, "5m"),
            "BTCUSDT_rsi_oversold_5m"
        );
        assert_eq!(
            cache.key("BTCUSDT", ConditionType::PriceDrop, ""),
            "BTCUSDT_price_drop"
        );

        let cache = CooldownCache::new(&config(true, false));
        assert_eq!(cache.key("BTCUSDT", ConditionType::Divergence, "5m"), "BTCUSDT");
    }

    #[test]
    fn test_disabled_is_noop() {
        let mut cache = CooldownCache::new(&config(false, true));
        cache.update("k", t0());
        assert!(cache.is_empty());
        assert!(!cache.is_in_cooldown("k", t0()));
        assert!(cache.try_acquire("k", t0()));
        assert!(cache.try_acquire("k", t0()));
    }

    #[test]
    fn test_window_boundary() {
        let mut cache = CooldownCache::new(&config(true, true));
        cache.update("k", t0());
        assert!(cache.is_in_cooldown("k", t0()));
        assert!(cache.is_in_cooldown("k", t0() + Duration::minutes(29)));
        assert!(!cache.is_in_cooldown("k", t0() + Duration::minutes(30)));
    }

    #[test]
    fn test_prune_drops_old_entries() {
        let mut cache = CooldownCache::new(&config(true, true));
        cache.update("old", t0());
        cache.update("new", t0() + Duration::minutes(100));
        assert_eq!(cache.prune(t0() + Duration::minutes(121)), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.is_in_cooldown("new", t0() + Duration::minutes(121)));
    }
}
