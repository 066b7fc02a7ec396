use crate::analyzer::divergence::{DivergenceDetector, DivergenceMode};
use crate::analyzer::rsi_analyzer::RSIAnalyzer;
use crate::candle_store::CandleStore;
use crate::config::MonitorConfig;
use crate::model::{
    AlertCandidate, ConditionType, MonitorState, OhlcvCandle, SymbolSnapshot, Ticker, Timeframe,
};
use crate::monitor::cooldown::CooldownCache;
use crate::source::CandleSource;
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use log::{debug, info, warn};
use std::collections::HashMap;

/// 거래소 kline 요청 상한
const MAX_CANDLE_LIMIT: usize = 1000;

/// 관측되지 않은 심볼 상태를 보관하는 기간 (시간)
const STATE_RETENTION_HOURS: i64 = 24;

/// 심볼별 알림 조건 평가기
///
/// 쿨다운 캐시와 심볼별 관측 상태를 소유하며, 한 번에 한 심볼씩 평가합니다.
/// 한 심볼의 상태 갱신은 다음 심볼 평가 전에 끝납니다.
pub struct ConditionEvaluator {
    config: MonitorConfig,
    timezone: Tz,
    rsi_analyzer: RSIAnalyzer,
    detector: DivergenceDetector,
    cooldown: CooldownCache,
    state: MonitorState,
}

impl ConditionEvaluator {
    /// 평가기 생성
    ///
    /// # Arguments
    /// * `config` - 모니터 설정
    /// * `timezone` - 다이버전스 알림 시각 표시용 시간대
    pub fn new(config: &MonitorConfig, timezone: Tz) -> ConditionEvaluator {
        let rsi = &config.conditions.rsi_conditions;
        ConditionEvaluator {
            config: config.clone(),
            timezone,
            rsi_analyzer: RSIAnalyzer::new(&rsi.periods, rsi.oversold, rsi.overbought),
            detector: config.conditions.divergence_conditions.detector(),
            cooldown: CooldownCache::new(&config.alert_cooldown),
            state: MonitorState::new(),
        }
    }

    pub fn cooldown(&self) -> &CooldownCache {
        &self.cooldown
    }

    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    /// 타임프레임별로 필요한 캔들 수
    ///
    /// RSI와 다이버전스가 같은 타임프레임을 쓰면 큰 쪽을 한 번만 요청합니다.
    pub fn candle_limit(&self, timeframe: Timeframe) -> usize {
        let rsi = &self.config.conditions.rsi_conditions;
        let divergence = &self.config.conditions.divergence_conditions;
        let mut limit = 0;

        if rsi.enabled && rsi.timeframes.contains(&timeframe) {
            let max_period = rsi.periods.iter().copied().max().unwrap_or(14);
            limit = limit.max(max_period + 50);
        }

        if divergence.enabled && divergence.timeframes.contains(&timeframe) {
            let needed = match divergence.mode {
                DivergenceMode::Combined => {
                    divergence.rsi_period + divergence.lookback_periods + 10
                }
                DivergenceMode::Pivot => {
                    divergence.rsi_period
                        + divergence.lookback_range[1]
                        + divergence.left_bars
                        + divergence.right_bars
                        + 20
                }
            };
            limit = limit.max(needed);
        }

        limit.min(MAX_CANDLE_LIMIT)
    }

    /// 이번 평가에 필요한 타임프레임 (RSI 순서, 다이버전스 순서, 중복 제거)
    fn required_timeframes(&self) -> Vec<Timeframe> {
        let mut timeframes: Vec<Timeframe> = Vec::new();
        for tf in self.config.active_timeframes() {
            if !timeframes.contains(&tf) {
                timeframes.push(tf);
            }
        }
        timeframes
    }

    async fn load_candles<S: CandleSource + ?Sized>(
        &self,
        source: &S,
        symbol: &str,
    ) -> HashMap<Timeframe, CandleStore<OhlcvCandle>> {
        let mut stores = HashMap::new();

        for timeframe in self.required_timeframes() {
            let limit = self.candle_limit(timeframe);
            match source.fetch_candles(symbol, timeframe, limit).await {
                Ok(candles) if !candles.is_empty() => {
                    stores.insert(timeframe, CandleStore::new(candles, limit));
                }
                Ok(_) => warn!("{} {} 캔들 데이터 없음", symbol, timeframe),
                Err(e) => warn!("{} {} 캔들 조회 실패: {}", symbol, timeframe, e),
            }
        }

        stores
    }

    /// 가격/거래량 조건
    fn ticker_alerts(&self, ticker: &Ticker, volume_change: f64) -> Vec<AlertCandidate> {
        let conditions = &self.config.conditions;
        let symbol = ticker.symbol.as_str();
        let pct = ticker.change_percent_24h;
        let mut alerts = Vec::new();

        if let Some(price) = &conditions.price_change_24h_percent {
            if let Some(min) = price.min {
                if pct <= min {
                    alerts.push(AlertCandidate::new(
                        symbol,
                        ConditionType::PriceDrop,
                        min.to_string(),
                        format!("📉 24시간 가격 변동률: {:.2}% (임계값: {}% 이하)", pct, min),
                    ));
                }
            }
            if let Some(max) = price.max {
                if pct >= max {
                    alerts.push(AlertCandidate::new(
                        symbol,
                        ConditionType::PriceRise,
                        max.to_string(),
                        format!("📈 24시간 가격 변동률: {:.2}% (임계값: {}% 이상)", pct, max),
                    ));
                }
            }
        }

        if let Some(volume) = &conditions.volume_change_24h {
            if volume_change >= volume.min {
                alerts.push(AlertCandidate::new(
                    symbol,
                    ConditionType::VolumeSurge,
                    volume.min.to_string(),
                    format!(
                        "📊 거래량 증가: {:.2}배 (임계값: {}배 이상)",
                        volume_change, volume.min
                    ),
                ));
            }
        }

        alerts
    }

    /// 한 심볼의 모든 조건 평가
    ///
    /// 캔들 조회에 실패한 타임프레임은 이번 사이클에서 건너뜁니다.
    /// 쿨다운에 걸린 후보는 결과에서 빠지고, 통과한 후보는 발송된 것으로 기록됩니다.
    /// 심볼 상태는 결과와 무관하게 마지막에 갱신됩니다.
    ///
    /// # Arguments
    /// * `source` - 캔들 소스
    /// * `ticker` - 심볼의 최신 24시간 티커
    /// * `now` - 평가 시각
    ///
    /// # Returns
    /// * `Vec<AlertCandidate>` - 쿨다운을 통과한 알림
    pub async fn evaluate<S: CandleSource + ?Sized>(
        &mut self,
        source: &S,
        ticker: &Ticker,
        now: DateTime<Utc>,
    ) -> Vec<AlertCandidate> {
        let symbol = ticker.symbol.as_str();
        let volume_change = self.state.volume_change(symbol, ticker.quote_volume);
        let mut candidates = self.ticker_alerts(ticker, volume_change);

        let stores = self.load_candles(source, symbol).await;

        let rsi = &self.config.conditions.rsi_conditions;
        if rsi.enabled {
            for timeframe in &rsi.timeframes {
                let Some(store) = stores.get(timeframe) else {
                    continue;
                };
                for alert in self.rsi_analyzer.analyze(store, *timeframe) {
                    candidates.push(AlertCandidate::new(
                        symbol,
                        alert.zone.condition_type(),
                        timeframe.as_str(),
                        alert.message(),
                    ));
                }
            }
        }

        let divergence = &self.config.conditions.divergence_conditions;
        if divergence.enabled {
            for timeframe in &divergence.timeframes {
                let Some(store) = stores.get(timeframe) else {
                    continue;
                };
                let candles = store.get_time_ordered_items();
                for signal in self.detector.detect(&candles, *timeframe, divergence.mode) {
                    if signal.kind.is_hidden() && !divergence.include_hidden {
                        debug!("{} Hidden 다이버전스 제외: {}", symbol, signal.kind);
                        continue;
                    }
                    candidates.push(AlertCandidate::new(
                        symbol,
                        ConditionType::Divergence,
                        signal.qualifier(),
                        signal.message(&self.timezone),
                    ));
                }
            }
        }

        let mut alerts = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let key = self
                .cooldown
                .key(symbol, candidate.condition_type, &candidate.qualifier);
            if self.cooldown.try_acquire(&key, now) {
                alerts.push(candidate);
            } else {
                info!("{} 쿨다운으로 알림 생략: {}", symbol, key);
            }
        }

        self.state.record(
            symbol,
            SymbolSnapshot {
                price: ticker.last_price,
                volume: ticker.quote_volume,
                observed_at: now,
            },
        );

        alerts
    }

    /// 오래된 쿨다운 항목과 심볼 상태 정리
    pub fn prune(&mut self, now: DateTime<Utc>) {
        let cooldown_removed = self.cooldown.prune(now);
        let state_removed = self
            .state
            .prune(now, Duration::hours(STATE_RETENTION_HOURS));
        if cooldown_removed + state_removed > 0 {
            debug!(
                "캐시 정리: 쿨다운 {}개, 심볼 상태 {}개",
                cooldown_removed, state_removed
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PriceChangeCondition, VolumeChangeCondition};

    fn ticker(pct: f64, quote_volume: f64) -> Ticker {
        Ticker {
            symbol: "BTCUSDT".to_string(),
            last_price: 100.0,
            change_percent_24h: pct,
            high_price: 110.0,
            low_price: 90.0,
            quote_volume,
        }
    }

    fn config() -> MonitorConfig {
        let mut config = MonitorConfig::default();
        config.conditions.price_change_24h_percent = Some(PriceChangeCondition {
            min: Some(-5.0),
            max: Some(5.0),
        });
        config.conditions.volume_change_24h = Some(VolumeChangeCondition { min: 2.0 });
        config
    }

    #[test]
    fn test_price_thresholds_inclusive() {
        let evaluator = ConditionEvaluator::new(&config(), Tz::UTC);

        let alerts = evaluator.ticker_alerts(&ticker(-5.0, 1.0), 1.0);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].condition_type, ConditionType::PriceDrop);
        assert_eq!(alerts[0].qualifier, "-5");

        let alerts = evaluator.ticker_alerts(&ticker(5.0, 1.0), 1.0);
        assert_eq!(alerts[0].condition_type, ConditionType::PriceRise);

        assert!(evaluator.ticker_alerts(&ticker(4.99, 1.0), 1.0).is_empty());
    }

    #[test]
    fn test_both_price_thresholds_can_fire() {
        let mut config = config();
        config.conditions.price_change_24h_percent = Some(PriceChangeCondition {
            min: Some(0.0),
            max: Some(0.0),
        });
        let evaluator = ConditionEvaluator::new(&config, Tz::UTC);
        let alerts = evaluator.ticker_alerts(&ticker(0.0, 1.0), 1.0);
        assert_eq!(alerts.len(), 2);
    }

    #[test]
    fn test_volume_surge() {
        let evaluator = ConditionEvaluator::new(&config(), Tz::UTC);
        let alerts = evaluator.ticker_alerts(&ticker(0.0, 1.0), 2.0);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].condition_type, ConditionType::VolumeSurge);
        assert!(alerts[0].message.contains("2.00배"));
    }

    #[test]
    fn test_candle_limit_takes_larger_need() {
        let mut config = config();
        config.conditions.divergence_conditions.enabled = true;
        let evaluator = ConditionEvaluator::new(&config, Tz::UTC);
        // RSI: 21 + 50, 다이버전스: 14 + 15 + 10
        assert_eq!(evaluator.candle_limit(Timeframe::Minute5), 71);
        assert_eq!(evaluator.candle_limit(Timeframe::Hour4), 0);

        config.conditions.divergence_conditions.mode = DivergenceMode::Pivot;
        let evaluator = ConditionEvaluator::new(&config, Tz::UTC);
        assert_eq!(evaluator.candle_limit(Timeframe::Minute5), 14 + 60 + 5 + 5 + 20);
    }

    #[test]
    fn test_required_timeframes_dedup() {
        let mut config = config();
        config.conditions.divergence_conditions.enabled = true;
        config.conditions.divergence_conditions.timeframes =
            vec![Timeframe::Minute15, Timeframe::Hour1];
        let evaluator = ConditionEvaluator::new(&config, Tz::UTC);
        assert_eq!(
            evaluator.required_timeframes(),
            vec![Timeframe::Minute5, Timeframe::Minute15, Timeframe::Hour1]
        );
    }
}
