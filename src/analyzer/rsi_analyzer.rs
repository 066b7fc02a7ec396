use crate::candle_store::CandleStore;
use crate::indicator::rsi::{RSI, calculate_rsi_multi};
use crate::model::{Candle, ConditionType, Timeframe};
use std::fmt::Display;

/// RSI 과매수/과매도 구간
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RsiZone {
    Oversold,
    Overbought,
}

impl RsiZone {
    pub fn condition_type(&self) -> ConditionType {
        match self {
            RsiZone::Oversold => ConditionType::RsiOversold,
            RsiZone::Overbought => ConditionType::RsiOverbought,
        }
    }
}

/// 한 타임프레임의 과매수 또는 과매도 신호 묶음
///
/// 조건을 만족한 기간이 여러 개여도 타임프레임당 하나로 묶습니다.
#[derive(Debug, Clone, PartialEq)]
pub struct RsiAlert {
    pub zone: RsiZone,
    pub timeframe: Timeframe,
    pub readings: Vec<RSI>,
}

impl RsiAlert {
    /// 알림 문구 생성
    pub fn message(&self) -> String {
        let readings = self
            .readings
            .iter()
            .map(|rsi| format!("RSI({}): {:.2}", rsi.period(), rsi.value()))
            .collect::<Vec<_>>()
            .join(", ");
        match self.zone {
            RsiZone::Oversold => format!("📉 {} 과매도 신호: {}", self.timeframe, readings),
            RsiZone::Overbought => format!("📈 {} 과매수 신호: {}", self.timeframe, readings),
        }
    }
}

/// 한 타임프레임에서 계산된 RSI 값들
#[derive(Debug, Clone)]
pub struct RSIAnalyzerData {
    pub timeframe: Timeframe,
    /// 설정 순서대로의 RSI 목록 (소수 둘째 자리 반올림)
    pub rsis: Vec<RSI>,
}

impl Display for RSIAnalyzerData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let values = self
            .rsis
            .iter()
            .map(|rsi| rsi.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{} {}", self.timeframe, values)
    }
}

/// RSI 임계값 분석기
#[derive(Debug, Clone)]
pub struct RSIAnalyzer {
    /// RSI 기간 목록
    pub periods: Vec<usize>,
    /// 과매도 기준 (이하)
    pub oversold: f64,
    /// 과매수 기준 (이상)
    pub overbought: f64,
}

impl RSIAnalyzer {
    pub fn new(periods: &[usize], oversold: f64, overbought: f64) -> RSIAnalyzer {
        RSIAnalyzer {
            periods: periods.to_vec(),
            oversold,
            overbought,
        }
    }

    /// 저장소의 캔들로 각 기간의 최신 RSI 계산
    ///
    /// 데이터가 부족한 기간은 빠집니다.
    pub fn calculate<C: Candle>(
        &self,
        storage: &CandleStore<C>,
        timeframe: Timeframe,
    ) -> RSIAnalyzerData {
        let values = calculate_rsi_multi(&storage.closes(), &self.periods);
        let rsis = self
            .periods
            .iter()
            .filter_map(|period| {
                values
                    .get(period)
                    .map(|v| RSI::new(*period, (v * 100.0).round() / 100.0))
            })
            .collect();
        RSIAnalyzerData { timeframe, rsis }
    }

    /// 계산된 RSI를 과매도/과매수 신호로 분류
    ///
    /// 경계값은 포함합니다 (`<= oversold`, `>= overbought`).
    pub fn classify(&self, data: &RSIAnalyzerData) -> Vec<RsiAlert> {
        let mut oversold = Vec::new();
        let mut overbought = Vec::new();

        for rsi in &data.rsis {
            if rsi.is_oversold(Some(self.oversold)) {
                oversold.push(rsi.clone());
            } else if rsi.is_overbought(Some(self.overbought)) {
                overbought.push(rsi.clone());
            }
        }

        let mut alerts = Vec::new();
        if !oversold.is_empty() {
            alerts.push(RsiAlert {
                zone: RsiZone::Oversold,
                timeframe: data.timeframe,
                readings: oversold,
            });
        }
        if !overbought.is_empty() {
            alerts.push(RsiAlert {
                zone: RsiZone::Overbought,
                timeframe: data.timeframe,
                readings: overbought,
            });
        }

        if alerts.is_empty() && !data.rsis.is_empty() {
            log::debug!("RSI 조건 없음: {}", data);
        }
        alerts
    }

    /// 계산과 분류를 한 번에 수행
    pub fn analyze<C: Candle>(
        &self,
        storage: &CandleStore<C>,
        timeframe: Timeframe,
    ) -> Vec<RsiAlert> {
        let data = self.calculate(storage, timeframe);
        self.classify(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(values: &[(usize, f64)]) -> RSIAnalyzerData {
        RSIAnalyzerData {
            timeframe: Timeframe::Minute5,
            rsis: values.iter().map(|(p, v)| RSI::new(*p, *v)).collect(),
        }
    }

    #[test]
    fn test_groups_per_zone() {
        let analyzer = RSIAnalyzer::new(&[7, 14, 21], 30.0, 70.0);
        let alerts = analyzer.classify(&data(&[(7, 25.0), (14, 30.0), (21, 45.0)]));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].zone, RsiZone::Oversold);
        assert_eq!(alerts[0].readings.len(), 2);
        assert_eq!(
            alerts[0].message(),
            "📉 5m 과매도 신호: RSI(7): 25.00, RSI(14): 30.00"
        );
    }

    #[test]
    fn test_both_zones_in_one_timeframe() {
        let analyzer = RSIAnalyzer::new(&[6, 24], 30.0, 70.0);
        let alerts = analyzer.classify(&data(&[(6, 75.5), (24, 28.0)]));
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].zone, RsiZone::Oversold);
        assert_eq!(alerts[1].zone, RsiZone::Overbought);
        assert!(alerts[1].message().starts_with("📈 5m 과매수 신호"));
    }

    #[test]
    fn test_neutral_values_produce_nothing() {
        let analyzer = RSIAnalyzer::new(&[14], 30.0, 70.0);
        assert!(analyzer.classify(&data(&[(14, 50.0)])).is_empty());
        assert!(analyzer.classify(&data(&[])).is_empty());
    }
}
