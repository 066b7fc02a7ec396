use crate::candle_store::CandleStore;
use crate::error::AnalysisError;
use crate::model::Candle;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::marker::PhantomData;

/// RSI 값을 신뢰하기 위해 기간 외에 추가로 요구하는 워밍업 캔들 수
pub const RSI_WARMUP_MARGIN: usize = 10;

/// 평균 상승폭/하락폭으로 RSI 계산
///
/// 하락폭 평균이 0이면 100, 상승폭도 0이면 (완전 횡보) 50을 반환합니다.
fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss <= f64::EPSILON {
        if avg_gain <= f64::EPSILON {
            return 50.0;
        }
        return 100.0;
    }

    let rs = avg_gain / avg_loss;
    100.0 - (100.0 / (1.0 + rs))
}

/// 종가 시계열로 RSI 시계열 계산 (Wilder 평활)
///
/// 첫 평균은 처음 `period`개 변화량의 단순 평균이고, 이후
/// `avg = (avg * (period - 1) + current) / period` 로 갱신합니다.
///
/// # Arguments
/// * `closes` - 시간 순서의 종가 목록
/// * `period` - RSI 기간
///
/// # Returns
/// * `Vec<Option<f64>>` - 입력과 같은 길이, 처음 `period`개는 None
pub fn compute_rsi(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; closes.len()];
    if period == 0 || closes.len() <= period {
        return result;
    }

    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();

    let mut avg_gain = deltas[..period].iter().map(|d| d.max(0.0)).sum::<f64>() / period as f64;
    let mut avg_loss = deltas[..period].iter().map(|d| (-d).max(0.0)).sum::<f64>() / period as f64;
    result[period] = Some(rsi_from_averages(avg_gain, avg_loss));

    let p = period as f64;
    for i in (period + 1)..closes.len() {
        let delta = deltas[i - 1];
        avg_gain = (avg_gain * (p - 1.0) + delta.max(0.0)) / p;
        avg_loss = (avg_loss * (p - 1.0) + (-delta).max(0.0)) / p;
        result[i] = Some(rsi_from_averages(avg_gain, avg_loss));
    }

    result
}

/// 워밍업 여유분을 확인한 뒤 RSI 시계열 계산
///
/// 종가가 `period + RSI_WARMUP_MARGIN`개 미만이면 값을 만들지 않고 오류를 반환합니다.
pub fn compute_rsi_checked(
    closes: &[f64],
    period: usize,
) -> Result<Vec<Option<f64>>, AnalysisError> {
    let required = period + RSI_WARMUP_MARGIN;
    if closes.len() < required {
        return Err(AnalysisError::InsufficientData {
            required,
            actual: closes.len(),
        });
    }
    Ok(compute_rsi(closes, period))
}

/// RSI 시계열의 마지막 유효값
pub fn last_defined(series: &[Option<f64>]) -> Option<f64> {
    series.iter().rev().find_map(|v| *v)
}

/// 여러 기간의 최신 RSI 계산
///
/// 데이터가 부족한 기간은 결과에서 빠집니다.
///
/// # Arguments
/// * `closes` - 시간 순서의 종가 목록
/// * `periods` - RSI 기간 목록
///
/// # Returns
/// * `BTreeMap<usize, f64>` - 기간별 최신 RSI
pub fn calculate_rsi_multi(closes: &[f64], periods: &[usize]) -> BTreeMap<usize, f64> {
    let mut result = BTreeMap::new();
    for &period in periods {
        match compute_rsi_checked(closes, period) {
            Ok(series) => {
                if let Some(value) = last_defined(&series) {
                    result.insert(period, value);
                }
            }
            Err(e) => log::debug!("RSI({}) 계산 생략: {}", period, e),
        }
    }
    result
}

/// 상대강도지수(RSI) 기술적 지표
///
/// RSI는 가격 변동의 상대적 강도를 측정하여 과매수/과매도 상태를 판단
#[derive(Clone, Debug, PartialEq)]
pub struct RSI {
    /// RSI 계산 기간
    period: usize,
    /// RSI 값 (0-100)
    pub value: f64,
}

impl Display for RSI {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RSI({}: {:.2})", self.period, self.value)
    }
}

impl RSI {
    pub fn new(period: usize, value: f64) -> Self {
        RSI { period, value }
    }

    /// RSI가 과매수 상태인지 확인 (일반적으로 70 이상)
    ///
    /// # Arguments
    /// * `threshold` - 과매수 기준값 (기본값 70.0)
    ///
    /// # Returns
    /// * `bool` - 과매수 여부
    pub fn is_overbought(&self, threshold: Option<f64>) -> bool {
        let threshold_value = threshold.unwrap_or(70.0);
        self.value >= threshold_value
    }

    /// RSI가 과매도 상태인지 확인 (일반적으로 30 이하)
    ///
    /// # Arguments
    /// * `threshold` - 과매도 기준값 (기본값 30.0)
    ///
    /// # Returns
    /// * `bool` - 과매도 여부
    pub fn is_oversold(&self, threshold: Option<f64>) -> bool {
        let threshold_value = threshold.unwrap_or(30.0);
        self.value <= threshold_value
    }

    /// RSI 기간 반환
    pub fn period(&self) -> usize {
        self.period
    }

    /// RSI 값 반환
    pub fn value(&self) -> f64 {
        self.value
    }
}

/// 상대강도지수(RSI) 기술적 지표 빌더
///
/// 캔들 목록이나 저장소에서 최신 RSI를 계산합니다.
#[derive(Debug)]
pub struct RSIBuilder<C: Candle> {
    /// RSI 계산 기간
    period: usize,
    _phantom: PhantomData<C>,
}

impl<C> RSIBuilder<C>
where
    C: Candle,
{
    /// 새 RSI 빌더 생성
    ///
    /// # Arguments
    /// * `period` - RSI 계산 기간 (일반적으로 14)
    pub fn new(period: usize) -> Self {
        Self {
            period,
            _phantom: PhantomData,
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    /// 저장소에서 RSI 지표 생성
    ///
    /// # Arguments
    /// * `storage` - 캔들 데이터 저장소
    ///
    /// # Returns
    /// * `Result<RSI, AnalysisError>` - 최신 RSI 또는 데이터 부족 오류
    pub fn from_storage(&self, storage: &CandleStore<C>) -> Result<RSI, AnalysisError> {
        self.latest(&storage.closes())
    }

    /// 시간 순서의 캔들 목록에서 RSI 지표 생성
    pub fn build(&self, data: &[C]) -> Result<RSI, AnalysisError> {
        let closes: Vec<f64> = data.iter().map(|c| c.close_price()).collect();
        self.latest(&closes)
    }

    fn latest(&self, closes: &[f64]) -> Result<RSI, AnalysisError> {
        let series = compute_rsi_checked(closes, self.period)?;
        let value = last_defined(&series).ok_or(AnalysisError::InsufficientData {
            required: self.period + RSI_WARMUP_MARGIN,
            actual: closes.len(),
        })?;
        Ok(RSI::new(self.period, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OhlcvCandle;

    fn closes_from(values: &[f64]) -> Vec<OhlcvCandle> {
        values
            .iter()
            .enumerate()
            .map(|(i, &c)| OhlcvCandle::new(i as i64 * 60, c, c, c, c, 1.0))
            .collect()
    }

    #[test]
    fn test_warmup_entries_are_none() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let series = compute_rsi(&closes, 14);
        assert_eq!(series.len(), 20);
        assert!(series[..14].iter().all(|v| v.is_none()));
        assert!(series[14..].iter().all(|v| v.is_some()));
    }

    #[test]
    fn test_short_series_all_none() {
        let series = compute_rsi(&[1.0, 2.0, 3.0], 14);
        assert_eq!(series, vec![None, None, None]);
        assert!(compute_rsi(&[1.0, 2.0], 0).iter().all(|v| v.is_none()));
    }

    #[test]
    fn test_wilder_smoothing_known_values() {
        // 기간 2: 변화량 +1, -1, +2
        let series = compute_rsi(&[10.0, 11.0, 10.0, 12.0], 2);
        // 첫 평균: gain 0.5, loss 0.5 -> 50
        assert!((series[2].unwrap() - 50.0).abs() < 1e-9);
        // gain (0.5 + 2) / 2 = 1.25, loss (0.5 + 0) / 2 = 0.25 -> RS 5
        let expected = 100.0 - 100.0 / 6.0;
        assert!((series[3].unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_checked_rejects_short_series() {
        let closes = vec![1.0; 23];
        let err = compute_rsi_checked(&closes, 14).unwrap_err();
        assert_eq!(
            err,
            AnalysisError::InsufficientData {
                required: 24,
                actual: 23
            }
        );
        assert!(compute_rsi_checked(&vec![1.0; 24], 14).is_ok());
    }

    #[test]
    fn test_calculate_rsi_multi_skips_short_periods() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 - i as f64).collect();
        let result = calculate_rsi_multi(&closes, &[6, 14, 25]);
        assert_eq!(result.len(), 2);
        assert!(result[&6] < 1.0);
        assert!(!result.contains_key(&25));
    }

    #[test]
    fn test_rsi_thresholds_inclusive() {
        assert!(RSI::new(14, 30.0).is_oversold(None));
        assert!(RSI::new(14, 70.0).is_overbought(None));
        assert!(!RSI::new(14, 50.0).is_oversold(Some(30.0)));
        assert!(!RSI::new(14, 50.0).is_overbought(Some(70.0)));
    }

    #[test]
    fn test_builder_from_candles() {
        let builder = RSIBuilder::<OhlcvCandle>::new(5);
        let short = closes_from(&[1.0, 2.0, 3.0]);
        assert!(builder.build(&short).is_err());

        let values: Vec<f64> = (0..20).map(|i| 50.0 + i as f64).collect();
        let rsi = builder.build(&closes_from(&values)).unwrap();
        assert_eq!(rsi.period(), 5);
        assert!((rsi.value() - 100.0).abs() < 1e-9);

        let store = CandleStore::new(closes_from(&values), 100);
        assert_eq!(builder.from_storage(&store).unwrap(), rsi);
    }
}
