use crate::indicator::pivot::find_pivots;
use crate::indicator::rsi::compute_rsi_checked;
use crate::model::{Candle, Timeframe};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// 즉시 다이버전스로 인정하는 최소 가격 변동률 (%)
pub const IMMEDIATE_MIN_PRICE_CHANGE_PCT: f64 = 0.5;
/// 즉시 다이버전스로 인정하는 최소 RSI 변화
pub const IMMEDIATE_MIN_RSI_CHANGE: f64 = 2.0;
/// Regular 다이버전스 최소 RSI 차이
pub const REGULAR_MIN_RSI_DELTA: f64 = 3.0;
/// Hidden 다이버전스 최소 RSI 차이
pub const HIDDEN_MIN_RSI_DELTA: f64 = 2.0;
/// 룩백 비교를 시작하는 최소 캔들 거리
pub const LOOKBACK_MIN_DISTANCE: usize = 5;

/// 다이버전스 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DivergenceKind {
    /// 가격 저점 하락, RSI 저점 상승
    RegularBullish,
    /// 가격 고점 상승, RSI 고점 하락
    RegularBearish,
    /// 가격 저점 상승, RSI 저점 하락
    HiddenBullish,
    /// 가격 고점 하락, RSI 고점 상승
    HiddenBearish,
}

impl DivergenceKind {
    pub fn label(&self) -> &'static str {
        match self {
            DivergenceKind::RegularBullish => "Regular Bullish",
            DivergenceKind::RegularBearish => "Regular Bearish",
            DivergenceKind::HiddenBullish => "Hidden Bullish",
            DivergenceKind::HiddenBearish => "Hidden Bearish",
        }
    }

    /// 쿨다운 키에 사용하는 태그
    pub fn tag(&self) -> &'static str {
        match self {
            DivergenceKind::RegularBullish => "regular_bullish",
            DivergenceKind::RegularBearish => "regular_bearish",
            DivergenceKind::HiddenBullish => "hidden_bullish",
            DivergenceKind::HiddenBearish => "hidden_bearish",
        }
    }

    pub fn is_hidden(&self) -> bool {
        matches!(
            self,
            DivergenceKind::HiddenBullish | DivergenceKind::HiddenBearish
        )
    }

    pub fn is_bullish(&self) -> bool {
        matches!(
            self,
            DivergenceKind::RegularBullish | DivergenceKind::HiddenBullish
        )
    }

    fn emoji(&self) -> &'static str {
        match self {
            DivergenceKind::RegularBullish | DivergenceKind::HiddenBullish => "🟢",
            DivergenceKind::RegularBearish => "🔴",
            DivergenceKind::HiddenBearish => "🟠",
        }
    }
}

impl Display for DivergenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// 다이버전스를 찾아낸 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetectionMode {
    /// 직전 캔들과 비교
    Immediate,
    /// 최근 N개 캔들과 비교
    Lookback,
    /// 피벗 간 비교
    Pivot,
}

impl DetectionMode {
    pub fn tag(&self) -> &'static str {
        match self {
            DetectionMode::Immediate => "immediate",
            DetectionMode::Lookback => "lookback",
            DetectionMode::Pivot => "pivot",
        }
    }
}

/// 설정에서 선택하는 탐지 전략
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DivergenceMode {
    /// 즉시 + 룩백
    #[default]
    Combined,
    /// 피벗 기반 (최근 피벗만)
    Pivot,
}

/// 탐지된 다이버전스 신호
#[derive(Debug, Clone, PartialEq)]
pub struct DivergenceSignal {
    pub kind: DivergenceKind,
    pub mode: DetectionMode,
    pub timeframe: Timeframe,
    /// 나중 비교 지점 캔들의 시각
    pub timestamp: DateTime<Utc>,
    /// (이전, 이후) 가격
    pub price_pair: (f64, f64),
    /// (이전, 이후) RSI
    pub rsi_pair: (f64, f64),
    /// 두 비교 지점 사이의 캔들 수
    pub bars_apart: usize,
}

impl DivergenceSignal {
    /// 이전 지점 대비 가격 변동률 (%)
    pub fn price_change_percent(&self) -> f64 {
        let (earlier, later) = self.price_pair;
        if earlier == 0.0 {
            return 0.0;
        }
        (later - earlier) / earlier * 100.0
    }

    /// 이전 지점 대비 RSI 변화
    pub fn rsi_change(&self) -> f64 {
        self.rsi_pair.1 - self.rsi_pair.0
    }

    /// 쿨다운 세부 키 (`{timeframe}_{mode}_{kind}`)
    pub fn qualifier(&self) -> String {
        format!(
            "{}_{}_{}",
            self.timeframe,
            self.mode.tag(),
            self.kind.tag()
        )
    }

    /// 알림 문구 생성
    ///
    /// # Arguments
    /// * `tz` - 시각 표시에 사용할 시간대
    pub fn message<Tz: TimeZone>(&self, tz: &Tz) -> String
    where
        Tz::Offset: Display,
    {
        let time = self
            .timestamp
            .with_timezone(tz)
            .format("%Y-%m-%d %H:%M");
        let pct = self.price_change_percent();
        let rsi = self.rsi_change();

        match self.mode {
            DetectionMode::Immediate => {
                let direction = if self.kind.is_bullish() {
                    "Bullish"
                } else {
                    "Bearish"
                };
                let body = if self.kind.is_bullish() {
                    format!("가격: {:.2}% ↓, RSI: +{:.1} ↑", pct, rsi)
                } else {
                    format!("가격: +{:.2}% ↑, RSI: {:.1} ↓", pct, rsi)
                };
                format!(
                    "{} 즉시 {} Divergence ({}) - {}\n{}",
                    self.kind.emoji(),
                    direction,
                    self.timeframe,
                    time,
                    body
                )
            }
            DetectionMode::Lookback => {
                let body = if pct < 0.0 {
                    format!("가격: {:.2}% 하락, RSI: +{:.1} 상승", pct, rsi)
                } else {
                    format!("가격: +{:.2}% 상승, RSI: -{:.1} 하락", pct, -rsi)
                };
                format!(
                    "{} {} Divergence ({}) - {}\n{} (최근 {}캔들 비교)",
                    self.kind.emoji(),
                    self.kind.label(),
                    self.timeframe,
                    time,
                    body,
                    self.bars_apart
                )
            }
            DetectionMode::Pivot => format!(
                "{} {} Divergence ({}) - {}\n가격: {:.4} → {:.4}, RSI: {:.1} → {:.1} ({}캔들 간격)",
                self.kind.emoji(),
                self.kind.label(),
                self.timeframe,
                time,
                self.price_pair.0,
                self.price_pair.1,
                self.rsi_pair.0,
                self.rsi_pair.1,
                self.bars_apart
            ),
        }
    }
}

/// 두 관측 지점 사이의 Regular 다이버전스 판정
///
/// 가격이 엄격하게 내리고 RSI가 `min_rsi_delta` 이상 오르면 Bullish,
/// 반대면 Bearish입니다.
///
/// # Arguments
/// * `earlier` - (가격, RSI) 이전 지점
/// * `later` - (가격, RSI) 이후 지점
/// * `min_rsi_delta` - 최소 RSI 차이
pub fn detect_regular_divergence(
    earlier: (f64, f64),
    later: (f64, f64),
    min_rsi_delta: f64,
) -> Option<DivergenceKind> {
    let (past_price, past_rsi) = earlier;
    let (price, rsi) = later;

    if price < past_price && rsi > past_rsi {
        if rsi - past_rsi >= min_rsi_delta {
            return Some(DivergenceKind::RegularBullish);
        }
    } else if price > past_price && rsi < past_rsi && past_rsi - rsi >= min_rsi_delta {
        return Some(DivergenceKind::RegularBearish);
    }
    None
}

/// 두 관측 지점 사이의 Hidden 다이버전스 판정
///
/// 가격이 오르고 RSI가 내리면 Bullish (상승 추세 지속), 반대면 Bearish입니다.
pub fn detect_hidden_divergence(
    earlier: (f64, f64),
    later: (f64, f64),
    min_rsi_delta: f64,
) -> Option<DivergenceKind> {
    let (past_price, past_rsi) = earlier;
    let (price, rsi) = later;

    if price > past_price && rsi < past_rsi {
        if past_rsi - rsi >= min_rsi_delta {
            return Some(DivergenceKind::HiddenBullish);
        }
    } else if price < past_price && rsi > past_rsi && rsi - past_rsi >= min_rsi_delta {
        return Some(DivergenceKind::HiddenBearish);
    }
    None
}

/// 피벗 저점 쌍 분류 (가격 저점, RSI 저점)
fn classify_lows(price: (f64, f64), rsi: (f64, f64)) -> Option<DivergenceKind> {
    if price.1 < price.0 && rsi.1 > rsi.0 {
        Some(DivergenceKind::RegularBullish)
    } else if price.1 > price.0 && rsi.1 < rsi.0 {
        Some(DivergenceKind::HiddenBullish)
    } else {
        None
    }
}

/// 피벗 고점 쌍 분류 (가격 고점, RSI 고점)
fn classify_highs(price: (f64, f64), rsi: (f64, f64)) -> Option<DivergenceKind> {
    if price.1 > price.0 && rsi.1 < rsi.0 {
        Some(DivergenceKind::RegularBearish)
    } else if price.1 < price.0 && rsi.1 > rsi.0 {
        Some(DivergenceKind::HiddenBearish)
    } else {
        None
    }
}

/// RSI 다이버전스 탐지기
///
/// 모든 메서드는 시간 순서(오래된 것부터)의 캔들을 받습니다.
/// 데이터가 `rsi_period + 10`개보다 짧으면 오류 대신 빈 결과를 돌려줍니다.
/// Hidden 신호도 항상 계산하며, 제외 여부는 호출 측이 결정합니다.
#[derive(Debug, Clone)]
pub struct DivergenceDetector {
    pub rsi_period: usize,
    /// 피벗 왼쪽 비교 폭
    pub left_bars: usize,
    /// 피벗 오른쪽 비교 폭
    pub right_bars: usize,
    /// 두 피벗 사이 허용 거리 [min, max]
    pub lookback_range: (usize, usize),
    /// 최근 피벗만 사용할 때의 끝에서부터 최대 거리
    pub recent_bars_only: Option<usize>,
    /// 룩백 모드 검사 깊이
    pub lookback_periods: usize,
}

impl Default for DivergenceDetector {
    fn default() -> Self {
        DivergenceDetector {
            rsi_period: 14,
            left_bars: 5,
            right_bars: 5,
            lookback_range: (5, 60),
            recent_bars_only: None,
            lookback_periods: 15,
        }
    }
}

impl DivergenceDetector {
    /// 설정된 전략으로 탐지
    pub fn detect<C: Candle>(
        &self,
        candles: &[C],
        timeframe: Timeframe,
        mode: DivergenceMode,
    ) -> Vec<DivergenceSignal> {
        match mode {
            DivergenceMode::Combined => {
                let mut signals = self.detect_immediate(candles, timeframe);
                signals.extend(self.detect_lookback(candles, timeframe));
                signals
            }
            DivergenceMode::Pivot => self.detect_pivot(candles, timeframe),
        }
    }

    /// RSI가 정의된 구간의 (캔들 인덱스, 종가, RSI) 목록
    fn rsi_points<C: Candle>(&self, candles: &[C]) -> Option<Vec<(usize, f64, f64)>> {
        let closes: Vec<f64> = candles.iter().map(|c| c.close_price()).collect();
        match compute_rsi_checked(&closes, self.rsi_period) {
            Ok(series) => Some(
                series
                    .iter()
                    .enumerate()
                    .filter_map(|(i, v)| v.map(|rsi| (i, closes[i], rsi)))
                    .collect(),
            ),
            Err(e) => {
                log::debug!("다이버전스 분석 생략: {}", e);
                None
            }
        }
    }

    fn signal<C: Candle>(
        &self,
        candles: &[C],
        kind: DivergenceKind,
        mode: DetectionMode,
        timeframe: Timeframe,
        earlier: (usize, f64, f64),
        later: (usize, f64, f64),
    ) -> DivergenceSignal {
        DivergenceSignal {
            kind,
            mode,
            timeframe,
            timestamp: candles[later.0].datetime(),
            price_pair: (earlier.1, later.1),
            rsi_pair: (earlier.2, later.2),
            bars_apart: later.0 - earlier.0,
        }
    }

    /// 직전 캔들과 현재 캔들의 종가/RSI 비교
    ///
    /// 가격이 0.5% 이상 내리고 RSI가 2 이상 오르면 Bullish, 반대면 Bearish입니다.
    pub fn detect_immediate<C: Candle>(
        &self,
        candles: &[C],
        timeframe: Timeframe,
    ) -> Vec<DivergenceSignal> {
        let points = match self.rsi_points(candles) {
            Some(points) if points.len() >= 2 => points,
            _ => return vec![],
        };

        let prev = points[points.len() - 2];
        let cur = points[points.len() - 1];
        if prev.1 == 0.0 {
            return vec![];
        }

        let price_change_pct = (cur.1 - prev.1) / prev.1 * 100.0;
        let rsi_change = cur.2 - prev.2;

        if price_change_pct.abs() < IMMEDIATE_MIN_PRICE_CHANGE_PCT
            || rsi_change.abs() < IMMEDIATE_MIN_RSI_CHANGE
        {
            return vec![];
        }

        let kind = if price_change_pct < 0.0 && rsi_change > 0.0 {
            DivergenceKind::RegularBullish
        } else if price_change_pct > 0.0 && rsi_change < 0.0 {
            DivergenceKind::RegularBearish
        } else {
            return vec![];
        };

        log::info!(
            "즉시 다이버전스 ({}): {} 가격 {:.2}%, RSI {:+.1}",
            timeframe,
            kind,
            price_change_pct,
            rsi_change
        );
        vec![self.signal(candles, kind, DetectionMode::Immediate, timeframe, prev, cur)]
    }

    /// 현재 캔들을 최근 `lookback_periods`개 캔들과 비교
    ///
    /// 가장 가까운 과거부터 검사해 처음 찾은 Regular 신호 하나만 반환합니다.
    /// Regular 신호가 없을 때만 Hidden 신호를 찾습니다.
    pub fn detect_lookback<C: Candle>(
        &self,
        candles: &[C],
        timeframe: Timeframe,
    ) -> Vec<DivergenceSignal> {
        let points = match self.rsi_points(candles) {
            Some(points) if points.len() >= 2 => points,
            _ => return vec![],
        };

        let n = points.len();
        let cur = points[n - 1];
        let depth = self.lookback_periods.min(n - 1);

        for i in LOOKBACK_MIN_DISTANCE..depth {
            let past = points[n - 1 - i];
            if let Some(kind) =
                detect_regular_divergence((past.1, past.2), (cur.1, cur.2), REGULAR_MIN_RSI_DELTA)
            {
                log::info!("룩백 다이버전스 ({}): {} ({}캔들 전 비교)", timeframe, kind, i);
                return vec![self.signal(candles, kind, DetectionMode::Lookback, timeframe, past, cur)];
            }
        }

        for i in LOOKBACK_MIN_DISTANCE..depth {
            let past = points[n - 1 - i];
            if let Some(kind) =
                detect_hidden_divergence((past.1, past.2), (cur.1, cur.2), HIDDEN_MIN_RSI_DELTA)
            {
                log::info!("룩백 다이버전스 ({}): {} ({}캔들 전 비교)", timeframe, kind, i);
                return vec![self.signal(candles, kind, DetectionMode::Lookback, timeframe, past, cur)];
            }
        }

        log::debug!("룩백 다이버전스 없음 ({})", timeframe);
        vec![]
    }

    /// 가격 피벗과 RSI 피벗 비교
    ///
    /// 저점은 캔들 저가, 고점은 캔들 고가로 피벗을 찾습니다.
    /// 최근 두 피벗의 간격이 `lookback_range` 안에 있고 가격 피벗과 RSI 피벗이
    /// `right_bars` 이내로 맞물릴 때만 분류합니다.
    pub fn detect_pivot<C: Candle>(
        &self,
        candles: &[C],
        timeframe: Timeframe,
    ) -> Vec<DivergenceSignal> {
        let points = match self.rsi_points(candles) {
            Some(points) if !points.is_empty() => points,
            _ => return vec![],
        };

        // RSI가 정의된 구간은 캔들 인덱스 offset부터 연속됨
        let offset = points[0].0;
        let rsi_values: Vec<f64> = points.iter().map(|p| p.2).collect();
        let (rsi_lows, rsi_highs) = find_pivots(&rsi_values, self.left_bars, self.right_bars);
        let rsi_lows: Vec<usize> = rsi_lows.into_iter().map(|i| i + offset).collect();
        let rsi_highs: Vec<usize> = rsi_highs.into_iter().map(|i| i + offset).collect();

        let lows: Vec<f64> = candles.iter().map(|c| c.low_price()).collect();
        let highs: Vec<f64> = candles.iter().map(|c| c.high_price()).collect();
        let (price_lows, _) = find_pivots(&lows, self.left_bars, self.right_bars);
        let (_, price_highs) = find_pivots(&highs, self.left_bars, self.right_bars);

        let rsi_at = |idx: usize| rsi_values[idx - offset];
        let mut signals = Vec::new();

        if let Some((p1, p2, r1, r2)) = self.pair_pivots(&price_lows, &rsi_lows, candles.len()) {
            let price = (lows[p1], lows[p2]);
            let rsi = (rsi_at(r1), rsi_at(r2));
            if let Some(kind) = classify_lows(price, rsi) {
                signals.push(self.signal(
                    candles,
                    kind,
                    DetectionMode::Pivot,
                    timeframe,
                    (p1, price.0, rsi.0),
                    (p2, price.1, rsi.1),
                ));
            }
        }

        if let Some((p1, p2, r1, r2)) = self.pair_pivots(&price_highs, &rsi_highs, candles.len()) {
            let price = (highs[p1], highs[p2]);
            let rsi = (rsi_at(r1), rsi_at(r2));
            if let Some(kind) = classify_highs(price, rsi) {
                signals.push(self.signal(
                    candles,
                    kind,
                    DetectionMode::Pivot,
                    timeframe,
                    (p1, price.0, rsi.0),
                    (p2, price.1, rsi.1),
                ));
            }
        }

        if !signals.is_empty() {
            log::info!("피벗 다이버전스 ({}): {}개", timeframe, signals.len());
        }
        signals
    }

    /// 가격/RSI 각각의 최근 두 피벗을 골라 조건을 확인
    ///
    /// # Returns
    /// * `Option<(usize, usize, usize, usize)>` - (가격 이전, 가격 최근, RSI 이전, RSI 최근) 캔들 인덱스
    fn pair_pivots(
        &self,
        price_pivots: &[usize],
        rsi_pivots: &[usize],
        len: usize,
    ) -> Option<(usize, usize, usize, usize)> {
        if price_pivots.len() < 2 || rsi_pivots.len() < 2 {
            return None;
        }

        let p2 = price_pivots[price_pivots.len() - 1];
        let p1 = price_pivots[price_pivots.len() - 2];
        let r2 = rsi_pivots[rsi_pivots.len() - 1];
        let r1 = rsi_pivots[rsi_pivots.len() - 2];

        let (min_range, max_range) = self.lookback_range;
        let in_range = |d: usize| d >= min_range && d <= max_range;
        if !in_range(p2 - p1) || !in_range(r2 - r1) {
            return None;
        }

        if p2.abs_diff(r2) > self.right_bars || p1.abs_diff(r1) > self.right_bars {
            return None;
        }

        if let Some(recent) = self.recent_bars_only {
            let latest = p2.max(r2);
            if len - 1 - latest > recent {
                log::trace!("최근 피벗 아님: 끝에서 {}캔들", len - 1 - latest);
                return None;
            }
        }

        Some((p1, p2, r1, r2))
    }
}
