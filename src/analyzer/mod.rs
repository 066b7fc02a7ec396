// 기술적 지표 분석기 모듈
// RSI 임계값과 RSI 다이버전스를 분석합니다.

pub mod divergence;
pub mod rsi_analyzer;

pub use divergence::{
    DetectionMode, DivergenceDetector, DivergenceKind, DivergenceMode, DivergenceSignal,
};
pub use rsi_analyzer::{RSIAnalyzer, RSIAnalyzerData, RsiAlert, RsiZone};
