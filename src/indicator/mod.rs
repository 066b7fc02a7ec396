// 기술적 지표 모듈
// RSI와 피벗 탐색을 제공합니다.

pub mod pivot;
pub mod rsi;

pub use pivot::find_pivots;
pub use rsi::{RSI, RSIBuilder, calculate_rsi_multi, compute_rsi, compute_rsi_checked};
