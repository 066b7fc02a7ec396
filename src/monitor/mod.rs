// 모니터링 모듈
// 조건 평가, 알림 쿨다운, 알림 시간 스케줄, 사이클 실행을 담당합니다.

pub mod cooldown;
pub mod evaluator;
pub mod runner;
pub mod schedule;

pub use cooldown::CooldownCache;
pub use evaluator::ConditionEvaluator;
pub use runner::{CycleReport, Monitor};
pub use schedule::{NotificationScheduler, QuietWindow, next_candle_close};
