//! 저장소 함수 모음
//!
//! 모든 함수는 `Executor` 를 받으므로 풀(`&SqlitePool`)과
//! 진행 중인 트랜잭션(`&mut *tx`) 양쪽에서 호출할 수 있습니다.

pub mod catalog;
pub mod notifications;
pub mod placements;
pub mod promo;
pub mod tiers;
pub mod transactions;
pub mod users;
