//! 게재 수명주기
//!
//! `scheduled → placed → expired / cancelled`, `scheduled → rejected / failed`
//! 상태 머신과 연장, 자동 연장, 일괄 처리, 주기 스윕을 담당합니다.

pub mod batch;
pub mod lifecycle;
pub mod model;
pub mod publisher;
pub mod sweeper;

pub use batch::{AbortFlag, BatchOutcome, BatchRegistry};
pub use lifecycle::{PlacementManager, PurchaseOutcome, PurchaseRequest, RefundOutcome, RenewalOutcome, SweepReport};
pub use model::{Actor, Placement, PlacementStatus, PlacementType, RenewalKind};
pub use publisher::{LoggingPublisher, PublishError, PublishJob, SitePublisher};
