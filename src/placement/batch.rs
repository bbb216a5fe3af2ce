//! 일괄 연장 / 일괄 취소
//!
//! 항목마다 독립된 트랜잭션으로 처리하므로 한 항목의 실패가 다른 항목에 영향을 주지 않습니다.
//! 중단 요청은 새 항목의 처리만 멈추며, 이미 커밋된 항목은 되돌리지 않습니다.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{info, warn};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::billing::error::BillingError;
use crate::placement::lifecycle::{PlacementManager, RenewalOutcome};
use crate::placement::model::{Actor, RenewalKind};

/// 일괄 작업 중단 플래그
#[derive(Debug, Clone, Default)]
pub struct AbortFlag(Arc<AtomicBool>);

impl AbortFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// 항목별 결과
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemResult {
    pub placement_id: String,
    pub success: bool,
    /// 성공 시 환불/차감 금액
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub error: Option<String>,
}

/// 일괄 작업 결과
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    pub successful: usize,
    pub failed: usize,
    /// 중단으로 처리하지 않은 항목 수
    pub skipped: usize,
    /// 취소는 총 환불액, 연장은 총 차감액
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    pub aborted: bool,
    pub results: Vec<BatchItemResult>,
}

impl BatchOutcome {
    fn record(&mut self, placement_id: &str, result: Result<Decimal, BillingError>) {
        match result {
            Ok(amount) => {
                self.successful += 1;
                self.total_amount += amount;
                self.results.push(BatchItemResult {
                    placement_id: placement_id.to_string(),
                    success: true,
                    amount,
                    error: None,
                });
            }
            Err(e) => {
                self.failed += 1;
                self.results.push(BatchItemResult {
                    placement_id: placement_id.to_string(),
                    success: false,
                    amount: Decimal::ZERO,
                    error: Some(e.public_message()),
                });
            }
        }
    }

    fn stop(&mut self, remaining: usize) {
        self.aborted = true;
        self.skipped = remaining;
    }
}

impl PlacementManager {
    /// 일괄 취소 (항목별 환불)
    pub async fn batch_cancel(
        &self,
        actor: &Actor,
        placement_ids: &[String],
        abort: &AbortFlag,
        now: DateTime<Utc>,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();

        for (index, id) in placement_ids.iter().enumerate() {
            if abort.is_aborted() {
                outcome.stop(placement_ids.len() - index);
                warn!("일괄 취소 중단: {}건 남음", outcome.skipped);
                break;
            }

            let result = self.cancel(actor, id, now).await.map(|r| r.refunded);
            outcome.record(id, result);
        }

        info!(
            "일괄 취소: 성공 {} / 실패 {} / 미처리 {} 환불 합계 {}",
            outcome.successful, outcome.failed, outcome.skipped, outcome.total_amount
        );

        outcome
    }

    /// 일괄 연장 (항목별 차감)
    pub async fn batch_renew(
        &self,
        actor: &Actor,
        placement_ids: &[String],
        abort: &AbortFlag,
        now: DateTime<Utc>,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();

        for (index, id) in placement_ids.iter().enumerate() {
            if abort.is_aborted() {
                outcome.stop(placement_ids.len() - index);
                warn!("일괄 연장 중단: {}건 남음", outcome.skipped);
                break;
            }

            let result = match self.renew(actor, id, RenewalKind::Manual, now).await {
                Ok(RenewalOutcome::Renewed { charged, .. }) => Ok(charged),
                Ok(RenewalOutcome::NotDue) => Ok(Decimal::ZERO),
                Err(e) => Err(e),
            };
            outcome.record(id, result);
        }

        info!(
            "일괄 연장: 성공 {} / 실패 {} / 미처리 {} 차감 합계 {}",
            outcome.successful, outcome.failed, outcome.skipped, outcome.total_amount
        );

        outcome
    }
}

struct RunningBatch {
    owner_id: String,
    flag: AbortFlag,
}

/// 진행 중인 일괄 작업의 중단 플래그 저장소
#[derive(Clone, Default)]
pub struct BatchRegistry {
    running: Arc<Mutex<HashMap<String, RunningBatch>>>,
}

impl BatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 작업 등록 후 플래그 반환
    ///
    /// 같은 ID의 작업이 진행 중이면 거부합니다.
    pub async fn register(&self, batch_id: &str, owner_id: &str) -> Result<AbortFlag, BillingError> {
        let mut running = self.running.lock().await;
        if running.contains_key(batch_id) {
            return Err(BillingError::Validation(format!("이미 진행 중인 일괄 작업: {}", batch_id)));
        }

        let flag = AbortFlag::new();
        running.insert(
            batch_id.to_string(),
            RunningBatch {
                owner_id: owner_id.to_string(),
                flag: flag.clone(),
            },
        );
        Ok(flag)
    }

    /// 작업 종료 시 제거
    pub async fn finish(&self, batch_id: &str) {
        self.running.lock().await.remove(batch_id);
    }

    /// 중단 요청 (작업 소유자 또는 관리자만)
    pub async fn abort(&self, actor: &Actor, batch_id: &str) -> Result<(), BillingError> {
        let running = self.running.lock().await;
        let batch = running
            .get(batch_id)
            .ok_or_else(|| BillingError::NotFound("진행 중인 일괄 작업".to_string()))?;
        actor.authorize(&batch.owner_id)?;

        batch.flag.abort();
        info!("일괄 작업 중단 요청: batch={} owner={}", batch_id, batch.owner_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abort_flag_shared_between_clones() {
        let flag = AbortFlag::new();
        let clone = flag.clone();
        assert!(!clone.is_aborted());
        flag.abort();
        assert!(clone.is_aborted());
    }

    #[test]
    fn test_outcome_counts_items_independently() {
        let mut outcome = BatchOutcome::default();
        outcome.record("p1", Ok(Decimal::new(2500, 2)));
        outcome.record("p2", Err(BillingError::NotFound("게재".into())));
        outcome.record("p3", Ok(Decimal::new(1000, 2)));

        assert_eq!(outcome.successful, 2);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.total_amount, Decimal::new(3500, 2));
        assert_eq!(outcome.results[1].error.as_deref(), Some("게재을(를) 찾을 수 없습니다"));
    }

    fn user(id: &str) -> Actor {
        Actor::User(id.to_string())
    }

    #[tokio::test]
    async fn test_registry_abort_unknown_batch() {
        let registry = BatchRegistry::new();
        assert!(matches!(
            registry.abort(&user("u1"), "missing").await,
            Err(BillingError::NotFound(_))
        ));

        let flag = registry.register("b1", "u1").await.unwrap();
        registry.abort(&user("u1"), "b1").await.unwrap();
        assert!(flag.is_aborted());

        registry.finish("b1").await;
        assert!(matches!(
            registry.abort(&user("u1"), "b1").await,
            Err(BillingError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_registry_abort_only_by_owner_or_admin() {
        let registry = BatchRegistry::new();
        let flag = registry.register("b1", "owner").await.unwrap();

        assert!(matches!(
            registry.abort(&user("intruder"), "b1").await,
            Err(BillingError::Forbidden)
        ));
        assert!(!flag.is_aborted());

        registry.abort(&Actor::Admin("root".into()), "b1").await.unwrap();
        assert!(flag.is_aborted());
    }

    #[tokio::test]
    async fn test_registry_rejects_duplicate_running_batch() {
        let registry = BatchRegistry::new();
        let first = registry.register("shared", "u1").await.unwrap();

        assert!(matches!(
            registry.register("shared", "u2").await,
            Err(BillingError::Validation(_))
        ));

        // 첫 작업의 플래그는 그대로 유지
        registry.abort(&user("u1"), "shared").await.unwrap();
        assert!(first.is_aborted());

        registry.finish("shared").await;
        assert!(registry.register("shared", "u2").await.is_ok());
    }
}
