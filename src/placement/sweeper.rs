//! 주기 스윕 루프

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::info;
use tokio::time::{interval, MissedTickBehavior};

use crate::placement::lifecycle::PlacementManager;

/// 게시/자동 연장/만료 스윕을 주기적으로 실행 (백그라운드 태스크)
pub async fn run_sweep_loop(manager: Arc<PlacementManager>, period: Duration) {
    let period = period.max(Duration::from_secs(1));
    info!("🚀 게재 스윕 루프 시작 (간격: {}초)", period.as_secs());

    let mut interval_timer = interval(period);
    interval_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval_timer.tick().await;
        manager.sweep(Utc::now()).await;
    }
}
