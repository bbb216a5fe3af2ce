//! linkmarket
//!
//! 링크/아티클 게재 마켓플레이스의 결제 원장과 게재 수명주기 엔진입니다.

pub mod api;
pub mod billing;
pub mod catalog;
pub mod config;
pub mod db;
pub mod notification;
pub mod placement;
pub mod server;
