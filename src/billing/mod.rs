//! 결제 원장
//!
//! 잔고/거래 원장, 할인 등급, 가격 계산, 추천 보너스를 담당합니다.

pub mod discount;
pub mod error;
pub mod ledger;
pub mod model;
pub mod pricing;
pub mod referral;
pub mod service;

pub use discount::{DiscountTier, TierSchedule};
pub use error::BillingError;
pub use ledger::{LedgerReceipt, LedgerRequest, LedgerStore};
pub use model::{Account, BalanceSummary, LedgerEntry, Reconciliation, TransactionType};
pub use pricing::{PriceQuote, PricingCalculator};
pub use referral::ReferralBonusUnlocker;
pub use service::{BillingService, DepositReceipt, NewPromoCode};
