//! Application layer: orchestration of the domain rules over the ports.
//!
//! `GameTable` runs rounds per user and settles them through the
//! `PayoutResolver`; `PaymentService` reconciles Telegram Stars purchases.
//! Both share one `BalanceLedger`.

pub mod ledger;
pub mod payments;
pub mod payout;
pub mod table;
