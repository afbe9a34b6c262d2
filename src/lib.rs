//! Blackjack mini-app backend: round play, payouts, a durable chip ledger and
//! Telegram Stars chip-pack purchases.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interfaces;
