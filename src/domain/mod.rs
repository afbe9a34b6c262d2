//! Domain model: cards and rounds, chip balances, the pack catalog and the
//! payment shapes exchanged with the platform. Storage and the platform
//! itself are reached only through the traits in [`ports`].

pub mod card;
pub mod catalog;
pub mod deck;
pub mod hand;
pub mod ledger;
pub mod payment;
pub mod payout;
pub mod ports;
pub mod round;
