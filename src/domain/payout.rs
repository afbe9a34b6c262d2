use super::ledger::{Amount, Balance};
use super::round::{Outcome, RoundId};
use serde::Serialize;

/// Signed balance change for a resolved round.
///
/// A natural pays 3:2, rounded down.
pub fn payout_delta(outcome: Outcome, wager: Amount) -> i64 {
    let wager = wager.signed();
    match outcome {
        Outcome::Win => wager,
        Outcome::Lose | Outcome::DealerBlackjack => -wager,
        Outcome::Push => 0,
        Outcome::PlayerBlackjack => wager.saturating_add(wager / 2),
    }
}

/// Record of a payout that has been applied to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
    pub round_id: RoundId,
    pub outcome: Outcome,
    pub wager: u64,
    pub delta: i64,
    pub balance: Balance,
}
