use super::ledger::BalanceLedger;
use crate::domain::ledger::UserId;
use crate::domain::payout::{Settlement, payout_delta};
use crate::domain::round::{Round, RoundId, RoundState};
use crate::error::{BlackjackError, Result};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::info;

/// Applies round payouts to the ledger, at most once per round.
///
/// The guard is keyed by round identity: a push settles with a zero delta and
/// would otherwise look the same as a round that was never settled. Ids are
/// held only while the round is live; the owner calls [`retire`] once the
/// round is discarded.
///
/// [`retire`]: PayoutResolver::retire
pub struct PayoutResolver {
    ledger: Arc<BalanceLedger>,
    settled: Mutex<HashSet<RoundId>>,
}

impl PayoutResolver {
    pub fn new(ledger: Arc<BalanceLedger>) -> Self {
        Self {
            ledger,
            settled: Mutex::new(HashSet::new()),
        }
    }

    pub fn is_settled(&self, round: RoundId) -> bool {
        self.settled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&round)
    }

    /// Number of round ids currently guarded.
    pub fn tracked_rounds(&self) -> usize {
        self.settled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Forgets a round that no longer exists anywhere it could be settled from.
    pub fn retire(&self, round: RoundId) {
        self.release(round);
    }

    /// Settles a finished round using the wager captured at deal time.
    pub async fn settle(&self, user: &UserId, round: &Round) -> Result<Settlement> {
        let outcome = match (round.state(), round.outcome()) {
            (RoundState::RoundEnd, Some(outcome)) => outcome,
            (state, _) => {
                return Err(BlackjackError::IllegalAction {
                    action: "settle",
                    state,
                });
            }
        };

        if !self.claim(round.id()) {
            return Err(BlackjackError::AlreadySettled(round.id()));
        }

        let delta = payout_delta(outcome, round.wager());
        let balance = match self.ledger.adjust(user, delta).await {
            Ok(balance) => balance,
            Err(e) => {
                self.release(round.id());
                return Err(e);
            }
        };

        info!(user = %user, round = %round.id(), ?outcome, delta, "Round settled");
        Ok(Settlement {
            round_id: round.id(),
            outcome,
            wager: round.wager().value(),
            delta,
            balance,
        })
    }

    fn claim(&self, round: RoundId) -> bool {
        self.settled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(round)
    }

    fn release(&self, round: RoundId) {
        self.settled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&round);
    }
}
