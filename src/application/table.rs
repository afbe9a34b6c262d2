use super::ledger::BalanceLedger;
use super::payout::PayoutResolver;
use crate::domain::card::Card;
use crate::domain::deck::{Deck, DeckSourceBox};
use crate::domain::hand::hand_value;
use crate::domain::ledger::{Amount, Balance, UserId};
use crate::domain::payout::Settlement;
use crate::domain::round::{Outcome, Round, RoundId, RoundState};
use crate::error::{BlackjackError, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info};

/// How the dealer turn is staged after a stand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DealerReveal {
    /// Dealer draws inside the stand call.
    Immediate,
    /// Stand returns in `DealerTurn`; a background task draws after the delay.
    Delayed(Duration),
}

impl DealerReveal {
    pub fn from_millis(ms: u64) -> Self {
        if ms == 0 {
            DealerReveal::Immediate
        } else {
            DealerReveal::Delayed(Duration::from_millis(ms))
        }
    }
}

/// What is left of a settled round until the next deal or reset.
#[derive(Debug, Clone)]
struct RoundSummary {
    player: Vec<Card>,
    dealer: Vec<Card>,
    settlement: Settlement,
}

impl RoundSummary {
    fn new(round: Round, settlement: Settlement) -> Self {
        Self {
            player: round.player().cards().to_vec(),
            dealer: round.dealer().cards().to_vec(),
            settlement,
        }
    }
}

#[derive(Debug, Default)]
struct Seat {
    round: Option<Round>,
    last: Option<RoundSummary>,
}

/// Read-only projection of a seat for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundView {
    pub state: RoundState,
    pub round_id: Option<RoundId>,
    pub wager: Option<u64>,
    pub player_cards: Vec<Card>,
    pub player_total: u32,
    pub dealer_cards: Vec<Card>,
    pub dealer_hidden_cards: usize,
    pub dealer_total: u32,
    pub outcome: Option<Outcome>,
    pub settlement: Option<Settlement>,
    pub balance: Balance,
}

impl RoundView {
    fn idle(balance: Balance) -> Self {
        Self {
            state: RoundState::Idle,
            round_id: None,
            wager: None,
            player_cards: Vec::new(),
            player_total: 0,
            dealer_cards: Vec::new(),
            dealer_hidden_cards: 0,
            dealer_total: 0,
            outcome: None,
            settlement: None,
            balance,
        }
    }

    fn from_seat(seat: &Seat, balance: Balance) -> Self {
        if let Some(round) = &seat.round {
            let dealer = round.dealer().cards();
            // The hole card stays face down until the player is done.
            let visible = if round.state() == RoundState::PlayerTurn {
                &dealer[..dealer.len().min(1)]
            } else {
                dealer
            };
            return Self {
                state: round.state(),
                round_id: Some(round.id()),
                wager: Some(round.wager().value()),
                player_cards: round.player().cards().to_vec(),
                player_total: round.player().value(),
                dealer_cards: visible.to_vec(),
                dealer_hidden_cards: dealer.len() - visible.len(),
                dealer_total: hand_value(visible),
                outcome: round.outcome(),
                settlement: None,
                balance,
            };
        }

        match &seat.last {
            Some(last) => Self {
                state: RoundState::Idle,
                round_id: Some(last.settlement.round_id),
                wager: Some(last.settlement.wager),
                player_total: hand_value(&last.player),
                player_cards: last.player.clone(),
                dealer_total: hand_value(&last.dealer),
                dealer_cards: last.dealer.clone(),
                dealer_hidden_cards: 0,
                outcome: Some(last.settlement.outcome),
                settlement: Some(last.settlement),
                balance,
            },
            None => Self::idle(balance),
        }
    }
}

/// The round control surface: one seat per user, one live round per seat.
///
/// Commands on a seat are single-flight. A command arriving while another is
/// still applying its effect fails with `RoundBusy` instead of queueing, so a
/// repeated hit can never draw twice.
pub struct GameTable {
    ledger: Arc<BalanceLedger>,
    resolver: PayoutResolver,
    decks: StdMutex<DeckSourceBox>,
    seats: StdMutex<HashMap<UserId, Arc<Mutex<Seat>>>>,
    next_round: AtomicU64,
    reveal: DealerReveal,
}

impl GameTable {
    pub fn new(ledger: Arc<BalanceLedger>, decks: DeckSourceBox, reveal: DealerReveal) -> Self {
        Self {
            resolver: PayoutResolver::new(ledger.clone()),
            ledger,
            decks: StdMutex::new(decks),
            seats: StdMutex::new(HashMap::new()),
            next_round: AtomicU64::new(1),
            reveal,
        }
    }

    pub fn ledger(&self) -> &Arc<BalanceLedger> {
        &self.ledger
    }

    fn seat(&self, user: &UserId) -> Arc<Mutex<Seat>> {
        let mut seats = self.seats.lock().unwrap_or_else(PoisonError::into_inner);
        seats.entry(user.clone()).or_default().clone()
    }

    fn existing_seat(&self, user: &UserId) -> Option<Arc<Mutex<Seat>>> {
        self.seats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user)
            .cloned()
    }

    /// Drops a seat with neither a round nor a summary from the table.
    fn evict_if_empty(&self, user: &UserId, seat: &OwnedMutexGuard<Seat>) {
        if seat.round.is_some() || seat.last.is_some() {
            return;
        }
        let mut seats = self.seats.lock().unwrap_or_else(PoisonError::into_inner);
        if seats
            .get(user)
            .is_some_and(|held| Arc::ptr_eq(held, OwnedMutexGuard::mutex(seat)))
        {
            seats.remove(user);
        }
    }

    /// Seats currently held, for tests and diagnostics.
    pub fn seat_count(&self) -> usize {
        self.seats.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Round ids still guarded by the payout resolver.
    pub fn tracked_rounds(&self) -> usize {
        self.resolver.tracked_rounds()
    }

    fn claim_seat(&self, user: &UserId) -> Result<OwnedMutexGuard<Seat>> {
        self.seat(user)
            .try_lock_owned()
            .map_err(|_| BlackjackError::RoundBusy)
    }

    fn fresh_deck(&self) -> Deck {
        self.decks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .fresh_deck()
    }

    /// Opens a round for `user`, staking `wager`.
    ///
    /// # Arguments
    ///
    /// * `user` - The seat to deal at. Created on first use.
    /// * `wager` - Chips at stake; must not exceed the current balance.
    ///
    /// A natural on either side ends the round at once, and the returned view
    /// already carries the settlement.
    pub async fn deal(&self, user: &UserId, wager: Amount) -> Result<RoundView> {
        let mut seat = self.claim_seat(user)?;
        if let Some(round) = &seat.round {
            return Err(BlackjackError::IllegalAction {
                action: "deal",
                state: round.state(),
            });
        }

        let round = match self.open_round(user, wager).await {
            Ok(round) => round,
            Err(e) => {
                self.evict_if_empty(user, &seat);
                return Err(e);
            }
        };
        let id = round.id();
        info!(user = %user, round = %id, wager = wager.value(), state = %round.state(), "Round dealt");

        seat.last = None;
        seat.round = Some(round);
        self.settle_if_ended(user, &mut seat).await?;
        self.project(user, &seat).await
    }

    async fn open_round(&self, user: &UserId, wager: Amount) -> Result<Round> {
        let balance = self.ledger.get_balance(user).await?;
        let id = RoundId(self.next_round.fetch_add(1, Ordering::Relaxed));
        Round::deal(id, wager, balance, self.fresh_deck())
    }

    /// Draws one card for the player. A bust settles the round.
    pub async fn hit(&self, user: &UserId) -> Result<RoundView> {
        let mut seat = self.claim_seat(user)?;
        let round = seat.round.as_mut().ok_or(BlackjackError::IllegalAction {
            action: "hit",
            state: RoundState::Idle,
        })?;

        let card = round.hit()?;
        debug!(user = %user, round = %round.id(), %card, total = round.player().value(), "Player hit");

        self.settle_if_ended(user, &mut seat).await?;
        self.project(user, &seat).await
    }

    /// Ends the player turn. With a delayed reveal the returned view is still
    /// in `DealerTurn`; the round resolves once the delay has elapsed.
    pub async fn stand(self: &Arc<Self>, user: &UserId) -> Result<RoundView> {
        let mut seat = self.claim_seat(user)?;
        let round = seat.round.as_mut().ok_or(BlackjackError::IllegalAction {
            action: "stand",
            state: RoundState::Idle,
        })?;
        round.stand()?;
        let id = round.id();
        debug!(user = %user, round = %id, "Player stands");

        match self.reveal {
            DealerReveal::Immediate => {
                self.finish_dealer_turn(user, &mut seat, id).await?;
            }
            DealerReveal::Delayed(delay) => {
                let table = Arc::clone(self);
                let user = user.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let mut seat = table.seat(&user).lock_owned().await;
                    if let Err(e) = table.finish_dealer_turn(&user, &mut seat, id).await {
                        error!(user = %user, round = %id, error = %e, "Dealer reveal failed");
                    }
                });
            }
        }
        self.project(user, &seat).await
    }

    async fn finish_dealer_turn(&self, user: &UserId, seat: &mut Seat, id: RoundId) -> Result<()> {
        let Some(round) = seat.round.as_mut() else {
            return Ok(());
        };
        if round.id() != id || round.state() != RoundState::DealerTurn {
            return Ok(());
        }

        let outcome = round.play_dealer()?;
        info!(
            user = %user,
            round = %id,
            ?outcome,
            player = round.player().value(),
            dealer = round.dealer().value(),
            "Dealer turn finished"
        );
        self.settle_if_ended(user, seat).await?;
        Ok(())
    }

    /// Returns the seat to idle, abandoning any round in play.
    ///
    /// A finished round is settled first. Abandoning during the player turn
    /// forfeits the wager, so a bad hand cannot be walked away from for free.
    /// A pending dealer reveal cannot be cancelled, so reset is refused until
    /// it lands.
    pub async fn reset(&self, user: &UserId) -> Result<RoundView> {
        let mut seat = self.claim_seat(user)?;
        match seat.round.as_ref().map(|round| (round.state(), round.id(), round.wager())) {
            Some((RoundState::DealerTurn, ..)) => return Err(BlackjackError::RoundBusy),
            Some((RoundState::RoundEnd, ..)) => {
                self.settle_if_ended(user, &mut seat).await?;
            }
            Some((state, id, wager)) => {
                let balance = self.ledger.debit(user, wager).await?;
                info!(
                    user = %user,
                    round = %id,
                    %state,
                    forfeited = wager.value(),
                    balance = balance.value(),
                    "Round abandoned"
                );
            }
            None => {}
        }

        if let Some(round) = seat.round.take() {
            self.resolver.retire(round.id());
        }
        seat.last = None;
        let view = self.project(user, &seat).await;
        self.evict_if_empty(user, &seat);
        view
    }

    /// Retries settlement of a finished round whose automatic settlement failed.
    pub async fn settle(&self, user: &UserId) -> Result<Settlement> {
        let mut seat = self.claim_seat(user)?;
        match (&seat.round, &seat.last) {
            (Some(round), _) if round.state() != RoundState::RoundEnd => {
                return Err(BlackjackError::IllegalAction {
                    action: "settle",
                    state: round.state(),
                });
            }
            (None, Some(last)) => {
                return Err(BlackjackError::AlreadySettled(last.settlement.round_id));
            }
            (None, None) => {
                return Err(BlackjackError::IllegalAction {
                    action: "settle",
                    state: RoundState::Idle,
                });
            }
            _ => {}
        }

        self.settle_if_ended(user, &mut seat)
            .await?
            .ok_or(BlackjackError::IllegalAction {
                action: "settle",
                state: RoundState::Idle,
            })
    }

    /// Current projection of the seat. Users without a seat read as idle.
    pub async fn view(&self, user: &UserId) -> Result<RoundView> {
        match self.existing_seat(user) {
            Some(seat) => {
                let seat = seat.lock().await;
                self.project(user, &seat).await
            }
            None => Ok(RoundView::idle(self.ledger.get_balance(user).await?)),
        }
    }

    async fn settle_if_ended(&self, user: &UserId, seat: &mut Seat) -> Result<Option<Settlement>> {
        let Some(round) = seat.round.as_ref() else {
            return Ok(None);
        };
        if round.state() != RoundState::RoundEnd {
            return Ok(None);
        }

        let settlement = self.resolver.settle(user, round).await?;
        if let Some(round) = seat.round.take() {
            self.resolver.retire(round.id());
            seat.last = Some(RoundSummary::new(round, settlement));
        }
        Ok(Some(settlement))
    }

    async fn project(&self, user: &UserId, seat: &Seat) -> Result<RoundView> {
        let balance = self.ledger.get_balance(user).await?;
        Ok(RoundView::from_seat(seat, balance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::card::{Rank, Suit};
    use crate::domain::deck::StackedDecks;
    use crate::infrastructure::in_memory::InMemoryLedgerStore;

    /// Stacks a deck from ranks alone, rotating suits so cards stay distinct.
    fn stacked(ranks: &[Rank]) -> Deck {
        let top: Vec<Card> = ranks
            .iter()
            .enumerate()
            .map(|(i, rank)| Card::new(*rank, Suit::ALL[i % Suit::ALL.len()]))
            .collect();
        Deck::stacked(&top).unwrap()
    }

    fn table(decks: Vec<Deck>, reveal: DealerReveal) -> Arc<GameTable> {
        let ledger = Arc::new(BalanceLedger::new(Box::new(InMemoryLedgerStore::new())));
        Arc::new(GameTable::new(
            ledger,
            Box::new(StackedDecks::new(decks)),
            reveal,
        ))
    }

    fn user() -> UserId {
        UserId::parse("42").unwrap()
    }

    #[tokio::test]
    async fn test_hole_card_hidden_during_player_turn() {
        let table = table(
            vec![stacked(&[Rank::Ten, Rank::Six, Rank::Nine, Rank::Seven])],
            DealerReveal::Immediate,
        );
        let view = table.deal(&user(), Amount::new(10).unwrap()).await.unwrap();

        assert_eq!(view.state, RoundState::PlayerTurn);
        assert_eq!(view.dealer_cards.len(), 1);
        assert_eq!(view.dealer_hidden_cards, 1);
        assert_eq!(view.dealer_total, 9);
        assert_eq!(view.player_total, 16);
    }

    #[tokio::test]
    async fn test_stand_settles_and_keeps_summary() {
        let table = table(
            vec![stacked(&[Rank::King, Rank::Queen, Rank::Ten, Rank::Nine])],
            DealerReveal::Immediate,
        );
        table.deal(&user(), Amount::new(100).unwrap()).await.unwrap();
        let view = table.stand(&user()).await.unwrap();

        assert_eq!(view.state, RoundState::Idle);
        assert_eq!(view.outcome, Some(Outcome::Win));
        assert_eq!(view.balance, Balance::new(1_100));
        assert_eq!(view.dealer_cards.len(), 2);

        let settle = table.settle(&user()).await;
        assert!(matches!(settle, Err(BlackjackError::AlreadySettled(_))));
    }

    #[tokio::test]
    async fn test_actions_out_of_turn_are_rejected() {
        let table = table(vec![], DealerReveal::Immediate);
        assert!(matches!(
            table.hit(&user()).await,
            Err(BlackjackError::IllegalAction { action: "hit", .. })
        ));
        assert!(matches!(
            table.stand(&user()).await,
            Err(BlackjackError::IllegalAction { action: "stand", .. })
        ));
    }

    #[tokio::test]
    async fn test_reset_clears_summary() {
        let table = table(
            vec![stacked(&[Rank::Two, Rank::Three, Rank::Four, Rank::Five])],
            DealerReveal::Immediate,
        );
        table.deal(&user(), Amount::new(10).unwrap()).await.unwrap();
        let view = table.reset(&user()).await.unwrap();

        assert_eq!(view, RoundView::idle(Balance::new(990)));
    }

    #[tokio::test]
    async fn test_busy_seat_rejects_commands() {
        let table = table(vec![], DealerReveal::Immediate);
        let seat = table.seat(&user());
        let _held = seat.lock().await;

        assert!(matches!(
            table.deal(&user(), Amount::new(10).unwrap()).await,
            Err(BlackjackError::RoundBusy)
        ));
    }

    #[tokio::test]
    async fn test_reset_releases_guard_and_seat() {
        let decks = (0..50)
            .map(|_| stacked(&[Rank::King, Rank::Queen, Rank::Ten, Rank::Nine]))
            .collect();
        let table = table(decks, DealerReveal::Immediate);

        for i in 0..50 {
            let user = UserId::parse(&format!("player-{i}")).unwrap();
            table.deal(&user, Amount::new(10).unwrap()).await.unwrap();
            table.stand(&user).await.unwrap();
            assert_eq!(table.tracked_rounds(), 0);
            table.reset(&user).await.unwrap();
        }

        assert_eq!(table.tracked_rounds(), 0);
        assert_eq!(table.seat_count(), 0);
    }

    #[tokio::test]
    async fn test_view_of_unknown_user_adds_no_seat() {
        let table = table(vec![], DealerReveal::Immediate);
        for i in 0..100 {
            let user = UserId::parse(&format!("stranger-{i}")).unwrap();
            assert_eq!(
                table.view(&user).await.unwrap(),
                RoundView::idle(Balance::new(1_000))
            );
        }
        assert_eq!(table.seat_count(), 0);
    }

    #[tokio::test]
    async fn test_refused_deal_leaves_no_seat() {
        let table = table(vec![], DealerReveal::Immediate);
        let result = table.deal(&user(), Amount::new(5_000).unwrap()).await;

        assert!(matches!(result, Err(BlackjackError::InsufficientBalance { .. })));
        assert_eq!(table.seat_count(), 0);
    }

    #[test]
    fn test_reveal_from_millis() {
        assert_eq!(DealerReveal::from_millis(0), DealerReveal::Immediate);
        assert_eq!(
            DealerReveal::from_millis(250),
            DealerReveal::Delayed(Duration::from_millis(250))
        );
    }
}
