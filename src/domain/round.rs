use super::card::Card;
use super::deck::Deck;
use super::hand::{BLACKJACK, Hand};
use super::ledger::{Amount, Balance};
use crate::error::{BlackjackError, Result};
use serde::Serialize;
use std::fmt;

/// The dealer keeps drawing while below this total.
pub const DEALER_STANDS_ON: u32 = 17;

/// Identity of one dealt round. Never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RoundId(pub u64);

impl fmt::Display for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RoundState {
    Idle,
    PlayerTurn,
    DealerTurn,
    RoundEnd,
}

impl fmt::Display for RoundState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RoundState::Idle => "idle",
            RoundState::PlayerTurn => "playerTurn",
            RoundState::DealerTurn => "dealerTurn",
            RoundState::RoundEnd => "roundEnd",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Outcome {
    Win,
    Lose,
    Push,
    PlayerBlackjack,
    DealerBlackjack,
}

/// Compares final totals once both hands are complete.
pub fn determine_outcome(player_total: u32, dealer_total: u32) -> Outcome {
    if player_total > BLACKJACK {
        Outcome::Lose
    } else if dealer_total > BLACKJACK || player_total > dealer_total {
        Outcome::Win
    } else if player_total < dealer_total {
        Outcome::Lose
    } else {
        Outcome::Push
    }
}

/// One live round of play, from the deal until the outcome is known.
///
/// A `Round` only exists between Deal and settlement; the idle seat holds no
/// round at all. The wager is captured at deal time and cannot change.
#[derive(Debug, Clone)]
pub struct Round {
    id: RoundId,
    state: RoundState,
    wager: Amount,
    player: Hand,
    dealer: Hand,
    deck: Deck,
    outcome: Option<Outcome>,
}

impl Round {
    /// Deals two cards to the player then two to the dealer from `deck`.
    ///
    /// Naturals resolve immediately into `RoundEnd`; otherwise the round waits
    /// for the player in `PlayerTurn`.
    pub fn deal(id: RoundId, wager: Amount, balance: Balance, mut deck: Deck) -> Result<Self> {
        if balance.value() < wager.value() as i64 {
            return Err(BlackjackError::InsufficientBalance {
                balance: balance.value(),
                required: wager.value(),
            });
        }

        let mut player = Hand::new();
        let mut dealer = Hand::new();
        player.push(deck.draw()?);
        player.push(deck.draw()?);
        dealer.push(deck.draw()?);
        dealer.push(deck.draw()?);

        let outcome = match (player.is_blackjack(), dealer.is_blackjack()) {
            (true, true) => Some(Outcome::Push),
            (true, false) => Some(Outcome::PlayerBlackjack),
            (false, true) => Some(Outcome::DealerBlackjack),
            (false, false) => None,
        };
        let state = if outcome.is_some() {
            RoundState::RoundEnd
        } else {
            RoundState::PlayerTurn
        };

        Ok(Self {
            id,
            state,
            wager,
            player,
            dealer,
            deck,
            outcome,
        })
    }

    /// Draws one card for the player. A bust ends the round on the spot.
    pub fn hit(&mut self) -> Result<Card> {
        self.require(RoundState::PlayerTurn, "hit")?;

        let card = self.deck.draw()?;
        self.player.push(card);
        if self.player.is_bust() {
            self.outcome = Some(Outcome::Lose);
            self.state = RoundState::RoundEnd;
        }
        Ok(card)
    }

    /// Freezes the player hand and hands the turn to the dealer.
    pub fn stand(&mut self) -> Result<()> {
        self.require(RoundState::PlayerTurn, "stand")?;
        self.state = RoundState::DealerTurn;
        Ok(())
    }

    /// Runs the dealer policy to completion and fixes the outcome.
    pub fn play_dealer(&mut self) -> Result<Outcome> {
        self.require(RoundState::DealerTurn, "play dealer")?;

        while self.dealer.value() < DEALER_STANDS_ON && !self.deck.is_empty() {
            let card = self.deck.draw()?;
            self.dealer.push(card);
        }

        let outcome = determine_outcome(self.player.value(), self.dealer.value());
        self.outcome = Some(outcome);
        self.state = RoundState::RoundEnd;
        Ok(outcome)
    }

    fn require(&self, expected: RoundState, action: &'static str) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(BlackjackError::IllegalAction {
                action,
                state: self.state,
            })
        }
    }

    pub fn id(&self) -> RoundId {
        self.id
    }

    pub fn state(&self) -> RoundState {
        self.state
    }

    pub fn wager(&self) -> Amount {
        self.wager
    }

    pub fn player(&self) -> &Hand {
        &self.player
    }

    pub fn dealer(&self) -> &Hand {
        &self.dealer
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    pub fn cards_remaining(&self) -> usize {
        self.deck.len()
    }
}
