use super::card::{Card, Rank, Suit};
use crate::error::{BlackjackError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::{HashSet, VecDeque};

pub const DECK_SIZE: usize = 52;

/// An ordered pile of unique cards. The top of the deck is the end of the
/// vector, so drawing is a `pop`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deck {
    cards: Vec<Card>,
}

impl Deck {
    /// A full deck in base order: suits Hearts, Diamonds, Clubs, Spades, each
    /// from ace up to king.
    pub fn new() -> Self {
        let mut cards = Vec::with_capacity(DECK_SIZE);
        for suit in Suit::ALL {
            for rank in Rank::ALL {
                cards.push(Card::new(rank, suit));
            }
        }
        Self { cards }
    }

    /// Builds a full deck whose first draws are `top`, in order. The
    /// remaining cards follow in base order.
    pub fn stacked(top: &[Card]) -> Result<Self> {
        let mut seen = HashSet::with_capacity(top.len());
        for card in top {
            if !seen.insert(*card) {
                return Err(BlackjackError::DuplicateCard(card.to_string()));
            }
        }

        let mut cards: Vec<Card> = Deck::new()
            .cards
            .into_iter()
            .filter(|card| !seen.contains(card))
            .collect();
        cards.extend(top.iter().rev().copied());
        Ok(Self { cards })
    }

    /// Returns a uniformly shuffled copy; `self` is left untouched.
    pub fn shuffled<R: Rng + ?Sized>(&self, rng: &mut R) -> Self {
        let mut cards = self.cards.clone();
        cards.shuffle(rng);
        Self { cards }
    }

    /// Removes and returns the top card. The deck itself is what remains.
    pub fn draw(&mut self) -> Result<Card> {
        self.cards.pop().ok_or(BlackjackError::EmptyDeck)
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }
}

impl Default for Deck {
    fn default() -> Self {
        Self::new()
    }
}

/// Supplies a fresh deck for every round.
pub trait DeckSource: Send {
    fn fresh_deck(&mut self) -> Deck;
}

pub type DeckSourceBox = Box<dyn DeckSource>;

/// Production source: a new base deck shuffled by a seeded RNG.
pub struct ShuffledDecks {
    rng: StdRng,
}

impl ShuffledDecks {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Reproducible shuffles for tests and replays.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for ShuffledDecks {
    fn default() -> Self {
        Self::new()
    }
}

impl DeckSource for ShuffledDecks {
    fn fresh_deck(&mut self) -> Deck {
        Deck::new().shuffled(&mut self.rng)
    }
}

/// Hands out pre-arranged decks in order, then unshuffled base decks.
#[derive(Default)]
pub struct StackedDecks {
    decks: VecDeque<Deck>,
}

impl StackedDecks {
    pub fn new(decks: impl IntoIterator<Item = Deck>) -> Self {
        Self {
            decks: decks.into_iter().collect(),
        }
    }
}

impl DeckSource for StackedDecks {
    fn fresh_deck(&mut self) -> Deck {
        self.decks.pop_front().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique(deck: &Deck) -> HashSet<Card> {
        deck.cards().iter().copied().collect()
    }

    #[test]
    fn test_new_deck_has_52_unique_cards() {
        let deck = Deck::new();
        assert_eq!(deck.len(), DECK_SIZE);
        assert_eq!(unique(&deck).len(), DECK_SIZE);
    }

    #[test]
    fn test_new_deck_order_is_fixed() {
        assert_eq!(Deck::new(), Deck::new());
        assert_eq!(Deck::new().cards()[0], Card::new(Rank::Ace, Suit::Hearts));
    }

    #[test]
    fn test_shuffle_preserves_cards_and_input() {
        let base = Deck::new();
        let mut rng = StdRng::seed_from_u64(7);
        let shuffled = base.shuffled(&mut rng);

        assert_eq!(base, Deck::new(), "shuffle must not mutate its input");
        assert_eq!(shuffled.len(), DECK_SIZE);
        assert_eq!(unique(&shuffled), unique(&base));
        assert_ne!(shuffled, base);
    }

    #[test]
    fn test_shuffle_moves_every_position() {
        // Over many shuffles every card should show up on top at least once.
        let base = Deck::new();
        let mut rng = StdRng::seed_from_u64(42);
        let mut tops = HashSet::new();
        for _ in 0..2_000 {
            let mut deck = base.shuffled(&mut rng);
            tops.insert(deck.draw().unwrap());
        }
        assert_eq!(tops.len(), DECK_SIZE);
    }

    #[test]
    fn test_draw_until_empty() {
        let mut deck = Deck::new();
        let mut drawn = HashSet::new();
        while !deck.is_empty() {
            assert!(drawn.insert(deck.draw().unwrap()));
        }
        assert_eq!(drawn.len(), DECK_SIZE);
        assert!(matches!(deck.draw(), Err(BlackjackError::EmptyDeck)));
    }

    #[test]
    fn test_stacked_deck_draw_order() {
        let top = [
            Card::new(Rank::King, Suit::Spades),
            Card::new(Rank::Two, Suit::Hearts),
        ];
        let mut deck = Deck::stacked(&top).unwrap();
        assert_eq!(deck.len(), DECK_SIZE);
        assert_eq!(unique(&deck).len(), DECK_SIZE);
        assert_eq!(deck.draw().unwrap(), top[0]);
        assert_eq!(deck.draw().unwrap(), top[1]);
    }

    #[test]
    fn test_stacked_deck_rejects_duplicates() {
        let card = Card::new(Rank::Ace, Suit::Clubs);
        assert!(matches!(
            Deck::stacked(&[card, card]),
            Err(BlackjackError::DuplicateCard(_))
        ));
    }

    #[test]
    fn test_stacked_source_falls_back_to_base_deck() {
        let mut source = StackedDecks::new([]);
        assert_eq!(source.fresh_deck(), Deck::new());
    }
}
