use rand::{Rng, seq::SliceRandom};
use serde::{Deserialize, Serialize};
use std::{collections::VecDeque, fmt};

/// Blackjack target score.
pub const BLACKJACK: u32 = 21;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Suit {
    Club,
    Spade,
    Diamond,
    Heart,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Club, Suit::Spade, Suit::Diamond, Suit::Heart];
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Club => "♣",
            Self::Spade => "♠",
            Self::Diamond => "♦",
            Self::Heart => "♥",
        };
        write!(f, "{repr}")
    }
}

/// Card rank, ace=1u8 ... king=13u8.
pub type Rank = u8;

/// A card is a rank and a suit.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Card(pub Rank, pub Suit);

impl Card {
    pub fn is_ace(&self) -> bool {
        self.0 == 1
    }

    /// Nominal blackjack value: faces are 10, aces 11.
    pub fn points(&self) -> u32 {
        match self.0 {
            1 => 11,
            11..=13 => 10,
            v => u32::from(v),
        }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let value = match self.0 {
            1 => "A",
            11 => "J",
            12 => "Q",
            13 => "K",
            v => &v.to_string(),
        };
        write!(f, "{value}{}", self.1)
    }
}

/// Best blackjack score for a hand.
///
/// Aces start at 11 and drop to 1, one at a time, while the hand is over 21.
pub fn score(hand: &[Card]) -> u32 {
    let mut total: u32 = hand.iter().map(Card::points).sum();
    let mut soft_aces = hand.iter().filter(|card| card.is_ace()).count();

    while total > BLACKJACK && soft_aces > 0 {
        total -= 10;
        soft_aces -= 1;
    }
    total
}

/// Remaining cards in draw order.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Deck {
    cards: VecDeque<Card>,
}

impl Deck {
    /// Build an unshuffled 52-card deck.
    pub fn standard() -> Self {
        let cards = (1u8..=13)
            .flat_map(|rank| Suit::ALL.into_iter().map(move |suit| Card(rank, suit)))
            .collect();
        Self { cards }
    }

    /// Build a 52-card deck shuffled uniformly with `rng`.
    pub fn shuffled(rng: &mut impl Rng) -> Self {
        let mut cards: Vec<Card> = Self::standard().cards.into();
        cards.shuffle(rng);
        Self {
            cards: cards.into(),
        }
    }

    /// Deck that deals `cards` in the given order.
    pub fn stacked(cards: impl IntoIterator<Item = Card>) -> Self {
        Self {
            cards: cards.into_iter().collect(),
        }
    }

    pub fn draw(&mut self) -> Option<Card> {
        self.cards.pop_front()
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_scores() {
        let hand = [Card(1, Suit::Spade), Card(10, Suit::Heart)];
        assert_eq!(score(&hand), 21);

        let hand = [Card(1, Suit::Spade), Card(1, Suit::Heart), Card(9, Suit::Club)];
        assert_eq!(score(&hand), 21);

        let hand = [Card(13, Suit::Spade), Card(12, Suit::Heart), Card(2, Suit::Club)];
        assert_eq!(score(&hand), 22);

        let hand = [Card(1, Suit::Spade); 4];
        assert_eq!(score(&hand), 14);
    }

    #[test]
    fn test_standard_deck_has_52_unique_cards() {
        let deck = Deck::standard();
        assert_eq!(deck.len(), 52);
        let unique: HashSet<Card> = deck.cards.iter().copied().collect();
        assert_eq!(unique.len(), 52);
    }

    #[test]
    fn test_shuffled_deck_is_a_permutation() {
        let mut deck = Deck::shuffled(&mut rand::rng());
        let mut drawn = HashSet::new();
        while let Some(card) = deck.draw() {
            assert!(drawn.insert(card));
        }
        assert_eq!(drawn.len(), 52);
        assert!(deck.is_empty());
    }

    #[test]
    fn test_card_display() {
        assert_eq!(Card(1, Suit::Spade).to_string(), "A♠");
        assert_eq!(Card(10, Suit::Heart).to_string(), "10♥");
        assert_eq!(Card(12, Suit::Diamond).to_string(), "Q♦");
    }
}
