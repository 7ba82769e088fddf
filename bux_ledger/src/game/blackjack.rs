//! Single-player blackjack against a house dealer.
//!
//! A session lives under `blackjack:{id}` from `deal` until the hand busts
//! or the player stands. The full deck and dealer hand stay server-side;
//! views mask the dealer's hole card.

use super::cards::{BLACKJACK, Card, Deck, score};
use crate::{
    auth::UserId,
    errors::{BuxError, BuxResult},
    ledger::{BalanceLedger, ensure_positive},
    store::{AtomicStore, Transform, keys, read_typed, update_typed},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Dealer draws while below this score.
pub const DEALER_STANDS_ON: u32 = 17;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Playing,
    Busted,
    Finished,
}

/// Persisted hand state
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlackjackSession {
    pub owner_id: UserId,
    pub deck: Deck,
    pub player_hand: Vec<Card>,
    pub dealer_hand: Vec<Card>,
    pub bet: u64,
    pub status: SessionStatus,
}

impl BlackjackSession {
    /// Deal two cards each, alternating player then dealer.
    pub fn deal(owner_id: UserId, bet: u64, mut deck: Deck) -> BuxResult<Self> {
        let mut player_hand = Vec::with_capacity(2);
        let mut dealer_hand = Vec::with_capacity(2);
        for _ in 0..2 {
            player_hand.push(draw(&mut deck)?);
            dealer_hand.push(draw(&mut deck)?);
        }

        Ok(Self {
            owner_id,
            deck,
            player_hand,
            dealer_hand,
            bet,
            status: SessionStatus::Playing,
        })
    }

    pub fn player_score(&self) -> u32 {
        score(&self.player_hand)
    }

    /// View with the dealer's hole card hidden
    pub fn view(&self) -> SessionView {
        let dealer_hand = self
            .dealer_hand
            .iter()
            .enumerate()
            .map(|(i, card)| (i == 0).then_some(*card))
            .collect();
        let dealer_visible_score = score(&self.dealer_hand[..self.dealer_hand.len().min(1)]);

        SessionView {
            player_hand: self.player_hand.clone(),
            player_score: self.player_score(),
            dealer_hand,
            dealer_visible_score,
            bet: self.bet,
            status: self.status,
        }
    }
}

fn draw(deck: &mut Deck) -> BuxResult<Card> {
    deck.draw()
        .ok_or_else(|| BuxError::Internal("blackjack deck exhausted".to_string()))
}

/// Client-facing session state. Masked dealer cards are `None`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SessionView {
    pub player_hand: Vec<Card>,
    pub player_score: u32,
    pub dealer_hand: Vec<Option<Card>>,
    pub dealer_visible_score: u32,
    pub bet: u64,
    pub status: SessionStatus,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HitResult {
    pub card: Card,
    pub player_hand: Vec<Card>,
    pub player_score: u32,
    pub status: SessionStatus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StandOutcome {
    PlayerWin,
    DealerWin,
    DealerBust,
    Push,
}

impl StandOutcome {
    /// Wire name, as serialized
    pub fn as_str(&self) -> &'static str {
        match self {
            StandOutcome::PlayerWin => "player_win",
            StandOutcome::DealerWin => "dealer_win",
            StandOutcome::DealerBust => "dealer_bust",
            StandOutcome::Push => "push",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            StandOutcome::PlayerWin => "You win!",
            StandOutcome::DealerWin => "Dealer wins.",
            StandOutcome::DealerBust => "Dealer busts, you win!",
            StandOutcome::Push => "Push. Your bet is returned.",
        }
    }
}

/// Compare final scores. Returns the outcome and the amount credited back.
pub fn settle(player_score: u32, dealer_score: u32, bet: u64) -> (StandOutcome, u64) {
    if dealer_score > BLACKJACK {
        (StandOutcome::DealerBust, bet.saturating_mul(2))
    } else if dealer_score > player_score {
        (StandOutcome::DealerWin, 0)
    } else if dealer_score < player_score {
        (StandOutcome::PlayerWin, bet.saturating_mul(2))
    } else {
        (StandOutcome::Push, bet)
    }
}

/// Dealer draws until reaching [`DEALER_STANDS_ON`].
pub fn play_dealer(dealer_hand: &mut Vec<Card>, deck: &mut Deck) -> BuxResult<u32> {
    while score(dealer_hand) < DEALER_STANDS_ON {
        dealer_hand.push(draw(deck)?);
    }
    Ok(score(dealer_hand))
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StandResult {
    pub player_hand: Vec<Card>,
    pub player_score: u32,
    pub dealer_hand: Vec<Card>,
    pub dealer_score: u32,
    pub outcome: StandOutcome,
    pub message: &'static str,
    pub bet: u64,
    pub payout: u64,
    pub new_balance: u64,
}

fn shuffled_deck() -> Deck {
    Deck::shuffled(&mut rand::rng())
}

#[derive(Clone)]
pub struct BlackjackEngine {
    store: Arc<dyn AtomicStore>,
    ledger: BalanceLedger,
    shuffler: fn() -> Deck,
}

impl BlackjackEngine {
    pub fn new(store: Arc<dyn AtomicStore>, ledger: BalanceLedger) -> Self {
        Self {
            store,
            ledger,
            shuffler: shuffled_deck,
        }
    }

    /// Replace the deck source
    pub fn with_shuffler(mut self, shuffler: fn() -> Deck) -> Self {
        self.shuffler = shuffler;
        self
    }

    /// Start a hand for `bet`
    ///
    /// # Errors
    ///
    /// * `BuxError::InvalidArgument` - Bet is zero
    /// * `BuxError::SessionInProgress` - A hand is already live (nothing debited)
    /// * `BuxError::InsufficientFunds` - Bet not covered
    pub async fn deal(&self, user_id: &UserId, bet: u64) -> BuxResult<SessionView> {
        ensure_positive(bet, "bet")?;
        let key = keys::blackjack(user_id);
        if self.store.read(&key).await?.is_some() {
            return Err(BuxError::SessionInProgress);
        }

        self.ledger.debit(user_id, bet).await?;

        let session = match BlackjackSession::deal(user_id.clone(), bet, (self.shuffler)()) {
            Ok(session) => session,
            Err(e) => {
                self.ledger.credit_with_retry(user_id, bet).await?;
                return Err(e);
            }
        };

        let inserted = update_typed::<BlackjackSession, _>(
            self.store.as_ref(),
            &key,
            |current| match current {
                Some(_) => Transform::Abort,
                None => Transform::Commit(Some(session.clone())),
            },
        )
        .await;

        match inserted {
            Ok(outcome) if outcome.committed => {
                log::debug!("{user_id} dealt a blackjack hand for {bet} BUX");
                Ok(session.view())
            }
            Ok(_) => {
                // A concurrent deal stored its session first
                self.ledger.credit_with_retry(user_id, bet).await?;
                Err(BuxError::SessionInProgress)
            }
            Err(e) => {
                self.ledger.credit_with_retry(user_id, bet).await?;
                Err(e)
            }
        }
    }

    /// Draw one card for the player
    ///
    /// Busting deletes the session and forfeits the bet.
    pub async fn hit(&self, user_id: &UserId) -> BuxResult<HitResult> {
        let mut result = None;

        update_typed::<BlackjackSession, _>(
            self.store.as_ref(),
            &keys::blackjack(user_id),
            |current| {
                let mut session = match current {
                    Some(session) if session.status == SessionStatus::Playing => session,
                    _ => return Transform::Fail(BuxError::NoActiveSession),
                };
                let card = match draw(&mut session.deck) {
                    Ok(card) => card,
                    Err(e) => return Transform::Fail(e),
                };
                session.player_hand.push(card);

                let player_score = session.player_score();
                let status = if player_score > BLACKJACK {
                    SessionStatus::Busted
                } else {
                    SessionStatus::Playing
                };
                result = Some(HitResult {
                    card,
                    player_hand: session.player_hand.clone(),
                    player_score,
                    status,
                });

                if status == SessionStatus::Busted {
                    Transform::Commit(None)
                } else {
                    Transform::Commit(Some(session))
                }
            },
        )
        .await?;

        let result =
            result.ok_or_else(|| BuxError::Internal("hit committed without a card".to_string()))?;
        if result.status == SessionStatus::Busted {
            log::debug!("{user_id} busted with {}", result.player_score);
        }
        Ok(result)
    }

    /// Finish the hand: dealer plays out, payout is credited
    ///
    /// The session is removed in the same atomic step that reads it, so a
    /// repeated stand cannot pay twice.
    pub async fn stand(&self, user_id: &UserId) -> BuxResult<StandResult> {
        let mut taken = None;

        update_typed::<BlackjackSession, _>(
            self.store.as_ref(),
            &keys::blackjack(user_id),
            |current| match current {
                Some(session) if session.status == SessionStatus::Playing => {
                    taken = Some(session);
                    Transform::Commit(None)
                }
                _ => Transform::Fail(BuxError::NoActiveSession),
            },
        )
        .await?;

        let mut session = taken
            .ok_or_else(|| BuxError::Internal("stand committed without a session".to_string()))?;

        let player_score = session.player_score();
        let dealer_score = play_dealer(&mut session.dealer_hand, &mut session.deck)?;
        let (outcome, payout) = settle(player_score, dealer_score, session.bet);

        let new_balance = if payout > 0 {
            self.ledger.credit_with_retry(user_id, payout).await?
        } else {
            self.ledger.balance(user_id).await?
        };

        log::debug!("{user_id} stood on {player_score} vs dealer {dealer_score}: {outcome:?}");

        Ok(StandResult {
            player_hand: session.player_hand,
            player_score,
            dealer_hand: session.dealer_hand,
            dealer_score,
            outcome,
            message: outcome.message(),
            bet: session.bet,
            payout,
            new_balance,
        })
    }

    /// Current hand, dealer hole card masked
    pub async fn session(&self, user_id: &UserId) -> BuxResult<SessionView> {
        read_typed::<BlackjackSession>(self.store.as_ref(), &keys::blackjack(user_id))
            .await?
            .map(|session| session.view())
            .ok_or(BuxError::NoActiveSession)
    }
}
