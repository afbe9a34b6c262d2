use crate::domain::round::{RoundId, RoundState};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlackjackError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Invalid request: user identifier is missing")]
    MissingUser,
    #[error("Unknown pack: {0}")]
    UnknownPack(String),
    #[error("Pack mismatch for {pack_id}: catalog has {chips} chips for {price_stars} stars")]
    PackMismatch {
        pack_id: String,
        chips: u64,
        price_stars: u64,
    },
    #[error("Deck is empty")]
    EmptyDeck,
    #[error("Deck already contains {0}")]
    DuplicateCard(String),
    #[error("Insufficient balance: have {balance}, need {required}")]
    InsufficientBalance { balance: i64, required: u64 },
    #[error("Cannot {action} while round is {state}")]
    IllegalAction {
        action: &'static str,
        state: RoundState,
    },
    #[error("Another action is already in flight for this round")]
    RoundBusy,
    #[error("Round {0} was already settled")]
    AlreadySettled(RoundId),
    #[error("Invalid invoice payload: {0}")]
    InvalidPayload(String),
    #[error("Payment platform error: {0}")]
    PaymentPlatform(String),
    #[error("Persistence error: {0}")]
    Persistence(String),
}

pub type Result<T> = std::result::Result<T, BlackjackError>;

/// Structured reason returned to the presentation layer when an invoice
/// cannot be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    NoUser,
    InvalidRequest,
    InvalidPack,
}

impl RejectionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionReason::NoUser => "no_user",
            RejectionReason::InvalidRequest => "invalid_request",
            RejectionReason::InvalidPack => "invalid_pack",
        }
    }
}

impl BlackjackError {
    /// Maps client-correctable errors onto a rejection reason. Returns `None`
    /// for failures the caller should surface as errors.
    pub fn rejection_reason(&self) -> Option<RejectionReason> {
        match self {
            BlackjackError::MissingUser => Some(RejectionReason::NoUser),
            BlackjackError::InvalidRequest(_) => Some(RejectionReason::InvalidRequest),
            BlackjackError::UnknownPack(_) | BlackjackError::PackMismatch { .. } => {
                Some(RejectionReason::InvalidPack)
            }
            _ => None,
        }
    }
}

impl From<std::io::Error> for BlackjackError {
    fn from(err: std::io::Error) -> Self {
        BlackjackError::Persistence(err.to_string())
    }
}

impl From<tempfile::PersistError> for BlackjackError {
    fn from(err: tempfile::PersistError) -> Self {
        BlackjackError::Persistence(err.error.to_string())
    }
}

impl From<reqwest::Error> for BlackjackError {
    fn from(err: reqwest::Error) -> Self {
        BlackjackError::PaymentPlatform(err.to_string())
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for BlackjackError {
    fn from(err: rocksdb::Error) -> Self {
        BlackjackError::Persistence(err.to_string())
    }
}
