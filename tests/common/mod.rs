#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{Value, json};
use stars_blackjack::application::ledger::BalanceLedger;
use stars_blackjack::application::payments::PaymentService;
use stars_blackjack::application::table::{DealerReveal, GameTable};
use stars_blackjack::domain::card::{Card, Rank, Suit};
use stars_blackjack::domain::catalog::PackCatalog;
use stars_blackjack::domain::deck::{Deck, StackedDecks};
use stars_blackjack::domain::ledger::Balance;
use stars_blackjack::domain::payment::InvoiceDraft;
use stars_blackjack::domain::ports::{PaymentPlatform, PaymentPlatformBox, PreCheckoutAnswer};
use stars_blackjack::error::{BlackjackError, Result};
use stars_blackjack::infrastructure::in_memory::InMemoryLedgerStore;
use std::sync::{Arc, Mutex};

/// Payment platform double that records every call.
#[derive(Clone, Default)]
pub struct RecordingPlatform {
    pub drafts: Arc<Mutex<Vec<InvoiceDraft>>>,
    pub answers: Arc<Mutex<Vec<(String, PreCheckoutAnswer)>>>,
    pub fail: bool,
}

impl RecordingPlatform {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl PaymentPlatform for RecordingPlatform {
    async fn create_invoice_link(&self, draft: &InvoiceDraft) -> Result<String> {
        if self.fail {
            return Err(BlackjackError::PaymentPlatform("connection refused".to_string()));
        }
        let mut drafts = self.drafts.lock().unwrap();
        drafts.push(draft.clone());
        Ok(format!("https://t.me/$invoice_{}", drafts.len()))
    }

    async fn answer_pre_checkout_query(&self, query_id: &str, answer: PreCheckoutAnswer) -> Result<()> {
        if self.fail {
            return Err(BlackjackError::PaymentPlatform("connection refused".to_string()));
        }
        self.answers
            .lock()
            .unwrap()
            .push((query_id.to_string(), answer));
        Ok(())
    }
}

/// Builds a deck whose first draws have the given ranks. Suits rotate with
/// position so the stacked cards stay distinct.
pub fn stacked(ranks: &[Rank]) -> Deck {
    let top: Vec<Card> = ranks
        .iter()
        .enumerate()
        .map(|(i, rank)| Card::new(*rank, Suit::ALL[i % Suit::ALL.len()]))
        .collect();
    Deck::stacked(&top).unwrap()
}

pub fn in_memory_ledger(starter: i64) -> Arc<BalanceLedger> {
    Arc::new(BalanceLedger::with_starter_balance(
        Box::new(InMemoryLedgerStore::new()),
        Balance::new(starter),
    ))
}

pub fn table(ledger: Arc<BalanceLedger>, decks: Vec<Deck>, reveal: DealerReveal) -> Arc<GameTable> {
    Arc::new(GameTable::new(ledger, Box::new(StackedDecks::new(decks)), reveal))
}

pub fn payments(ledger: Arc<BalanceLedger>, platform: Option<RecordingPlatform>) -> PaymentService {
    PaymentService::new(
        ledger,
        Arc::new(PackCatalog::builtin()),
        platform.map(|p| Box::new(p) as PaymentPlatformBox),
    )
}

/// Compact invoice payload as embedded in invoices.
pub fn payload(user: &str, pack: &str, chips: u64, price: u64) -> String {
    json!({ "u": user, "p": pack, "c": chips, "s": price }).to_string()
}

pub fn successful_payment(payload: &str, currency: &str, total: u64, charge: &str) -> Value {
    json!({
        "update_id": 1000,
        "message": {
            "message_id": 7,
            "from": { "id": 77 },
            "successful_payment": {
                "currency": currency,
                "total_amount": total,
                "invoice_payload": payload,
                "telegram_payment_charge_id": charge,
                "provider_payment_charge_id": "",
            }
        }
    })
}

pub fn pre_checkout(query_id: &str, payload: &str) -> Value {
    json!({
        "update_id": 999,
        "pre_checkout_query": {
            "id": query_id,
            "from": { "id": 77 },
            "currency": "XTR",
            "total_amount": 45,
            "invoice_payload": payload,
        }
    })
}
