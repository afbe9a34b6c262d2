use super::ledger::{BalanceLedger, PaymentCredit};
use crate::domain::catalog::PackCatalog;
use crate::domain::ledger::{Amount, Balance, PaymentId, UserId};
use crate::domain::payment::{
    InvoiceDraft, InvoicePayload, InvoiceRequest, PaymentUpdate, PreCheckoutQuery,
    STARS_CURRENCY, SuccessfulPayment, UpdateKind,
};
use crate::domain::ports::{PaymentPlatformBox, PreCheckoutAnswer};
use crate::error::Result;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvoiceOutcome {
    /// Payments are switched off; the caller shows a "coming soon" state.
    Disabled,
    Created { invoice_link: String },
}

/// What handling a platform update did. The webhook acknowledges every
/// update regardless; this is for logs and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationOutcome {
    Ignored,
    PreCheckoutApproved,
    Credited {
        user: UserId,
        chips: u64,
        balance: Balance,
    },
    Duplicate,
    Discarded(String),
}

/// Turns pack purchases into invoices and completed payments into chips.
///
/// Chips are always granted from the catalog entry, never from amounts the
/// client or the payload claim.
pub struct PaymentService {
    ledger: Arc<BalanceLedger>,
    catalog: Arc<PackCatalog>,
    platform: Option<PaymentPlatformBox>,
}

impl PaymentService {
    /// `platform` is `None` when payments are administratively disabled.
    pub fn new(
        ledger: Arc<BalanceLedger>,
        catalog: Arc<PackCatalog>,
        platform: Option<PaymentPlatformBox>,
    ) -> Self {
        Self {
            ledger,
            catalog,
            platform,
        }
    }

    pub fn enabled(&self) -> bool {
        self.platform.is_some()
    }

    pub fn catalog(&self) -> &PackCatalog {
        &self.catalog
    }

    /// Creates a Stars invoice link for a catalog pack.
    ///
    /// # Arguments
    ///
    /// * `request` - The client's purchase request. Its amounts must match
    ///   the catalog entry exactly or the request fails with `PackMismatch`.
    ///
    /// Validation runs before the enabled check, so malformed requests get
    /// their own rejection reason even while payments are off.
    pub async fn create_invoice(&self, request: &InvoiceRequest) -> Result<InvoiceOutcome> {
        let validated = request.validate(|id| self.catalog.get(id))?;

        let Some(platform) = &self.platform else {
            debug!(user = %validated.user_id, pack = %validated.pack.id, "Payments disabled, no invoice");
            return Ok(InvoiceOutcome::Disabled);
        };

        let payload = InvoicePayload::for_pack(validated.user_id.clone(), &validated.pack).encode()?;
        let draft = InvoiceDraft::for_pack(&validated.pack, payload);
        let invoice_link = platform.create_invoice_link(&draft).await?;

        info!(
            user = %validated.user_id,
            pack = %validated.pack.id,
            price_stars = validated.pack.price_stars,
            "Invoice created"
        );
        Ok(InvoiceOutcome::Created { invoice_link })
    }

    /// Handles one platform update. Never fails: anomalies are logged and the
    /// update is dropped without crediting anything.
    pub async fn handle_notification(&self, update: &PaymentUpdate) -> NotificationOutcome {
        match update.kind() {
            UpdateKind::PreCheckout(query) => self.approve_pre_checkout(query).await,
            UpdateKind::Payment(payment) => self.credit_payment(payment).await,
            UpdateKind::Other => {
                debug!(update_id = ?update.update_id, "Ignoring unrelated update");
                NotificationOutcome::Ignored
            }
        }
    }

    async fn approve_pre_checkout(&self, query: &PreCheckoutQuery) -> NotificationOutcome {
        let Some(platform) = &self.platform else {
            warn!(query = %query.id, "Pre-checkout query received while payments are disabled");
            return NotificationOutcome::Discarded("payments disabled".to_string());
        };

        match platform
            .answer_pre_checkout_query(&query.id, PreCheckoutAnswer::Approve)
            .await
        {
            Ok(()) => {
                debug!(query = %query.id, "Pre-checkout approved");
                NotificationOutcome::PreCheckoutApproved
            }
            Err(e) => {
                error!(query = %query.id, error = %e, "Failed to answer pre-checkout query");
                NotificationOutcome::Discarded(e.to_string())
            }
        }
    }

    async fn credit_payment(&self, payment: &SuccessfulPayment) -> NotificationOutcome {
        let charge = payment.telegram_payment_charge_id.trim();
        if charge.is_empty() {
            return discard("payment has no charge id".to_string());
        }

        let payload = match InvoicePayload::decode(&payment.invoice_payload) {
            Ok(payload) => payload,
            Err(e) => return discard(format!("charge {charge}: {e}")),
        };
        let Some(pack) = self.catalog.get(&payload.pack_id) else {
            return discard(format!("charge {charge}: unknown pack {}", payload.pack_id));
        };
        if payment.currency != STARS_CURRENCY
            || payment.total_amount != pack.price_stars
            || payload.price_stars != pack.price_stars
        {
            return discard(format!(
                "charge {charge}: paid {} {} (payload {}) for pack {} priced {} {STARS_CURRENCY}",
                payment.total_amount, payment.currency, payload.price_stars, pack.id, pack.price_stars
            ));
        }
        let chips = match Amount::new(pack.chips) {
            Ok(chips) => chips,
            Err(e) => return discard(format!("charge {charge}: {e}")),
        };

        let payment_id = PaymentId::new(charge);
        match self.ledger.credit_payment(&payload.user_id, &payment_id, chips).await {
            Ok(PaymentCredit::Credited(balance)) => NotificationOutcome::Credited {
                user: payload.user_id,
                chips: pack.chips,
                balance,
            },
            Ok(PaymentCredit::AlreadySettled) => {
                info!(payment = %payment_id, user = %payload.user_id, "Duplicate payment delivery ignored");
                NotificationOutcome::Duplicate
            }
            Err(e) => {
                error!(payment = %payment_id, user = %payload.user_id, error = %e, "Failed to credit payment");
                NotificationOutcome::Discarded(e.to_string())
            }
        }
    }
}

fn discard(reason: String) -> NotificationOutcome {
    warn!(%reason, "Payment discarded");
    NotificationOutcome::Discarded(reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::PaymentPlatform;
    use crate::error::BlackjackError;
    use crate::infrastructure::in_memory::InMemoryLedgerStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakePlatform {
        drafts: Arc<Mutex<Vec<InvoiceDraft>>>,
    }

    #[async_trait]
    impl PaymentPlatform for FakePlatform {
        async fn create_invoice_link(&self, draft: &InvoiceDraft) -> Result<String> {
            self.drafts.lock().unwrap().push(draft.clone());
            Ok("https://t.me/$invoice".to_string())
        }

        async fn answer_pre_checkout_query(&self, _: &str, _: PreCheckoutAnswer) -> Result<()> {
            Ok(())
        }
    }

    fn service(platform: Option<PaymentPlatformBox>) -> PaymentService {
        PaymentService::new(
            Arc::new(BalanceLedger::new(Box::new(InMemoryLedgerStore::new()))),
            Arc::new(PackCatalog::builtin()),
            platform,
        )
    }

    fn request(pack: &str, chips: f64, price: f64) -> InvoiceRequest {
        InvoiceRequest {
            user_id: Some("77".to_string()),
            pack_id: Some(pack.to_string()),
            amount_chips: Some(chips),
            price_stars: Some(price),
        }
    }

    fn paid(payload: &str, total: u64, charge: &str) -> PaymentUpdate {
        serde_json::from_value(serde_json::json!({
            "update_id": 1,
            "message": {
                "successful_payment": {
                    "currency": "XTR",
                    "total_amount": total,
                    "invoice_payload": payload,
                    "telegram_payment_charge_id": charge,
                }
            }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_invoice_embeds_canonical_payload() {
        let platform = FakePlatform::default();
        let drafts = platform.drafts.clone();
        let service = service(Some(Box::new(platform)));

        let outcome = service
            .create_invoice(&request("chips_2500", 2500.0, 100.0))
            .await
            .unwrap();
        assert!(matches!(outcome, InvoiceOutcome::Created { .. }));

        let drafts = drafts.lock().unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].currency, STARS_CURRENCY);
        assert_eq!(drafts[0].price_stars, 100);
        let payload = InvoicePayload::decode(&drafts[0].payload).unwrap();
        assert_eq!(payload.user_id.as_str(), "77");
        assert_eq!(payload.chips, 2500);
    }

    #[tokio::test]
    async fn test_disabled_still_validates() {
        let service = service(None);
        assert_eq!(
            service.create_invoice(&request("chips_500", 500.0, 25.0)).await.unwrap(),
            InvoiceOutcome::Disabled
        );
        assert!(matches!(
            service.create_invoice(&request("chips_500", 500.0, 1.0)).await,
            Err(BlackjackError::PackMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_payment_credits_catalog_chips_once() {
        let service = service(None);
        let payload = r#"{"u":"77","p":"chips_1000","c":999999,"s":45}"#;

        let first = service.handle_notification(&paid(payload, 45, "ch_1")).await;
        let second = service.handle_notification(&paid(payload, 45, "ch_1")).await;

        assert_eq!(
            first,
            NotificationOutcome::Credited {
                user: UserId::parse("77").unwrap(),
                chips: 1000,
                balance: Balance::new(2_000),
            }
        );
        assert_eq!(second, NotificationOutcome::Duplicate);
    }

    #[tokio::test]
    async fn test_underpaid_payment_is_discarded() {
        let service = service(None);
        let payload = r#"{"u":"77","p":"chips_1000","c":1000,"s":1}"#;

        let outcome = service.handle_notification(&paid(payload, 1, "ch_2")).await;
        assert!(matches!(outcome, NotificationOutcome::Discarded(_)));
        assert_eq!(
            service.ledger.get_balance(&UserId::parse("77").unwrap()).await.unwrap(),
            Balance::new(1_000)
        );
    }

    #[tokio::test]
    async fn test_unrelated_update_is_ignored() {
        let service = service(None);
        let update: PaymentUpdate =
            serde_json::from_str(r#"{"update_id":9,"message":{"text":"/start"}}"#).unwrap();
        assert_eq!(service.handle_notification(&update).await, NotificationOutcome::Ignored);
    }
}
