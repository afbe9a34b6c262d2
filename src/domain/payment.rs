use super::catalog::Pack;
use super::ledger::UserId;
use crate::error::{BlackjackError, Result};
use serde::{Deserialize, Serialize};

/// Telegram Stars currency code.
pub const STARS_CURRENCY: &str = "XTR";

/// Bot API limit on invoice payload length.
pub const MAX_PAYLOAD_BYTES: usize = 128;

/// Data embedded in an invoice so the later payment can be attributed and
/// checked against the catalog without a database lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoicePayload {
    #[serde(rename = "u")]
    pub user_id: UserId,
    #[serde(rename = "p")]
    pub pack_id: String,
    #[serde(rename = "c")]
    pub chips: u64,
    #[serde(rename = "s")]
    pub price_stars: u64,
}

impl InvoicePayload {
    pub fn for_pack(user_id: UserId, pack: &Pack) -> Self {
        Self {
            user_id,
            pack_id: pack.id.clone(),
            chips: pack.chips,
            price_stars: pack.price_stars,
        }
    }

    pub fn encode(&self) -> Result<String> {
        let encoded = serde_json::to_string(self)
            .map_err(|e| BlackjackError::InvalidPayload(e.to_string()))?;
        if encoded.len() > MAX_PAYLOAD_BYTES {
            return Err(BlackjackError::InvalidRequest(format!(
                "invoice payload is {} bytes, limit is {MAX_PAYLOAD_BYTES}",
                encoded.len()
            )));
        }
        Ok(encoded)
    }

    pub fn decode(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| BlackjackError::InvalidPayload(e.to_string()))
    }
}

/// Caller-supplied invoice request. Every field is optional so validation can
/// report which part is missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvoiceRequest {
    pub user_id: Option<String>,
    pub pack_id: Option<String>,
    pub amount_chips: Option<f64>,
    pub price_stars: Option<f64>,
}

/// A validated request: the pack exists and the claimed values match it.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedInvoice {
    pub user_id: UserId,
    pub pack: Pack,
}

impl InvoiceRequest {
    /// Checks presence and shape, then compares the claimed amount and price
    /// with the catalog entry so tampered prices are refused.
    pub fn validate<'a>(
        &self,
        lookup: impl FnOnce(&str) -> Option<&'a Pack>,
    ) -> Result<ValidatedInvoice> {
        let user_id = UserId::parse(self.user_id.as_deref().unwrap_or_default())?;
        let pack_id = self
            .pack_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| BlackjackError::InvalidRequest("packId is required".to_string()))?;
        let amount = positive_finite(self.amount_chips, "amountChips")?;
        let price = positive_finite(self.price_stars, "priceStars")?;

        let pack = lookup(pack_id).ok_or_else(|| BlackjackError::UnknownPack(pack_id.to_string()))?;
        if amount != pack.chips as f64 || price != pack.price_stars as f64 {
            return Err(BlackjackError::PackMismatch {
                pack_id: pack.id.clone(),
                chips: pack.chips,
                price_stars: pack.price_stars,
            });
        }

        Ok(ValidatedInvoice {
            user_id,
            pack: pack.clone(),
        })
    }
}

fn positive_finite(value: Option<f64>, field: &str) -> Result<f64> {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => Ok(v),
        Some(_) => Err(BlackjackError::InvalidRequest(format!(
            "{field} must be a positive number"
        ))),
        None => Err(BlackjackError::InvalidRequest(format!("{field} is required"))),
    }
}

/// Invoice parameters handed to the payment platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceDraft {
    pub title: String,
    pub description: String,
    pub payload: String,
    pub currency: String,
    pub label: String,
    pub price_stars: u64,
}

impl InvoiceDraft {
    pub fn for_pack(pack: &Pack, payload: String) -> Self {
        Self {
            title: pack.title.clone(),
            description: format!("{} chips for the blackjack table", pack.chips),
            payload,
            currency: STARS_CURRENCY.to_string(),
            label: pack.title.clone(),
            price_stars: pack.price_stars,
        }
    }
}

/// An update pushed by the payment platform. Unknown fields and unrelated
/// update types deserialize fine and are ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PaymentUpdate {
    #[serde(default)]
    pub update_id: Option<i64>,
    #[serde(default)]
    pub pre_checkout_query: Option<PreCheckoutQuery>,
    #[serde(default)]
    pub message: Option<PaymentMessage>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlatformUser {
    pub id: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PreCheckoutQuery {
    pub id: String,
    #[serde(default)]
    pub from: Option<PlatformUser>,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub total_amount: u64,
    #[serde(default)]
    pub invoice_payload: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PaymentMessage {
    #[serde(default)]
    pub from: Option<PlatformUser>,
    #[serde(default)]
    pub successful_payment: Option<SuccessfulPayment>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SuccessfulPayment {
    pub currency: String,
    pub total_amount: u64,
    pub invoice_payload: String,
    pub telegram_payment_charge_id: String,
    #[serde(default)]
    pub provider_payment_charge_id: Option<String>,
}

pub enum UpdateKind<'a> {
    PreCheckout(&'a PreCheckoutQuery),
    Payment(&'a SuccessfulPayment),
    Other,
}

impl PaymentUpdate {
    pub fn kind(&self) -> UpdateKind<'_> {
        if let Some(query) = &self.pre_checkout_query {
            return UpdateKind::PreCheckout(query);
        }
        match self
            .message
            .as_ref()
            .and_then(|message| message.successful_payment.as_ref())
        {
            Some(payment) => UpdateKind::Payment(payment),
            None => UpdateKind::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::PackCatalog;

    fn request(user: &str, pack: &str, chips: f64, price: f64) -> InvoiceRequest {
        InvoiceRequest {
            user_id: Some(user.to_string()),
            pack_id: Some(pack.to_string()),
            amount_chips: Some(chips),
            price_stars: Some(price),
        }
    }

    #[test]
    fn test_payload_is_compact_and_parses_back() {
        let catalog = PackCatalog::builtin();
        let pack = catalog.get("chips_5000").unwrap();
        let payload = InvoicePayload::for_pack(UserId::parse("123456789").unwrap(), pack);

        let encoded = payload.encode().unwrap();
        assert!(encoded.len() <= MAX_PAYLOAD_BYTES);
        assert_eq!(InvoicePayload::decode(&encoded).unwrap(), payload);
    }

    #[test]
    fn test_oversized_payload_is_rejected() {
        let catalog = PackCatalog::builtin();
        let pack = catalog.get("chips_500").unwrap();
        let payload = InvoicePayload::for_pack(UserId::parse("x".repeat(200)).unwrap(), pack);
        assert!(matches!(
            payload.encode(),
            Err(BlackjackError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_garbage_payload_fails_to_decode() {
        assert!(matches!(
            InvoicePayload::decode("not json"),
            Err(BlackjackError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_validate_request() {
        let catalog = PackCatalog::builtin();
        let ok = request("7", "chips_1000", 1000.0, 45.0)
            .validate(|id| catalog.get(id))
            .unwrap();
        assert_eq!(ok.user_id.as_str(), "7");
        assert_eq!(ok.pack.chips, 1000);

        let tampered = request("7", "chips_1000", 1000.0, 1.0).validate(|id| catalog.get(id));
        assert!(matches!(tampered, Err(BlackjackError::PackMismatch { .. })));

        let unknown = request("7", "chips_1", 1.0, 1.0).validate(|id| catalog.get(id));
        assert!(matches!(unknown, Err(BlackjackError::UnknownPack(_))));

        let negative = request("7", "chips_1000", -1.0, 45.0).validate(|id| catalog.get(id));
        assert!(matches!(negative, Err(BlackjackError::InvalidRequest(_))));

        let infinite = request("7", "chips_1000", 1000.0, f64::INFINITY).validate(|id| catalog.get(id));
        assert!(matches!(infinite, Err(BlackjackError::InvalidRequest(_))));

        let no_user = InvoiceRequest {
            user_id: None,
            ..request("", "chips_1000", 1000.0, 45.0)
        };
        assert!(matches!(
            no_user.validate(|id| catalog.get(id)),
            Err(BlackjackError::MissingUser)
        ));
    }

    #[test]
    fn test_update_kinds() {
        let precheckout: PaymentUpdate = serde_json::from_str(
            r#"{"update_id":1,"pre_checkout_query":{"id":"q1","from":{"id":7},
                "currency":"XTR","total_amount":45,"invoice_payload":"{}"}}"#,
        )
        .unwrap();
        assert!(matches!(precheckout.kind(), UpdateKind::PreCheckout(q) if q.id == "q1"));

        let paid: PaymentUpdate = serde_json::from_str(
            r#"{"update_id":2,"message":{"message_id":5,"successful_payment":{
                "currency":"XTR","total_amount":45,"invoice_payload":"{}",
                "telegram_payment_charge_id":"ch_1"}}}"#,
        )
        .unwrap();
        assert!(matches!(paid.kind(), UpdateKind::Payment(p) if p.telegram_payment_charge_id == "ch_1"));

        let chat: PaymentUpdate =
            serde_json::from_str(r#"{"update_id":3,"message":{"text":"hello"}}"#).unwrap();
        assert!(matches!(chat.kind(), UpdateKind::Other));
    }
}
