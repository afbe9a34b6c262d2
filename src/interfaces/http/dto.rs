use crate::domain::ledger::UserId;
use crate::domain::payment::InvoiceRequest;
use crate::error::{BlackjackError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Mini-app clients send the platform user id as either a number or a string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UserIdParam {
    Number(serde_json::Number),
    Text(String),
}

impl UserIdParam {
    fn into_string(self) -> String {
        match self {
            UserIdParam::Number(n) => n.to_string(),
            UserIdParam::Text(s) => s,
        }
    }
}

fn require_user(user_id: Option<UserIdParam>) -> Result<UserId> {
    UserId::parse(user_id.map(UserIdParam::into_string).unwrap_or_default())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    #[serde(default)]
    pub user_id: Option<String>,
}

impl UserQuery {
    pub fn user(self) -> Result<UserId> {
        UserId::parse(self.user_id.unwrap_or_default())
    }
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub chips: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatRequest {
    #[serde(default)]
    pub user_id: Option<UserIdParam>,
}

impl SeatRequest {
    pub fn user(self) -> Result<UserId> {
        require_user(self.user_id)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealRequest {
    #[serde(default)]
    pub user_id: Option<UserIdParam>,
    #[serde(default)]
    pub wager: Option<u64>,
}

impl DealRequest {
    pub fn into_parts(self) -> Result<(UserId, u64)> {
        let user = require_user(self.user_id)?;
        let wager = self
            .wager
            .ok_or_else(|| BlackjackError::InvalidRequest("wager is required".to_string()))?;
        Ok((user, wager))
    }
}

/// Raw invoice body. Amounts stay untyped so a string or a negative number
/// reaches validation and is reported as `invalid_request`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceBody {
    #[serde(default)]
    pub user_id: Option<UserIdParam>,
    #[serde(default)]
    pub pack_id: Option<String>,
    #[serde(default)]
    pub amount_chips: Option<Value>,
    #[serde(default)]
    pub price_stars: Option<Value>,
}

fn number(value: Option<Value>) -> Option<f64> {
    match value? {
        Value::Null => None,
        Value::Number(n) => n.as_f64(),
        _ => Some(f64::NAN),
    }
}

impl From<InvoiceBody> for InvoiceRequest {
    fn from(body: InvoiceBody) -> Self {
        InvoiceRequest {
            user_id: body.user_id.map(UserIdParam::into_string),
            pack_id: body.pack_id,
            amount_chips: number(body.amount_chips),
            price_stars: number(body.price_stars),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceResponse {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_link: Option<String>,
}

impl InvoiceResponse {
    pub fn rejected(reason: &'static str) -> Self {
        Self {
            enabled: false,
            reason: Some(reason),
            invoice_link: None,
        }
    }

    pub fn created(invoice_link: String) -> Self {
        Self {
            enabled: true,
            reason: None,
            invoice_link: Some(invoice_link),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AckResponse {
    pub ok: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_and_string_user_ids() {
        let numeric: SeatRequest = serde_json::from_str(r#"{"userId": 123456789}"#).unwrap();
        assert_eq!(numeric.user().unwrap().as_str(), "123456789");

        let text: SeatRequest = serde_json::from_str(r#"{"userId": " 42 "}"#).unwrap();
        assert_eq!(text.user().unwrap().as_str(), "42");

        let missing: SeatRequest = serde_json::from_str("{}").unwrap();
        assert!(matches!(missing.user(), Err(BlackjackError::MissingUser)));
    }

    #[test]
    fn test_non_numeric_amounts_fail_validation() {
        let body: InvoiceBody = serde_json::from_str(
            r#"{"userId":1,"packId":"chips_500","amountChips":"500","priceStars":25}"#,
        )
        .unwrap();
        let request = InvoiceRequest::from(body);
        assert!(request.amount_chips.is_some_and(f64::is_nan));
        assert_eq!(request.price_stars, Some(25.0));
    }

    #[test]
    fn test_invoice_response_shapes() {
        assert_eq!(
            serde_json::to_value(InvoiceResponse::rejected("coming_soon")).unwrap(),
            serde_json::json!({"enabled": false, "reason": "coming_soon"})
        );
        assert_eq!(
            serde_json::to_value(InvoiceResponse::created("https://t.me/$x".into())).unwrap(),
            serde_json::json!({"enabled": true, "invoiceLink": "https://t.me/$x"})
        );
    }
}
