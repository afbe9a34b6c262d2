//! JSON-over-HTTP surface for the mini-app and the Telegram webhook.

pub mod dto;

use crate::application::payments::{InvoiceOutcome, PaymentService};
use crate::application::table::{GameTable, RoundView};
use crate::domain::ledger::Amount;
use crate::domain::payment::{InvoiceRequest, PaymentUpdate};
use crate::error::{BlackjackError, Result};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use dto::{
    AckResponse, BalanceResponse, DealRequest, ErrorResponse, InvoiceBody, InvoiceResponse,
    SeatRequest, UserQuery,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

/// Header Telegram uses to echo the secret configured with `setWebhook`.
pub const WEBHOOK_SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

#[derive(Clone)]
pub struct AppState {
    pub table: Arc<GameTable>,
    pub payments: Arc<PaymentService>,
    pub webhook_secret: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/chips/balance", get(balance))
        .route("/api/me/balance", get(balance))
        .route("/api/stars/create-invoice", post(create_invoice))
        .route("/api/stars/webhook", post(webhook))
        .route("/api/round", get(round_view))
        .route("/api/round/deal", post(deal))
        .route("/api/round/hit", post(hit))
        .route("/api/round/stand", post(stand))
        .route("/api/round/reset", post(reset))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `*` allows any origin; otherwise a single origin, skipped if unparsable.
pub fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);
    if origin == "*" {
        return layer.allow_origin(AllowOrigin::any());
    }
    match HeaderValue::from_str(origin) {
        Ok(value) => layer.allow_origin(value).allow_credentials(true),
        Err(_) => {
            warn!(origin, "Invalid CORS origin; browser requests will be rejected");
            layer
        }
    }
}

async fn health() -> Json<AckResponse> {
    Json(AckResponse { ok: true })
}

async fn balance(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<BalanceResponse>> {
    let user = query.user()?;
    let balance = state.table.ledger().get_balance(&user).await?;
    Ok(Json(BalanceResponse {
        chips: balance.value(),
    }))
}

async fn create_invoice(State(state): State<AppState>, body: Bytes) -> Response {
    let request = match serde_json::from_slice::<InvoiceBody>(&body) {
        Ok(body) => InvoiceRequest::from(body),
        Err(e) => {
            debug!(error = %e, "Unreadable invoice request");
            return Json(InvoiceResponse::rejected("invalid_request")).into_response();
        }
    };

    match state.payments.create_invoice(&request).await {
        Ok(InvoiceOutcome::Disabled) => Json(InvoiceResponse::rejected("coming_soon")).into_response(),
        Ok(InvoiceOutcome::Created { invoice_link }) => {
            Json(InvoiceResponse::created(invoice_link)).into_response()
        }
        Err(e) => match e.rejection_reason() {
            Some(reason) => {
                debug!(error = %e, "Invoice request rejected");
                Json(InvoiceResponse::rejected(reason.as_str())).into_response()
            }
            None => e.into_response(),
        },
    }
}

/// Always acknowledged; the platform retries anything else.
///
/// Only updates carrying the configured secret reach the payment service.
/// With no secret configured nothing can be authenticated, so every update
/// is dropped.
async fn webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Json<AckResponse> {
    let Some(secret) = &state.webhook_secret else {
        warn!("Webhook update discarded: no webhook secret configured");
        return Json(AckResponse { ok: true });
    };
    let presented = headers
        .get(WEBHOOK_SECRET_HEADER)
        .and_then(|value| value.to_str().ok());
    if !secret_matches(secret, presented) {
        warn!("Webhook update with missing or wrong secret token discarded");
        return Json(AckResponse { ok: true });
    }

    match serde_json::from_slice::<PaymentUpdate>(&body) {
        Ok(update) => {
            let outcome = state.payments.handle_notification(&update).await;
            debug!(update_id = ?update.update_id, ?outcome, "Webhook update handled");
        }
        Err(e) => warn!(error = %e, "Unreadable webhook update discarded"),
    }
    Json(AckResponse { ok: true })
}

/// Compares digests; `blake3::Hash` equality is constant-time.
fn secret_matches(expected: &str, presented: Option<&str>) -> bool {
    presented.is_some_and(|presented| {
        blake3::hash(presented.as_bytes()) == blake3::hash(expected.as_bytes())
    })
}

/// Decodes a JSON body into the `ErrorResponse` shape on failure.
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| BlackjackError::InvalidRequest(e.to_string()))
}

async fn round_view(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<RoundView>> {
    let user = query.user()?;
    Ok(Json(state.table.view(&user).await?))
}

async fn deal(State(state): State<AppState>, body: Bytes) -> Result<Json<RoundView>> {
    let request: DealRequest = parse_body(&body)?;
    let (user, wager) = request.into_parts()?;
    let wager = Amount::try_from(wager)?;
    Ok(Json(state.table.deal(&user, wager).await?))
}

async fn hit(State(state): State<AppState>, body: Bytes) -> Result<Json<RoundView>> {
    let user = parse_body::<SeatRequest>(&body)?.user()?;
    Ok(Json(state.table.hit(&user).await?))
}

async fn stand(State(state): State<AppState>, body: Bytes) -> Result<Json<RoundView>> {
    let user = parse_body::<SeatRequest>(&body)?.user()?;
    Ok(Json(state.table.stand(&user).await?))
}

async fn reset(State(state): State<AppState>, body: Bytes) -> Result<Json<RoundView>> {
    let user = parse_body::<SeatRequest>(&body)?.user()?;
    Ok(Json(state.table.reset(&user).await?))
}

impl BlackjackError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            BlackjackError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            BlackjackError::MissingUser => (StatusCode::BAD_REQUEST, "no_user"),
            BlackjackError::UnknownPack(_) | BlackjackError::PackMismatch { .. } => {
                (StatusCode::BAD_REQUEST, "invalid_pack")
            }
            BlackjackError::InvalidPayload(_) => (StatusCode::BAD_REQUEST, "invalid_payload"),
            BlackjackError::InsufficientBalance { .. } => {
                (StatusCode::CONFLICT, "insufficient_balance")
            }
            BlackjackError::IllegalAction { .. } => (StatusCode::CONFLICT, "illegal_action"),
            BlackjackError::RoundBusy => (StatusCode::CONFLICT, "round_busy"),
            BlackjackError::AlreadySettled(_) => (StatusCode::CONFLICT, "already_settled"),
            BlackjackError::PaymentPlatform(_) => (StatusCode::BAD_GATEWAY, "payment_platform"),
            BlackjackError::EmptyDeck | BlackjackError::DuplicateCard(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
            BlackjackError::Persistence(_) => (StatusCode::INTERNAL_SERVER_ERROR, "persistence"),
        }
    }
}

impl IntoResponse for BlackjackError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        let body = ErrorResponse {
            error: code,
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
