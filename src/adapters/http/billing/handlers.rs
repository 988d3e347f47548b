//! HTTP handlers for the payment endpoints.
//!
//! These handlers translate requests into application commands and queries.
//! Handlers are built per request from the shared ports in `BillingAppState`.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::{FromRequestParts, Json, Path, Query, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::application::handlers::billing::{
    CancelPaymentIntentCommand, CancelPaymentIntentHandler, CheckPaymentStatusHandler,
    CheckPaymentStatusQuery, CheckoutUrlDefaults, CreatePaymentIntentCommand,
    CreatePaymentIntentHandler, GetPaymentDetailsHandler, GetPaymentDetailsQuery,
    GetUserPaymentStatsHandler, GetUserPaymentStatsQuery, GetUserPaymentsHandler,
    GetUserPaymentsQuery, ReconcileWebhookCommand, ReconcileWebhookHandler,
    SubscriptionLifecycle, SweepPaymentTimeoutsCommand, SweepPaymentTimeoutsHandler,
};
use crate::domain::billing::{BillingError, OrderCode, RestorationPolicy};
use crate::domain::foundation::{PaymentId, PlanId, UserId};
use crate::ports::{BillingReader, BillingStore, PaymentGateway, PlanCatalog, UserDirectory};

use super::dto::{
    CancelCallbackParams, CancelCallbackResponse, CreatePaymentIntentRequest, ErrorResponse,
    PaymentIntentResponse, PaymentListResponse, PaymentStatsResponse, PaymentStatusResponse,
    SweepResponse, WebhookAck,
};

/// Headers the provider has been seen to carry the signature in.
const SIGNATURE_HEADERS: [&str; 3] = ["x-payos-signature", "payos-signature", "signature"];

const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Clone)]
pub struct BillingAppState {
    pub store: Arc<dyn BillingStore>,
    pub reader: Arc<dyn BillingReader>,
    pub plans: Arc<dyn PlanCatalog>,
    pub users: Arc<dyn UserDirectory>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub policy: RestorationPolicy,
    pub urls: CheckoutUrlDefaults,
    /// Threshold and batch size used by the admin sweep endpoint.
    pub sweep: SweepPaymentTimeoutsCommand,
    /// Admin endpoints answer 403 when unset.
    pub admin_token: Option<Arc<str>>,
}

impl BillingAppState {
    fn lifecycle(&self) -> SubscriptionLifecycle {
        SubscriptionLifecycle::new(self.store.clone(), self.plans.clone())
    }

    pub fn create_intent_handler(&self) -> CreatePaymentIntentHandler {
        CreatePaymentIntentHandler::new(
            self.store.clone(),
            self.plans.clone(),
            self.users.clone(),
            self.gateway.clone(),
            self.urls.clone(),
        )
    }

    pub fn reconcile_handler(&self) -> ReconcileWebhookHandler {
        ReconcileWebhookHandler::new(
            self.store.clone(),
            self.reader.clone(),
            self.gateway.clone(),
            self.lifecycle(),
            self.policy,
        )
    }

    pub fn cancel_handler(&self) -> CancelPaymentIntentHandler {
        CancelPaymentIntentHandler::new(
            self.store.clone(),
            self.reader.clone(),
            self.gateway.clone(),
            self.lifecycle(),
            self.policy,
        )
    }

    pub fn sweep_handler(&self) -> SweepPaymentTimeoutsHandler {
        SweepPaymentTimeoutsHandler::new(
            self.store.clone(),
            self.reader.clone(),
            self.gateway.clone(),
            self.lifecycle(),
            self.policy,
        )
    }

    pub fn status_handler(&self) -> CheckPaymentStatusHandler {
        CheckPaymentStatusHandler::new(
            self.reader.clone(),
            self.gateway.clone(),
            Arc::new(self.reconcile_handler()),
        )
    }

    pub fn details_handler(&self) -> GetPaymentDetailsHandler {
        GetPaymentDetailsHandler::new(self.reader.clone(), self.plans.clone(), self.users.clone())
    }

    pub fn payments_handler(&self) -> GetUserPaymentsHandler {
        GetUserPaymentsHandler::new(self.reader.clone())
    }

    pub fn stats_handler(&self) -> GetUserPaymentStatsHandler {
        GetUserPaymentStatsHandler::new(self.reader.clone())
    }

    fn admin_authorized(&self, headers: &HeaderMap) -> bool {
        let Some(expected) = self.admin_token.as_deref() else {
            return false;
        };
        headers
            .get(ADMIN_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|given| bool::from(given.as_bytes().ct_eq(expected.as_bytes())))
            .unwrap_or(false)
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// User Context
// ════════════════════════════════════════════════════════════════════════════════

/// Caller identity, set by the upstream gateway in `X-User-Id`.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
}

pub struct AuthenticationRequired;

impl IntoResponse for AuthenticationRequired {
    fn into_response(self) -> Response {
        let error = ErrorResponse::new("AUTHENTICATION_REQUIRED", "Authentication is required");
        (StatusCode::UNAUTHORIZED, Json(error)).into_response()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AuthenticationRequired;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get("X-User-Id")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| UserId::new(s.trim()).ok())
            .ok_or(AuthenticationRequired)?;

        Ok(AuthenticatedUser { user_id })
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Command Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/payments/intent
pub async fn create_payment_intent(
    State(state): State<BillingAppState>,
    user: AuthenticatedUser,
    Json(request): Json<CreatePaymentIntentRequest>,
) -> Result<impl IntoResponse, BillingApiError> {
    let cmd = CreatePaymentIntentCommand {
        user_id: user.user_id,
        plan_id: PlanId::from_uuid(request.plan_id),
        return_url: request.return_url,
        cancel_url: request.cancel_url,
    };

    let result = state.create_intent_handler().handle(cmd).await?;

    Ok((StatusCode::CREATED, Json(PaymentIntentResponse::from(result))))
}

/// POST /api/payments/webhook
///
/// Always answers 200 so the provider stops retrying; the body says whether
/// the delivery was accepted.
pub async fn handle_webhook(
    State(state): State<BillingAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    if is_ping(&body) {
        tracing::info!("Empty webhook body received, answering as ping");
        return Json(WebhookAck::ping());
    }

    let signature = SIGNATURE_HEADERS
        .iter()
        .find_map(|name| headers.get(*name))
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let cmd = ReconcileWebhookCommand {
        payload: body.to_vec(),
        signature,
    };
    let result = state.reconcile_handler().handle(cmd).await;

    Json(WebhookAck::from(result))
}

/// GET /api/payments/cancel-callback/:order_code?reason=
pub async fn cancel_callback(
    State(state): State<BillingAppState>,
    Path(order_code): Path<String>,
    Query(params): Query<CancelCallbackParams>,
) -> Result<impl IntoResponse, BillingApiError> {
    let order_code = OrderCode::from_str(&order_code).map_err(BillingError::from)?;
    tracing::info!(order_code = %order_code, "Cancel callback received");

    let cmd = CancelPaymentIntentCommand {
        order_code,
        reason: params.reason.filter(|r| !r.trim().is_empty()),
    };
    let result = state.cancel_handler().handle(cmd).await?;

    let redirect = format!("{}/payment/cancelled", state.urls.client_url.trim_end_matches('/'));
    Ok(Json(CancelCallbackResponse::new(result, redirect)))
}

/// POST /api/payments/admin/sweep-timeouts
pub async fn sweep_timeouts(
    State(state): State<BillingAppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, BillingApiError> {
    if !state.admin_authorized(&headers) {
        return Err(BillingError::forbidden("Admin token required").into());
    }

    let result = state.sweep_handler().handle(state.sweep).await?;

    Ok(Json(SweepResponse::from(result)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Query Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// GET /api/payments/:order_code/status
pub async fn get_payment_status(
    State(state): State<BillingAppState>,
    user: AuthenticatedUser,
    Path(order_code): Path<String>,
) -> Result<impl IntoResponse, BillingApiError> {
    let order_code = OrderCode::from_str(&order_code).map_err(BillingError::from)?;
    let query = CheckPaymentStatusQuery {
        user_id: user.user_id,
        order_code,
    };

    let result = state.status_handler().handle(query).await?;

    Ok(Json(PaymentStatusResponse::from(result)))
}

/// GET /api/payments/:payment_id/details
pub async fn get_payment_details(
    State(state): State<BillingAppState>,
    user: AuthenticatedUser,
    Path(payment_id): Path<String>,
) -> Result<impl IntoResponse, BillingApiError> {
    let payment_id = Uuid::parse_str(&payment_id)
        .map(PaymentId::from_uuid)
        .map_err(|_| BillingError::validation("payment_id", "must be a UUID"))?;
    let query = GetPaymentDetailsQuery {
        user_id: user.user_id,
        payment_id,
    };

    let result = state.details_handler().handle(query).await?;

    Ok(Json(result))
}

/// GET /api/payments/mine
pub async fn list_my_payments(
    State(state): State<BillingAppState>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, BillingApiError> {
    let query = GetUserPaymentsQuery {
        user_id: user.user_id,
    };

    let result = state.payments_handler().handle(query).await?;

    Ok(Json(PaymentListResponse::from(result.payments)))
}

/// GET /api/payments/mine/stats
pub async fn get_my_payment_stats(
    State(state): State<BillingAppState>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, BillingApiError> {
    let query = GetUserPaymentStatsQuery {
        user_id: user.user_id,
    };

    let stats = state.stats_handler().handle(query).await?;

    Ok(Json(PaymentStatsResponse::from(stats)))
}

fn is_ping(body: &[u8]) -> bool {
    let text = String::from_utf8_lossy(body);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return true;
    }
    matches!(
        serde_json::from_str::<serde_json::Value>(trimmed),
        Ok(serde_json::Value::Object(map)) if map.is_empty()
    )
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// Converts billing errors into JSON error responses.
#[derive(Debug)]
pub struct BillingApiError(BillingError);

impl From<BillingError> for BillingApiError {
    fn from(err: BillingError) -> Self {
        Self(err)
    }
}

impl BillingApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            BillingError::NotFound { .. } => StatusCode::NOT_FOUND,
            BillingError::AlreadySubscribed { .. } => StatusCode::CONFLICT,
            BillingError::InvalidState { .. } => StatusCode::BAD_REQUEST,
            BillingError::ValidationFailed { .. } => StatusCode::BAD_REQUEST,
            BillingError::Verification(_) => StatusCode::UNAUTHORIZED,
            BillingError::Forbidden(_) => StatusCode::FORBIDDEN,
            BillingError::Provider { .. } => StatusCode::BAD_GATEWAY,
            BillingError::Infrastructure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for BillingApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, status = status.as_u16(), "Request failed");
        }

        let body = ErrorResponse::new(self.0.code().to_string(), self.0.message());
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::PlanId;

    #[test]
    fn empty_bodies_are_pings() {
        assert!(is_ping(b""));
        assert!(is_ping(b"  \n"));
        assert!(is_ping(b"{}"));
        assert!(!is_ping(b"{\"code\":\"00\"}"));
        assert!(!is_ping(b"not json"));
    }

    #[test]
    fn error_statuses_follow_the_billing_mapping() {
        let cases = [
            (BillingError::not_found("payment", "1"), StatusCode::NOT_FOUND),
            (BillingError::already_subscribed(PlanId::new()), StatusCode::CONFLICT),
            (BillingError::invalid_state("completed", "cancel"), StatusCode::BAD_REQUEST),
            (BillingError::validation("plan_id", "bad"), StatusCode::BAD_REQUEST),
            (BillingError::verification("bad signature"), StatusCode::UNAUTHORIZED),
            (BillingError::forbidden("not yours"), StatusCode::FORBIDDEN),
            (BillingError::provider("down", true), StatusCode::BAD_GATEWAY),
            (BillingError::infrastructure("db"), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(BillingApiError::from(err).status(), expected);
        }
    }

    #[test]
    fn error_response_uses_error_code() {
        let response = BillingApiError::from(BillingError::not_found("payment", "42")).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
