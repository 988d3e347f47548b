//! Axum router for the payment endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{
    cancel_callback, create_payment_intent, get_my_payment_stats, get_payment_details,
    get_payment_status, handle_webhook, list_my_payments, sweep_timeouts, BillingAppState,
};

/// Payment routes, relative to their mount point.
///
/// # Routes
///
/// ## User Endpoints (require `X-User-Id`)
/// - `POST /intent` - Open a checkout for a plan
/// - `GET /mine` - Caller's payment history
/// - `GET /mine/stats` - Caller's payment statistics
/// - `GET /:order_code/status` - Payment status, polling the provider while pending
/// - `GET /:payment_id/details` - Payment with subscription, plan, user and ledger
///
/// ## Provider Endpoints (no user auth)
/// - `POST /webhook` - Signed payment notifications
/// - `GET /cancel-callback/:order_code` - Redirect target when the buyer cancels
///
/// ## Admin Endpoints (require `X-Admin-Token`)
/// - `POST /admin/sweep-timeouts` - Run the timeout sweep now
pub fn billing_routes() -> Router<BillingAppState> {
    Router::new()
        .route("/intent", post(create_payment_intent))
        .route("/mine", get(list_my_payments))
        .route("/mine/stats", get(get_my_payment_stats))
        // Both lookups share one parameter name so the router sees a single
        // dynamic segment.
        .route("/:id/status", get(get_payment_status))
        .route("/:id/details", get(get_payment_details))
        .route("/webhook", post(handle_webhook))
        .route("/cancel-callback/:order_code", get(cancel_callback))
        .route("/admin/sweep-timeouts", post(sweep_timeouts))
}

/// Payment routes mounted at `/api/payments`.
pub fn billing_router() -> Router<BillingAppState> {
    Router::new().nest("/api/payments", billing_routes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::adapters::payos::MockPaymentGateway;
    use crate::application::handlers::billing::test_support::Fixture;
    use crate::application::handlers::billing::{CheckoutUrlDefaults, SweepPaymentTimeoutsCommand};
    use crate::domain::billing::{PaymentStatus, RestorationPolicy, SubscriptionStatus};
    use crate::domain::foundation::Timestamp;

    const ADMIN_TOKEN: &str = "admin-secret";

    fn app(fx: &Fixture) -> Router {
        let state = BillingAppState {
            store: Arc::new(fx.store.clone()),
            reader: Arc::new(fx.store.clone()),
            plans: Arc::new(fx.catalog.clone()),
            users: Arc::new(fx.catalog.clone()),
            gateway: Arc::new(fx.gateway.clone()),
            policy: RestorationPolicy::default(),
            urls: CheckoutUrlDefaults {
                client_url: "https://app.example.com".to_string(),
                public_url: "https://api.example.com".to_string(),
            },
            sweep: SweepPaymentTimeoutsCommand {
                threshold_minutes: 30,
                batch_size: 100,
            },
            admin_token: Some(Arc::from(ADMIN_TOKEN)),
        };
        billing_router().with_state(state)
    }

    fn get(uri: &str, user: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(user) = user {
            builder = builder.header("X-User-Id", user);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, user: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(user) = user {
            builder = builder.header("X-User-Id", user);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Intent
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn intent_requires_user_header() {
        let fx = Fixture::new().await;

        let response = app(&fx)
            .oneshot(post_json(
                "/api/payments/intent",
                None,
                json!({ "plan_id": fx.premium.id.as_uuid() }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn intent_returns_checkout_link() {
        let fx = Fixture::new().await;

        let response = app(&fx)
            .oneshot(post_json(
                "/api/payments/intent",
                Some("user-1"),
                json!({ "plan_id": fx.premium.id.as_uuid() }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["amount"], 99_000);
        assert!(body["checkout_url"].as_str().is_some());
        assert!(body["order_code"].as_i64().is_some());
        assert_eq!(fx.store.payments().await.len(), 1);
    }

    #[tokio::test]
    async fn intent_for_held_plan_is_conflict() {
        let fx = Fixture::new().await;
        fx.seed_active_subscription(fx.premium.id, Timestamp::now()).await;

        let response = app(&fx)
            .oneshot(post_json(
                "/api/payments/intent",
                Some("user-1"),
                json!({ "plan_id": fx.premium.id.as_uuid() }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(response).await["code"], "ALREADY_SUBSCRIBED");
    }

    #[tokio::test]
    async fn intent_for_unknown_plan_is_not_found() {
        let fx = Fixture::new().await;

        let response = app(&fx)
            .oneshot(post_json(
                "/api/payments/intent",
                Some("user-1"),
                json!({ "plan_id": uuid::Uuid::new_v4() }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["code"], "PLAN_NOT_FOUND");
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Webhook
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn empty_webhook_is_answered_as_ping() {
        let fx = Fixture::new().await;

        let response = app(&fx)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/payments/webhook")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["success"], true);
    }

    #[tokio::test]
    async fn paid_webhook_activates_subscription() {
        let fx = Fixture::new().await;
        let (sub, payment) = fx.seed_pending_intent(fx.premium.id, Timestamp::now()).await;
        let payload = MockPaymentGateway::webhook_payload(payment.order_code, "00", "success");

        let response = app(&fx)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/payments/webhook")
                    .header("content-type", "application/json")
                    .body(Body::from(payload))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["outcome"], "completed");
        assert_eq!(
            fx.store.subscription(sub.id).await.unwrap().status,
            SubscriptionStatus::Active
        );
    }

    #[tokio::test]
    async fn rejected_webhook_still_answers_ok() {
        let fx = Fixture::with_gateway(MockPaymentGateway::rejecting_webhooks()).await;
        let (_, payment) = fx.seed_pending_intent(fx.premium.id, Timestamp::now()).await;
        let payload = MockPaymentGateway::webhook_payload(payment.order_code, "00", "success");

        let response = app(&fx)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/payments/webhook")
                    .header("x-payos-signature", "deadbeef")
                    .body(Body::from(payload))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["outcome"], "rejected");
        assert_eq!(
            fx.store.payment(payment.id).await.unwrap().status,
            PaymentStatus::Pending
        );
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Cancel callback
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn cancel_callback_cancels_pending_payment() {
        let fx = Fixture::new().await;
        let (_, payment) = fx.seed_pending_intent(fx.premium.id, Timestamp::now()).await;

        let response = app(&fx)
            .oneshot(get(
                &format!("/api/payments/cancel-callback/{}?reason=changed%20mind", payment.order_code),
                None,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "cancelled");
        assert_eq!(body["redirect"], "https://app.example.com/payment/cancelled");
    }

    #[tokio::test]
    async fn cancel_callback_for_unknown_order_is_not_found() {
        let fx = Fixture::new().await;

        let response = app(&fx)
            .oneshot(get("/api/payments/cancel-callback/987654", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cancel_callback_with_malformed_order_code_is_bad_request() {
        let fx = Fixture::new().await;

        let response = app(&fx)
            .oneshot(get("/api/payments/cancel-callback/abc", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Queries
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn status_of_foreign_payment_is_forbidden() {
        let fx = Fixture::new().await;
        let (_, payment) = fx.seed_pending_intent(fx.premium.id, Timestamp::now()).await;

        let response = app(&fx)
            .oneshot(get(
                &format!("/api/payments/{}/status", payment.order_code),
                Some("someone-else"),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn status_reports_pending_payment() {
        let fx = Fixture::new().await;
        let (_, payment) = fx.seed_pending_intent(fx.premium.id, Timestamp::now()).await;

        let response = app(&fx)
            .oneshot(get(
                &format!("/api/payments/{}/status", payment.order_code),
                Some("user-1"),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "pending");
        assert_eq!(body["provider_status"], "PENDING");
    }

    #[tokio::test]
    async fn details_with_malformed_id_is_bad_request() {
        let fx = Fixture::new().await;

        let response = app(&fx)
            .oneshot(get("/api/payments/not-a-uuid/details", Some("user-1")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn details_include_ledger() {
        let fx = Fixture::new().await;
        let (_, payment) = fx.seed_pending_intent(fx.premium.id, Timestamp::now()).await;

        let response = app(&fx)
            .oneshot(get(&format!("/api/payments/{}/details", payment.id), Some("user-1")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["logs"].as_array().map(Vec::len), Some(1));
        assert_eq!(body["plan"]["name"], "Premium");
    }

    #[tokio::test]
    async fn mine_lists_only_callers_payments() {
        let fx = Fixture::new().await;
        fx.seed_pending_intent(fx.premium.id, Timestamp::now()).await;

        let mine = app(&fx)
            .oneshot(get("/api/payments/mine", Some("user-1")))
            .await
            .unwrap();
        let theirs = app(&fx)
            .oneshot(get("/api/payments/mine", Some("user-2")))
            .await
            .unwrap();

        assert_eq!(body_json(mine).await["total"], 1);
        assert_eq!(body_json(theirs).await["total"], 0);
    }

    #[tokio::test]
    async fn stats_count_by_status() {
        let fx = Fixture::new().await;
        fx.seed_intent(fx.premium.id, PaymentStatus::Completed, Timestamp::now()).await;
        fx.seed_intent(fx.premium.id, PaymentStatus::Failed, Timestamp::now()).await;

        let response = app(&fx)
            .oneshot(get("/api/payments/mine/stats", Some("user-1")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["total_payments"], 2);
        assert_eq!(body["successful_payments"], 1);
        assert_eq!(body["failed_payments"], 1);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Admin
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn sweep_requires_admin_token() {
        let fx = Fixture::new().await;

        let response = app(&fx)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/payments/admin/sweep-timeouts")
                    .header("X-Admin-Token", "wrong")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn sweep_times_out_stale_payments() {
        let fx = Fixture::new().await;
        let (_, payment) = fx
            .seed_pending_intent(fx.premium.id, Timestamp::now().minus_minutes(60))
            .await;

        let response = app(&fx)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/payments/admin/sweep-timeouts")
                    .header("X-Admin-Token", ADMIN_TOKEN)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["processed_count"], 1);
        assert_eq!(
            fx.store.payment(payment.id).await.unwrap().status,
            PaymentStatus::Failed
        );
    }
}
