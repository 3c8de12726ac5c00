//! HTTP API for the Bazaar daemon.
//!
//! Provides REST endpoints for:
//! - Health check
//! - Checkout and order status changes
//! - Return eligibility, requests and status changes
//! - Approval queue (list, approve, reject)
//! - Audit trail reads
//!
//! Authentication happens upstream. The caller's identity arrives in the
//! `x-actor-id`, `x-actor-name` and `x-actor-role` headers and is turned into
//! an [`Actor`] once, here.

use axum::{
    async_trait,
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use bazaar_audit::AuditEvent;
use bazaar_domain::{Actor, ApprovalRequest, LineItemId, Order, ReturnDetails, ReturnReason, ReturnRequest, Role};
use bazaar_engine::{IneligibilityReason, ReturnEligibility};
use bazaar_exec::{
    Commerce, CreateOrderRequest, ErrorKind, ExecError, GateOutcome, OrderStatusCommand,
    ReturnStatusCommand,
};

// =============================================================================
// API State
// =============================================================================

/// Shared state for API handlers.
pub struct ApiState {
    pub commerce: Arc<Commerce>,
}

// =============================================================================
// Request/Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Customer return request body.
#[derive(Debug, Deserialize)]
pub struct ReturnRequestBody {
    pub line_item_id: LineItemId,
    pub reason: ReturnReason,
    #[serde(flatten)]
    pub details: ReturnDetails,
}

/// Rejection body.
#[derive(Debug, Default, Deserialize)]
pub struct RejectBody {
    #[serde(default)]
    pub reason: Option<String>,
}

/// Approval outcome with the replayed command's result.
#[derive(Debug, Serialize)]
pub struct ApproveResponse {
    pub approval: ApprovalRequest,
    pub result: serde_json::Value,
}

/// Audit query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct AuditParams {
    pub limit: Option<i64>,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasons: Option<Vec<IneligibilityReason>>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

// =============================================================================
// Actor Extraction
// =============================================================================

/// Caller identity from the trusted upstream headers.
pub struct CurrentActor(pub Actor);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentActor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        let id = header("x-actor-id")
            .and_then(|v| Uuid::parse_str(&v).ok())
            .ok_or_else(|| unauthenticated("missing or invalid x-actor-id header"))?;
        let role = header("x-actor-role")
            .ok_or_else(|| unauthenticated("missing x-actor-role header"))
            .and_then(|v| Role::from_str(&v).map_err(|e| unauthenticated(&e.to_string())))?;
        let name = header("x-actor-name").unwrap_or_else(|| id.to_string());

        Ok(CurrentActor(Actor::with_role(id, name, role)))
    }
}

fn unauthenticated(message: &str) -> ApiError {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse {
            error: message.to_string(),
            code: "UNAUTHENTICATED",
            reasons: None,
        }),
    )
}

// =============================================================================
// Router
// =============================================================================

/// Create the API router.
pub fn create_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/orders", post(create_order_handler))
        .route("/orders/:id", get(get_order_handler))
        .route("/orders/:id/status", post(order_status_handler))
        .route("/orders/:id/return-eligibility", get(eligibility_handler))
        .route("/orders/:id/returns", get(order_returns_handler).post(request_return_handler))
        .route("/orders/:id/audit", get(order_audit_handler))
        .route("/returns/:id", get(get_return_handler))
        .route("/returns/:id/status", post(return_status_handler))
        .route("/approvals", get(pending_approvals_handler))
        .route("/approvals/:id", get(get_approval_handler))
        .route("/approvals/:id/approve", post(approve_handler))
        .route("/approvals/:id/reject", post(reject_handler))
        .route("/audit/:target_id", get(target_audit_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint.
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn create_order_handler(
    State(state): State<Arc<ApiState>>,
    CurrentActor(actor): CurrentActor,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let order = state
        .commerce
        .create_order(&actor, req)
        .await
        .map_err(to_error_response)?;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn get_order_handler(
    State(state): State<Arc<ApiState>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, ApiError> {
    let order = state.commerce.get_order(id, &actor).await.map_err(to_error_response)?;
    Ok(Json(order))
}

/// Change order status; 202 when the change was parked for approval.
async fn order_status_handler(
    State(state): State<Arc<ApiState>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
    Json(cmd): Json<OrderStatusCommand>,
) -> Result<Response, ApiError> {
    let outcome = state
        .commerce
        .transition_order_status(id, cmd.status, cmd.input, &actor)
        .await
        .map_err(to_error_response)?;
    Ok(gate_response(outcome))
}

async fn eligibility_handler(
    State(state): State<Arc<ApiState>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ReturnEligibility>>, ApiError> {
    let report = state
        .commerce
        .return_eligibility(id, &actor)
        .await
        .map_err(to_error_response)?;
    Ok(Json(report))
}

async fn order_returns_handler(
    State(state): State<Arc<ApiState>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ReturnRequest>>, ApiError> {
    let requests = state
        .commerce
        .returns_for_order(id, &actor)
        .await
        .map_err(to_error_response)?;
    Ok(Json(requests))
}

async fn request_return_handler(
    State(state): State<Arc<ApiState>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
    Json(body): Json<ReturnRequestBody>,
) -> Result<(StatusCode, Json<ReturnRequest>), ApiError> {
    let request = state
        .commerce
        .request_return(id, body.line_item_id, body.reason, body.details, &actor)
        .await
        .map_err(to_error_response)?;
    Ok((StatusCode::CREATED, Json(request)))
}

async fn order_audit_handler(
    State(state): State<Arc<ApiState>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<AuditEvent>>, ApiError> {
    let events = state
        .commerce
        .audit_for_order(id, &actor)
        .await
        .map_err(to_error_response)?;
    Ok(Json(events))
}

async fn target_audit_handler(
    State(state): State<Arc<ApiState>>,
    CurrentActor(actor): CurrentActor,
    Path(target_id): Path<Uuid>,
    Query(params): Query<AuditParams>,
) -> Result<Json<Vec<AuditEvent>>, ApiError> {
    let events = state
        .commerce
        .audit_for_target(target_id, params.limit, &actor)
        .await
        .map_err(to_error_response)?;
    Ok(Json(events))
}

async fn get_return_handler(
    State(state): State<Arc<ApiState>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> Result<Json<ReturnRequest>, ApiError> {
    let request = state.commerce.get_return(id, &actor).await.map_err(to_error_response)?;
    Ok(Json(request))
}

/// Change return status; 202 when the change was parked for approval.
async fn return_status_handler(
    State(state): State<Arc<ApiState>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
    Json(cmd): Json<ReturnStatusCommand>,
) -> Result<Response, ApiError> {
    let outcome = state
        .commerce
        .transition_return_status(id, cmd.status, cmd.input, &actor)
        .await
        .map_err(to_error_response)?;
    Ok(gate_response(outcome))
}

async fn pending_approvals_handler(
    State(state): State<Arc<ApiState>>,
    CurrentActor(actor): CurrentActor,
) -> Result<Json<Vec<ApprovalRequest>>, ApiError> {
    let pending = state
        .commerce
        .pending_approvals(&actor)
        .await
        .map_err(to_error_response)?;
    Ok(Json(pending))
}

async fn get_approval_handler(
    State(state): State<Arc<ApiState>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> Result<Json<ApprovalRequest>, ApiError> {
    let request = state.commerce.get_approval(id, &actor).await.map_err(to_error_response)?;
    Ok(Json(request))
}

async fn approve_handler(
    State(state): State<Arc<ApiState>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> Result<Json<ApproveResponse>, ApiError> {
    let (approval, result) = state.commerce.approve(id, &actor).await.map_err(to_error_response)?;
    Ok(Json(ApproveResponse { approval, result }))
}

async fn reject_handler(
    State(state): State<Arc<ApiState>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
    body: Option<Json<RejectBody>>,
) -> Result<Json<ApprovalRequest>, ApiError> {
    let reason = body.and_then(|Json(b)| b.reason);
    let request = state
        .commerce
        .reject(id, &actor, reason)
        .await
        .map_err(to_error_response)?;
    Ok(Json(request))
}

// =============================================================================
// Helpers
// =============================================================================

fn gate_response<T: Serialize>(outcome: GateOutcome<T>) -> Response {
    match outcome {
        GateOutcome::Applied(entity) => (StatusCode::OK, Json(entity)).into_response(),
        GateOutcome::PendingApproval(request) => (StatusCode::ACCEPTED, Json(request)).into_response(),
    }
}

fn to_error_response(error: ExecError) -> ApiError {
    let kind = error.kind();
    let (status, code) = match kind {
        ErrorKind::InsufficientStock => (StatusCode::UNPROCESSABLE_ENTITY, "INSUFFICIENT_STOCK"),
        ErrorKind::IneligibleReturn => (StatusCode::UNPROCESSABLE_ENTITY, "INELIGIBLE_RETURN"),
        ErrorKind::Conflict => (StatusCode::CONFLICT, "CONFLICT"),
        ErrorKind::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        ErrorKind::Unauthorized => (StatusCode::FORBIDDEN, "UNAUTHORIZED"),
        ErrorKind::Invalid => (StatusCode::BAD_REQUEST, "INVALID"),
        ErrorKind::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL"),
    };

    if kind == ErrorKind::Internal {
        tracing::error!(error = %error, "Request failed");
    }

    let reasons = match &error {
        ExecError::IneligibleReturn { reasons, .. } => Some(reasons.clone()),
        _ => None,
    };

    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            code,
            reasons,
        }),
    )
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use bazaar_domain::OrderStatus;
    use bazaar_testkit::{admin, customer, product, super_admin, Harness};
    use http_body_util::BodyExt;
    use rust_decimal_macros::dec;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app(h: &Harness) -> Router {
        create_router(Arc::new(ApiState {
            commerce: h.commerce.clone(),
        }))
    }

    fn request(method: &str, uri: &str, actor: Option<&Actor>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(actor) = actor {
            builder = builder
                .header("x-actor-id", actor.id.to_string())
                .header("x-actor-name", actor.display_name.clone())
                .header("x-actor-role", actor.role.clone());
        }
        match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn checkout(product_id: Uuid, quantity: u32) -> Value {
        json!({
            "items": [{ "product_id": product_id, "quantity": quantity }],
            "shipping_address": {
                "recipient": "Ana Costa",
                "street": "12 Harbour Road",
                "city": "Porto",
                "postal_code": "4000-123",
                "country": "PT"
            },
            "payment_method": "CARD"
        })
    }

    #[tokio::test]
    async fn test_health() {
        let h = Harness::new();
        let (status, body) = send(&app(&h), request("GET", "/health", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_missing_identity_is_rejected() {
        let h = Harness::new();
        let (status, body) = send(&app(&h), request("GET", &format!("/orders/{}", Uuid::now_v7()), None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "UNAUTHENTICATED");
    }

    #[tokio::test]
    async fn test_checkout_and_shortage() {
        let h = Harness::new();
        let id = h.seed(product("Kettle", dec!(30), 2)).await.unwrap();
        let app = app(&h);
        let buyer = customer("Rui");

        let (status, body) = send(&app, request("POST", "/orders", Some(&buyer), Some(checkout(id, 2)))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "CREATED");
        assert_eq!(body["customer_id"], json!(buyer.id));

        let (status, body) = send(&app, request("POST", "/orders", Some(&buyer), Some(checkout(id, 1)))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "INSUFFICIENT_STOCK");
        assert_eq!(h.stock(id), Some(0));
    }

    #[tokio::test]
    async fn test_status_changes_map_to_http() {
        let h = Harness::new();
        let id = h.seed(product("Lamp", dec!(40), 3)).await.unwrap();
        let app = app(&h);
        let buyer = customer("Ida");
        let order = h.place(&buyer, &[(id, 1)]).await.unwrap();
        let uri = format!("/orders/{}/status", order.id);

        // Customers may not change status
        let (status, _) = send(&app, request("POST", &uri, Some(&buyer), Some(json!({ "status": "PAID" })))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        // Admin changes are parked
        let clerk = admin("Clerk");
        let (status, body) = send(&app, request("POST", &uri, Some(&clerk), Some(json!({ "status": "CANCELLED" })))).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["status"], "PENDING");
        assert_eq!(body["action"], "ORDER_STATUS_CHANGE");

        // Top privilege applies directly
        let boss = super_admin("Boss");
        let paid = json!({ "status": "PAID", "payment_result": { "provider": "card", "reference": "ch_1" } });
        let (status, body) = send(&app, request("POST", &uri, Some(&boss), Some(paid.clone()))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["is_paid"], true);

        let (status, body) = send(&app, request("POST", &uri, Some(&boss), Some(paid))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "CONFLICT");
        assert_eq!(h.commerce.get_order(order.id, &boss).await.unwrap().status, OrderStatus::Paid);
    }

    #[tokio::test]
    async fn test_approval_flow_over_http() {
        let h = Harness::new();
        let id = h.seed(product("Desk", dec!(150), 1)).await.unwrap();
        let app = app(&h);
        let order = h.place(&customer("Kai"), &[(id, 1)]).await.unwrap();

        let clerk = admin("Clerk");
        let (_, pending) = send(
            &app,
            request("POST", &format!("/orders/{}/status", order.id), Some(&clerk), Some(json!({ "status": "CANCELLED" }))),
        )
        .await;
        let approval_id = pending["id"].as_str().unwrap().to_string();

        let (status, _) = send(&app, request("GET", "/approvals", Some(&clerk), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let boss = super_admin("Boss");
        let (status, body) = send(&app, request("GET", "/approvals", Some(&boss), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(1));

        let (status, body) = send(
            &app,
            request("POST", &format!("/approvals/{}/approve", approval_id), Some(&boss), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["approval"]["status"], "APPROVED");
        assert_eq!(body["result"]["status"], "CANCELLED");
        assert_eq!(h.stock(id), Some(1));

        let (status, body) = send(&app, request("GET", &format!("/orders/{}/audit", order.id), Some(&boss), None)).await;
        assert_eq!(status, StatusCode::OK);
        let actions: Vec<_> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["action"].as_str().unwrap_or_default().to_string())
            .collect();
        assert!(actions.contains(&"ORDER_CREATED".to_string()));
        assert!(actions.contains(&"ORDER_STATUS_CHANGED".to_string()));
    }

    #[tokio::test]
    async fn test_ineligible_return_lists_reasons() {
        let h = Harness::new();
        let id = h.seed(product("Scarf", dec!(20), 2)).await.unwrap();
        let app = app(&h);
        let buyer = customer("Eve");
        let order = h.place(&buyer, &[(id, 1)]).await.unwrap();

        let body = json!({ "line_item_id": order.items[0].id, "reason": "DAMAGED" });
        let (status, body) = send(
            &app,
            request("POST", &format!("/orders/{}/returns", order.id), Some(&buyer), Some(body)),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "INELIGIBLE_RETURN");
        assert_eq!(body["reasons"][0]["code"], "NOT_DELIVERED");
    }

    #[tokio::test]
    async fn test_unknown_order_is_not_found() {
        let h = Harness::new();
        let boss = super_admin("Boss");
        let (status, body) = send(
            &app(&h),
            request("GET", &format!("/orders/{}", Uuid::now_v7()), Some(&boss), None),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");
    }
}
