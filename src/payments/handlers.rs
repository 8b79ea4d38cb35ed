// HTTP handlers for the payment endpoints
//
// The web callback is a browser redirect target, so it never returns JSON
// errors: whatever happens, the shopper lands back on the storefront with
// the outcome in the query string. The mobile callback returns plain JSON
// for the app to act on.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Redirect,
    Json,
};
use uuid::Uuid;

use crate::auth::middleware::{AdminUser, AuthenticatedCustomer};
use crate::config;
use crate::payments::error::PaymentError;
use crate::payments::models::{
    CallbackOutcome, CallbackQuery, CreatePaymentRequest, CreatePaymentResponse,
    PaymentStatusResponse,
};

/// Handler for POST /api/payments
/// Opens a hosted-payment session for one of the customer's orders
pub async fn create_payment_handler(
    State(state): State<crate::AppState>,
    customer: AuthenticatedCustomer,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<CreatePaymentResponse>), PaymentError> {
    let session = state
        .payment_service
        .create_payment(customer.customer_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// Handler for GET /api/payments/callback
/// Gateway redirect target for web checkouts
pub async fn payment_callback_handler(
    State(state): State<crate::AppState>,
    Query(query): Query<CallbackQuery>,
) -> Redirect {
    let frontend = config::frontend_url();

    let gateway_ref = match query.gateway_ref {
        Some(gateway_ref) => gateway_ref,
        None => {
            tracing::warn!("payment callback without gateway reference");
            return Redirect::to(&format!("{}/checkout?payment=error", frontend));
        }
    };

    let outcome = if query.cancelled {
        state.payment_service.reconcile_cancelled(&gateway_ref).await
    } else {
        state.payment_service.reconcile(&gateway_ref).await
    };

    match outcome {
        Ok(outcome) if outcome.succeeded() => Redirect::to(&format!(
            "{}/order-confirmation?orderNumber={}",
            frontend, outcome.order_number
        )),
        Ok(outcome) => Redirect::to(&format!(
            "{}/checkout?payment=failed&orderNumber={}",
            frontend, outcome.order_number
        )),
        Err(err) => {
            tracing::error!(%gateway_ref, error = %err, "payment callback failed");
            Redirect::to(&format!("{}/checkout?payment=error", frontend))
        }
    }
}

/// Handler for GET /api/payments/mobile-callback
/// Gateway redirect target for the mobile app's in-app browser
pub async fn mobile_callback_handler(
    State(state): State<crate::AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Json<CallbackOutcome>, PaymentError> {
    let gateway_ref = query
        .gateway_ref
        .ok_or_else(|| PaymentError::InvalidState("Missing gateway reference".to_string()))?;

    let outcome = if query.cancelled {
        state.payment_service.reconcile_cancelled(&gateway_ref).await?
    } else {
        state.payment_service.reconcile(&gateway_ref).await?
    };

    Ok(Json(outcome))
}

/// Handler for GET /api/payments/{gateway_ref}/status
pub async fn get_payment_status_handler(
    State(state): State<crate::AppState>,
    _customer: AuthenticatedCustomer,
    Path(gateway_ref): Path<String>,
) -> Result<Json<PaymentStatusResponse>, PaymentError> {
    let status = state.payment_service.get_status(&gateway_ref).await?;
    Ok(Json(status))
}

/// Handler for POST /api/orders/{id}/refund (admin)
pub async fn refund_payment_handler(
    State(state): State<crate::AppState>,
    _admin: AdminUser,
    Path(order_id): Path<Uuid>,
) -> Result<Json<PaymentStatusResponse>, PaymentError> {
    let payment = state.payment_service.refund(order_id).await?;
    Ok(Json(payment))
}
