// HTTP handlers for the order endpoints

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::auth::middleware::{AdminUser, AuthenticatedCustomer};
use crate::auth::token::Role;
use crate::orders::error::OrderError;
use crate::orders::models::{
    AnalyticsQuery, CreateOrderRequest, OrderAnalytics, OrderListQuery, OrderListResponse,
    OrderResponse, OrderSnapshot, UpdateStatusRequest,
};
use crate::orders::service::Actor;

fn actor_for(customer: &AuthenticatedCustomer) -> Actor {
    match customer.role {
        Role::Admin => Actor::Admin,
        Role::Customer => Actor::Customer(customer.customer_id),
    }
}

/// Handler for POST /api/orders
/// Creates an order for the authenticated customer
pub async fn create_order_handler(
    State(state): State<crate::AppState>,
    customer: AuthenticatedCustomer,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), OrderError> {
    let order = state
        .order_service
        .create_order(customer.customer_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// Handler for GET /api/orders
/// Customers see their own orders; admins see all orders
pub async fn list_orders_handler(
    State(state): State<crate::AppState>,
    customer: AuthenticatedCustomer,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<OrderListResponse>, OrderError> {
    let orders = state
        .order_service
        .list_orders(query, actor_for(&customer))
        .await?;
    Ok(Json(orders))
}

/// Handler for GET /api/orders/{id}
pub async fn get_order_handler(
    State(state): State<crate::AppState>,
    customer: AuthenticatedCustomer,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderResponse>, OrderError> {
    let order = state
        .order_service
        .get_order(order_id, actor_for(&customer))
        .await?;
    Ok(Json(order))
}

/// Handler for GET /api/orders/{id}/snapshot (admin)
/// Returns the customer data captured at order time
pub async fn get_order_snapshot_handler(
    State(state): State<crate::AppState>,
    _admin: AdminUser,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderSnapshot>, OrderError> {
    let snapshot = state.order_service.get_snapshot(order_id).await?;
    Ok(Json(snapshot))
}

/// Handler for PATCH /api/orders/{id}/status (admin)
pub async fn update_order_status_handler(
    State(state): State<crate::AppState>,
    _admin: AdminUser,
    Path(order_id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<OrderResponse>, OrderError> {
    let order = state
        .order_service
        .update_status(order_id, request.status, request.notes, Actor::Admin)
        .await?;
    Ok(Json(order))
}

/// Handler for POST /api/orders/{id}/cancel
/// Customers may cancel their own pending orders; admins any active order
pub async fn cancel_order_handler(
    State(state): State<crate::AppState>,
    customer: AuthenticatedCustomer,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderResponse>, OrderError> {
    let order = state
        .order_service
        .cancel_order(order_id, actor_for(&customer))
        .await?;
    Ok(Json(order))
}

/// Handler for GET /api/orders/analytics (admin)
pub async fn get_order_analytics_handler(
    State(state): State<crate::AppState>,
    _admin: AdminUser,
    Query(window): Query<AnalyticsQuery>,
) -> Result<Json<OrderAnalytics>, OrderError> {
    let analytics = state.order_service.analytics(window).await?;
    Ok(Json(analytics))
}

/// Handler for GET /api/orders/export (admin)
/// Streams recent orders as a CSV attachment
pub async fn export_orders_handler(
    State(state): State<crate::AppState>,
    _admin: AdminUser,
) -> Result<impl IntoResponse, OrderError> {
    let csv = state.order_service.export_csv().await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"orders.csv\"",
            ),
        ],
        csv,
    ))
}
