pub mod auth;
pub mod config;
pub mod coupons;
pub mod db;
pub mod money;
pub mod notify;
pub mod orders;
pub mod payments;
pub mod rewards;

use std::sync::Arc;

use axum::{
    routing::{get, patch, post},
    Json, Router,
};
use sqlx::PgPool;

use crate::config::{DeliveryCharges, GatewayConfig};
use crate::coupons::CouponResolver;
use crate::notify::LogNotifier;
use crate::orders::{OrderService, OrdersRepository};
use crate::payments::{NgeniusGateway, PaymentService, PaymentsRepository};
use crate::rewards::{RewardService, RewardsRepository};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub order_service: OrderService,
    pub payment_service: PaymentService,
    pub reward_service: RewardService,
    pub coupon_resolver: CouponResolver,
}

/// Handler for GET /health
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Creates and configures the application router
/// Wires the repositories and services and maps all API endpoints
pub fn create_router(db: PgPool, gateway_config: GatewayConfig) -> Router {
    use tower_http::cors::{Any, CorsLayer};

    let notifier = Arc::new(LogNotifier);
    let push = notifier.clone();

    let orders_repo = OrdersRepository::new(db.clone());
    let rewards_repo = RewardsRepository::new(db.clone());
    let payments_repo = PaymentsRepository::new(db.clone());
    let coupon_resolver = CouponResolver::new(db.clone());

    let gateway = Arc::new(
        NgeniusGateway::new(gateway_config.clone()).expect("Failed to build gateway client"),
    );

    let order_service = OrderService::new(
        orders_repo.clone(),
        rewards_repo.clone(),
        coupon_resolver.clone(),
        DeliveryCharges::default(),
        notifier.clone(),
        push.clone(),
    );
    let payment_service = PaymentService::new(
        payments_repo,
        orders_repo,
        rewards_repo.clone(),
        gateway,
        notifier,
        push,
        gateway_config,
    );
    let reward_service = RewardService::new(rewards_repo);

    let state = AppState {
        db,
        order_service,
        payment_service,
        reward_service,
        coupon_resolver,
    };

    // Configure CORS to allow all origins, methods, and headers
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        // Orders
        .route(
            "/api/orders",
            post(orders::create_order_handler).get(orders::list_orders_handler),
        )
        .route("/api/orders/analytics", get(orders::get_order_analytics_handler))
        .route("/api/orders/export", get(orders::export_orders_handler))
        .route("/api/orders/:id", get(orders::get_order_handler))
        .route(
            "/api/orders/:id/snapshot",
            get(orders::get_order_snapshot_handler),
        )
        .route(
            "/api/orders/:id/status",
            patch(orders::update_order_status_handler),
        )
        .route("/api/orders/:id/cancel", post(orders::cancel_order_handler))
        .route(
            "/api/orders/:id/refund",
            post(payments::refund_payment_handler),
        )
        // Payments
        .route("/api/payments", post(payments::create_payment_handler))
        .route(
            "/api/payments/callback",
            get(payments::payment_callback_handler),
        )
        .route(
            "/api/payments/mobile-callback",
            get(payments::mobile_callback_handler),
        )
        .route(
            "/api/payments/:gateway_ref/status",
            get(payments::get_payment_status_handler),
        )
        // Rewards
        .route("/api/rewards", get(rewards::get_rewards_handler))
        .route("/api/rewards/redeem", post(rewards::redeem_points_handler))
        .route(
            "/api/rewards/history",
            get(rewards::get_reward_history_handler),
        )
        .route(
            "/api/rewards/analytics",
            get(rewards::get_rewards_analytics_handler),
        )
        .route(
            "/api/customers/:customer_id/rewards",
            get(rewards::get_customer_rewards_handler),
        )
        .route(
            "/api/customers/:customer_id/points",
            post(rewards::add_points_handler),
        )
        // Coupons
        .route(
            "/api/coupons/:code/validate",
            post(coupons::validate_coupon_handler),
        )
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    tracing::info!("Bakery API - Starting...");

    // Get configuration from environment variables
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set in environment");
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var("PORT").unwrap_or_else(|_| "8080".to_string());

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = db::create_pool(&database_url)
        .await
        .expect("Failed to create database pool");

    // Run SQLx migrations on startup
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Migrations completed successfully");

    // Create the application router
    let app = create_router(db_pool, GatewayConfig::from_env());

    // Start the Axum server
    let addr = format!("{}:{}", host, port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Bakery API is running on http://{}", addr);

    axum::serve(listener, app)
        .await
        .expect("Server error");
}

#[cfg(test)]
mod tests;
