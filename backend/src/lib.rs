//! Tea Ledger - inventory-ledger consistency engine
//!
//! Keeps stock lot weights and bag counts consistent with the shipments that
//! consume them, with an append-only audit trail for every movement.

use std::sync::Arc;

use axum::{routing::get, Router};
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod services;

pub use config::Config;

use db::{PgStore, RetryPolicy};
use services::{AssignmentService, HistoryService, ShipmentService, StockService};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: PgStore,
    pub config: Arc<Config>,
    pub policy: RetryPolicy,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        Self {
            store: PgStore::new(pool),
            policy: RetryPolicy::from_config(&config.ledger),
            config: Arc::new(config),
        }
    }

    pub fn stock_service(&self) -> StockService<PgStore> {
        StockService::new(self.store.clone(), self.policy)
    }

    pub fn assignment_service(&self) -> AssignmentService<PgStore> {
        AssignmentService::new(self.store.clone(), self.policy)
    }

    pub fn shipment_service(&self) -> ShipmentService<PgStore> {
        ShipmentService::new(self.store.clone(), self.policy)
    }

    pub fn history_service(&self) -> HistoryService<PgStore> {
        HistoryService::new(self.store.clone(), self.policy)
    }
}

/// Create the application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .nest("/api/v1", routes::api_routes(state.clone()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "Tea Ledger API v1"
}
