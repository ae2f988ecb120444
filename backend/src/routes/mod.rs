//! Route definitions for the tea ledger API

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Protected routes - stock lots and their assignments
        .nest("/stocks", stock_routes(state.clone()))
        // Protected routes - bulk assignment
        .nest("/assignments", assignment_routes(state.clone()))
        // Protected routes - shipment lifecycle
        .nest("/shipments", shipment_routes(state.clone()))
        // Protected routes - admin registry audit
        .nest("/admins", admin_routes(state))
}

/// Stock routes (protected)
fn stock_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_stocks).post(handlers::create_stock))
        .route("/import", post(handlers::import_stocks))
        .route("/low", get(handlers::low_stock_report))
        .route(
            "/:id",
            get(handlers::get_stock)
                .put(handlers::update_stock)
                .delete(handlers::delete_stock),
        )
        .route("/:id/adjust", post(handlers::adjust_stock))
        .route("/:id/history", get(handlers::get_stock_history))
        .route(
            "/:id/assignment",
            post(handlers::assign_stock).delete(handlers::unassign_stock),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Assignment routes (protected)
fn assignment_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/bulk", post(handlers::bulk_assign_stocks))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Shipment routes (protected)
fn shipment_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_shipments).post(handlers::create_shipment),
        )
        .route(
            "/:id",
            get(handlers::get_shipment)
                .put(handlers::update_shipment)
                .delete(handlers::delete_shipment),
        )
        .route("/:id/status", put(handlers::update_shipment_status))
        .route("/:id/history", get(handlers::get_shipment_history))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Admin registry routes (protected)
fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/history", get(handlers::get_actor_history))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
