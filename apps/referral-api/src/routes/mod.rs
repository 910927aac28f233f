//! Route table.
//!
//! ```text
//! /health                                   GET
//! /v1/settings                              GET PUT
//! /v1/codes                                 GET              (admin list)
//! /v1/codes/preview?code=&amount=           GET              (checkout)
//! /v1/codes/{id}                            GET PATCH DELETE
//! /v1/marketers/{id}/codes                  GET POST
//! /v1/marketers/{id}/codes/{code_id}        PATCH DELETE     (owner only)
//! /v1/marketers/{id}/commissions            GET
//! /v1/marketers/{id}/summary                GET
//! /v1/purchases                             POST
//! /v1/purchases/{id}                        GET
//! /v1/purchases/{id}/finalize|fail|refund|reprice   POST
//! /v1/commissions                           GET
//! /v1/commissions/pending-total             GET
//! /v1/commissions/{id}/pay|cancel           POST
//! /v1/marketer-requests                     GET POST
//! /v1/marketer-requests/{id}                GET
//! /v1/marketer-requests/{id}/review         POST
//! /v1/marketer-requests/{id}/resync-role    POST
//! /v1/users/{id}/marketer-request           GET
//! ```

pub mod codes;
pub mod commissions;
pub mod health;
pub mod purchases;
pub mod requests;
pub mod settings;

use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::AppState;

/// Builds the application router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        // Settings
        .route("/v1/settings", get(settings::get_settings).put(settings::update_settings))
        // Codes
        .route("/v1/codes", get(codes::list_codes))
        .route("/v1/codes/preview", get(codes::preview_discount))
        .route(
            "/v1/codes/{id}",
            get(codes::get_code)
                .patch(codes::update_code)
                .delete(codes::delete_code),
        )
        .route(
            "/v1/marketers/{id}/codes",
            get(codes::list_marketer_codes).post(codes::create_code),
        )
        .route(
            "/v1/marketers/{id}/codes/{code_id}",
            patch(codes::update_own_code).delete(codes::delete_own_code),
        )
        // Ledger
        .route("/v1/marketers/{id}/commissions", get(commissions::list_for_marketer))
        .route("/v1/marketers/{id}/summary", get(commissions::marketer_summary))
        .route("/v1/commissions", get(commissions::list_all))
        .route("/v1/commissions/pending-total", get(commissions::pending_total))
        .route("/v1/commissions/{id}/pay", post(commissions::mark_paid))
        .route("/v1/commissions/{id}/cancel", post(commissions::cancel))
        // Purchases
        .route("/v1/purchases", post(purchases::create_purchase))
        .route("/v1/purchases/{id}", get(purchases::get_purchase))
        .route("/v1/purchases/{id}/finalize", post(purchases::finalize))
        .route("/v1/purchases/{id}/fail", post(purchases::mark_failed))
        .route("/v1/purchases/{id}/refund", post(purchases::refund))
        .route("/v1/purchases/{id}/reprice", post(purchases::reprice))
        // Marketer requests
        .route(
            "/v1/marketer-requests",
            get(requests::list_requests).post(requests::submit_request),
        )
        .route("/v1/marketer-requests/{id}", get(requests::get_request))
        .route("/v1/marketer-requests/{id}/review", post(requests::review_request))
        .route("/v1/marketer-requests/{id}/resync-role", post(requests::resync_role))
        .route("/v1/users/{id}/marketer-request", get(requests::latest_for_user))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
