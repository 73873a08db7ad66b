//! wakegate-api — HTTP intake for proxy events.
//!
//! The proxy posts connection attempts, joins and disconnects here and acts
//! on the verdict. Operators read lifecycle status and manage the allow-list
//! through the same router.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/api/v1/events/connect` | Decide a pending connection |
//! | POST | `/api/v1/events/join` | Player finished connecting |
//! | POST | `/api/v1/events/disconnect` | Player left |
//! | GET | `/api/v1/lifecycle` | Controller snapshot |
//! | GET | `/api/v1/whitelist` | List allowed players |
//! | POST | `/api/v1/whitelist` | Add a player (operator only) |
//! | DELETE | `/api/v1/whitelist/{name}?operator=` | Remove a player (operator only) |

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};
use wakegate_access::AllowList;
use wakegate_gate::ConnectionGate;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub gate: ConnectionGate,
    pub allow_list: Arc<AllowList>,
}

/// Build the complete API router.
pub fn build_router(gate: ConnectionGate, allow_list: Arc<AllowList>) -> Router {
    let state = ApiState { gate, allow_list };

    let api_routes = Router::new()
        .route("/events/connect", post(handlers::connect))
        .route("/events/join", post(handlers::join))
        .route("/events/disconnect", post(handlers::disconnect))
        .route("/lifecycle", get(handlers::lifecycle))
        .route("/whitelist", get(handlers::list_whitelist).post(handlers::add_to_whitelist))
        .route("/whitelist/{name}", delete(handlers::remove_from_whitelist))
        .with_state(state);

    Router::new().nest("/api/v1", api_routes)
}
