//! HTTP surface for the coaching backend:
//! - GET /ws - WebSocket upgrade for the extension connection
//! - GET /health - Health check with active-session gauge

mod handlers;
mod routes;
mod state;
mod ws;

pub use routes::create_router;
pub use state::AppState;
