// web-server/src/lib.rs
pub mod api;
pub mod middleware;
pub mod state;

pub use api::error::ApiError;
pub use middleware::access_key_gate::AccessKeyGate;
pub use state::AppState;
