//! FundTrack API - HTTP surface and service wiring
//!
//! Wires the ledger mirror, utilization workflow, and grievance intake into
//! one axum application. Authentication is an external collaborator: the
//! caller identity arrives in `x-agency` / `x-user` headers injected by
//! whatever terminates auth in front of this service.

mod context;
mod error;
mod routes;

pub use context::{AppContext, ChainMode};
pub use error::ApiError;
pub use routes::router;
