//! Conclave Supervisor — process wiring and HTTP surface for the orchestration core.

pub mod auth;
pub mod collaborators;
pub mod server;
pub mod wiring;

pub use server::AppState;
pub use wiring::{build_supervisor, Supervisor};
