//! Stratus Server - HTTP surface for the data plane
//!
//! A hyper 1.x server exposing the namespace, upload and download services
//! under `/files`. Identity arrives pre-resolved in the `x-stratus-owner`
//! header (the auth layer lives in front of this process); every response
//! rides the `{code, message, data}` envelope except raw ZIP and stream
//! bodies.

pub mod limit;
pub mod response;
pub mod router;
pub mod server;
pub mod state;

pub use server::run;
pub use state::AppState;
