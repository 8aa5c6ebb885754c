//! FlowMate server library: state, sessions and the HTTP router.
//!
//! The binary in `main.rs` wires real backends; integration tests build the
//! same router over in-process fakes.

pub mod error;
pub mod routes;
pub mod session;
pub mod state;

pub use routes::build_router;
pub use state::AppState;
