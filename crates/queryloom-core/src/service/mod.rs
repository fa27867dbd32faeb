//! Business logic services (use cases).
//!
//! Services orchestrate engine calls and input validation. They depend on
//! traits (ports) -- never on concrete infrastructure implementations.

pub mod session;

pub use session::{SessionError, SessionService};
