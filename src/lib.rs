//! liftlog - workout tracker session client
//!
//! Runs a gym session against the liftlog REST API: starts workouts from a
//! routine day, logs sets optimistically, and keeps exercise and set order
//! dense on the server.

pub mod api;
pub mod config;
pub mod grouping;
pub mod models;
pub mod session;
pub mod timer;
pub mod tui;
pub mod units;

pub use config::Config;
pub use session::{SessionContext, SessionError, WorkoutSession};
