//! CORD, an in-process policy decision engine.
//!
//! Every proposed agent action is rendered as a [`Proposal`], evaluated
//! against a fixed catalogue of risk dimensions, and answered with a
//! [`Verdict`] (ALLOW / CONTAIN / CHALLENGE / BLOCK). Every verdict is
//! appended to a hash-chained audit log.
//!
//! The engine is a guard rail, not a reasoner: it never executes actions and
//! never talks to the network. Enforcement happens at the [`services::
//! interceptor`] boundary, which is the only place that raises.

pub mod config;
pub mod models;
pub mod services;
pub mod utils;

pub use config::{Config, RedactionLevel};
pub use models::{ActionType, CheckResult, Decision, Proposal, Source, Verdict};
pub use services::pipeline::Engine;
