// src/services/mod.rs

pub mod audit;
pub mod checks;
pub mod intent_lock;
pub mod interceptor;
pub mod pipeline; // orchestrates the 9-step evaluation
pub mod scoring;

// Public API
pub use intent_lock::{load_intent_lock, set_intent_lock, verify_passphrase, IntentLock, Scope};
pub use interceptor::{
    build_proposal, guard, guard_registry, Enforcer, GuardedRegistry, ToolCall, ToolError,
};
pub use pipeline::Engine;
