//! Policy layer for the CORD decision engine.
//!
//! Two concerns live here, single-sourced so the engine and its tests cannot
//! drift apart:
//! - `tables`: weights, thresholds, compiled pattern tables, keyword lists,
//!   tool risk tiers, and action-type hints.
//! - `normalize`: anti-obfuscation normalization applied to every input
//!   before any pattern runs.
//!
//! This crate is pure: no I/O, no clocks, no global mutable state.

pub mod normalize;
pub mod tables;
