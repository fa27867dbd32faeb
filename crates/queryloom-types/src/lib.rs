//! Shared domain types for Queryloom.
//!
//! This crate contains the core domain types used across the platform:
//! workflow state, checkpoints, generator wire types, engine events, and
//! their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror,
//! and schemars.

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod event;
pub mod query;
pub mod state;
