//! Workflow engine core: graph model, durable walk loop, and checkpointing.
//!
//! This module contains the "brain" of the orchestrator:
//! - `graph` -- typed node/edge model, builder, build-time validation
//! - `checkpoint` -- durable checkpoint manager over the repository port
//! - `executor` -- the walk loop: merge, route, fan out, suspend, complete

pub mod checkpoint;
pub mod executor;
pub mod graph;
