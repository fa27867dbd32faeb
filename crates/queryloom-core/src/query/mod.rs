//! SQL generation and execution: the domain behind the workflow.
//!
//! - `generator` -- the strategy port one producer node wraps
//! - `executor` -- the database port the run node wraps
//! - `retry` -- bounded retry for flaky generator backends
//! - `flow` -- assembles the full review workflow graph

pub mod executor;
pub mod flow;
pub mod generator;
pub mod retry;
