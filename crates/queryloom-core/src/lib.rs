//! Workflow engine, domain logic, and repository trait definitions for
//! Queryloom.
//!
//! This crate defines the "ports" (repository and backend traits) that the
//! infrastructure layer implements. It depends only on `queryloom-types` --
//! never on `queryloom-infra` or any database/IO crate.

pub mod engine;
pub mod event;
pub mod query;
pub mod repository;
pub mod service;
