//! Infrastructure layer for Queryloom.
//!
//! Contains implementations of the ports defined in `queryloom-core`:
//! SQLite checkpoint storage, the OpenAI-backed query generators, the MySQL
//! query executor, schema context assembly, and configuration loading.

pub mod config;
pub mod llm;
pub mod memory;
pub mod mysql;
pub mod schema;
pub mod sqlite;
