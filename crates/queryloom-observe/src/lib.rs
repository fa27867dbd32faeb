//! Observability for Queryloom: tracing setup and OpenTelemetry GenAI
//! attribute constants.

pub mod genai_attrs;
pub mod tracing_setup;
