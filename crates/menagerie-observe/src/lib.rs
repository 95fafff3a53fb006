//! Observability setup for Menagerie.

pub mod tracing_setup;
