//! Lending operations engine for loan application dashboards.

pub mod config;
pub mod engine;
pub mod error;
pub mod repository;
pub mod telemetry;
