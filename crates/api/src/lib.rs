//! Operational HTTP surface of the scheduler process.

pub mod app;
