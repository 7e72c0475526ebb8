//! Infrastructure layer: stores, device client, scheduler, config.

pub mod config;
pub mod db;
pub mod device;
pub mod jobs;
pub mod printers;
pub mod scheduler;
pub mod seed;
