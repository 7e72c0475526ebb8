//! Print-job domain: jobs, printers, the status lifecycle and device readings.
//!
//! Everything here is pure. Persistence, device IO and scheduling live in
//! `printfarm-infra`.

pub mod device;
pub mod job;
pub mod printer;
pub mod status;

pub use device::{Availability, JobProgress, ProgressProbe, is_operational_state};
pub use job::{Item, Job};
pub use printer::{DeviceEndpoint, Printer};
pub use status::Status;
