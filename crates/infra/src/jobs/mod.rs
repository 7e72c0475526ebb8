//! Job persistence.
//!
//! ## Design
//!
//! - Job rows are owned by the order/CRUD layer; the scheduler only reads them
//!   and moves them forward through the status lifecycle
//! - Every status change is a compare-and-swap on the stored status, so two
//!   overlapping ticks (or two scheduler processes) cannot both apply the same
//!   transition
//! - Assignment additionally requires the target printer to be free
//!
//! ## Components
//!
//! - `JobStore`: async store contract used by the scheduler
//! - `InMemoryJobStore`: process-local store for tests/dev
//! - `PostgresJobStore`: store over the shared relational schema

pub mod postgres;
pub mod store;

pub use postgres::PostgresJobStore;
pub use store::{InMemoryJobStore, JobStore, JobStoreError};
