//! Domain logic for recurring remote-execution jobs.
//!
//! Everything here is pure: no I/O, and time is read only through
//! [`clock::Clock`]. The services in `rtr-jobs-api` compose these pieces with
//! the storage and search collaborators.

pub mod clock;
pub mod csv;
pub mod cursor;
pub mod decode;
pub mod error;
pub mod execution;
pub mod fql;
pub mod hosts;
pub mod job;
pub mod job_id;
pub mod recurrence;
pub mod schedule;
pub mod status;
pub mod timefmt;

pub use clock::{Clock, FixedClock, SystemClock};
pub use cursor::{Cursor, Direction, PageRequest, Paging};
pub use error::CoreError;
pub use execution::{JobExecution, TargetedHost, TelemetryEvent};
pub use fql::{Filter, FqlOp, FqlQuery, FqlSort, SortDirection};
pub use hosts::LogEvent;
pub use job::{Audit, Job, RunStats, Schedule};
pub use job_id::generate_job_id;
pub use status::RunStatus;
