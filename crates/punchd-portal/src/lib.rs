//! `punchd-portal` — the HTTP action collaborator.
//!
//! [`client::PortalClient`] implements `TimesheetActions` against the
//! timesheet portal's web API: authenticate with the company/username/
//! password form, punch, verify. Every call is a complete fresh sequence,
//! so the scheduler's retry attempts stay independent.

pub mod client;
pub mod error;

pub use client::PortalClient;
pub use error::{PortalError, Result};
