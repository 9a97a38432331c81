//! `courtside-core` — identifiers, clock and error primitives shared by every
//! access-control crate.
//!
//! This crate has no I/O and no knowledge of roles, permissions or sessions.

pub mod clock;
pub mod error;
pub mod id;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::DomainError;
pub use id::{OrgId, SessionId, TeamId, UserId};
