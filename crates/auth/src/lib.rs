//! `courtside-auth` — pure authorization model (no IO, no async).
//!
//! Grant expansion, scope evaluation, the decision engine, membership
//! resolution and session snapshots. Storage and transport live elsewhere.

pub mod authorize;
pub mod error;
pub mod grant;
pub mod identity;
pub mod permissions;
pub mod resolution;
pub mod roles;
pub mod scope;
pub mod session;

pub use authorize::{AccessRequest, Decision, ReasonCode, decide};
pub use error::AccessError;
pub use grant::{GrantPattern, expand};
pub use identity::{User, VerifiedIdentity};
pub use permissions::Permission;
pub use resolution::{DirectGrants, MembershipRecord, ResolvedAuthorization, resolve_memberships};
pub use roles::{Role, RoleConfig, RoleConfigError};
pub use scope::{Caller, Scope, ScopeKind, ScopeMemberships, allowed};
pub use session::{NewSession, Session, SessionHandle};
