//! Access facade used by the request-handling layer.
//!
//! Login verifies the identity, upserts the user, resolves its authorization
//! and stores the result as a session snapshot. Per-request checks read the
//! snapshot back and run the pure decision engine against it.

use std::sync::Arc;

use courtside_auth::{AccessError, Decision, NewSession, RoleConfig, Scope, Session, SessionHandle, User, decide};
use courtside_core::{OrgId, SessionId};

use crate::directory::Directory;
use crate::identity::IdentityVerifier;
use crate::resolver::AuthorizationResolver;
use crate::session::SessionStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    pub user: User,
    pub handle: SessionHandle,
    /// The session carries the configured default because no membership applied.
    pub defaulted: bool,
}

#[derive(Clone)]
pub struct AccessService {
    identity: Arc<dyn IdentityVerifier>,
    directory: Arc<dyn Directory>,
    resolver: AuthorizationResolver,
    sessions: Arc<dyn SessionStore>,
    auto_enroll_org: Option<OrgId>,
}

impl AccessService {
    pub fn new(
        identity: Arc<dyn IdentityVerifier>,
        directory: Arc<dyn Directory>,
        sessions: Arc<dyn SessionStore>,
        config: Arc<RoleConfig>,
    ) -> Self {
        Self {
            identity,
            resolver: AuthorizationResolver::new(directory.clone(), config),
            directory,
            sessions,
            auto_enroll_org: None,
        }
    }

    /// Enrol identities without any membership into `org` with the default role at login.
    pub fn with_auto_enroll(mut self, org: Option<OrgId>) -> Self {
        self.auto_enroll_org = org;
        self
    }

    pub fn config(&self) -> &RoleConfig {
        self.resolver.config()
    }

    pub async fn login(&self, token: &str, org: Option<&OrgId>) -> Result<LoginOutcome, AccessError> {
        let identity = self.identity.verify(token).await.map_err(|err| {
            tracing::info!(error = %err, "login rejected");
            AccessError::from(err)
        })?;

        let user = self.directory.upsert_user(&identity).await?;

        if let Some(enroll_org) = &self.auto_enroll_org {
            let existing = self.directory.list_memberships(user.id, None).await?;
            if existing.is_empty() {
                let role = &self.config().default_role;
                if self.directory.ensure_default_membership(user.id, enroll_org, role).await? {
                    tracing::info!(user_id = %user.id, org_id = %enroll_org, %role, "auto-enrolled user");
                }
            }
        }

        let resolved = self.resolver.resolve(user.id, org).await?;
        let defaulted = resolved.defaulted;
        let handle = self
            .sessions
            .create(NewSession::from_resolution(user.id, resolved))
            .await?;

        tracing::info!(
            user_id = %user.id,
            session = %handle.session_id.redacted(),
            defaulted,
            "session issued"
        );
        Ok(LoginOutcome {
            user,
            handle,
            defaulted,
        })
    }

    /// Live session for `id`, or `NoSession` whether it expired or never existed.
    pub async fn session(&self, id: SessionId) -> Result<Session, AccessError> {
        self.sessions.get(id).await?.ok_or(AccessError::NoSession)
    }

    pub async fn logout(&self, id: SessionId) -> Result<(), AccessError> {
        self.sessions.destroy(id).await?;
        tracing::info!(session = %id.redacted(), "session destroyed");
        Ok(())
    }

    pub fn decide(&self, session: &Session, permission: &str, scope: Option<&Scope>) -> Decision {
        let caller = session.caller();
        decide(self.config(), &session.access_request(permission, scope, &caller))
    }

    /// Like [`decide`](Self::decide), with denials mapped onto [`AccessError`].
    pub fn require(&self, session: &Session, permission: &str, scope: Option<&Scope>) -> Result<Decision, AccessError> {
        let decision = self.decide(session, permission, scope);
        if !decision.allow {
            tracing::info!(
                user_id = %session.user_id,
                permission,
                scope = ?scope,
                reason = %decision.reason,
                "access denied"
            );
        }
        decision.into_result(permission, scope)
    }
}
