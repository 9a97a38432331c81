//! End-to-end access scenarios over the in-memory backends.

use std::sync::Arc;

use chrono::{Duration, Utc};

use courtside_auth::{AccessError, ReasonCode, Role, RoleConfig, Scope, VerifiedIdentity};
use courtside_core::{ManualClock, OrgId, TeamId};
use courtside_infra::config::BUNDLED_ROLE_CONFIG;
use courtside_infra::{
    AccessService, Directory, InMemoryDirectory, InMemoryRateLimiter, InMemorySessionStore, MutationRateLimiter,
    StaticIdentityVerifier,
};

struct Harness {
    clock: Arc<ManualClock>,
    directory: Arc<InMemoryDirectory>,
    service: AccessService,
}

fn identity(uid: &str) -> VerifiedIdentity {
    VerifiedIdentity {
        uid: uid.into(),
        email: format!("{uid}@example.com"),
        name: uid.to_uppercase(),
    }
}

fn harness() -> Harness {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let directory = Arc::new(InMemoryDirectory::new());
    let verifier = StaticIdentityVerifier::new()
        .with_token("tok-u1", identity("u1"))
        .with_token("tok-u2", identity("u2"));

    let service = AccessService::new(
        Arc::new(verifier),
        directory.clone(),
        Arc::new(InMemorySessionStore::with_clock(Duration::minutes(15), clock.clone())),
        Arc::new(RoleConfig::from_json(BUNDLED_ROLE_CONFIG).expect("bundled config")),
    );

    Harness {
        clock,
        directory,
        service,
    }
}

#[tokio::test]
async fn identity_without_membership_is_a_viewer() {
    let h = harness();
    let outcome = h.service.login("tok-u1", None).await.unwrap();
    assert!(outcome.defaulted);

    let session = h.service.session(outcome.handle.session_id).await.unwrap();
    assert_eq!(session.roles, vec![Role::from("Viewer")]);

    let decision = h.service.decide(&session, "teams.function.create", None);
    assert!(!decision.allow);
    assert_eq!(decision.reason, ReasonCode::MissingPermission);

    let err = h.service.require(&session, "teams.function.create", None).unwrap_err();
    assert_eq!(
        err,
        AccessError::MissingPermission {
            permission: "teams.function.create".into()
        }
    );
}

#[tokio::test]
async fn org_admin_is_confined_to_their_organization() {
    let h = harness();
    let user = h.directory.upsert_user(&identity("u2")).await.unwrap();
    h.directory
        .grant_membership(user.id, &OrgId::from("org_1"), &[Role::from("OrgAdmin")], &[])
        .unwrap();

    let outcome = h.service.login("tok-u2", None).await.unwrap();
    assert_eq!(outcome.user.id, user.id);
    let session = h.service.session(outcome.handle.session_id).await.unwrap();

    let org_1 = Scope::organization(&OrgId::from("org_1"));
    let allowed = h.service.decide(&session, "teams.function.create", Some(&org_1));
    assert!(allowed.allow);
    assert_eq!(allowed.reason, ReasonCode::GrantedBy("teams.*".into()));

    let org_2 = Scope::organization(&OrgId::from("org_2"));
    let denied = h.service.decide(&session, "teams.function.create", Some(&org_2));
    assert!(!denied.allow);
    assert_eq!(denied.reason, ReasonCode::ScopeDenied);

    let err = h.service.require(&session, "teams.function.create", Some(&org_2)).unwrap_err();
    assert!(matches!(err, AccessError::ScopeDenied { scope: Some(_), .. }));
}

#[tokio::test]
async fn team_and_self_scopes_follow_the_snapshot() {
    let h = harness();
    let user = h.directory.upsert_user(&identity("u2")).await.unwrap();
    h.directory
        .grant_membership(
            user.id,
            &OrgId::from("org_1"),
            &[Role::from("Coach")],
            &[TeamId::from("team_a")],
        )
        .unwrap();

    let outcome = h.service.login("tok-u2", None).await.unwrap();
    let session = h.service.session(outcome.handle.session_id).await.unwrap();

    let own_team = Scope::team(&TeamId::from("team_a"));
    let other_team = Scope::team(&TeamId::from("team_b"));
    assert!(h.service.decide(&session, "players.update", Some(&own_team)).allow);
    assert!(!h.service.decide(&session, "players.update", Some(&other_team)).allow);

    assert!(h.service.decide(&session, "players.view", Some(&Scope::own(user.id))).allow);
    assert!(
        !h.service
            .decide(&session, "players.view", Some(&Scope::new("self", "someone-else")))
            .allow
    );
}

#[tokio::test]
async fn explicit_permission_applies_without_roles() {
    let h = harness();
    let user = h.directory.upsert_user(&identity("u1")).await.unwrap();
    h.directory.grant_permission(user.id, "reports.export".into()).unwrap();
    h.directory.grant_platform_scope(user.id, "support").unwrap();

    let outcome = h.service.login("tok-u1", None).await.unwrap();
    let session = h.service.session(outcome.handle.session_id).await.unwrap();

    let decision = h
        .service
        .decide(&session, "reports.export", Some(&Scope::platform("support")));
    assert!(decision.allow);
    assert_eq!(decision.reason, ReasonCode::ExplicitPermission);

    let decision = h
        .service
        .decide(&session, "reports.export", Some(&Scope::platform("billing")));
    assert!(!decision.allow);
}

#[tokio::test]
async fn session_snapshot_does_not_see_later_membership_changes() {
    let h = harness();
    let outcome = h.service.login("tok-u1", None).await.unwrap();

    h.directory
        .grant_membership(outcome.user.id, &OrgId::from("org_1"), &[Role::from("OrgAdmin")], &[])
        .unwrap();

    let session = h.service.session(outcome.handle.session_id).await.unwrap();
    assert_eq!(session.roles, vec![Role::from("Viewer")]);
    assert!(
        !h.service
            .decide(&session, "teams.delete", Some(&Scope::organization(&OrgId::from("org_1"))))
            .allow
    );
}

#[tokio::test]
async fn sessions_expire_lazily_and_stay_gone() {
    let h = harness();
    let outcome = h.service.login("tok-u1", None).await.unwrap();
    let id = outcome.handle.session_id;

    h.clock.advance(Duration::minutes(15));
    assert!(h.service.session(id).await.is_ok());

    h.clock.advance(Duration::seconds(1));
    assert_eq!(h.service.session(id).await.unwrap_err(), AccessError::NoSession);
    assert_eq!(h.service.session(id).await.unwrap_err(), AccessError::NoSession);
}

#[tokio::test]
async fn rate_limiter_denies_the_fourth_rapid_call() {
    let limiter = InMemoryRateLimiter::new();
    let window = Duration::milliseconds(60_000);

    let mut allowed = Vec::new();
    let mut last = None;
    for _ in 0..4 {
        let decision = limiter.check("POST /auth/session", "203.0.113.9", window, 3).await.unwrap();
        allowed.push(decision.allowed);
        last = decision.retry_after_secs;
    }

    assert_eq!(allowed, vec![true, true, true, false]);
    assert!(last.is_some_and(|secs| secs > 0));
}

mod postgres {
    use courtside_infra::{PostgresDirectory, PostgresSessionStore, SessionStore, ensure_schema};
    use sqlx::postgres::PgPoolOptions;

    use super::*;

    #[tokio::test]
    #[ignore = "requires DATABASE_URL pointing at a disposable Postgres database"]
    async fn postgres_backends_round_trip() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL");
        let pool = PgPoolOptions::new().max_connections(2).connect(&url).await.unwrap();
        ensure_schema(&pool).await.unwrap();

        let clock = Arc::new(ManualClock::new(Utc::now()));
        let directory = Arc::new(PostgresDirectory::new(pool.clone()));
        let sessions = Arc::new(PostgresSessionStore::with_clock(
            pool.clone(),
            Duration::minutes(15),
            clock.clone(),
        ));

        let uid = format!("pg-{}", uuid::Uuid::new_v4());
        let user = directory.upsert_user(&identity(&uid)).await.unwrap();
        let org = OrgId::from(format!("org-{}", uuid::Uuid::new_v4()));
        directory
            .grant_membership(user.id, &org, &Role::from("OrgAdmin"), Some(&TeamId::from("team_a")))
            .await
            .unwrap();

        let verifier = StaticIdentityVerifier::new().with_token("tok-pg", identity(&uid));
        let service = AccessService::new(
            Arc::new(verifier),
            directory.clone(),
            sessions.clone(),
            Arc::new(RoleConfig::from_json(BUNDLED_ROLE_CONFIG).unwrap()),
        );

        let outcome = service.login("tok-pg", None).await.unwrap();
        let session = service.session(outcome.handle.session_id).await.unwrap();
        assert_eq!(session.active_org_id, Some(org.clone()));
        assert!(service.decide(&session, "teams.function.create", Some(&Scope::organization(&org))).allow);

        clock.advance(Duration::minutes(16));
        assert!(sessions.get(outcome.handle.session_id).await.unwrap().is_none());
        clock.advance(-Duration::minutes(16));
        assert!(sessions.get(outcome.handle.session_id).await.unwrap().is_none());
    }
}
