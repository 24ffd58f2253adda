//! Admin route guard.
//!
//! A guard instance lives for one page load. [`AdminGuard::mount`] reads the
//! session, runs the client-side role check against the (possibly stale) role
//! cache and settles the guard into `Admitted` or `Denied`. An admitted guard
//! then asks the server-side validator for an independent verdict in the
//! background, without holding back the protected content.
//!
//! Reconciliation rules:
//!
//! | Client check | Server verdict        | Result                                         |
//! |--------------|-----------------------|------------------------------------------------|
//! | not admin    | (never asked)         | `Denied`, `required=admin`                     |
//! | admin        | `isAdmin: true`       | stays `Admitted`                               |
//! | admin        | `isAdmin: false`      | cache invalidated, `Denied`, `reason=security` |
//! | admin        | error / timeout       | stays `Admitted` with a warning banner         |
//!
//! At most one redirect is issued per guard. Unmounting (or dropping) the guard
//! cancels an in-flight validation; its result is discarded.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use db::{DBService, models::security_event::SecurityEventKind};
use tokio::{
    sync::{Mutex, watch},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    admin_validation::{AdminValidationError, AdminValidator, AdminVerdict, HttpAdminValidator},
    config::Config,
    redirect::{DenialReason, RedirectTarget},
    role_cache::RoleCache,
    role_check::{AdminCheck, ProfileRoleSource, RoleChecker},
    security_audit::{DbSecurityAudit, SecurityAudit},
    session::{AuthSessionService, Identity, SessionReader},
};

pub const VALIDATION_WARNING_TITLE: &str = "Admin Validation Warning";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardState {
    Loading,
    Admitted { warning: Option<String> },
    Denied { redirect: RedirectTarget },
}

impl GuardState {
    pub fn is_loading(&self) -> bool {
        matches!(self, GuardState::Loading)
    }

    pub fn is_admitted(&self) -> bool {
        matches!(self, GuardState::Admitted { .. })
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, GuardState::Denied { .. })
    }
}

/// What the page should show for the current guard state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardView {
    Spinner,
    Redirect(String),
    Protected { warning_banner: Option<String> },
}

impl From<&GuardState> for GuardView {
    fn from(state: &GuardState) -> Self {
        match state {
            GuardState::Loading => GuardView::Spinner,
            GuardState::Admitted { warning } => GuardView::Protected {
                warning_banner: warning.clone(),
            },
            GuardState::Denied { redirect } => GuardView::Redirect(redirect.to_uri()),
        }
    }
}

/// Performs navigation away from the protected page.
pub trait Navigator: Send + Sync {
    fn redirect(&self, target: &RedirectTarget);
}

/// Outcome of applying one server verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    Confirmed,
    Revoked,
    /// Validator unavailable; access kept on the cached permission.
    Degraded,
    /// Guard unmounted, not admitted, or already revoked.
    Ignored,
}

pub struct AdminGuardDeps {
    pub sessions: Arc<dyn SessionReader>,
    pub roles: RoleChecker,
    pub validator: Arc<dyn AdminValidator>,
    pub audit: Arc<dyn SecurityAudit>,
    pub navigator: Arc<dyn Navigator>,
    pub auth_entry_path: String,
    pub validation_timeout: Duration,
}

impl AdminGuardDeps {
    /// Production wiring for one caller: bearer-token sessions, profile roles
    /// behind the shared cache, and the HTTP validation endpoint.
    pub fn connected(
        db: &DBService,
        config: &Config,
        role_cache: RoleCache,
        access_token: Option<String>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, AdminValidationError> {
        let sessions = AuthSessionService::new(db.pool.clone());
        let validator = HttpAdminValidator::new(
            config.admin_validate_url.clone(),
            access_token.clone().unwrap_or_default(),
            config.admin_validation_timeout,
        )?;

        Ok(Self {
            sessions: Arc::new(sessions.reader(access_token)),
            roles: RoleChecker::new(
                Arc::new(ProfileRoleSource::new(db.pool.clone())),
                role_cache,
            ),
            validator: Arc::new(validator),
            audit: Arc::new(DbSecurityAudit::new(db.pool.clone())),
            navigator,
            auth_entry_path: config.auth_entry_path.clone(),
            validation_timeout: config.admin_validation_timeout,
        })
    }
}

pub struct AdminGuard {
    inner: Arc<GuardInner>,
    validation: Mutex<Option<JoinHandle<()>>>,
}

struct GuardInner {
    deps: AdminGuardDeps,
    state: watch::Sender<GuardState>,
    cancel: CancellationToken,
    mounted: AtomicBool,
    validation_started: AtomicBool,
    revoked: AtomicBool,
    redirected: AtomicBool,
}

impl AdminGuard {
    pub fn new(deps: AdminGuardDeps) -> Self {
        let (state, _) = watch::channel(GuardState::Loading);
        Self {
            inner: Arc::new(GuardInner {
                deps,
                state,
                cancel: CancellationToken::new(),
                mounted: AtomicBool::new(false),
                validation_started: AtomicBool::new(false),
                revoked: AtomicBool::new(false),
                redirected: AtomicBool::new(false),
            }),
            validation: Mutex::new(None),
        }
    }

    pub fn state(&self) -> GuardState {
        self.inner.state.borrow().clone()
    }

    pub fn view(&self) -> GuardView {
        GuardView::from(&*self.inner.state.borrow())
    }

    /// Observe state transitions, e.g. a later `Admitted → Denied`.
    pub fn subscribe(&self) -> watch::Receiver<GuardState> {
        self.inner.state.subscribe()
    }

    /// Settle the client-side decision and, when admitted, start background
    /// validation. Returns the state as of the client-side decision.
    /// Later calls return the current state without re-running anything.
    pub async fn mount(&self) -> GuardState {
        if self.inner.mounted.swap(true, Ordering::SeqCst) {
            return self.state();
        }

        let session = self.inner.deps.sessions.current_identity().await;
        if self.inner.cancel.is_cancelled() {
            return self.state();
        }

        let identity = match session {
            Ok(Some(identity)) => identity,
            Ok(None) => {
                debug!("Admin guard: no session");
                return self.inner.deny(DenialReason::AdminRequired);
            }
            Err(e) => {
                warn!(error = %e, "Admin guard: session lookup failed, denying");
                return self.inner.deny(DenialReason::AdminRequired);
            }
        };

        let check = self.inner.deps.roles.check(Some(&identity)).await;
        if self.inner.cancel.is_cancelled() {
            return self.state();
        }

        if check != AdminCheck::Admin {
            info!(user_id = %identity.user_id, check = ?check, "Admin guard: not an admin");
            return self.inner.deny(DenialReason::AdminRequired);
        }

        let admitted = GuardState::Admitted { warning: None };
        self.inner.state.send_replace(admitted.clone());
        debug!(user_id = %identity.user_id, "Admin guard: admitted on client-side role");

        self.start_validation(identity).await;
        admitted
    }

    async fn start_validation(&self, identity: Identity) {
        if self.inner.validation_started.swap(true, Ordering::SeqCst) {
            return;
        }

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = inner.cancel.cancelled() => {
                    debug!(user_id = %identity.user_id, "Admin guard: validation cancelled");
                    return;
                }
                outcome = inner.validate(&identity) => outcome,
            };
            inner.reconcile(&identity, outcome).await;
        });

        *self.validation.lock().await = Some(handle);
    }

    /// Apply a server verdict for `identity`. This is the handler the
    /// background validation feeds; repeated calls are idempotent.
    pub async fn apply_verdict(
        &self,
        identity: &Identity,
        outcome: Result<AdminVerdict, AdminValidationError>,
    ) -> Reconciliation {
        self.inner.reconcile(identity, outcome).await
    }

    /// Wait for background validation (if any) to finish or be cancelled.
    pub async fn validation_settled(&self) {
        let handle = self.validation.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Admin guard: validation task failed");
            }
        }
    }

    /// The page is going away: discard any in-flight validation.
    pub fn unmount(&self) {
        self.inner.cancel.cancel();
    }

    pub fn is_unmounted(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }
}

impl Drop for AdminGuard {
    fn drop(&mut self) {
        self.inner.cancel.cancel();
    }
}

impl GuardInner {
    async fn validate(&self, identity: &Identity) -> Result<AdminVerdict, AdminValidationError> {
        match tokio::time::timeout(
            self.deps.validation_timeout,
            self.deps.validator.validate(identity),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(AdminValidationError::Timeout),
        }
    }

    async fn reconcile(
        &self,
        identity: &Identity,
        outcome: Result<AdminVerdict, AdminValidationError>,
    ) -> Reconciliation {
        if self.cancel.is_cancelled() {
            debug!(user_id = %identity.user_id, "Admin guard: verdict after unmount ignored");
            return Reconciliation::Ignored;
        }
        if !self.state.borrow().is_admitted() {
            return Reconciliation::Ignored;
        }

        match outcome {
            Ok(AdminVerdict { is_admin: true }) => {
                debug!(user_id = %identity.user_id, "Admin guard: server confirmed admin");
                Reconciliation::Confirmed
            }
            Ok(AdminVerdict { is_admin: false }) => {
                if self.revoked.swap(true, Ordering::SeqCst) {
                    return Reconciliation::Ignored;
                }

                warn!(
                    user_id = %identity.user_id,
                    "Admin guard: server denied admin access granted by cached role"
                );
                self.deps.roles.cache().invalidate(&identity.user_id).await;

                if let Err(e) = self
                    .deps
                    .audit
                    .record(
                        identity,
                        SecurityEventKind::AdminMismatch,
                        Some("cached role admin, server verdict isAdmin=false".to_string()),
                    )
                    .await
                {
                    warn!(error = %e, "Admin guard: failed to record security event");
                }

                if self.cancel.is_cancelled() {
                    return Reconciliation::Ignored;
                }
                self.deny(DenialReason::SecurityMismatch);
                Reconciliation::Revoked
            }
            Err(e) => {
                warn!(
                    user_id = %identity.user_id,
                    error = %e,
                    "Admin guard: validation unavailable, keeping cached permission"
                );

                if let Err(audit_err) = self
                    .deps
                    .audit
                    .record(
                        identity,
                        SecurityEventKind::ValidatorUnavailable,
                        Some(e.to_string()),
                    )
                    .await
                {
                    warn!(error = %audit_err, "Admin guard: failed to record security event");
                }

                if self.cancel.is_cancelled() {
                    return Reconciliation::Ignored;
                }

                let banner = format!(
                    "{VALIDATION_WARNING_TITLE}: could not confirm admin access \
                     with the server ({e}). Showing content based on cached permissions."
                );
                let mut degraded = false;
                self.state.send_if_modified(|state| match state {
                    GuardState::Admitted { warning } => {
                        *warning = Some(banner);
                        degraded = true;
                        true
                    }
                    _ => false,
                });

                if degraded {
                    Reconciliation::Degraded
                } else {
                    Reconciliation::Ignored
                }
            }
        }
    }

    fn deny(&self, reason: DenialReason) -> GuardState {
        let redirect = RedirectTarget::new(self.deps.auth_entry_path.clone(), reason);
        let state = GuardState::Denied {
            redirect: redirect.clone(),
        };
        self.state.send_replace(state.clone());

        if self.redirected.swap(true, Ordering::SeqCst) {
            debug!(redirect = %redirect, "Admin guard: redirect already issued");
        } else {
            info!(
                redirect = %redirect,
                reason = ?redirect.reason(),
                "Admin guard: redirecting"
            );
            self.deps.navigator.redirect(&redirect);
        }

        state
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Mutex as StdMutex, atomic::AtomicUsize};

    use async_trait::async_trait;
    use tokio::sync::Notify;
    use uuid::Uuid;

    use super::*;
    use crate::services::{
        role_check::{RoleFetchError, RoleSource},
        security_audit::SecurityAuditError,
        session::SessionError,
    };

    struct FixedSession(Option<Identity>);

    #[async_trait]
    impl SessionReader for FixedSession {
        async fn current_identity(&self) -> Result<Option<Identity>, SessionError> {
            Ok(self.0.clone())
        }
    }

    struct BrokenSession;

    #[async_trait]
    impl SessionReader for BrokenSession {
        async fn current_identity(&self) -> Result<Option<Identity>, SessionError> {
            Err(SessionError::InvalidTtl)
        }
    }

    /// Holds the lookup open until released, so tests can unmount mid-mount.
    struct GatedSession {
        entered: Arc<Notify>,
        release: Arc<Notify>,
        identity: Option<Identity>,
    }

    #[async_trait]
    impl SessionReader for GatedSession {
        async fn current_identity(&self) -> Result<Option<Identity>, SessionError> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(self.identity.clone())
        }
    }

    struct FixedRole(Result<&'static str, ()>);

    #[async_trait]
    impl RoleSource for FixedRole {
        async fn fetch_role(&self, _identity: &Identity) -> Result<String, RoleFetchError> {
            self.0
                .map(str::to_string)
                .map_err(|_| RoleFetchError::Unavailable("profile table unreachable".to_string()))
        }
    }

    enum Behavior {
        Verdict(bool),
        NetworkError,
        Hang,
        Gated(Arc<Notify>, bool),
    }

    struct ScriptedValidator {
        behavior: Behavior,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AdminValidator for ScriptedValidator {
        async fn validate(
            &self,
            _identity: &Identity,
        ) -> Result<AdminVerdict, AdminValidationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                Behavior::Verdict(is_admin) => Ok(AdminVerdict {
                    is_admin: *is_admin,
                }),
                Behavior::NetworkError => {
                    Err(AdminValidationError::Transport("connection refused".to_string()))
                }
                Behavior::Hang => std::future::pending().await,
                Behavior::Gated(gate, is_admin) => {
                    gate.notified().await;
                    Ok(AdminVerdict {
                        is_admin: *is_admin,
                    })
                }
            }
        }
    }

    #[derive(Default)]
    struct RecordingNavigator(StdMutex<Vec<String>>);

    impl RecordingNavigator {
        fn redirects(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    impl Navigator for RecordingNavigator {
        fn redirect(&self, target: &RedirectTarget) {
            self.0.lock().unwrap().push(target.to_uri());
        }
    }

    #[derive(Default)]
    struct RecordingAudit(StdMutex<Vec<SecurityEventKind>>);

    #[async_trait]
    impl SecurityAudit for RecordingAudit {
        async fn record(
            &self,
            _identity: &Identity,
            kind: SecurityEventKind,
            _detail: Option<String>,
        ) -> Result<(), SecurityAuditError> {
            self.0.lock().unwrap().push(kind);
            Ok(())
        }
    }

    struct Harness {
        guard: AdminGuard,
        identity: Identity,
        cache: RoleCache,
        validator: Arc<ScriptedValidator>,
        navigator: Arc<RecordingNavigator>,
        audit: Arc<RecordingAudit>,
    }

    impl Harness {
        fn validator_calls(&self) -> usize {
            self.validator.calls.load(Ordering::SeqCst)
        }

        fn audited(&self) -> Vec<SecurityEventKind> {
            self.audit.0.lock().unwrap().clone()
        }
    }

    fn identity() -> Identity {
        Identity {
            user_id: Uuid::new_v4(),
            email: "someone@example.com".to_string(),
        }
    }

    fn harness_with(
        sessions: Arc<dyn SessionReader>,
        identity: Identity,
        role: Result<&'static str, ()>,
        behavior: Behavior,
    ) -> Harness {
        let cache = RoleCache::new(Duration::from_secs(60));
        let validator = Arc::new(ScriptedValidator {
            behavior,
            calls: AtomicUsize::new(0),
        });
        let navigator = Arc::new(RecordingNavigator::default());
        let audit = Arc::new(RecordingAudit::default());

        let guard = AdminGuard::new(AdminGuardDeps {
            sessions,
            roles: RoleChecker::new(Arc::new(FixedRole(role)), cache.clone()),
            validator: validator.clone(),
            audit: audit.clone(),
            navigator: navigator.clone(),
            auth_entry_path: "/auth".to_string(),
            validation_timeout: Duration::from_millis(100),
        });

        Harness {
            guard,
            identity,
            cache,
            validator,
            navigator,
            audit,
        }
    }

    fn harness(role: Result<&'static str, ()>, behavior: Behavior) -> Harness {
        let who = identity();
        harness_with(
            Arc::new(FixedSession(Some(who.clone()))),
            who,
            role,
            behavior,
        )
    }

    #[tokio::test]
    async fn test_starts_loading() {
        let h = harness(Ok("admin"), Behavior::Verdict(true));
        assert!(h.guard.state().is_loading());
        assert_eq!(h.guard.view(), GuardView::Spinner);
    }

    #[tokio::test]
    async fn test_viewer_denied_without_validation() {
        let h = harness(Ok("viewer"), Behavior::Verdict(true));

        let state = h.guard.mount().await;
        h.guard.validation_settled().await;

        assert!(state.is_denied());
        assert_eq!(h.guard.view(), GuardView::Redirect("/auth?required=admin".to_string()));
        assert_eq!(h.navigator.redirects(), vec!["/auth?required=admin".to_string()]);
        assert_eq!(h.validator_calls(), 0);
    }

    #[tokio::test]
    async fn test_every_non_admin_role_denied() {
        for role in ["sales", "ops", "viewer", "Admin", ""] {
            let h = harness(Ok(role), Behavior::Verdict(true));
            assert!(h.guard.mount().await.is_denied(), "role {role:?} was admitted");
            assert_eq!(h.validator_calls(), 0);
        }
    }

    #[tokio::test]
    async fn test_admin_confirmed_stays_admitted() {
        let h = harness(Ok("admin"), Behavior::Verdict(true));

        assert!(h.guard.mount().await.is_admitted());
        h.guard.validation_settled().await;

        assert_eq!(
            h.guard.view(),
            GuardView::Protected {
                warning_banner: None
            }
        );
        assert_eq!(h.validator_calls(), 1);
        assert!(h.navigator.redirects().is_empty());
        assert!(h.audited().is_empty());
    }

    #[tokio::test]
    async fn test_stale_admin_revoked_once() {
        let h = harness(Ok("admin"), Behavior::Verdict(false));
        let mut states = h.guard.subscribe();

        assert!(h.guard.mount().await.is_admitted());
        h.guard.validation_settled().await;

        assert!(states.has_changed().unwrap());
        assert!(states.borrow_and_update().is_denied());
        assert_eq!(
            h.guard.view(),
            GuardView::Redirect("/auth?required=admin&reason=security".to_string())
        );
        assert_eq!(
            h.navigator.redirects(),
            vec!["/auth?required=admin&reason=security".to_string()]
        );
        assert_eq!(h.cache.get(&h.identity.user_id).await, None);
        assert_eq!(h.audited(), vec![SecurityEventKind::AdminMismatch]);
    }

    #[tokio::test]
    async fn test_stale_cache_scenario() {
        // profile now says viewer, but the cache still claims admin
        let h = harness(Ok("viewer"), Behavior::Verdict(false));
        h.cache.insert(h.identity.user_id, "admin".to_string()).await;

        assert!(h.guard.mount().await.is_admitted());
        h.guard.validation_settled().await;

        assert_eq!(
            h.navigator.redirects(),
            vec!["/auth?required=admin&reason=security".to_string()]
        );
        assert_eq!(h.cache.get(&h.identity.user_id).await, None);
    }

    #[tokio::test]
    async fn test_network_error_keeps_access_with_warning() {
        let h = harness(Ok("admin"), Behavior::NetworkError);

        h.guard.mount().await;
        h.guard.validation_settled().await;

        match h.guard.view() {
            GuardView::Protected {
                warning_banner: Some(banner),
            } => assert!(banner.starts_with(VALIDATION_WARNING_TITLE)),
            other => panic!("expected protected content with banner, got {other:?}"),
        }
        assert!(h.navigator.redirects().is_empty());
        assert_eq!(h.cache.get(&h.identity.user_id).await.as_deref(), Some("admin"));
        assert_eq!(h.audited(), vec![SecurityEventKind::ValidatorUnavailable]);
    }

    #[tokio::test]
    async fn test_timeout_degrades_like_network_error() {
        let h = harness(Ok("admin"), Behavior::Hang);

        h.guard.mount().await;
        h.guard.validation_settled().await;

        assert!(matches!(
            h.guard.state(),
            GuardState::Admitted { warning: Some(_) }
        ));
        assert!(h.navigator.redirects().is_empty());
    }

    #[tokio::test]
    async fn test_repeated_denial_redirects_once() {
        let h = harness(Ok("admin"), Behavior::Verdict(true));
        h.guard.mount().await;
        h.guard.validation_settled().await;

        let denial = || Ok(AdminVerdict { is_admin: false });
        assert_eq!(
            h.guard.apply_verdict(&h.identity, denial()).await,
            Reconciliation::Revoked
        );
        assert_eq!(
            h.guard.apply_verdict(&h.identity, denial()).await,
            Reconciliation::Ignored
        );

        assert_eq!(h.navigator.redirects().len(), 1);
        assert_eq!(h.audited(), vec![SecurityEventKind::AdminMismatch]);
    }

    #[tokio::test]
    async fn test_verdict_on_denied_guard_ignored() {
        let h = harness(Ok("sales"), Behavior::Verdict(true));
        h.guard.mount().await;

        let outcome = h
            .guard
            .apply_verdict(&h.identity, Ok(AdminVerdict { is_admin: false }))
            .await;

        assert_eq!(outcome, Reconciliation::Ignored);
        assert_eq!(h.navigator.redirects(), vec!["/auth?required=admin".to_string()]);
    }

    #[tokio::test]
    async fn test_unmount_discards_pending_verdict() {
        let gate = Arc::new(Notify::new());
        let h = harness(Ok("admin"), Behavior::Gated(gate.clone(), false));

        assert!(h.guard.mount().await.is_admitted());
        h.guard.unmount();
        gate.notify_one();
        h.guard.validation_settled().await;

        assert!(h.guard.is_unmounted());
        assert!(h.guard.state().is_admitted());
        assert!(h.navigator.redirects().is_empty());
        assert_eq!(h.cache.get(&h.identity.user_id).await.as_deref(), Some("admin"));
        assert!(h.audited().is_empty());

        let late = h
            .guard
            .apply_verdict(&h.identity, Ok(AdminVerdict { is_admin: false }))
            .await;
        assert_eq!(late, Reconciliation::Ignored);
    }

    #[tokio::test]
    async fn test_mount_twice_validates_once() {
        let h = harness(Ok("admin"), Behavior::Verdict(true));

        h.guard.mount().await;
        h.guard.mount().await;
        h.guard.validation_settled().await;

        assert_eq!(h.validator_calls(), 1);
    }

    #[tokio::test]
    async fn test_role_lookup_failure_denies() {
        let h = harness(Err(()), Behavior::Verdict(true));

        assert!(h.guard.mount().await.is_denied());
        assert_eq!(h.navigator.redirects(), vec!["/auth?required=admin".to_string()]);
        assert_eq!(h.validator_calls(), 0);
    }

    #[tokio::test]
    async fn test_no_session_denied() {
        let h = harness_with(
            Arc::new(FixedSession(None)),
            identity(),
            Ok("admin"),
            Behavior::Verdict(true),
        );

        assert!(h.guard.mount().await.is_denied());
        assert_eq!(h.navigator.redirects(), vec!["/auth?required=admin".to_string()]);
        assert_eq!(h.validator_calls(), 0);
    }

    #[tokio::test]
    async fn test_session_error_denied() {
        let h = harness_with(
            Arc::new(BrokenSession),
            identity(),
            Ok("admin"),
            Behavior::Verdict(true),
        );

        assert!(h.guard.mount().await.is_denied());
        assert_eq!(h.validator_calls(), 0);
    }

    #[tokio::test]
    async fn test_dropped_guard_discards_pending_verdict() {
        let gate = Arc::new(Notify::new());
        let Harness {
            guard,
            identity,
            cache,
            validator,
            navigator,
            audit,
        } = harness(Ok("admin"), Behavior::Gated(gate.clone(), false));

        assert!(guard.mount().await.is_admitted());
        let states = guard.subscribe();
        tokio::time::timeout(Duration::from_secs(1), async {
            while validator.calls.load(Ordering::SeqCst) == 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        drop(guard);
        gate.notify_one();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(states.borrow().is_admitted());
        assert!(navigator.redirects().is_empty());
        assert!(audit.0.lock().unwrap().is_empty());
        assert_eq!(cache.get(&identity.user_id).await.as_deref(), Some("admin"));
    }

    #[tokio::test]
    async fn test_unmount_during_session_lookup() {
        for signed_in in [false, true] {
            let entered = Arc::new(Notify::new());
            let release = Arc::new(Notify::new());
            let who = identity();
            let sessions = GatedSession {
                entered: entered.clone(),
                release: release.clone(),
                identity: signed_in.then(|| who.clone()),
            };
            let h = harness_with(Arc::new(sessions), who, Ok("admin"), Behavior::Verdict(false));
            let guard = Arc::new(h.guard);

            let mounting = tokio::spawn({
                let guard = Arc::clone(&guard);
                async move { guard.mount().await }
            });
            entered.notified().await;
            guard.unmount();
            release.notify_one();

            let state = mounting.await.unwrap();
            assert!(state.is_loading(), "signed_in={signed_in}");
            assert!(guard.state().is_loading());
            assert!(h.navigator.redirects().is_empty());
            assert_eq!(h.validator.calls.load(Ordering::SeqCst), 0);
        }
    }
}
