//! Audit trail for admin-gate security events.

use async_trait::async_trait;
use db::models::security_event::{SecurityEvent, SecurityEventKind};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::warn;

use super::session::Identity;

#[derive(Debug, Error)]
pub enum SecurityAuditError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait SecurityAudit: Send + Sync {
    async fn record(
        &self,
        identity: &Identity,
        kind: SecurityEventKind,
        detail: Option<String>,
    ) -> Result<(), SecurityAuditError>;
}

/// Writes events to the `security_events` table and the `security_audit` log target.
#[derive(Clone)]
pub struct DbSecurityAudit {
    pool: SqlitePool,
}

impl DbSecurityAudit {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SecurityAudit for DbSecurityAudit {
    async fn record(
        &self,
        identity: &Identity,
        kind: SecurityEventKind,
        detail: Option<String>,
    ) -> Result<(), SecurityAuditError> {
        warn!(
            target: "security_audit",
            user_id = %identity.user_id,
            email = %identity.email,
            kind = %kind,
            detail = detail.as_deref().unwrap_or(""),
            "Security event"
        );
        SecurityEvent::create(&self.pool, Some(identity.user_id), kind, detail).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use db::{
        DBService,
        models::profile::{CreateProfile, Profile, ProfileRole},
    };
    use uuid::Uuid;

    use super::*;

    #[tokio::test]
    async fn test_record_persists_event() {
        let db = DBService::new_in_memory().await.unwrap();
        let profile = Profile::create(
            &db.pool,
            &CreateProfile::with_role("admin@example.com", ProfileRole::Admin),
        )
        .await
        .unwrap();
        let audit = DbSecurityAudit::new(db.pool.clone());

        audit
            .record(
                &Identity {
                    user_id: profile.id,
                    email: profile.email.clone(),
                },
                SecurityEventKind::AdminMismatch,
                Some("validator returned isAdmin=false".to_string()),
            )
            .await
            .unwrap();

        let events = SecurityEvent::find_by_profile_id(&db.pool, profile.id, 10)
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, SecurityEventKind::AdminMismatch);
        assert_eq!(
            events[0].detail.as_deref(),
            Some("validator returned isAdmin=false")
        );
    }

    #[tokio::test]
    async fn test_record_for_deleted_profile() {
        let db = DBService::new_in_memory().await.unwrap();
        let audit = DbSecurityAudit::new(db.pool.clone());

        audit
            .record(
                &Identity {
                    user_id: Uuid::new_v4(),
                    email: "removed@example.com".to_string(),
                },
                SecurityEventKind::ValidatorUnavailable,
                None,
            )
            .await
            .unwrap();

        let events = SecurityEvent::find_recent(&db.pool, 10).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].profile_id, None);
    }
}
