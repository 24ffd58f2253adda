use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

/// Kind of security-relevant event raised by the admin gate
#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display,
)]
#[sqlx(type_name = "security_event_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SecurityEventKind {
    /// Client-side role said admin, server-side validation said no.
    AdminMismatch,
    /// Server-side validation could not be completed; access was kept.
    ValidatorUnavailable,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct SecurityEvent {
    pub id: Uuid,
    pub profile_id: Option<Uuid>,
    pub kind: SecurityEventKind,
    pub detail: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SecurityEvent {
    /// A `profile_id` that no longer matches a profile is stored as NULL.
    pub async fn create(
        pool: &SqlitePool,
        profile_id: Option<Uuid>,
        kind: SecurityEventKind,
        detail: Option<String>,
    ) -> Result<Self, sqlx::Error> {
        let id = Uuid::new_v4();
        sqlx::query_as::<_, SecurityEvent>(
            r#"INSERT INTO security_events (id, profile_id, kind, detail)
            VALUES ($1, (SELECT id FROM profiles WHERE id = $2), $3, $4)
            RETURNING id, profile_id, kind, detail, created_at"#,
        )
        .bind(id)
        .bind(profile_id)
        .bind(kind)
        .bind(detail)
        .fetch_one(pool)
        .await
    }

    pub async fn find_recent(pool: &SqlitePool, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, SecurityEvent>(
            r#"SELECT id, profile_id, kind, detail, created_at
            FROM security_events
            ORDER BY created_at DESC, rowid DESC
            LIMIT $1"#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_profile_id(
        pool: &SqlitePool,
        profile_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, SecurityEvent>(
            r#"SELECT id, profile_id, kind, detail, created_at
            FROM security_events
            WHERE profile_id = $1
            ORDER BY created_at DESC, rowid DESC
            LIMIT $2"#,
        )
        .bind(profile_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}
