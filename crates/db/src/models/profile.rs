use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

/// Role label stored on a profile. The table constrains values to these four.
#[derive(
    Debug,
    Clone,
    Copy,
    Type,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    TS,
    EnumString,
    Display,
    Default,
)]
#[sqlx(type_name = "profile_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProfileRole {
    Admin,
    Sales,
    Ops,
    #[default]
    Viewer,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub role: ProfileRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateProfile {
    pub email: String,
    pub full_name: Option<String>,
    pub role: Option<ProfileRole>,
}

impl CreateProfile {
    pub fn with_role(email: impl Into<String>, role: ProfileRole) -> Self {
        Self {
            email: email.into(),
            full_name: None,
            role: Some(role),
        }
    }
}

impl Profile {
    pub fn is_admin(&self) -> bool {
        self.role == ProfileRole::Admin
    }

    pub async fn create(pool: &SqlitePool, data: &CreateProfile) -> Result<Self, sqlx::Error> {
        let id = Uuid::new_v4();
        let role = data.role.unwrap_or_default();
        sqlx::query_as::<_, Profile>(
            r#"INSERT INTO profiles (id, email, full_name, role)
            VALUES ($1, $2, $3, $4)
            RETURNING id, email, full_name, role, created_at, updated_at"#,
        )
        .bind(id)
        .bind(&data.email)
        .bind(&data.full_name)
        .bind(role)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Profile>(
            r#"SELECT id, email, full_name, role, created_at, updated_at
            FROM profiles
            WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_email(
        pool: &SqlitePool,
        email: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Profile>(
            r#"SELECT id, email, full_name, role, created_at, updated_at
            FROM profiles
            WHERE email = $1"#,
        )
        .bind(email)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Profile>(
            r#"SELECT id, email, full_name, role, created_at, updated_at
            FROM profiles
            ORDER BY created_at ASC, email ASC"#,
        )
        .fetch_all(pool)
        .await
    }

    /// Returns `None` when no profile has the given id.
    pub async fn update_role(
        pool: &SqlitePool,
        id: Uuid,
        role: ProfileRole,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Profile>(
            r#"UPDATE profiles
            SET role = $2,
                updated_at = datetime('now', 'subsec')
            WHERE id = $1
            RETURNING id, email, full_name, role, created_at, updated_at"#,
        )
        .bind(id)
        .bind(role)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM profiles WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
