use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::tags::{AllergyTag, PreferenceTag};

/// User record in the database. Credential handling (login, tokens) lives
/// outside this crate; only the stored identity is modeled here.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: String,
    pub nickname: Option<String>,
    pub created_at: OffsetDateTime,
}

/// One-to-one dietary profile. The tag vectors use the closed vocabularies
/// from [`crate::tags`]; out-of-vocabulary values never deserialize.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub user_id: Uuid,
    pub allergies: sqlx::types::Json<Vec<AllergyTag>>,
    pub preferences: sqlx::types::Json<Vec<PreferenceTag>>,
    pub image_url: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}
