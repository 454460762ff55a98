use lazy_static::lazy_static;
use regex::Regex;
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::tags::{AllergyTag, PreferenceTag};
use crate::users::repo_types::{Profile, User};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Register a user row. Password hashing and login flows live outside this
/// crate; the hash arrives opaque.
#[instrument(skip(db, password_hash))]
pub async fn create_user(
    db: &PgPool,
    email: &str,
    password_hash: &str,
    name: &str,
    nickname: Option<&str>,
) -> AppResult<User> {
    let email = email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(AppError::Validation(format!("invalid email: {email}")));
    }
    Ok(User::create(db, &email, password_hash, name, nickname).await?)
}

#[instrument(skip(db))]
pub async fn get_or_create_profile(db: &PgPool, user_id: Uuid) -> AppResult<Profile> {
    Ok(Profile::get_or_create(db, user_id).await?)
}

/// Partial profile update. Tag vectors already carry the closed vocabulary
/// in their types, so anything that deserialized is valid here.
#[instrument(skip(db))]
pub async fn update_profile(
    db: &PgPool,
    user_id: Uuid,
    allergies: Option<Vec<AllergyTag>>,
    preferences: Option<Vec<PreferenceTag>>,
    image_url: Option<String>,
) -> AppResult<Profile> {
    // First touch creates the row, mirroring get-or-create on read.
    Profile::get_or_create(db, user_id).await?;
    Profile::update(
        db,
        user_id,
        allergies.as_deref(),
        preferences.as_deref(),
        image_url.as_deref(),
    )
    .await?
    .ok_or_else(|| AppError::not_found(format!("profile for user {user_id}")))
}
