use sqlx::PgExecutor;
use uuid::Uuid;

use crate::tags::{AllergyTag, PreferenceTag};
use crate::users::repo_types::{Profile, User};

impl User {
    pub async fn find_by_id<'e>(db: impl PgExecutor<'e>, id: Uuid) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, name, nickname, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await
    }

    pub async fn find_by_email<'e>(
        db: impl PgExecutor<'e>,
        email: &str,
    ) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, name, nickname, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await
    }

    pub async fn create<'e>(
        db: impl PgExecutor<'e>,
        email: &str,
        password_hash: &str,
        name: &str,
        nickname: Option<&str>,
    ) -> sqlx::Result<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, name, nickname)
            VALUES ($1, $2, $3, $4)
            RETURNING id, email, password_hash, name, nickname, created_at
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .bind(name)
        .bind(nickname)
        .fetch_one(db)
        .await
    }
}

impl Profile {
    /// Fetch the user's profile, creating an empty one on first access.
    pub async fn get_or_create<'e, E>(db: E, user_id: Uuid) -> sqlx::Result<Profile>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (user_id)
            VALUES ($1)
            ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING user_id, allergies, preferences, image_url, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .fetch_one(db)
        .await
    }

    pub async fn update<'e>(
        db: impl PgExecutor<'e>,
        user_id: Uuid,
        allergies: Option<&[AllergyTag]>,
        preferences: Option<&[PreferenceTag]>,
        image_url: Option<&str>,
    ) -> sqlx::Result<Option<Profile>> {
        sqlx::query_as::<_, Profile>(
            r#"
            UPDATE profiles
            SET allergies   = COALESCE($2, allergies),
                preferences = COALESCE($3, preferences),
                image_url   = COALESCE($4, image_url),
                updated_at  = now()
            WHERE user_id = $1
            RETURNING user_id, allergies, preferences, image_url, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(allergies.map(sqlx::types::Json))
        .bind(preferences.map(sqlx::types::Json))
        .bind(image_url)
        .fetch_optional(db)
        .await
    }
}
