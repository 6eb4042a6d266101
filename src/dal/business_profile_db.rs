use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use crate::{domain::business::BusinessProfile, error::StorageError};

pub async fn upsert_business_profile(
    user_id: &str,
    profile: &BusinessProfile,
    pool: &PgPool,
) -> Result<(), StorageError> {
    if profile.website_url.is_empty() {
        return Err(StorageError::Rejected(format!(
            "business profile {} has no website url",
            profile.name
        )));
    }

    sqlx::query(
        r#"
        insert into business_profile
            (id, user_id, name, website_url, description, social_links, team_members)
        values
            ($1, $2, $3, $4, $5, $6, $7)
        on conflict (user_id, website_url) do update set
            name = excluded.name,
            description = excluded.description,
            social_links = excluded.social_links,
            team_members = excluded.team_members
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(&profile.name)
    .bind(&profile.website_url)
    .bind(&profile.description)
    .bind(Json(&profile.social_links))
    .bind(Json(&profile.team_members))
    .execute(pool)
    .await?;

    Ok(())
}
