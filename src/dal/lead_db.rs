use sqlx::PgPool;
use uuid::Uuid;

use crate::{domain::lead::Lead, error::StorageError};

pub async fn upsert_lead(lead: &Lead, pool: &PgPool) -> Result<(), StorageError> {
    if lead.name.is_empty() {
        return Err(StorageError::Rejected(format!(
            "lead for {} has no name",
            lead.website_url
        )));
    }

    sqlx::query(
        r#"
        insert into lead
            (id, user_id, business_name, website_url, name, title, email, linkedin, sources, research_summary)
        values
            ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        on conflict (user_id, website_url, name) do update set
            title = excluded.title,
            email = coalesce(excluded.email, lead.email),
            linkedin = coalesce(excluded.linkedin, lead.linkedin),
            sources = excluded.sources,
            research_summary = excluded.research_summary
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&lead.user_id)
    .bind(&lead.business_name)
    .bind(&lead.website_url)
    .bind(&lead.name)
    .bind(&lead.title)
    .bind(&lead.email)
    .bind(&lead.linkedin)
    .bind(&lead.sources)
    .bind(&lead.research_summary)
    .execute(pool)
    .await?;

    Ok(())
}
