use crate::access::Role;
use crate::categorization::Category;
use crate::errors::{AppError, ResultExt};
use crate::models::{
    Contact, CreateContactRequest, CreateDealRequest, CreateLeadRequest, Deal, DealStage,
    EntityRef, Lead, LeadCounts, LeadListQuery, LeadScopedQuery, LeadStatistics, NoteListQuery,
    NoteRow, Patch, UpdateContactRequest, UpdateDealRequest, UpdateLeadRequest, User,
};
use crate::scoring::{LeadSource, LeadStatus};
use crate::sentiment::SentimentAnalysis;
use sqlx::PgPool;
use uuid::Uuid;

/// Win probability of a deal opened without one.
pub const DEFAULT_DEAL_PROBABILITY: i32 = 50;

/// PostgreSQL access for users, leads, contacts, deals and notes.
#[derive(Clone)]
pub struct CrmStorage {
    pool: PgPool,
}

impl CrmStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ============ Users ============

    pub async fn find_user_by_token_hash(&self, token_hash: &str) -> Result<Option<User>, AppError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE api_token_hash = $1")
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await
            .context("looking up API token")
    }

    pub async fn create_user(
        &self,
        email: &str,
        full_name: &str,
        role: Role,
        token_hash: &str,
    ) -> Result<User, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, full_name, role, api_token_hash)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(full_name)
        .bind(role.as_str())
        .bind(token_hash)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!("Created user {} ({})", user.email, role);
        Ok(user)
    }

    /// Ensures an admin with `email` exists and owns `token_hash`.
    pub async fn upsert_admin(&self, email: &str, token_hash: &str) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, full_name, role, api_token_hash)
            VALUES ($1, $2, 'Administrator', 'admin', $3)
            ON CONFLICT (email) DO UPDATE
            SET role = 'admin',
                api_token_hash = EXCLUDED.api_token_hash,
                updated_at = now()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(token_hash)
        .fetch_one(&self.pool)
        .await
        .context("upserting bootstrap admin")
    }

    // ============ Leads ============

    pub async fn list_leads(&self, filter: &LeadListQuery) -> Result<Vec<Lead>, AppError> {
        let leads = sqlx::query_as::<_, Lead>(
            r#"
            SELECT * FROM leads
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR category = $2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.category.map(|c| c.as_str()))
        .fetch_all(&self.pool)
        .await?;

        Ok(leads)
    }

    pub async fn get_lead(&self, id: Uuid) -> Result<Option<Lead>, AppError> {
        let lead = sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(lead)
    }

    /// Fetches a lead or fails with `NotFound`.
    pub async fn require_lead(&self, id: Uuid) -> Result<Lead, AppError> {
        self.get_lead(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Lead not found".to_string()))
    }

    pub async fn insert_lead(&self, req: &CreateLeadRequest) -> Result<Lead, AppError> {
        let lead = sqlx::query_as::<_, Lead>(
            r#"
            INSERT INTO leads
                (id, name, email, phone, company, website, description, status, source, assigned_to)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(req.name.trim())
        .bind(req.email.trim().to_lowercase())
        .bind(&req.phone)
        .bind(&req.company)
        .bind(&req.website)
        .bind(&req.description)
        .bind(req.status.unwrap_or(LeadStatus::New).as_str())
        .bind(req.source.unwrap_or(LeadSource::Website).as_str())
        .bind(req.assigned_to)
        .fetch_one(&self.pool)
        .await?;

        Ok(lead)
    }

    /// Applies the given fields. Nullable columns are only touched when
    /// the request carries them, so `null` clears and absence keeps.
    pub async fn update_lead(
        &self,
        id: Uuid,
        req: &UpdateLeadRequest,
    ) -> Result<Option<Lead>, AppError> {
        let phone = patch_text(&req.phone);
        let company = patch_text(&req.company);
        let website = patch_text(&req.website);
        let description = patch_text(&req.description);
        let assigned_to = patch_value(&req.assigned_to);

        let lead = sqlx::query_as::<_, Lead>(
            r#"
            UPDATE leads
            SET name = COALESCE($2, name),
                email = COALESCE($3, email),
                status = COALESCE($4, status),
                source = COALESCE($5, source),
                phone = CASE WHEN $6 THEN $7 ELSE phone END,
                company = CASE WHEN $8 THEN $9 ELSE company END,
                website = CASE WHEN $10 THEN $11 ELSE website END,
                description = CASE WHEN $12 THEN $13 ELSE description END,
                assigned_to = CASE WHEN $14 THEN $15 ELSE assigned_to END,
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(req.name.as_deref().map(str::trim))
        .bind(req.email.as_deref().map(|e| e.trim().to_lowercase()))
        .bind(req.status.map(|s| s.as_str()))
        .bind(req.source.map(|s| s.as_str()))
        .bind(phone.0)
        .bind(phone.1)
        .bind(company.0)
        .bind(company.1)
        .bind(website.0)
        .bind(website.1)
        .bind(description.0)
        .bind(description.1)
        .bind(assigned_to.0)
        .bind(assigned_to.1)
        .fetch_optional(&self.pool)
        .await?;

        Ok(lead)
    }

    pub async fn delete_lead(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM leads WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn lead_counts(&self, id: Uuid) -> Result<LeadCounts, AppError> {
        sqlx::query_as::<_, LeadCounts>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM contacts WHERE lead_id = $1) AS contact_count,
                (SELECT COUNT(*) FROM deals WHERE lead_id = $1) AS deal_count
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("counting contacts/deals for lead {}", id))
    }

    /// Persists whichever AI fields are given and returns the updated lead.
    pub async fn save_ai_fields(
        &self,
        id: Uuid,
        score: Option<u8>,
        category: Option<Category>,
    ) -> Result<Lead, AppError> {
        sqlx::query_as::<_, Lead>(
            r#"
            UPDATE leads
            SET score = COALESCE($2, score),
                category = COALESCE($3, category),
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(score.map(i32::from))
        .bind(category.map(|c| c.as_str()))
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Lead not found".to_string()))
    }

    pub async fn lead_statistics(&self) -> Result<LeadStatistics, AppError> {
        sqlx::query_as::<_, LeadStatistics>(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE status = 'new') AS "new",
                COUNT(*) FILTER (WHERE status = 'contacted') AS contacted,
                COUNT(*) FILTER (WHERE status = 'qualified') AS qualified,
                COUNT(*) FILTER (WHERE status = 'lost') AS lost,
                COUNT(*) FILTER (WHERE status = 'converted') AS converted,
                COUNT(*) FILTER (WHERE category = 'hot') AS hot,
                COUNT(*) FILTER (WHERE category = 'warm') AS warm,
                COUNT(*) FILTER (WHERE category = 'cold') AS cold
            FROM leads
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .context("computing lead statistics")
    }

    // ============ Contacts ============

    /// Lists contacts, primary ones first, optionally for a single lead.
    pub async fn list_contacts(&self, filter: &LeadScopedQuery) -> Result<Vec<Contact>, AppError> {
        let contacts = sqlx::query_as::<_, Contact>(
            r#"
            SELECT * FROM contacts
            WHERE ($1::uuid IS NULL OR lead_id = $1)
            ORDER BY is_primary DESC, created_at DESC
            "#,
        )
        .bind(filter.lead_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(contacts)
    }

    pub async fn get_contact(&self, id: Uuid) -> Result<Option<Contact>, AppError> {
        let contact = sqlx::query_as::<_, Contact>("SELECT * FROM contacts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(contact)
    }

    pub async fn insert_contact(&self, req: &CreateContactRequest) -> Result<Contact, AppError> {
        let contact = sqlx::query_as::<_, Contact>(
            r#"
            INSERT INTO contacts (id, lead_id, name, email, phone, position, is_primary)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(req.lead_id)
        .bind(req.name.trim())
        .bind(req.email.trim().to_lowercase())
        .bind(&req.phone)
        .bind(&req.position)
        .bind(req.is_primary)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!("Added contact {} to lead {}", contact.id, contact.lead_id);
        Ok(contact)
    }

    pub async fn update_contact(
        &self,
        id: Uuid,
        req: &UpdateContactRequest,
    ) -> Result<Option<Contact>, AppError> {
        let phone = patch_text(&req.phone);
        let position = patch_text(&req.position);

        let contact = sqlx::query_as::<_, Contact>(
            r#"
            UPDATE contacts
            SET name = COALESCE($2, name),
                email = COALESCE($3, email),
                is_primary = COALESCE($4, is_primary),
                phone = CASE WHEN $5 THEN $6 ELSE phone END,
                position = CASE WHEN $7 THEN $8 ELSE position END,
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(req.name.as_deref().map(str::trim))
        .bind(req.email.as_deref().map(|e| e.trim().to_lowercase()))
        .bind(req.is_primary)
        .bind(phone.0)
        .bind(phone.1)
        .bind(position.0)
        .bind(position.1)
        .fetch_optional(&self.pool)
        .await?;

        Ok(contact)
    }

    /// Deletes a contact and returns the lead it belonged to.
    pub async fn delete_contact(&self, id: Uuid) -> Result<Option<Uuid>, AppError> {
        let lead_id =
            sqlx::query_scalar::<_, Uuid>("DELETE FROM contacts WHERE id = $1 RETURNING lead_id")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(lead_id)
    }

    // ============ Deals ============

    /// Lists deals, newest first, optionally for a single lead.
    pub async fn list_deals(&self, filter: &LeadScopedQuery) -> Result<Vec<Deal>, AppError> {
        let deals = sqlx::query_as::<_, Deal>(
            r#"
            SELECT * FROM deals
            WHERE ($1::uuid IS NULL OR lead_id = $1)
            ORDER BY created_at DESC
            "#,
        )
        .bind(filter.lead_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(deals)
    }

    pub async fn get_deal(&self, id: Uuid) -> Result<Option<Deal>, AppError> {
        let deal = sqlx::query_as::<_, Deal>("SELECT * FROM deals WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(deal)
    }

    pub async fn insert_deal(
        &self,
        req: &CreateDealRequest,
        created_by: Uuid,
    ) -> Result<Deal, AppError> {
        let deal = sqlx::query_as::<_, Deal>(
            r#"
            INSERT INTO deals
                (id, lead_id, title, value_cents, stage, probability,
                 expected_close_date, description, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(req.lead_id)
        .bind(req.title.trim())
        .bind(req.value_cents)
        .bind(req.stage.unwrap_or(DealStage::Prospecting).as_str())
        .bind(req.probability.unwrap_or(DEFAULT_DEAL_PROBABILITY))
        .bind(req.expected_close_date)
        .bind(&req.description)
        .bind(created_by)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!("Opened deal {} on lead {}", deal.id, deal.lead_id);
        Ok(deal)
    }

    pub async fn update_deal(
        &self,
        id: Uuid,
        req: &UpdateDealRequest,
    ) -> Result<Option<Deal>, AppError> {
        let close_date = patch_value(&req.expected_close_date);
        let description = patch_text(&req.description);

        let deal = sqlx::query_as::<_, Deal>(
            r#"
            UPDATE deals
            SET title = COALESCE($2, title),
                value_cents = COALESCE($3, value_cents),
                stage = COALESCE($4, stage),
                probability = COALESCE($5, probability),
                expected_close_date = CASE WHEN $6 THEN $7 ELSE expected_close_date END,
                description = CASE WHEN $8 THEN $9 ELSE description END,
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(req.title.as_deref().map(str::trim))
        .bind(req.value_cents)
        .bind(req.stage.map(|s| s.as_str()))
        .bind(req.probability)
        .bind(close_date.0)
        .bind(close_date.1)
        .bind(description.0)
        .bind(description.1)
        .fetch_optional(&self.pool)
        .await?;

        Ok(deal)
    }

    /// Deletes a deal and returns the lead it belonged to.
    pub async fn delete_deal(&self, id: Uuid) -> Result<Option<Uuid>, AppError> {
        let lead_id =
            sqlx::query_scalar::<_, Uuid>("DELETE FROM deals WHERE id = $1 RETURNING lead_id")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(lead_id)
    }

    // ============ Notes ============

    /// Whether the referenced record exists. Clients live outside this
    /// service's schema and are accepted as given.
    pub async fn entity_exists(&self, entity: EntityRef) -> Result<bool, AppError> {
        let table = match entity {
            EntityRef::Lead(_) => "leads",
            EntityRef::Contact(_) => "contacts",
            EntityRef::Deal(_) => "deals",
            EntityRef::Client(_) => return Ok(true),
        };

        let exists = sqlx::query_scalar::<_, bool>(&format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1)",
            table
        ))
        .bind(entity.id())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    pub async fn insert_note(
        &self,
        content: &str,
        entity: EntityRef,
        analysis: &SentimentAnalysis,
        created_by: Uuid,
    ) -> Result<NoteRow, AppError> {
        let row = sqlx::query_as::<_, NoteRow>(
            r#"
            INSERT INTO notes
                (id, content, entity_kind, entity_id, sentiment, polarity, subjectivity, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(content)
        .bind(entity.kind())
        .bind(entity.id())
        .bind(analysis.sentiment.as_str())
        .bind(analysis.polarity)
        .bind(analysis.subjectivity)
        .bind(created_by)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn list_notes(&self, filter: &NoteListQuery) -> Result<Vec<NoteRow>, AppError> {
        let rows = sqlx::query_as::<_, NoteRow>(
            r#"
            SELECT * FROM notes
            WHERE ($1::text IS NULL OR entity_kind = $1)
              AND ($2::uuid IS NULL OR entity_id = $2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(filter.entity_kind.as_deref())
        .bind(filter.entity_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

/// Splits a text patch into the `CASE WHEN` flag and the new value.
fn patch_text(patch: &Patch<String>) -> (bool, Option<&str>) {
    (patch.is_some(), patch.as_ref().and_then(|v| v.as_deref()))
}

fn patch_value<T: Copy>(patch: &Patch<T>) -> (bool, Option<T>) {
    (patch.is_some(), patch.flatten())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_text() {
        assert_eq!(patch_text(&None), (false, None));
        assert_eq!(patch_text(&Some(None)), (true, None));
        assert_eq!(
            patch_text(&Some(Some("+1 555 0100".to_string()))),
            (true, Some("+1 555 0100"))
        );
    }

    #[test]
    fn test_patch_value() {
        let id = Uuid::new_v4();
        assert_eq!(patch_value::<Uuid>(&None), (false, None));
        assert_eq!(patch_value::<Uuid>(&Some(None)), (true, None));
        assert_eq!(patch_value(&Some(Some(id))), (true, Some(id)));
    }
}
