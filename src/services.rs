use crate::categorization::{assess_lead, assess_with_stored_score, CategoryAssessment};
use crate::db_storage::CrmStorage;
use crate::errors::AppError;
use crate::models::Lead;
use crate::scoring::{score_breakdown, LeadSnapshot, ScoreBreakdown};
use sqlx::PgPool;
use uuid::Uuid;

/// Score and category freshly computed for a lead.
#[derive(Debug, Clone)]
pub struct LeadInsights {
    pub lead: Lead,
    pub breakdown: ScoreBreakdown,
    pub score: u8,
    pub assessment: CategoryAssessment,
}

/// Runs the rule engine against stored leads and persists the results.
///
/// Every operation re-reads the lead and its contact/deal counts, so the
/// rules always see the current record.
pub struct InsightsService {
    storage: CrmStorage,
}

impl InsightsService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            storage: CrmStorage::new(pool),
        }
    }

    async fn snapshot(&self, lead_id: Uuid) -> Result<LeadSnapshot, AppError> {
        let lead = self.storage.require_lead(lead_id).await?;
        let counts = self.storage.lead_counts(lead_id).await?;
        Ok(lead.snapshot(counts))
    }

    /// Recomputes and stores the score only.
    pub async fn score(&self, lead_id: Uuid) -> Result<(Lead, ScoreBreakdown), AppError> {
        let snapshot = self.snapshot(lead_id).await?;
        let breakdown = score_breakdown(&snapshot);
        let lead = self
            .storage
            .save_ai_fields(lead_id, Some(breakdown.total()), None)
            .await?;

        tracing::info!("Scored lead {}: {}", lead_id, breakdown.total());
        Ok((lead, breakdown))
    }

    /// Recomputes and stores the category from the score already on record.
    /// A lead that was never scored is categorized with a base of 0.
    pub async fn categorize(&self, lead_id: Uuid) -> Result<(Lead, CategoryAssessment), AppError> {
        let snapshot = self.snapshot(lead_id).await?;
        let assessment = assess_with_stored_score(&snapshot);
        let lead = self
            .storage
            .save_ai_fields(lead_id, None, Some(assessment.category))
            .await?;

        tracing::info!("Categorized lead {}: {}", lead_id, assessment.category);
        Ok((lead, assessment))
    }

    /// Scores the lead, categorizes it with the fresh score and stores both.
    pub async fn refresh(&self, lead_id: Uuid) -> Result<LeadInsights, AppError> {
        let snapshot = self.snapshot(lead_id).await?;
        let breakdown = score_breakdown(&snapshot);
        let score = breakdown.total();
        let assessment = assess_lead(&snapshot, score);

        let lead = self
            .storage
            .save_ai_fields(lead_id, Some(score), Some(assessment.category))
            .await?;

        tracing::info!(
            "Refreshed insights for lead {}: score={} category={} (weighted {:.1})",
            lead_id,
            score,
            assessment.category,
            assessment.weighted_score
        );

        Ok(LeadInsights {
            lead,
            breakdown,
            score,
            assessment,
        })
    }
}
