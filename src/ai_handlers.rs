//! Rule-based "AI" endpoints: scoring, categorization, email drafting and
//! sentiment analysis.

use crate::access::Permission;
use crate::auth::AuthUser;
use crate::categorization::category_details;
use crate::email_generator::{generate_email, GeneratedEmail};
use crate::errors::AppError;
use crate::handlers::AppState;
use crate::models::*;
use crate::sentiment::{analyze_sentiment, analyze_sentiment_detailed};
use crate::services::InsightsService;
use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

fn require_lead_id(payload: &LeadIdRequest) -> Result<Uuid, AppError> {
    payload
        .lead_id
        .ok_or_else(|| AppError::BadRequest("lead_id is required".to_string()))
}

/// POST /api/v1/ai/score-lead
///
/// Recomputes a lead's score and stores it.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `user` - The authenticated caller.
/// * `payload` - `{ "lead_id": "<uuid>" }`.
///
/// # Returns
///
/// * `Result<Json<ScoreLeadResponse>, AppError>` - The score with its per-rule breakdown.
pub async fn score_lead(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(payload): Json<LeadIdRequest>,
) -> Result<Json<ScoreLeadResponse>, AppError> {
    tracing::info!("POST /ai/score-lead - {:?}", payload.lead_id);
    user.require(Permission::RunInsights)?;
    let lead_id = require_lead_id(&payload)?;

    let (lead, breakdown) = InsightsService::new(state.db.clone())
        .score(lead_id)
        .await?;

    Ok(Json(ScoreLeadResponse {
        lead_id: lead.id,
        lead_name: lead.name,
        score: breakdown.total(),
        breakdown,
        message: "Lead score calculated successfully".to_string(),
    }))
}

/// POST /api/v1/ai/categorize-lead
///
/// Categorizes a lead from its stored score, status and engagement, and
/// stores the category.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `user` - The authenticated caller.
/// * `payload` - `{ "lead_id": "<uuid>" }`.
///
/// # Returns
///
/// * `Result<Json<CategorizeLeadResponse>, AppError>` - Category, signals and recommended actions.
pub async fn categorize_lead(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(payload): Json<LeadIdRequest>,
) -> Result<Json<CategorizeLeadResponse>, AppError> {
    tracing::info!("POST /ai/categorize-lead - {:?}", payload.lead_id);
    user.require(Permission::RunInsights)?;
    let lead_id = require_lead_id(&payload)?;

    let (lead, assessment) = InsightsService::new(state.db.clone())
        .categorize(lead_id)
        .await?;

    Ok(Json(CategorizeLeadResponse {
        lead_id: lead.id,
        lead_name: lead.name,
        category: assessment.category,
        assessment,
        details: category_details(assessment.category),
        message: "Lead categorized successfully".to_string(),
    }))
}

/// POST /api/v1/ai/update-all
///
/// Scores the lead, then categorizes it with the new score. Both are stored.
pub async fn update_all(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(payload): Json<LeadIdRequest>,
) -> Result<Json<UpdateAllResponse>, AppError> {
    tracing::info!("POST /ai/update-all - {:?}", payload.lead_id);
    user.require(Permission::RunInsights)?;
    let lead_id = require_lead_id(&payload)?;

    let insights = InsightsService::new(state.db.clone())
        .refresh(lead_id)
        .await?;
    let category = insights.assessment.category;

    Ok(Json(UpdateAllResponse {
        lead_id: insights.lead.id,
        lead_name: insights.lead.name,
        score: insights.score,
        category,
        category_details: category_details(category),
        message: "All AI fields updated successfully".to_string(),
    }))
}

/// POST /api/v1/ai/generate-email
///
/// Renders one of the canned email templates with the given context.
/// Unknown templates and missing variables come back as 400 with a
/// structured body.
///
/// # Arguments
///
/// * `user` - The authenticated caller.
/// * `payload` - `{ "email_type": "...", "context": { ... } }`.
///
/// # Returns
///
/// * `Result<Json<GeneratedEmail>, AppError>` - The rendered subject and body.
pub async fn generate_email_handler(
    user: AuthUser,
    Json(payload): Json<GenerateEmailRequest>,
) -> Result<Json<GeneratedEmail>, AppError> {
    tracing::info!("POST /ai/generate-email - {:?}", payload.email_type);
    user.require(Permission::RunInsights)?;

    let email_type = payload
        .email_type
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("email_type is required".to_string()))?;

    let email = generate_email(email_type.trim(), &payload.context)?;
    Ok(Json(email))
}

/// POST /api/v1/ai/analyze-sentiment
///
/// Returns `{sentiment, score}`, or the full analysis when `detailed` is set.
pub async fn analyze_sentiment_handler(
    user: AuthUser,
    Json(payload): Json<AnalyzeSentimentRequest>,
) -> Result<Response, AppError> {
    tracing::info!(
        "POST /ai/analyze-sentiment - {} chars, detailed={}",
        payload.text.len(),
        payload.detailed
    );
    user.require(Permission::RunInsights)?;

    if payload.text.trim().is_empty() {
        return Err(AppError::BadRequest("text is required".to_string()));
    }

    if payload.detailed {
        return Ok(Json(analyze_sentiment_detailed(&payload.text)).into_response());
    }

    let (sentiment, score) = analyze_sentiment(&payload.text);
    Ok(Json(SentimentResponse { sentiment, score }).into_response())
}
