use crate::access::Permission;
use crate::auth::{generate_token, hash_token, AuthUser};
use crate::config::Config;
use crate::db_storage::CrmStorage;
use crate::errors::AppError;
use crate::models::*;
use crate::sentiment::analyze_sentiment_detailed;
use crate::services::InsightsService;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use moka::future::Cache;
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: PgPool,
    /// Application configuration.
    pub config: Config,
    /// Users resolved from API tokens, keyed by token digest.
    pub auth_cache: Cache<String, User>,
}

/// Health check endpoint.
///
/// Returns the service status, version, and health information.
///
/// # Returns
///
/// * `(StatusCode, Json<serde_json::Value>)` - HTTP 200 OK with health status JSON.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "crm-insights-api",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

fn validate_email(email: &str) -> Result<(), AppError> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(AppError::BadRequest(format!("Invalid email address: {}", email))),
    }
}

fn require_non_blank(value: &str, field: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::BadRequest(format!("{} is required", field)));
    }
    Ok(())
}

fn validate_deal_figures(value_cents: Option<i64>, probability: Option<i32>) -> Result<(), AppError> {
    if value_cents.is_some_and(|v| v < 0) {
        return Err(AppError::BadRequest(
            "value_cents cannot be negative".to_string(),
        ));
    }
    if probability.is_some_and(|p| !(0..=100).contains(&p)) {
        return Err(AppError::BadRequest(
            "probability must be between 0 and 100".to_string(),
        ));
    }
    Ok(())
}

/// Fails with 400 when the lead a new contact or deal points at is missing.
async fn require_parent_lead(storage: &CrmStorage, lead_id: Uuid) -> Result<(), AppError> {
    if storage.get_lead(lead_id).await?.is_none() {
        return Err(AppError::BadRequest(format!("Lead {} does not exist", lead_id)));
    }
    Ok(())
}

// ============ Leads ============

/// GET /api/v1/leads
///
/// Lists leads, newest first.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `user` - The authenticated caller.
/// * `filter` - Optional `status` and `category` filters.
///
/// # Returns
///
/// * `Result<Json<Vec<Lead>>, AppError>` - The matching leads or an error.
pub async fn list_leads(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(filter): Query<LeadListQuery>,
) -> Result<Json<Vec<Lead>>, AppError> {
    tracing::info!("GET /leads - filter: {:?}", filter);
    user.require(Permission::ViewLeads)?;

    let leads = CrmStorage::new(state.db.clone()).list_leads(&filter).await?;
    Ok(Json(leads))
}

/// POST /api/v1/leads
///
/// Creates a lead and computes its score and category right away.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `user` - The authenticated caller.
/// * `payload` - The lead fields.
///
/// # Returns
///
/// * `Result<(StatusCode, Json<Lead>), AppError>` - 201 Created with the scored lead.
pub async fn create_lead(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(payload): Json<CreateLeadRequest>,
) -> Result<(StatusCode, Json<Lead>), AppError> {
    tracing::info!("POST /leads - {}", payload.email);
    user.require(Permission::ManageLeads)?;
    require_non_blank(&payload.name, "name")?;
    validate_email(&payload.email)?;

    let lead = CrmStorage::new(state.db.clone())
        .insert_lead(&payload)
        .await?;
    let insights = InsightsService::new(state.db.clone())
        .refresh(lead.id)
        .await?;

    Ok((StatusCode::CREATED, Json(insights.lead)))
}

/// GET /api/v1/leads/:id
pub async fn get_lead(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Lead>, AppError> {
    tracing::info!("GET /leads/{}", id);
    user.require(Permission::ViewLeads)?;

    let lead = CrmStorage::new(state.db.clone()).require_lead(id).await?;
    Ok(Json(lead))
}

/// PUT /api/v1/leads/:id
///
/// Updates the given fields; absent fields keep their value. Score and
/// category are left alone until the next insights refresh.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `user` - The authenticated caller.
/// * `id` - The lead id.
/// * `payload` - Fields to change.
///
/// # Returns
///
/// * `Result<Json<Lead>, AppError>` - The updated lead, or 404.
pub async fn update_lead(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLeadRequest>,
) -> Result<Json<Lead>, AppError> {
    tracing::info!("PUT /leads/{}", id);
    user.require(Permission::ManageLeads)?;
    if let Some(name) = &payload.name {
        require_non_blank(name, "name")?;
    }
    if let Some(email) = &payload.email {
        validate_email(email)?;
    }

    CrmStorage::new(state.db.clone())
        .update_lead(id, &payload)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Lead not found".to_string()))
}

/// DELETE /api/v1/leads/:id
pub async fn delete_lead(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    tracing::info!("DELETE /leads/{}", id);
    user.require(Permission::DeleteLeads)?;

    if !CrmStorage::new(state.db.clone()).delete_lead(id).await? {
        return Err(AppError::NotFound("Lead not found".to_string()));
    }

    tracing::info!("Lead {} deleted by {}", id, user.0.email);
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/leads/:id/update-ai
///
/// Recomputes score and category for one lead.
pub async fn update_lead_ai(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<LeadAiUpdateResponse>, AppError> {
    tracing::info!("POST /leads/{}/update-ai", id);
    user.require(Permission::RunInsights)?;

    let insights = InsightsService::new(state.db.clone()).refresh(id).await?;

    Ok(Json(LeadAiUpdateResponse {
        message: "AI fields updated successfully".to_string(),
        lead: insights.lead,
    }))
}

/// GET /api/v1/leads/statistics
pub async fn lead_statistics(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<LeadStatistics>, AppError> {
    tracing::info!("GET /leads/statistics");
    user.require(Permission::ViewLeads)?;

    let stats = CrmStorage::new(state.db.clone()).lead_statistics().await?;
    Ok(Json(stats))
}

// ============ Contacts ============

/// GET /api/v1/contacts
///
/// # Arguments
///
/// * `state` - The application state.
/// * `user` - The authenticated caller.
/// * `filter` - Optional `lead_id` to list one lead's contacts.
///
/// # Returns
///
/// * `Result<Json<Vec<Contact>>, AppError>` - Contacts, primary ones first.
pub async fn list_contacts(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(filter): Query<LeadScopedQuery>,
) -> Result<Json<Vec<Contact>>, AppError> {
    tracing::info!("GET /contacts - filter: {:?}", filter);
    user.require(Permission::ViewLeads)?;

    let contacts = CrmStorage::new(state.db.clone())
        .list_contacts(&filter)
        .await?;
    Ok(Json(contacts))
}

/// POST /api/v1/contacts
///
/// Adds a contact to an existing lead. The lead's score picks up the new
/// contact on its next insights refresh.
pub async fn create_contact(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(payload): Json<CreateContactRequest>,
) -> Result<(StatusCode, Json<Contact>), AppError> {
    tracing::info!("POST /contacts - lead {}", payload.lead_id);
    user.require(Permission::ManageLeads)?;
    require_non_blank(&payload.name, "name")?;
    validate_email(&payload.email)?;

    let storage = CrmStorage::new(state.db.clone());
    require_parent_lead(&storage, payload.lead_id).await?;
    let contact = storage.insert_contact(&payload).await?;

    Ok((StatusCode::CREATED, Json(contact)))
}

/// GET /api/v1/contacts/:id
pub async fn get_contact(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Contact>, AppError> {
    tracing::info!("GET /contacts/{}", id);
    user.require(Permission::ViewLeads)?;

    CrmStorage::new(state.db.clone())
        .get_contact(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Contact not found".to_string()))
}

/// PUT /api/v1/contacts/:id
pub async fn update_contact(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateContactRequest>,
) -> Result<Json<Contact>, AppError> {
    tracing::info!("PUT /contacts/{}", id);
    user.require(Permission::ManageLeads)?;
    if let Some(name) = &payload.name {
        require_non_blank(name, "name")?;
    }
    if let Some(email) = &payload.email {
        validate_email(email)?;
    }

    CrmStorage::new(state.db.clone())
        .update_contact(id, &payload)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Contact not found".to_string()))
}

/// DELETE /api/v1/contacts/:id
pub async fn delete_contact(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    tracing::info!("DELETE /contacts/{}", id);
    user.require(Permission::ManageLeads)?;

    let lead_id = CrmStorage::new(state.db.clone())
        .delete_contact(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Contact not found".to_string()))?;

    tracing::info!("Contact {} of lead {} deleted by {}", id, lead_id, user.0.email);
    Ok(StatusCode::NO_CONTENT)
}

// ============ Deals ============

/// GET /api/v1/deals
///
/// # Arguments
///
/// * `state` - The application state.
/// * `user` - The authenticated caller.
/// * `filter` - Optional `lead_id` to list one lead's deals.
///
/// # Returns
///
/// * `Result<Json<Vec<Deal>>, AppError>` - Deals, newest first.
pub async fn list_deals(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(filter): Query<LeadScopedQuery>,
) -> Result<Json<Vec<Deal>>, AppError> {
    tracing::info!("GET /deals - filter: {:?}", filter);
    user.require(Permission::ViewLeads)?;

    let deals = CrmStorage::new(state.db.clone()).list_deals(&filter).await?;
    Ok(Json(deals))
}

/// POST /api/v1/deals
///
/// Opens a deal on an existing lead, recording the caller as its creator.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `user` - The authenticated caller.
/// * `payload` - Deal title, value, stage and probability.
///
/// # Returns
///
/// * `Result<(StatusCode, Json<Deal>), AppError>` - 201 Created with the deal.
pub async fn create_deal(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(payload): Json<CreateDealRequest>,
) -> Result<(StatusCode, Json<Deal>), AppError> {
    tracing::info!("POST /deals - lead {}", payload.lead_id);
    user.require(Permission::ManageLeads)?;
    require_non_blank(&payload.title, "title")?;
    validate_deal_figures(Some(payload.value_cents), payload.probability)?;

    let storage = CrmStorage::new(state.db.clone());
    require_parent_lead(&storage, payload.lead_id).await?;
    let deal = storage.insert_deal(&payload, user.0.id).await?;

    Ok((StatusCode::CREATED, Json(deal)))
}

/// GET /api/v1/deals/:id
pub async fn get_deal(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Deal>, AppError> {
    tracing::info!("GET /deals/{}", id);
    user.require(Permission::ViewLeads)?;

    CrmStorage::new(state.db.clone())
        .get_deal(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Deal not found".to_string()))
}

/// PUT /api/v1/deals/:id
pub async fn update_deal(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateDealRequest>,
) -> Result<Json<Deal>, AppError> {
    tracing::info!("PUT /deals/{}", id);
    user.require(Permission::ManageLeads)?;
    if let Some(title) = &payload.title {
        require_non_blank(title, "title")?;
    }
    validate_deal_figures(payload.value_cents, payload.probability)?;

    CrmStorage::new(state.db.clone())
        .update_deal(id, &payload)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Deal not found".to_string()))
}

/// DELETE /api/v1/deals/:id
pub async fn delete_deal(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    tracing::info!("DELETE /deals/{}", id);
    user.require(Permission::ManageLeads)?;

    let lead_id = CrmStorage::new(state.db.clone())
        .delete_deal(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Deal not found".to_string()))?;

    tracing::info!("Deal {} of lead {} deleted by {}", id, lead_id, user.0.email);
    Ok(StatusCode::NO_CONTENT)
}

// ============ Notes ============

/// GET /api/v1/notes
///
/// # Arguments
///
/// * `state` - The application state.
/// * `user` - The authenticated caller.
/// * `filter` - Optional `entity_kind` / `entity_id` to narrow to one record.
///
/// # Returns
///
/// * `Result<Json<Vec<Note>>, AppError>` - Notes, newest first.
pub async fn list_notes(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(filter): Query<NoteListQuery>,
) -> Result<Json<Vec<Note>>, AppError> {
    tracing::info!("GET /notes - filter: {:?}", filter);
    user.require(Permission::ViewNotes)?;

    if let Some(kind) = filter.entity_kind.as_deref() {
        if EntityRef::from_parts(kind, Uuid::nil()).is_none() {
            return Err(AppError::BadRequest(format!("Unknown entity kind: {}", kind)));
        }
    }

    let rows = CrmStorage::new(state.db.clone())
        .list_notes(&filter)
        .await?;

    let notes = rows
        .into_iter()
        .map(Note::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map_err(AppError::InternalError)?;

    Ok(Json(notes))
}

/// POST /api/v1/notes
///
/// Attaches a note to a lead, contact, deal or client. The note's
/// sentiment is analyzed and stored alongside it.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `user` - The authenticated caller, recorded as the author.
/// * `payload` - Note content and the record it belongs to.
///
/// # Returns
///
/// * `Result<(StatusCode, Json<Note>), AppError>` - 201 Created with the note.
pub async fn create_note(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(payload): Json<CreateNoteRequest>,
) -> Result<(StatusCode, Json<Note>), AppError> {
    tracing::info!(
        "POST /notes - {} {}",
        payload.related_to.kind(),
        payload.related_to.id()
    );
    user.require(Permission::WriteNotes)?;
    require_non_blank(&payload.content, "content")?;

    let storage = CrmStorage::new(state.db.clone());
    if !storage.entity_exists(payload.related_to).await? {
        return Err(AppError::NotFound(format!(
            "{} {} not found",
            payload.related_to.kind(),
            payload.related_to.id()
        )));
    }

    let analysis = analyze_sentiment_detailed(&payload.content);
    let row = storage
        .insert_note(&payload.content, payload.related_to, &analysis, user.0.id)
        .await?;
    let note = Note::try_from(row).map_err(AppError::InternalError)?;

    Ok((StatusCode::CREATED, Json(note)))
}

// ============ Users ============

/// GET /api/v1/users/me
pub async fn current_user(user: AuthUser) -> Json<UserProfile> {
    tracing::info!("GET /users/me - {}", user.0.email);
    Json(UserProfile::from(&user.0))
}

/// POST /api/v1/users
///
/// Creates a user and issues their API token. The token is only returned
/// here; the database keeps its digest.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `user` - The authenticated caller (must be allowed to manage users).
/// * `payload` - Email, full name and role of the new user.
///
/// # Returns
///
/// * `Result<(StatusCode, Json<CreateUserResponse>), AppError>` - 201 Created with the token.
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<CreateUserResponse>), AppError> {
    tracing::info!("POST /users - {} as {}", payload.email, payload.role);
    user.require(Permission::ManageUsers)?;
    validate_email(&payload.email)?;
    require_non_blank(&payload.full_name, "full_name")?;

    let token = generate_token();
    let created = CrmStorage::new(state.db.clone())
        .create_user(
            &payload.email.trim().to_lowercase(),
            payload.full_name.trim(),
            payload.role,
            &hash_token(&token),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateUserResponse {
            user: UserProfile::from(&created),
            api_token: token,
        }),
    ))
}
