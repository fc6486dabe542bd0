use crate::access::{permissions_for, Permission, Role};
use crate::categorization::{Category, CategoryAssessment, CategoryDetails};
use crate::scoring::{LeadSnapshot, LeadSource, LeadStatus, ScoreBreakdown};
use crate::sentiment::Sentiment;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use std::collections::HashMap;
use uuid::Uuid;

// ============ Database Models ============

/// A CRM user. Authenticates with an API token stored only as a digest.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    /// Stored role name; see [`User::role`].
    pub role: String,
    #[serde(skip_serializing)]
    pub api_token_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn role(&self) -> Role {
        Role::from_db(&self.role)
    }
}

/// A potential customer tracked through the sales funnel.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub website: Option<String>,
    pub description: Option<String>,
    /// One of new, contacted, qualified, lost, converted.
    pub status: String,
    /// One of referral, website, social_media, email_campaign, cold_call, other.
    pub source: String,
    /// Conversion likelihood, 0-100.
    pub score: i32,
    /// hot, warm or cold.
    pub category: String,
    pub assigned_to: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Lead {
    /// Builds the scoring snapshot for this lead.
    pub fn snapshot(&self, counts: LeadCounts) -> LeadSnapshot {
        LeadSnapshot {
            source: self.source.parse().unwrap_or(LeadSource::Unknown),
            status: self.status.parse().unwrap_or(LeadStatus::Unknown),
            company_present: is_present(&self.company),
            phone_present: is_present(&self.phone),
            website_present: is_present(&self.website),
            contact_count: clamp_count(counts.contact_count),
            deal_count: clamp_count(counts.deal_count),
            existing_score: u8::try_from(self.score.clamp(0, 100)).ok().filter(|s| *s > 0),
        }
    }
}

fn is_present(field: &Option<String>) -> bool {
    field.as_deref().is_some_and(|v| !v.trim().is_empty())
}

fn clamp_count(count: i64) -> u32 {
    u32::try_from(count.max(0)).unwrap_or(u32::MAX)
}

/// Number of contacts and deals linked to a lead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromRow)]
pub struct LeadCounts {
    pub contact_count: i64,
    pub deal_count: i64,
}

/// A person at a lead's organisation.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Contact {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub position: Option<String>,
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Pipeline stage of a deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealStage {
    Prospecting,
    Qualification,
    Proposal,
    Negotiation,
    ClosedWon,
    ClosedLost,
}

impl DealStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            DealStage::Prospecting => "prospecting",
            DealStage::Qualification => "qualification",
            DealStage::Proposal => "proposal",
            DealStage::Negotiation => "negotiation",
            DealStage::ClosedWon => "closed_won",
            DealStage::ClosedLost => "closed_lost",
        }
    }
}

/// A sales opportunity opened against a lead.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Deal {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub title: String,
    /// Deal value in cents.
    pub value_cents: i64,
    /// See [`DealStage`].
    pub stage: String,
    /// Win probability, 0-100.
    pub probability: i32,
    pub expected_close_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

// ============ Polymorphic attachments ============

/// The CRM record a note (or other attachment) belongs to.
///
/// Serialized as `{"kind": "lead", "id": "<uuid>"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EntityRef {
    Lead(Uuid),
    Contact(Uuid),
    Deal(Uuid),
    Client(Uuid),
}

impl EntityRef {
    pub fn kind(&self) -> &'static str {
        match self {
            EntityRef::Lead(_) => "lead",
            EntityRef::Contact(_) => "contact",
            EntityRef::Deal(_) => "deal",
            EntityRef::Client(_) => "client",
        }
    }

    pub fn id(&self) -> Uuid {
        match *self {
            EntityRef::Lead(id)
            | EntityRef::Contact(id)
            | EntityRef::Deal(id)
            | EntityRef::Client(id) => id,
        }
    }

    /// Rebuilds a reference from its stored columns.
    pub fn from_parts(kind: &str, id: Uuid) -> Option<Self> {
        match kind {
            "lead" => Some(EntityRef::Lead(id)),
            "contact" => Some(EntityRef::Contact(id)),
            "deal" => Some(EntityRef::Deal(id)),
            "client" => Some(EntityRef::Client(id)),
            _ => None,
        }
    }
}

/// Note row as stored.
#[derive(Debug, Clone, FromRow)]
pub struct NoteRow {
    pub id: Uuid,
    pub content: String,
    pub entity_kind: String,
    pub entity_id: Uuid,
    pub sentiment: String,
    pub polarity: f64,
    pub subjectivity: f64,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A note with its sentiment analysis.
#[derive(Debug, Clone, Serialize)]
pub struct Note {
    pub id: Uuid,
    pub content: String,
    pub related_to: EntityRef,
    pub sentiment: String,
    pub polarity: f64,
    pub subjectivity: f64,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<NoteRow> for Note {
    type Error = String;

    fn try_from(row: NoteRow) -> Result<Self, Self::Error> {
        let related_to = EntityRef::from_parts(&row.entity_kind, row.entity_id).ok_or_else(
            || {
                format!(
                    "note {} references unknown entity kind '{}'",
                    row.id, row.entity_kind
                )
            },
        )?;

        Ok(Note {
            id: row.id,
            content: row.content,
            related_to,
            sentiment: row.sentiment,
            polarity: row.polarity,
            subjectivity: row.subjectivity,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// ============ API Request/Response Models ============

/// Payload for creating a lead.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateLeadRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub website: Option<String>,
    pub description: Option<String>,
    pub status: Option<LeadStatus>,
    pub source: Option<LeadSource>,
    pub assigned_to: Option<Uuid>,
}

/// Change to a nullable column: `None` leaves it alone, `Some(None)` clears it.
pub type Patch<T> = Option<Option<T>>;

/// Reads a present field into `Some`, so an explicit `null` becomes
/// `Some(None)`. Paired with `#[serde(default)]` for the absent case.
fn present<'de, T, D>(deserializer: D) -> Result<Patch<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Payload for updating a lead. Absent fields are left unchanged; `null`
/// clears the optional ones.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateLeadRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub phone: Patch<String>,
    #[serde(default, deserialize_with = "present")]
    pub company: Patch<String>,
    #[serde(default, deserialize_with = "present")]
    pub website: Patch<String>,
    #[serde(default, deserialize_with = "present")]
    pub description: Patch<String>,
    pub status: Option<LeadStatus>,
    pub source: Option<LeadSource>,
    #[serde(default, deserialize_with = "present")]
    pub assigned_to: Patch<Uuid>,
}

/// Narrows a contact or deal listing to one lead.
#[derive(Debug, Default, Deserialize)]
pub struct LeadScopedQuery {
    pub lead_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateContactRequest {
    pub lead_id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub position: Option<String>,
    #[serde(default)]
    pub is_primary: bool,
}

/// Payload for updating a contact. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateContactRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub phone: Patch<String>,
    #[serde(default, deserialize_with = "present")]
    pub position: Patch<String>,
    pub is_primary: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDealRequest {
    pub lead_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub value_cents: i64,
    pub stage: Option<DealStage>,
    pub probability: Option<i32>,
    pub expected_close_date: Option<NaiveDate>,
    pub description: Option<String>,
}

/// Payload for updating a deal. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateDealRequest {
    pub title: Option<String>,
    pub value_cents: Option<i64>,
    pub stage: Option<DealStage>,
    pub probability: Option<i32>,
    #[serde(default, deserialize_with = "present")]
    pub expected_close_date: Patch<NaiveDate>,
    #[serde(default, deserialize_with = "present")]
    pub description: Patch<String>,
}

/// Filters for listing leads.
#[derive(Debug, Default, Deserialize)]
pub struct LeadListQuery {
    pub status: Option<LeadStatus>,
    pub category: Option<Category>,
}

/// Dashboard counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, FromRow)]
pub struct LeadStatistics {
    pub total: i64,
    pub new: i64,
    pub contacted: i64,
    pub qualified: i64,
    pub lost: i64,
    pub converted: i64,
    pub hot: i64,
    pub warm: i64,
    pub cold: i64,
}

/// Body of the AI endpoints that target a single lead.
#[derive(Debug, Default, Deserialize)]
pub struct LeadIdRequest {
    pub lead_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct ScoreLeadResponse {
    pub lead_id: Uuid,
    pub lead_name: String,
    pub score: u8,
    pub breakdown: ScoreBreakdown,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct CategorizeLeadResponse {
    pub lead_id: Uuid,
    pub lead_name: String,
    pub category: Category,
    pub assessment: CategoryAssessment,
    pub details: &'static CategoryDetails,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct UpdateAllResponse {
    pub lead_id: Uuid,
    pub lead_name: String,
    pub score: u8,
    pub category: Category,
    pub category_details: &'static CategoryDetails,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct LeadAiUpdateResponse {
    pub message: String,
    pub lead: Lead,
}

#[derive(Debug, Default, Deserialize)]
pub struct GenerateEmailRequest {
    pub email_type: Option<String>,
    #[serde(default)]
    pub context: HashMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeSentimentRequest {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub detailed: bool,
}

#[derive(Debug, Serialize)]
pub struct SentimentResponse {
    pub sentiment: Sentiment,
    pub score: f64,
}

#[derive(Debug, Deserialize)]
pub struct CreateNoteRequest {
    pub content: String,
    pub related_to: EntityRef,
}

#[derive(Debug, Default, Deserialize)]
pub struct NoteListQuery {
    pub entity_kind: Option<String>,
    pub entity_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub full_name: String,
    pub role: Role,
}

/// A user as shown to API clients.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub permissions: Vec<Permission>,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        let role = user.role();
        UserProfile {
            id: user.id,
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            role,
            permissions: permissions_for(role),
            created_at: user.created_at,
        }
    }
}

/// Returned once when a user is created; the token is not retrievable later.
#[derive(Debug, Serialize)]
pub struct CreateUserResponse {
    pub user: UserProfile,
    pub api_token: String,
}
