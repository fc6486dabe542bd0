use std::env;
use uuid::Uuid;

use crm_insights_api::access::Role;
use crm_insights_api::auth::{generate_token, hash_token};
use crm_insights_api::categorization::Category;
use crm_insights_api::db::Database;
use crm_insights_api::db_storage::CrmStorage;
use crm_insights_api::errors::AppError;
use crm_insights_api::models::{
    CreateContactRequest, CreateDealRequest, CreateLeadRequest, DealStage, EntityRef,
    LeadScopedQuery, NoteListQuery, UpdateDealRequest, UpdateLeadRequest,
};
use crm_insights_api::scoring::{LeadSource, LeadStatus};
use crm_insights_api::sentiment::analyze_sentiment_detailed;
use crm_insights_api::services::InsightsService;

/// Integration smoke test for lead storage and the insights refresh.
/// Marked ignored so it only runs against a disposable database; set TEST_DATABASE_URL to run.
#[tokio::test]
#[ignore]
async fn lead_lifecycle_smoke_test() -> anyhow::Result<()> {
    let db_url = env::var("TEST_DATABASE_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .map_err(|_| anyhow::anyhow!("Set TEST_DATABASE_URL or DATABASE_URL to run this test"))?;

    let db = Database::new(&db_url).await?;
    let storage = CrmStorage::new(db.pool.clone());

    // Unique email to avoid conflicts on repeated runs.
    let email = format!("smoke-{}@crm.test", Uuid::new_v4().simple());
    let request = CreateLeadRequest {
        name: "Smoke Test Lead".to_string(),
        email: email.clone(),
        phone: Some("+1 555 0100".to_string()),
        company: Some("Smoke Co".to_string()),
        website: None,
        description: None,
        status: Some(LeadStatus::Qualified),
        source: Some(LeadSource::Referral),
        assigned_to: None,
    };

    let lead = storage
        .insert_lead(&request)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(lead.email, email);
    assert_eq!(lead.score, 0);

    // referral 25 + qualified 25 + company 10 + phone 8 = 68
    let insights = InsightsService::new(db.pool.clone())
        .refresh(lead.id)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(insights.score, 68);
    assert_eq!(insights.lead.score, 68);
    // 68*0.5 + 100*0.3 = 64
    assert_eq!(insights.assessment.category, Category::Warm);
    assert_eq!(insights.lead.category, "warm");

    // null clears phone; absent company is kept
    let updated = storage
        .update_lead(
            lead.id,
            &UpdateLeadRequest {
                status: Some(LeadStatus::Contacted),
                phone: Some(None),
                ..Default::default()
            },
        )
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .ok_or_else(|| anyhow::anyhow!("lead vanished"))?;
    assert_eq!(updated.status, "contacted");
    assert_eq!(updated.name, "Smoke Test Lead");
    assert_eq!(updated.phone, None);
    assert_eq!(updated.company.as_deref(), Some("Smoke Co"));

    let unknown_owner = storage
        .update_lead(
            lead.id,
            &UpdateLeadRequest {
                assigned_to: Some(Some(Uuid::new_v4())),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(unknown_owner, Err(AppError::BadRequest(_))));

    // Notes and deals need an author.
    let author = storage
        .create_user(
            &format!("author-{}@crm.test", Uuid::new_v4().simple()),
            "Note Author",
            Role::Bde,
            &hash_token(&generate_token()),
        )
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let contact = storage
        .insert_contact(&CreateContactRequest {
            lead_id: lead.id,
            name: "Priya Shah".to_string(),
            email: "Priya@Smoke.test".to_string(),
            phone: None,
            position: Some("CTO".to_string()),
            is_primary: true,
        })
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(contact.email, "priya@smoke.test");

    let deal = storage
        .insert_deal(
            &CreateDealRequest {
                lead_id: lead.id,
                title: "Pilot".to_string(),
                value_cents: 1_250_000,
                stage: None,
                probability: None,
                expected_close_date: None,
                description: None,
            },
            author.id,
        )
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(deal.stage, "prospecting");
    assert_eq!(deal.probability, 50);
    assert_eq!(deal.created_by, Some(author.id));

    let scoped = LeadScopedQuery {
        lead_id: Some(lead.id),
    };
    let contacts = storage
        .list_contacts(&scoped)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(contacts.len(), 1);
    let counts = storage
        .lead_counts(lead.id)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!((counts.contact_count, counts.deal_count), (1, 1));

    // referral 25 + contacted 15 + company 10 + contact 5 + deal 5 = 60
    // 60*0.5 + 70*0.3 + 50*0.2 = 61
    let insights = InsightsService::new(db.pool.clone())
        .refresh(lead.id)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(insights.score, 60);
    assert_eq!(insights.assessment.weighted_score, 61.0);
    assert_eq!(insights.assessment.category, Category::Warm);

    let won = storage
        .update_deal(
            deal.id,
            &UpdateDealRequest {
                stage: Some(DealStage::ClosedWon),
                probability: Some(100),
                ..Default::default()
            },
        )
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .ok_or_else(|| anyhow::anyhow!("deal vanished"))?;
    assert_eq!(won.stage, "closed_won");
    assert_eq!(won.title, "Pilot");

    // a deal on a lead that does not exist is a client error
    let orphan = storage
        .insert_deal(
            &CreateDealRequest {
                lead_id: Uuid::new_v4(),
                title: "Orphan".to_string(),
                value_cents: 0,
                stage: None,
                probability: None,
                expected_close_date: None,
                description: None,
            },
            author.id,
        )
        .await;
    assert!(matches!(orphan, Err(AppError::BadRequest(_))));

    assert_eq!(
        storage
            .delete_contact(contact.id)
            .await
            .map_err(|e| anyhow::anyhow!(e.to_string()))?,
        Some(lead.id)
    );

    let target = EntityRef::Lead(lead.id);
    assert!(storage
        .entity_exists(target)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?);

    let content = "Great call, they are very interested";
    let note = storage
        .insert_note(content, target, &analyze_sentiment_detailed(content), author.id)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(note.sentiment, "positive");

    let notes = storage
        .list_notes(&NoteListQuery {
            entity_kind: Some("lead".to_string()),
            entity_id: Some(lead.id),
        })
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(notes.len(), 1);

    assert!(storage
        .delete_lead(lead.id)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?);
    assert!(storage
        .get_lead(lead.id)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .is_none());

    Ok(())
}
