//! Lead scoring.
//!
//! A lead's score (0-100) is the sum of five independently capped buckets:
//!
//! | Bucket              | Max |
//! |---------------------|-----|
//! | Source quality      | 25  |
//! | Status progression  | 30  |
//! | Data completeness   | 25  |
//! | Contact engagement  | 10  |
//! | Deal engagement     | 10  |
//!
//! Unknown source/status values contribute nothing.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Upper bound of every score produced by this module.
pub const MAX_SCORE: u8 = 100;

/// Where a lead came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadSource {
    Referral,
    Website,
    SocialMedia,
    EmailCampaign,
    ColdCall,
    Other,
    /// Any stored value this service does not recognise.
    #[serde(other)]
    Unknown,
}

impl LeadSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadSource::Referral => "referral",
            LeadSource::Website => "website",
            LeadSource::SocialMedia => "social_media",
            LeadSource::EmailCampaign => "email_campaign",
            LeadSource::ColdCall => "cold_call",
            LeadSource::Other => "other",
            LeadSource::Unknown => "unknown",
        }
    }

    /// Points awarded for the source bucket.
    pub fn points(&self) -> u8 {
        match self {
            LeadSource::Referral => 25,
            LeadSource::Website => 20,
            LeadSource::SocialMedia | LeadSource::EmailCampaign => 15,
            LeadSource::ColdCall => 10,
            LeadSource::Other => 5,
            LeadSource::Unknown => 0,
        }
    }
}

impl FromStr for LeadSource {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "referral" => LeadSource::Referral,
            "website" => LeadSource::Website,
            "social_media" => LeadSource::SocialMedia,
            "email_campaign" => LeadSource::EmailCampaign,
            "cold_call" => LeadSource::ColdCall,
            "other" => LeadSource::Other,
            _ => LeadSource::Unknown,
        })
    }
}

impl fmt::Display for LeadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position of a lead in the sales funnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    New,
    Contacted,
    Qualified,
    Lost,
    Converted,
    #[serde(other)]
    Unknown,
}

impl LeadStatus {
    pub const ALL: [LeadStatus; 5] = [
        LeadStatus::New,
        LeadStatus::Contacted,
        LeadStatus::Qualified,
        LeadStatus::Lost,
        LeadStatus::Converted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::Contacted => "contacted",
            LeadStatus::Qualified => "qualified",
            LeadStatus::Lost => "lost",
            LeadStatus::Converted => "converted",
            LeadStatus::Unknown => "unknown",
        }
    }

    /// Points awarded for the status bucket.
    pub fn points(&self) -> u8 {
        match self {
            LeadStatus::Converted => 30,
            LeadStatus::Qualified => 25,
            LeadStatus::Contacted => 15,
            LeadStatus::New => 5,
            LeadStatus::Lost | LeadStatus::Unknown => 0,
        }
    }
}

impl FromStr for LeadStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "new" => LeadStatus::New,
            "contacted" => LeadStatus::Contacted,
            "qualified" => LeadStatus::Qualified,
            "lost" => LeadStatus::Lost,
            "converted" => LeadStatus::Converted,
            _ => LeadStatus::Unknown,
        })
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The fields of a lead that scoring and categorization read.
///
/// Built fresh for every call and discarded afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadSnapshot {
    pub source: LeadSource,
    pub status: LeadStatus,
    pub company_present: bool,
    pub phone_present: bool,
    pub website_present: bool,
    pub contact_count: u32,
    pub deal_count: u32,
    /// Score currently stored on the lead, if any.
    pub existing_score: Option<u8>,
}

impl Default for LeadSnapshot {
    fn default() -> Self {
        Self {
            source: LeadSource::Unknown,
            status: LeadStatus::Unknown,
            company_present: false,
            phone_present: false,
            website_present: false,
            contact_count: 0,
            deal_count: 0,
            existing_score: None,
        }
    }
}

/// Per-bucket contributions of a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScoreBreakdown {
    pub source: u8,
    pub status: u8,
    pub completeness: u8,
    pub contacts: u8,
    pub deals: u8,
}

impl ScoreBreakdown {
    /// Sum of the buckets, clamped to `[0, MAX_SCORE]`.
    pub fn total(&self) -> u8 {
        let sum = self.source as u32
            + self.status as u32
            + self.completeness as u32
            + self.contacts as u32
            + self.deals as u32;
        sum.min(MAX_SCORE as u32) as u8
    }
}

/// Computes each bucket of the score for `snapshot`.
pub fn score_breakdown(snapshot: &LeadSnapshot) -> ScoreBreakdown {
    let mut completeness = 0u8;
    if snapshot.company_present {
        completeness += 10;
    }
    if snapshot.phone_present {
        completeness += 8;
    }
    if snapshot.website_present {
        completeness += 7;
    }

    ScoreBreakdown {
        source: snapshot.source.points(),
        status: snapshot.status.points(),
        completeness,
        contacts: capped_product(snapshot.contact_count, 5, 10),
        deals: capped_product(snapshot.deal_count, 5, 10),
    }
}

/// Scores a lead from 0 to 100.
pub fn score_lead(snapshot: &LeadSnapshot) -> u8 {
    score_breakdown(snapshot).total()
}

/// `min(count * per_item, cap)` without overflowing on large counts.
pub(crate) fn capped_product(count: u32, per_item: u32, cap: u32) -> u8 {
    count.saturating_mul(per_item).min(cap) as u8
}
