//! Hot/warm/cold lead categorization and the advice attached to each category.
//!
//! The final weighted value is
//! `base_score * 0.5 + urgency * 0.3 + engagement * 0.2`, kept in integer
//! tenths so the 70/40 thresholds compare exactly.
use crate::scoring::{capped_product, LeadSnapshot, LeadStatus};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const HOT_THRESHOLD_TENTHS: u32 = 700;
const WARM_THRESHOLD_TENTHS: u32 = 400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Hot,
    Warm,
    Cold,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Hot, Category::Warm, Category::Cold];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Hot => "hot",
            Category::Warm => "warm",
            Category::Cold => "cold",
        }
    }

    /// Parses a stored or user-supplied category, falling back to `Cold`.
    pub fn parse_or_cold(raw: &str) -> Self {
        raw.parse().unwrap_or(Category::Cold)
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hot" => Ok(Category::Hot),
            "warm" => Ok(Category::Warm),
            "cold" => Ok(Category::Cold),
            other => Err(format!("unknown category '{}'", other)),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status-driven urgency, 0-100.
pub fn urgency_score(status: LeadStatus) -> u8 {
    match status {
        LeadStatus::Qualified => 100,
        LeadStatus::Contacted => 70,
        LeadStatus::New => 40,
        LeadStatus::Lost | LeadStatus::Converted => 0,
        LeadStatus::Unknown => 30,
    }
}

/// Interaction-driven engagement, 0-100.
pub fn engagement_score(contact_count: u32, deal_count: u32) -> u8 {
    let contacts = capped_product(contact_count, 20, 40);
    let deals = capped_product(deal_count, 30, 60);
    (contacts + deals).min(100)
}

/// Inputs and result of one categorization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CategoryAssessment {
    pub base_score: u8,
    pub urgency: u8,
    pub engagement: u8,
    pub weighted_score: f64,
    pub category: Category,
}

/// Categorizes a lead and reports the signals behind the decision.
pub fn assess_lead(snapshot: &LeadSnapshot, base_score: u8) -> CategoryAssessment {
    let base_score = base_score.min(crate::scoring::MAX_SCORE);
    let urgency = urgency_score(snapshot.status);
    let engagement = engagement_score(snapshot.contact_count, snapshot.deal_count);

    let weighted_tenths = base_score as u32 * 5 + urgency as u32 * 3 + engagement as u32 * 2;

    let category = if weighted_tenths >= HOT_THRESHOLD_TENTHS {
        Category::Hot
    } else if weighted_tenths >= WARM_THRESHOLD_TENTHS {
        Category::Warm
    } else {
        Category::Cold
    };

    CategoryAssessment {
        base_score,
        urgency,
        engagement,
        weighted_score: weighted_tenths as f64 / 10.0,
        category,
    }
}

/// Categorizes a lead given its base score.
pub fn categorize_lead(snapshot: &LeadSnapshot, base_score: u8) -> Category {
    assess_lead(snapshot, base_score).category
}

/// Assesses a lead using the score already stored on it.
///
/// A missing stored score counts as 0, so a lead with strong status and
/// engagement can still land in `Warm`.
pub fn assess_with_stored_score(snapshot: &LeadSnapshot) -> CategoryAssessment {
    assess_lead(snapshot, snapshot.existing_score.unwrap_or(0))
}

/// Recommended handling for a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryDetails {
    pub priority: &'static str,
    pub color: &'static str,
    pub icon: &'static str,
    pub description: &'static str,
    pub recommended_actions: &'static [&'static str],
}

static HOT_DETAILS: CategoryDetails = CategoryDetails {
    priority: "High",
    color: "#ff4444",
    icon: "🔥",
    description: "High potential lead - immediate action required",
    recommended_actions: &[
        "Schedule a call within 24 hours",
        "Send personalized proposal",
        "Assign to senior sales rep",
        "Set up product demo",
    ],
};

static WARM_DETAILS: CategoryDetails = CategoryDetails {
    priority: "Medium",
    color: "#ff9800",
    icon: "☀️",
    description: "Good potential - follow up within a week",
    recommended_actions: &[
        "Send follow-up email",
        "Share case studies",
        "Schedule discovery call",
        "Add to nurture campaign",
    ],
};

static COLD_DETAILS: CategoryDetails = CategoryDetails {
    priority: "Low",
    color: "#2196f3",
    icon: "❄️",
    description: "Low immediate potential - long-term nurture",
    recommended_actions: &[
        "Add to email nurture sequence",
        "Share educational content",
        "Follow up in 2-4 weeks",
        "Monitor for engagement signals",
    ],
};

pub fn category_details(category: Category) -> &'static CategoryDetails {
    match category {
        Category::Hot => &HOT_DETAILS,
        Category::Warm => &WARM_DETAILS,
        Category::Cold => &COLD_DETAILS,
    }
}

/// Looks up advice for a raw category name; unknown names get the cold entry.
pub fn advise(category: &str) -> &'static CategoryDetails {
    category_details(Category::parse_or_cold(category))
}
