//! The five typed civic record shapes the domain mapper produces.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A ballot proposition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposition {
    pub external_id: String,
    pub title: String,
    /// Defaults to the title when the source has no summary
    pub summary: String,
    pub election_date: Option<NaiveDate>,
    pub status: Option<String>,
    pub full_text_url: Option<String>,
}

/// A legislative meeting or hearing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meeting {
    pub external_id: String,
    pub title: String,
    /// Legislative body; defaults to the source category when absent
    pub body: String,
    pub scheduled_at: DateTime<Utc>,
    pub location: Option<String>,
    pub agenda_url: Option<String>,
}

/// An elected representative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Representative {
    pub external_id: String,
    pub name: String,
    pub district: String,
    pub party: String,
    /// Defaults to the source category when absent
    pub chamber: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
}

/// A campaign committee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Committee {
    pub external_id: String,
    pub name: String,
    /// Upstream system identifier, passed through from the source config
    pub source_system: Option<String>,
}

/// A contribution to a committee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub committee_id: String,
    /// "Last, First" when the source provides split name fields
    pub donor_name: String,
    pub amount: f64,
    pub date: NaiveDate,
    /// Normalized (e.g. "individual", "committee"), never the raw abbreviation
    pub donor_type: Option<String>,
    pub employer: Option<String>,
    pub occupation: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
}

/// A committee expenditure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expenditure {
    pub committee_id: String,
    pub payee_name: String,
    pub amount: f64,
    pub date: NaiveDate,
    pub purpose: Option<String>,
    /// Normalized to "support" or "oppose"
    pub support_or_oppose: Option<String>,
}

/// An independent expenditure for or against a candidate or proposition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndependentExpenditure {
    pub committee_id: String,
    pub committee_name: String,
    pub amount: f64,
    pub date: NaiveDate,
    pub candidate_name: Option<String>,
    pub proposition_title: Option<String>,
    /// Normalized to "support" or "oppose"
    pub support_or_oppose: Option<String>,
}

/// Sum type returned by the orchestrator, routed by the source's data type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CivicRecord {
    Proposition(Proposition),
    Meeting(Meeting),
    Representative(Representative),
    Committee(Committee),
    Contribution(Contribution),
    Expenditure(Expenditure),
    IndependentExpenditure(IndependentExpenditure),
}
