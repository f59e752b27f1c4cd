//! Data source configuration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of civic record a source yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Propositions,
    Meetings,
    Representatives,
    CampaignFinance,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Propositions => "propositions",
            Self::Meetings => "meetings",
            Self::Representatives => "representatives",
            Self::CampaignFinance => "campaign_finance",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "propositions" => Ok(Self::Propositions),
            "meetings" => Ok(Self::Meetings),
            "representatives" => Ok(Self::Representatives),
            "campaign_finance" => Ok(Self::CampaignFinance),
            other => Err(format!("unknown data type '{other}'")),
        }
    }
}

/// One page or feed to mine.
///
/// Immutable input to a pipeline run; one config may map to many manifest
/// versions over time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSourceConfig {
    /// Page URL to fetch and extract from
    pub url: String,

    /// What kind of records this source yields
    pub data_type: DataType,

    /// Natural-language description of what to extract
    pub content_goal: String,

    /// Optional hints for the analysis prompt
    #[serde(default)]
    pub hints: Vec<String>,

    /// Sub-category (legislative body, chamber, or campaign-finance sub-type)
    #[serde(default)]
    pub category: Option<String>,

    /// Upstream system identifier (e.g. "cal-access", "legistar")
    #[serde(default)]
    pub source_type: Option<String>,
}

impl DataSourceConfig {
    pub fn new(
        url: impl Into<String>,
        data_type: DataType,
        content_goal: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            data_type,
            content_goal: content_goal.into(),
            hints: Vec::new(),
            category: None,
            source_type: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hints.push(hint.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_source_type(mut self, source_type: impl Into<String>) -> Self {
        self.source_type = Some(source_type.into());
        self
    }
}
