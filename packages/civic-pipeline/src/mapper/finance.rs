//! Campaign-finance mapping: four sub-shapes routed by source category.

use crate::transforms::parse_date;
use crate::types::{
    CivicRecord, Committee, Contribution, DataSourceConfig, Expenditure,
    ExtractionResult, IndependentExpenditure, RawExtractionResult, RawItem,
};

use super::{assemble, field, required};

/// Campaign-finance sub-type, resolved from the source category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinanceCategory {
    Committee,
    Contribution,
    Expenditure,
    IndependentExpenditure,
}

impl FinanceCategory {
    /// Case-insensitive category match, including source-system-specific
    /// aliases (CAL-ACCESS schedule names). Unrecognized or absent
    /// categories default to contribution, the most common filing shape.
    pub fn resolve(category: Option<&str>) -> Self {
        let Some(category) = category else {
            return Self::Contribution;
        };
        match category.to_ascii_lowercase().as_str() {
            "committee" | "committees" | "cal-access-committee" => Self::Committee,
            "expenditure" | "expenditures" | "cal-access-s465" => Self::Expenditure,
            "independent-expenditure"
            | "independent_expenditure"
            | "independent-expenditures"
            | "cal-access-s496" => Self::IndependentExpenditure,
            _ => Self::Contribution,
        }
    }
}

pub(crate) fn map_finance(
    raw: &RawExtractionResult,
    source: &DataSourceConfig,
    manifest_version: u32,
) -> ExtractionResult<CivicRecord> {
    match FinanceCategory::resolve(source.category.as_deref()) {
        FinanceCategory::Committee => assemble(
            raw,
            manifest_version,
            |item| map_committee(item, source),
            CivicRecord::Committee,
        ),
        FinanceCategory::Contribution => {
            assemble(raw, manifest_version, map_contribution, CivicRecord::Contribution)
        }
        FinanceCategory::Expenditure => {
            assemble(raw, manifest_version, map_expenditure, CivicRecord::Expenditure)
        }
        FinanceCategory::IndependentExpenditure => assemble(
            raw,
            manifest_version,
            map_independent_expenditure,
            CivicRecord::IndependentExpenditure,
        ),
    }
}

fn map_committee(item: &RawItem, source: &DataSourceConfig) -> Result<Committee, String> {
    Ok(Committee {
        external_id: required(item, "externalId")?.to_string(),
        name: required(item, "name")?.to_string(),
        source_system: field(item, "sourceSystem")
            .map(str::to_string)
            .or_else(|| source.source_type.clone()),
    })
}

fn map_contribution(item: &RawItem) -> Result<Contribution, String> {
    Ok(Contribution {
        committee_id: required(item, "committeeId")?.to_string(),
        donor_name: donor_name(item)?,
        amount: parse_amount(required(item, "amount")?)?,
        date: parse_required_date(item)?,
        donor_type: field(item, "donorType").map(normalize_donor_type),
        employer: field(item, "employer").map(str::to_string),
        occupation: field(item, "occupation").map(str::to_string),
        city: field(item, "city").map(str::to_string),
        state: field(item, "state").map(str::to_string),
    })
}

fn map_expenditure(item: &RawItem) -> Result<Expenditure, String> {
    Ok(Expenditure {
        committee_id: required(item, "committeeId")?.to_string(),
        payee_name: required(item, "payeeName")?.to_string(),
        amount: parse_amount(required(item, "amount")?)?,
        date: parse_required_date(item)?,
        purpose: field(item, "purpose").map(str::to_string),
        support_or_oppose: field(item, "supportOrOppose").map(normalize_support_oppose),
    })
}

fn map_independent_expenditure(item: &RawItem) -> Result<IndependentExpenditure, String> {
    Ok(IndependentExpenditure {
        committee_id: required(item, "committeeId")?.to_string(),
        committee_name: required(item, "committeeName")?.to_string(),
        amount: parse_amount(required(item, "amount")?)?,
        date: parse_required_date(item)?,
        candidate_name: field(item, "candidateName").map(str::to_string),
        proposition_title: field(item, "propositionTitle").map(str::to_string),
        support_or_oppose: field(item, "supportOrOppose").map(normalize_support_oppose),
    })
}

/// Donor name, building `"Last, First"` from split fields when present.
fn donor_name(item: &RawItem) -> Result<String, String> {
    if let Some(name) = field(item, "donorName") {
        return Ok(name.to_string());
    }
    match (field(item, "donorFirstName"), field(item, "donorLastName")) {
        (Some(first), Some(last)) => Ok(format!("{last}, {first}")),
        _ => Err("missing donorName (or donorFirstName + donorLastName)".to_string()),
    }
}

fn parse_required_date(item: &RawItem) -> Result<chrono::NaiveDate, String> {
    let value = required(item, "date")?;
    parse_date(value).ok_or_else(|| format!("unparseable date '{value}'"))
}

/// Coerce a monetary string ("$1,234.56") to a number.
fn parse_amount(value: &str) -> Result<f64, String> {
    let cleaned: String = value
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();
    cleaned
        .parse::<f64>()
        .map_err(|_| format!("unparseable amount '{value}'"))
}

/// Normalize CAL-ACCESS-style donor-type abbreviations.
fn normalize_donor_type(raw: &str) -> String {
    match raw.trim().to_ascii_uppercase().as_str() {
        "IND" => "individual".to_string(),
        "COM" => "committee".to_string(),
        "OTH" => "other".to_string(),
        "PTY" => "party".to_string(),
        "SCC" => "small_contributor_committee".to_string(),
        _ => raw.trim().to_ascii_lowercase(),
    }
}

/// Normalize support/oppose codes.
fn normalize_support_oppose(raw: &str) -> String {
    match raw.trim().to_ascii_uppercase().as_str() {
        "S" | "SUPPORT" => "support".to_string(),
        "O" | "OPPOSE" => "oppose".to_string(),
        _ => raw.trim().to_ascii_lowercase(),
    }
}
