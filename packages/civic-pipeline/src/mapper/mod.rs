//! Domain mapping: validate and coerce raw records into typed civic shapes.
//!
//! Mapping is validate-then-convert with per-item tolerance: an item missing
//! a required field is skipped and recorded as a warning, never a run
//! failure. Warnings and errors carried in from the raw result are preserved
//! and appended to.

mod finance;

pub use finance::FinanceCategory;

use tracing::debug;

use crate::transforms::{parse_date, parse_datetime};
use crate::types::{
    CivicRecord, DataSourceConfig, DataType, ExtractionResult, Meeting, Proposition,
    RawExtractionResult, RawItem, Representative,
};

/// Map a raw result into typed records, routed by the source's data type.
pub fn map_records(
    raw: &RawExtractionResult,
    source: &DataSourceConfig,
    manifest_version: u32,
) -> ExtractionResult<CivicRecord> {
    let result = match source.data_type {
        DataType::Propositions => assemble(raw, manifest_version, map_proposition, CivicRecord::Proposition),
        DataType::Meetings => assemble(
            raw,
            manifest_version,
            |item| map_meeting(item, source),
            CivicRecord::Meeting,
        ),
        DataType::Representatives => assemble(
            raw,
            manifest_version,
            |item| map_representative(item, source),
            CivicRecord::Representative,
        ),
        DataType::CampaignFinance => finance::map_finance(raw, source, manifest_version),
    };

    debug!(
        data_type = %source.data_type,
        raw_items = raw.items.len(),
        mapped = result.items.len(),
        "domain mapping complete"
    );
    result
}

/// Typed helper for proposition sources.
pub fn map_propositions(
    raw: &RawExtractionResult,
    manifest_version: u32,
) -> ExtractionResult<Proposition> {
    assemble(raw, manifest_version, map_proposition, |p| p)
}

/// Typed helper for meeting sources.
pub fn map_meetings(
    raw: &RawExtractionResult,
    source: &DataSourceConfig,
    manifest_version: u32,
) -> ExtractionResult<Meeting> {
    assemble(raw, manifest_version, |item| map_meeting(item, source), |m| m)
}

/// Typed helper for representative sources.
pub fn map_representatives(
    raw: &RawExtractionResult,
    source: &DataSourceConfig,
    manifest_version: u32,
) -> ExtractionResult<Representative> {
    assemble(
        raw,
        manifest_version,
        |item| map_representative(item, source),
        |r| r,
    )
}

/// Run one mapper over every raw item, dropping failures as warnings.
pub(crate) fn assemble<T, R>(
    raw: &RawExtractionResult,
    manifest_version: u32,
    map_item: impl Fn(&RawItem) -> Result<T, String>,
    wrap: impl Fn(T) -> R,
) -> ExtractionResult<R> {
    let mut warnings = raw.warnings.clone();
    let errors = raw.errors.clone();
    let mut items = Vec::with_capacity(raw.items.len());

    for (index, item) in raw.items.iter().enumerate() {
        match map_item(item) {
            Ok(record) => items.push(wrap(record)),
            Err(reason) => warnings.push(format!("item {index} skipped: {reason}")),
        }
    }

    ExtractionResult {
        success: !items.is_empty(),
        items,
        manifest_version,
        warnings,
        errors,
        extraction_time_ms: 0,
    }
}

pub(crate) fn field<'a>(item: &'a RawItem, name: &str) -> Option<&'a str> {
    item.get(name)
        .map(String::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

pub(crate) fn required<'a>(item: &'a RawItem, name: &str) -> Result<&'a str, String> {
    field(item, name).ok_or_else(|| format!("missing required field '{name}'"))
}

fn map_proposition(item: &RawItem) -> Result<Proposition, String> {
    let external_id = required(item, "externalId")?.to_string();
    let title = required(item, "title")?.to_string();
    let summary = field(item, "summary")
        .map(str::to_string)
        .unwrap_or_else(|| title.clone());

    Ok(Proposition {
        external_id,
        summary,
        election_date: field(item, "electionDate").and_then(parse_date),
        status: field(item, "status").map(str::to_string),
        full_text_url: field(item, "fullTextUrl").map(str::to_string),
        title,
    })
}

fn map_meeting(item: &RawItem, source: &DataSourceConfig) -> Result<Meeting, String> {
    let scheduled_raw = required(item, "scheduledAt")?;
    let scheduled_at = parse_datetime(scheduled_raw)
        .ok_or_else(|| format!("unparseable scheduledAt '{scheduled_raw}'"))?;

    Ok(Meeting {
        external_id: required(item, "externalId")?.to_string(),
        title: required(item, "title")?.to_string(),
        body: field(item, "body")
            .map(str::to_string)
            .or_else(|| source.category.clone())
            .unwrap_or_default(),
        scheduled_at,
        location: field(item, "location").map(str::to_string),
        agenda_url: field(item, "agendaUrl").map(str::to_string),
    })
}

fn map_representative(item: &RawItem, source: &DataSourceConfig) -> Result<Representative, String> {
    Ok(Representative {
        external_id: required(item, "externalId")?.to_string(),
        name: required(item, "name")?.to_string(),
        district: required(item, "district")?.to_string(),
        party: required(item, "party")?.to_string(),
        chamber: field(item, "chamber")
            .map(str::to_string)
            .or_else(|| source.category.clone())
            .unwrap_or_default(),
        email: field(item, "email").map(str::to_string),
        phone: field(item, "phone").map(str::to_string),
        website: field(item, "website").map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(pairs: &[(&str, &str)]) -> RawItem {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn raw(items: Vec<RawItem>) -> RawExtractionResult {
        RawExtractionResult {
            success: !items.is_empty(),
            items_matched: items.len(),
            items,
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn source(data_type: DataType, category: Option<&str>) -> DataSourceConfig {
        let mut config = DataSourceConfig::new("https://example.gov", data_type, "records");
        config.category = category.map(str::to_string);
        config
    }

    #[test]
    fn tolerates_partial_failures() {
        let raw = raw(vec![
            item(&[("externalId", "PROP-1"), ("title", "Valid")]),
            item(&[("invalid", "true")]),
            item(&[("externalId", "PROP-2"), ("title", "Also Valid")]),
        ]);
        let result = map_propositions(&raw, 1);

        assert_eq!(result.items.len(), 2);
        assert!(result.success);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("item 1"));
    }

    #[test]
    fn proposition_summary_defaults_to_title() {
        let raw = raw(vec![item(&[
            ("externalId", "PROP-9"),
            ("title", "Water Bond"),
            ("electionDate", "11/05/2024"),
        ])]);
        let result = map_propositions(&raw, 1);
        assert_eq!(result.items[0].summary, "Water Bond");
        assert_eq!(
            result.items[0].election_date.unwrap().to_string(),
            "2024-11-05"
        );
    }

    #[test]
    fn meeting_body_defaults_to_source_category() {
        let raw = raw(vec![item(&[
            ("externalId", "M-1"),
            ("title", "Budget Hearing"),
            ("scheduledAt", "2025-03-10T14:00:00Z"),
        ])]);
        let source = source(DataType::Meetings, Some("Assembly"));
        let result = map_meetings(&raw, &source, 1);
        assert_eq!(result.items[0].body, "Assembly");
    }

    #[test]
    fn meeting_with_unparseable_time_is_skipped() {
        let raw = raw(vec![item(&[
            ("externalId", "M-2"),
            ("title", "Mystery"),
            ("scheduledAt", "whenever"),
        ])]);
        let result = map_meetings(&raw, &source(DataType::Meetings, None), 1);
        assert!(!result.success);
        assert!(result.warnings[0].contains("scheduledAt"));
    }

    #[test]
    fn representative_chamber_defaults_to_source_category() {
        let raw = raw(vec![item(&[
            ("externalId", "R-4"),
            ("name", "Jane Doe"),
            ("district", "4"),
            ("party", "Independent"),
        ])]);
        let source = source(DataType::Representatives, Some("Senate"));
        let result = map_representatives(&raw, &source, 1);
        assert_eq!(result.items[0].chamber, "Senate");
    }

    #[test]
    fn raw_warnings_are_preserved_and_appended() {
        let mut raw = raw(vec![item(&[("bad", "item")])]);
        raw.warnings.push("engine: something odd".to_string());
        let result = map_propositions(&raw, 1);
        assert!(!result.success);
        assert_eq!(result.warnings[0], "engine: something odd");
        assert_eq!(result.warnings.len(), 2);
    }

    #[test]
    fn routes_by_data_type() {
        let raw = raw(vec![item(&[
            ("externalId", "R-1"),
            ("name", "Jane Doe"),
            ("district", "4"),
            ("party", "Independent"),
        ])]);
        let result = map_records(&raw, &source(DataType::Representatives, None), 3);
        assert_eq!(result.manifest_version, 3);
        assert!(matches!(result.items[0], CivicRecord::Representative(_)));
    }
}
