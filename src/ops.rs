//! Bulk maintenance operations: full/incremental reindex, index teardown,
//! and the time-token parser used to bound incremental windows.

use crate::error::{Result, SyncError};
use crate::index::registry::SyncRegistry;
use crate::record::RecordSource;
use crate::types::OpType;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

/// Outcome of one [`update_index`] run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReindexReport {
    /// Records written, per document type, in processing order.
    pub indexed: Vec<(String, usize)>,
}

impl ReindexReport {
    pub fn total(&self) -> usize {
        self.indexed.iter().map(|(_, n)| n).sum()
    }
}

static DURATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?ix) ^ \s* (?: (?P<days>\d+) \s* d)? \s* (?: (?P<hours>\d+) \s* h)? \s* (?: (?P<minutes>\d+) \s* m)? \s* (?: (?P<seconds>\d+) \s* s)? \s* $")
        .unwrap()
});

/// Parse a point in time from operator input.
///
/// Accepts an RFC 3339 timestamp, `YYYY-MM-DD HH:MM`, a bare `YYYY-MM-DD`
/// date, or a relative duration like `1d3h` / `90m` / `45s` subtracted from
/// `now`. Case-insensitive. Anything else, including an empty string, is an
/// [`SyncError::InvalidTimeToken`].
pub fn parse_time_token(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let trimmed = input.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M") {
        return Ok(Utc.from_utc_datetime(&naive));
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap_or_default()));
    }
    if let Some(caps) = DURATION_RE.captures(trimmed) {
        let component = |name: &str| -> i64 {
            caps.name(name)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(0)
        };
        let seconds = component("days") * 86_400
            + component("hours") * 3_600
            + component("minutes") * 60
            + component("seconds");
        if seconds > 0 {
            return Ok(now - chrono::Duration::seconds(seconds));
        }
    }
    Err(SyncError::InvalidTimeToken(input.to_string()))
}

/// Push mappings and reindex records for every matching definition.
///
/// For each connection touched, the union of its definitions' analysis
/// settings is applied when the index is first created. Per definition this
/// then upserts the mapping, selects the records (bounded to
/// `start`/`end` on the definition's date field when given), and writes them
/// in one batched call. Refresh happens once per connection at the end, not
/// per batch.
pub fn update_index(
    registry: &SyncRegistry,
    source: &dyn RecordSource,
    record_types: Option<&[&str]>,
    using: Option<&str>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<ReindexReport> {
    let mut report = ReindexReport::default();
    let mut touched_connections: Vec<String> = Vec::new();

    for definition in selected_definitions(registry, record_types, using) {
        let connection_name = definition.using().to_string();
        definition.put_mapping()?;

        let count = source.count(
            definition.record_type(),
            definition.date_field(),
            start,
            end,
        )?;
        tracing::info!(
            doc_type = %definition.document_type(),
            records = count,
            "reindexing"
        );
        let records = definition.select_records(source, start, end)?;
        let refs: Vec<&dyn crate::record::Record> =
            records.iter().map(|r| r.as_ref()).collect();
        definition.update(&refs, OpType::Index, false)?;
        report
            .indexed
            .push((definition.document_type().to_string(), records.len()));

        if !touched_connections.contains(&connection_name) {
            touched_connections.push(connection_name);
        }
    }

    for name in touched_connections {
        let connection = registry.connection(&name)?;
        connection.client.refresh(&connection.index_name)?;
    }
    Ok(report)
}

/// Drop the mappings (and their documents) for every matching definition.
pub fn clear_index(
    registry: &SyncRegistry,
    record_types: Option<&[&str]>,
    using: Option<&str>,
) -> Result<()> {
    for definition in selected_definitions(registry, record_types, using) {
        definition.delete_mapping()?;
    }
    Ok(())
}

/// Clear then fully repopulate the matching definitions.
pub fn rebuild_index(
    registry: &SyncRegistry,
    source: &dyn RecordSource,
    record_types: Option<&[&str]>,
    using: Option<&str>,
) -> Result<ReindexReport> {
    clear_index(registry, record_types, using)?;
    update_index(registry, source, record_types, using, None, None)
}

fn selected_definitions(
    registry: &SyncRegistry,
    record_types: Option<&[&str]>,
    using: Option<&str>,
) -> Vec<std::sync::Arc<crate::index::IndexDefinition>> {
    registry
        .all_definitions()
        .into_iter()
        .filter(|d| match record_types {
            Some(types) => types.contains(&d.record_type()),
            None => true,
        })
        .filter(|d| match using {
            Some(name) => d.using() == name,
            None => true,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn base_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2016, 3, 1, 12, 0, 0).unwrap()
    }

    // ── time tokens ─────────────────────────────────────────────────────

    #[test]
    fn rfc3339_token_parses() {
        let parsed = parse_time_token("2016-02-29T10:30:00Z", base_now()).unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2016, 2, 29, 10, 30, 0).unwrap());
    }

    #[test]
    fn date_and_minute_token_parses() {
        let parsed = parse_time_token("2016-02-29 10:30", base_now()).unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2016, 2, 29, 10, 30, 0).unwrap());
    }

    #[test]
    fn bare_date_token_is_midnight() {
        let parsed = parse_time_token("2016-02-29", base_now()).unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2016, 2, 29, 0, 0, 0).unwrap());
    }

    #[test]
    fn duration_token_subtracts_from_now() {
        let parsed = parse_time_token("1d3h", base_now()).unwrap();
        assert_eq!(parsed, base_now() - chrono::Duration::seconds(97_200));
    }

    #[test]
    fn duration_token_is_case_insensitive() {
        assert_eq!(
            parse_time_token("90M", base_now()).unwrap(),
            parse_time_token("90m", base_now()).unwrap(),
        );
    }

    #[test]
    fn single_component_durations_parse() {
        assert_eq!(
            parse_time_token("45s", base_now()).unwrap(),
            base_now() - chrono::Duration::seconds(45)
        );
        assert_eq!(
            parse_time_token("2d", base_now()).unwrap(),
            base_now() - chrono::Duration::days(2)
        );
    }

    #[test]
    fn empty_and_garbage_tokens_are_rejected() {
        for bad in ["", "   ", "yesterday", "3x", "d", "12", "1h2d"] {
            assert!(
                matches!(
                    parse_time_token(bad, base_now()),
                    Err(SyncError::InvalidTimeToken(_))
                ),
                "token {bad:?} should have been rejected"
            );
        }
    }

    #[test]
    fn report_totals_across_doc_types() {
        let report = ReindexReport {
            indexed: vec![("car".into(), 3), ("driver".into(), 2)],
        };
        assert_eq!(report.total(), 5);
    }
}
