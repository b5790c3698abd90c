//! Categorical vs temporal classification
//!
//! Constraints are routed to the code channel or the date channel by the
//! declared type of their path or value. [`convert_code_filters`] moves
//! entries that turned out to be temporal once their type tags are known.

use crate::error::{DataRequirementsError, DataRequirementsResult};
use crate::requirement::{CodeFilter, DataRequirement, DateFilter};
use crate::temporal::{PartialDateTime, Period, TemporalValue};

const TEMPORAL_KEYWORDS: [&str; 4] = ["date", "time", "period", "duration"];

/// Whether a declared type name denotes a temporal value
pub fn is_temporal_type(type_name: &str) -> bool {
    let lower = type_name.to_ascii_lowercase();
    TEMPORAL_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Whether a temporal type has a date filter value: dates, date/times and
/// their intervals. Times and durations are temporal but carry none.
pub fn has_date_value(type_name: &str) -> bool {
    let lower = type_name.to_ascii_lowercase();
    lower.contains("date") || lower == "period"
}

/// Parse literal text as the temporal type it was declared with
pub fn parse_temporal(type_name: &str, text: &str) -> DataRequirementsResult<TemporalValue> {
    let lower = type_name.to_ascii_lowercase();
    if lower.contains("interval") || lower.contains("period") {
        Period::parse(text).map(TemporalValue::Period)
    } else if lower.contains("date") {
        PartialDateTime::parse(text).map(TemporalValue::DateTime)
    } else {
        Err(DataRequirementsError::invalid_temporal(type_name, text))
    }
}

/// Move temporally typed code filters of `record` to its date filters.
///
/// Every literal code must carry a type tag, and a path-only filter must
/// carry one too. A record with no temporal entries comes back unchanged.
pub fn convert_code_filters(record: &DataRequirement) -> DataRequirementsResult<DataRequirement> {
    let mut converted = record.clone();
    converted.code_filters = Vec::with_capacity(record.code_filters.len());

    for filter in &record.code_filters {
        match classify_filter(filter)? {
            Channel::Categorical => converted.code_filters.push(filter.clone()),
            Channel::Temporal(date) => converted.date_filters.push(date),
        }
    }
    Ok(converted)
}

enum Channel {
    Categorical,
    Temporal(DateFilter),
}

fn describe(filter: &CodeFilter) -> String {
    match &filter.path {
        Some(path) => format!("path '{path}'"),
        None => "path-less code filter".to_string(),
    }
}

fn classify_filter(filter: &CodeFilter) -> DataRequirementsResult<Channel> {
    let path_temporal = filter.type_name.as_deref().map(is_temporal_type);

    let Some(first) = filter.codes.first() else {
        if filter.value_set.is_some() {
            return Ok(Channel::Categorical);
        }
        let temporal =
            path_temporal.ok_or_else(|| DataRequirementsError::missing_type_tag(describe(filter)))?;
        return Ok(if temporal {
            Channel::Temporal(DateFilter {
                path: filter.path.clone(),
                value: None,
                type_name: filter.type_name.clone(),
            })
        } else {
            Channel::Categorical
        });
    };

    let mut value_type: Option<&str> = None;
    for coding in &filter.codes {
        let tag = coding.type_name.as_deref().ok_or_else(|| {
            DataRequirementsError::missing_type_tag(format!("code '{}'", coding.code))
        })?;
        match value_type {
            Some(seen) if is_temporal_type(seen) != is_temporal_type(tag) => {
                return Err(tag_mismatch(filter, seen, tag));
            }
            Some(_) => {}
            None => value_type = Some(tag),
        }
    }
    let value_type = value_type.unwrap_or_default();
    let value_temporal = is_temporal_type(value_type);

    match filter.type_name.as_deref() {
        Some(path_type) if path_temporal != Some(value_temporal) => {
            return Err(tag_mismatch(filter, path_type, value_type));
        }
        _ => {}
    }
    if !value_temporal {
        return Ok(Channel::Categorical);
    }
    if filter.codes.len() > 1 {
        return Err(DataRequirementsError::unsupported_shape(
            "convert",
            format!("{} carries several temporal values", describe(filter)),
        ));
    }
    Ok(Channel::Temporal(DateFilter {
        path: filter.path.clone(),
        value: Some(parse_temporal(value_type, &first.code)?),
        type_name: filter
            .type_name
            .clone()
            .or_else(|| Some(value_type.to_string())),
    }))
}

fn tag_mismatch(filter: &CodeFilter, path_type: &str, value_type: &str) -> DataRequirementsError {
    DataRequirementsError::TypeTagMismatch {
        path: filter.path.clone().unwrap_or_default(),
        path_type: path_type.to_string(),
        value_type: value_type.to_string(),
    }
}
