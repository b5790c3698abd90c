//! Frame algebra and record merging
//!
//! All functions here are pure: they consume frames or records and return
//! new ones. Conjunction groups records by type and merges each group into
//! one record; disjunction keeps branches apart.

use indexmap::IndexMap;

use crate::error::{DataRequirementsError, DataRequirementsResult};
use crate::frame::Frame;
use crate::requirement::{CodeFilter, DataRequirement, DateFilter};

// ============================================================================
// Record merge
// ============================================================================

/// Merge two records describing the same resource type.
///
/// The left type wins when present. Filter lists are concatenated; when the
/// result is exactly one bare path plus one bare value, the value is bound
/// onto the path.
pub fn merge(
    mut left: DataRequirement,
    right: DataRequirement,
) -> DataRequirementsResult<DataRequirement> {
    match (&left.data_type, &right.data_type) {
        (Some(l), Some(r)) if l != r => return Err(DataRequirementsError::type_mismatch(l, r)),
        _ => {}
    }
    if left.data_type.is_none() {
        left.data_type = right.data_type;
    }
    for profile in right.profile {
        if !left.profile.contains(&profile) {
            left.profile.push(profile);
        }
    }
    left.code_filters.extend(right.code_filters);
    bind_code_pair(&mut left.code_filters);
    left.date_filters.extend(right.date_filters);
    bind_date_pair(&mut left.date_filters);
    if left.alias.is_none() {
        left.alias = right.alias;
    }
    Ok(left)
}

/// Index of (path entry, value entry) when the list is exactly such a pair
fn bound_pair<T>(
    filters: &[T],
    is_path: impl Fn(&T) -> bool,
    is_value: impl Fn(&T) -> bool,
) -> Option<(usize, usize)> {
    match filters {
        [a, b] if is_path(a) && is_value(b) => Some((0, 1)),
        [a, b] if is_value(a) && is_path(b) => Some((1, 0)),
        _ => None,
    }
}

fn bind_code_pair(filters: &mut Vec<CodeFilter>) {
    let Some((_, value)) =
        bound_pair(filters, CodeFilter::is_bare_path, CodeFilter::is_bare_literal)
    else {
        return;
    };
    let literal = filters.remove(value);
    let target = &mut filters[0];
    target.codes = literal.codes;
    target.value_set = literal.value_set;
    if target.type_name.is_none() {
        target.type_name = literal.type_name;
    }
}

fn bind_date_pair(filters: &mut Vec<DateFilter>) {
    let Some((_, value)) =
        bound_pair(filters, DateFilter::is_bare_path, DateFilter::is_bare_literal)
    else {
        return;
    };
    let literal = filters.remove(value);
    let target = &mut filters[0];
    target.value = literal.value;
    if target.type_name.is_none() {
        target.type_name = literal.type_name;
    }
}

/// Merge records sharing a type into one record per type, keeping the
/// order in which types first appear
pub fn group_union(
    records: impl IntoIterator<Item = DataRequirement>,
) -> DataRequirementsResult<Vec<DataRequirement>> {
    let mut groups: IndexMap<Option<String>, DataRequirement> = IndexMap::new();
    for record in records {
        match groups.get_mut(&record.data_type) {
            Some(existing) => {
                let current = std::mem::take(existing);
                *existing = merge(current, record)?;
            }
            None => {
                groups.insert(record.data_type.clone(), record);
            }
        }
    }
    Ok(groups.into_values().collect())
}

// ============================================================================
// Frame algebra
// ============================================================================

/// Conjunction: every record of both frames, group-unioned into one branch
pub fn merge_and(left: Frame, right: Frame) -> DataRequirementsResult<Frame> {
    let records = left
        .into_flattened()
        .into_iter()
        .chain(right.into_flattened());
    Frame::of(group_union(records)?)
}

/// Disjunction: branch lists concatenated
pub fn merge_or(left: Frame, right: Frame) -> Frame {
    let mut branches = left.into_branches();
    branches.extend(right.into_branches());
    Frame::from_branches(branches)
}

/// Merge two singular frames. A frame with several OR branches, or a branch
/// with several types, is rejected.
pub fn simple_merge(left: Frame, right: Frame) -> DataRequirementsResult<Frame> {
    let merged = match (
        left.into_single_record("merge")?,
        right.into_single_record("merge")?,
    ) {
        (None, None) => return Ok(Frame::empty()),
        (Some(record), None) | (None, Some(record)) => record,
        (Some(l), Some(r)) => merge(l, r)?,
    };
    Ok(Frame::single(merged))
}

/// Left fold of [`simple_merge`] over operand frames, optionally clearing
/// literal constants from each operand first
pub fn merge_frames(frames: Vec<Frame>, strip_constants: bool) -> DataRequirementsResult<Frame> {
    let mut operands = frames.into_iter().map(|frame| {
        if strip_constants {
            clear_constants(frame)
        } else {
            frame
        }
    });
    let first = operands.next().ok_or(DataRequirementsError::EmptyMerge)?;
    operands.try_fold(first, simple_merge)
}

/// Clear literal codes and date values. Filters left with neither a path
/// nor a value set are dropped, as are filters that became identical.
pub fn clear_constants(mut frame: Frame) -> Frame {
    for branch in frame.branches_mut() {
        for record in branch.records_mut() {
            clear_record_constants(record);
        }
    }
    frame
}

pub(crate) fn clear_record_constants(record: &mut DataRequirement) {
    for filter in &mut record.code_filters {
        filter.codes.clear();
    }
    record
        .code_filters
        .retain(|f| f.path.is_some() || f.value_set.is_some());
    for filter in &mut record.date_filters {
        filter.value = None;
    }
    record.date_filters.retain(|f| f.path.is_some());
    dedup(&mut record.code_filters);
    dedup(&mut record.date_filters);
}

/// Drop repeated entries, keeping the first occurrence
fn dedup<T: PartialEq>(items: &mut Vec<T>) {
    let mut kept: Vec<T> = Vec::with_capacity(items.len());
    for item in items.drain(..) {
        if !kept.contains(&item) {
            kept.push(item);
        }
    }
    *items = kept;
}

// ============================================================================
// Alias resolution
// ============================================================================

fn join_path(prefix: Option<&str>, path: Option<&str>) -> Option<String> {
    match (prefix, path) {
        (Some(p), Some(q)) => Some(format!("{p}.{q}")),
        (Some(p), None) => Some(p.to_string()),
        (None, q) => q.map(str::to_string),
    }
}

/// Attach where-clause records to the aliased sources they refer to.
///
/// A where record applies to a source when its type is the source's alias.
/// Its paths are prefixed with the source's own path-only filter (the
/// property the alias stands for), and the alias tag is removed. Untagged
/// sources pass through unchanged.
pub fn apply_where(
    sources: Vec<DataRequirement>,
    wheres: &[DataRequirement],
) -> DataRequirementsResult<Vec<DataRequirement>> {
    let mut resolved = Vec::with_capacity(sources.len());
    for mut source in sources {
        let Some(alias) = source.alias.take() else {
            resolved.push(source);
            continue;
        };
        if !source.code_filters.is_empty() && !source.date_filters.is_empty() {
            return Err(DataRequirementsError::alias_conflict(alias));
        }

        let matching: Vec<&DataRequirement> = wheres
            .iter()
            .filter(|w| w.data_type.as_deref() == Some(alias.as_str()))
            .collect();
        if matching.is_empty() {
            resolved.push(source);
            continue;
        }

        let prefix = source
            .code_filters
            .iter()
            .find(|f| f.is_bare_path())
            .and_then(|f| f.path.clone())
            .or_else(|| {
                source
                    .date_filters
                    .iter()
                    .find(|f| f.is_bare_path())
                    .and_then(|f| f.path.clone())
            });
        source.code_filters.retain(|f| !f.is_bare_path());
        source.date_filters.retain(|f| !f.is_bare_path());

        for record in matching {
            for filter in &record.code_filters {
                source.code_filters.push(CodeFilter {
                    path: join_path(prefix.as_deref(), filter.path.as_deref()),
                    ..filter.clone()
                });
            }
            for filter in &record.date_filters {
                source.date_filters.push(DateFilter {
                    path: join_path(prefix.as_deref(), filter.path.as_deref()),
                    ..filter.clone()
                });
            }
            for profile in &record.profile {
                if !source.profile.contains(profile) {
                    source.profile.push(profile.clone());
                }
            }
        }
        log::trace!("applied where records for alias {alias}");
        resolved.push(source);
    }
    Ok(resolved)
}
