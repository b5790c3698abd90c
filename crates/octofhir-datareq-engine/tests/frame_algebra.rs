//! Algebraic properties of frame merging and where-clause attachment

use std::collections::BTreeMap;

use octofhir_datareq_engine::operations::{
    apply_where, merge_and, merge_or, simple_merge,
};
use octofhir_datareq_engine::{
    CodeFilter, Coding, DataRequirement, DataRequirementsError, DateFilter, Frame, RequirementMap,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

fn code_filter() -> impl Strategy<Value = CodeFilter> {
    (
        prop::sample::select(vec!["code", "status", "category", "item.revenue"]),
        prop::option::of(prop::sample::select(vec!["final", "amended", "active"])),
    )
        .prop_map(|(path, code)| CodeFilter {
            path: Some(path.to_string()),
            codes: code
                .map(|c| vec![Coding::literal(c, "String")])
                .unwrap_or_default(),
            ..CodeFilter::default()
        })
}

fn record() -> impl Strategy<Value = DataRequirement> {
    (
        prop::sample::select(vec!["Observation", "Condition", "Encounter"]),
        prop::collection::vec(code_filter(), 0..3),
        prop::option::of(prop::sample::select(vec!["effective", "onset"])),
    )
        .prop_map(|(data_type, code_filters, date_path)| DataRequirement {
            data_type: Some(data_type.to_string()),
            code_filters,
            date_filters: date_path
                .map(|p| vec![DateFilter::path(p, Some("dateTime".into()))])
                .unwrap_or_default(),
            ..DataRequirement::default()
        })
}

/// A branch holding at most one record per type
fn branch() -> impl Strategy<Value = RequirementMap> {
    prop::collection::vec(record(), 0..3).prop_map(|records| {
        let mut map = RequirementMap::new();
        for record in records {
            if map.get(record.data_type.as_deref()).is_none() {
                map.insert(record).unwrap();
            }
        }
        map
    })
}

fn single_or_frame() -> impl Strategy<Value = Frame> {
    prop::option::of(branch()).prop_map(|branch| match branch {
        Some(map) if !map.is_empty() => Frame::from_branch(map),
        _ => Frame::empty(),
    })
}

fn multi_branch_frame() -> impl Strategy<Value = Frame> {
    prop::collection::vec(
        record().prop_map(|r| {
            let mut map = RequirementMap::new();
            map.insert(r).unwrap();
            map
        }),
        2..4,
    )
    .prop_map(Frame::from_branches)
}

/// Order-insensitive view of a single-branch frame
fn normalized(frame: &Frame) -> BTreeMap<String, (Vec<String>, Vec<String>)> {
    frame
        .flatten()
        .into_iter()
        .map(|record| {
            let mut codes: Vec<String> = record
                .code_filters
                .iter()
                .map(|f| format!("{:?}:{:?}", f.path, f.codes))
                .collect();
            codes.sort();
            let mut dates: Vec<String> =
                record.date_filters.iter().map(|f| format!("{:?}", f.path)).collect();
            dates.sort();
            (record.type_label().to_string(), (codes, dates))
        })
        .collect()
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn merge_and_commutes(left in single_or_frame(), right in single_or_frame()) {
        let lr = merge_and(left.clone(), right.clone()).unwrap();
        let rl = merge_and(right, left).unwrap();
        prop_assert!(lr.is_single_or());
        prop_assert_eq!(normalized(&lr), normalized(&rl));
    }

    #[test]
    fn merge_and_keeps_one_record_per_type(left in single_or_frame(), right in single_or_frame()) {
        let merged = merge_and(left, right).unwrap();
        for branch in merged.branches() {
            let mut types: Vec<_> = branch.records().map(|r| r.data_type.clone()).collect();
            let before = types.len();
            types.sort();
            types.dedup();
            prop_assert_eq!(types.len(), before);
        }
    }

    #[test]
    fn merge_or_adds_branches(left in multi_branch_frame(), right in single_or_frame()) {
        let expected = left.branch_count() + right.branch_count();
        prop_assert_eq!(merge_or(left, right).branch_count(), expected);
    }

    #[test]
    fn simple_merge_rejects_disjunctions(left in multi_branch_frame(), right in single_or_frame()) {
        let err = simple_merge(left.clone(), right.clone()).unwrap_err();
        prop_assert!(
            matches!(err, DataRequirementsError::NotDisjunctiveNormalForm { .. }),
            "unexpected error {:?}",
            err
        );
        prop_assert!(simple_merge(right, left).is_err());
    }
}

// ============================================================================
// Alias exclusivity
// ============================================================================

fn aliased(data_type: &str, alias: &str) -> DataRequirement {
    DataRequirement {
        alias: Some(alias.to_string()),
        ..DataRequirement::of_type(data_type)
    }
}

#[test]
fn test_where_records_apply_to_their_alias_only() {
    let sources = vec![aliased("Encounter", "E"), aliased("Condition", "C")];
    let wheres = vec![
        DataRequirement::of_type("E").with_code_filter(CodeFilter::path("status", None)),
        DataRequirement::of_type("C").with_date_filter(DateFilter::path("onset", None)),
        DataRequirement::of_type("X").with_code_filter(CodeFilter::path("ignored", None)),
    ];

    let resolved = apply_where(sources, &wheres).unwrap();
    assert_eq!(
        resolved,
        vec![
            DataRequirement::of_type("Encounter")
                .with_code_filter(CodeFilter::path("status", None)),
            DataRequirement::of_type("Condition")
                .with_date_filter(DateFilter::path("onset", None)),
        ]
    );
}

#[test]
fn test_alias_with_both_channels_conflicts() {
    let source = DataRequirement {
        alias: Some("I".into()),
        ..DataRequirement::of_type("Claim")
            .with_code_filter(CodeFilter::path("item", None))
            .with_date_filter(DateFilter::path("created", None))
    };
    assert_eq!(
        apply_where(vec![source], &[]).unwrap_err(),
        DataRequirementsError::alias_conflict("I")
    );
}

#[test]
fn test_untagged_sources_pass_through() {
    let source = DataRequirement::of_type("Patient");
    let wheres = vec![DataRequirement::of_type("Patient")
        .with_code_filter(CodeFilter::path("gender", None))];
    assert_eq!(apply_where(vec![source.clone()], &wheres).unwrap(), vec![source]);
}
