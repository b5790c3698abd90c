//! Requirement maps and frames
//!
//! A [`RequirementMap`] holds at most one record per resource type (the
//! conjunction of everything known about that type). A [`Frame`] is a list
//! of maps read as OR branches: an empty frame carries no constraint, a
//! single branch is fully conjunctive, several branches are an unresolved
//! disjunction.

use indexmap::IndexMap;

use crate::error::{DataRequirementsError, DataRequirementsResult};
use crate::requirement::DataRequirement;

// ============================================================================
// RequirementMap
// ============================================================================

/// Records of one OR branch, keyed by type in insertion order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RequirementMap {
    records: IndexMap<Option<String>, DataRequirement>,
}

impl RequirementMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a normalized map; two records of one type are rejected
    pub fn from_records(
        records: impl IntoIterator<Item = DataRequirement>,
    ) -> DataRequirementsResult<Self> {
        let mut map = Self::new();
        for record in records {
            map.insert(record)?;
        }
        Ok(map)
    }

    /// Add a record whose type is not yet present
    pub fn insert(&mut self, record: DataRequirement) -> DataRequirementsResult<()> {
        if self.records.contains_key(&record.data_type) {
            return Err(DataRequirementsError::NotNormalized {
                data_type: record.type_label().to_string(),
            });
        }
        self.records.insert(record.data_type.clone(), record);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Exactly one record
    pub fn is_single(&self) -> bool {
        self.records.len() == 1
    }

    /// The only record of a single-type map
    pub fn as_single(&self, operator: &str) -> DataRequirementsResult<&DataRequirement> {
        match self.records.values().next() {
            Some(record) if self.is_single() => Ok(record),
            Some(_) => Err(DataRequirementsError::multiple_types(operator)),
            None => Err(DataRequirementsError::unsupported_shape(
                operator,
                "expected one requirement, found none",
            )),
        }
    }

    pub fn get(&self, data_type: Option<&str>) -> Option<&DataRequirement> {
        self.records.get(&data_type.map(str::to_string))
    }

    pub fn records(&self) -> impl Iterator<Item = &DataRequirement> {
        self.records.values()
    }

    pub fn records_mut(&mut self) -> impl Iterator<Item = &mut DataRequirement> {
        self.records.values_mut()
    }

    pub fn into_records(self) -> impl Iterator<Item = DataRequirement> {
        self.records.into_values()
    }
}

// ============================================================================
// Frame
// ============================================================================

/// OR branches of requirement maps
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    branches: Vec<RequirementMap>,
}

impl Frame {
    /// No constraint known
    pub fn empty() -> Self {
        Self::default()
    }

    /// One branch holding one record
    pub fn single(record: DataRequirement) -> Self {
        let mut map = RequirementMap::new();
        map.records.insert(record.data_type.clone(), record);
        Self::from_branch(map)
    }

    /// One branch holding the given records; duplicate types are rejected
    pub fn of(
        records: impl IntoIterator<Item = DataRequirement>,
    ) -> DataRequirementsResult<Self> {
        let map = RequirementMap::from_records(records)?;
        Ok(if map.is_empty() {
            Self::empty()
        } else {
            Self::from_branch(map)
        })
    }

    pub fn from_branch(map: RequirementMap) -> Self {
        Self {
            branches: vec![map],
        }
    }

    pub fn from_branches(branches: Vec<RequirementMap>) -> Self {
        Self { branches }
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    pub fn branch_count(&self) -> usize {
        self.branches.len()
    }

    /// At most one branch
    pub fn is_single_or(&self) -> bool {
        self.branches.len() <= 1
    }

    /// The only branch; an empty frame yields `None`
    pub fn as_single_or(
        &self,
        operator: &str,
    ) -> DataRequirementsResult<Option<&RequirementMap>> {
        if self.is_single_or() {
            Ok(self.branches.first())
        } else {
            Err(DataRequirementsError::not_dnf(operator))
        }
    }

    /// The only record of a single-branch, single-type frame
    pub fn as_single_record(
        &self,
        operator: &str,
    ) -> DataRequirementsResult<Option<&DataRequirement>> {
        match self.as_single_or(operator)? {
            Some(map) if !map.is_empty() => map.as_single(operator).map(Some),
            _ => Ok(None),
        }
    }

    /// Owned form of [`Frame::as_single_record`]
    pub fn into_single_record(
        self,
        operator: &str,
    ) -> DataRequirementsResult<Option<DataRequirement>> {
        self.as_single_record(operator)?;
        Ok(self.into_flattened().into_iter().next())
    }

    pub fn branches(&self) -> &[RequirementMap] {
        &self.branches
    }

    pub fn branches_mut(&mut self) -> &mut [RequirementMap] {
        &mut self.branches
    }

    pub fn into_branches(self) -> Vec<RequirementMap> {
        self.branches
    }

    /// Every record of every branch, in order
    pub fn flatten(&self) -> Vec<DataRequirement> {
        self.branches
            .iter()
            .flat_map(|b| b.records().cloned())
            .collect()
    }

    pub fn into_flattened(self) -> Vec<DataRequirement> {
        self.branches
            .into_iter()
            .flat_map(RequirementMap::into_records)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_rejects_duplicate_types() {
        let result = RequirementMap::from_records([
            DataRequirement::of_type("Observation"),
            DataRequirement::of_type("Observation"),
        ]);
        assert!(matches!(
            result,
            Err(DataRequirementsError::NotNormalized { .. })
        ));
    }

    #[test]
    fn test_as_single() {
        let map = RequirementMap::from_records([
            DataRequirement::of_type("Observation"),
            DataRequirement::of_type("Condition"),
        ])
        .unwrap();
        assert!(!map.is_single());
        assert!(map.as_single("Test").is_err());
        assert_eq!(map.get(Some("Condition")).unwrap().type_label(), "Condition");
    }

    #[test]
    fn test_frame_shapes() {
        let empty = Frame::empty();
        assert!(empty.is_single_or());
        assert_eq!(empty.as_single_record("Test").unwrap(), None);

        let frame = Frame::from_branches(vec![
            RequirementMap::from_records([DataRequirement::of_type("A")]).unwrap(),
            RequirementMap::from_records([DataRequirement::of_type("B")]).unwrap(),
        ]);
        assert!(!frame.is_single_or());
        assert!(frame.as_single_or("Test").is_err());
        let types: Vec<_> = frame.flatten().into_iter().map(|r| r.data_type).collect();
        assert_eq!(types, vec![Some("A".to_string()), Some("B".to_string())]);
    }

    #[test]
    fn test_of_without_records_is_empty() {
        assert!(Frame::of(Vec::new()).unwrap().is_empty());
    }
}
