//! Library resolution
//!
//! Analysis never loads libraries itself. A [`LibraryProvider`] hands out
//! already-compiled libraries by identifier, and a [`LibraryScope`] follows
//! include aliases from the library being analysed to the one that defines
//! a referenced name.

use std::collections::HashMap;

use octofhir_cql_elm::{
    CodeDef, CodeSystemDef, ConceptDef, ExpressionDef, Library, ParameterDef, ValueSetDef,
};

use crate::error::{DataRequirementsError, DataRequirementsResult, DefinitionKind};

/// Read-only source of compiled libraries
pub trait LibraryProvider {
    /// Library with the given identifier. When a version is requested and the
    /// library declares one, they must match.
    fn library(&self, id: &str, version: Option<&str>) -> Option<&Library>;
}

/// In-memory provider keyed by library identifier
#[derive(Debug, Default, Clone)]
pub struct LibraryRegistry {
    libraries: HashMap<String, Vec<Library>>,
}

impl LibraryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, library: Library) {
        self.libraries
            .entry(library.id().to_string())
            .or_default()
            .push(library);
    }

    pub fn with_library(mut self, library: Library) -> Self {
        self.register(library);
        self
    }

    /// Number of registered libraries, counting every version
    pub fn len(&self) -> usize {
        self.libraries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }
}

impl LibraryProvider for LibraryRegistry {
    fn library(&self, id: &str, version: Option<&str>) -> Option<&Library> {
        let candidates = self.libraries.get(id)?;
        match version {
            Some(wanted) => candidates
                .iter()
                .find(|lib| lib.version().is_none_or(|v| v == wanted)),
            None => candidates.first(),
        }
    }
}

// ============================================================================
// LibraryScope
// ============================================================================

/// The library a node belongs to, plus the provider used to follow its
/// includes
#[derive(Clone, Copy)]
pub struct LibraryScope<'a> {
    library: &'a Library,
    provider: &'a dyn LibraryProvider,
}

impl std::fmt::Debug for LibraryScope<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibraryScope")
            .field("library", &self.library.id())
            .finish()
    }
}

impl<'a> LibraryScope<'a> {
    pub fn new(library: &'a Library, provider: &'a dyn LibraryProvider) -> Self {
        Self { library, provider }
    }

    pub fn library(&self) -> &'a Library {
        self.library
    }

    /// Scope of the library named by an include alias, or this scope when
    /// no alias is given
    pub fn resolve(&self, library_name: Option<&str>) -> DataRequirementsResult<Self> {
        let Some(alias) = library_name else {
            return Ok(*self);
        };
        let include = self
            .library
            .include(alias)
            .ok_or_else(|| DataRequirementsError::unknown_library(alias))?;
        let library = self
            .provider
            .library(&include.path, include.version.as_deref())
            .ok_or_else(|| DataRequirementsError::unknown_library(&include.path))?;
        log::trace!(
            "resolved include {alias} of {} to {}",
            self.library.id(),
            library.id()
        );
        Ok(Self::new(library, self.provider))
    }

    fn lookup<T>(
        &self,
        library_name: Option<&str>,
        name: &str,
        kind: DefinitionKind,
        find: impl Fn(&'a Library, &str) -> Option<&'a T>,
    ) -> DataRequirementsResult<(Self, &'a T)> {
        let scope = self.resolve(library_name)?;
        let def = find(scope.library, name).ok_or_else(|| {
            DataRequirementsError::unknown_definition(kind, name, scope.library.id())
        })?;
        Ok((scope, def))
    }

    pub fn value_set(
        &self,
        library_name: Option<&str>,
        name: &str,
    ) -> DataRequirementsResult<(Self, &'a ValueSetDef)> {
        self.lookup(library_name, name, DefinitionKind::ValueSet, Library::value_set)
    }

    pub fn code_system(
        &self,
        library_name: Option<&str>,
        name: &str,
    ) -> DataRequirementsResult<(Self, &'a CodeSystemDef)> {
        self.lookup(library_name, name, DefinitionKind::CodeSystem, Library::code_system)
    }

    pub fn code(
        &self,
        library_name: Option<&str>,
        name: &str,
    ) -> DataRequirementsResult<(Self, &'a CodeDef)> {
        self.lookup(library_name, name, DefinitionKind::Code, Library::code)
    }

    pub fn concept(
        &self,
        library_name: Option<&str>,
        name: &str,
    ) -> DataRequirementsResult<(Self, &'a ConceptDef)> {
        self.lookup(library_name, name, DefinitionKind::Concept, Library::concept)
    }

    pub fn parameter(
        &self,
        library_name: Option<&str>,
        name: &str,
    ) -> DataRequirementsResult<(Self, &'a ParameterDef)> {
        self.lookup(library_name, name, DefinitionKind::Parameter, Library::parameter)
    }

    pub fn expression(
        &self,
        library_name: Option<&str>,
        name: &str,
    ) -> DataRequirementsResult<(Self, &'a ExpressionDef)> {
        self.lookup(library_name, name, DefinitionKind::Expression, Library::expression)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use octofhir_cql_elm::{Defs, IncludeDef};

    fn main_library() -> Library {
        let mut library = Library::new("Main", Some("1.0.0"));
        library.includes = Some(Defs::from(vec![IncludeDef {
            local_identifier: "Common".into(),
            path: "CommonLib".into(),
            version: Some("2.0".into()),
        }]));
        library
    }

    fn common_library() -> Library {
        let mut library = Library::new("CommonLib", Some("2.0"));
        library.value_sets = Some(Defs::from(vec![ValueSetDef {
            name: "ESRD".into(),
            id: "http://fakeurl.com/ersd-diagnosis".into(),
            version: None,
        }]));
        library
    }

    #[test]
    fn test_registry_version_matching() {
        let registry = LibraryRegistry::new().with_library(common_library());
        assert!(registry.library("CommonLib", Some("2.0")).is_some());
        assert!(registry.library("CommonLib", None).is_some());
        assert!(registry.library("CommonLib", Some("3.0")).is_none());
        assert!(registry.library("Other", None).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_cross_library_lookup() {
        let main = main_library();
        let registry = LibraryRegistry::new().with_library(common_library());
        let scope = LibraryScope::new(&main, &registry);

        let (defining, value_set) = scope.value_set(Some("Common"), "ESRD").unwrap();
        assert_eq!(value_set.id, "http://fakeurl.com/ersd-diagnosis");
        assert_eq!(defining.library().id(), "CommonLib");
    }

    #[test]
    fn test_unknown_references_fail() {
        let main = main_library();
        let registry = LibraryRegistry::new();
        let scope = LibraryScope::new(&main, &registry);

        assert_eq!(
            scope.value_set(Some("Missing"), "ESRD").unwrap_err(),
            DataRequirementsError::unknown_library("Missing")
        );
        assert_eq!(
            scope.value_set(Some("Common"), "ESRD").unwrap_err(),
            DataRequirementsError::unknown_library("CommonLib")
        );
        assert!(matches!(
            scope.value_set(None, "ESRD").unwrap_err(),
            DataRequirementsError::UnknownDefinition {
                kind: DefinitionKind::ValueSet,
                ..
            }
        ));
    }
}
