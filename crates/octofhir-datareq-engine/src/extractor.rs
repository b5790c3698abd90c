//! Base requirements of retrieve nodes
//!
//! A retrieve is the root of every data requirement: its type and profile
//! come straight from the node, and its terminology filter is resolved to a
//! value set URL or a list of codings, following includes when the
//! reference names another library.

use octofhir_cql_elm::{
    local_name, CodeDef, CodeLiteral, CodeRef, CodeSystemRef, ConceptRef, Expression, Retrieve,
    ValueSetRef,
};

use crate::error::DataRequirementsResult;
use crate::requirement::{CodeFilter, Coding, DataRequirement};
use crate::resolver::LibraryScope;

/// Type tag given to codings resolved from terminology definitions
pub const CODE_TYPE: &str = "Code";

/// Terminology a codes expression resolves to
#[derive(Debug, Clone, PartialEq)]
pub enum Terminology {
    ValueSet(String),
    Codes(Vec<Coding>),
}

/// Starting requirement for a retrieve node
pub fn extract_retrieve(
    retrieve: &Retrieve,
    scope: &LibraryScope<'_>,
) -> DataRequirementsResult<DataRequirement> {
    let mut record = DataRequirement::of_type(local_name(&retrieve.data_type));
    if let Some(template) = &retrieve.template_id {
        record.profile.push(template.clone());
    }

    if let Some(code_property) = &retrieve.code_property {
        let mut filter = CodeFilter::path(code_property, None);
        match retrieve.codes.as_deref() {
            Some(codes) => match resolve_terminology(codes, scope)? {
                Some(Terminology::ValueSet(url)) => filter.value_set = Some(url),
                Some(Terminology::Codes(codings)) => filter.codes = codings,
                None => log::debug!(
                    "codes of {} retrieve are not a terminology reference; keeping path {code_property}",
                    record.type_label()
                ),
            },
            None => log::debug!("{} retrieve has a code property but no codes", record.type_label()),
        }
        record.code_filters.push(filter);
    }
    Ok(record)
}

/// Resolve a terminology expression. Expressions that are not terminology
/// references resolve to `None`.
pub fn resolve_terminology(
    expr: &Expression,
    scope: &LibraryScope<'_>,
) -> DataRequirementsResult<Option<Terminology>> {
    let terminology = match expr {
        Expression::ValueSetRef(r) => Terminology::ValueSet(value_set_url(r, scope)?),
        Expression::CodeRef(r) => Terminology::Codes(vec![code_ref(r, scope)?]),
        Expression::Code(literal) => Terminology::Codes(vec![code_literal(literal, scope)?]),
        Expression::ConceptRef(r) => Terminology::Codes(concept_ref(r, scope)?),
        Expression::Concept(concept) => Terminology::Codes(
            concept
                .code
                .iter()
                .map(|c| code_literal(c, scope))
                .collect::<DataRequirementsResult<_>>()?,
        ),
        Expression::ToList(e) | Expression::ToConcept(e) => {
            return resolve_terminology(&e.operand, scope);
        }
        Expression::List(list) => {
            let mut codings = Vec::new();
            for element in &list.element {
                match resolve_terminology(element, scope)? {
                    Some(Terminology::Codes(codes)) => codings.extend(codes),
                    _ => return Ok(None),
                }
            }
            Terminology::Codes(codings)
        }
        _ => return Ok(None),
    };
    Ok(Some(terminology))
}

/// Value set URL, with `|version` appended when the definition is versioned
pub fn value_set_url(r: &ValueSetRef, scope: &LibraryScope<'_>) -> DataRequirementsResult<String> {
    let (_, def) = scope.value_set(r.library_name.as_deref(), &r.name)?;
    Ok(match &def.version {
        Some(version) => format!("{}|{version}", def.id),
        None => def.id.clone(),
    })
}

fn system(
    r: &CodeSystemRef,
    scope: &LibraryScope<'_>,
) -> DataRequirementsResult<(String, Option<String>)> {
    let (_, def) = scope.code_system(r.library_name.as_deref(), &r.name)?;
    Ok((def.id.clone(), def.version.clone()))
}

fn code_def(def: &CodeDef, scope: &LibraryScope<'_>) -> DataRequirementsResult<Coding> {
    let (system, version) = system(&def.code_system, scope)?;
    Ok(Coding {
        system: Some(system),
        version,
        code: def.id.clone(),
        display: def.display.clone(),
        type_name: Some(CODE_TYPE.to_string()),
    })
}

pub fn code_ref(r: &CodeRef, scope: &LibraryScope<'_>) -> DataRequirementsResult<Coding> {
    let (defining, def) = scope.code(r.library_name.as_deref(), &r.name)?;
    code_def(def, &defining)
}

pub fn code_literal(literal: &CodeLiteral, scope: &LibraryScope<'_>) -> DataRequirementsResult<Coding> {
    let (system, system_version) = system(&literal.system, scope)?;
    Ok(Coding {
        system: Some(system),
        version: literal.version.clone().or(system_version),
        code: literal.code.clone(),
        display: literal.display.clone(),
        type_name: Some(CODE_TYPE.to_string()),
    })
}

pub fn concept_ref(r: &ConceptRef, scope: &LibraryScope<'_>) -> DataRequirementsResult<Vec<Coding>> {
    let (defining, def) = scope.concept(r.library_name.as_deref(), &r.name)?;
    def.code.iter().map(|c| code_ref(c, &defining)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DataRequirementsError;
    use crate::resolver::LibraryRegistry;
    use octofhir_cql_elm::{
        CodeSystemDef, ConceptDef, Defs, IncludeDef, Library, ListExpression, ValueSetDef,
    };
    use pretty_assertions::assert_eq;

    fn terminology_library() -> Library {
        let mut library = Library::new("Terms", Some("1.0.0"));
        library.code_systems = Some(Defs::from(vec![CodeSystemDef {
            name: "LOINC".into(),
            id: "http://loinc.org".into(),
            version: None,
        }]));
        library.value_sets = Some(Defs::from(vec![
            ValueSetDef {
                name: "ESRD".into(),
                id: "http://fakeurl.com/ersd-diagnosis".into(),
                version: None,
            },
            ValueSetDef {
                name: "Versioned".into(),
                id: "http://example.org/vs".into(),
                version: Some("2020".into()),
            },
        ]));
        library.codes = Some(Defs::from(vec![CodeDef {
            name: "Glucose".into(),
            id: "2345-7".into(),
            display: Some("Glucose".into()),
            code_system: CodeSystemRef::local("LOINC"),
        }]));
        library.concepts = Some(Defs::from(vec![ConceptDef {
            name: "Sugar".into(),
            display: None,
            code: vec![CodeRef::local("Glucose")],
        }]));
        library
    }

    #[test]
    fn test_value_set_retrieve() {
        let library = terminology_library();
        let registry = LibraryRegistry::new();
        let scope = LibraryScope::new(&library, &registry);
        let retrieve = Retrieve::new("{http://hl7.org/fhir}Observation")
            .with_codes("code", Expression::ValueSetRef(ValueSetRef::local("ESRD")));

        let record = extract_retrieve(&retrieve, &scope).unwrap();
        assert_eq!(record.data_type.as_deref(), Some("Observation"));
        assert_eq!(record.code_filters.len(), 1);
        assert_eq!(record.code_filters[0].path.as_deref(), Some("code"));
        assert_eq!(
            record.code_filters[0].value_set.as_deref(),
            Some("http://fakeurl.com/ersd-diagnosis")
        );
    }

    #[test]
    fn test_versioned_value_set_url() {
        let library = terminology_library();
        let registry = LibraryRegistry::new();
        let scope = LibraryScope::new(&library, &registry);
        assert_eq!(
            value_set_url(&ValueSetRef::local("Versioned"), &scope).unwrap(),
            "http://example.org/vs|2020"
        );
    }

    #[test]
    fn test_code_and_concept_references() {
        let library = terminology_library();
        let registry = LibraryRegistry::new();
        let scope = LibraryScope::new(&library, &registry);

        let codes = Expression::List(ListExpression::new(vec![
            Expression::CodeRef(CodeRef::local("Glucose")),
            Expression::ConceptRef(ConceptRef::local("Sugar")),
        ]));
        let Some(Terminology::Codes(codings)) = resolve_terminology(&codes, &scope).unwrap() else {
            panic!("expected codes");
        };
        assert_eq!(codings.len(), 2);
        assert_eq!(codings[0].system.as_deref(), Some("http://loinc.org"));
        assert_eq!(codings[0].code, "2345-7");
    }

    #[test]
    fn test_cross_library_codes() {
        let mut main = Library::new("Main", None);
        main.includes = Some(Defs::from(vec![IncludeDef {
            local_identifier: "T".into(),
            path: "Terms".into(),
            version: None,
        }]));
        let registry = LibraryRegistry::new().with_library(terminology_library());
        let scope = LibraryScope::new(&main, &registry);

        let coding = code_ref(&CodeRef::qualified("T", "Glucose"), &scope).unwrap();
        assert_eq!(coding.system.as_deref(), Some("http://loinc.org"));

        let err = code_ref(&CodeRef::qualified("X", "Glucose"), &scope).unwrap_err();
        assert_eq!(err, DataRequirementsError::unknown_library("X"));
    }

    #[test]
    fn test_non_terminology_codes_keep_path() {
        let library = terminology_library();
        let registry = LibraryRegistry::new();
        let scope = LibraryScope::new(&library, &registry);
        let retrieve = Retrieve::new("Condition").with_codes(
            "code",
            Expression::CodeSystemRef(CodeSystemRef::local("LOINC")),
        );

        let record = extract_retrieve(&retrieve, &scope).unwrap();
        assert_eq!(record.code_filters, vec![CodeFilter::path("code", None)]);
    }
}
