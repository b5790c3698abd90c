//! Traversal driver and public analysis API
//!
//! [`DataRequirementsAnalyzer`] walks the expression tree of a named
//! definition bottom-up. Every visited subtree leaves exactly one frame on
//! the traversal stack; node handlers in [`crate::dispatch`] consume the
//! frames of their children and push their own. Named expressions are
//! resolved once per library and cached, so shared definitions are never
//! walked twice.

use std::collections::HashMap;

use indexmap::IndexMap;
use octofhir_cql_elm::{ExpressionDef, Library};

use crate::cache::ExpressionCache;
use crate::context::TraversalContext;
use crate::error::{DataRequirementsError, DataRequirementsResult};
use crate::frame::Frame;
use crate::options::AnalyzerOptions;
use crate::requirement::DataRequirement;
use crate::resolver::{LibraryProvider, LibraryScope};

/// Derives the data a named expression needs retrieved, without evaluating it
pub struct DataRequirementsAnalyzer<'p> {
    provider: &'p dyn LibraryProvider,
    pub(crate) options: AnalyzerOptions,
    cache: ExpressionCache,
    pub(crate) parameters: HashMap<(String, String), Frame>,
    nodes_visited: usize,
}

impl<'p> DataRequirementsAnalyzer<'p> {
    /// Analyzer resolving includes through `provider`
    pub fn new(provider: &'p dyn LibraryProvider, options: AnalyzerOptions) -> Self {
        Self {
            provider,
            options,
            cache: ExpressionCache::new(),
            parameters: HashMap::new(),
            nodes_visited: 0,
        }
    }

    pub fn options(&self) -> &AnalyzerOptions {
        &self.options
    }

    /// Resolved named expressions
    pub fn cache(&self) -> &ExpressionCache {
        &self.cache
    }

    /// Expression nodes traversed so far
    pub fn nodes_visited(&self) -> usize {
        self.nodes_visited
    }

    /// Data requirements of the expression definition `name` in `library`.
    ///
    /// OR branches are flattened; records without a resource type and
    /// exact duplicates are dropped.
    pub fn data_requirements(
        &mut self,
        library: &Library,
        name: &str,
    ) -> DataRequirementsResult<Vec<DataRequirement>> {
        log::debug!("analyzing {}.{name}", library.id());
        let scope = LibraryScope::new(library, self.provider);
        let frame = self.resolve_expression(scope, None, name)?;
        Ok(finalize(frame))
    }

    /// Data requirements of every expression definition in `library`, in
    /// declaration order. A failing definition does not stop the others.
    pub fn library_data_requirements(
        &mut self,
        library: &Library,
    ) -> IndexMap<String, DataRequirementsResult<Vec<DataRequirement>>> {
        let mut results = IndexMap::new();
        for def in library.expression_defs() {
            let result = self.data_requirements(library, &def.name);
            if let Err(err) = &result {
                log::warn!("{}.{}: {err}", library.id(), def.name);
            }
            results.insert(def.name.clone(), result);
        }
        results
    }

    /// Frame of a named expression, from the cache or by analysing it
    pub(crate) fn resolve_expression(
        &mut self,
        scope: LibraryScope<'_>,
        library_name: Option<&str>,
        name: &str,
    ) -> DataRequirementsResult<Frame> {
        let (defining, def) = scope.expression(library_name, name)?;
        let library_id = defining.library().id();
        if let Some(frame) = self.cache.get(library_id, name) {
            log::trace!("cache hit for {library_id}.{name}");
            return Ok(frame.clone());
        }

        self.cache.begin(library_id, name)?;
        match self.analyze_definition(&defining, def) {
            Ok(frame) => {
                self.cache.complete(library_id, name, frame.clone());
                Ok(frame)
            }
            Err(err) => {
                self.cache.abandon(library_id, name);
                Err(err)
            }
        }
    }

    fn analyze_definition(
        &mut self,
        scope: &LibraryScope<'_>,
        def: &ExpressionDef,
    ) -> DataRequirementsResult<Frame> {
        let mut ctx = TraversalContext::new();
        match def.expression.as_deref() {
            Some(expr) => self.traverse(expr, scope, &mut ctx)?,
            None => ctx.push(Frame::empty()),
        }
        let frame = ctx.finish_expression(&def.name)?;
        if ctx.height() != 0 || ctx.query_depth() != 0 {
            return Err(DataRequirementsError::UnresolvedStack {
                name: def.name.clone(),
                height: ctx.height(),
            });
        }
        Ok(frame)
    }

    /// Visit one subtree, checking it leaves exactly one frame behind
    pub(crate) fn traverse(
        &mut self,
        expr: &octofhir_cql_elm::Expression,
        scope: &LibraryScope<'_>,
        ctx: &mut TraversalContext,
    ) -> DataRequirementsResult<()> {
        self.nodes_visited += 1;
        let before = ctx.height();
        self.dispatch(expr, scope, ctx)?;
        if ctx.height() != before + 1 {
            return Err(DataRequirementsError::StackImbalance {
                expected: before + 1,
                actual: ctx.height(),
            });
        }
        Ok(())
    }
}

fn finalize(frame: Frame) -> Vec<DataRequirement> {
    let mut records: Vec<DataRequirement> = Vec::new();
    for mut record in frame.into_flattened() {
        record.alias = None;
        if record.data_type.is_none() || records.contains(&record) {
            continue;
        }
        records.push(record);
    }
    records
}
