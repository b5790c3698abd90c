//! Node handlers
//!
//! One exhaustive match over every expression kind. Retrieves, queries and
//! expression references produce requirements wherever they appear. Every
//! other kind only matters inside a query, where its children's frames are
//! combined by a handler of its own or by the default rule for its shape.

use std::collections::HashSet;

use octofhir_cql_elm::{
    local_name, Arity, BinaryExpression, DateTimeExpression, Expression, FunctionRef,
    IntervalExpression, Literal, ParameterRef, Property, Query, ValueSetRef,
};

use crate::analyzer::DataRequirementsAnalyzer;
use crate::classify::{convert_code_filters, has_date_value, is_temporal_type, parse_temporal};
use crate::context::TraversalContext;
use crate::error::{DataRequirementsError, DataRequirementsResult};
use crate::extractor::{extract_retrieve, resolve_terminology, value_set_url, Terminology};
use crate::frame::{Frame, RequirementMap};
use crate::operations::{
    apply_where, clear_constants, group_union, merge_and, merge_frames, merge_or,
};
use crate::requirement::{CodeFilter, Coding, DataRequirement, DateFilter};
use crate::resolver::LibraryScope;
use crate::temporal::{PartialDateTime, Period, TemporalValue};

type Scope<'s, 'a> = &'s LibraryScope<'a>;

impl DataRequirementsAnalyzer<'_> {
    pub(crate) fn dispatch(
        &mut self,
        expr: &Expression,
        scope: Scope<'_, '_>,
        ctx: &mut TraversalContext,
    ) -> DataRequirementsResult<()> {
        let is_source = matches!(
            expr,
            Expression::Retrieve(_) | Expression::Query(_) | Expression::ExpressionRef(_)
        );
        if !is_source && !ctx.in_query() {
            return self.outside_query(expr, scope, ctx);
        }

        match expr {
            // === Requirement sources ===
            Expression::Retrieve(retrieve) => {
                ctx.push(Frame::single(extract_retrieve(retrieve, scope)?));
                Ok(())
            }
            Expression::Query(query) => self.query(query, scope, ctx),
            Expression::ExpressionRef(r) => {
                let frame = self.resolve_expression(*scope, r.library_name.as_deref(), &r.name)?;
                ctx.push(frame);
                Ok(())
            }

            // === Boolean combinators ===
            Expression::And(e) => self.and(e, scope, ctx),
            Expression::Or(e) => {
                let (left, right) = pair(self.operands(&e.operand, scope, ctx)?, "Or")?;
                ctx.push(merge_or(left, right));
                Ok(())
            }
            Expression::Exists(e) => self.traverse(&e.operand, scope, ctx),

            // === Paths and values ===
            Expression::Property(p) => self.property(p, scope, ctx),
            Expression::AliasRef(r) => {
                ctx.push(Frame::single(DataRequirement::of_type(&r.name)));
                Ok(())
            }
            Expression::Literal(literal) => {
                ctx.push(literal_frame(literal)?);
                Ok(())
            }
            Expression::ParameterRef(r) => self.parameter(r, scope, ctx),
            Expression::ValueSetRef(_)
            | Expression::CodeRef(_)
            | Expression::ConceptRef(_)
            | Expression::Code(_)
            | Expression::Concept(_) => {
                ctx.push(terminology_frame(expr, scope)?);
                Ok(())
            }
            Expression::List(list) => {
                let frames = self.operands(&list.element, scope, ctx)?;
                let frame = match bare_codes(&frames) {
                    Some(codes) => bare_code_frame(codes),
                    None => combine(Arity::Structured, frames)?,
                };
                ctx.push(frame);
                Ok(())
            }
            Expression::Interval(interval) => self.interval(expr, interval, scope, ctx),
            Expression::Date(ctor) => self.date_constructor(expr, ctor, "Date", scope, ctx),
            Expression::DateTime(ctor) => self.date_constructor(expr, ctor, "DateTime", scope, ctx),

            // === Value binding ===
            Expression::Equal(e) | Expression::Equivalent(e) | Expression::In(e) => {
                let frames = self.operands(&e.operand, scope, ctx)?;
                ctx.push(merge_frames(frames, false)?);
                Ok(())
            }
            Expression::InValueSet(e) => self.in_value_set(
                &e.code,
                e.valueset.as_ref(),
                e.valueset_expression.as_deref(),
                scope,
                ctx,
            ),
            Expression::AnyInValueSet(e) => self.in_value_set(
                &e.codes,
                e.valueset.as_ref(),
                e.valueset_expression.as_deref(),
                scope,
                ctx,
            ),

            Expression::FunctionRef(f) => self.function_ref(f, scope, ctx),

            // === Everything else recombines its children ===
            Expression::Null(_)
            | Expression::Quantity(_)
            | Expression::Ratio(_)
            | Expression::Tuple(_)
            | Expression::Instance(_)
            | Expression::Time(_)
            | Expression::Now(_)
            | Expression::Today(_)
            | Expression::TimeOfDay(_)
            | Expression::MinValue(_)
            | Expression::MaxValue(_)
            | Expression::CodeSystemRef(_)
            | Expression::OperandRef(_)
            | Expression::QueryLetRef(_)
            | Expression::IdentifierRef(_)
            | Expression::Current(_)
            | Expression::Iteration(_)
            | Expression::Total(_)
            | Expression::Xor(_)
            | Expression::Implies(_)
            | Expression::Not(_)
            | Expression::IsNull(_)
            | Expression::IsTrue(_)
            | Expression::IsFalse(_)
            | Expression::Coalesce(_)
            | Expression::NotEqual(_)
            | Expression::Less(_)
            | Expression::Greater(_)
            | Expression::LessOrEqual(_)
            | Expression::GreaterOrEqual(_)
            | Expression::Add(_)
            | Expression::Subtract(_)
            | Expression::Multiply(_)
            | Expression::Divide(_)
            | Expression::TruncatedDivide(_)
            | Expression::Modulo(_)
            | Expression::Power(_)
            | Expression::Log(_)
            | Expression::Negate(_)
            | Expression::Abs(_)
            | Expression::Ceiling(_)
            | Expression::Floor(_)
            | Expression::Truncate(_)
            | Expression::Exp(_)
            | Expression::Ln(_)
            | Expression::Predecessor(_)
            | Expression::Successor(_)
            | Expression::Precision(_)
            | Expression::Round(_)
            | Expression::Concatenate(_)
            | Expression::Combine(_)
            | Expression::Split(_)
            | Expression::Length(_)
            | Expression::Upper(_)
            | Expression::Lower(_)
            | Expression::Indexer(_)
            | Expression::PositionOf(_)
            | Expression::LastPositionOf(_)
            | Expression::Substring(_)
            | Expression::StartsWith(_)
            | Expression::EndsWith(_)
            | Expression::Matches(_)
            | Expression::ReplaceMatches(_)
            | Expression::SplitOnMatches(_)
            | Expression::DateFrom(_)
            | Expression::TimeFrom(_)
            | Expression::TimezoneOffsetFrom(_)
            | Expression::DateTimeComponentFrom(_)
            | Expression::DurationBetween(_)
            | Expression::DifferenceBetween(_)
            | Expression::SameAs(_)
            | Expression::SameOrBefore(_)
            | Expression::SameOrAfter(_)
            | Expression::CalculateAge(_)
            | Expression::CalculateAgeAt(_)
            | Expression::Start(_)
            | Expression::End(_)
            | Expression::Width(_)
            | Expression::Size(_)
            | Expression::PointFrom(_)
            | Expression::Collapse(_)
            | Expression::Expand(_)
            | Expression::Contains(_)
            | Expression::Includes(_)
            | Expression::IncludedIn(_)
            | Expression::ProperContains(_)
            | Expression::ProperIn(_)
            | Expression::ProperIncludes(_)
            | Expression::ProperIncludedIn(_)
            | Expression::Before(_)
            | Expression::After(_)
            | Expression::Meets(_)
            | Expression::MeetsBefore(_)
            | Expression::MeetsAfter(_)
            | Expression::Overlaps(_)
            | Expression::OverlapsBefore(_)
            | Expression::OverlapsAfter(_)
            | Expression::Starts(_)
            | Expression::Ends(_)
            | Expression::HighBoundary(_)
            | Expression::LowBoundary(_)
            | Expression::Union(_)
            | Expression::Intersect(_)
            | Expression::Except(_)
            | Expression::SingletonFrom(_)
            | Expression::Distinct(_)
            | Expression::Flatten(_)
            | Expression::First(_)
            | Expression::Last(_)
            | Expression::IndexOf(_)
            | Expression::Slice(_)
            | Expression::Filter(_)
            | Expression::ForEach(_)
            | Expression::Repeat(_)
            | Expression::Times(_)
            | Expression::Sort(_)
            | Expression::Children(_)
            | Expression::Descendents(_)
            | Expression::Count(_)
            | Expression::Sum(_)
            | Expression::Min(_)
            | Expression::Max(_)
            | Expression::Avg(_)
            | Expression::Median(_)
            | Expression::Mode(_)
            | Expression::Variance(_)
            | Expression::PopulationVariance(_)
            | Expression::StdDev(_)
            | Expression::PopulationStdDev(_)
            | Expression::AllTrue(_)
            | Expression::AnyTrue(_)
            | Expression::Product(_)
            | Expression::GeometricMean(_)
            | Expression::Aggregate(_)
            | Expression::As(_)
            | Expression::Is(_)
            | Expression::Convert(_)
            | Expression::CanConvert(_)
            | Expression::ConvertQuantity(_)
            | Expression::CanConvertQuantity(_)
            | Expression::ToBoolean(_)
            | Expression::ToChars(_)
            | Expression::ToConcept(_)
            | Expression::ToDate(_)
            | Expression::ToDateTime(_)
            | Expression::ToDecimal(_)
            | Expression::ToInteger(_)
            | Expression::ToLong(_)
            | Expression::ToQuantity(_)
            | Expression::ToRatio(_)
            | Expression::ToString(_)
            | Expression::ToTime(_)
            | Expression::ToList(_)
            | Expression::ConvertsToBoolean(_)
            | Expression::ConvertsToDate(_)
            | Expression::ConvertsToDateTime(_)
            | Expression::ConvertsToDecimal(_)
            | Expression::ConvertsToInteger(_)
            | Expression::ConvertsToLong(_)
            | Expression::ConvertsToQuantity(_)
            | Expression::ConvertsToRatio(_)
            | Expression::ConvertsToString(_)
            | Expression::ConvertsToTime(_)
            | Expression::If(_)
            | Expression::Case(_)
            | Expression::InCodeSystem(_)
            | Expression::AnyInCodeSystem(_)
            | Expression::ExpandValueSet(_)
            | Expression::Subsumes(_)
            | Expression::SubsumedBy(_)
            | Expression::Message(_) => {
                let frames = self.children(expr, scope, ctx)?;
                ctx.push(combine(expr.arity(), frames)?);
                Ok(())
            }
        }
    }

    // ========================================================================
    // Traversal helpers
    // ========================================================================

    /// Traverse the given operands and pop their frames, in operand order
    fn operands(
        &mut self,
        operands: &[Box<Expression>],
        scope: Scope<'_, '_>,
        ctx: &mut TraversalContext,
    ) -> DataRequirementsResult<Vec<Frame>> {
        for operand in operands {
            self.traverse(operand, scope, ctx)?;
        }
        ctx.pop_n(operands.len())
    }

    fn children(
        &mut self,
        expr: &Expression,
        scope: Scope<'_, '_>,
        ctx: &mut TraversalContext,
    ) -> DataRequirementsResult<Vec<Frame>> {
        let children = expr.children();
        for child in &children {
            self.traverse(child, scope, ctx)?;
        }
        ctx.pop_n(children.len())
    }

    /// Outside a query nothing is filterable: children's frames are kept as
    /// alternatives
    fn outside_query(
        &mut self,
        expr: &Expression,
        scope: Scope<'_, '_>,
        ctx: &mut TraversalContext,
    ) -> DataRequirementsResult<()> {
        let frames = self.children(expr, scope, ctx)?;
        ctx.push(frames.into_iter().fold(Frame::empty(), merge_or));
        Ok(())
    }

    // ========================================================================
    // Handlers
    // ========================================================================

    fn and(
        &mut self,
        e: &BinaryExpression,
        scope: Scope<'_, '_>,
        ctx: &mut TraversalContext,
    ) -> DataRequirementsResult<()> {
        let (left, right) = pair(self.operands(&e.operand, scope, ctx)?, "And")?;
        let frame = if left.is_single_or() && right.is_single_or() {
            merge_and(left, right)?
        } else if self.options.is_strict() {
            return Err(DataRequirementsError::not_dnf("And"));
        } else {
            log::warn!(
                "And over {} and {} OR branches is not in disjunctive normal form; literal constants dropped",
                left.branch_count(),
                right.branch_count()
            );
            clear_constants(merge_and(left, right)?)
        };
        ctx.push(frame);
        Ok(())
    }

    fn property(
        &mut self,
        p: &Property,
        scope: Scope<'_, '_>,
        ctx: &mut TraversalContext,
    ) -> DataRequirementsResult<()> {
        let type_name = p.element.result_type();
        let mut record = DataRequirement {
            data_type: p.scope.clone(),
            ..DataRequirement::default()
        };
        let mut path = p.path.clone();

        if let Some(source) = &p.source {
            self.traverse(source, scope, ctx)?;
            if let Some(mut base) = ctx.pop()?.into_single_record("Property")? {
                if let Some(prefix) = take_bare_path(&mut base) {
                    path = format!("{prefix}.{path}");
                }
                record = base;
            }
        }

        if type_name.as_deref().is_some_and(is_temporal_type) {
            record.date_filters.push(DateFilter::path(path, type_name));
        } else {
            record.code_filters.push(CodeFilter::path(path, type_name));
        }
        ctx.push(Frame::single(record));
        Ok(())
    }

    fn parameter(
        &mut self,
        r: &ParameterRef,
        scope: Scope<'_, '_>,
        ctx: &mut TraversalContext,
    ) -> DataRequirementsResult<()> {
        let (defining, def) = scope.parameter(r.library_name.as_deref(), &r.name)?;
        let key = (defining.library().id().to_string(), r.name.clone());
        if let Some(frame) = self.parameters.get(&key) {
            ctx.push(frame.clone());
            return Ok(());
        }

        let frame = match self.options.parameters.get(&r.name) {
            None => {
                log::debug!("parameter {} is unbound", r.name);
                Frame::empty()
            }
            Some(text) => {
                let type_name = def
                    .declared_type()
                    .or_else(|| r.element.result_type())
                    .ok_or_else(|| {
                        DataRequirementsError::missing_type_tag(format!("parameter '{}'", r.name))
                    })?;
                if is_temporal_type(&type_name) && !has_date_value(&type_name) {
                    log::warn!(
                        "parameter {} of type {type_name} has no date filter value; left unbound",
                        r.name
                    );
                    Frame::empty()
                } else {
                    let record = DataRequirement::default()
                        .with_code_filter(CodeFilter::literal(Coding::literal(text, type_name)));
                    Frame::single(convert_code_filters(&record)?)
                }
            }
        };
        self.parameters.insert(key, frame.clone());
        ctx.push(frame);
        Ok(())
    }

    fn in_value_set(
        &mut self,
        code: &Expression,
        valueset: Option<&ValueSetRef>,
        valueset_expression: Option<&Expression>,
        scope: Scope<'_, '_>,
        ctx: &mut TraversalContext,
    ) -> DataRequirementsResult<()> {
        self.traverse(code, scope, ctx)?;
        let mut url = valueset.map(|r| value_set_url(r, scope)).transpose()?;
        if let Some(expr) = valueset_expression {
            self.traverse(expr, scope, ctx)?;
            let frame = ctx.pop()?;
            if url.is_none() {
                url = frame
                    .into_flattened()
                    .into_iter()
                    .flat_map(|record| record.code_filters)
                    .find_map(|filter| filter.value_set);
            }
        }

        let frame = match ctx.pop()?.into_single_record("InValueSet")? {
            Some(mut record) => {
                if let Some(url) = url {
                    match record.code_filters.first_mut() {
                        Some(filter) => filter.value_set = Some(url),
                        None => record.code_filters.push(CodeFilter::value_set(url)),
                    }
                }
                Frame::single(record)
            }
            None => Frame::empty(),
        };
        ctx.push(frame);
        Ok(())
    }

    /// Arguments only; the function body is not analysed
    fn function_ref(
        &mut self,
        f: &FunctionRef,
        scope: Scope<'_, '_>,
        ctx: &mut TraversalContext,
    ) -> DataRequirementsResult<()> {
        let frames = self.operands(&f.operand, scope, ctx)?;
        let records = frames.into_iter().flat_map(Frame::into_flattened);
        ctx.push(Frame::of(group_union(records)?)?);
        Ok(())
    }

    fn interval(
        &mut self,
        expr: &Expression,
        interval: &IntervalExpression,
        scope: Scope<'_, '_>,
        ctx: &mut TraversalContext,
    ) -> DataRequirementsResult<()> {
        let frames = self.children(expr, scope, ctx)?;
        let frame = match literal_period(interval) {
            Some(period) => bare_date_frame(TemporalValue::Period(period), "Interval<DateTime>"),
            None => combine(Arity::Structured, frames)?,
        };
        ctx.push(frame);
        Ok(())
    }

    fn date_constructor(
        &mut self,
        expr: &Expression,
        ctor: &DateTimeExpression,
        type_name: &str,
        scope: Scope<'_, '_>,
        ctx: &mut TraversalContext,
    ) -> DataRequirementsResult<()> {
        let frames = self.children(expr, scope, ctx)?;
        let frame = match constructor_value(ctor) {
            Some(value) => bare_date_frame(TemporalValue::DateTime(value), type_name),
            None => combine(Arity::Structured, frames)?,
        };
        ctx.push(frame);
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    fn query(
        &mut self,
        query: &Query,
        scope: Scope<'_, '_>,
        ctx: &mut TraversalContext,
    ) -> DataRequirementsResult<()> {
        let aliases = query.aliases();
        ctx.enter_query(aliases.clone());
        let composed = self.compose_query(query, &aliases, scope, ctx);
        ctx.exit_query()?;
        ctx.push(composed?);
        Ok(())
    }

    fn compose_query(
        &mut self,
        query: &Query,
        aliases: &[String],
        scope: Scope<'_, '_>,
        ctx: &mut TraversalContext,
    ) -> DataRequirementsResult<Frame> {
        let mut sources = Vec::new();
        for source in &query.source {
            self.traverse(&source.expression, scope, ctx)?;
            for mut record in ctx.pop()?.into_flattened() {
                record.alias = Some(source.alias.clone());
                sources.push(record);
            }
        }

        let mut related = Frame::empty();
        for relationship in &query.relationship {
            self.traverse(&relationship.clause().expression, scope, ctx)?;
            related = merge_or(related, ctx.pop()?);
        }

        let where_branches: Vec<Vec<DataRequirement>> = match &query.where_clause {
            Some(condition) => {
                self.traverse(condition, scope, ctx)?;
                let frame = ctx.pop()?;
                if frame.is_empty() {
                    vec![Vec::new()]
                } else {
                    frame
                        .into_branches()
                        .into_iter()
                        .map(|branch| branch.into_records().collect())
                        .collect()
                }
            }
            None => vec![Vec::new()],
        };

        let mut composed = Frame::empty();
        for wheres in where_branches {
            let branch = compose_branch(sources.clone(), wheres, aliases, ctx)?;
            composed = merge_or(composed, branch);
        }
        Ok(merge_or(composed, related))
    }
}

/// Sources with one OR branch of where records applied.
///
/// Where records typed by an enclosing query's alias stay with the sources
/// for that query to resolve; records of other explicit types come from
/// nested retrievals and become a branch of their own.
fn compose_branch(
    sources: Vec<DataRequirement>,
    wheres: Vec<DataRequirement>,
    aliases: &[String],
    ctx: &TraversalContext,
) -> DataRequirementsResult<Frame> {
    let resolved = apply_where(sources, &wheres)?;

    let mut carried = Vec::new();
    let mut others = Vec::new();
    for record in wheres {
        match record.data_type.as_deref() {
            Some(t) if aliases.iter().any(|alias| alias == t) => {}
            Some(t) if ctx.is_enclosing_alias(t) => carried.push(record),
            Some(_) => others.push(record),
            None => log::trace!("dropping untyped where constraint"),
        }
    }

    let distinct = resolved
        .iter()
        .map(|record| &record.data_type)
        .collect::<HashSet<_>>()
        .len()
        == resolved.len();
    let main = if distinct {
        Frame::of(group_union(resolved.into_iter().chain(carried))?)?
    } else {
        let per_source = resolved
            .into_iter()
            .map(Frame::single)
            .fold(Frame::empty(), merge_or);
        merge_or(per_source, Frame::of(group_union(carried)?)?)
    };
    Ok(merge_or(main, Frame::of(group_union(others)?)?))
}

// ============================================================================
// Frame builders
// ============================================================================

fn pair(frames: Vec<Frame>, operator: &str) -> DataRequirementsResult<(Frame, Frame)> {
    let [left, right]: [Frame; 2] = frames.try_into().map_err(|frames: Vec<Frame>| {
        DataRequirementsError::unsupported_shape(
            operator,
            format!("expected two operands, found {}", frames.len()),
        )
    })?;
    Ok((left, right))
}

/// Default combination of child frames by node shape
fn combine(arity: Arity, mut frames: Vec<Frame>) -> DataRequirementsResult<Frame> {
    match arity {
        _ if frames.is_empty() => Ok(Frame::empty()),
        Arity::Unary | Arity::Binary | Arity::Ternary => merge_frames(frames, true),
        Arity::Leaf | Arity::Nary | Arity::Structured if frames.len() == 1 => {
            Ok(frames.pop().unwrap_or_default())
        }
        Arity::Leaf | Arity::Nary | Arity::Structured => frames
            .into_iter()
            .map(|frame| without_empty_records(clear_constants(frame)))
            .try_fold(Frame::empty(), |acc, frame| merge_and(acc, frame?)),
    }
}

/// Drop records left with no type and no filters, and branches left empty
fn without_empty_records(frame: Frame) -> DataRequirementsResult<Frame> {
    let mut branches = Vec::new();
    for branch in frame.into_branches() {
        let map = RequirementMap::from_records(branch.into_records().filter(|r| !r.is_empty()))?;
        if !map.is_empty() {
            branches.push(map);
        }
    }
    Ok(Frame::from_branches(branches))
}

/// Remove the path-only filter a property-derived record carries
fn take_bare_path(record: &mut DataRequirement) -> Option<String> {
    if let Some(i) = record.code_filters.iter().position(CodeFilter::is_bare_path) {
        return record.code_filters.remove(i).path;
    }
    let i = record.date_filters.iter().position(DateFilter::is_bare_path)?;
    record.date_filters.remove(i).path
}

/// Literal value frame. Temporal literals without a date filter value
/// (`Time`, `Duration`) are dropped, like bound parameters of those types.
fn literal_frame(literal: &Literal) -> DataRequirementsResult<Frame> {
    let Some(value) = &literal.value else {
        return Ok(Frame::empty());
    };
    let type_name = local_name(&literal.value_type);
    if !is_temporal_type(type_name) {
        return Ok(bare_code_frame(vec![Coding::literal(value, type_name)]));
    }
    if !has_date_value(type_name) {
        log::warn!("{type_name} literal {value} has no date filter value; dropped");
        return Ok(Frame::empty());
    }
    Ok(bare_date_frame(parse_temporal(type_name, value)?, type_name))
}

fn terminology_frame(
    expr: &Expression,
    scope: Scope<'_, '_>,
) -> DataRequirementsResult<Frame> {
    Ok(match resolve_terminology(expr, scope)? {
        Some(Terminology::Codes(codes)) => bare_code_frame(codes),
        Some(Terminology::ValueSet(url)) => {
            Frame::single(DataRequirement::default().with_code_filter(CodeFilter::value_set(url)))
        }
        None => Frame::empty(),
    })
}

fn bare_code_frame(codes: Vec<Coding>) -> Frame {
    Frame::single(DataRequirement::default().with_code_filter(CodeFilter {
        codes,
        ..CodeFilter::default()
    }))
}

fn bare_date_frame(value: TemporalValue, type_name: &str) -> Frame {
    Frame::single(DataRequirement::default().with_date_filter(DateFilter::literal(value, type_name)))
}

/// Codes of a list whose elements are all bare literal codes
fn bare_codes(frames: &[Frame]) -> Option<Vec<Coding>> {
    if frames.is_empty() {
        return None;
    }
    let mut codes = Vec::new();
    for frame in frames {
        let record = frame.as_single_record("List").ok()??;
        let [filter] = record.code_filters.as_slice() else {
            return None;
        };
        if record.data_type.is_some()
            || !record.date_filters.is_empty()
            || filter.path.is_some()
            || filter.value_set.is_some()
            || filter.codes.is_empty()
        {
            return None;
        }
        codes.extend(filter.codes.iter().cloned());
    }
    Some(codes)
}

fn integer_literal(expr: &Expression) -> Option<i64> {
    match expr {
        Expression::Literal(literal) => literal.value.as_deref()?.parse().ok(),
        _ => None,
    }
}

fn decimal_literal(expr: &Expression) -> Option<f64> {
    match expr {
        Expression::Literal(literal) => literal.value.as_deref()?.parse().ok(),
        Expression::Negate(e) => decimal_literal(&e.operand).map(|v| -v),
        _ => None,
    }
}

/// Value of a `Date`/`DateTime` constructor built from literal components
fn constructor_value(ctor: &DateTimeExpression) -> Option<PartialDateTime> {
    let parts = [
        Some(ctor.year.as_ref()),
        ctor.month.as_deref(),
        ctor.day.as_deref(),
        ctor.hour.as_deref(),
        ctor.minute.as_deref(),
        ctor.second.as_deref(),
        ctor.millisecond.as_deref(),
    ];
    let components = parts
        .into_iter()
        .map_while(std::convert::identity)
        .map(integer_literal)
        .collect::<Option<Vec<i64>>>()?;
    let offset = match ctor.timezone_offset.as_deref() {
        Some(expr) => Some(decimal_literal(expr)?),
        None => None,
    };
    PartialDateTime::from_components(&components, offset).ok()
}

fn temporal_bound(expr: Option<&Expression>) -> Option<Option<PartialDateTime>> {
    match expr {
        None | Some(Expression::Null(_)) => Some(None),
        Some(Expression::Literal(literal)) if is_temporal_type(local_name(&literal.value_type)) => {
            PartialDateTime::parse(literal.value.as_deref()?).ok().map(Some)
        }
        Some(Expression::Date(ctor) | Expression::DateTime(ctor)) => {
            constructor_value(ctor).map(Some)
        }
        Some(_) => None,
    }
}

/// Period of an interval whose bounds are temporal literals
fn literal_period(interval: &IntervalExpression) -> Option<Period> {
    let start = temporal_bound(interval.low.as_deref())?;
    let end = temporal_bound(interval.high.as_deref())?;
    if start.is_none() && end.is_none() {
        return None;
    }
    Some(Period { start, end })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::AnalyzerOptions;
    use crate::resolver::LibraryRegistry;
    use octofhir_cql_elm::{
        AliasedQuerySource, ExpressionDef, Library, ListExpression, Retrieve, UnaryExpression,
    };
    use pretty_assertions::assert_eq;

    fn analyze(where_clause: Expression) -> DataRequirementsResult<Vec<DataRequirement>> {
        let query = Query::new(
            AliasedQuerySource::new(
                "O",
                Expression::Retrieve(Retrieve::new("{http://hl7.org/fhir}Observation")),
            ),
            Some(where_clause),
        );
        let library =
            Library::new("Test", None).with_expression(ExpressionDef::new("Q", Expression::Query(query)));
        let registry = LibraryRegistry::new();
        let mut analyzer = DataRequirementsAnalyzer::new(&registry, AnalyzerOptions::default());
        analyzer.data_requirements(&library, "Q")
    }

    fn status() -> Expression {
        Expression::Property(Property::scoped("O", "status", "{http://hl7.org/fhir}ObservationStatus"))
    }

    #[test]
    fn test_list_of_literals_binds_all_codes() {
        let list = Expression::List(ListExpression::new(vec![
            Expression::Literal(Literal::string("final")),
            Expression::Literal(Literal::string("amended")),
        ]));
        let records = analyze(Expression::In(BinaryExpression::new(status(), list))).unwrap();
        let codes: Vec<_> = records[0].code_filters[0]
            .codes
            .iter()
            .map(|c| c.code.as_str())
            .collect();
        assert_eq!(codes, vec!["final", "amended"]);
    }

    #[test]
    fn test_arithmetic_strips_literal() {
        let value = Expression::Property(Property::scoped("O", "value", "Quantity"));
        let sum = Expression::Add(BinaryExpression::new(
            value,
            Expression::Literal(Literal::integer(1)),
        ));
        let records = analyze(Expression::Greater(BinaryExpression::new(
            sum,
            Expression::Literal(Literal::integer(5)),
        )))
        .unwrap();
        let filter = &records[0].code_filters[0];
        assert_eq!(filter.path.as_deref(), Some("value"));
        assert!(filter.codes.is_empty());
    }

    #[test]
    fn test_temporal_literal_binds_date_filter() {
        let records = analyze(Expression::Equal(BinaryExpression::new(
            Expression::Property(Property::scoped("O", "effective", "dateTime")),
            Expression::Literal(Literal::system("Date", "2019-01-01")),
        )))
        .unwrap();
        assert!(records[0].code_filters.is_empty());
        assert_eq!(records[0].date_filters[0].path.as_deref(), Some("effective"));
        assert!(records[0].date_filters[0].value.is_some());
    }

    #[test]
    fn test_instant_path_stays_categorical() {
        let issued =
            Expression::Property(Property::scoped("O", "issued", "{http://hl7.org/fhir}instant"));
        let records = analyze(Expression::Not(UnaryExpression::new(Expression::IsNull(
            UnaryExpression::new(issued),
        ))))
        .unwrap();
        assert_eq!(records[0].code_filters[0].path.as_deref(), Some("issued"));
        assert!(records[0].date_filters.is_empty());
    }

    #[test]
    fn test_literal_interval_becomes_period() {
        let interval = IntervalExpression::new(
            Expression::Date(DateTimeExpression::from_components(&[2019, 1, 1])),
            Expression::Literal(Literal::system("Date", "2020-01-01")),
            true,
            false,
        );
        let period = literal_period(&interval).unwrap();
        assert_eq!(period.start.unwrap().as_str(), "2019-01-01");
        assert_eq!(period.end.unwrap().as_str(), "2020-01-01");
    }

    #[test]
    fn test_coalesced_literal_does_not_block_comparison() {
        let coalesce = Expression::Coalesce(octofhir_cql_elm::NaryExpression {
            element: Default::default(),
            operand: vec![Box::new(status()), Box::new(Expression::Literal(Literal::string("x")))],
        });
        let records = analyze(Expression::Equal(BinaryExpression::new(
            coalesce,
            Expression::Literal(Literal::string("final")),
        )))
        .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].code_filters[0].path.as_deref(), Some("status"));
    }

    #[test]
    fn test_pair_requires_two_operands() {
        assert!(matches!(
            pair(vec![Frame::empty()], "Or"),
            Err(DataRequirementsError::UnsupportedShape { .. })
        ));
    }
}
