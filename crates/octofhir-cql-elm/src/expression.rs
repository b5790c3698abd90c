//! ELM expression nodes
//!
//! `Expression` is a single internally tagged enum over the node kinds the
//! CQL-to-ELM translator emits. Operator nodes share a handful of shapes
//! (unary, binary, ternary, n-ary, aggregate); nodes with named fields get
//! their own structs. [`Expression::children`] and [`Expression::arity`]
//! give a uniform view for tree walkers.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{system_type, Element, TypeSpecifier};

// ============================================================================
// Expression
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Expression {
    // === Literals and selectors ===
    Null(NullLiteral),
    Literal(Literal),
    Quantity(Quantity),
    Ratio(Ratio),
    Code(CodeLiteral),
    Concept(ConceptLiteral),
    Tuple(TupleExpression),
    Instance(InstanceExpression),
    List(ListExpression),
    Interval(IntervalExpression),
    Date(DateTimeExpression),
    DateTime(DateTimeExpression),
    Time(TimeExpression),
    Now(Element),
    Today(Element),
    TimeOfDay(Element),
    MinValue(TypedValue),
    MaxValue(TypedValue),

    // === References ===
    ExpressionRef(ExpressionRef),
    FunctionRef(FunctionRef),
    ParameterRef(ParameterRef),
    ValueSetRef(ValueSetRef),
    CodeSystemRef(CodeSystemRef),
    CodeRef(CodeRef),
    ConceptRef(ConceptRef),
    OperandRef(IdentifierRef),
    AliasRef(IdentifierRef),
    QueryLetRef(IdentifierRef),
    IdentifierRef(IdentifierRef),
    Property(Property),
    Current(ScopedRef),
    Iteration(ScopedRef),
    Total(ScopedRef),

    // === Logical ===
    And(BinaryExpression),
    Or(BinaryExpression),
    Xor(BinaryExpression),
    Implies(BinaryExpression),
    Not(UnaryExpression),

    // === Nullological ===
    IsNull(UnaryExpression),
    IsTrue(UnaryExpression),
    IsFalse(UnaryExpression),
    Coalesce(NaryExpression),

    // === Comparison ===
    Equal(BinaryExpression),
    Equivalent(BinaryExpression),
    NotEqual(BinaryExpression),
    Less(BinaryExpression),
    Greater(BinaryExpression),
    LessOrEqual(BinaryExpression),
    GreaterOrEqual(BinaryExpression),

    // === Arithmetic ===
    Add(BinaryExpression),
    Subtract(BinaryExpression),
    Multiply(BinaryExpression),
    Divide(BinaryExpression),
    TruncatedDivide(BinaryExpression),
    Modulo(BinaryExpression),
    Power(BinaryExpression),
    Log(BinaryExpression),
    Negate(UnaryExpression),
    Abs(UnaryExpression),
    Ceiling(UnaryExpression),
    Floor(UnaryExpression),
    Truncate(UnaryExpression),
    Exp(UnaryExpression),
    Ln(UnaryExpression),
    Predecessor(UnaryExpression),
    Successor(UnaryExpression),
    Precision(UnaryExpression),
    Round(RoundExpression),

    // === String ===
    Concatenate(NaryExpression),
    Combine(CombineExpression),
    Split(SplitExpression),
    Length(UnaryExpression),
    Upper(UnaryExpression),
    Lower(UnaryExpression),
    Indexer(BinaryExpression),
    PositionOf(PositionOfExpression),
    LastPositionOf(PositionOfExpression),
    Substring(SubstringExpression),
    StartsWith(BinaryExpression),
    EndsWith(BinaryExpression),
    Matches(BinaryExpression),
    ReplaceMatches(TernaryExpression),
    SplitOnMatches(SplitOnMatchesExpression),

    // === Date and time ===
    DateFrom(UnaryExpression),
    TimeFrom(UnaryExpression),
    TimezoneOffsetFrom(UnaryExpression),
    DateTimeComponentFrom(DateTimeComponentFrom),
    DurationBetween(BinaryExpression),
    DifferenceBetween(BinaryExpression),
    SameAs(BinaryExpression),
    SameOrBefore(BinaryExpression),
    SameOrAfter(BinaryExpression),
    CalculateAge(CalculateAge),
    CalculateAgeAt(BinaryExpression),

    // === Interval ===
    Start(UnaryExpression),
    End(UnaryExpression),
    Width(UnaryExpression),
    Size(UnaryExpression),
    PointFrom(UnaryExpression),
    Collapse(BinaryExpression),
    Expand(BinaryExpression),
    Contains(BinaryExpression),
    In(BinaryExpression),
    Includes(BinaryExpression),
    IncludedIn(BinaryExpression),
    ProperContains(BinaryExpression),
    ProperIn(BinaryExpression),
    ProperIncludes(BinaryExpression),
    ProperIncludedIn(BinaryExpression),
    Before(BinaryExpression),
    After(BinaryExpression),
    Meets(BinaryExpression),
    MeetsBefore(BinaryExpression),
    MeetsAfter(BinaryExpression),
    Overlaps(BinaryExpression),
    OverlapsBefore(BinaryExpression),
    OverlapsAfter(BinaryExpression),
    Starts(BinaryExpression),
    Ends(BinaryExpression),
    HighBoundary(BinaryExpression),
    LowBoundary(BinaryExpression),
    Union(NaryExpression),
    Intersect(NaryExpression),
    Except(NaryExpression),

    // === List ===
    Exists(UnaryExpression),
    SingletonFrom(UnaryExpression),
    Distinct(UnaryExpression),
    Flatten(UnaryExpression),
    First(FirstLastExpression),
    Last(FirstLastExpression),
    IndexOf(IndexOfExpression),
    Slice(SliceExpression),
    Filter(FilterExpression),
    ForEach(ForEachExpression),
    Repeat(ForEachExpression),
    Times(BinaryExpression),
    Sort(SortExpression),
    Children(SourceExpression),
    Descendents(SourceExpression),

    // === Aggregate ===
    Count(AggregateExpression),
    Sum(AggregateExpression),
    Min(AggregateExpression),
    Max(AggregateExpression),
    Avg(AggregateExpression),
    Median(AggregateExpression),
    Mode(AggregateExpression),
    Variance(AggregateExpression),
    PopulationVariance(AggregateExpression),
    StdDev(AggregateExpression),
    PopulationStdDev(AggregateExpression),
    AllTrue(AggregateExpression),
    AnyTrue(AggregateExpression),
    Product(AggregateExpression),
    GeometricMean(AggregateExpression),
    Aggregate(AggregateFold),

    // === Type operators ===
    As(AsExpression),
    Is(IsExpression),
    Convert(ConvertExpression),
    CanConvert(ConvertExpression),
    ConvertQuantity(BinaryExpression),
    CanConvertQuantity(BinaryExpression),
    ToBoolean(UnaryExpression),
    ToChars(UnaryExpression),
    ToConcept(UnaryExpression),
    ToDate(UnaryExpression),
    ToDateTime(UnaryExpression),
    ToDecimal(UnaryExpression),
    ToInteger(UnaryExpression),
    ToLong(UnaryExpression),
    ToQuantity(UnaryExpression),
    ToRatio(UnaryExpression),
    ToString(UnaryExpression),
    ToTime(UnaryExpression),
    ToList(UnaryExpression),
    ConvertsToBoolean(UnaryExpression),
    ConvertsToDate(UnaryExpression),
    ConvertsToDateTime(UnaryExpression),
    ConvertsToDecimal(UnaryExpression),
    ConvertsToInteger(UnaryExpression),
    ConvertsToLong(UnaryExpression),
    ConvertsToQuantity(UnaryExpression),
    ConvertsToRatio(UnaryExpression),
    ConvertsToString(UnaryExpression),
    ConvertsToTime(UnaryExpression),

    // === Conditional ===
    If(IfExpression),
    Case(CaseExpression),

    // === Clinical ===
    InValueSet(InValueSet),
    AnyInValueSet(AnyInValueSet),
    InCodeSystem(InCodeSystem),
    AnyInCodeSystem(AnyInCodeSystem),
    ExpandValueSet(UnaryExpression),
    Subsumes(BinaryExpression),
    SubsumedBy(BinaryExpression),

    // === Queries ===
    Query(Query),
    Retrieve(Retrieve),

    // === Errors ===
    Message(MessageExpression),
}

/// Operand shape of a node, as seen by generic tree walkers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// No child expressions
    Leaf,
    Unary,
    Binary,
    Ternary,
    /// Operand list of any length (`Coalesce`, `Union`, `Concatenate`)
    Nary,
    /// Named child fields (selectors, queries, list operators)
    Structured,
}

fn each(operands: &[Box<Expression>]) -> Vec<&Expression> {
    operands.iter().map(AsRef::as_ref).collect()
}

fn present<'a>(fields: &[&'a Option<Box<Expression>>]) -> Vec<&'a Expression> {
    fields.iter().filter_map(|field| Option::as_deref(*field)).collect()
}

impl Expression {
    /// Operand shape of this node
    pub fn arity(&self) -> Arity {
        self.parts().0
    }

    /// Direct child expressions in ELM field order
    pub fn children(&self) -> Vec<&Expression> {
        self.parts().1
    }

    /// Node element header
    pub fn element(&self) -> Option<&Element> {
        match self {
            Self::Literal(e) => Some(&e.element),
            Self::Property(e) => Some(&e.element),
            Self::ParameterRef(e) => Some(&e.element),
            Self::ExpressionRef(e) => Some(&e.element),
            Self::FunctionRef(e) => Some(&e.element),
            Self::Retrieve(e) => Some(&e.element),
            Self::Query(e) => Some(&e.element),
            _ => None,
        }
    }

    fn parts(&self) -> (Arity, Vec<&Expression>) {
        match self {
            Self::Null(_)
            | Self::Literal(_)
            | Self::Quantity(_)
            | Self::Ratio(_)
            | Self::Code(_)
            | Self::Concept(_)
            | Self::Now(_)
            | Self::Today(_)
            | Self::TimeOfDay(_)
            | Self::MinValue(_)
            | Self::MaxValue(_)
            | Self::ExpressionRef(_)
            | Self::ParameterRef(_)
            | Self::ValueSetRef(_)
            | Self::CodeSystemRef(_)
            | Self::CodeRef(_)
            | Self::ConceptRef(_)
            | Self::OperandRef(_)
            | Self::AliasRef(_)
            | Self::QueryLetRef(_)
            | Self::IdentifierRef(_)
            | Self::Current(_)
            | Self::Iteration(_)
            | Self::Total(_)
            | Self::Retrieve(_) => (Arity::Leaf, Vec::new()),

            Self::Not(e)
            | Self::IsNull(e)
            | Self::IsTrue(e)
            | Self::IsFalse(e)
            | Self::Negate(e)
            | Self::Abs(e)
            | Self::Ceiling(e)
            | Self::Floor(e)
            | Self::Truncate(e)
            | Self::Exp(e)
            | Self::Ln(e)
            | Self::Predecessor(e)
            | Self::Successor(e)
            | Self::Precision(e)
            | Self::Length(e)
            | Self::Upper(e)
            | Self::Lower(e)
            | Self::DateFrom(e)
            | Self::TimeFrom(e)
            | Self::TimezoneOffsetFrom(e)
            | Self::Start(e)
            | Self::End(e)
            | Self::Width(e)
            | Self::Size(e)
            | Self::PointFrom(e)
            | Self::Exists(e)
            | Self::SingletonFrom(e)
            | Self::Distinct(e)
            | Self::Flatten(e)
            | Self::ToBoolean(e)
            | Self::ToChars(e)
            | Self::ToConcept(e)
            | Self::ToDate(e)
            | Self::ToDateTime(e)
            | Self::ToDecimal(e)
            | Self::ToInteger(e)
            | Self::ToLong(e)
            | Self::ToQuantity(e)
            | Self::ToRatio(e)
            | Self::ToString(e)
            | Self::ToTime(e)
            | Self::ToList(e)
            | Self::ConvertsToBoolean(e)
            | Self::ConvertsToDate(e)
            | Self::ConvertsToDateTime(e)
            | Self::ConvertsToDecimal(e)
            | Self::ConvertsToInteger(e)
            | Self::ConvertsToLong(e)
            | Self::ConvertsToQuantity(e)
            | Self::ConvertsToRatio(e)
            | Self::ConvertsToString(e)
            | Self::ConvertsToTime(e)
            | Self::ExpandValueSet(e) => (Arity::Unary, vec![e.operand.as_ref()]),
            Self::DateTimeComponentFrom(e) => (Arity::Unary, vec![e.operand.as_ref()]),
            Self::CalculateAge(e) => (Arity::Unary, vec![e.operand.as_ref()]),
            Self::As(e) => (Arity::Unary, vec![e.operand.as_ref()]),
            Self::Is(e) => (Arity::Unary, vec![e.operand.as_ref()]),
            Self::Convert(e) | Self::CanConvert(e) => (Arity::Unary, vec![e.operand.as_ref()]),
            Self::Children(e) | Self::Descendents(e) => (Arity::Unary, vec![e.source.as_ref()]),

            Self::And(e)
            | Self::Or(e)
            | Self::Xor(e)
            | Self::Implies(e)
            | Self::Equal(e)
            | Self::Equivalent(e)
            | Self::NotEqual(e)
            | Self::Less(e)
            | Self::Greater(e)
            | Self::LessOrEqual(e)
            | Self::GreaterOrEqual(e)
            | Self::Add(e)
            | Self::Subtract(e)
            | Self::Multiply(e)
            | Self::Divide(e)
            | Self::TruncatedDivide(e)
            | Self::Modulo(e)
            | Self::Power(e)
            | Self::Log(e)
            | Self::Indexer(e)
            | Self::StartsWith(e)
            | Self::EndsWith(e)
            | Self::Matches(e)
            | Self::DurationBetween(e)
            | Self::DifferenceBetween(e)
            | Self::SameAs(e)
            | Self::SameOrBefore(e)
            | Self::SameOrAfter(e)
            | Self::CalculateAgeAt(e)
            | Self::Collapse(e)
            | Self::Expand(e)
            | Self::Contains(e)
            | Self::In(e)
            | Self::Includes(e)
            | Self::IncludedIn(e)
            | Self::ProperContains(e)
            | Self::ProperIn(e)
            | Self::ProperIncludes(e)
            | Self::ProperIncludedIn(e)
            | Self::Before(e)
            | Self::After(e)
            | Self::Meets(e)
            | Self::MeetsBefore(e)
            | Self::MeetsAfter(e)
            | Self::Overlaps(e)
            | Self::OverlapsBefore(e)
            | Self::OverlapsAfter(e)
            | Self::Starts(e)
            | Self::Ends(e)
            | Self::Times(e)
            | Self::HighBoundary(e)
            | Self::LowBoundary(e)
            | Self::ConvertQuantity(e)
            | Self::CanConvertQuantity(e)
            | Self::Subsumes(e)
            | Self::SubsumedBy(e) => (Arity::Binary, each(&e.operand)),

            Self::ReplaceMatches(e) => (Arity::Ternary, each(&e.operand)),

            Self::Coalesce(e)
            | Self::Concatenate(e)
            | Self::Union(e)
            | Self::Intersect(e)
            | Self::Except(e) => (Arity::Nary, each(&e.operand)),

            Self::Count(e)
            | Self::Sum(e)
            | Self::Min(e)
            | Self::Max(e)
            | Self::Avg(e)
            | Self::Median(e)
            | Self::Mode(e)
            | Self::Variance(e)
            | Self::PopulationVariance(e)
            | Self::StdDev(e)
            | Self::PopulationStdDev(e)
            | Self::AllTrue(e)
            | Self::AnyTrue(e)
            | Self::Product(e)
            | Self::GeometricMean(e) => (Arity::Unary, vec![e.source.as_ref()]),

            Self::FunctionRef(e) => (Arity::Nary, each(&e.operand)),
            Self::Property(e) => match &e.source {
                Some(source) => (Arity::Unary, vec![source.as_ref()]),
                None => (Arity::Leaf, Vec::new()),
            },
            Self::Tuple(e) => (
                Arity::Structured,
                e.element.iter().map(|el| el.value.as_ref()).collect(),
            ),
            Self::Instance(e) => (
                Arity::Structured,
                e.element.iter().map(|el| el.value.as_ref()).collect(),
            ),
            Self::List(e) => (Arity::Structured, each(&e.element)),
            Self::Interval(e) => (
                Arity::Structured,
                present(&[
                    &e.low,
                    &e.low_closed_expression,
                    &e.high,
                    &e.high_closed_expression,
                ]),
            ),
            Self::Date(e) | Self::DateTime(e) => (Arity::Structured, e.components()),
            Self::Time(e) => {
                let mut parts = vec![e.hour.as_ref()];
                parts.extend(present(&[&e.minute, &e.second, &e.millisecond]));
                (Arity::Structured, parts)
            }
            Self::Round(e) => {
                let mut parts = vec![e.operand.as_ref()];
                parts.extend(present(&[&e.precision]));
                (Arity::Structured, parts)
            }
            Self::Combine(e) => {
                let mut parts = vec![e.source.as_ref()];
                parts.extend(present(&[&e.separator]));
                (Arity::Structured, parts)
            }
            Self::Split(e) => {
                let mut parts = vec![e.string_to_split.as_ref()];
                parts.extend(present(&[&e.separator]));
                (Arity::Structured, parts)
            }
            Self::SplitOnMatches(e) => (
                Arity::Structured,
                vec![e.string_to_split.as_ref(), e.separator_pattern.as_ref()],
            ),
            Self::PositionOf(e) | Self::LastPositionOf(e) => {
                (Arity::Structured, vec![e.pattern.as_ref(), e.string.as_ref()])
            }
            Self::Substring(e) => {
                let mut parts = vec![e.string_to_sub.as_ref(), e.start_index.as_ref()];
                parts.extend(present(&[&e.length]));
                (Arity::Structured, parts)
            }
            Self::First(e) | Self::Last(e) => (Arity::Structured, vec![e.source.as_ref()]),
            Self::IndexOf(e) => (Arity::Structured, vec![e.source.as_ref(), e.element.as_ref()]),
            Self::Slice(e) => {
                let mut parts = vec![e.source.as_ref()];
                parts.extend(present(&[&e.start_index, &e.end_index]));
                (Arity::Structured, parts)
            }
            Self::Filter(e) => (Arity::Structured, vec![e.source.as_ref(), e.condition.as_ref()]),
            Self::Sort(e) => {
                let mut parts = vec![e.source.as_ref()];
                parts.extend(e.by.iter().filter_map(|item| item.expression.as_deref()));
                (Arity::Structured, parts)
            }
            Self::Aggregate(e) => {
                let mut parts = vec![e.source.as_ref()];
                parts.extend(present(&[&e.initial_value]));
                parts.push(e.iteration.as_ref());
                (Arity::Structured, parts)
            }
            Self::ForEach(e) | Self::Repeat(e) => {
                (Arity::Structured, vec![e.source.as_ref(), e.element.as_ref()])
            }
            Self::If(e) => (
                Arity::Structured,
                vec![e.condition.as_ref(), e.then.as_ref(), e.else_clause.as_ref()],
            ),
            Self::Case(e) => {
                let mut parts = present(&[&e.comparand]);
                for item in &e.case_item {
                    parts.push(item.when.as_ref());
                    parts.push(item.then.as_ref());
                }
                parts.push(e.else_clause.as_ref());
                (Arity::Structured, parts)
            }
            Self::InValueSet(e) => {
                let mut parts = vec![e.code.as_ref()];
                parts.extend(present(&[&e.valueset_expression]));
                (Arity::Structured, parts)
            }
            Self::AnyInValueSet(e) => {
                let mut parts = vec![e.codes.as_ref()];
                parts.extend(present(&[&e.valueset_expression]));
                (Arity::Structured, parts)
            }
            Self::InCodeSystem(e) => {
                let mut parts = vec![e.code.as_ref()];
                parts.extend(present(&[&e.codesystem_expression]));
                (Arity::Structured, parts)
            }
            Self::AnyInCodeSystem(e) => {
                let mut parts = vec![e.codes.as_ref()];
                parts.extend(present(&[&e.codesystem_expression]));
                (Arity::Structured, parts)
            }
            Self::Query(e) => (Arity::Structured, e.children()),
            Self::Message(e) => {
                let mut parts = vec![e.source.as_ref()];
                parts.extend(present(&[&e.condition, &e.code, &e.severity, &e.message]));
                (Arity::Structured, parts)
            }
        }
    }
}

// ============================================================================
// Operator shapes
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnaryExpression {
    #[serde(flatten)]
    pub element: Element,
    pub operand: Box<Expression>,
}

impl UnaryExpression {
    pub fn new(operand: Expression) -> Self {
        Self {
            element: Element::default(),
            operand: Box::new(operand),
        }
    }
}

/// Two-operand node; timing operators may carry a precision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryExpression {
    #[serde(flatten)]
    pub element: Element,
    pub operand: Vec<Box<Expression>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precision: Option<String>,
}

impl BinaryExpression {
    pub fn new(left: Expression, right: Expression) -> Self {
        Self {
            element: Element::default(),
            operand: vec![Box::new(left), Box::new(right)],
            precision: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TernaryExpression {
    #[serde(flatten)]
    pub element: Element,
    pub operand: Vec<Box<Expression>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NaryExpression {
    #[serde(flatten)]
    pub element: Element,
    #[serde(default)]
    pub operand: Vec<Box<Expression>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateExpression {
    #[serde(flatten)]
    pub element: Element,
    pub source: Box<Expression>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// `Aggregate` fold: `aggregate R starting X: <iteration>`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateFold {
    #[serde(flatten)]
    pub element: Element,
    pub source: Box<Expression>,
    pub iteration: Box<Expression>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_value: Option<Box<Expression>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Node whose only child is a `source` (`Children`, `Descendents`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceExpression {
    #[serde(flatten)]
    pub element: Element,
    pub source: Box<Expression>,
}

impl SourceExpression {
    pub fn new(source: Expression) -> Self {
        Self {
            element: Element::default(),
            source: Box::new(source),
        }
    }
}

// ============================================================================
// Literals and selectors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NullLiteral {
    #[serde(flatten)]
    pub element: Element,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Literal {
    #[serde(flatten)]
    pub element: Element,
    /// Qualified value type, e.g. `{urn:hl7-org:elm-types:r1}String`
    pub value_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl Literal {
    /// Literal of a system type (`String`, `Integer`, `DateTime`, ...)
    pub fn system(type_name: &str, value: impl Into<String>) -> Self {
        Self {
            element: Element::default(),
            value_type: system_type(type_name),
            value: Some(value.into()),
        }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::system("String", value)
    }

    pub fn integer(value: i64) -> Self {
        Self::system("Integer", value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    #[serde(flatten)]
    pub element: Element,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ratio {
    #[serde(flatten)]
    pub element: Element,
    pub numerator: Quantity,
    pub denominator: Quantity,
}

/// Code selector (`Code '123' from "LOINC"`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeLiteral {
    #[serde(flatten)]
    pub element: Element,
    pub system: CodeSystemRef,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptLiteral {
    #[serde(flatten)]
    pub element: Element,
    #[serde(default)]
    pub code: Vec<CodeLiteral>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TupleExpression {
    #[serde(flatten)]
    pub header: Element,
    #[serde(default)]
    pub element: Vec<TupleElement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TupleElement {
    pub name: String,
    pub value: Box<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceExpression {
    #[serde(flatten)]
    pub header: Element,
    pub class_type: String,
    #[serde(default)]
    pub element: Vec<TupleElement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListExpression {
    #[serde(flatten)]
    pub header: Element,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_specifier: Option<TypeSpecifier>,
    #[serde(default)]
    pub element: Vec<Box<Expression>>,
}

impl ListExpression {
    pub fn new(elements: Vec<Expression>) -> Self {
        Self {
            header: Element::default(),
            type_specifier: None,
            element: elements.into_iter().map(Box::new).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntervalExpression {
    #[serde(flatten)]
    pub element: Element,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low: Option<Box<Expression>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low_closed_expression: Option<Box<Expression>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high: Option<Box<Expression>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high_closed_expression: Option<Box<Expression>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low_closed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high_closed: Option<bool>,
}

impl IntervalExpression {
    /// Interval with literal closedness flags
    pub fn new(low: Expression, high: Expression, low_closed: bool, high_closed: bool) -> Self {
        Self {
            element: Element::default(),
            low: Some(Box::new(low)),
            low_closed_expression: None,
            high: Some(Box::new(high)),
            high_closed_expression: None,
            low_closed: Some(low_closed),
            high_closed: Some(high_closed),
        }
    }
}

/// `Date` and `DateTime` constructors; a `Date` never sets time fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateTimeExpression {
    #[serde(flatten)]
    pub element: Element,
    pub year: Box<Expression>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month: Option<Box<Expression>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day: Option<Box<Expression>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hour: Option<Box<Expression>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minute: Option<Box<Expression>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub second: Option<Box<Expression>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub millisecond: Option<Box<Expression>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone_offset: Option<Box<Expression>>,
}

impl DateTimeExpression {
    /// Constructor from integer components, most significant first
    pub fn from_components(components: &[i64]) -> Self {
        let part = |i: usize| {
            components
                .get(i)
                .map(|v| Box::new(Expression::Literal(Literal::integer(*v))))
        };
        Self {
            element: Element::default(),
            year: Box::new(Expression::Literal(Literal::integer(
                components.first().copied().unwrap_or_default(),
            ))),
            month: part(1),
            day: part(2),
            hour: part(3),
            minute: part(4),
            second: part(5),
            millisecond: part(6),
            timezone_offset: None,
        }
    }

    /// Present component expressions, most significant first.
    /// The timezone offset, when present, comes last.
    pub fn components(&self) -> Vec<&Expression> {
        let mut parts = vec![self.year.as_ref()];
        parts.extend(present(&[
            &self.month,
            &self.day,
            &self.hour,
            &self.minute,
            &self.second,
            &self.millisecond,
            &self.timezone_offset,
        ]));
        parts
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeExpression {
    #[serde(flatten)]
    pub element: Element,
    pub hour: Box<Expression>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minute: Option<Box<Expression>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub second: Option<Box<Expression>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub millisecond: Option<Box<Expression>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedValue {
    #[serde(flatten)]
    pub element: Element,
    pub value_type: String,
}

// ============================================================================
// References
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpressionRef {
    #[serde(flatten)]
    pub element: Element,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionRef {
    #[serde(flatten)]
    pub element: Element,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library_name: Option<String>,
    #[serde(default)]
    pub operand: Vec<Box<Expression>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterRef {
    #[serde(flatten)]
    pub element: Element,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueSetRef {
    #[serde(flatten)]
    pub element: Element,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preserve: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeSystemRef {
    #[serde(flatten)]
    pub element: Element,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeRef {
    #[serde(flatten)]
    pub element: Element,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptRef {
    #[serde(flatten)]
    pub element: Element,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library_name: Option<String>,
}

macro_rules! named_ref_ctor {
    ($($ty:ident),*) => {
        $(
            impl $ty {
                /// Reference to a definition in the current library
                pub fn local(name: impl Into<String>) -> Self {
                    Self {
                        element: Element::default(),
                        name: name.into(),
                        library_name: None,
                    }
                }

                /// Reference through an include alias
                pub fn qualified(library: impl Into<String>, name: impl Into<String>) -> Self {
                    Self {
                        element: Element::default(),
                        name: name.into(),
                        library_name: Some(library.into()),
                    }
                }
            }
        )*
    };
}

named_ref_ctor!(ExpressionRef, ParameterRef, CodeSystemRef, CodeRef, ConceptRef);

impl ValueSetRef {
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            element: Element::default(),
            name: name.into(),
            library_name: None,
            preserve: None,
        }
    }

    pub fn qualified(library: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            library_name: Some(library.into()),
            ..Self::local(name)
        }
    }
}

/// Alias, operand, let and identifier references
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifierRef {
    #[serde(flatten)]
    pub element: Element,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library_name: Option<String>,
}

impl IdentifierRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            element: Element::default(),
            name: name.into(),
            library_name: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopedRef {
    #[serde(flatten)]
    pub element: Element,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Property access (`O.status`), either scoped to an alias or on a source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    #[serde(flatten)]
    pub element: Element,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Box<Expression>>,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl Property {
    /// `scope.path` access with a declared result type
    pub fn scoped(scope: &str, path: &str, result_type_name: &str) -> Self {
        Self {
            element: Element::typed(result_type_name),
            source: None,
            path: path.to_string(),
            scope: Some(scope.to_string()),
        }
    }

    /// `source.path` access with a declared result type
    pub fn on(source: Expression, path: &str, result_type_name: &str) -> Self {
        Self {
            element: Element::typed(result_type_name),
            source: Some(Box::new(source)),
            path: path.to_string(),
            scope: None,
        }
    }
}

// ============================================================================
// Structured operators
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundExpression {
    #[serde(flatten)]
    pub element: Element,
    pub operand: Box<Expression>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precision: Option<Box<Expression>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombineExpression {
    #[serde(flatten)]
    pub element: Element,
    pub source: Box<Expression>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub separator: Option<Box<Expression>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitExpression {
    #[serde(flatten)]
    pub element: Element,
    pub string_to_split: Box<Expression>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub separator: Option<Box<Expression>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitOnMatchesExpression {
    #[serde(flatten)]
    pub element: Element,
    pub string_to_split: Box<Expression>,
    pub separator_pattern: Box<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionOfExpression {
    #[serde(flatten)]
    pub element: Element,
    pub pattern: Box<Expression>,
    pub string: Box<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubstringExpression {
    #[serde(flatten)]
    pub element: Element,
    pub string_to_sub: Box<Expression>,
    pub start_index: Box<Expression>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<Box<Expression>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateTimeComponentFrom {
    #[serde(flatten)]
    pub element: Element,
    pub operand: Box<Expression>,
    pub precision: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculateAge {
    #[serde(flatten)]
    pub element: Element,
    pub operand: Box<Expression>,
    pub precision: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirstLastExpression {
    #[serde(flatten)]
    pub element: Element,
    pub source: Box<Expression>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexOfExpression {
    #[serde(flatten)]
    pub header: Element,
    pub source: Box<Expression>,
    pub element: Box<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SliceExpression {
    #[serde(flatten)]
    pub element: Element,
    pub source: Box<Expression>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_index: Option<Box<Expression>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_index: Option<Box<Expression>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterExpression {
    #[serde(flatten)]
    pub element: Element,
    pub source: Box<Expression>,
    pub condition: Box<Expression>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// `Sort` list operator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortExpression {
    #[serde(flatten)]
    pub element: Element,
    pub source: Box<Expression>,
    #[serde(default)]
    pub by: Vec<SortByItem>,
}

/// `ByDirection`, `ByColumn` or `ByExpression` sort key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortByItem {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<Box<Expression>>,
}

/// `ForEach` and `Repeat`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForEachExpression {
    #[serde(flatten)]
    pub header: Element,
    pub source: Box<Expression>,
    pub element: Box<Expression>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsExpression {
    #[serde(flatten)]
    pub element: Element,
    pub operand: Box<Expression>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub as_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub as_type_specifier: Option<TypeSpecifier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IsExpression {
    #[serde(flatten)]
    pub element: Element,
    pub operand: Box<Expression>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_type_specifier: Option<TypeSpecifier>,
}

/// `Convert` and `CanConvert`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertExpression {
    #[serde(flatten)]
    pub element: Element,
    pub operand: Box<Expression>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_type_specifier: Option<TypeSpecifier>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfExpression {
    #[serde(flatten)]
    pub element: Element,
    pub condition: Box<Expression>,
    pub then: Box<Expression>,
    #[serde(rename = "else")]
    pub else_clause: Box<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseExpression {
    #[serde(flatten)]
    pub element: Element,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparand: Option<Box<Expression>>,
    #[serde(default)]
    pub case_item: Vec<CaseItem>,
    #[serde(rename = "else")]
    pub else_clause: Box<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseItem {
    pub when: Box<Expression>,
    pub then: Box<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageExpression {
    #[serde(flatten)]
    pub element: Element,
    pub source: Box<Expression>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<Box<Expression>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<Box<Expression>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Box<Expression>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<Box<Expression>>,
}

// ============================================================================
// Clinical operators
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InValueSet {
    #[serde(flatten)]
    pub element: Element,
    pub code: Box<Expression>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valueset: Option<ValueSetRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valueset_expression: Option<Box<Expression>>,
}

impl InValueSet {
    pub fn new(code: Expression, valueset: ValueSetRef) -> Self {
        Self {
            element: Element::default(),
            code: Box::new(code),
            valueset: Some(valueset),
            valueset_expression: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnyInValueSet {
    #[serde(flatten)]
    pub element: Element,
    pub codes: Box<Expression>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valueset: Option<ValueSetRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valueset_expression: Option<Box<Expression>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InCodeSystem {
    #[serde(flatten)]
    pub element: Element,
    pub code: Box<Expression>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codesystem: Option<CodeSystemRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codesystem_expression: Option<Box<Expression>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnyInCodeSystem {
    #[serde(flatten)]
    pub element: Element,
    pub codes: Box<Expression>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codesystem: Option<CodeSystemRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codesystem_expression: Option<Box<Expression>>,
}

// ============================================================================
// Queries
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    #[serde(flatten)]
    pub element: Element,
    pub source: Vec<AliasedQuerySource>,
    #[serde(rename = "let", default, skip_serializing_if = "Vec::is_empty")]
    pub let_clause: Vec<LetClause>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relationship: Vec<RelationshipClause>,
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    pub where_clause: Option<Box<Expression>>,
    #[serde(rename = "return", skip_serializing_if = "Option::is_none")]
    pub return_clause: Option<ReturnClause>,
    /// Aggregate and sort clauses are kept opaque
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<serde_json::Value>,
}

impl Query {
    /// Single-source query with an optional where clause
    pub fn new(source: AliasedQuerySource, where_clause: Option<Expression>) -> Self {
        Self {
            element: Element::default(),
            source: vec![source],
            let_clause: Vec::new(),
            relationship: Vec::new(),
            where_clause: where_clause.map(Box::new),
            return_clause: None,
            aggregate: None,
            sort: None,
        }
    }

    /// Every alias introduced by this query: sources first, then relationships
    pub fn aliases(&self) -> Vec<String> {
        self.source
            .iter()
            .map(|s| s.alias.clone())
            .chain(self.relationship.iter().map(|r| r.clause().alias.clone()))
            .collect()
    }

    fn children(&self) -> Vec<&Expression> {
        let mut parts: Vec<&Expression> =
            self.source.iter().map(|s| s.expression.as_ref()).collect();
        parts.extend(self.let_clause.iter().map(|l| l.expression.as_ref()));
        for relationship in &self.relationship {
            let clause = relationship.clause();
            parts.push(clause.expression.as_ref());
            parts.extend(clause.such_that.as_deref());
        }
        parts.extend(self.where_clause.as_deref());
        parts.extend(self.return_clause.iter().map(|r| r.expression.as_ref()));
        parts
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AliasedQuerySource {
    pub expression: Box<Expression>,
    pub alias: String,
}

impl AliasedQuerySource {
    pub fn new(alias: impl Into<String>, expression: Expression) -> Self {
        Self {
            expression: Box::new(expression),
            alias: alias.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LetClause {
    pub identifier: String,
    pub expression: Box<Expression>,
}

/// `with` / `without` clause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RelationshipClause {
    With(RelatedSource),
    Without(RelatedSource),
}

impl RelationshipClause {
    pub fn clause(&self) -> &RelatedSource {
        match self {
            Self::With(clause) | Self::Without(clause) => clause,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedSource {
    pub expression: Box<Expression>,
    pub alias: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub such_that: Option<Box<Expression>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnClause {
    pub expression: Box<Expression>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distinct: Option<bool>,
}

/// Data retrieval (`[Observation: "ESRD"]`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Retrieve {
    #[serde(flatten)]
    pub element: Element,
    /// Qualified type, e.g. `{http://hl7.org/fhir}Observation`
    pub data_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_property: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codes: Option<Box<Expression>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_property: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_range: Option<Box<Expression>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Box<Expression>>,
}

impl Retrieve {
    pub fn new(data_type: impl Into<String>) -> Self {
        Self {
            element: Element::default(),
            data_type: data_type.into(),
            template_id: None,
            code_property: None,
            codes: None,
            date_property: None,
            date_range: None,
            context: None,
        }
    }

    /// Restrict the retrieve to codes found at `code_property`
    pub fn with_codes(mut self, code_property: &str, codes: Expression) -> Self {
        self.code_property = Some(code_property.to_string());
        self.codes = Some(Box::new(codes));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_query() {
        let json = r#"{
            "type": "Query",
            "source": [{"alias": "O", "expression": {
                "type": "Retrieve", "dataType": "{http://hl7.org/fhir}Observation"}}],
            "where": {"type": "Equal", "operand": [
                {"type": "Property", "path": "status", "scope": "O",
                 "resultTypeName": "{http://hl7.org/fhir}ObservationStatus"},
                {"type": "Literal", "valueType": "{urn:hl7-org:elm-types:r1}String", "value": "final"}
            ]}
        }"#;
        let expr: Expression = serde_json::from_str(json).unwrap();
        let Expression::Query(query) = &expr else {
            panic!("expected query, got {expr:?}");
        };
        assert_eq!(query.aliases(), vec!["O".to_string()]);
        assert_eq!(expr.arity(), Arity::Structured);
        assert_eq!(expr.children().len(), 2);
    }

    #[test]
    fn test_deserialize_list_and_terminology_operators() {
        let value = r#"{"type": "Property", "path": "value", "scope": "O"}"#;
        let string = r#"{"type": "Literal", "valueType": "{urn:hl7-org:elm-types:r1}String", "value": "mg"}"#;
        let cases = [
            (format!(r#"{{"type": "ConvertQuantity", "operand": [{value}, {string}]}}"#), Arity::Binary, 2),
            (format!(r#"{{"type": "CanConvertQuantity", "operand": [{value}, {string}]}}"#), Arity::Binary, 2),
            (format!(r#"{{"type": "ConvertsToRatio", "operand": {value}}}"#), Arity::Unary, 1),
            (format!(r#"{{"type": "Children", "source": {value}}}"#), Arity::Unary, 1),
            (format!(r#"{{"type": "Descendents", "source": {value}}}"#), Arity::Unary, 1),
            (format!(r#"{{"type": "HighBoundary", "operand": [{value}, {string}]}}"#), Arity::Binary, 2),
            (format!(r#"{{"type": "LowBoundary", "operand": [{value}, {string}]}}"#), Arity::Binary, 2),
            (format!(r#"{{"type": "Subsumes", "operand": [{value}, {value}]}}"#), Arity::Binary, 2),
            (format!(r#"{{"type": "SubsumedBy", "operand": [{value}, {value}]}}"#), Arity::Binary, 2),
            (
                format!(r#"{{"type": "SplitOnMatches", "stringToSplit": {string}, "separatorPattern": {string}}}"#),
                Arity::Structured,
                2,
            ),
            (
                format!(
                    r#"{{"type": "Sort", "source": {value}, "by": [{{"type": "ByDirection", "direction": "asc"}}, {{"type": "ByExpression", "direction": "desc", "expression": {value}}}]}}"#
                ),
                Arity::Structured,
                2,
            ),
            (
                format!(r#"{{"type": "Aggregate", "source": {value}, "initialValue": {string}, "iteration": {value}}}"#),
                Arity::Structured,
                3,
            ),
        ];
        for (json, arity, children) in cases {
            let expr: Expression = serde_json::from_str(&json).unwrap();
            assert_eq!(expr.arity(), arity, "{json}");
            assert_eq!(expr.children().len(), children, "{json}");
        }
    }

    #[test]
    fn test_arity_shapes() {
        let literal = Expression::Literal(Literal::string("x"));
        assert_eq!(literal.arity(), Arity::Leaf);

        let not = Expression::Not(UnaryExpression::new(literal.clone()));
        assert_eq!(not.arity(), Arity::Unary);

        let equal = Expression::Equal(BinaryExpression::new(literal.clone(), literal.clone()));
        assert_eq!(equal.arity(), Arity::Binary);
        assert_eq!(equal.children(), vec![&literal, &literal]);
    }

    #[test]
    fn test_datetime_components() {
        let ctor = DateTimeExpression::from_components(&[2019, 1, 1]);
        assert_eq!(ctor.components().len(), 3);
        assert!(ctor.hour.is_none());
    }

    #[test]
    fn test_retrieve_roundtrips_code_filter_fields() {
        let retrieve = Retrieve::new("{http://hl7.org/fhir}Observation")
            .with_codes("code", Expression::ValueSetRef(ValueSetRef::local("ESRD")));
        let json = serde_json::to_value(Expression::Retrieve(retrieve.clone())).unwrap();
        assert_eq!(json["type"], "Retrieve");
        assert_eq!(json["codeProperty"], "code");
        assert_eq!(json["codes"]["type"], "ValueSetRef");
    }
}
