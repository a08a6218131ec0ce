// Shape templates and the directives they are made of
//
// A template maps output keys to directives. Intent is chosen when the template
// is built, never inferred from a value, so a literal string that happens to
// equal a field name stays a literal.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::projector::ProjectionError;
use crate::sentinel::{FieldRef, Sentinel};
use crate::value::JValue;

/// The output key that carries spread directives.
pub const SPREAD_KEY: &str = "_";

/// A caller-supplied function evaluated against the whole source record.
pub type ComputeFn = Rc<dyn Fn(&JValue) -> Result<JValue, ProjectionError>>;

/// What a single template entry means.
#[derive(Clone)]
pub enum Directive {
    /// Copy the source field whose name equals the output key.
    Identity,
    /// Copy a specific source field under the (possibly different) output key.
    FieldRef(String),
    /// Assign the value verbatim.
    Literal(JValue),
    /// Assign whatever the function returns for the current record.
    Compute(ComputeFn),
    /// Project the same-named source field (record or array of records).
    Nested(Template),
}

/// How the `_` entry of a template is applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnderscoreDirective<'a> {
    /// Merge every source field into the output.
    SpreadAll,
    /// Project the source with the sub-template and merge the result.
    SpreadSome(&'a Template),
    /// Contribute nothing. Any falsy literal (`null`, `false`, `0`, NaN, `""`)
    /// lands here.
    SpreadNone,
    /// Not mergeable: resolve normally and store under the literal key `_`.
    Raw(&'a Directive),
}

impl Directive {
    /// Short name of the variant, for trace output.
    pub fn kind(&self) -> &'static str {
        match self {
            Directive::Identity => "identity",
            Directive::FieldRef(_) => "field_ref",
            Directive::Literal(_) => "literal",
            Directive::Compute(_) => "compute",
            Directive::Nested(_) => "nested",
        }
    }

    /// Classify this directive as the value of the `_` key.
    pub fn classify_underscore(&self) -> UnderscoreDirective<'_> {
        match self {
            Directive::Identity => UnderscoreDirective::SpreadAll,
            Directive::Nested(sub) => UnderscoreDirective::SpreadSome(sub),
            Directive::Literal(v) if v.is_falsy() => UnderscoreDirective::SpreadNone,
            other => UnderscoreDirective::Raw(other),
        }
    }
}

impl fmt::Debug for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Directive::Identity => write!(f, "Identity"),
            Directive::FieldRef(name) => f.debug_tuple("FieldRef").field(name).finish(),
            Directive::Literal(v) => f.debug_tuple("Literal").field(v).finish(),
            Directive::Compute(func) => write!(f, "Compute({:p})", Rc::as_ptr(func)),
            Directive::Nested(t) => f.debug_tuple("Nested").field(t).finish(),
        }
    }
}

/// Compute directives compare by function identity.
impl PartialEq for Directive {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Directive::Identity, Directive::Identity) => true,
            (Directive::FieldRef(a), Directive::FieldRef(b)) => a == b,
            (Directive::Literal(a), Directive::Literal(b)) => a == b,
            (Directive::Compute(a), Directive::Compute(b)) => Rc::ptr_eq(a, b),
            (Directive::Nested(a), Directive::Nested(b)) => a == b,
            _ => false,
        }
    }
}

// ── Builders ─────────────────────────────────────────────────────────────────

/// Copy the same-named field.
#[inline]
pub fn identity() -> Directive {
    Directive::Identity
}

/// Copy field `name` under the entry's output key.
#[inline]
pub fn rename(name: impl Into<String>) -> Directive {
    Directive::FieldRef(name.into())
}

#[inline]
pub fn literal(value: impl Into<JValue>) -> Directive {
    Directive::Literal(value.into())
}

/// Assign the result of `f(record)`.
pub fn compute<F, T>(f: F) -> Directive
where
    F: Fn(&JValue) -> T + 'static,
    T: Into<JValue>,
{
    Directive::Compute(Rc::new(
        move |record: &JValue| -> Result<JValue, ProjectionError> { Ok(f(record).into()) },
    ))
}

/// Like [`compute`], for functions that can fail (for example ones that run
/// another `select`). The error aborts the whole projection.
pub fn try_compute<F, T>(f: F) -> Directive
where
    F: Fn(&JValue) -> Result<T, ProjectionError> + 'static,
    T: Into<JValue>,
{
    Directive::Compute(Rc::new(
        move |record: &JValue| -> Result<JValue, ProjectionError> { f(record).map(Into::into) },
    ))
}

#[inline]
pub fn nested(template: Template) -> Directive {
    Directive::Nested(template)
}

// ── Conversions into Directive ───────────────────────────────────────────────

impl From<Sentinel> for Directive {
    fn from(_: Sentinel) -> Self {
        Directive::Identity
    }
}

impl From<FieldRef> for Directive {
    fn from(f: FieldRef) -> Self {
        Directive::FieldRef(f.into_name())
    }
}

impl From<Template> for Directive {
    fn from(t: Template) -> Self {
        Directive::Nested(t)
    }
}

impl From<JValue> for Directive {
    fn from(v: JValue) -> Self {
        Directive::Literal(v)
    }
}

impl From<&str> for Directive {
    fn from(s: &str) -> Self {
        Directive::Literal(JValue::from(s))
    }
}

impl From<String> for Directive {
    fn from(s: String) -> Self {
        Directive::Literal(JValue::from(s))
    }
}

impl From<bool> for Directive {
    fn from(b: bool) -> Self {
        Directive::Literal(JValue::Bool(b))
    }
}

impl From<i32> for Directive {
    fn from(n: i32) -> Self {
        Directive::Literal(JValue::from(n))
    }
}

impl From<i64> for Directive {
    fn from(n: i64) -> Self {
        Directive::Literal(JValue::from(n))
    }
}

impl From<f64> for Directive {
    fn from(n: f64) -> Self {
        Directive::Literal(JValue::from(n))
    }
}

// ── Template ─────────────────────────────────────────────────────────────────

/// An ordered mapping from output key to [`Directive`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Template {
    entries: IndexMap<String, Directive>,
}

impl Template {
    pub fn new() -> Self {
        Template {
            entries: IndexMap::new(),
        }
    }

    /// Add or replace an entry. A replaced key keeps its original position.
    pub fn insert(&mut self, key: impl Into<String>, directive: impl Into<Directive>) {
        self.entries.insert(key.into(), directive.into());
    }

    /// Builder form of [`Template::insert`].
    pub fn field(mut self, key: impl Into<String>, directive: impl Into<Directive>) -> Self {
        self.insert(key, directive);
        self
    }

    /// Merge every source field before the explicit entries are applied.
    pub fn spread_all(self) -> Self {
        self.field(SPREAD_KEY, Directive::Identity)
    }

    /// Merge the projection of the source through `sub`.
    pub fn spread_some(self, sub: Template) -> Self {
        self.field(SPREAD_KEY, Directive::Nested(sub))
    }

    /// An explicit no-op spread.
    pub fn spread_none(self) -> Self {
        self.field(SPREAD_KEY, Directive::Literal(JValue::Null))
    }

    pub fn get(&self, key: &str) -> Option<&Directive> {
        self.entries.get(key)
    }

    /// The directive stored under `_`, if any.
    pub fn spread(&self) -> Option<&Directive> {
        self.entries.get(SPREAD_KEY)
    }

    /// Entries other than `_`, in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&String, &Directive)> + '_ {
        self.entries.iter().filter(|(k, _)| k.as_str() != SPREAD_KEY)
    }

    /// All entries in declaration order, `_` included.
    pub fn iter(&self) -> indexmap::map::Iter<'_, String, Directive> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Load a template from its JSON form.
    ///
    /// The encoding is structural:
    ///
    /// - `true` copies the same-named field
    /// - `{"$field": "name"}` copies field `name`
    /// - `{"$literal": value}` assigns `value` verbatim
    /// - any other object is a nested template
    /// - everything else is a literal
    ///
    /// Compute directives have no JSON form.
    pub fn from_json_str(s: &str) -> Result<Template, ProjectionError> {
        let value = JValue::from_json_str(s)
            .map_err(|e| ProjectionError::InvalidTemplate(format!("invalid JSON: {}", e)))?;
        Template::try_from(&value)
    }
}

impl<K, D> FromIterator<(K, D)> for Template
where
    K: Into<String>,
    D: Into<Directive>,
{
    fn from_iter<I: IntoIterator<Item = (K, D)>>(iter: I) -> Self {
        let mut template = Template::new();
        for (k, d) in iter {
            template.insert(k, d);
        }
        template
    }
}

impl<'a> IntoIterator for &'a Template {
    type Item = (&'a String, &'a Directive);
    type IntoIter = indexmap::map::Iter<'a, String, Directive>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl TryFrom<&JValue> for Template {
    type Error = ProjectionError;

    fn try_from(value: &JValue) -> Result<Self, Self::Error> {
        let map = value.as_object().ok_or_else(|| {
            ProjectionError::InvalidTemplate(format!(
                "a template must be an object, found {}",
                value.type_name()
            ))
        })?;

        let mut template = Template::new();
        for (key, v) in map.iter() {
            template.insert(key.clone(), directive_from_json(key, v)?);
        }
        Ok(template)
    }
}

impl TryFrom<JValue> for Template {
    type Error = ProjectionError;

    fn try_from(value: JValue) -> Result<Self, Self::Error> {
        Template::try_from(&value)
    }
}

fn directive_from_json(key: &str, value: &JValue) -> Result<Directive, ProjectionError> {
    match value {
        JValue::Bool(true) => Ok(Directive::Identity),
        JValue::Object(map) if map.len() == 1 => {
            if let Some(name) = map.get("$field") {
                return match name.as_str() {
                    Some(name) => Ok(Directive::FieldRef(name.to_string())),
                    None => Err(ProjectionError::InvalidTemplate(format!(
                        "\"$field\" under \"{}\" must be a string, found {}",
                        key,
                        name.type_name()
                    ))),
                };
            }
            if let Some(v) = map.get("$literal") {
                return Ok(Directive::Literal(v.clone()));
            }
            Ok(Directive::Nested(Template::try_from(value)?))
        }
        JValue::Object(_) => Ok(Directive::Nested(Template::try_from(value)?)),
        other => Ok(Directive::Literal(other.clone())),
    }
}

/// Build a [`Template`] from `key => directive` pairs.
///
/// Values go through `Into<Directive>`: the sentinel `__` and `__.field(..)`
/// become copies, a nested `shape!` becomes a nested projection, and plain
/// strings, numbers, booleans and `JValue`s become literals.
///
/// ```
/// use whereselect::{shape, __, compute};
///
/// let t = shape! {
///     "name" => __,
///     "alias" => __.field("name"),
///     "kind" => "person",
///     "initial" => compute(|r| r.field("name").as_str().and_then(|s| s.chars().next().map(String::from))),
/// };
/// assert_eq!(t.len(), 4);
/// ```
#[macro_export]
macro_rules! shape {
    () => {
        $crate::template::Template::new()
    };

    ($($key:expr => $val:expr),+ $(,)?) => {
        {
            let mut template = $crate::template::Template::new();
            $(
                template.insert($key, $val);
            )+
            template
        }
    };
}
