// Record and value model
// Objects keep field order; Undefined is the outcome of reading a missing field

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// An ordered field-name to value mapping.
pub type Record = IndexMap<String, JValue>;

/// A record field value.
///
/// Containers and strings sit behind `Rc`, so copying a source field into an
/// output record shares it instead of deep-copying. `Undefined` is "no value";
/// the projector never stores it under a key.
#[derive(Clone, Debug, Default)]
pub enum JValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Array(Rc<Vec<JValue>>),
    Object(Rc<Record>),
    Undefined,
}

impl JValue {
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, JValue::Null)
    }

    #[inline]
    pub fn is_undefined(&self) -> bool {
        matches!(self, JValue::Undefined)
    }

    /// Null or undefined: the values that short-circuit a projection.
    #[inline]
    pub fn is_nullish(&self) -> bool {
        matches!(self, JValue::Null | JValue::Undefined)
    }

    /// Null, undefined, `false`, `0`, NaN or `""`.
    pub fn is_falsy(&self) -> bool {
        match self {
            JValue::Null | JValue::Undefined => true,
            JValue::Bool(b) => !b,
            JValue::Number(n) => *n == 0.0 || n.is_nan(),
            JValue::String(s) => s.is_empty(),
            JValue::Array(_) | JValue::Object(_) => false,
        }
    }

    #[inline]
    pub fn is_object(&self) -> bool {
        matches!(self, JValue::Object(_))
    }

    /// Short type name used in error messages and trace output.
    pub fn type_name(&self) -> &'static str {
        match self {
            JValue::Null => "null",
            JValue::Bool(_) => "boolean",
            JValue::Number(_) => "number",
            JValue::String(_) => "string",
            JValue::Array(_) => "array",
            JValue::Object(_) => "object",
            JValue::Undefined => "undefined",
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            JValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The number as an integer, when it has no fractional part.
    pub fn as_i64(&self) -> Option<i64> {
        self.as_f64()
            .filter(|n| n.fract() == 0.0 && n.abs() < 9.0e15)
            .map(|n| n as i64)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            JValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[JValue]> {
        match self {
            JValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Record> {
        match self {
            JValue::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Mutable access to a record; a shared record is copied first, so other
    /// holders never observe the change.
    pub fn as_object_mut(&mut self) -> Option<&mut Record> {
        match self {
            JValue::Object(map) => Some(Rc::make_mut(map)),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&JValue> {
        self.as_object().and_then(|map| map.get(key))
    }

    /// Read a field, yielding `Undefined` when the value is not a record or
    /// the field is missing.
    pub fn field(&self, key: &str) -> JValue {
        self.get(key).cloned().unwrap_or(JValue::Undefined)
    }

    pub fn get_index(&self, index: usize) -> Option<&JValue> {
        self.as_array().and_then(|items| items.get(index))
    }

    pub fn string(s: impl Into<Rc<str>>) -> Self {
        JValue::String(s.into())
    }

    pub fn array(items: Vec<JValue>) -> Self {
        JValue::Array(Rc::new(items))
    }

    pub fn object(map: Record) -> Self {
        JValue::Object(Rc::new(map))
    }
}

impl From<bool> for JValue {
    fn from(b: bool) -> Self {
        JValue::Bool(b)
    }
}

impl From<i32> for JValue {
    fn from(n: i32) -> Self {
        JValue::Number(n.into())
    }
}

impl From<i64> for JValue {
    fn from(n: i64) -> Self {
        JValue::Number(n as f64)
    }
}

impl From<f64> for JValue {
    fn from(n: f64) -> Self {
        JValue::Number(n)
    }
}

impl From<&str> for JValue {
    fn from(s: &str) -> Self {
        JValue::string(s)
    }
}

impl From<String> for JValue {
    fn from(s: String) -> Self {
        JValue::string(s)
    }
}

impl From<Vec<JValue>> for JValue {
    fn from(items: Vec<JValue>) -> Self {
        JValue::array(items)
    }
}

impl From<Record> for JValue {
    fn from(map: Record) -> Self {
        JValue::object(map)
    }
}

/// `None` becomes `Null`.
impl<T: Into<JValue>> From<Option<T>> for JValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(JValue::Null, Into::into)
    }
}

/// Deep equality, also used as the strict per-field test of `Query::matching`.
/// NaN equals nothing, `Null` and `Undefined` are distinct.
impl PartialEq for JValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (JValue::Null, JValue::Null) | (JValue::Undefined, JValue::Undefined) => true,
            (JValue::Bool(a), JValue::Bool(b)) => a == b,
            (JValue::Number(a), JValue::Number(b)) => a == b,
            (JValue::String(a), JValue::String(b)) => a == b,
            (JValue::Array(a), JValue::Array(b)) => Rc::ptr_eq(a, b) || a == b,
            (JValue::Object(a), JValue::Object(b)) => Rc::ptr_eq(a, b) || a == b,
            _ => false,
        }
    }
}

// ── serde_json interop ───────────────────────────────────────────────────────

impl From<serde_json::Value> for JValue {
    fn from(v: serde_json::Value) -> Self {
        use serde_json::Value as J;
        match v {
            J::Null => JValue::Null,
            J::Bool(b) => JValue::Bool(b),
            J::Number(n) => n.as_f64().map_or(JValue::Null, JValue::Number),
            J::String(s) => JValue::string(s),
            J::Array(items) => items.into_iter().map(JValue::from).collect::<Vec<_>>().into(),
            J::Object(map) => map
                .into_iter()
                .map(|(k, v)| (k, JValue::from(v)))
                .collect::<Record>()
                .into(),
        }
    }
}

/// `Undefined` and non-finite numbers become `null`; integral numbers stay
/// integers.
impl From<&JValue> for serde_json::Value {
    fn from(v: &JValue) -> Self {
        use serde_json::Value as J;
        match v {
            JValue::Null | JValue::Undefined => J::Null,
            JValue::Bool(b) => J::Bool(*b),
            JValue::Number(n) => match v.as_i64() {
                Some(i) => J::from(i),
                None => serde_json::Number::from_f64(*n).map_or(J::Null, J::Number),
            },
            JValue::String(s) => J::String(s.to_string()),
            JValue::Array(items) => J::Array(items.iter().map(J::from).collect()),
            JValue::Object(map) => J::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), J::from(v)))
                    .collect(),
            ),
        }
    }
}

impl Serialize for JValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            JValue::Null | JValue::Undefined => serializer.serialize_unit(),
            JValue::Bool(b) => serializer.serialize_bool(*b),
            JValue::Number(n) => match self.as_i64() {
                Some(i) => serializer.serialize_i64(i),
                None if n.is_finite() => serializer.serialize_f64(*n),
                None => serializer.serialize_unit(),
            },
            JValue::String(s) => serializer.serialize_str(s),
            JValue::Array(items) => serializer.collect_seq(items.iter()),
            JValue::Object(map) => serializer.collect_map(map.iter()),
        }
    }
}

/// Goes through `serde_json::Value`, which keeps key order under the
/// `preserve_order` feature.
impl<'de> Deserialize<'de> for JValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(JValue::from)
    }
}

impl JValue {
    pub fn from_json_str(s: &str) -> Result<JValue, serde_json::Error> {
        serde_json::from_str(s)
    }

    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn to_json_string_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Compact JSON, except that `Undefined` prints as `undefined`.
impl fmt::Display for JValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_undefined() {
            return f.write_str("undefined");
        }
        let json = self.to_json_string().map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

/// Build a [`JValue`] with `serde_json::json!` syntax.
///
/// ```
/// use whereselect::jvalue;
///
/// let john = jvalue!({"name": "John", "friends": [{"name": "Jane"}]});
/// assert_eq!(john.field("name").as_str(), Some("John"));
/// ```
#[macro_export]
macro_rules! jvalue {
    ($($json:tt)+) => {
        $crate::value::JValue::from($crate::__private::serde_json::json!($($json)+))
    };
}
