// Collection wrapper: from(x).matching(..).select(..)
//
// Keeps the "arrayness" of its input: an array in gives an array out, a single
// record gives a single record, and null stays null through every step.

use tracing::debug;

use crate::projector::{Projector, Result};
use crate::template::Template;
use crate::value::JValue;

#[derive(Debug, Clone, PartialEq)]
enum Source {
    Null,
    Many(Vec<JValue>),
    One(JValue),
}

/// A chainable view over an array of records, a single record, or nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    source: Source,
}

/// Wrap a collection for chaining.
pub fn from(x: impl Into<JValue>) -> Query {
    Query::from(x.into())
}

impl From<JValue> for Query {
    fn from(value: JValue) -> Self {
        let source = match value {
            JValue::Null | JValue::Undefined => Source::Null,
            JValue::Array(items) => Source::Many(items.iter().cloned().collect()),
            other => Source::One(other),
        };
        Query { source }
    }
}

impl From<Vec<JValue>> for Query {
    fn from(items: Vec<JValue>) -> Self {
        Query {
            source: Source::Many(items),
        }
    }
}

impl Query {
    /// Keep the elements that equal `predicate` on every one of its fields.
    ///
    /// Equality is strict and shallow per field: `1` never matches `"1"`, and a
    /// missing field never matches, not even `null`. A null predicate keeps
    /// everything; a non-record predicate is compared against whole elements.
    pub fn matching(self, predicate: impl Into<JValue>) -> Query {
        let predicate = predicate.into();
        if predicate.is_nullish() {
            return self;
        }
        self.filter(|el| shallow_match(&predicate, el))
    }

    /// Keep the elements for which `f` returns true. A single record that
    /// fails the test leaves a null query behind.
    pub fn filter<F>(self, f: F) -> Query
    where
        F: Fn(&JValue) -> bool,
    {
        let source = match self.source {
            Source::Null => Source::Null,
            Source::Many(items) => Source::Many(items.into_iter().filter(|el| f(el)).collect()),
            Source::One(el) if f(&el) => Source::One(el),
            Source::One(_) => Source::Null,
        };
        Query { source }
    }

    /// Transform every element.
    pub fn map<F, T>(self, f: F) -> Query
    where
        F: Fn(&JValue) -> T,
        T: Into<JValue>,
    {
        let source = match self.source {
            Source::Null => Source::Null,
            Source::Many(items) => Source::Many(items.iter().map(|el| f(el).into()).collect()),
            Source::One(el) => Source::One(f(&el).into()),
        };
        Query { source }
    }

    /// Keep at most the first `n` elements.
    pub fn take(self, n: usize) -> Query {
        match self.source {
            Source::Many(mut items) => {
                items.truncate(n);
                Query::from(items)
            }
            Source::One(_) if n == 0 => Query {
                source: Source::Null,
            },
            source => Query { source },
        }
    }

    /// Drop the first `n` elements.
    pub fn skip(self, n: usize) -> Query {
        match self.source {
            Source::Many(items) => Query::from(items.into_iter().skip(n).collect::<Vec<_>>()),
            Source::One(_) if n > 0 => Query {
                source: Source::Null,
            },
            source => Query { source },
        }
    }

    /// Project every element through `template` with a default projector.
    pub fn select(&self, template: &Template) -> Result<JValue> {
        self.select_with(&Projector::new(), template)
    }

    /// Project every element through `template` with `projector`.
    ///
    /// Returns `Null`, an array, or a single record to match what was wrapped.
    pub fn select_with(&self, projector: &Projector, template: &Template) -> Result<JValue> {
        match &self.source {
            Source::Null => {
                debug!("select over null source");
                Ok(JValue::Null)
            }
            Source::Many(items) => {
                debug!(elements = items.len(), entries = template.len(), "select over array");
                let projected = items
                    .iter()
                    .map(|el| projector.project(template, el))
                    .collect::<Result<Vec<_>>>()?;
                Ok(JValue::array(projected))
            }
            Source::One(el) => {
                debug!(entries = template.len(), "select over single record");
                projector.project(template, el)
            }
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self.source, Source::Null)
    }

    /// Number of elements; a single record counts as one.
    pub fn len(&self) -> usize {
        match &self.source {
            Source::Null => 0,
            Source::Many(items) => items.len(),
            Source::One(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, JValue> {
        match &self.source {
            Source::Null => (&[] as &[JValue]).iter(),
            Source::Many(items) => items.iter(),
            Source::One(el) => std::slice::from_ref(el).iter(),
        }
    }

    /// Unwrap back into a plain value of the same shape.
    pub fn into_value(self) -> JValue {
        match self.source {
            Source::Null => JValue::Null,
            Source::Many(items) => JValue::array(items),
            Source::One(el) => el,
        }
    }
}

impl<'a> IntoIterator for &'a Query {
    type Item = &'a JValue;
    type IntoIter = std::slice::Iter<'a, JValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn shallow_match(predicate: &JValue, element: &JValue) -> bool {
    match predicate.as_object() {
        Some(wanted) => match element.as_object() {
            Some(fields) => wanted
                .iter()
                .all(|(k, v)| fields.get(k).map_or(false, |actual| actual == v)),
            None => false,
        },
        None => predicate == element,
    }
}
