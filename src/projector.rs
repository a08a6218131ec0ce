// Projection engine
// Resolves a shape template against a single source record

use std::cell::Cell;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

use crate::template::{Directive, Template, UnderscoreDirective, SPREAD_KEY};
use crate::value::{JValue, Record};

/// Projection errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProjectionError {
    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    #[error("Invalid source: {0}")]
    InvalidSource(String),

    #[error("Projection nested deeper than {0} levels")]
    DepthExceeded(usize),

    #[error("Compute error: {0}")]
    Compute(String),
}

pub type Result<T> = std::result::Result<T, ProjectionError>;

/// What a nested template does when the source value is neither a record nor
/// an array of records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NonRecordPolicy {
    /// Drop the output key (inside an array the element becomes `null`).
    #[default]
    Omit,
    /// Copy the value as-is.
    PassThrough,
    /// Fail with [`ProjectionError::InvalidSource`].
    Reject,
}

/// Projector configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectorConfig {
    /// Maximum nesting of projections, counting nested templates, partial
    /// spreads and compute functions that call back into the same projector.
    pub max_depth: usize,
    pub non_record_policy: NonRecordPolicy,
}

impl Default for ProjectorConfig {
    fn default() -> Self {
        ProjectorConfig {
            max_depth: 256,
            non_record_policy: NonRecordPolicy::Omit,
        }
    }
}

/// Projection engine
///
/// Stateless apart from the current nesting depth, which lives in a `Cell` so
/// compute functions can re-enter the projector through a shared reference.
#[derive(Debug, Default)]
pub struct Projector {
    config: ProjectorConfig,
    depth: Cell<usize>,
}

struct DepthGuard<'a>(&'a Cell<usize>);

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get() - 1);
    }
}

impl Projector {
    pub fn new() -> Self {
        Self::with_config(ProjectorConfig::default())
    }

    pub fn with_config(config: ProjectorConfig) -> Self {
        Projector {
            config,
            depth: Cell::new(0),
        }
    }

    pub fn config(&self) -> &ProjectorConfig {
        &self.config
    }

    /// Project a single record through `template`.
    ///
    /// A null or undefined record yields `Null`. A value that is not a record
    /// is handled by the configured [`NonRecordPolicy`], with `Omit` giving
    /// `Null`.
    pub fn project(&self, template: &Template, record: &JValue) -> Result<JValue> {
        self.project_value(template, record)
            .map(|v| if v.is_undefined() { JValue::Null } else { v })
    }

    fn enter(&self) -> Result<DepthGuard<'_>> {
        let depth = self.depth.get() + 1;
        if depth > self.config.max_depth {
            debug!(max_depth = self.config.max_depth, "projection depth exceeded");
            return Err(ProjectionError::DepthExceeded(self.config.max_depth));
        }
        self.depth.set(depth);
        Ok(DepthGuard(&self.depth))
    }

    /// Project one element: a record, null, or a stray scalar.
    fn project_value(&self, template: &Template, value: &JValue) -> Result<JValue> {
        match value {
            JValue::Null | JValue::Undefined => Ok(JValue::Null),
            JValue::Object(source) => self.project_record(template, value, source),
            other => self.non_record(other).map(|v| v.unwrap_or(JValue::Null)),
        }
    }

    fn project_record(&self, template: &Template, record: &JValue, source: &Record) -> Result<JValue> {
        let _guard = self.enter()?;
        trace!(
            depth = self.depth.get(),
            entries = template.len(),
            fields = source.len(),
            "projecting record"
        );

        let mut out = Record::with_capacity(template.len());

        // Spreads land first so explicit sibling keys override them
        if let Some(directive) = template.spread() {
            match directive.classify_underscore() {
                UnderscoreDirective::SpreadAll => {
                    trace!("spread all");
                    for (k, v) in source.iter() {
                        if !v.is_undefined() {
                            out.insert(k.clone(), v.clone());
                        }
                    }
                }
                UnderscoreDirective::SpreadSome(sub) => {
                    trace!(entries = sub.len(), "spread some");
                    if let JValue::Object(merged) = self.project_record(sub, record, source)? {
                        for (k, v) in merged.iter() {
                            out.insert(k.clone(), v.clone());
                        }
                    }
                }
                UnderscoreDirective::SpreadNone => trace!("spread none"),
                UnderscoreDirective::Raw(d) => {
                    let value = self.resolve(SPREAD_KEY, d, record, source)?;
                    if !value.is_undefined() {
                        out.insert(SPREAD_KEY.to_string(), value);
                    }
                }
            }
        }

        for (key, directive) in template.fields() {
            let value = self.resolve(key, directive, record, source)?;
            if value.is_undefined() {
                trace!(key = key.as_str(), "omitting undefined value");
                continue;
            }
            out.insert(key.clone(), value);
        }

        Ok(JValue::object(out))
    }

    fn resolve(&self, key: &str, directive: &Directive, record: &JValue, source: &Record) -> Result<JValue> {
        trace!(key, kind = directive.kind(), "resolving directive");
        match directive {
            Directive::Identity => Ok(read(source, key)),
            Directive::FieldRef(name) => Ok(read(source, name)),
            Directive::Literal(v) => Ok(v.clone()),
            Directive::Compute(f) => f(record),
            Directive::Nested(sub) => self.project_nested(key, sub, source.get(key)),
        }
    }

    fn project_nested(&self, key: &str, sub: &Template, value: Option<&JValue>) -> Result<JValue> {
        match value {
            None | Some(JValue::Null) | Some(JValue::Undefined) => Ok(JValue::Undefined),
            Some(JValue::Array(items)) => {
                let projected = items
                    .iter()
                    .map(|item| self.project_value(sub, item))
                    .collect::<Result<Vec<_>>>()?;
                Ok(JValue::array(projected))
            }
            Some(record @ JValue::Object(source)) => self.project_record(sub, record, source),
            Some(other) => {
                trace!(key, found = other.type_name(), "nested template over non-record");
                Ok(self.non_record(other)?.unwrap_or(JValue::Undefined))
            }
        }
    }

    /// Apply the non-record policy. `None` means "no value".
    fn non_record(&self, value: &JValue) -> Result<Option<JValue>> {
        match self.config.non_record_policy {
            NonRecordPolicy::Omit => Ok(None),
            NonRecordPolicy::PassThrough => Ok(Some(value.clone())),
            NonRecordPolicy::Reject => Err(ProjectionError::InvalidSource(format!(
                "expected a record or an array of records, found {}",
                value.type_name()
            ))),
        }
    }
}

#[inline]
fn read(source: &Record, key: &str) -> JValue {
    source.get(key).cloned().unwrap_or(JValue::Undefined)
}

/// Project `record` through `template` with a default [`Projector`].
pub fn project(template: &Template, record: &JValue) -> Result<JValue> {
    Projector::new().project(template, record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jvalue;
    use crate::sentinel::__;
    use crate::shape;
    use crate::template::{compute, literal, try_compute};

    fn person() -> JValue {
        jvalue!({"name": "John", "lastName": "Doe", "dob": "1972-09-20"})
    }

    #[test]
    fn test_null_record_projects_to_null() {
        let t = shape! { "name" => __ };
        assert_eq!(project(&t, &JValue::Null).unwrap(), JValue::Null);
        assert_eq!(project(&t, &JValue::Undefined).unwrap(), JValue::Null);
    }

    #[test]
    fn test_identity_and_rename() {
        let t = shape! {
            "name" => __,
            "surname" => __.field("lastName"),
        };
        assert_eq!(
            project(&t, &person()).unwrap(),
            jvalue!({"name": "John", "surname": "Doe"})
        );
    }

    #[test]
    fn test_missing_fields_are_omitted() {
        let t = shape! {
            "foo" => __.field("foo"),
            "bar" => __,
            "name" => __,
        };
        let out = project(&t, &person()).unwrap();
        assert_eq!(out, jvalue!({"name": "John"}));
        assert!(out.get("foo").is_none());
    }

    #[test]
    fn test_explicit_null_is_kept() {
        let t = shape! { "a" => __ };
        assert_eq!(
            project(&t, &jvalue!({"a": null})).unwrap(),
            jvalue!({"a": null})
        );
    }

    #[test]
    fn test_literal_matching_field_name_stays_literal() {
        let t = shape! { "naam" => "name" };
        assert_eq!(project(&t, &person()).unwrap(), jvalue!({"naam": "name"}));
    }

    #[test]
    fn test_compute_sees_whole_record() {
        let t = shape! {
            "full" => compute(|r| {
                format!(
                    "{} {}",
                    r.field("name").as_str().unwrap_or_default(),
                    r.field("lastName").as_str().unwrap_or_default()
                )
            }),
            "nothing" => compute(|_| JValue::Undefined),
        };
        assert_eq!(project(&t, &person()).unwrap(), jvalue!({"full": "John Doe"}));
    }

    #[test]
    fn test_compute_error_aborts() {
        let t = shape! {
            "x" => try_compute(|_| Err::<JValue, _>(ProjectionError::Compute("boom".into()))),
        };
        assert_eq!(
            project(&t, &person()).unwrap_err(),
            ProjectionError::Compute("boom".into())
        );
    }

    #[test]
    fn test_nested_over_array_and_record() {
        let t = shape! {
            "friends" => shape! { "name" => __ },
            "address" => shape! { "city" => __ },
        };
        let src = jvalue!({
            "friends": [{"name": "Jane", "age": 30i64}, null, {"age": 2i64}],
            "address": {"city": "Oslo", "zip": "0150"}
        });
        assert_eq!(
            project(&t, &src).unwrap(),
            jvalue!({
                "friends": [{"name": "Jane"}, null, {}],
                "address": {"city": "Oslo"}
            })
        );
    }

    #[test]
    fn test_nested_over_missing_or_null_is_omitted() {
        let t = shape! { "friends" => shape! { "name" => __ } };
        assert_eq!(project(&t, &person()).unwrap(), jvalue!({}));
        assert_eq!(project(&t, &jvalue!({"friends": null})).unwrap(), jvalue!({}));
    }

    #[test]
    fn test_non_record_policies() {
        let t = shape! { "age" => shape! { "years" => __ } };
        let src = jvalue!({"age": 42i64});

        assert_eq!(project(&t, &src).unwrap(), jvalue!({}));

        let pass = Projector::with_config(ProjectorConfig {
            non_record_policy: NonRecordPolicy::PassThrough,
            ..Default::default()
        });
        assert_eq!(pass.project(&t, &src).unwrap(), jvalue!({"age": 42i64}));

        let reject = Projector::with_config(ProjectorConfig {
            non_record_policy: NonRecordPolicy::Reject,
            ..Default::default()
        });
        assert!(matches!(
            reject.project(&t, &src),
            Err(ProjectionError::InvalidSource(_))
        ));
    }

    #[test]
    fn test_spread_all_keeps_source_order_and_allows_override() {
        let t = Template::new().field("foo", "bar").spread_all().field("name", "Jim");
        let out = project(&t, &person()).unwrap();
        let keys: Vec<&String> = out.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["name", "lastName", "dob", "foo"]);
        assert_eq!(out.get("name"), Some(&JValue::string("Jim")));
    }

    #[test]
    fn test_spread_some() {
        let t = shape! {
            "_" => shape! { "a" => __, "b" => __ },
            "foo" => "bar",
        };
        assert_eq!(
            project(&t, &jvalue!({"a": 1i64, "b": 2i64, "c": 3i64})).unwrap(),
            jvalue!({"a": 1i64, "b": 2i64, "foo": "bar"})
        );
    }

    #[test]
    fn test_spread_none_and_raw_underscore() {
        let t = shape! { "foo" => "bar", "_" => JValue::Null };
        assert_eq!(project(&t, &person()).unwrap(), jvalue!({"foo": "bar"}));

        let t = shape! { "_" => __.field("name") };
        assert_eq!(project(&t, &person()).unwrap(), jvalue!({"_": "John"}));

        let t = shape! { "_" => literal("foo") };
        assert_eq!(project(&t, &person()).unwrap(), jvalue!({"_": "foo"}));

        let t = shape! { "_" => __.field("missing") };
        assert_eq!(project(&t, &person()).unwrap(), jvalue!({}));
    }

    #[test]
    fn test_falsy_underscore_literal_spreads_nothing() {
        for falsy in [JValue::Bool(false), JValue::from(0i64), JValue::from(f64::NAN), JValue::from("")] {
            let t = shape! { "foo" => "bar", "_" => falsy.clone() };
            assert_eq!(project(&t, &person()).unwrap(), jvalue!({"foo": "bar"}), "_ => {falsy:?}");
        }

        let t = shape! { "_" => true };
        assert_eq!(project(&t, &person()).unwrap(), jvalue!({"_": true}));
    }

    #[test]
    fn test_source_is_not_mutated() {
        let src = person();
        let before = src.clone();
        let t = Template::new().spread_all().field("name", "changed");
        project(&t, &src).unwrap();
        assert_eq!(src, before);
        assert_eq!(src.get("name"), Some(&JValue::string("John")));
    }

    #[test]
    fn test_depth_limit() {
        let mut t = shape! { "leaf" => __ };
        for _ in 0..5 {
            t = shape! { "child" => t };
        }
        let mut src = jvalue!({"leaf": 1i64});
        for _ in 0..5 {
            let mut m = Record::new();
            m.insert("child".to_string(), src);
            src = JValue::object(m);
        }

        let shallow = Projector::with_config(ProjectorConfig {
            max_depth: 3,
            ..Default::default()
        });
        assert_eq!(
            shallow.project(&t, &src).unwrap_err(),
            ProjectionError::DepthExceeded(3)
        );

        let deep = Projector::new();
        assert_eq!(deep.project(&t, &src).unwrap(), src);
        assert_eq!(deep.depth.get(), 0);
    }

    #[test]
    fn test_array_of_records_costs_one_level_like_a_record() {
        let t = shape! { "k" => shape! { "sub" => __ } };
        let two = Projector::with_config(ProjectorConfig {
            max_depth: 2,
            ..Default::default()
        });
        assert_eq!(
            two.project(&t, &jvalue!({"k": {"sub": 1}})).unwrap(),
            jvalue!({"k": {"sub": 1}})
        );
        assert_eq!(
            two.project(&t, &jvalue!({"k": [{"sub": 1}, {"sub": 2}]})).unwrap(),
            jvalue!({"k": [{"sub": 1}, {"sub": 2}]})
        );

        let one = Projector::with_config(ProjectorConfig {
            max_depth: 1,
            ..Default::default()
        });
        for src in [jvalue!({"k": {"sub": 1}}), jvalue!({"k": [{"sub": 1}]})] {
            assert_eq!(one.project(&t, &src).unwrap_err(), ProjectionError::DepthExceeded(1));
        }
        assert_eq!(one.depth.get(), 0);
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: ProjectorConfig =
            serde_json::from_str(r#"{"non_record_policy": "pass_through"}"#).unwrap();
        assert_eq!(config.max_depth, 256);
        assert_eq!(config.non_record_policy, NonRecordPolicy::PassThrough);
    }
}
