// whereselect - Declarative where/select projection for in-memory records
// Copyright (c) 2025 whereselect contributors
// Licensed under the MIT License

//! # whereselect
//!
//! Describe the shape of the records you want instead of writing the loop that
//! builds them. A *shape template* maps output keys to directives (copy, rename,
//! literal, compute, nested projection, spread) and the projection engine
//! resolves it against each source record.
//!
//! ## Architecture
//!
//! - `value` - `JValue`, the ordered record/value model
//! - `sentinel` - the `__` token and `__.field(name)` accessors
//! - `template` - `Directive`, `Template`, builders and the `shape!` macro
//! - `projector` - the projection engine
//! - `query` - `from(..)`, the chainable collection wrapper
//!
//! ## Example
//!
//! ```
//! use whereselect::{from, jvalue, shape, compute, __};
//!
//! let people = jvalue!([
//!     {"name": "John", "lastName": "Doe", "dob": "1972-09-20"},
//!     {"name": "Jane", "lastName": "Doe", "dob": "1976-02-27"}
//! ]);
//!
//! let result = from(people)
//!     .matching(jvalue!({"name": "John"}))
//!     .select(&shape! {
//!         "first" => __.field("name"),
//!         "dob" => __,
//!         "kind" => "person",
//!         "full" => compute(|r| {
//!             let part = |k: &str| r.field(k).as_str().unwrap_or_default().to_string();
//!             format!("{} {}", part("name"), part("lastName"))
//!         }),
//!     })
//!     .unwrap();
//!
//! assert_eq!(
//!     result,
//!     jvalue!([{"first": "John", "dob": "1972-09-20", "kind": "person", "full": "John Doe"}])
//! );
//! ```

pub mod projector;
pub mod query;
pub mod sentinel;
pub mod template;
pub mod value;

pub use projector::{project, NonRecordPolicy, ProjectionError, Projector, ProjectorConfig, Result};
pub use query::{from, Query};
pub use sentinel::{field, FieldRef, Sentinel, __};
pub use template::{
    compute, identity, literal, nested, rename, try_compute, Directive, Template,
    UnderscoreDirective, SPREAD_KEY,
};
pub use value::{JValue, Record};

#[doc(hidden)]
pub mod __private {
    pub use serde_json;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crate_version() {
        assert_eq!(env!("CARGO_PKG_VERSION"), "0.1.0");
    }

    #[test]
    fn test_sentinel_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync + 'static>(_: T) {}
        assert_send_sync(__);
        assert_send_sync(field("name"));
    }
}
