// Sentinel token: the "copy this field" marker used inside shape templates
//
// Rust cannot name an item `_`, so the token is spelled `__`. Bare, it means
// "copy the same-named field"; `__.field("name")` means "read field `name`".

/// The sentinel token type. Stateless; there is only ever one meaningful value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Sentinel;

/// The process-wide sentinel token.
pub const __: Sentinel = Sentinel;

impl Sentinel {
    /// Build an accessor for a named source field.
    ///
    /// No lookup happens here; the engine reads the field when the template is
    /// resolved, so naming a field that no record has is always legal.
    #[inline]
    pub fn field(self, name: impl Into<String>) -> FieldRef {
        FieldRef { name: name.into() }
    }
}

/// An inert accessor describing which source field to read.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
    name: String,
}

impl FieldRef {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn into_name(self) -> String {
        self.name
    }
}

/// Shorthand for `__.field(name)`.
#[inline]
pub fn field(name: impl Into<String>) -> FieldRef {
    __.field(name)
}
