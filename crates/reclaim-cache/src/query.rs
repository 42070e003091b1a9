//! Query documents.

use std::fmt;

/// A named selection of root fields.
///
/// Queries are built programmatically; there is no query language.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Query {
    name: String,
    fields: Vec<String>,
}

impl Query {
    /// Creates an empty query called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Adds a root field to the selection.
    #[must_use]
    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.fields.push(field.into());
        self
    }

    /// Returns the query name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the selected fields.
    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "query {} {{ {} }}", self.name, self.fields.join(" "))
    }
}
