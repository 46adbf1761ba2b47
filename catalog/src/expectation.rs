//! The curriculum expectation entity.

use serde::{Deserialize, Serialize};

/// A curriculum-standard statement that lessons and units are tagged
/// against, e.g. `B1.2: count to 50 by 1s, 2s, 5s, and 10s`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expectation {
    /// Unique identifier.
    pub id: String,

    /// Short curriculum code (e.g. "B1.2").
    pub code: String,

    /// Free-text description of the expectation.
    pub description: String,

    /// Subject area (e.g. "Mathematics").
    pub subject: String,

    /// Grade level.
    pub grade: i32,

    /// Strand or domain within the subject, when the curriculum has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strand: Option<String>,
}

impl Expectation {
    /// Create a new expectation.
    pub fn new(
        id: impl Into<String>,
        code: impl Into<String>,
        description: impl Into<String>,
        subject: impl Into<String>,
        grade: i32,
    ) -> Self {
        Self {
            id: id.into(),
            code: code.into(),
            description: description.into(),
            subject: subject.into(),
            grade,
            strand: None,
        }
    }

    /// Set the strand.
    pub fn with_strand(mut self, strand: impl Into<String>) -> Self {
        self.strand = Some(strand.into());
        self
    }

    /// The text that gets embedded for this expectation.
    ///
    /// Deterministic projection: the same expectation always embeds the
    /// same string, so stored vectors stay comparable across runs.
    pub fn embeddable_text(&self) -> String {
        format!("{}: {}", self.code, self.description)
    }
}
