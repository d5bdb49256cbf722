//! Data passed between pipeline stages.

use std::fmt;

use glimpse_core::raw_text;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::{Stage, StageError};

/// The four problem categories the classifier may choose from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemType {
    Coding,
    MultipleChoice,
    Math,
    General,
}

impl ProblemType {
    pub const ALL: [ProblemType; 4] = [
        Self::Coding,
        Self::MultipleChoice,
        Self::Math,
        Self::General,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Coding => "coding",
            Self::MultipleChoice => "multiple_choice",
            Self::Math => "math",
            Self::General => "general",
        }
    }

    /// Parse a classifier label. Case and surrounding whitespace are ignored;
    /// anything else outside the four labels is rejected.
    pub fn parse(label: &str) -> Option<Self> {
        let label = label.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|t| t.as_str() == label)
    }

    pub fn is_coding(self) -> bool {
        self == Self::Coding
    }
}

impl fmt::Display for ProblemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of the classification stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemInfo {
    pub problem_type: ProblemType,

    /// Extracted problem text; may be empty.
    #[serde(default)]
    pub problem_statement: String,

    /// Auxiliary fields (`language`, `code_snippet`, `options`, `context`),
    /// all optional and untyped.
    #[serde(default)]
    pub details: Map<String, Value>,
}

impl ProblemInfo {
    /// Interpret a classifier reply. Only an unusable `problem_type` is an
    /// error; a missing statement or details block is tolerated.
    pub fn from_value(value: Value) -> Result<Self, StageError> {
        if let Some(raw) = raw_text(&value) {
            return Err(StageError::Unparseable {
                stage: Stage::Classifying,
                raw: raw.to_string(),
            });
        }
        let Value::Object(mut obj) = value else {
            return Err(StageError::NotAnObject {
                stage: Stage::Classifying,
            });
        };

        let problem_type = match obj.get("problem_type") {
            Some(Value::String(label)) => ProblemType::parse(label)
                .ok_or_else(|| StageError::UnknownProblemType(label.clone()))?,
            Some(other) => return Err(StageError::UnknownProblemType(other.to_string())),
            None => return Err(StageError::UnknownProblemType("<missing>".into())),
        };

        let problem_statement = match obj.remove("problem_statement") {
            Some(Value::String(s)) => s,
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };

        let details = match obj.remove("details") {
            Some(Value::Object(details)) => details,
            _ => Map::new(),
        };

        Ok(Self {
            problem_type,
            problem_statement,
            details,
        })
    }

    /// The value handed to the context encoder.
    pub fn to_value(&self) -> Value {
        json!({
            "problem_type": self.problem_type.as_str(),
            "problem_statement": self.problem_statement,
            "details": self.details,
        })
    }

    /// A non-empty string detail.
    pub fn detail(&self, key: &str) -> Option<&str> {
        self.details
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Output of the generation stage: the contents of the `solution` wrapper.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SolutionData {
    #[serde(default)]
    pub solution: Map<String, Value>,
}

impl SolutionData {
    /// Interpret a generator reply. A reply without the `solution` wrapper
    /// is an empty solution, not an error.
    pub fn from_value(value: Value) -> Result<Self, StageError> {
        if let Some(raw) = raw_text(&value) {
            return Err(StageError::Unparseable {
                stage: Stage::Generating,
                raw: raw.to_string(),
            });
        }
        let Value::Object(mut obj) = value else {
            return Err(StageError::NotAnObject {
                stage: Stage::Generating,
            });
        };
        let solution = match obj.remove("solution") {
            Some(Value::Object(solution)) => solution,
            _ => Map::new(),
        };
        Ok(Self { solution })
    }

    pub fn is_empty(&self) -> bool {
        self.solution.is_empty()
    }

    /// A field rendered as text, if present and non-blank.
    pub fn text(&self, key: &str) -> Option<String> {
        self.solution.get(key).and_then(value_text)
    }

    /// A field read as a list of non-blank entries. A lone string counts as
    /// a single entry.
    pub fn list(&self, key: &str) -> Vec<String> {
        match self.solution.get(key) {
            Some(Value::Array(items)) => items.iter().filter_map(value_text).collect(),
            Some(other) => value_text(other).into_iter().collect(),
            None => Vec::new(),
        }
    }
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => {
            let lines: Vec<String> = items.iter().filter_map(value_text).collect();
            (!lines.is_empty()).then(|| lines.join("\n"))
        }
        Value::Object(obj) if obj.is_empty() => None,
        Value::Object(_) => Some(value.to_string()),
    }
}
