//! Pipeline-stage faults.
//!
//! A `StageError` never reaches the caller: the pipeline logs it and takes
//! the degraded path.

use std::fmt;

use serde::Serialize;

/// Where a structured run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Idle,
    Classifying,
    Generating,
    Formatting,
    Done,
    Degraded,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Classifying => "classifying",
            Self::Generating => "generating",
            Self::Formatting => "formatting",
            Self::Done => "done",
            Self::Degraded => "degraded",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const PREVIEW_CHARS: usize = 120;

/// First characters of a model reply, for log lines.
pub(crate) fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("{stage} reply was not JSON: {}", preview(.raw))]
    Unparseable { stage: Stage, raw: String },

    #[error("unknown problem type: {0}")]
    UnknownProblemType(String),

    #[error("{stage} reply is not a JSON object")]
    NotAnObject { stage: Stage },
}
