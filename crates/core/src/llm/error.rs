use std::fmt;

/// Transport failures and schema mismatches are both surfaced through this
/// single error; the coordinator treats them identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelCallErrorKind {
    Transport,
    SchemaMismatch,
}

#[derive(Debug, Clone)]
pub struct ModelCallError {
    pub kind: ModelCallErrorKind,
    pub flow: &'static str,
    pub detail: String,
    pub raw_output: Option<String>,
}

impl ModelCallError {
    pub fn transport(flow: &'static str, detail: impl Into<String>) -> Self {
        Self {
            kind: ModelCallErrorKind::Transport,
            flow,
            detail: detail.into(),
            raw_output: None,
        }
    }

    pub fn schema_mismatch(
        flow: &'static str,
        detail: impl Into<String>,
        raw_output: Option<String>,
    ) -> Self {
        Self {
            kind: ModelCallErrorKind::SchemaMismatch,
            flow,
            detail: detail.into(),
            raw_output,
        }
    }
}

impl fmt::Display for ModelCallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "model call failed (flow={}, kind={:?}): {}",
            self.flow, self.kind, self.detail
        )
    }
}

impl std::error::Error for ModelCallError {}
