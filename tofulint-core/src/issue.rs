//! Issues emitted by rules.

use crate::syntax::Range;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Notice,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Notice => "notice",
        };
        f.pad(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub rule: String,
    pub severity: Severity,
    pub message: String,
    pub range: Range,
    pub link: String,
    /// A fix was offered for this issue.
    pub fixable: bool,
    /// The fix was queued successfully.
    pub fixed: bool,
}

/// Sort issues by file, position and rule name.
pub fn sort_issues(issues: &mut [Issue]) {
    issues.sort_by(|a, b| {
        a.range
            .sort_key()
            .cmp(&b.range.sort_key())
            .then_with(|| a.rule.cmp(&b.rule))
    });
}
