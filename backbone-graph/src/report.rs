//! Validation issues and the report they accumulate into

use backbone_core::{BackboneError, NodeId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IssueSeverity {
    Warning,
    Error,
    Critical,
}

impl IssueSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueSeverity::Warning => "WARNING",
            IssueSeverity::Error => "ERROR",
            IssueSeverity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for IssueSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Issue found during normalization or validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub severity: IssueSeverity,
    /// Check or phase that raised the issue
    pub component: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<NodeId>,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_suggestion: Option<String>,
}

impl ValidationIssue {
    pub fn new(severity: IssueSeverity, component: &str, description: impl Into<String>) -> Self {
        Self {
            severity,
            component: component.to_string(),
            node: None,
            description: description.into(),
            recovery_suggestion: None,
        }
    }

    pub fn warning(component: &str, description: impl Into<String>) -> Self {
        Self::new(IssueSeverity::Warning, component, description)
    }

    pub fn error(component: &str, description: impl Into<String>) -> Self {
        Self::new(IssueSeverity::Error, component, description)
    }

    pub fn critical(component: &str, description: impl Into<String>) -> Self {
        Self::new(IssueSeverity::Critical, component, description)
    }

    /// Issue for a recovered per-record error, using the error class as component
    pub fn from_error(err: &BackboneError) -> Self {
        let severity = if err.is_fatal() {
            IssueSeverity::Critical
        } else {
            IssueSeverity::Warning
        };
        Self::new(severity, err.kind(), err.to_string())
    }

    pub fn at(mut self, node: NodeId) -> Self {
        self.node = Some(node);
        self
    }

    pub fn suggest(mut self, suggestion: &str) -> Self {
        self.recovery_suggestion = Some(suggestion.to_string());
        self
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.component)?;
        if let Some(node) = self.node {
            write!(f, " node {}", node)?;
        }
        write!(f, ": {}", self.description)
    }
}

/// Ordered list of issues from one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub created: DateTime<Utc>,
    pub issues: Vec<ValidationIssue>,
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            created: Utc::now(),
            issues: Vec::new(),
        }
    }

    pub fn push(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    pub fn extend(&mut self, issues: impl IntoIterator<Item = ValidationIssue>) {
        self.issues.extend(issues);
    }

    /// Append the issues of another report, keeping the earlier timestamp
    pub fn merge(&mut self, other: ValidationReport) {
        self.created = self.created.min(other.created);
        self.issues.extend(other.issues);
    }

    /// True without any `Error` or `Critical` issue
    pub fn is_valid(&self) -> bool {
        self.issues
            .iter()
            .all(|i| i.severity == IssueSeverity::Warning)
    }

    pub fn count(&self, severity: IssueSeverity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn by_component<'a>(&'a self, component: &'a str) -> impl Iterator<Item = &'a ValidationIssue> + 'a {
        self.issues.iter().filter(move |i| i.component == component)
    }

    pub fn to_json(&self) -> Result<String, BackboneError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Flat text rendering, one issue per line after a summary header
    pub fn render_text(&self) -> String {
        let mut out = format!(
            "Validation report {}\nvalid: {}, warnings: {}, errors: {}, critical: {}\n",
            self.created.format("%Y-%m-%d %H:%M:%S"),
            self.is_valid(),
            self.count(IssueSeverity::Warning),
            self.count(IssueSeverity::Error),
            self.count(IssueSeverity::Critical),
        );
        for issue in &self.issues {
            out.push_str(&issue.to_string());
            if let Some(suggestion) = &issue.recovery_suggestion {
                out.push_str(" (");
                out.push_str(suggestion);
                out.push(')');
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validity_by_severity() {
        let mut report = ValidationReport::new();
        assert!(report.is_valid());
        report.push(ValidationIssue::warning("roots", "two incertae sedis roots"));
        assert!(report.is_valid());
        report.push(ValidationIssue::error("rank_order", "genus below species").at(NodeId(4)));
        assert!(!report.is_valid());
        assert_eq!(report.count(IssueSeverity::Warning), 1);
        assert_eq!(report.count(IssueSeverity::Error), 1);
        assert_eq!(report.by_component("rank_order").count(), 1);
    }

    #[test]
    fn test_from_error() {
        let issue = ValidationIssue::from_error(&BackboneError::CycleDetected("A > B > A".into()));
        assert_eq!(issue.severity, IssueSeverity::Warning);
        assert_eq!(issue.component, "CycleDetected");

        let issue = ValidationIssue::from_error(&BackboneError::CorruptStream("eof".into()));
        assert_eq!(issue.severity, IssueSeverity::Critical);
    }

    #[test]
    fn test_render_text() {
        let mut report = ValidationReport::new();
        report.push(
            ValidationIssue::error("synonyms", "synonym without accepted")
                .at(NodeId(7))
                .suggest("link an accepted name"),
        );
        let text = report.render_text();
        assert!(text.contains("valid: false"));
        assert!(text.contains("[ERROR] synonyms node 7: synonym without accepted (link an accepted name)"));
    }

    #[test]
    fn test_merge_and_json() {
        let mut a = ValidationReport::new();
        a.push(ValidationIssue::warning("x", "one"));
        let mut b = ValidationReport::new();
        b.push(ValidationIssue::critical("y", "two"));
        a.merge(b);
        assert_eq!(a.len(), 2);

        let json = a.to_json().unwrap();
        let back: ValidationReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.issues, a.issues);
    }
}
