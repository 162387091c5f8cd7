//! Cell content and identity-resolution value types.

use crate::heuristics::is_identifier;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::fmt;

// ============================================================================
// IDENTITY RESOLUTION VALUES
// ============================================================================

/// A directory identity an identifier resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedIdentity {
    pub id: String,
    pub display_name: String,
    pub object_type: String,
}

/// One typed lookup that was tried for an identifier and failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeAttempt {
    pub object_type: String,
    pub message: String,
}

/// Why an identifier could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionError {
    pub id: String,
    #[serde(default)]
    pub attempts_by_object_type: Vec<TypeAttempt>,
    pub summary_message: String,
}

/// Per-identifier outcome carried in a resolution batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResolutionEntry {
    Resolved(ResolvedIdentity),
    Failed(ResolutionError),
}

impl ResolutionEntry {
    pub fn id(&self) -> &str {
        match self {
            ResolutionEntry::Resolved(identity) => &identity.id,
            ResolutionEntry::Failed(error) => &error.id,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, ResolutionEntry::Resolved(_))
    }

    /// Badge cell for this outcome.
    pub fn to_cell(&self) -> Cell {
        match self {
            ResolutionEntry::Resolved(identity) => Cell::Resolved(Badge::from(identity)),
            ResolutionEntry::Failed(error) => Cell::Failed(Badge::from(error)),
        }
    }
}

// ============================================================================
// CELL CONTENT
// ============================================================================

/// Headline text plus supplementary detail (tooltip-level).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Badge {
    pub text: String,
    pub detail: String,
}

impl From<&ResolvedIdentity> for Badge {
    fn from(identity: &ResolvedIdentity) -> Self {
        Self {
            text: identity.display_name.clone(),
            detail: format!("{} · {}", identity.object_type, identity.id),
        }
    }
}

impl From<&ResolutionError> for Badge {
    fn from(error: &ResolutionError) -> Self {
        let detail = error
            .attempts_by_object_type
            .iter()
            .map(|attempt| format!("{}: {}", attempt.object_type, attempt.message))
            .collect::<Vec<_>>()
            .join("\n");
        Self {
            text: error.summary_message.clone(),
            detail,
        }
    }
}

/// Terminal text shown in a resolved column when there is nothing to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Placeholder {
    /// Source value was null or not an identifier.
    NotApplicable,
    /// Lookup finished without an answer for this identifier.
    NotResolved,
}

impl Placeholder {
    pub fn text(self) -> &'static str {
        match self {
            Placeholder::NotApplicable => "—",
            Placeholder::NotResolved => "Not resolved",
        }
    }
}

/// What a grid cell currently holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    /// Raw query data, including JSON null.
    Raw(Value),
    /// Slot in a resolved column that nothing has been written to.
    Empty,
    Loading,
    Resolved(Badge),
    Failed(Badge),
    Placeholder(Placeholder),
}

impl Cell {
    pub fn null() -> Self {
        Cell::Raw(Value::Null)
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Cell::Loading)
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Cell::Resolved(_))
    }

    /// Null raw data or an untouched slot.
    pub fn is_blank(&self) -> bool {
        matches!(self, Cell::Raw(Value::Null) | Cell::Empty)
    }

    pub fn raw(&self) -> Option<&Value> {
        match self {
            Cell::Raw(value) => Some(value),
            _ => None,
        }
    }

    /// Raw identifier held by this cell, lowercased for use as a lookup key.
    pub fn identifier(&self) -> Option<String> {
        match self {
            Cell::Raw(Value::String(s)) if is_identifier(s) => Some(s.to_ascii_lowercase()),
            _ => None,
        }
    }

    /// Text a renderer or exporter shows for this cell.
    pub fn display_text(&self) -> Cow<'_, str> {
        match self {
            Cell::Raw(Value::Null) | Cell::Empty => Cow::Borrowed(""),
            Cell::Raw(Value::String(s)) => Cow::Borrowed(s.as_str()),
            Cell::Raw(other) => Cow::Owned(other.to_string()),
            Cell::Loading => Cow::Borrowed("Resolving…"),
            Cell::Resolved(badge) | Cell::Failed(badge) => Cow::Borrowed(badge.text.as_str()),
            Cell::Placeholder(placeholder) => Cow::Borrowed(placeholder.text()),
        }
    }

    /// Value used when comparing cells across rows.
    pub fn comparison_value(&self) -> Value {
        match self {
            Cell::Raw(value) => value.clone(),
            Cell::Empty | Cell::Loading => Value::Null,
            other => Value::String(other.display_text().into_owned()),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_text())
    }
}

impl From<Value> for Cell {
    fn from(value: Value) -> Self {
        Cell::Raw(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn failure() -> ResolutionError {
        ResolutionError {
            id: "3f2504e0-4f89-41d3-9a0c-0305e82c3301".to_string(),
            attempts_by_object_type: vec![
                TypeAttempt {
                    object_type: "user".to_string(),
                    message: "not found".to_string(),
                },
                TypeAttempt {
                    object_type: "group".to_string(),
                    message: "no access".to_string(),
                },
            ],
            summary_message: "Identity not found".to_string(),
        }
    }

    #[test]
    fn test_error_badge_keeps_attempts_as_detail() {
        let badge = Badge::from(&failure());
        assert_eq!(badge.text, "Identity not found");
        assert_eq!(badge.detail, "user: not found\ngroup: no access");
    }

    #[test]
    fn test_identifier_is_lowercased() {
        let cell = Cell::Raw(json!("3F2504E0-4F89-41D3-9A0C-0305E82C3301"));
        assert_eq!(
            cell.identifier().as_deref(),
            Some("3f2504e0-4f89-41d3-9a0c-0305e82c3301")
        );
        assert_eq!(Cell::Raw(json!("nope")).identifier(), None);
        assert_eq!(Cell::Loading.identifier(), None);
    }

    #[test]
    fn test_display_text() {
        assert_eq!(Cell::null().display_text(), "");
        assert_eq!(Cell::Raw(json!(12)).display_text(), "12");
        assert_eq!(Cell::Raw(json!("x")).display_text(), "x");
        assert_eq!(
            Cell::Placeholder(Placeholder::NotApplicable).display_text(),
            "—"
        );
    }

    #[test]
    fn test_entry_wire_format() {
        let line = r#"{"status":"resolved","id":"a","displayName":"Alice","objectType":"user"}"#;
        let entry: ResolutionEntry = serde_json::from_str(line).unwrap();
        assert!(entry.is_resolved());
        assert_eq!(entry.id(), "a");

        let line = r#"{"status":"failed","id":"b","summaryMessage":"gone"}"#;
        let entry: ResolutionEntry = serde_json::from_str(line).unwrap();
        assert!(!entry.is_resolved());
        assert!(matches!(entry.to_cell(), Cell::Failed(badge) if badge.text == "gone"));
    }
}
