//! JSON Patch operation types (RFC 6902 subset: add/remove/replace/test).

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// The four patch operations the engine supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchKind {
    Add,
    Remove,
    Replace,
    Test,
}

impl PatchKind {
    /// Wire name of the operation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Replace => "replace",
            Self::Test => "test",
        }
    }

    /// Parse a wire name; unknown names return `None` so callers can attach
    /// their own error with the offending text.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "add" => Some(Self::Add),
            "remove" => Some(Self::Remove),
            "replace" => Some(Self::Replace),
            "test" => Some(Self::Test),
            _ => None,
        }
    }
}

/// One patch operation: `{op, path, value?}`.
///
/// `value` is meaningful for `add`/`replace`/`test`; `remove` ignores it.
/// A missing `value` on an op that uses it behaves as JSON `null`, matching
/// the tolerant treatment of candidate patches from external agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOp {
    pub op: PatchKind,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl PatchOp {
    pub fn add(path: impl Into<String>, value: Value) -> Self {
        Self {
            op: PatchKind::Add,
            path: path.into(),
            value: Some(value),
        }
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Self {
            op: PatchKind::Remove,
            path: path.into(),
            value: None,
        }
    }

    pub fn replace(path: impl Into<String>, value: Value) -> Self {
        Self {
            op: PatchKind::Replace,
            path: path.into(),
            value: Some(value),
        }
    }

    pub fn test(path: impl Into<String>, value: Value) -> Self {
        Self {
            op: PatchKind::Test,
            path: path.into(),
            value: Some(value),
        }
    }
}
