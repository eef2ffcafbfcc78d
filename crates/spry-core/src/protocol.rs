//! Live-update wire messages.
//!
//! Every message is a JSON object with a `type` discriminator, sent as a
//! text frame.

use serde::{Deserialize, Serialize};

use crate::diagnostics::BuildError;
use crate::resource::ResourceId;

/// `info` kind sent right before the server closes for a restart.
pub const INFO_KIND_RESTART: &str = "restart";
/// `info` kind sent to each client when it connects.
pub const INFO_KIND_CONNECTED: &str = "connected";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LiveMessage {
    Error {
        error: String,
        #[serde(rename = "codeFrame", default, skip_serializing_if = "Option::is_none")]
        code_frame: Option<String>,
    },
    Reload,
    Update {
        changes: Vec<Change>,
    },
    Info {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        kind: Option<String>,
    },
}

impl LiveMessage {
    pub fn info(message: impl Into<String>, kind: Option<&str>) -> Self {
        LiveMessage::Info {
            message: message.into(),
            kind: kind.map(str::to_string),
        }
    }

    /// Notice broadcast by `close()` before a restart.
    pub fn restarting() -> Self {
        Self::info("Server restarting...", Some(INFO_KIND_RESTART))
    }

    /// Scoped update for a set of resources.
    pub fn update<'a>(ids: impl IntoIterator<Item = &'a ResourceId>) -> Self {
        LiveMessage::Update {
            changes: ids.into_iter().map(Change::for_resource).collect(),
        }
    }

    pub fn to_json(&self) -> String {
        // Serializing plain strings and vectors cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl From<&BuildError> for LiveMessage {
    fn from(err: &BuildError) -> Self {
        LiveMessage::Error {
            error: err.summary(),
            code_frame: err.code_frame.clone(),
        }
    }
}

/// One changed resource in an `update` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    /// Root-relative resource id, without a leading `/`
    pub id: String,
    pub kind: ChangeKind,
}

impl Change {
    pub fn for_resource(id: &ResourceId) -> Self {
        Self {
            id: id.as_str().to_owned(),
            kind: ChangeKind::for_resource(id),
        }
    }
}

/// How a client should apply a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// Swap the stylesheet in place
    Style,
    /// Re-import the module
    Script,
    /// Refetch the asset
    Asset,
}

impl ChangeKind {
    pub fn for_resource(id: &ResourceId) -> Self {
        match id.extension().map(str::to_ascii_lowercase).as_deref() {
            Some("css" | "less" | "scss" | "sass") => ChangeKind::Style,
            Some("js" | "mjs" | "cjs" | "jsx" | "ts" | "tsx" | "mts" | "json") => {
                ChangeKind::Script
            }
            _ => ChangeKind::Asset,
        }
    }
}
