//! Redirect targets handed to the authentication entry point.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::form_urlencoded;

/// Machine-readable reason carried in the redirect query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    /// Not signed in, or signed in without the admin role.
    AdminRequired,
    /// Cached role said admin, the server said otherwise.
    SecurityMismatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectTarget {
    entry_path: String,
    reason: DenialReason,
}

impl RedirectTarget {
    pub fn new(entry_path: impl Into<String>, reason: DenialReason) -> Self {
        Self {
            entry_path: entry_path.into(),
            reason,
        }
    }

    pub fn reason(&self) -> DenialReason {
        self.reason
    }

    fn query(&self) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query.append_pair("required", "admin");
        if self.reason == DenialReason::SecurityMismatch {
            query.append_pair("reason", "security");
        }
        query.finish()
    }

    pub fn to_uri(&self) -> String {
        format!("{}?{}", self.entry_path, self.query())
    }
}

impl fmt::Display for RedirectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_uri())
    }
}
