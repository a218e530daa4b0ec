// ──────────────────────────────────────────────────────────────────────────────
// navdash-webdav · types
// ──────────────────────────────────────────────────────────────────────────────
// Credentials, DAV resource metadata parsed from multistatus bodies, and the
// trimmed-down entries handed to callers.
// ──────────────────────────────────────────────────────────────────────────────

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

// ── Credentials ──────────────────────────────────────────────────────────────

/// Endpoint and basic-auth credentials for a WebDAV server.
///
/// The password is held as a [`SecretString`] so it is redacted from `Debug`
/// output and never serialised.
#[derive(Debug)]
pub struct WebDavCredentials {
    /// WebDAV root, e.g. `https://dav.example.com/backups`.
    pub url: String,
    pub username: String,
    pub password: SecretString,
}

impl WebDavCredentials {
    pub fn new(url: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: username.into(),
            password: SecretString::new(password.into()),
        }
    }
}

// ── DAV resources ────────────────────────────────────────────────────────────

/// Resource type reported by `<d:resourcetype>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DavResourceType {
    #[default]
    File,
    Folder,
}

/// One `<d:response>` element of a multistatus body.
#[derive(Debug, Clone, Default)]
pub struct DavResource {
    /// Href exactly as sent by the server (usually URL-encoded).
    pub href: String,
    pub display_name: String,
    pub resource_type: DavResourceType,
    pub content_length: Option<u64>,
    /// RFC 1123 date from `<d:getlastmodified>`.
    pub last_modified: Option<String>,
}

// ── Caller-facing types ──────────────────────────────────────────────────────

/// A single entry below a listed directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    /// Decoded base name (no directory component).
    pub name: String,
    pub size: u64,
    pub last_modified: Option<String>,
    pub is_dir: bool,
}

/// Outcome of a connection probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionTest {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ConnectionTest {
    pub fn success() -> Self {
        Self { ok: true, reason: None }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self { ok: false, reason: Some(reason.into()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_debug_hides_password() {
        let c = WebDavCredentials::new("https://dav.test", "alice", "hunter2");
        let dbg = format!("{:?}", c);
        assert!(!dbg.contains("hunter2"));
    }

    #[test]
    fn connection_test_serialises_without_reason_on_success() {
        let json = serde_json::to_string(&ConnectionTest::success()).unwrap();
        assert_eq!(json, r#"{"ok":true}"#);
    }
}
