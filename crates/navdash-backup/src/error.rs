use navdash_webdav::{WebDavError, WebDavErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("WebDAV configuration is incomplete")]
    ConfigIncomplete,
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("remote error: {0}")]
    Remote(String),
    #[error("backup not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("import failed: {0}")]
    Transaction(String),
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("another backup or restore is already in progress")]
    Busy,
}

impl From<WebDavError> for BackupError {
    fn from(e: WebDavError) -> Self {
        if e.is_connection() {
            return Self::Connection(e.message);
        }
        match e.kind {
            WebDavErrorKind::NotFound => Self::NotFound(e.message),
            _ => Self::Remote(e.message),
        }
    }
}

impl BackupError {
    /// Replace every occurrence of `secret` in the message with `****`.
    pub fn scrub(self, secret: &str) -> Self {
        if secret.is_empty() {
            return self;
        }
        let clean = |s: String| s.replace(secret, "****");
        match self {
            Self::Connection(m) => Self::Connection(clean(m)),
            Self::Remote(m) => Self::Remote(clean(m)),
            Self::NotFound(m) => Self::NotFound(clean(m)),
            Self::Validation(m) => Self::Validation(clean(m)),
            Self::Transaction(m) => Self::Transaction(clean(m)),
            other => other,
        }
    }

    /// Status string recorded for a failed scheduled run.
    pub fn failure_status(&self) -> String {
        format!("failed: {self}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webdav_errors_map_by_kind() {
        let e: BackupError = WebDavError::new(WebDavErrorKind::Timeout, "timed out").into();
        assert!(matches!(e, BackupError::Connection(_)));

        let e: BackupError = WebDavError::new(WebDavErrorKind::NotFound, "GET /x → 404").into();
        assert!(matches!(e, BackupError::NotFound(_)));

        let e: BackupError = WebDavError::new(WebDavErrorKind::Unauthorized, "401").into();
        assert!(matches!(e, BackupError::Remote(_)));
    }

    #[test]
    fn scrub_replaces_every_occurrence() {
        let e = BackupError::Remote("pw=s3cret, again s3cret".into()).scrub("s3cret");
        assert_eq!(e.to_string(), "remote error: pw=****, again ****");
    }

    #[test]
    fn scrub_with_empty_secret_is_noop() {
        let e = BackupError::Connection("refused".into()).scrub("");
        assert_eq!(e.to_string(), "connection failed: refused");
    }

    #[test]
    fn failure_status_prefix() {
        assert_eq!(
            BackupError::ConfigIncomplete.failure_status(),
            "failed: WebDAV configuration is incomplete"
        );
    }
}
