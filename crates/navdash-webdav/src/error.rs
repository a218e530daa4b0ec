use std::fmt;

/// Broad classification of WebDAV failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebDavErrorKind {
    /// The configured URL could not be parsed or has an unsupported scheme.
    InvalidUrl,
    /// Transport-level failure: DNS, refused connection, TLS.
    ConnectionFailed,
    Timeout,
    /// 401 / 403 from the server.
    Unauthorized,
    NotFound,
    /// Any other non-success status.
    Http,
    /// The multistatus body could not be parsed.
    Parse,
}

#[derive(Debug, Clone)]
pub struct WebDavError {
    pub kind: WebDavErrorKind,
    pub message: String,
}

impl fmt::Display for WebDavError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for WebDavError {}

impl WebDavError {
    pub fn new(kind: WebDavErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn invalid_url(url: &str, reason: impl fmt::Display) -> Self {
        Self::new(WebDavErrorKind::InvalidUrl, format!("invalid WebDAV URL '{url}': {reason}"))
    }

    /// `true` for failures where the server was never reached.
    pub fn is_connection(&self) -> bool {
        matches!(
            self.kind,
            WebDavErrorKind::InvalidUrl | WebDavErrorKind::ConnectionFailed | WebDavErrorKind::Timeout
        )
    }
}

impl From<reqwest::Error> for WebDavError {
    fn from(e: reqwest::Error) -> Self {
        // Strip the URL: it may carry userinfo.
        let e = e.without_url();
        let kind = if e.is_timeout() {
            WebDavErrorKind::Timeout
        } else if e.is_connect() || e.is_request() {
            WebDavErrorKind::ConnectionFailed
        } else {
            WebDavErrorKind::Http
        };
        Self::new(kind, e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_message() {
        let e = WebDavError::new(WebDavErrorKind::NotFound, "GET /x → 404");
        assert_eq!(e.to_string(), "GET /x → 404");
    }

    #[test]
    fn connection_kinds() {
        assert!(WebDavError::invalid_url("nope", "relative URL").is_connection());
        assert!(WebDavError::new(WebDavErrorKind::Timeout, "t").is_connection());
        assert!(!WebDavError::new(WebDavErrorKind::Unauthorized, "u").is_connection());
    }
}
