// ──────────────────────────────────────────────────────────────────────────────
// navdash-webdav · client
// ──────────────────────────────────────────────────────────────────────────────
// Low-level HTTP client for a generic WebDAV endpoint covering:
//  • PROPFIND listing, PUT upload, GET download
//  • Basic auth with a secret password
//  • Per-request timeout, retry with exponential back-off & 429 handling
//  • WebDAV multistatus XML parsing
// ──────────────────────────────────────────────────────────────────────────────

use crate::error::{WebDavError, WebDavErrorKind};
use crate::types::*;
use log::{debug, warn};
use percent_encoding::percent_decode_str;
use reqwest::{header, Client, Method, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use url::Url;

const MAX_RETRIES: u32 = 2;
const INITIAL_BACKOFF_MS: u64 = 500;
/// Longest pause between attempts. A 429 asking for more is not retried.
const MAX_RETRY_WAIT_MS: u64 = 5_000;
const MAX_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default bound for a single request, including body transfer.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const PROPFIND_BODY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<d:propfind xmlns:d="DAV:">
  <d:prop>
    <d:displayname/>
    <d:getcontentlength/>
    <d:getlastmodified/>
    <d:resourcetype/>
  </d:prop>
</d:propfind>"#;

/// WebDAV client bound to one endpoint and one set of credentials.
///
/// Construction performs no network I/O; unreachable servers surface on the
/// first request.
#[derive(Debug)]
pub struct WebDavClient {
    http: Client,
    base_url: Url,
    username: String,
    password: SecretString,
    max_retries: u32,
}

impl WebDavClient {
    // ── Constructors ─────────────────────────────────────────────────────

    pub fn connect(credentials: &WebDavCredentials, timeout: Duration) -> Result<Self, WebDavError> {
        let base_url = parse_base_url(&credentials.url)?;
        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(MAX_CONNECT_TIMEOUT))
            .build()
            .map_err(|e| {
                WebDavError::new(WebDavErrorKind::ConnectionFailed, format!("build HTTP client: {e}"))
            })?;

        let client = Self {
            http,
            base_url,
            username: credentials.username.clone(),
            password: SecretString::new(credentials.password.expose_secret().clone()),
            max_retries: MAX_RETRIES,
        };
        debug!("WebDAV client for {}", client.log_label());
        Ok(client)
    }

    /// Override the retry budget (0 disables retries).
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Endpoint and user for log lines. The password is always `****`.
    fn log_label(&self) -> String {
        format!("{} as {} (password ****)", self.base_url, self.username)
    }

    // ── Addressing ───────────────────────────────────────────────────────

    /// Absolute URL of `path` below the WebDAV root. A trailing `/` on
    /// `path` (or an empty path) yields a collection URL.
    pub fn resource_url(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        let collection = path.is_empty() || path.ends_with('/');
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty();
            for seg in path.split('/').filter(|s| !s.is_empty()) {
                segments.push(seg);
            }
            if collection {
                segments.push("");
            }
        }
        url
    }

    fn apply_auth(&self, req: RequestBuilder) -> RequestBuilder {
        req.basic_auth(&self.username, Some(self.password.expose_secret()))
    }

    // ── WebDAV methods ───────────────────────────────────────────────────

    /// Depth-1 PROPFIND, parsed into `DavResource` items. The first item is
    /// usually the collection itself.
    pub async fn propfind(&self, path: &str) -> Result<Vec<DavResource>, WebDavError> {
        let url = self.resource_url(path);
        let method = Method::from_bytes(b"PROPFIND")
            .map_err(|e| WebDavError::new(WebDavErrorKind::Http, e.to_string()))?;
        let req = self
            .http
            .request(method, url.clone())
            .header("Depth", "1")
            .header(header::CONTENT_TYPE, "application/xml; charset=utf-8")
            .body(PROPFIND_BODY);

        let resp = self.send_with_retry(self.apply_auth(req)).await?;
        let status = resp.status();
        if status == StatusCode::MULTI_STATUS || status.is_success() {
            let text = resp.text().await?;
            parse_multistatus_xml(&text)
        } else {
            Err(status_error("PROPFIND", &url, resp).await)
        }
    }

    /// Entries directly below `path`, excluding the directory itself.
    pub async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>, WebDavError> {
        let dir = if path.ends_with('/') {
            path.to_string()
        } else {
            format!("{path}/")
        };
        let own_path = normalize_path(self.resource_url(&dir).path());
        let resources = self.propfind(&dir).await?;

        Ok(resources
            .into_iter()
            .filter(|r| normalize_path(&href_path(&r.href)) != own_path)
            .map(|r| RemoteEntry {
                name: display_name_from_href(&r.href).unwrap_or(r.display_name),
                size: r.content_length.unwrap_or(0),
                last_modified: r.last_modified,
                is_dir: r.resource_type == DavResourceType::Folder,
            })
            .collect())
    }

    /// WebDAV PUT. Always overwrites whatever exists at `path`.
    pub async fn upload(&self, path: &str, data: Vec<u8>) -> Result<(), WebDavError> {
        let url = self.resource_url(path);
        let len = data.len();
        let req = self
            .http
            .put(url.clone())
            .header(header::CONTENT_TYPE, "application/json; charset=utf-8")
            .header(header::CONTENT_LENGTH, len)
            .header("Overwrite", "T")
            .body(data);

        let resp = self.send_with_retry(self.apply_auth(req)).await?;
        if resp.status().is_success() {
            debug!("PUT {} ({} bytes) → {}", url.path(), len, resp.status());
            Ok(())
        } else {
            Err(status_error("PUT", &url, resp).await)
        }
    }

    /// WebDAV GET (download file). Returns raw bytes.
    pub async fn download(&self, path: &str) -> Result<Vec<u8>, WebDavError> {
        let url = self.resource_url(path);
        let req = self.http.get(url.clone());
        let resp = self.send_with_retry(self.apply_auth(req)).await?;
        if resp.status().is_success() {
            Ok(resp.bytes().await?.to_vec())
        } else {
            Err(status_error("GET", &url, resp).await)
        }
    }

    /// One depth-1 PROPFIND on the root. Errors are folded into the result.
    pub async fn test_connection(&self) -> ConnectionTest {
        match self.propfind("/").await {
            Ok(_) => ConnectionTest::success(),
            Err(e) => ConnectionTest::failure(e.message),
        }
    }

    // ── Retry engine ─────────────────────────────────────────────────────

    async fn send_with_retry(&self, req: RequestBuilder) -> Result<Response, WebDavError> {
        let request = req.build()?;
        let mut attempt = 0u32;

        loop {
            let cloned = request.try_clone().ok_or_else(|| {
                WebDavError::new(WebDavErrorKind::Http, "request body is not clonable")
            })?;

            match self.http.execute(cloned).await {
                Ok(resp) => {
                    let status = resp.status();
                    if status == StatusCode::TOO_MANY_REQUESTS && attempt < self.max_retries {
                        let retry_after = resp
                            .headers()
                            .get(header::RETRY_AFTER)
                            .and_then(|v| v.to_str().ok());
                        let Some(wait) = retry_after_ms(retry_after, attempt) else {
                            warn!("429 rate-limited beyond {}ms, giving up", MAX_RETRY_WAIT_MS);
                            return Ok(resp);
                        };
                        warn!("429 rate-limited, waiting {}ms (attempt {})", wait, attempt);
                        tokio::time::sleep(Duration::from_millis(wait)).await;
                        attempt += 1;
                        continue;
                    }
                    if status.is_server_error() && attempt < self.max_retries {
                        let wait = backoff_ms(attempt);
                        warn!("{} server error, retrying in {}ms", status, wait);
                        tokio::time::sleep(Duration::from_millis(wait)).await;
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(e.into());
                    }
                    let wait = backoff_ms(attempt);
                    debug!("request error, retrying in {}ms: {}", wait, e.without_url());
                    tokio::time::sleep(Duration::from_millis(wait)).await;
                    attempt += 1;
                }
            }
        }
    }
}

// ── Free-standing helpers ────────────────────────────────────────────────────

fn backoff_ms(attempt: u32) -> u64 {
    INITIAL_BACKOFF_MS
        .saturating_mul(2u64.saturating_pow(attempt))
        .min(MAX_RETRY_WAIT_MS)
}

/// Wait before retrying a 429. Delay-seconds above the cap yield `None`;
/// a missing or HTTP-date header falls back to the back-off schedule.
fn retry_after_ms(retry_after: Option<&str>, attempt: u32) -> Option<u64> {
    match retry_after.and_then(|v| v.trim().parse::<u64>().ok()) {
        Some(secs) => {
            let ms = secs.saturating_mul(1000);
            (ms <= MAX_RETRY_WAIT_MS).then_some(ms)
        }
        None => Some(backoff_ms(attempt)),
    }
}

fn parse_base_url(raw: &str) -> Result<Url, WebDavError> {
    let url = Url::parse(raw.trim()).map_err(|e| WebDavError::invalid_url(raw, e))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(WebDavError::invalid_url(raw, "scheme must be http or https"));
    }
    if url.cannot_be_a_base() {
        return Err(WebDavError::invalid_url(raw, "not a hierarchical URL"));
    }
    Ok(url)
}

/// Map a non-success response to a typed error. The body is truncated and
/// the URL reduced to its path.
async fn status_error(method: &str, url: &Url, resp: Response) -> WebDavError {
    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    let snippet: String = text.chars().take(200).collect();
    let kind = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => WebDavErrorKind::Unauthorized,
        StatusCode::NOT_FOUND => WebDavErrorKind::NotFound,
        _ => WebDavErrorKind::Http,
    };
    let message = if snippet.trim().is_empty() {
        format!("{} {} → {}", method, url.path(), status)
    } else {
        format!("{} {} → {}: {}", method, url.path(), status, snippet.trim())
    };
    WebDavError::new(kind, message)
}

/// Path component of an href, which may be absolute or server-relative.
fn href_path(href: &str) -> String {
    match Url::parse(href) {
        Ok(u) => u.path().to_string(),
        Err(_) => href.to_string(),
    }
}

fn normalize_path(path: &str) -> String {
    percent_decode_str(path)
        .decode_utf8_lossy()
        .trim_end_matches('/')
        .to_string()
}

/// Decoded last path segment of an href.
fn display_name_from_href(href: &str) -> Option<String> {
    let path = normalize_path(&href_path(href));
    path.rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

// ── WebDAV XML Parser ────────────────────────────────────────────────────────

/// Parse a WebDAV multistatus XML body into `DavResource` entries.
pub fn parse_multistatus_xml(xml: &str) -> Result<Vec<DavResource>, WebDavError> {
    use quick_xml::events::Event;
    use quick_xml::Reader;

    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut resources: Vec<DavResource> = Vec::new();
    let mut current: Option<DavResource> = None;
    let mut current_tag: Option<String> = None;
    let mut buf = Vec::new();
    let mut is_collection = false;
    let mut in_resourcetype = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let local = local_name(e.name().as_ref());
                match local.as_str() {
                    "response" => {
                        current = Some(DavResource::default());
                        is_collection = false;
                    }
                    "resourcetype" => in_resourcetype = true,
                    "collection" if in_resourcetype => is_collection = true,
                    "href" | "displayname" | "getcontentlength" | "getlastmodified" => {
                        current_tag = Some(local);
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(ref e)) => {
                let local = local_name(e.name().as_ref());
                if local == "collection" && in_resourcetype {
                    is_collection = true;
                }
            }
            Ok(Event::Text(ref e)) => {
                if let (Some(tag), Some(res)) = (current_tag.as_deref(), current.as_mut()) {
                    let text = e
                        .unescape()
                        .map_err(|err| WebDavError::new(WebDavErrorKind::Parse, format!("XML text: {err}")))?
                        .to_string();
                    match tag {
                        "href" => res.href = text,
                        "displayname" => res.display_name = text,
                        "getcontentlength" => res.content_length = text.parse().ok(),
                        "getlastmodified" => res.last_modified = Some(text),
                        _ => {}
                    }
                }
            }
            Ok(Event::End(ref e)) => {
                let local = local_name(e.name().as_ref());
                match local.as_str() {
                    "response" => {
                        if let Some(mut res) = current.take() {
                            if is_collection {
                                res.resource_type = DavResourceType::Folder;
                            }
                            if res.display_name.is_empty() {
                                res.display_name = display_name_from_href(&res.href).unwrap_or_default();
                            }
                            resources.push(res);
                        }
                    }
                    "resourcetype" => in_resourcetype = false,
                    _ => {
                        if current_tag.as_deref() == Some(local.as_str()) {
                            current_tag = None;
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(WebDavError::new(WebDavErrorKind::Parse, format!("XML parse error: {e}")))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(resources)
}

/// Extract the local name from a possibly-namespaced XML tag.
fn local_name(raw: &[u8]) -> String {
    let s = String::from_utf8_lossy(raw);
    match s.rfind(':') {
        Some(pos) => s[pos + 1..].to_string(),
        None => s.to_string(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
