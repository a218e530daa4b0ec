//! # Nav Dashboard – WebDAV
//!
//! Small WebDAV client used by the backup subsystem:
//!
//! - **Listing** — depth-1 `PROPFIND` parsed into [`RemoteEntry`] values
//! - **Upload** — overwriting `PUT` with an exact `Content-Length`
//! - **Download** — `GET`, with 404 surfaced as [`WebDavErrorKind::NotFound`]
//! - **Probe** — one-shot connection test that never returns an error
//!
//! Every request is bounded by the client's timeout and retried a small
//! number of times on transport errors, 429 and 5xx responses.

pub mod types;
pub mod error;
pub mod client;

pub use client::WebDavClient;
pub use error::{WebDavError, WebDavErrorKind};
pub use types::{ConnectionTest, RemoteEntry, WebDavCredentials};
