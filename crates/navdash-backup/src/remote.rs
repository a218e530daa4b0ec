//! Seam between the backup service and the WebDAV client.
//!
//! Every operation asks a [`RemoteConnector`] for a fresh [`RemoteStore`]
//! built from the credentials read at that moment, so a configuration
//! change takes effect on the next run without any global client handle.

use async_trait::async_trait;
use navdash_webdav::client::DEFAULT_TIMEOUT;
use navdash_webdav::{ConnectionTest, RemoteEntry, WebDavClient, WebDavCredentials, WebDavError};
use std::time::Duration;

#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>, WebDavError>;
    async fn upload(&self, path: &str, data: Vec<u8>) -> Result<(), WebDavError>;
    async fn download(&self, path: &str) -> Result<Vec<u8>, WebDavError>;

    async fn test_connection(&self) -> ConnectionTest {
        match self.list("/").await {
            Ok(_) => ConnectionTest::success(),
            Err(e) => ConnectionTest::failure(e.message),
        }
    }
}

pub trait RemoteConnector: Send + Sync {
    fn connect(&self, credentials: &WebDavCredentials) -> Result<Box<dyn RemoteStore>, WebDavError>;
}

#[async_trait]
impl RemoteStore for WebDavClient {
    async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>, WebDavError> {
        WebDavClient::list(self, path).await
    }

    async fn upload(&self, path: &str, data: Vec<u8>) -> Result<(), WebDavError> {
        WebDavClient::upload(self, path, data).await
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>, WebDavError> {
        WebDavClient::download(self, path).await
    }

    async fn test_connection(&self) -> ConnectionTest {
        WebDavClient::test_connection(self).await
    }
}

/// Connector producing real [`WebDavClient`]s.
#[derive(Debug, Clone)]
pub struct WebDavConnector {
    timeout: Duration,
}

impl WebDavConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for WebDavConnector {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl RemoteConnector for WebDavConnector {
    fn connect(&self, credentials: &WebDavCredentials) -> Result<Box<dyn RemoteStore>, WebDavError> {
        Ok(Box::new(WebDavClient::connect(credentials, self.timeout)?))
    }
}

// ── Test doubles ─────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use navdash_webdav::WebDavErrorKind;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// In-memory remote shared by every store the connector hands out.
    #[derive(Default)]
    pub struct FakeRemote {
        pub files: Mutex<BTreeMap<String, Vec<u8>>>,
        pub connects: AtomicUsize,
        pub uploads: AtomicUsize,
        /// When set, every operation fails with this error.
        pub fail_with: Mutex<Option<WebDavError>>,
        /// Artificial latency for uploads.
        pub upload_delay: Mutex<Option<Duration>>,
    }

    impl FakeRemote {
        pub fn connect_count(&self) -> usize {
            self.connects.load(Ordering::SeqCst)
        }

        pub fn put_file(&self, name: &str, data: &[u8]) {
            self.files.lock().unwrap().insert(name.to_string(), data.to_vec());
        }

        pub fn file(&self, name: &str) -> Option<Vec<u8>> {
            self.files.lock().unwrap().get(name).cloned()
        }

        pub fn fail(&self, kind: WebDavErrorKind, message: &str) {
            *self.fail_with.lock().unwrap() = Some(WebDavError::new(kind, message));
        }

        fn check(&self) -> Result<(), WebDavError> {
            match self.fail_with.lock().unwrap().clone() {
                Some(e) => Err(e),
                None => Ok(()),
            }
        }
    }

    pub struct FakeConnector(pub Arc<FakeRemote>);

    struct FakeStore(Arc<FakeRemote>);

    impl RemoteConnector for FakeConnector {
        fn connect(&self, _credentials: &WebDavCredentials) -> Result<Box<dyn RemoteStore>, WebDavError> {
            self.0.connects.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeStore(self.0.clone())))
        }
    }

    #[async_trait]
    impl RemoteStore for FakeStore {
        async fn list(&self, _path: &str) -> Result<Vec<RemoteEntry>, WebDavError> {
            self.0.check()?;
            Ok(self
                .0
                .files
                .lock()
                .unwrap()
                .iter()
                .map(|(name, data)| RemoteEntry {
                    name: name.trim_start_matches('/').to_string(),
                    size: data.len() as u64,
                    last_modified: None,
                    is_dir: false,
                })
                .collect())
        }

        async fn upload(&self, path: &str, data: Vec<u8>) -> Result<(), WebDavError> {
            self.0.check()?;
            let delay = *self.0.upload_delay.lock().unwrap();
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }
            self.0.uploads.fetch_add(1, Ordering::SeqCst);
            self.0.put_file(path.trim_start_matches('/'), &data);
            Ok(())
        }

        async fn download(&self, path: &str) -> Result<Vec<u8>, WebDavError> {
            self.0.check()?;
            self.0
                .file(path.trim_start_matches('/'))
                .ok_or_else(|| WebDavError::new(WebDavErrorKind::NotFound, format!("GET {path} → 404")))
        }
    }
}
