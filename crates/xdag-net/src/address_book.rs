//! Whitelist and gossip address book.
//!
//! The book holds two sets. The whitelist is authoritative: it gates inbound
//! connections and is replaced as a whole when a fresh copy is downloaded.
//! The NetDB accumulates addresses gossiped by peers and only grows.
//!
//! Every file and network failure is logged and leaves the previous state in
//! place; nothing here aborts node startup.

use crate::error::{NetError, Result};
use crate::netdb::NetDb;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where a fresh whitelist comes from.
#[async_trait]
pub trait WhitelistSource: Send + Sync {
    /// Download the whitelist text (`ip:port` per line).
    async fn fetch(&self) -> Result<String>;
}

/// Downloads the whitelist over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpWhitelistSource {
    client: reqwest::Client,
    url: String,
}

impl HttpWhitelistSource {
    /// Source for `url` with a request `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Whitelist`] for an unparsable URL and
    /// [`NetError::Http`] if the client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let url = url.into();
        reqwest::Url::parse(&url).map_err(|e| NetError::Whitelist(format!("{url}: {e}")))?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }

    /// Whitelist location.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl WhitelistSource for HttpWhitelistSource {
    async fn fetch(&self) -> Result<String> {
        let response = self.client.get(&self.url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}

/// Whitelist plus accumulated gossip addresses.
pub struct AddressBook {
    static_whitelist: Vec<SocketAddr>,
    whitelist_path: Option<PathBuf>,
    source: Option<Arc<dyn WhitelistSource>>,
    whitelist: RwLock<NetDb>,
    netdb: RwLock<NetDb>,
}

impl AddressBook {
    /// Empty book.
    ///
    /// `static_whitelist` is always part of the whitelist. `whitelist_path`
    /// caches the downloaded list; `source` provides fresh copies.
    #[must_use]
    pub fn new(
        static_whitelist: Vec<SocketAddr>,
        whitelist_path: Option<PathBuf>,
        source: Option<Arc<dyn WhitelistSource>>,
    ) -> Self {
        Self {
            static_whitelist,
            whitelist_path,
            source,
            whitelist: RwLock::new(NetDb::new()),
            netdb: RwLock::new(NetDb::new()),
        }
    }

    /// Load the static entries, then the cached whitelist file if present,
    /// otherwise download it and write the cache.
    pub async fn init(&self) {
        let mut whitelist: NetDb = self.static_whitelist.iter().copied().collect();

        let cached = match &self.whitelist_path {
            Some(path) => read_whitelist(path).await,
            None => None,
        };
        match cached {
            Some(db) => {
                whitelist.append(&db);
            }
            None => {
                if let Some(db) = self.download().await {
                    whitelist.append(&db);
                }
            }
        }

        info!(entries = whitelist.len(), "Whitelist loaded");
        *self.whitelist.write() = whitelist;
    }

    /// Download a fresh whitelist and replace the current one.
    ///
    /// Returns `false`, keeping the previous whitelist, when no source is
    /// configured or the download fails.
    pub async fn refresh(&self) -> bool {
        let Some(db) = self.download().await else {
            return false;
        };
        let mut whitelist: NetDb = self.static_whitelist.iter().copied().collect();
        whitelist.append(&db);
        info!(entries = whitelist.len(), "Whitelist refreshed");
        *self.whitelist.write() = whitelist;
        true
    }

    async fn download(&self) -> Option<NetDb> {
        let source = self.source.as_ref()?;
        let text = match source.fetch().await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Whitelist download failed");
                return None;
            }
        };
        let db = NetDb::parse_lines(&text);
        if let Some(path) = &self.whitelist_path {
            if let Err(e) = tokio::fs::write(path, db.to_lines()).await {
                warn!(path = %path.display(), error = %e, "Failed to cache whitelist");
            }
        }
        Some(db)
    }

    /// Union a peer-supplied fragment into the NetDB; returns the number of
    /// new addresses.
    pub fn merge_gossip(&self, fragment: &NetDb) -> usize {
        let added = self.netdb.write().append(fragment);
        if added > 0 {
            debug!(added, "Merged gossiped addresses");
        }
        added
    }

    /// True if `addr` is whitelisted.
    #[must_use]
    pub fn can_accept(&self, addr: &SocketAddr) -> bool {
        self.whitelist.read().contains(addr)
    }

    /// Snapshot of the whitelist.
    #[must_use]
    pub fn whitelist(&self) -> NetDb {
        self.whitelist.read().clone()
    }

    /// Snapshot of the gossip NetDB.
    #[must_use]
    pub fn netdb(&self) -> NetDb {
        self.netdb.read().clone()
    }
}

impl std::fmt::Debug for AddressBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddressBook")
            .field("whitelist", &self.whitelist.read().len())
            .field("netdb", &self.netdb.read().len())
            .field("whitelist_path", &self.whitelist_path)
            .finish()
    }
}

async fn read_whitelist(path: &Path) -> Option<NetDb> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => {
            debug!(path = %path.display(), "Using cached whitelist");
            Some(NetDb::parse_lines(&text))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read whitelist");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Serves queued responses in order.
    struct ScriptedSource {
        responses: Mutex<Vec<Result<String>>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(responses: Vec<Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into_iter().rev().collect()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl WhitelistSource for ScriptedSource {
        async fn fetch(&self) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .pop()
                .unwrap_or_else(|| Err(NetError::Whitelist("exhausted".into())))
        }
    }

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_init_static_only() {
        let book = AddressBook::new(vec![addr("10.0.0.1:8001")], None, None);
        book.init().await;
        assert!(book.can_accept(&addr("10.0.0.1:8001")));
        assert!(!book.can_accept(&addr("10.0.0.2:8001")));
    }

    #[tokio::test]
    async fn test_init_downloads_and_caches() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("whitelist.txt");
        let source = ScriptedSource::new(vec![Ok("10.0.0.5:8001\n10.0.0.6:8001\n".into())]);
        let book = AddressBook::new(Vec::new(), Some(path.clone()), Some(source.clone()));

        book.init().await;
        assert_eq!(book.whitelist().len(), 2);
        let cached = std::fs::read_to_string(&path).unwrap();
        assert!(cached.contains("10.0.0.5:8001"));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_init_prefers_cached_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("whitelist.txt");
        std::fs::write(&path, "10.0.0.7:8001\n").unwrap();
        let source = ScriptedSource::new(vec![Ok("10.0.0.8:8001\n".into())]);
        let book = AddressBook::new(Vec::new(), Some(path), Some(source.clone()));

        book.init().await;
        assert!(book.can_accept(&addr("10.0.0.7:8001")));
        assert!(!book.can_accept(&addr("10.0.0.8:8001")));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_init_survives_download_failure() {
        let source = ScriptedSource::new(vec![Err(NetError::Whitelist("offline".into()))]);
        let book = AddressBook::new(vec![addr("10.0.0.1:8001")], None, Some(source));
        book.init().await;
        assert_eq!(book.whitelist().len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_replaces_wholesale() {
        let source = ScriptedSource::new(vec![
            Ok("10.0.0.1:8001\n10.0.0.2:8001\n".into()),
            Ok("10.0.0.3:8001\n".into()),
        ]);
        let book = AddressBook::new(Vec::new(), None, Some(source));
        book.init().await;
        assert_eq!(book.whitelist().len(), 2);

        assert!(book.refresh().await);
        let whitelist = book.whitelist();
        assert_eq!(whitelist.len(), 1);
        assert!(whitelist.contains(&addr("10.0.0.3:8001")));
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous() {
        let source = ScriptedSource::new(vec![
            Ok("10.0.0.1:8001\n".into()),
            Err(NetError::Whitelist("offline".into())),
        ]);
        let book = AddressBook::new(Vec::new(), None, Some(source));
        book.init().await;

        assert!(!book.refresh().await);
        assert!(book.can_accept(&addr("10.0.0.1:8001")));
    }

    #[tokio::test]
    async fn test_refresh_without_source() {
        let book = AddressBook::new(vec![addr("10.0.0.1:8001")], None, None);
        book.init().await;
        assert!(!book.refresh().await);
        assert_eq!(book.whitelist().len(), 1);
    }

    #[test]
    fn test_merge_gossip_only_grows() {
        let book = AddressBook::new(Vec::new(), None, None);
        let first: NetDb = [addr("10.0.0.1:8001"), addr("10.0.0.2:8001")]
            .into_iter()
            .collect();
        assert_eq!(book.merge_gossip(&first), 2);
        assert_eq!(book.merge_gossip(&NetDb::new()), 0);
        let second: NetDb = [addr("10.0.0.2:8001"), addr("10.0.0.3:8001")]
            .into_iter()
            .collect();
        assert_eq!(book.merge_gossip(&second), 1);
        assert_eq!(book.netdb().len(), 3);
        // Gossip never whitelists
        assert!(!book.can_accept(&addr("10.0.0.1:8001")));
    }

    #[test]
    fn test_http_source_rejects_bad_url() {
        assert!(matches!(
            HttpWhitelistSource::new("not a url", Duration::from_secs(5)),
            Err(NetError::Whitelist(_))
        ));
        let source = HttpWhitelistSource::new("https://example.org/netdb-white.txt", Duration::from_secs(5))
            .unwrap();
        assert_eq!(source.url(), "https://example.org/netdb-white.txt");
    }
}
