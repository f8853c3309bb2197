//! Version-folder deletability and the run-scoped last-versions cache.

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OnceCell;
use tracing::{debug, error};

use crate::metrics::CleanupMetrics;
use crate::model::{LastVersions, VersionNumber, owning_content_path, path_name};
use crate::retry::{RetryPolicy, with_retry};
use crate::store::ContentStore;

/// Last major/minor versions per owning content path.
///
/// Entries are created on first lookup and never evicted: content versions
/// are assumed stable for the duration of a run, and the cache is dropped
/// with the run. Each key is populated at most once at a time; concurrent
/// lookups of an unpopulated key wait for the one in flight.
#[derive(Debug, Default)]
pub struct VersionCache {
    entries: DashMap<String, Arc<OnceCell<LastVersions>>>,
}

impl VersionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached value for `content_path`, running `load` on a miss. A failed
    /// load leaves the entry unpopulated.
    pub async fn get_or_load<E, F, Fut>(&self, content_path: &str, load: F) -> Result<LastVersions, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<LastVersions, E>>,
    {
        // clone the cell out so no map shard lock is held across the await
        let cell = self
            .entries
            .entry(content_path.to_string())
            .or_default()
            .clone();

        cell.get_or_try_init(load).await.copied()
    }

    pub fn get(&self, content_path: &str) -> Option<LastVersions> {
        self.entries
            .get(content_path)
            .and_then(|cell| cell.get().copied())
    }

    /// Number of populated entries.
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.value().initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Why a folder may or may not be deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Deletable,
    /// The folder name is not a version tag.
    NotVersionFolder,
    /// Locked versions are never removed.
    Locked,
    /// The folder renders the last major or last minor version.
    Current,
    /// The content's versions could not be looked up.
    Unknown,
}

impl Verdict {
    pub fn is_deletable(self) -> bool {
        self == Verdict::Deletable
    }
}

/// Decides whether a preview version folder can be removed without touching
/// the previews of a current version.
pub struct DeletabilityResolver {
    store: Arc<dyn ContentStore>,
    cache: Arc<VersionCache>,
    retry: RetryPolicy,
    metrics: CleanupMetrics,
}

impl DeletabilityResolver {
    pub fn new(
        store: Arc<dyn ContentStore>,
        cache: Arc<VersionCache>,
        retry: RetryPolicy,
        metrics: CleanupMetrics,
    ) -> Self {
        Self {
            store,
            cache,
            retry,
            metrics,
        }
    }

    pub async fn is_deletable(&self, folder_path: &str) -> bool {
        self.evaluate(folder_path).await.is_deletable()
    }

    pub async fn evaluate(&self, folder_path: &str) -> Verdict {
        let version = match path_name(folder_path).parse::<VersionNumber>() {
            Ok(version) => version,
            Err(_) => return Verdict::NotVersionFolder,
        };

        if version.is_locked() {
            return Verdict::Locked;
        }

        let Some(content_path) = owning_content_path(folder_path) else {
            return Verdict::NotVersionFolder;
        };

        let lookup = self
            .cache
            .get_or_load(content_path, || {
                with_retry(&self.retry, &self.metrics, "last_versions", || {
                    self.metrics.record_version_lookup();
                    self.store.last_versions(content_path)
                })
            })
            .await;

        match lookup {
            Ok(last) if last.is_current(&version) => {
                debug!(path = folder_path, %version, "Keeping current version previews");
                Verdict::Current
            }
            Ok(_) => Verdict::Deletable,
            Err(e) => {
                error!(
                    path = folder_path,
                    content_path,
                    error = %e,
                    "Could not look up last versions, keeping preview folder"
                );
                self.metrics.record_version_lookup_failure();
                Verdict::Unknown
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VersionStatus;
    use crate::testing::InMemoryContentStore;
    use futures::future::join_all;
    use std::time::Duration;

    const CONTENT: &str = "/Root/Docs/report.docx";

    fn store() -> Arc<InMemoryContentStore> {
        let store = InMemoryContentStore::new();
        store.set_last_versions(
            CONTENT,
            LastVersions {
                major: Some(VersionNumber::new(2, 0, VersionStatus::Approved)),
                minor: Some(VersionNumber::new(2, 1, VersionStatus::Draft)),
            },
        );
        Arc::new(store)
    }

    fn resolver(store: &Arc<InMemoryContentStore>) -> (DeletabilityResolver, Arc<VersionCache>) {
        let cache = Arc::new(VersionCache::new());
        let resolver = DeletabilityResolver::new(
            store.clone(),
            cache.clone(),
            RetryPolicy::immediate(3),
            CleanupMetrics::new(),
        );
        (resolver, cache)
    }

    fn folder(tag: &str) -> String {
        format!("{CONTENT}/Previews/{tag}")
    }

    #[tokio::test]
    async fn test_current_versions_are_not_deletable() {
        let store = store();
        let (resolver, _) = resolver(&store);

        assert_eq!(resolver.evaluate(&folder("V2.0.A")).await, Verdict::Current);
        assert_eq!(resolver.evaluate(&folder("V2.1.D")).await, Verdict::Current);
        assert!(!resolver.is_deletable(&folder("V2.0")).await);
    }

    #[tokio::test]
    async fn test_old_versions_are_deletable() {
        let store = store();
        let (resolver, _) = resolver(&store);

        assert!(resolver.is_deletable(&folder("V1.0.A")).await);
        assert!(resolver.is_deletable(&folder("V1.5.D")).await);
        // same numbers, different status
        assert!(resolver.is_deletable(&folder("V2.0.D")).await);
    }

    #[tokio::test]
    async fn test_locked_versions_are_never_deletable() {
        let store = store();
        let (resolver, cache) = resolver(&store);

        assert_eq!(resolver.evaluate(&folder("V1.0.L")).await, Verdict::Locked);
        assert_eq!(store.version_lookups(), 0);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_non_version_folders_are_not_deletable() {
        let store = store();
        let (resolver, _) = resolver(&store);

        assert_eq!(
            resolver.evaluate(&format!("{CONTENT}/Previews")).await,
            Verdict::NotVersionFolder
        );
        assert_eq!(
            resolver.evaluate(&folder("thumbnails")).await,
            Verdict::NotVersionFolder
        );
        assert_eq!(
            resolver.evaluate("/V1.0.A").await,
            Verdict::NotVersionFolder
        );
        assert_eq!(store.version_lookups(), 0);
    }

    #[tokio::test]
    async fn test_lookup_is_cached_per_content() {
        let store = store();
        let (resolver, cache) = resolver(&store);

        for tag in ["V1.0.A", "V1.1.A", "V2.0.A", "V2.1.D"] {
            resolver.evaluate(&folder(tag)).await;
        }
        resolver
            .evaluate("/Root/Docs/other.docx/Previews/V1.0.A")
            .await;

        assert_eq!(store.version_lookups(), 2);
        assert_eq!(cache.len(), 2);
        assert_eq!(
            cache.get(CONTENT).and_then(|v| v.major),
            Some(VersionNumber::new(2, 0, VersionStatus::Approved))
        );
    }

    #[tokio::test]
    async fn test_concurrent_misses_populate_once() {
        let store = store();
        store.set_lookup_delay(Duration::from_millis(20));
        let (resolver, _) = resolver(&store);

        let paths: Vec<String> = (0..25).map(|i| folder(&format!("V1.{i}.A"))).collect();
        let verdicts = join_all(paths.iter().map(|p| resolver.evaluate(p))).await;

        assert_eq!(verdicts.len(), 25);
        assert_eq!(store.version_lookups(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_misses_across_tasks_populate_once() {
        let store = store();
        store.set_lookup_delay(Duration::from_millis(20));
        let (resolver, _) = resolver(&store);
        let resolver = Arc::new(resolver);

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let resolver = resolver.clone();
                tokio::spawn(async move { resolver.evaluate(&folder(&format!("V0.{i}.A"))).await })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap(), Verdict::Deletable);
        }

        assert_eq!(store.version_lookups(), 1);
    }

    #[tokio::test]
    async fn test_failed_lookup_keeps_folder_and_is_not_cached() {
        let store = store();
        store.fail_next_lookups(3);
        let (resolver, cache) = resolver(&store);

        assert_eq!(resolver.evaluate(&folder("V1.0.A")).await, Verdict::Unknown);
        assert!(cache.get(CONTENT).is_none());

        // the next check retries the lookup
        assert_eq!(resolver.evaluate(&folder("V1.0.A")).await, Verdict::Deletable);
        assert_eq!(store.version_lookups(), 4);
    }

    #[tokio::test]
    async fn test_content_without_versions_allows_deletion() {
        let store = Arc::new(InMemoryContentStore::new());
        let (resolver, _) = resolver(&store);

        assert!(
            resolver
                .is_deletable("/Root/Docs/gone.docx/Previews/V1.0.A")
                .await
        );
    }
}
