//! Remote-backed `MenuCatalog` with a short-TTL cache and single-writer
//! coalesced refresh. See `spec.md` §5.

use super::client::RemoteClient;
use crate::cart::{MenuCatalog, MenuItem};
use crate::errors::{EngineError, EngineResult};
use crate::types::{MenuItemId, Size};
use async_trait::async_trait;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Notify, RwLock};
use tracing::debug;

struct CacheEntry {
    items: Arc<FxHashMap<MenuItemId, MenuItem>>,
    fetched_at: Instant,
}

/// Caches the flattened product catalog for one `(sub_domain, branch)`
/// pair. Reads take a read lock; refreshes are serialized behind a
/// mutex with a `Notify` so concurrent cache-miss callers await one
/// shared refresh instead of stampeding the remote backend.
pub struct RemoteMenuCatalog {
    client: RemoteClient,
    sub_domain: String,
    branch: String,
    ttl: Duration,
    cache: RwLock<Option<CacheEntry>>,
    refresh_lock: Mutex<()>,
    refresh_done: Notify,
}

impl RemoteMenuCatalog {
    #[must_use]
    pub fn new(client: RemoteClient, sub_domain: String, branch: String, ttl: Duration) -> Self {
        Self {
            client,
            sub_domain,
            branch,
            ttl,
            cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            refresh_done: Notify::new(),
        }
    }

    async fn fresh_snapshot(&self) -> Option<Arc<FxHashMap<MenuItemId, MenuItem>>> {
        let guard = self.cache.read().await;
        guard.as_ref().and_then(|entry| {
            if entry.fetched_at.elapsed() < self.ttl {
                Some(Arc::clone(&entry.items))
            } else {
                None
            }
        })
    }

    async fn refresh(&self) -> EngineResult<Arc<FxHashMap<MenuItemId, MenuItem>>> {
        // Someone else may already be refreshing; try to take the lock
        // without blocking so we can instead await their completion.
        let guard = match self.refresh_lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                self.refresh_done.notified().await;
                return self
                    .fresh_snapshot()
                    .await
                    .ok_or_else(|| EngineError::TransientBackend("menu refresh produced no data".into()));
            }
        };

        // Re-check: another refresh may have completed while we waited
        // for the lock.
        if let Some(snapshot) = self.fresh_snapshot().await {
            return Ok(snapshot);
        }

        debug!(sub_domain = %self.sub_domain, branch = %self.branch, "refreshing menu catalog");
        let tree = self
            .client
            .get_menu_bot_structure(&self.sub_domain, &self.branch)
            .await?;

        let mut map = FxHashMap::default();
        for category in tree.categories {
            for product in category.products {
                let presentations = product
                    .presentations
                    .iter()
                    .filter_map(|p| parse_size(&p.size))
                    .collect();
                map.insert(
                    MenuItemId::new(product.id.clone()),
                    MenuItem {
                        id: MenuItemId::new(product.id),
                        name: product.name,
                        price: product.base_price,
                        available: product.available.unwrap_or(true),
                        presentations,
                    },
                );
            }
        }
        let items = Arc::new(map);

        {
            let mut write_guard = self.cache.write().await;
            *write_guard = Some(CacheEntry {
                items: Arc::clone(&items),
                fetched_at: Instant::now(),
            });
        }

        drop(guard);
        self.refresh_done.notify_waiters();
        Ok(items)
    }

    async fn snapshot(&self) -> EngineResult<Arc<FxHashMap<MenuItemId, MenuItem>>> {
        if let Some(items) = self.fresh_snapshot().await {
            return Ok(items);
        }
        self.refresh().await
    }
}

fn parse_size(raw: &str) -> Option<Size> {
    Size::parse_wire(raw)
}

#[async_trait]
impl MenuCatalog for RemoteMenuCatalog {
    async fn find(&self, id: &MenuItemId) -> EngineResult<Option<MenuItem>> {
        let items = self.snapshot().await?;
        Ok(items.get(id).cloned())
    }
}
