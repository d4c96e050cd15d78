use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use crate::shortcode::generate_short_code;

#[derive(Debug, Clone)]
struct LinkEntry {
    filename: String,
    created_at: DateTime<Utc>,
}

/// Live links plus their codes in registration order, oldest first. Entries
/// only ever leave from the front, so `order` always holds exactly the keys
/// of `entries`.
#[derive(Debug, Default)]
struct Links {
    entries: HashMap<String, LinkEntry>,
    order: VecDeque<String>,
}

impl Links {
    fn insert(&mut self, code: String, entry: LinkEntry) {
        self.order.push_back(code.clone());
        self.entries.insert(code, entry);
    }

    fn pop_oldest(&mut self) -> Option<LinkEntry> {
        let code = self.order.pop_front()?;
        self.entries.remove(&code)
    }

    /// Expiry is checked from the oldest end and stops at the first live
    /// entry. `resolve` filters on age as well, so an entry stuck behind a
    /// newer one after a clock step is never served.
    fn prune(&mut self, ttl: Option<Duration>, now: DateTime<Utc>) -> usize {
        if ttl.is_none() {
            return 0;
        }

        let mut removed = 0;
        while let Some(code) = self.order.front() {
            match self.entries.get(code) {
                Some(entry) if !is_expired(entry, ttl, now) => break,
                _ => {
                    self.pop_oldest();
                    removed += 1;
                }
            }
        }
        removed
    }

    fn trim(&mut self, max_entries: usize) {
        if max_entries == 0 {
            return;
        }
        while self.entries.len() > max_entries {
            if let Some(evicted) = self.pop_oldest() {
                debug!("link cap reached, evicting {:?}", evicted.filename);
            }
        }
    }
}

/// In-memory short code → stored filename map.
///
/// Entries expire after `ttl` (when set) and the oldest entries are evicted
/// once more than `max_entries` are held (when non-zero).
#[derive(Debug)]
pub struct LinkRegistry {
    links: Mutex<Links>,
    ttl: Option<Duration>,
    max_entries: usize,
}

impl LinkRegistry {
    pub fn new(ttl_seconds: u64, max_entries: usize) -> Self {
        let ttl = if ttl_seconds > 0 {
            i64::try_from(ttl_seconds).ok().and_then(Duration::try_seconds)
        } else {
            None
        };

        Self {
            links: Mutex::new(Links::default()),
            ttl,
            max_entries,
        }
    }

    /// Issues a fresh code for `filename`. Codes that are still live are never
    /// handed out twice.
    pub async fn register(&self, filename: impl Into<String>) -> String {
        self.register_at(filename.into(), Utc::now()).await
    }

    async fn register_at(&self, filename: String, now: DateTime<Utc>) -> String {
        let mut links = self.links.lock().await;
        links.prune(self.ttl, now);

        let code = loop {
            let candidate = generate_short_code();
            if !links.entries.contains_key(&candidate) {
                break candidate;
            }
            debug!("short code {candidate} already in use, drawing another");
        };

        links.insert(
            code.clone(),
            LinkEntry {
                filename,
                created_at: now,
            },
        );
        links.trim(self.max_entries);

        code
    }

    pub async fn resolve(&self, code: &str) -> Option<String> {
        self.resolve_at(code, Utc::now()).await
    }

    async fn resolve_at(&self, code: &str, now: DateTime<Utc>) -> Option<String> {
        let links = self.links.lock().await;
        links
            .entries
            .get(code)
            .filter(|entry| !is_expired(entry, self.ttl, now))
            .map(|entry| entry.filename.clone())
    }

    /// Drops expired entries and returns how many were removed.
    pub async fn prune_expired(&self) -> usize {
        self.prune_expired_at(Utc::now()).await
    }

    async fn prune_expired_at(&self, now: DateTime<Utc>) -> usize {
        self.links.lock().await.prune(self.ttl, now)
    }

    pub async fn len(&self) -> usize {
        self.links.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.links.lock().await.entries.is_empty()
    }
}

fn is_expired(entry: &LinkEntry, ttl: Option<Duration>, now: DateTime<Utc>) -> bool {
    ttl.is_some_and(|ttl| now - entry.created_at > ttl)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shortcode::SHORT_CODE_LENGTH;

    #[tokio::test]
    async fn registered_code_resolves_to_filename() {
        let registry = LinkRegistry::new(3600, 100);
        let code = registry.register("My Video 2023.mp4").await;

        assert_eq!(code.len(), SHORT_CODE_LENGTH);
        assert_eq!(
            registry.resolve(&code).await.as_deref(),
            Some("My Video 2023.mp4")
        );
        assert_eq!(registry.resolve("nope00").await, None);
    }

    #[tokio::test]
    async fn codes_are_distinct_while_live() {
        let registry = LinkRegistry::new(0, 0);
        let mut codes = std::collections::HashSet::new();
        for index in 0..500 {
            codes.insert(registry.register(format!("file-{index}.mp4")).await);
        }
        assert_eq!(codes.len(), 500);
        assert_eq!(registry.len().await, 500);
    }

    #[tokio::test]
    async fn expired_codes_stop_resolving_and_get_pruned() {
        let registry = LinkRegistry::new(60, 100);
        let start = Utc::now();
        let code = registry.register_at("old.mp4".to_string(), start).await;

        let later = start + Duration::seconds(30);
        assert_eq!(
            registry.resolve_at(&code, later).await.as_deref(),
            Some("old.mp4")
        );

        let expired = start + Duration::seconds(61);
        assert_eq!(registry.resolve_at(&code, expired).await, None);
        assert_eq!(registry.prune_expired_at(expired).await, 1);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn zero_ttl_never_expires() {
        let registry = LinkRegistry::new(0, 0);
        let start = Utc::now();
        let code = registry.register_at("keep.mp4".to_string(), start).await;

        let far_future = start + Duration::days(3650);
        assert_eq!(
            registry.resolve_at(&code, far_future).await.as_deref(),
            Some("keep.mp4")
        );
        assert_eq!(registry.prune_expired_at(far_future).await, 0);
    }

    #[tokio::test]
    async fn cap_evicts_oldest_entries() {
        let registry = LinkRegistry::new(0, 2);
        let start = Utc::now();
        let first = registry.register_at("a.mp4".to_string(), start).await;
        let second = registry
            .register_at("b.mp4".to_string(), start + Duration::seconds(1))
            .await;
        let third = registry
            .register_at("c.mp4".to_string(), start + Duration::seconds(2))
            .await;

        assert_eq!(registry.len().await, 2);
        assert_eq!(registry.resolve(&first).await, None);
        assert_eq!(registry.resolve(&second).await.as_deref(), Some("b.mp4"));
        assert_eq!(registry.resolve(&third).await.as_deref(), Some("c.mp4"));
    }

    #[tokio::test]
    async fn eviction_follows_registration_order() {
        let registry = LinkRegistry::new(3600, 3);
        let start = Utc::now();

        let mut codes = Vec::new();
        for index in 0..10 {
            let at = start + Duration::seconds(index);
            codes.push(registry.register_at(format!("{index}.mp4"), at).await);
        }

        assert_eq!(registry.len().await, 3);
        for (index, code) in codes.iter().enumerate() {
            let resolved = registry.resolve_at(code, start).await;
            if index < 7 {
                assert_eq!(resolved, None, "{index}");
            } else {
                assert_eq!(resolved, Some(format!("{index}.mp4")));
            }
        }

        let links = registry.links.lock().await;
        assert_eq!(links.order.len(), links.entries.len());
        assert_eq!(links.order, codes[7..].iter().cloned().collect::<VecDeque<_>>());
    }

    #[tokio::test]
    async fn expiry_and_cap_keep_order_in_step() {
        let registry = LinkRegistry::new(60, 2);
        let start = Utc::now();
        registry.register_at("a.mp4".to_string(), start).await;
        registry
            .register_at("b.mp4".to_string(), start + Duration::seconds(50))
            .await;

        let later = start + Duration::seconds(90);
        let fresh = registry.register_at("c.mp4".to_string(), later).await;

        assert_eq!(registry.len().await, 2);
        assert_eq!(registry.resolve_at(&fresh, later).await.as_deref(), Some("c.mp4"));
        assert_eq!(registry.prune_expired_at(start + Duration::seconds(111)).await, 1);

        let links = registry.links.lock().await;
        assert_eq!(links.order, VecDeque::from([fresh]));
        assert_eq!(links.entries.len(), 1);
    }
}
