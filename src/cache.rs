use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::api::{ApiClient, ApiError};
use crate::models::form::normalize_tag;
use crate::models::tag::{TagRow, TagsSnapshot};

/// In-memory copy of the registered-tags table.
///
/// Contents are replaced wholesale on every successful refresh, never
/// patched row-by-row. Lookup is a linear scan; the table is a few hundred
/// rows at most and order must match the sheet.
pub struct TagCache {
    rows: Vec<TagRow>,
    updated: Option<String>,
    // Monotonic instant for TTL math, wall clock for display.
    refreshed_at: Option<Instant>,
    refreshed_wall: Option<DateTime<Utc>>,
    ttl: Option<Duration>,
}

impl TagCache {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            rows: Vec::new(),
            updated: None,
            refreshed_at: None,
            refreshed_wall: None,
            ttl,
        }
    }

    /// Fetch the table and replace the cached copy. Returns the new row
    /// count. On failure the previous contents stay untouched.
    pub async fn refresh(&mut self, api: &ApiClient) -> Result<usize, ApiError> {
        let snapshot = api.tags_table().await?;
        self.rows = snapshot.rows;
        self.updated = snapshot.updated;
        self.refreshed_at = Some(Instant::now());
        self.refreshed_wall = Some(Utc::now());
        info!("🔄 Tag table refreshed: {} rows", self.rows.len());
        Ok(self.rows.len())
    }

    /// Refresh only when needed: never loaded, loaded empty, or past the
    /// soft TTL when one is configured.
    pub async fn ensure_fresh(&mut self, api: &ApiClient) -> Result<(), ApiError> {
        if self.is_empty() || self.is_stale() {
            self.refresh(api).await?;
        }
        Ok(())
    }

    pub fn is_stale(&self) -> bool {
        match self.refreshed_at {
            None => true,
            Some(at) => self.ttl.is_some_and(|ttl| at.elapsed() >= ttl),
        }
    }

    /// Exact match on the trimmed tag id, leading zeros significant.
    /// First match wins; duplicates are logged, never collapsed.
    pub fn find(&self, tag_id: &str) -> Option<&TagRow> {
        let needle = normalize_tag(tag_id);
        let mut hits = self
            .rows
            .iter()
            .filter(|row| normalize_tag(&row.tag_id) == needle);
        let first = hits.next();
        if first.is_some() && hits.next().is_some() {
            warn!("⚠️  Duplicate tag id '{}' in tags table", needle);
        }
        first
    }

    pub fn rows(&self) -> &[TagRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Server-reported "last updated" stamp, when the service sent one.
    pub fn updated(&self) -> Option<&str> {
        self.updated.as_deref()
    }

    /// When the cache last loaded successfully, wall-clock time.
    pub fn refreshed_at_utc(&self) -> Option<DateTime<Utc>> {
        self.refreshed_wall
    }

    pub fn snapshot(&self) -> TagsSnapshot {
        TagsSnapshot {
            rows: self.rows.clone(),
            updated: self.updated.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::response::Json;
    use axum::routing::get;
    use axum::Router;
    use serde_json::{json, Value};

    /// Serve a fixed sequence of response bodies, repeating the last one.
    /// Returns the base URL and a counter of calls actually received.
    async fn table_service(bodies: Vec<Value>) -> (String, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let bodies = Arc::new(bodies);
        let router = Router::new().route(
            "/",
            get(move || {
                let n = seen.fetch_add(1, Ordering::SeqCst);
                let bodies = bodies.clone();
                async move { Json(bodies[n.min(bodies.len() - 1)].clone()) }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        (format!("http://{addr}/"), calls)
    }

    fn api(base: &str) -> ApiClient {
        ApiClient::new(base, Duration::from_secs(2)).unwrap()
    }

    fn row(tag: &str) -> Value {
        json!({ "TAG_ID": tag, "LOT_ID": "L", "LOT_QTY": "1", "PRODUCT_NAME": "P", "SHEET": "L" })
    }

    #[tokio::test]
    async fn refresh_replaces_contents_wholesale() {
        let (base, _) = table_service(vec![
            json!({ "ok": true, "rows": [row("1"), row("2")], "updated": "early" }),
            json!({ "ok": true, "rows": [row("9")], "updated": "late" }),
        ])
        .await;
        let api = api(&base);
        let mut cache = TagCache::new(None);

        assert_eq!(cache.refresh(&api).await.unwrap(), 2);
        assert_eq!(cache.refresh(&api).await.unwrap(), 1);
        assert_eq!(cache.rows()[0].tag_id, "9");
        assert_eq!(cache.updated(), Some("late"));
    }

    #[tokio::test]
    async fn refresh_is_idempotent_against_an_unchanged_remote() {
        let (base, _) =
            table_service(vec![json!({ "ok": true, "rows": [row("1"), row("2")] })]).await;
        let api = api(&base);
        let mut cache = TagCache::new(None);

        cache.refresh(&api).await.unwrap();
        let first = cache.rows().to_vec();
        cache.refresh(&api).await.unwrap();
        assert_eq!(cache.rows(), first.as_slice());
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_contents() {
        let (base, _) = table_service(vec![
            json!({ "ok": true, "rows": [row("1")] }),
            json!({ "ok": false, "error": "backend down" }),
        ])
        .await;
        let api = api(&base);
        let mut cache = TagCache::new(None);

        cache.refresh(&api).await.unwrap();
        assert!(cache.refresh(&api).await.is_err());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.rows()[0].tag_id, "1");
    }

    #[tokio::test]
    async fn ensure_fresh_loads_once_then_reuses() {
        let (base, calls) =
            table_service(vec![json!({ "ok": true, "rows": [row("1")] })]).await;
        let api = api(&base);
        let mut cache = TagCache::new(None);

        cache.ensure_fresh(&api).await.unwrap();
        cache.ensure_fresh(&api).await.unwrap();
        cache.ensure_fresh(&api).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn ensure_fresh_refetches_past_the_ttl() {
        let (base, calls) =
            table_service(vec![json!({ "ok": true, "rows": [row("1")] })]).await;
        let api = api(&base);
        let mut cache = TagCache::new(Some(Duration::from_millis(20)));

        cache.ensure_fresh(&api).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        tokio::time::sleep(Duration::from_millis(40)).await;
        cache.ensure_fresh(&api).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn find_trims_input_and_keeps_leading_zeros() {
        let (base, _) = table_service(vec![json!({ "ok": true, "rows": [row("007")] })]).await;
        let api = api(&base);
        let mut cache = TagCache::new(None);
        cache.refresh(&api).await.unwrap();

        assert!(cache.find(" 007 ").is_some());
        assert!(cache.find("007").is_some());
        assert!(cache.find("7").is_none());
    }

    #[tokio::test]
    async fn duplicate_tag_ids_resolve_to_the_first_row() {
        let (base, _) = table_service(vec![json!({
            "ok": true,
            "rows": [
                { "TAG_ID": "42", "LOT_ID": "first", "SHEET": "first" },
                { "TAG_ID": "42", "LOT_ID": "second", "SHEET": "second" },
            ]
        })])
        .await;
        let api = api(&base);
        let mut cache = TagCache::new(None);
        cache.refresh(&api).await.unwrap();

        assert_eq!(cache.find("42").unwrap().lot_id, "first");
    }
}
