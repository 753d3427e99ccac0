use super::{SessionSignalStore, SortedSetStore};
use crate::error::{RecommendationError, Result};
use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
enum Value {
    SortedSet(HashMap<String, f64>),
    Hash(HashMap<String, String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

/// Process-local store with Redis sorted-set semantics.
///
/// Expired keys are dropped lazily on access. Cloning shares the same data.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Mutex<HashMap<String, Entry>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a hash field, e.g. a session engagement boost.
    pub async fn hset(&self, key: &str, field: &str, value: impl ToString) {
        let mut data = self.inner.lock().await;
        purge_expired(&mut data, key);
        let entry = data.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::Hash(HashMap::new()),
            expires_at: None,
        });
        if let Value::Hash(fields) = &mut entry.value {
            fields.insert(field.to_string(), value.to_string());
        }
    }

    pub async fn contains_key(&self, key: &str) -> bool {
        let mut data = self.inner.lock().await;
        purge_expired(&mut data, key);
        data.contains_key(key)
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut data = self.inner.lock().await;
        let now = Instant::now();
        data.retain(|_, entry| !is_expired(entry, now));
        let mut keys: Vec<String> = data.keys().cloned().collect();
        keys.sort();
        keys
    }
}

fn is_expired(entry: &Entry, now: Instant) -> bool {
    matches!(entry.expires_at, Some(at) if at <= now)
}

fn purge_expired(data: &mut HashMap<String, Entry>, key: &str) {
    if data
        .get(key)
        .map(|entry| is_expired(entry, Instant::now()))
        .unwrap_or(false)
    {
        data.remove(key);
    }
}

fn wrong_type(key: &str) -> RecommendationError {
    RecommendationError::Store(format!(
        "WRONGTYPE operation against key {} holding the wrong kind of value",
        key
    ))
}

fn sorted_set<'a>(
    data: &'a HashMap<String, Entry>,
    key: &str,
) -> Result<Option<&'a HashMap<String, f64>>> {
    match data.get(key) {
        None => Ok(None),
        Some(Entry {
            value: Value::SortedSet(members),
            ..
        }) => Ok(Some(members)),
        Some(_) => Err(wrong_type(key)),
    }
}

fn sorted_set_mut<'a>(
    data: &'a mut HashMap<String, Entry>,
    key: &str,
) -> Result<&'a mut HashMap<String, f64>> {
    let entry = data.entry(key.to_string()).or_insert_with(|| Entry {
        value: Value::SortedSet(HashMap::new()),
        expires_at: None,
    });
    match &mut entry.value {
        Value::SortedSet(members) => Ok(members),
        Value::Hash(_) => Err(wrong_type(key)),
    }
}

/// Ascending by score, ties by member.
fn ascending(members: &HashMap<String, f64>) -> Vec<(String, f64)> {
    let mut sorted: Vec<(String, f64)> = members
        .iter()
        .map(|(member, score)| (member.clone(), *score))
        .collect();
    sorted.sort_by(|a, b| {
        a.1.partial_cmp(&b.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    sorted
}

/// Resolve an inclusive Redis rank range against `len`.
fn rank_range(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    if len == 0 {
        return None;
    }
    let len = len as isize;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize))
}

#[async_trait]
impl SortedSetStore for InMemoryStore {
    async fn zadd_multiple(&self, key: &str, items: &[(f64, String)]) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        let mut data = self.inner.lock().await;
        purge_expired(&mut data, key);
        let members = sorted_set_mut(&mut data, key)?;
        for (score, member) in items {
            members.insert(member.clone(), *score);
        }
        Ok(())
    }

    async fn zincr(&self, key: &str, member: &str, delta: f64) -> Result<f64> {
        let mut data = self.inner.lock().await;
        purge_expired(&mut data, key);
        let members = sorted_set_mut(&mut data, key)?;
        let score = members.entry(member.to_string()).or_insert(0.0);
        *score += delta;
        Ok(*score)
    }

    async fn zremrangebyrank(&self, key: &str, start: isize, stop: isize) -> Result<()> {
        let mut data = self.inner.lock().await;
        purge_expired(&mut data, key);

        let doomed: Vec<String> = match sorted_set(&data, key)? {
            Some(members) => match rank_range(members.len(), start, stop) {
                Some((from, to)) => ascending(members)
                    .into_iter()
                    .skip(from)
                    .take(to - from + 1)
                    .map(|(member, _)| member)
                    .collect(),
                None => return Ok(()),
            },
            None => return Ok(()),
        };

        let members = sorted_set_mut(&mut data, key)?;
        for member in doomed {
            members.remove(&member);
        }
        if members.is_empty() {
            data.remove(key);
        }
        Ok(())
    }

    async fn zcard(&self, key: &str) -> Result<u64> {
        let mut data = self.inner.lock().await;
        purge_expired(&mut data, key);
        Ok(sorted_set(&data, key)?.map(|m| m.len() as u64).unwrap_or(0))
    }

    async fn zrevrange_withscores(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<(String, f64)>> {
        let mut data = self.inner.lock().await;
        purge_expired(&mut data, key);

        let Some(members) = sorted_set(&data, key)? else {
            return Ok(Vec::new());
        };
        let Some((from, to)) = rank_range(members.len(), start, stop) else {
            return Ok(Vec::new());
        };

        let mut descending = ascending(members);
        descending.reverse();
        Ok(descending
            .into_iter()
            .skip(from)
            .take(to - from + 1)
            .collect())
    }

    async fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>> {
        let mut data = self.inner.lock().await;
        purge_expired(&mut data, key);
        Ok(sorted_set(&data, key)?.and_then(|m| m.get(member).copied()))
    }

    async fn expire(&self, key: &str, seconds: i64) -> Result<()> {
        let mut data = self.inner.lock().await;
        purge_expired(&mut data, key);
        if seconds <= 0 {
            data.remove(key);
            return Ok(());
        }
        if let Some(entry) = data.get_mut(key) {
            entry.expires_at = Some(Instant::now() + Duration::from_secs(seconds as u64));
        }
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<i64> {
        let mut data = self.inner.lock().await;
        purge_expired(&mut data, key);
        Ok(match data.get(key) {
            None => -2,
            Some(Entry {
                expires_at: None, ..
            }) => -1,
            Some(Entry {
                expires_at: Some(at),
                ..
            }) => {
                let remaining = at.saturating_duration_since(Instant::now());
                // Redis rounds to the nearest second
                ((remaining.as_millis() + 500) / 1000) as i64
            }
        })
    }

    async fn del(&self, key: &str) -> Result<()> {
        let mut data = self.inner.lock().await;
        data.remove(key);
        Ok(())
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        let mut data = self.inner.lock().await;
        purge_expired(&mut data, from);
        let entry = data
            .remove(from)
            .ok_or_else(|| RecommendationError::Store(format!("ERR no such key: {}", from)))?;
        data.insert(to.to_string(), entry);
        Ok(())
    }
}

#[async_trait]
impl SessionSignalStore for InMemoryStore {
    async fn engagement_boost(&self, key: &str, field: &str) -> Result<Option<f64>> {
        let mut data = self.inner.lock().await;
        purge_expired(&mut data, key);
        match data.get(key) {
            None => Ok(None),
            Some(Entry {
                value: Value::Hash(fields),
                ..
            }) => Ok(fields.get(field).and_then(|raw| raw.parse().ok())),
            Some(_) => Err(wrong_type(key)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(pairs: &[(f64, &str)]) -> Vec<(f64, String)> {
        pairs.iter().map(|(s, m)| (*s, m.to_string())).collect()
    }

    #[tokio::test]
    async fn test_zrevrange_orders_by_score_then_member() {
        let store = InMemoryStore::new();
        store
            .zadd_multiple("k", &items(&[(0.5, "b"), (0.9, "a"), (0.5, "c")]))
            .await
            .unwrap();

        let all = store.zrevrange_withscores("k", 0, -1).await.unwrap();
        let members: Vec<&str> = all.iter().map(|(m, _)| m.as_str()).collect();
        assert_eq!(members, vec!["a", "c", "b"]);

        let head = store.zrevrange_withscores("k", 0, 0).await.unwrap();
        assert_eq!(head, vec![("a".to_string(), 0.9)]);
    }

    #[tokio::test]
    async fn test_zremrangebyrank_drops_lowest() {
        let store = InMemoryStore::new();
        store
            .zadd_multiple("k", &items(&[(1.0, "a"), (2.0, "b"), (3.0, "c"), (4.0, "d")]))
            .await
            .unwrap();

        store.zremrangebyrank("k", 0, 1).await.unwrap();

        assert_eq!(store.zcard("k").await.unwrap(), 2);
        assert_eq!(store.zscore("k", "a").await.unwrap(), None);
        assert_eq!(store.zscore("k", "d").await.unwrap(), Some(4.0));
    }

    #[tokio::test]
    async fn test_zincr_creates_member() {
        let store = InMemoryStore::new();
        assert_eq!(store.zincr("k", "a", 0.25).await.unwrap(), 0.25);
        assert_eq!(store.zincr("k", "a", 0.25).await.unwrap(), 0.5);
    }

    #[tokio::test]
    async fn test_missing_key_behaves_as_empty() {
        let store = InMemoryStore::new();
        assert_eq!(store.zcard("nope").await.unwrap(), 0);
        assert!(store.zrevrange_withscores("nope", 0, -1).await.unwrap().is_empty());
        assert_eq!(store.ttl("nope").await.unwrap(), -2);
        store.zremrangebyrank("nope", 0, 3).await.unwrap();
        store.expire("nope", 10).await.unwrap();
        assert!(!store.contains_key("nope").await);
    }

    #[tokio::test]
    async fn test_rename_moves_ttl_and_replaces_target() {
        let store = InMemoryStore::new();
        store.zadd_multiple("old", &items(&[(1.0, "x")])).await.unwrap();
        store.zadd_multiple("staging", &items(&[(2.0, "y")])).await.unwrap();
        store.expire("staging", 3600).await.unwrap();

        store.rename("staging", "old").await.unwrap();

        assert!(!store.contains_key("staging").await);
        assert_eq!(store.zscore("old", "x").await.unwrap(), None);
        assert_eq!(store.zscore("old", "y").await.unwrap(), Some(2.0));
        let ttl = store.ttl("old").await.unwrap();
        assert!(ttl > 3590 && ttl <= 3600);

        assert!(store.rename("missing", "old").await.is_err());
    }

    #[tokio::test]
    async fn test_engagement_boost_reads_hash() {
        let store = InMemoryStore::new();
        store.hset("session:user:1:books", "42", 0.3).await;

        let boost = store
            .engagement_boost("session:user:1:books", "42")
            .await
            .unwrap();
        assert_eq!(boost, Some(0.3));
        assert_eq!(
            store.engagement_boost("session:user:1:books", "7").await.unwrap(),
            None
        );
        assert!(store.zcard("session:user:1:books").await.is_err());
    }
}
