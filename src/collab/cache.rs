use async_trait::async_trait;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

use super::{ClassifyRequest, ContentClassifier};
use crate::core::Classification;
use crate::error::ClassifierError;

/// Bounded map whose entries expire `ttl` after insertion.
pub struct TtlCache<K, V> {
    ttl: Duration,
    capacity: usize,
    entries: Mutex<HashMap<K, (Instant, V)>>,
}

impl<K: Eq + Hash + Clone, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity: capacity.max(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    pub fn insert(&self, key: K, value: V) {
        self.insert_at(key, value, Instant::now());
    }

    pub fn get_at(&self, key: &K, now: Instant) -> Option<V> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.get(key) {
            Some((inserted, value)) if now.duration_since(*inserted) < self.ttl => Some(value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert_at(&self, key: K, value: V, now: Instant) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            let ttl = self.ttl;
            entries.retain(|_, (inserted, _)| now.duration_since(*inserted) < ttl);
            if entries.len() >= self.capacity {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, (inserted, _))| *inserted)
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    entries.remove(&oldest);
                }
            }
        }
        entries.insert(key, (now, value));
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Remembers definite classifier answers per channel.
pub struct CachedClassifier<C> {
    inner: C,
    cache: TtlCache<String, Classification>,
}

impl<C: ContentClassifier> CachedClassifier<C> {
    pub fn new(inner: C, ttl: Duration, capacity: usize) -> Self {
        Self {
            inner,
            cache: TtlCache::new(ttl, capacity),
        }
    }
}

#[async_trait]
impl<C: ContentClassifier> ContentClassifier for CachedClassifier<C> {
    async fn classify(&self, request: &ClassifyRequest) -> Result<Option<Classification>, ClassifierError> {
        if let Some(hit) = self.cache.get(&request.username) {
            debug!(channel = %request.username, "Classifier cache hit");
            return Ok(Some(hit));
        }
        let answer = self.inner.classify(request).await?;
        if let Some(classification) = &answer {
            self.cache.insert(request.username.clone(), classification.clone());
        }
        Ok(answer)
    }
}
