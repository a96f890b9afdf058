//! Short-lived key-value storage and idempotent response replay.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use serde_json::Value as JsonValue;
use thiserror::Error;

use stockroom_core::TenantId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KvError {
    #[error("key-value backend failure: {0}")]
    Backend(String),

    #[error("stored value is not valid JSON: {0}")]
    Corrupt(String),
}

/// Get / put-with-TTL / delete over string values.
pub trait KeyValuePort: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, KvError>;
    fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), KvError>;
    fn delete(&self, key: &str) -> Result<(), KvError>;
}

impl<K> KeyValuePort for Arc<K>
where
    K: KeyValuePort + ?Sized,
{
    fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        (**self).get(key)
    }

    fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), KvError> {
        (**self).put(key, value, ttl)
    }

    fn delete(&self, key: &str) -> Result<(), KvError> {
        (**self).delete(key)
    }
}

/// In-memory TTL map for tests/dev. Expired entries are dropped on read.
#[derive(Debug, Default)]
pub struct InMemoryKeyValue {
    entries: RwLock<HashMap<String, (String, Instant)>>,
}

impl InMemoryKeyValue {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValuePort for InMemoryKeyValue {
    fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let now = Instant::now();
        {
            let entries = self
                .entries
                .read()
                .map_err(|_| KvError::Backend("lock poisoned".to_string()))?;
            match entries.get(key) {
                Some((value, expires_at)) if *expires_at > now => return Ok(Some(value.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }
        self.delete(key)?;
        Ok(None)
    }

    fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), KvError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| KvError::Backend("lock poisoned".to_string()))?;
        entries.insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), KvError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| KvError::Backend("lock poisoned".to_string()))?;
        entries.remove(key);
        Ok(())
    }
}

/// Redis-backed key-value port.
#[cfg(feature = "redis")]
pub struct RedisKeyValue {
    client: redis::Client,
}

#[cfg(feature = "redis")]
impl RedisKeyValue {
    pub fn new(redis_url: &str) -> Result<Self, KvError> {
        let client = redis::Client::open(redis_url).map_err(|e| KvError::Backend(e.to_string()))?;
        Ok(Self { client })
    }

    fn connection(&self) -> Result<redis::Connection, KvError> {
        self.client
            .get_connection()
            .map_err(|e| KvError::Backend(e.to_string()))
    }
}

#[cfg(feature = "redis")]
impl KeyValuePort for RedisKeyValue {
    fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let mut conn = self.connection()?;
        redis::cmd("GET")
            .arg(key)
            .query::<Option<String>>(&mut conn)
            .map_err(|e| KvError::Backend(e.to_string()))
    }

    fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), KvError> {
        let mut conn = self.connection()?;
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl.as_millis().max(1) as u64)
            .query::<()>(&mut conn)
            .map_err(|e| KvError::Backend(e.to_string()))
    }

    fn delete(&self, key: &str) -> Result<(), KvError> {
        let mut conn = self.connection()?;
        redis::cmd("DEL")
            .arg(key)
            .query::<i64>(&mut conn)
            .map(|_| ())
            .map_err(|e| KvError::Backend(e.to_string()))
    }
}

/// Stores successful JSON responses under `idem:<tenant>:<route>:<key>` so a
/// repeated request with the same key replays instead of re-executing.
#[derive(Clone)]
pub struct IdempotencyCache {
    kv: Arc<dyn KeyValuePort>,
    ttl: Duration,
}

impl IdempotencyCache {
    pub fn new(kv: Arc<dyn KeyValuePort>, ttl: Duration) -> Self {
        Self { kv, ttl }
    }

    pub fn key(tenant_id: TenantId, route: &str, idempotency_key: &str) -> String {
        format!("idem:{tenant_id}:{route}:{idempotency_key}")
    }

    pub fn recall(
        &self,
        tenant_id: TenantId,
        route: &str,
        idempotency_key: &str,
    ) -> Result<Option<JsonValue>, KvError> {
        let Some(raw) = self.kv.get(&Self::key(tenant_id, route, idempotency_key))? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| KvError::Corrupt(e.to_string()))
    }

    pub fn remember(
        &self,
        tenant_id: TenantId,
        route: &str,
        idempotency_key: &str,
        response: &JsonValue,
    ) -> Result<(), KvError> {
        self.kv
            .put(&Self::key(tenant_id, route, idempotency_key), &response.to_string(), self.ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entries_expire() {
        let kv = InMemoryKeyValue::new();
        kv.put("a", "1", Duration::from_secs(60)).unwrap();
        kv.put("b", "2", Duration::ZERO).unwrap();
        assert_eq!(kv.get("a").unwrap().as_deref(), Some("1"));
        assert_eq!(kv.get("b").unwrap(), None);
        kv.delete("a").unwrap();
        assert_eq!(kv.get("a").unwrap(), None);
    }

    #[test]
    fn idempotent_responses_are_tenant_scoped() {
        let cache =
            IdempotencyCache::new(Arc::new(InMemoryKeyValue::new()), Duration::from_secs(60));
        let t1 = TenantId::new();
        let t2 = TenantId::new();
        let body = json!({"movementId": "m-1", "balanceAfter": 7});

        cache.remember(t1, "movements", "k-1", &body).unwrap();
        assert_eq!(cache.recall(t1, "movements", "k-1").unwrap(), Some(body));
        assert_eq!(cache.recall(t2, "movements", "k-1").unwrap(), None);
        assert_eq!(cache.recall(t1, "opname", "k-1").unwrap(), None);
    }
}
