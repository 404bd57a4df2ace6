use crate::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared variable store of one execution.
///
/// Cloning is cheap and every clone points at the same map. All writes go
/// through the internal lock, so parallel branches never lose updates.
#[derive(Clone, Default, Debug)]
pub struct Variables {
    inner: Arc<RwLock<HashMap<String, Value>>>,
}

impl Variables {
    pub fn new(initial: HashMap<String, Value>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(initial)),
        }
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        self.inner.read().await.get(key).cloned()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.inner.read().await.contains_key(key)
    }

    /// Store `value` under `key`, returning the previous value.
    pub async fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.inner.write().await.insert(key.into(), value.into())
    }

    pub async fn remove(&self, key: &str) -> Option<Value> {
        self.inner.write().await.remove(key)
    }

    /// Read-modify-write a single key while holding the write lock.
    ///
    /// `f` receives the current value (if any) and returns the new one.
    pub async fn update<F>(&self, key: impl Into<String>, f: F) -> Value
    where
        F: FnOnce(Option<&Value>) -> Value,
    {
        let key = key.into();
        let mut vars = self.inner.write().await;
        let next = f(vars.get(&key));
        vars.insert(key, next.clone());
        next
    }

    pub async fn snapshot(&self) -> HashMap<String, Value> {
        self.inner.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn clones_share_state() {
        let vars = Variables::default();
        let other = vars.clone();
        other.set("greeting", "hi").await;
        assert_eq!(vars.get("greeting").await, Some(Value::from("hi")));
        assert_eq!(vars.remove("greeting").await, Some(Value::from("hi")));
        assert!(!other.contains("greeting").await);
    }

    #[tokio::test]
    async fn concurrent_updates_are_serialized() {
        let vars = Variables::default();
        let mut tasks = Vec::new();
        for _ in 0..32 {
            let vars = vars.clone();
            tasks.push(tokio::spawn(async move {
                vars.update("count", |current| {
                    let n = current.and_then(Value::as_f64).unwrap_or(0.0);
                    Value::Number(n + 1.0)
                })
                .await
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(vars.get("count").await, Some(Value::Number(32.0)));
    }
}
