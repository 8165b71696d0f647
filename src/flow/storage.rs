//! 流程存储：name -> 任意值（serde_json::Value），在互不相连的流程分支之间传递数据
//!
//! 归属单个 Flow 实例，cleanUp 时清空。`%{name}` 占位符展开为存储值。

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::core::FlowError;
use crate::flow::variables::expand_placeholders;

pub type StorageSnapshot = HashMap<String, Value>;

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"%\{([A-Za-z0-9_\-:.]+)\}").expect("valid storage placeholder regex"))
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Default)]
pub struct Storage {
    values: RwLock<HashMap<String, Value>>,
}

impl Storage {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入并返回旧值
    pub async fn put(&self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.write().await.insert(name.into(), value.into())
    }

    pub async fn get(&self, name: &str) -> Option<Value> {
        self.values.read().await.get(name).cloned()
    }

    pub async fn has(&self, name: &str) -> bool {
        self.values.read().await.contains_key(name)
    }

    pub async fn remove(&self, name: &str) -> Option<Value> {
        self.values.write().await.remove(name)
    }

    /// 按名称排序
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.values.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub async fn len(&self) -> usize {
        self.values.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.values.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.values.write().await.clear();
    }

    pub async fn snapshot(&self) -> StorageSnapshot {
        self.values.read().await.clone()
    }

    pub async fn assign(&self, snapshot: StorageSnapshot) {
        self.values.write().await.extend(snapshot);
    }

    /// 替换文本中所有 `%{name}`；字符串值原样插入，其它值以 JSON 插入
    pub async fn expand(&self, text: &str) -> Result<String, FlowError> {
        let values = self.values.read().await;
        expand_placeholders(
            text,
            placeholder_regex(),
            |name| values.get(name).map(render),
            |name| FlowError::UnknownStorageValue(name.to_string()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_put_get_remove() {
        let storage = Storage::new();
        assert!(storage.put("dataset", json!([1, 2, 3])).await.is_none());
        assert_eq!(storage.get("dataset").await, Some(json!([1, 2, 3])));
        assert_eq!(
            storage.put("dataset", json!("replaced")).await,
            Some(json!([1, 2, 3]))
        );
        assert!(storage.has("dataset").await);
        storage.remove("dataset").await;
        assert!(storage.is_empty().await);
    }

    #[tokio::test]
    async fn test_expand() {
        let storage = Storage::new();
        storage.put("name", "iris").await;
        storage.put("rows", 150).await;
        assert_eq!(
            storage.expand("%{name} has %{rows} rows").await.unwrap(),
            "iris has 150 rows"
        );
        let err = storage.expand("%{missing}").await.unwrap_err();
        assert_eq!(err.to_string(), "unknown storage value: missing");
    }

    #[tokio::test]
    async fn test_snapshot_roundtrip() {
        let storage = Storage::new();
        storage.put("a", 1).await;
        storage.put("b", "two").await;
        let snapshot = storage.snapshot().await;
        storage.clear().await;
        assert!(storage.is_empty().await);
        storage.assign(snapshot).await;
        assert_eq!(storage.keys().await, vec!["a".to_string(), "b".to_string()]);
    }
}
