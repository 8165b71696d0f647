//! 流程变量：name -> string，通过 `@{name}` 在 Actor 配置读取时替换
//!
//! 未定义的变量必须显式报错（不回退为空字符串），以便尽早暴露配置错误。
//! `@{env.NAME}` 读取进程环境变量。

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use tokio::sync::RwLock;

use crate::core::FlowError;

/// 环境变量前缀
pub const ENVIRONMENT_VARIABLE_PREFIX: &str = "env.";

/// 嵌套展开的最大轮数（变量值中再次引用变量）
const MAX_EXPANSION_DEPTH: usize = 16;

pub type VariablesSnapshot = HashMap<String, String>;

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"@\{([A-Za-z0-9_\-:.]+)\}").expect("valid variable placeholder regex"))
}

fn name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_\-:.]+$").expect("valid variable name regex"))
}

/// 按 regex 的第一个捕获组查找替换值，直到不再含占位符；自引用或超过最大轮数时报错
pub(crate) fn expand_placeholders<F, E>(
    text: &str,
    placeholder: &Regex,
    lookup: F,
    missing: E,
) -> Result<String, FlowError>
where
    F: Fn(&str) -> Option<String>,
    E: Fn(&str) -> FlowError,
{
    let mut current = text.to_string();
    for _ in 0..MAX_EXPANSION_DEPTH {
        if !placeholder.is_match(&current) {
            return Ok(current);
        }
        let mut out = String::with_capacity(current.len());
        let mut last = 0;
        for caps in placeholder.captures_iter(&current) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let value = lookup(name.as_str()).ok_or_else(|| missing(name.as_str()))?;
            out.push_str(&current[last..whole.start()]);
            out.push_str(&value);
            last = whole.end();
        }
        out.push_str(&current[last..]);
        if out == current {
            break;
        }
        current = out;
    }
    if placeholder.is_match(&current) {
        return Err(FlowError::CyclicReference(text.to_string()));
    }
    Ok(current)
}

fn lookup_in(values: &HashMap<String, String>, name: &str) -> Option<String> {
    match name.strip_prefix(ENVIRONMENT_VARIABLE_PREFIX) {
        Some(env_name) => std::env::var(env_name).ok(),
        None => values.get(name).cloned(),
    }
}

/// 流程级变量表
#[derive(Debug, Default)]
pub struct Variables {
    values: RwLock<HashMap<String, String>>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    /// 名称是否只包含允许的字符
    pub fn is_valid_name(name: &str) -> bool {
        name_regex().is_match(name)
    }

    /// 文本中是否含有 `@{...}` 占位符
    pub fn contains_placeholder(text: &str) -> bool {
        placeholder_regex().is_match(text)
    }

    pub async fn set(&self, name: impl Into<String>, value: impl Into<String>) {
        self.values.write().await.insert(name.into(), value.into());
    }

    /// 仅当变量不存在时设置
    pub async fn set_default(&self, name: impl Into<String>, value: impl Into<String>) {
        self.values
            .write()
            .await
            .entry(name.into())
            .or_insert_with(|| value.into());
    }

    /// 读取变量；未定义时返回 UnknownVariable
    pub async fn get(&self, name: &str) -> Result<String, FlowError> {
        self.get_opt(name)
            .await
            .ok_or_else(|| FlowError::UnknownVariable(name.to_string()))
    }

    pub async fn get_opt(&self, name: &str) -> Option<String> {
        lookup_in(&*self.values.read().await, name)
    }

    pub async fn has(&self, name: &str) -> bool {
        self.values.read().await.contains_key(name)
    }

    pub async fn remove(&self, name: &str) -> Option<String> {
        self.values.write().await.remove(name)
    }

    /// 按名称排序
    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.values.read().await.keys().cloned().collect();
        names.sort();
        names
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

    pub async fn snapshot(&self) -> VariablesSnapshot {
        self.values.read().await.clone()
    }

    /// 合并快照（同名覆盖）
    pub async fn assign(&self, snapshot: VariablesSnapshot) {
        self.values.write().await.extend(snapshot);
    }

    /// 替换文本中所有 `@{name}`
    pub async fn expand(&self, text: &str) -> Result<String, FlowError> {
        if !Self::contains_placeholder(text) {
            return Ok(text.to_string());
        }
        let values = self.values.read().await;
        Self::expand_with(&values, text)
    }

    /// 针对快照展开（流程已 cleanUp 后重启操作使用）
    pub fn expand_with(values: &HashMap<String, String>, text: &str) -> Result<String, FlowError> {
        expand_placeholders(
            text,
            placeholder_regex(),
            |name| lookup_in(values, name),
            |name| FlowError::UnknownVariable(name.to_string()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_and_unknown() {
        let vars = Variables::new();
        vars.set("dir", "/data").await;
        assert_eq!(vars.get("dir").await.unwrap(), "/data");
        let err = vars.get("missing").await.unwrap_err();
        assert_eq!(err.to_string(), "unknown variable: missing");
    }

    #[tokio::test]
    async fn test_expand() {
        let vars = Variables::new();
        vars.set("dir", "/data").await;
        vars.set("file", "out.txt").await;
        assert_eq!(
            vars.expand("@{dir}/@{file}").await.unwrap(),
            "/data/out.txt"
        );
        assert_eq!(vars.expand("no placeholders").await.unwrap(), "no placeholders");
    }

    #[tokio::test]
    async fn test_expand_undefined_fails() {
        let vars = Variables::new();
        vars.set("a", "1").await;
        let err = vars.expand("@{a}-@{b}").await.unwrap_err();
        assert!(matches!(err, FlowError::UnknownVariable(name) if name == "b"));
    }

    #[tokio::test]
    async fn test_expand_nested_value() {
        let vars = Variables::new();
        vars.set("base", "/srv").await;
        vars.set("path", "@{base}/flows").await;
        assert_eq!(vars.expand("@{path}").await.unwrap(), "/srv/flows");
    }

    #[tokio::test]
    async fn test_expand_self_reference_fails() {
        let vars = Variables::new();
        vars.set("a", "x@{a}").await;
        vars.set("b", "@{b}").await;
        vars.set("c", "@{d}").await;
        vars.set("d", "@{c}").await;
        for text in ["@{a}", "@{b}", "@{c}"] {
            let err = vars.expand(text).await.unwrap_err();
            assert!(matches!(err, FlowError::CyclicReference(ref t) if t == text), "{}", err);
        }
    }

    #[tokio::test]
    async fn test_expand_environment() {
        std::env::set_var("FLOWLINE_VARIABLES_TEST", "from-env");
        let vars = Variables::new();
        assert_eq!(
            vars.expand("@{env.FLOWLINE_VARIABLES_TEST}").await.unwrap(),
            "from-env"
        );
    }

    #[tokio::test]
    async fn test_snapshot_assign_and_set_default() {
        let vars = Variables::new();
        vars.set("x", "1").await;
        let snapshot = vars.snapshot().await;
        vars.clear().await;
        assert!(vars.is_empty().await);
        vars.assign(snapshot).await;
        vars.set_default("x", "2").await;
        vars.set_default("y", "3").await;
        assert_eq!(vars.get("x").await.unwrap(), "1");
        assert_eq!(vars.names().await, vec!["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn test_valid_names() {
        assert!(Variables::is_valid_name("flow_filename_long"));
        assert!(Variables::is_valid_name("a.b:c-d"));
        assert!(!Variables::is_valid_name("has space"));
        assert!(!Variables::is_valid_name(""));
    }
}
