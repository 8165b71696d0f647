//! Actor 路径：树中唯一位置的点分名称序列（如 `Flow.Trigger.SetStorageValue`）

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ActorPath(Vec<String>);

impl ActorPath {
    /// 根路径（流程名）
    pub fn root(name: impl Into<String>) -> Self {
        Self(vec![name.into()])
    }

    pub fn child(&self, name: &str) -> Self {
        let mut parts = self.0.clone();
        parts.push(name.to_string());
        Self(parts)
    }

    pub fn parent(&self) -> Option<Self> {
        if self.0.len() <= 1 {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }

    /// 最后一段名称
    pub fn name(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or("")
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for ActorPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

impl FromStr for ActorPath {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<String> = s.split('.').map(str::to_string).collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(format!("invalid actor path: '{s}'"));
        }
        Ok(Self(parts))
    }
}
