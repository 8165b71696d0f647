//! Token：Actor 之间传递的不可变数据信封

use serde_json::Value;

use crate::flow::ActorPath;

/// 载荷 + 产生者路径；创建后不可修改，所有权随传递转移给下游 Actor
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    payload: Value,
    produced_by: ActorPath,
}

impl Token {
    pub fn new(payload: impl Into<Value>, produced_by: ActorPath) -> Self {
        Self {
            payload: payload.into(),
            produced_by,
        }
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn produced_by(&self) -> &ActorPath {
        &self.produced_by
    }

    pub fn into_payload(self) -> Value {
        self.payload
    }

    /// 载荷的字符串形式：字符串原样返回，其它类型输出 JSON
    pub fn payload_text(&self) -> String {
        match &self.payload {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_text() {
        let path = ActorPath::root("Flow").child("ForLoop");
        assert_eq!(Token::new("abc", path.clone()).payload_text(), "abc");
        assert_eq!(Token::new(42, path.clone()).payload_text(), "42");
        let token = Token::new(serde_json::json!({"a": 1}), path.clone());
        assert_eq!(token.payload_text(), r#"{"a":1}"#);
        assert_eq!(token.produced_by(), &path);
    }
}
