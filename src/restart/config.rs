//! 重启操作配置：按 `type` 标签区分的封闭枚举，构建为 `Box<dyn RestartOperation>`

use serde::{Deserialize, Serialize};

use crate::flow::VAR_FLOW_FILENAME_LONG;
use crate::restart::{
    ExternalCommand, FlowFile, MultiOperation, NullOperation, RestartItself, RestartOperation,
    ShellProcessRunner,
};

fn default_timeout_secs() -> u64 {
    60
}

fn default_variable() -> String {
    VAR_FLOW_FILENAME_LONG.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RestartOperationConfig {
    #[default]
    Null,
    ExternalCommand {
        command: String,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
    FlowFile {
        file: String,
    },
    RestartItself {
        #[serde(default)]
        use_flow_file_variable: bool,
        #[serde(default = "default_variable")]
        variable: String,
    },
    Multi {
        #[serde(default)]
        operations: Vec<RestartOperationConfig>,
    },
}

impl RestartOperationConfig {
    pub fn build(&self) -> Box<dyn RestartOperation> {
        match self {
            RestartOperationConfig::Null => Box::new(NullOperation),
            RestartOperationConfig::ExternalCommand {
                command,
                timeout_secs,
            } => Box::new(ExternalCommand::with_runner(
                command.clone(),
                std::sync::Arc::new(ShellProcessRunner::new(*timeout_secs)),
            )),
            RestartOperationConfig::FlowFile { file } => Box::new(FlowFile::new(file.clone())),
            RestartOperationConfig::RestartItself {
                use_flow_file_variable,
                variable,
            } => Box::new(RestartItself::new(*use_flow_file_variable).with_variable(variable.clone())),
            RestartOperationConfig::Multi { operations } => Box::new(MultiOperation::new(
                operations.iter().map(|op| op.build()).collect(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tags_and_defaults() {
        let config: RestartOperationConfig = serde_json::from_value(json!({
            "type": "multi",
            "operations": [
                { "type": "external_command", "command": "echo hi" },
                { "type": "flow_file", "file": "@{flow_dir}/other.json" },
                { "type": "restart_itself" },
                { "type": "null" }
            ]
        }))
        .unwrap();
        let RestartOperationConfig::Multi { operations } = &config else {
            panic!("expected multi");
        };
        assert_eq!(
            operations[0],
            RestartOperationConfig::ExternalCommand {
                command: "echo hi".into(),
                timeout_secs: 60
            }
        );
        assert_eq!(
            operations[2],
            RestartOperationConfig::RestartItself {
                use_flow_file_variable: false,
                variable: "flow_filename_long".into()
            }
        );

        let built = config.build();
        assert_eq!(built.name(), "multi");
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let result: Result<RestartOperationConfig, _> =
            serde_json::from_value(json!({ "type": "reboot" }));
        assert!(result.is_err());
    }
}
