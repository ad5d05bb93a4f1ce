//! Tool handlers for exposing sessions over an RPC layer.
//!
//! Each handler takes plain arguments and returns a JSON-serializable value.
//! The `vendor` / `deviceMode` fields of connect and execute results come from
//! classifying the output just captured, so they follow the device's current
//! prompt rather than the vendor stored on the session.
//!
//! # Tools
//!
//! - `telnet_connect` - Open a session and report the first prompt
//! - `telnet_execute` - Run a command and return its raw output
//! - `telnet_list_sessions` - List live sessions
//! - `telnet_disconnect` - Close a session

use std::sync::Arc;

use log::debug;
use schemars::{JsonSchema, schema_for};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config;
use crate::error::TelnetError;
use crate::prompt::Vendor;
use crate::session::{SessionInfo, SessionManager};

pub const TOOL_CONNECT: &str = "telnet_connect";
pub const TOOL_EXECUTE: &str = "telnet_execute";
pub const TOOL_LIST_SESSIONS: &str = "telnet_list_sessions";
pub const TOOL_DISCONNECT: &str = "telnet_disconnect";

/// Input for telnet_connect.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ConnectInput {
    /// Device hostname or IP address
    pub host: String,
    /// Telnet port, usually 23
    pub port: u16,
}

/// Input for telnet_execute.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExecuteInput {
    /// Session ID returned by telnet_connect
    #[serde(alias = "sessionId")]
    pub session_id: String,
    /// Command line to send, without line terminator. Empty to get a fresh prompt.
    #[serde(default)]
    pub command: String,
}

/// Input for telnet_disconnect.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DisconnectInput {
    /// Session ID returned by telnet_connect
    #[serde(alias = "sessionId")]
    pub session_id: String,
}

/// Input for telnet_list_sessions (empty).
#[derive(Debug, Default, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ListSessionsInput {}

/// Output of telnet_connect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectOutput {
    pub success: bool,
    pub session_id: String,
    pub vendor: Vendor,
    pub device_mode: String,
}

/// Output of telnet_execute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteOutput {
    pub success: bool,
    pub output: String,
    pub vendor: Vendor,
    pub device_mode: String,
}

/// Name, description and input schema of one tool.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

/// Tool handlers backed by one session manager.
#[derive(Clone)]
pub struct DeviceTools {
    sessions: Arc<SessionManager>,
}

impl DeviceTools {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self { sessions }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Handle telnet_connect.
    ///
    /// Sends an empty command after connecting so the reported mode reflects
    /// the prompt the device shows right now.
    pub async fn handle_connect(&self, input: ConnectInput) -> Result<ConnectOutput, TelnetError> {
        debug!("Handling {} {}:{}", TOOL_CONNECT, input.host, input.port);
        let session_id = self.sessions.connect(&input.host, input.port).await?;
        let output = self
            .sessions
            .execute_with_wait(&session_id, "", config::CONNECT_PROMPT_WAIT)
            .await?;
        let detected = self.sessions.classifier().classify(&output);

        Ok(ConnectOutput {
            success: true,
            session_id,
            vendor: detected.vendor,
            device_mode: detected.mode().to_string(),
        })
    }

    /// Handle telnet_execute.
    pub async fn handle_execute(&self, input: ExecuteInput) -> Result<ExecuteOutput, TelnetError> {
        debug!("Handling {} on {}", TOOL_EXECUTE, input.session_id);
        let output = self
            .sessions
            .execute(&input.session_id, &input.command)
            .await?;
        let detected = self.sessions.classifier().classify(&output);

        Ok(ExecuteOutput {
            success: true,
            output,
            vendor: detected.vendor,
            device_mode: detected.mode().to_string(),
        })
    }

    /// Handle telnet_list_sessions.
    pub fn handle_list_sessions(&self) -> Vec<SessionInfo> {
        self.sessions.list_sessions()
    }

    /// Handle telnet_disconnect.
    pub async fn handle_disconnect(&self, input: DisconnectInput) -> Result<String, TelnetError> {
        debug!("Handling {} on {}", TOOL_DISCONNECT, input.session_id);
        self.sessions.disconnect(&input.session_id).await?;
        Ok(format!("Session {} disconnected", input.session_id))
    }

    /// Routes a tool call by name. `args` is the tool's JSON argument object.
    pub async fn call(&self, name: &str, args: Value) -> Result<Value, TelnetError> {
        match name {
            TOOL_CONNECT => to_json(&self.handle_connect(parse_args(args)?).await?),
            TOOL_EXECUTE => to_json(&self.handle_execute(parse_args(args)?).await?),
            TOOL_LIST_SESSIONS => to_json(&self.handle_list_sessions()),
            TOOL_DISCONNECT => to_json(&self.handle_disconnect(parse_args(args)?).await?),
            other => Err(TelnetError::UnknownTool(other.to_string())),
        }
    }
}

/// Returns the definitions of all tools.
pub fn tool_catalog() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: TOOL_CONNECT,
            description: "Open a Telnet session to a Cisco IOS or H3C Comware device. \
                Detects the vendor from the prompt and disables output paging.",
            input_schema: schema_value(schema_for!(ConnectInput)),
        },
        ToolDefinition {
            name: TOOL_EXECUTE,
            description: "Run a CLI command on a session and return the raw output up to \
                and including the device prompt.",
            input_schema: schema_value(schema_for!(ExecuteInput)),
        },
        ToolDefinition {
            name: TOOL_LIST_SESSIONS,
            description: "List open Telnet sessions.",
            input_schema: schema_value(schema_for!(ListSessionsInput)),
        },
        ToolDefinition {
            name: TOOL_DISCONNECT,
            description: "Close a Telnet session.",
            input_schema: schema_value(schema_for!(DisconnectInput)),
        },
    ]
}

fn schema_value(schema: schemars::Schema) -> Value {
    schema.to_value()
}

fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, TelnetError> {
    // Tools without arguments may be called with `null`.
    let args = if args.is_null() {
        Value::Object(Default::default())
    } else {
        args
    };
    serde_json::from_value(args).map_err(|e| TelnetError::InvalidToolArguments(e.to_string()))
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, TelnetError> {
    serde_json::to_value(value).map_err(|e| TelnetError::ToolOutputError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn catalog_lists_all_tools_with_schemas() {
        let catalog = tool_catalog();
        let names: Vec<_> = catalog.iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            vec![
                TOOL_CONNECT,
                TOOL_EXECUTE,
                TOOL_LIST_SESSIONS,
                TOOL_DISCONNECT
            ]
        );
        let connect = &catalog[0].input_schema;
        assert!(connect["properties"]["host"].is_object());
        assert!(connect["properties"]["port"].is_object());
    }

    #[test]
    fn execute_input_accepts_both_id_spellings() {
        let a: ExecuteInput =
            parse_args(json!({"session_id": "abc", "command": "show clock"})).expect("snake");
        let b: ExecuteInput = parse_args(json!({"sessionId": "abc"})).expect("camel");
        assert_eq!(a.session_id, "abc");
        assert_eq!(b.session_id, "abc");
        assert_eq!(b.command, "");
    }

    #[test]
    fn outputs_use_camel_case_keys() {
        let value = to_json(&ConnectOutput {
            success: true,
            session_id: "abc".to_string(),
            vendor: Vendor::Cisco,
            device_mode: "Router#".to_string(),
        })
        .expect("serialize");
        assert_eq!(
            value,
            json!({"success": true, "sessionId": "abc", "vendor": "cisco", "deviceMode": "Router#"})
        );
    }

    struct Unencodable;

    impl Serialize for Unencodable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("device output not encodable"))
        }
    }

    #[test]
    fn encoding_failure_is_an_output_error() {
        match to_json(&Unencodable) {
            Err(TelnetError::ToolOutputError(msg)) => {
                assert!(msg.contains("device output not encodable"))
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn call_rejects_unknown_tools_and_bad_arguments() {
        let tools = DeviceTools::new(Arc::new(SessionManager::default()));

        assert!(matches!(
            tools.call("telnet_reboot", Value::Null).await,
            Err(TelnetError::UnknownTool(name)) if name == "telnet_reboot"
        ));
        assert!(matches!(
            tools.call(TOOL_CONNECT, json!({"host": "10.0.0.1"})).await,
            Err(TelnetError::InvalidToolArguments(_))
        ));
        assert_eq!(
            tools.call(TOOL_LIST_SESSIONS, Value::Null).await.expect("list"),
            json!([])
        );
    }

    #[tokio::test]
    async fn disconnect_of_unknown_session_fails() {
        let tools = DeviceTools::new(Arc::new(SessionManager::default()));
        let err = tools
            .call(TOOL_DISCONNECT, json!({"session_id": "gone"}))
            .await
            .expect_err("unknown session");
        assert!(matches!(err, TelnetError::SessionNotFound(id) if id == "gone"));
    }
}
