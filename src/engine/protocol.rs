//! Wire types for the engine protocol.
//!
//! Messages are line-delimited JSON-RPC 2.0 (each message is one line):
//! ```text
//! {"jsonrpc":"2.0","id":3,"method":"build/run","params":{...}}\n
//! {"jsonrpc":"2.0","method":"build/output","params":{"stream":"stdout","text":"..."}}\n
//! {"jsonrpc":"2.0","id":3,"result":{}}\n
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::OutputStream;

pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC error code the engine uses for a build that ran and failed.
///
/// Any other error code on a build response means the engine refused the request
/// itself, for example an unknown command-line option.
pub const BUILD_FAILED: i64 = -32001;

pub mod methods {
    pub const INITIALIZE: &str = "initialize";
    pub const DESCRIBE_ENVIRONMENT: &str = "environment/describe";
    pub const FETCH_MODEL: &str = "model/fetch";
    pub const RUN_BUILD: &str = "build/run";
    pub const BUILD_OUTPUT: &str = "build/output";
    pub const SHUTDOWN: &str = "shutdown";
}

// ============================================================
// Outgoing
// ============================================================

/// JSON-RPC 2.0 request
#[derive(Debug, Serialize)]
pub struct Request<'a, P> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<P>,
}

impl<'a, P: Serialize> Request<'a, P> {
    pub fn new(id: u64, method: &'a str, params: Option<P>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method,
            params,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InitializeParams<'a> {
    pub project_dir: &'a Path,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installation: Option<&'a Path>,
    pub client: ClientInfo,
}

#[derive(Debug, Serialize)]
pub struct ClientInfo {
    pub name: &'static str,
    pub version: &'static str,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FetchModelParams<'a> {
    pub arguments: &'a [String],
}

// ============================================================
// Incoming
// ============================================================

/// Any line the engine sends: a response to one of our requests, or a notification.
#[derive(Debug, Deserialize)]
pub struct Incoming {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl RpcError {
    /// Whether the engine ran the build and the build failed.
    pub fn is_build_failure(&self) -> bool {
        self.code == BUILD_FAILED
    }

    /// Message plus string `data` (the engine puts the failure cause there).
    pub fn diagnostic(&self) -> String {
        match self.data {
            Some(Value::String(ref detail)) if !detail.is_empty() => {
                format!("{}\n{}", self.message, detail)
            }
            _ => self.message.clone(),
        }
    }
}

/// Params of a `build/output` notification.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputChunk {
    pub stream: OutputStream,
    pub text: String,
}

/// An [`Incoming`] line sorted into what it means.
#[derive(Debug)]
pub enum Message {
    Response {
        id: u64,
        outcome: Result<Value, RpcError>,
    },
    Notification {
        method: String,
        params: Value,
    },
}

impl Incoming {
    pub fn into_message(self) -> Option<Message> {
        match (self.id, self.method) {
            (Some(id), None) => Some(Message::Response {
                id,
                outcome: match self.error {
                    Some(error) => Err(error),
                    None => Ok(self.result.unwrap_or(Value::Null)),
                },
            }),
            (None, Some(method)) => Some(Message::Notification {
                method,
                params: self.params.unwrap_or(Value::Null),
            }),
            _ => None,
        }
    }
}
