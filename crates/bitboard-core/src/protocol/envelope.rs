//! Bridge envelopes (JSON).
//!
//! - `Request`: content → native, `{id, action, payload}`
//! - `Response`: native → content, `{id, result, error}` correlated on `id`
//! - `Callback`: native → content, `{name, args}`, uncorrelated events
//!
//! `Request` parsing is deliberately lenient about `payload` (anything that is
//! not an object becomes `{}`) and strict about `id`/`action`, which are the
//! only fields a response can be correlated on.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{BridgeError, Result};

/// Event names used in callback envelopes.
pub mod events {
    pub const MESH_MESSAGE: &str = "mesh.message";
    pub const MESH_PEER_CHANGE: &str = "mesh.peerChange";
    pub const MESH_STATUS_CHANGE: &str = "mesh.statusChange";
}

/// Request envelope sent by the content context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    /// Opaque correlation token, unique among in-flight calls.
    pub id: String,
    /// Dispatch target, e.g. `mesh.broadcast`.
    pub action: String,
    /// Action parameters (untyped until `Action::parse`).
    pub payload: Map<String, Value>,
}

impl Request {
    pub fn new(id: impl Into<String>, action: impl Into<String>, payload: Value) -> Self {
        Self {
            id: id.into(),
            action: action.into(),
            payload: into_object(payload),
        }
    }

    /// Decode a raw text frame.
    pub fn parse(raw: &str) -> Result<Self> {
        let v: Value = serde_json::from_str(raw)
            .map_err(|e| BridgeError::MalformedEnvelope(format!("invalid json: {e}")))?;
        Self::from_value(v)
    }

    pub fn from_value(v: Value) -> Result<Self> {
        let Value::Object(mut obj) = v else {
            return Err(BridgeError::MalformedEnvelope("envelope must be an object".into()));
        };

        let id = take_string(&mut obj, "id")?;
        let action = take_string(&mut obj, "action")?;
        let payload = obj.remove("payload").map(into_object).unwrap_or_default();

        Ok(Self { id, action, payload })
    }
}

fn take_string(obj: &mut Map<String, Value>, key: &str) -> Result<String> {
    match obj.remove(key) {
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(BridgeError::MalformedEnvelope(format!("{key} must be a string"))),
        None => Err(BridgeError::MalformedEnvelope(format!("missing {key}"))),
    }
}

fn into_object(v: Value) -> Map<String, Value> {
    match v {
        Value::Object(m) => m,
        _ => Map::new(),
    }
}

/// Response envelope. Both `result` and `error` are always present on the
/// wire; `null` result with `null` error is a void success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: String,
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub error: Option<String>,
}

impl Response {
    pub fn ok(id: impl Into<String>, result: Value) -> Self {
        Self {
            id: id.into(),
            result,
            error: None,
        }
    }

    pub fn err(id: impl Into<String>, error: &BridgeError) -> Self {
        Self {
            id: id.into(),
            result: Value::Null,
            error: Some(error.to_string()),
        }
    }

    pub fn from_result(id: impl Into<String>, res: Result<Value>) -> Self {
        match res {
            Ok(v) => Self::ok(id, v),
            Err(e) => Self::err(id, &e),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Callback (event) envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Callback {
    pub name: String,
    pub args: Vec<Value>,
}

impl Callback {
    /// Single-argument event, the only shape the mesh streams emit.
    pub fn single<T: Serialize>(name: &str, arg: &T) -> Result<Self> {
        let arg = serde_json::to_value(arg)
            .map_err(|e| BridgeError::Internal(format!("callback encode failed: {e}")))?;
        Ok(Self {
            name: name.to_string(),
            args: vec![arg],
        })
    }
}

/// Anything the native side sends to the content context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Outbound {
    Response(Response),
    Callback(Callback),
}

impl Outbound {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| BridgeError::Internal(format!("json encode failed: {e}")))
    }
}
