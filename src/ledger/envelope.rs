//! Call and response envelopes exchanged with the ledger conductor

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// Target of a call: the installed app's cell plus module and function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallTarget {
    pub app_id: String,
    pub role_name: String,
    pub zome: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallData {
    pub cell_id: (String, String),
    pub zome: String,
    pub fn_name: String,
    pub payload: Value,
    /// Always null: the conductor signs with its own agent
    pub provenance: Option<String>,
}

/// Request frame: `{"type":"call","data":{...}}`
#[derive(Debug, Clone, Serialize)]
pub struct CallRequest {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub data: CallData,
}

impl CallRequest {
    #[must_use]
    pub fn new(target: &CallTarget, function: &str, payload: Value) -> Self {
        Self {
            kind: "call",
            data: CallData {
                cell_id: (target.app_id.clone(), target.role_name.clone()),
                zome: target.zome.clone(),
                fn_name: function.to_string(),
                payload,
                provenance: None,
            },
        }
    }

    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Response frame: `{"type":"success"|<other>,"data":...}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallResponse {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

impl CallResponse {
    pub fn decode(frame: &str) -> serde_json::Result<Self> {
        serde_json::from_str(frame)
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.kind == "success"
    }

    #[must_use]
    pub fn success(data: Value) -> Self {
        Self {
            kind: "success".to_string(),
            data,
        }
    }

    #[must_use]
    pub fn error(data: Value) -> Self {
        Self {
            kind: "error".to_string(),
            data,
        }
    }
}
