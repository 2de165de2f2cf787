//! Request and response bodies of the five operations.
//!
//! The same types are the JSON bodies of the HTTP binding and the payloads of
//! the signed envelopes of the agent binding.  For the latter every type is a
//! [`Model`] identified by a digest of its JSON Schema, which is how a reply
//! is matched to the request it answers.

use airis_types::EnvironmentPayload;
use schemars::JsonSchema;
use schemars::r#gen::SchemaGenerator;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::session::{PostActionAck, StatusReply};

/// A message type that can travel inside an envelope.
pub trait Model: Serialize + DeserializeOwned + JsonSchema + Sized {
    /// `"model:" + hex(sha256(json schema))`.
    fn schema_digest() -> String {
        let schema = SchemaGenerator::default().into_root_schema_for::<Self>();
        let canonical = serde_json::to_string(&schema).unwrap_or_default();
        format!("model:{}", hex::encode(Sha256::digest(canonical.as_bytes())))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct InitializeRequest {
    pub goal: Value,
    pub actions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct InitializeResponse {
    pub session_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PreActionRequest {
    pub session_id: String,
    pub environment_state: EnvironmentPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PreActionResponse {
    pub suggested_action: String,
    pub state_output: String,
    pub edges_output: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PostActionRequest {
    pub session_id: String,
    pub environment_state: EnvironmentPayload,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PostActionResponse {
    #[serde(default)]
    pub suggested_action: Option<String>,
    #[serde(default)]
    pub state_output: Option<String>,
    #[serde(default)]
    pub edges_output: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RuntimeRequest {
    pub session_id: String,
    pub goal: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RuntimeResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EndSessionRequest {
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EndSessionResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
}

impl Model for InitializeRequest {}
impl Model for InitializeResponse {}
impl Model for PreActionRequest {}
impl Model for PreActionResponse {}
impl Model for PostActionRequest {}
impl Model for PostActionResponse {}
impl Model for RuntimeRequest {}
impl Model for RuntimeResponse {}
impl Model for EndSessionRequest {}
impl Model for EndSessionResponse {}

impl From<PostActionResponse> for PostActionAck {
    fn from(r: PostActionResponse) -> Self {
        PostActionAck {
            suggested_action: r.suggested_action,
            state_output: r.state_output,
            edges_output: r.edges_output,
        }
    }
}

impl From<RuntimeResponse> for StatusReply {
    fn from(r: RuntimeResponse) -> Self {
        StatusReply {
            status: r.status,
            message: r.message,
        }
    }
}

impl From<EndSessionResponse> for StatusReply {
    fn from(r: EndSessionResponse) -> Self {
        StatusReply {
            status: r.status,
            message: r.message,
        }
    }
}
