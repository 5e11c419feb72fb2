//! Structured prompt contract
//!
//! Every structured exchange with a model is framed as ROLE / DATA / TASK /
//! RESPONSE_FORMAT. The reply must be a single JSON object that validates
//! against the declared [`ResponseSchema`]. A reply that fails validation gets
//! exactly one repair round with the validation error appended; a second
//! failure is reported as [`ContractError::Schema`].

use serde_json::{json, Map, Value};

use super::router::LLMRouter;
use super::{extract_json_object, LLMError, Message, ResponseFormat};
use crate::events::{EventKind, EventSink};

/// Allowed JSON type for a response field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    String,
    Number,
    /// String restricted to one of the listed values
    Enum(Vec<&'static str>),
    /// Array of strings
    StringArray,
}

impl FieldKind {
    fn describe(&self) -> Value {
        match self {
            FieldKind::String => json!("string"),
            FieldKind::Number => json!("number"),
            FieldKind::Enum(values) => json!(values.join("|")),
            FieldKind::StringArray => json!(["string"]),
        }
    }
}

/// One field of the response object.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    /// `null` is an accepted value
    pub nullable: bool,
}

impl FieldSpec {
    pub fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            nullable: false,
        }
    }

    pub fn nullable(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            nullable: true,
        }
    }
}

/// Declared shape of the JSON reply. Every field must be present; nullable
/// fields may carry `null`. Unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResponseSchema {
    pub fields: Vec<FieldSpec>,
}

impl ResponseSchema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    /// Validate a reply, returning a message suitable for the repair prompt.
    pub fn validate(&self, value: &Value) -> Result<(), String> {
        let object = value
            .as_object()
            .ok_or_else(|| "response must be a JSON object".to_string())?;

        for field in &self.fields {
            let Some(v) = object.get(field.name) else {
                return Err(format!("missing required field '{}'", field.name));
            };

            if v.is_null() {
                if field.nullable {
                    continue;
                }
                return Err(format!("field '{}' must not be null", field.name));
            }

            let ok = match &field.kind {
                FieldKind::String => v.is_string(),
                FieldKind::Number => v.is_number() && v.as_f64().is_some_and(f64::is_finite),
                FieldKind::Enum(allowed) => v.as_str().is_some_and(|s| allowed.contains(&s)),
                FieldKind::StringArray => v
                    .as_array()
                    .is_some_and(|items| items.iter().all(Value::is_string)),
            };

            if !ok {
                return Err(format!(
                    "field '{}' must be {}{}, got {}",
                    field.name,
                    field.kind.describe(),
                    if field.nullable { " or null" } else { "" },
                    v
                ));
            }
        }

        Ok(())
    }

    /// Example object rendered into the RESPONSE_FORMAT section.
    pub fn describe(&self) -> Value {
        let mut map = Map::new();
        for field in &self.fields {
            let mut kind = field.kind.describe();
            if field.nullable {
                if let Value::String(s) = &kind {
                    kind = json!(format!("{}|null", s));
                }
            }
            map.insert(field.name.to_string(), kind);
        }
        Value::Object(map)
    }
}

/// A ROLE / DATA / TASK / RESPONSE_FORMAT prompt.
#[derive(Debug, Clone)]
pub struct PromptContract {
    pub role: String,
    pub data: Value,
    pub task: String,
    pub schema: ResponseSchema,
}

impl PromptContract {
    pub fn new(
        role: impl Into<String>,
        data: Value,
        task: impl Into<String>,
        schema: ResponseSchema,
    ) -> Self {
        Self {
            role: role.into(),
            data,
            task: task.into(),
            schema,
        }
    }

    /// Render the contract as a system + user message pair.
    pub fn to_messages(&self) -> Vec<Message> {
        let mut system = format!("ROLE:\n{}\n\nTASK:\n{}", self.role, self.task);
        if !self.schema.fields.is_empty() {
            system.push_str(&format!(
                "\n\nRESPONSE_FORMAT:\nReturn JSON only, exactly this shape:\n{}",
                self.schema.describe()
            ));
        }
        vec![
            Message::system(system),
            Message::user(format!("DATA:\n{}", self.data)),
        ]
    }
}

/// Why a structured exchange produced no usable object.
#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    /// No provider answered
    #[error("LLM transport failed: {0}")]
    Transport(#[from] LLMError),

    /// The reply failed validation twice (initial attempt plus one repair)
    #[error("LLM reply failed schema validation after repair: {0}")]
    Schema(String),
}

/// A validated reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractReply {
    pub value: Value,
    pub provider: String,
    /// True when the repair round produced the accepted reply
    pub repaired: bool,
}

/// Parse and validate raw model content.
fn check_reply(content: &str, schema: &ResponseSchema) -> Result<Value, String> {
    let value = extract_json_object(content)
        .ok_or_else(|| "response is not a JSON object".to_string())?;
    schema.validate(&value)?;
    Ok(value)
}

/// Run a structured exchange with at most one repair round.
pub async fn exchange(
    router: &LLMRouter,
    contract: &PromptContract,
    sink: &dyn EventSink,
) -> Result<ContractReply, ContractError> {
    let mut messages = contract.to_messages();

    sink.record(
        EventKind::LlmRequest,
        json!({ "attempt": 1, "messages": &messages }),
    );
    let (content, provider) = call(router, &messages, sink).await?;
    sink.record(
        EventKind::LlmResponse,
        json!({ "attempt": 1, "provider": &provider, "content": &content }),
    );

    let error = match check_reply(&content, &contract.schema) {
        Ok(value) => {
            return Ok(ContractReply {
                value,
                provider,
                repaired: false,
            })
        }
        Err(error) => error,
    };

    tracing::warn!("LLM reply failed validation ({}), requesting repair", error);
    sink.record(EventKind::ContractRepair, json!({ "error": &error }));

    messages.push(Message::assistant(content));
    messages.push(Message::user(format!(
        "Your previous reply was invalid: {}. Reply again with only a JSON object that matches RESPONSE_FORMAT exactly.",
        error
    )));

    sink.record(
        EventKind::LlmRequest,
        json!({ "attempt": 2, "messages": &messages }),
    );
    let (content, provider) = call(router, &messages, sink).await?;
    sink.record(
        EventKind::LlmResponse,
        json!({ "attempt": 2, "provider": &provider, "content": &content }),
    );

    match check_reply(&content, &contract.schema) {
        Ok(value) => Ok(ContractReply {
            value,
            provider,
            repaired: true,
        }),
        Err(error) => {
            sink.record(EventKind::LlmFailure, json!({ "schema_error": &error }));
            Err(ContractError::Schema(error))
        }
    }
}

async fn call(
    router: &LLMRouter,
    messages: &[Message],
    sink: &dyn EventSink,
) -> Result<(String, String), ContractError> {
    router
        .call(messages, ResponseFormat::Json)
        .await
        .map_err(|e| {
            sink.record(EventKind::LlmFailure, json!({ "error": e.to_string() }));
            ContractError::Transport(e)
        })
}
