use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use serde::Serialize;
use vcwarden_core::{ChannelId, RoleId, TransportResult, UserId, VcWardenError};

/// Largest chunk delivered in one message; the platform limit is 2000.
pub const MESSAGE_CHUNK_LIMIT: usize = 1_900;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
/// Enumerates supported `CommandOptionValue` values.
pub enum CommandOptionValue {
    String(String),
    Channel(ChannelId),
    Boolean(bool),
    Role(RoleId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandCaller {
    pub user_id: UserId,
    pub role_ids: BTreeSet<RoleId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// A slash command invocation with typed options.
pub struct CommandRequest {
    pub name: String,
    pub caller: CommandCaller,
    pub options: BTreeMap<String, CommandOptionValue>,
}

impl CommandRequest {
    pub fn new(name: impl Into<String>, caller: CommandCaller) -> Self {
        Self {
            name: name.into(),
            caller,
            options: BTreeMap::new(),
        }
    }

    pub fn with_option(mut self, name: &str, value: CommandOptionValue) -> Self {
        self.options.insert(name.to_string(), value);
        self
    }

    pub fn string(&self, name: &str) -> Option<&str> {
        match self.options.get(name) {
            Some(CommandOptionValue::String(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn boolean(&self, name: &str) -> Option<bool> {
        match self.options.get(name) {
            Some(CommandOptionValue::Boolean(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn required_channel(&self, name: &str) -> Result<ChannelId, VcWardenError> {
        match self.options.get(name) {
            Some(CommandOptionValue::Channel(value)) => Ok(*value),
            _ => Err(missing_option(name)),
        }
    }

    pub fn required_role(&self, name: &str) -> Result<RoleId, VcWardenError> {
        match self.options.get(name) {
            Some(CommandOptionValue::Role(value)) => Ok(*value),
            _ => Err(missing_option(name)),
        }
    }
}

fn missing_option(name: &str) -> VcWardenError {
    VcWardenError::validation(format!("Missing required option '{name}'"))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InfoField {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// Titled card of name/value fields (rendered as an embed on Discord).
pub struct InfoCard {
    pub title: String,
    pub color: u32,
    pub fields: Vec<InfoField>,
}

impl InfoCard {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| field.value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "body", rename_all = "snake_case")]
/// Enumerates supported `CommandReply` values.
pub enum CommandReply {
    Text(String),
    /// First chunk replaces the deferred reply; the rest follow up.
    Chunks(Vec<String>),
    Card(InfoCard),
}

#[async_trait]
/// Trait contract for command response delivery.
pub trait CommandResponder: Send + Sync {
    /// Acknowledges the request privately; later content edits this reply.
    async fn defer(&self) -> TransportResult<()>;

    async fn edit_reply(&self, content: String) -> TransportResult<()>;

    async fn edit_reply_card(&self, card: InfoCard) -> TransportResult<()>;

    async fn follow_up(&self, content: String) -> TransportResult<()>;

    /// Private reply for requests that were never deferred.
    async fn reply_ephemeral(&self, content: String) -> TransportResult<()>;
}

/// Joins names with `, ` into chunks no longer than `limit` characters.
///
/// A name is never split across chunks; a single name longer than `limit`
/// becomes its own chunk.
pub fn chunk_names(names: &[String], limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for name in names {
        if current.is_empty() {
            current.push_str(name);
            continue;
        }
        if current.chars().count() + 2 + name.chars().count() > limit {
            chunks.push(std::mem::take(&mut current));
            current.push_str(name);
        } else {
            current.push_str(", ");
            current.push_str(name);
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
