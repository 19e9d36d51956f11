//! Wire model shared by every `PipelineApi` implementation
//!
//! These are the request/response shapes of the Pipeline 2 web service. They
//! are read-only snapshots: nothing here is cached or mutated after decoding.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Liveness report returned by the `alive` resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alive {
    /// Framework version string
    pub version: String,

    /// Whether the service accepts local filesystem paths
    #[serde(default)]
    pub local_mode: bool,

    /// Whether the service requires signed requests
    #[serde(default)]
    pub authentication: bool,
}

/// Entry of the script listing (no slot declarations)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptSummary {
    pub id: String,
    #[serde(default)]
    pub href: String,
    #[serde(default)]
    pub nicename: String,
    #[serde(default)]
    pub description: String,
}

/// A declared input or option position of a script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub name: String,
    #[serde(default)]
    pub nicename: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
    /// Declared cardinality: `true` when the slot accepts several values
    #[serde(default)]
    pub sequence: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
}

impl Slot {
    /// Single-valued slot with no descriptive text
    pub fn single(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nicename: String::new(),
            description: String::new(),
            required: false,
            sequence: false,
            media_type: None,
        }
    }

    /// Multi-valued slot with no descriptive text
    pub fn sequence(name: impl Into<String>) -> Self {
        Self {
            sequence: true,
            ..Self::single(name)
        }
    }
}

/// Full script descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    pub id: String,
    #[serde(default)]
    pub href: String,
    #[serde(default)]
    pub nicename: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub homepage: String,
    #[serde(default)]
    pub inputs: Vec<Slot>,
    #[serde(default)]
    pub options: Vec<Slot>,
}

impl Script {
    /// Look up a declared input slot
    pub fn input(&self, name: &str) -> Option<&Slot> {
        self.inputs.iter().find(|s| s.name == name)
    }

    /// Look up a declared option slot
    pub fn option(&self, name: &str) -> Option<&Slot> {
        self.options.iter().find(|s| s.name == name)
    }

    /// Reference used by job requests: the href when known, the id otherwise
    pub fn reference(&self) -> ScriptRef {
        let href = if self.href.is_empty() {
            self.id.clone()
        } else {
            self.href.clone()
        };
        ScriptRef { href }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptRef {
    pub href: String,
}

/// One value of a wire input or multi-valued option
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub value: String,
}

impl Item {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireInput {
    pub name: String,
    pub items: Vec<Item>,
}

/// Value carried by a wire option
///
/// Serialized flattened into the option, so the wire shape is either
/// `{"name": .., "value": ..}` or `{"name": .., "items": [..]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptionValue {
    #[serde(rename = "value")]
    Scalar(String),
    #[serde(rename = "items")]
    Items(Vec<Item>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireOption {
    pub name: String,
    #[serde(flatten)]
    pub value: OptionValue,
}

impl WireOption {
    pub fn scalar(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: OptionValue::Scalar(value.into()),
        }
    }

    pub fn items<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            value: OptionValue::Items(values.into_iter().map(Item::new).collect()),
        }
    }

    /// The scalar value, `None` for item-list options
    pub fn scalar_value(&self) -> Option<&str> {
        match &self.value {
            OptionValue::Scalar(v) => Some(v),
            OptionValue::Items(_) => None,
        }
    }

    /// The item list, empty for scalar options
    pub fn item_list(&self) -> &[Item] {
        match &self.value {
            OptionValue::Scalar(_) => &[],
            OptionValue::Items(items) => items,
        }
    }
}

/// Job submission in the service's wire shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    pub script: ScriptRef,
    #[serde(default)]
    pub nicename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub inputs: Vec<WireInput>,
    #[serde(default)]
    pub options: Vec<WireOption>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            other => Err(format!("unknown priority '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Idle,
    Running,
    Done,
    Error,
}

impl JobStatus {
    /// No further transition happens from a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Idle => "IDLE",
            JobStatus::Running => "RUNNING",
            JobStatus::Done => "DONE",
            JobStatus::Error => "ERROR",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageLevel {
    Error,
    #[serde(alias = "WARN")]
    Warning,
    Info,
    Debug,
    Trace,
}

impl MessageLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageLevel::Error => "ERROR",
            MessageLevel::Warning => "WARNING",
            MessageLevel::Info => "INFO",
            MessageLevel::Debug => "DEBUG",
            MessageLevel::Trace => "TRACE",
        }
    }
}

impl fmt::Display for MessageLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress message of a job; `sequence` is scoped to the job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub sequence: u64,
    pub level: MessageLevel,
    #[serde(default)]
    pub content: String,
}

impl Message {
    pub fn new(sequence: u64, level: MessageLevel, content: impl Into<String>) -> Self {
        Self {
            sequence,
            level,
            content: content.into(),
        }
    }
}

/// Snapshot of a job as reported by the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    #[serde(default)]
    pub href: String,
    #[serde(default)]
    pub nicename: String,
    pub status: JobStatus,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Job {
    /// Bare job snapshot with no messages
    pub fn new(id: impl Into<String>, status: JobStatus) -> Self {
        Self {
            id: id.into(),
            href: String::new(),
            nicename: String::new(),
            status,
            priority: Priority::default(),
            messages: Vec::new(),
        }
    }

    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }
}

/// One row of the execution queue
///
/// `computed_priority` is the service's own display priority and is carried
/// through as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: String,
    pub computed_priority: f64,
    pub job_priority: Priority,
    pub client_priority: Priority,
    pub relative_time: f64,
    /// Epoch milliseconds
    pub timestamp: i64,
}

impl QueueEntry {
    /// Absolute enqueue time, `None` when the timestamp is out of range
    pub fn since(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }
}
