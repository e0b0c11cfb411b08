use thiserror::Error;
use uuid::Uuid;

/// Errors raised while loading documents, loading plugins, setting up or
/// evaluating pipelines.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Libloading error: {0}")]
    Libloading(#[from] libloading::Error),

    #[error("Document version {found} is newer than the supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
    #[error("Document error: {0}")]
    Document(String),
    #[error("Malformed GUID '{0}'")]
    MalformedGuid(String),
    #[error("Invalid configuration path '{0}'")]
    InvalidConfigurationPath(String),

    #[error("{owner} has no root node")]
    MissingRoot { owner: String },
    #[error("Root node {root} of {owner} does not exist")]
    RootNotFound { owner: String, root: Uuid },
    #[error("Circular reference detected at {0}")]
    CircularReference(Uuid),

    #[error("Node {node} uses unknown filter '{class_identifier}'")]
    UnknownFilter { node: Uuid, class_identifier: String },
    #[error("Node {node} has an invalid binding for '{member}': {reason}")]
    InvalidBinding {
        node: Uuid,
        member: String,
        reason: String,
    },
    #[error("Invalid value '{value}' for '{member}': {reason}")]
    InvalidValue {
        member: String,
        value: String,
        reason: String,
    },
    #[error("Template {template} parameter '{parameter}': {reason}")]
    ParameterMismatch {
        template: Uuid,
        parameter: String,
        reason: String,
    },
    #[error("Filter '{class_identifier}' failed on node {node}: {source}")]
    PluginFailure {
        node: Uuid,
        class_identifier: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("Evaluation cancelled")]
    Cancelled,

    #[error("Plugin error: {0}")]
    Plugin(String),
    #[error("Settings error: {0}")]
    Settings(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl BuildError {
    pub fn document(msg: impl Into<String>) -> Self {
        BuildError::Document(msg.into())
    }

    pub fn plugin(msg: impl Into<String>) -> Self {
        BuildError::Plugin(msg.into())
    }

    pub fn runtime(msg: impl Into<String>) -> Self {
        BuildError::Runtime(msg.into())
    }

    /// True for the cooperative cancellation signal.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, BuildError::Cancelled)
    }

    /// True when the error came out of a filter's compute operation.
    pub fn is_plugin_failure(&self) -> bool {
        matches!(self, BuildError::PluginFailure { .. })
    }
}
