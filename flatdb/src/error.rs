use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlatDbError {
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Unknown type: {0}")]
    UnknownType(String),

    #[error("Object not found: {type_name}/{id}")]
    NotFound { type_name: String, id: String },

    #[error("Object already exists: {type_name}/{id}")]
    AlreadyExists { type_name: String, id: String },

    #[error("{type_name} {id} is defined inline and cannot be modified")]
    InlineRecord { type_name: String, id: String },

    #[error("{type_name} {id} is sourced via selector include and cannot be modified")]
    SelectorRecord { type_name: String, id: String },

    #[error("Type {0} has no writable include directive")]
    ReadOnlyType(String),

    #[error("Path conflict: {path}")]
    PathConflict { path: String },

    #[error("Identifier error: {0}")]
    Identifier(String),

    #[error("Data error in {path}: {message}")]
    Data { path: String, message: String },

    #[error("Format error: {0}")]
    Format(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Glob pattern error: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("{0}")]
    Other(String),
}

impl FlatDbError {
    pub(crate) fn data(path: impl std::fmt::Display, message: impl Into<String>) -> Self {
        FlatDbError::Data {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FlatDbError>;
