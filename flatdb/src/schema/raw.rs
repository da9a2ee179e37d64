//! Serde shapes of schema documents as written on disk, before normalization.

use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RawDocument {
    #[serde(default)]
    pub version: Option<i64>,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub entities: BTreeMap<String, RawTypeSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawTypeSpec {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub identifier: Option<RawIdentifier>,
    #[serde(default)]
    pub include: Vec<RawInclude>,
    /// Kept as a mapping so declaration order survives.
    #[serde(default)]
    pub fields: Option<serde_yaml::Mapping>,
    #[serde(default)]
    pub json_schema: Option<String>,
    #[serde(default)]
    pub data: Vec<serde_yaml::Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawIdentifier {
    Field(String),
    Detailed {
        field: String,
        #[serde(default)]
        generated: bool,
        #[serde(default)]
        pattern: Option<String>,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawInclude {
    Path(String),
    Detailed {
        path: String,
        #[serde(default)]
        selector: Option<String>,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawField {
    Shorthand(String),
    Detailed(RawFieldSpec),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RawFieldSpec {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub repeated: bool,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(rename = "enum", default)]
    pub enum_values: Vec<String>,
    #[serde(default)]
    pub default: Option<serde_yaml::Value>,
    #[serde(default)]
    pub properties: Option<serde_yaml::Mapping>,
    #[serde(default)]
    pub unique: Option<bool>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}
