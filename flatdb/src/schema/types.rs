use crate::value::{Map, Value};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// The only schema version this crate understands.
pub const SUPPORTED_VERSION: i64 = 1;

/// Normalized schema: every entity type declared across the linked documents.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Schema {
    pub version: i64,
    pub types: BTreeMap<String, TypeDefinition>,
}

impl Schema {
    pub fn get_type(&self, name: &str) -> Option<&TypeDefinition> {
        self.types.get(name)
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// Schema documents that declared at least one type, sorted and deduplicated.
    pub fn sources(&self) -> Vec<PathBuf> {
        let mut sources: Vec<PathBuf> = self.types.values().map(|t| t.source.clone()).collect();
        sources.sort();
        sources.dedup();
        sources
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeDefinition {
    pub name: String,
    /// Schema document the type was declared in.
    pub source: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON-Schema document the fields were imported from, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_schema: Option<PathBuf>,
    pub identifier: IdentifierSpec,
    pub include: Vec<IncludeDirective>,
    /// Fields in declaration order.
    pub fields: Vec<FieldDefinition>,
    pub inline_records: Vec<Map>,
}

impl TypeDefinition {
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Definition of the identifier field; `None` when the identifier is implicit.
    pub fn identifier_field(&self) -> Option<&FieldDefinition> {
        self.field(&self.identifier.field)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentifierSpec {
    pub field: String,
    pub generated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<IdentifierPattern>,
}

/// Identifier pattern compiled at load; compares and serializes as its source.
#[derive(Debug, Clone)]
pub struct IdentifierPattern(regex::Regex);

impl IdentifierPattern {
    pub fn new(source: &str) -> std::result::Result<Self, regex::Error> {
        regex::Regex::new(source).map(IdentifierPattern)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.0.is_match(text)
    }
}

impl PartialEq for IdentifierPattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Serialize for IdentifierPattern {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct IncludeDirective {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
}

impl IncludeDirective {
    pub fn has_wildcard(&self) -> bool {
        self.path.contains(['*', '?', '['])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    pub required: bool,
    pub repeated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(rename = "enum", skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Nested properties, only for `object` fields.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<FieldDefinition>,
    pub unique: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        FieldDefinition {
            name: name.into(),
            kind,
            required: false,
            repeated: false,
            format: None,
            enum_values: Vec::new(),
            default: None,
            properties: Vec::new(),
            unique: false,
            pattern: None,
            description: None,
        }
    }

    pub fn property(&self, name: &str) -> Option<&FieldDefinition> {
        self.properties.iter().find(|p| p.name == name)
    }
}

/// Kind of a field: a primitive, `enum`, `object`, or the name of another entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Integer,
    Number,
    Boolean,
    Enum,
    Object,
    Reference(String),
}

impl FieldKind {
    pub fn parse(s: &str) -> FieldKind {
        match s {
            "string" => FieldKind::String,
            "integer" => FieldKind::Integer,
            "number" => FieldKind::Number,
            "boolean" => FieldKind::Boolean,
            "enum" => FieldKind::Enum,
            "object" => FieldKind::Object,
            other => FieldKind::Reference(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            FieldKind::String => "string",
            FieldKind::Integer => "integer",
            FieldKind::Number => "number",
            FieldKind::Boolean => "boolean",
            FieldKind::Enum => "enum",
            FieldKind::Object => "object",
            FieldKind::Reference(target) => target,
        }
    }

    /// Target type name for reference kinds.
    pub fn reference_target(&self) -> Option<&str> {
        match self {
            FieldKind::Reference(target) => Some(target),
            _ => None,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for FieldKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Type names start with an uppercase ASCII letter.
pub fn is_valid_type_name(name: &str) -> bool {
    name.starts_with(|c: char| c.is_ascii_uppercase()) && is_valid_identifier(name)
}

/// Field and identifier names: non-empty, alphanumerics plus `-` and `_`.
pub fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
