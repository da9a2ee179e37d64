//! Reading and writing the data files that back entity types.

use crate::error::{FlatDbError, Result};
use crate::schema::{FieldDefinition, TypeDefinition};
use crate::util;
use crate::value::{Map, Value};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json_path::JsonPath;
use std::path::{Path, PathBuf};

const DISCRIMINATOR_KEYS: [&str; 2] = ["type", "Type"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Yaml,
    Json,
}

impl FileFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => FileFormat::Json,
            _ => FileFormat::Yaml,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// The whole document is one record.
    Single(Map),
    /// Records listed under `items`, or every match of a selector.
    Items(Vec<Map>),
}

/// A parsed data file, held only for the duration of one operation.
#[derive(Debug, Clone)]
pub struct DataFile {
    pub path: PathBuf,
    pub type_name: String,
    /// Whether the document carried a `type` discriminator.
    pub declares_type: bool,
    pub format: FileFormat,
    pub payload: Payload,
    pub selector: Option<String>,
    pub read_only: bool,
}

impl DataFile {
    pub fn read(path: &Path, definition: &TypeDefinition, selector: Option<&str>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(path, &text, definition, selector)
    }

    pub fn parse(
        path: &Path,
        text: &str,
        definition: &TypeDefinition,
        selector: Option<&str>,
    ) -> Result<Self> {
        let format = FileFormat::from_path(path);
        let document = if text.trim().is_empty() {
            Value::Null
        } else {
            let decoded = match format {
                FileFormat::Yaml => Value::from_yaml(text),
                FileFormat::Json => Value::from_json(text),
            };
            decoded.map_err(|e| {
                FlatDbError::data(path.display(), format!("malformed document: {e}"))
            })?
        };

        let mut file = DataFile {
            path: path.to_path_buf(),
            type_name: definition.name.clone(),
            declares_type: false,
            format,
            payload: Payload::Items(Vec::new()),
            selector: selector.map(String::from),
            read_only: selector.is_some(),
        };

        match selector {
            Some(selector) => file.payload = file.select(&document, selector, definition)?,
            None => file.payload = file.split(document, definition)?,
        }
        Ok(file)
    }

    /// An empty multi-object file that does not exist on disk yet.
    pub fn new_multi(path: PathBuf, definition: &TypeDefinition) -> Self {
        DataFile {
            format: FileFormat::from_path(&path),
            path,
            type_name: definition.name.clone(),
            declares_type: true,
            payload: Payload::Items(Vec::new()),
            selector: None,
            read_only: false,
        }
    }

    pub fn new_single(path: PathBuf, definition: &TypeDefinition, record: Map) -> Self {
        DataFile {
            format: FileFormat::from_path(&path),
            path,
            type_name: definition.name.clone(),
            declares_type: false,
            payload: Payload::Single(record),
            selector: None,
            read_only: false,
        }
    }

    pub fn records(&self) -> &[Map] {
        match &self.payload {
            Payload::Single(record) => std::slice::from_ref(record),
            Payload::Items(items) => items,
        }
    }

    pub fn is_multi(&self) -> bool {
        matches!(self.payload, Payload::Items(_))
    }

    /// Append a record; an empty single-object document becomes a multi-object one.
    pub fn push(&mut self, record: Map) -> Result<()> {
        if let Payload::Single(existing) = &self.payload {
            if !existing.is_empty() {
                return Err(FlatDbError::data(
                    self.path.display(),
                    "is a single-object file; cannot append records",
                ));
            }
            self.payload = Payload::Items(Vec::new());
            self.declares_type = true;
        }
        if let Payload::Items(items) = &mut self.payload {
            items.push(record);
        }
        Ok(())
    }

    pub fn replace(&mut self, index: Option<usize>, record: Map) {
        match (&mut self.payload, index) {
            (Payload::Items(items), Some(i)) if i < items.len() => items[i] = record,
            (payload, _) => *payload = Payload::Single(record),
        }
    }

    pub fn remove(&mut self, index: usize) {
        if let Payload::Items(items) = &mut self.payload {
            if index < items.len() {
                items.remove(index);
            }
        }
    }

    /// Serialize with schema field order first, then remaining keys sorted.
    pub fn render(&self, fields: &[FieldDefinition]) -> Result<String> {
        let document = FileDocument { file: self, fields };
        match self.format {
            FileFormat::Yaml => Ok(serde_yaml::to_string(&document)?),
            FileFormat::Json => {
                let mut text = serde_json::to_string_pretty(&document)?;
                text.push('\n');
                Ok(text)
            }
        }
    }

    pub fn write(&self, fields: &[FieldDefinition]) -> Result<()> {
        if self.read_only {
            return Err(FlatDbError::data(
                self.path.display(),
                "is sourced via selector and cannot be written",
            ));
        }
        let text = self.render(fields)?;
        log::debug!("writing {} ({} records)", self.path.display(), self.records().len());
        util::write_atomic(&self.path, text.as_bytes())
    }

    fn split(&mut self, document: Value, definition: &TypeDefinition) -> Result<Payload> {
        let mut root = match document {
            Value::Null => Map::new(),
            Value::Mapping(map) => map,
            other => {
                return Err(FlatDbError::data(
                    self.path.display(),
                    format!("expected a mapping at the document root, found {}", other.kind_name()),
                ));
            }
        };

        let had_items = root.contains_key("items");
        self.declares_type = self.take_discriminator(&mut root, definition, had_items)?;

        if !had_items {
            return Ok(Payload::Single(root));
        }
        match root.remove("items") {
            Some(Value::Sequence(items)) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| match item {
                    Value::Mapping(map) => Ok(map),
                    other => Err(FlatDbError::data(
                        self.path.display(),
                        format!("items[{i}] must be an object, found {}", other.kind_name()),
                    )),
                })
                .collect::<Result<Vec<_>>>()
                .map(Payload::Items),
            Some(Value::Null) => Ok(Payload::Items(Vec::new())),
            _ => Err(FlatDbError::data(self.path.display(), "items must be an array")),
        }
    }

    fn select(&self, document: &Value, selector: &str, definition: &TypeDefinition) -> Result<Payload> {
        let path = JsonPath::parse(selector).map_err(|e| {
            FlatDbError::data(self.path.display(), format!("invalid selector {selector:?}: {e}"))
        })?;
        let json = document.to_json();
        let matches = path.query(&json).all();
        if matches.is_empty() {
            return Err(FlatDbError::data(
                self.path.display(),
                format!("selector {selector:?} matched no values"),
            ));
        }

        let mut records = Vec::with_capacity(matches.len());
        for (i, node) in matches.into_iter().enumerate() {
            match Value::from(node.clone()) {
                Value::Mapping(mut map) => {
                    self.take_discriminator(&mut map, definition, false)?;
                    records.push(map);
                }
                other => {
                    return Err(FlatDbError::data(
                        self.path.display(),
                        format!("selector match {i} must be an object, found {}", other.kind_name()),
                    ));
                }
            }
        }
        Ok(Payload::Items(records))
    }

    /// Remove `type`/`Type` keys that are not declared fields, checking their value.
    fn take_discriminator(
        &self,
        map: &mut Map,
        definition: &TypeDefinition,
        multi: bool,
    ) -> Result<bool> {
        let mut declared = false;
        for key in DISCRIMINATOR_KEYS {
            if definition.field(key).is_some() && !multi {
                continue;
            }
            match map.remove(key) {
                None | Some(Value::Null) => {}
                Some(Value::String(name)) if name.trim() == definition.name => declared = true,
                Some(Value::String(name)) if name.trim().is_empty() => {}
                Some(other) => {
                    return Err(FlatDbError::data(
                        self.path.display(),
                        format!("declared type {other} does not match expected type {}", definition.name),
                    ));
                }
            }
        }
        Ok(declared)
    }
}

/// Remove discriminator keys from a caller-supplied record.
pub(crate) fn strip_discriminator(definition: &TypeDefinition, record: &mut Map) {
    for key in DISCRIMINATOR_KEYS {
        if definition.field(key).is_none() {
            record.remove(key);
        }
    }
}

struct FileDocument<'a> {
    file: &'a DataFile,
    fields: &'a [FieldDefinition],
}

impl Serialize for FileDocument<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let format = self.file.format;
        match &self.file.payload {
            Payload::Single(record) => {
                let type_name = self.file.declares_type.then_some(self.file.type_name.as_str());
                Ordered::new(record, self.fields, format)
                    .with_type(type_name)
                    .serialize(serializer)
            }
            Payload::Items(items) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", &self.file.type_name)?;
                let records: Vec<Ordered<'_>> = items
                    .iter()
                    .map(|r| Ordered::new(r, self.fields, format))
                    .collect();
                map.serialize_entry("items", &records)?;
                map.end()
            }
        }
    }
}

struct Ordered<'a> {
    record: &'a Map,
    fields: &'a [FieldDefinition],
    format: FileFormat,
    type_name: Option<&'a str>,
}

impl<'a> Ordered<'a> {
    fn new(record: &'a Map, fields: &'a [FieldDefinition], format: FileFormat) -> Self {
        Ordered {
            record,
            fields,
            format,
            type_name: None,
        }
    }

    fn with_type(mut self, type_name: Option<&'a str>) -> Self {
        self.type_name = type_name;
        self
    }
}

impl Serialize for Ordered<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let len = self.record.len() + usize::from(self.type_name.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        if let Some(type_name) = self.type_name {
            map.serialize_entry("type", type_name)?;
        }
        for field in self.fields {
            if let Some(value) = self.record.get(&field.name) {
                let nested = Nested {
                    value,
                    field,
                    format: self.format,
                };
                map.serialize_entry(&field.name, &nested)?;
            }
        }
        for (key, value) in self.record {
            if !self.fields.iter().any(|f| &f.name == key) {
                map.serialize_entry(key, &Written::new(value, self.format))?;
            }
        }
        map.end()
    }
}

struct Nested<'a> {
    value: &'a Value,
    field: &'a FieldDefinition,
    format: FileFormat,
}

impl Serialize for Nested<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let properties = &self.field.properties;
        match self.value {
            Value::Mapping(record) if !properties.is_empty() => {
                Ordered::new(record, properties, self.format).serialize(serializer)
            }
            Value::Sequence(items) if !properties.is_empty() => serializer.collect_seq(
                items.iter().map(|value| Nested {
                    value,
                    field: self.field,
                    format: self.format,
                }),
            ),
            other => Written::new(other, self.format).serialize(serializer),
        }
    }
}

/// A value written to a file of a given format.
///
/// JSON keeps out-of-range numbers verbatim through `serde_json::Number`;
/// YAML falls back to `Value`'s own serialization.
struct Written<'a> {
    value: &'a Value,
    format: FileFormat,
}

impl<'a> Written<'a> {
    fn new(value: &'a Value, format: FileFormat) -> Self {
        Written { value, format }
    }
}

impl Serialize for Written<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match (self.value, self.format) {
            (Value::Number(text), FileFormat::Json) => match text.parse::<serde_json::Number>() {
                Ok(number) => number.serialize(serializer),
                Err(_) => self.value.serialize(serializer),
            },
            (Value::Sequence(items), _) => {
                serializer.collect_seq(items.iter().map(|v| Written::new(v, self.format)))
            }
            (Value::Mapping(map), _) => serializer
                .collect_map(map.iter().map(|(k, v)| (k, Written::new(v, self.format)))),
            (other, _) => other.serialize(serializer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldKind, IdentifierSpec, IncludeDirective};
    use pretty_assertions::assert_eq;

    fn post_type() -> TypeDefinition {
        let mut meta = FieldDefinition::new("meta", FieldKind::Object);
        meta.properties = vec![
            FieldDefinition::new("slug", FieldKind::String),
            FieldDefinition::new("views", FieldKind::Integer),
        ];
        TypeDefinition {
            name: "Post".into(),
            source: PathBuf::from("flatdb.yaml"),
            description: None,
            json_schema: None,
            identifier: IdentifierSpec {
                field: "id".into(),
                generated: false,
                pattern: None,
            },
            include: vec![IncludeDirective {
                path: "data/posts/*.yaml".into(),
                selector: None,
            }],
            fields: vec![
                FieldDefinition::new("id", FieldKind::String),
                FieldDefinition::new("title", FieldKind::String),
                meta,
            ],
            inline_records: Vec::new(),
        }
    }

    #[test]
    fn test_single_object_strips_discriminator() {
        let file = DataFile::parse(
            Path::new("post.yaml"),
            "type: Post\nid: a\ntitle: A\n",
            &post_type(),
            None,
        )
        .unwrap();
        assert!(file.declares_type);
        assert!(!file.is_multi());
        assert!(!file.records()[0].contains_key("type"));
    }

    #[test]
    fn test_discriminator_mismatch() {
        let err = DataFile::parse(Path::new("x.yaml"), "Type: User\nid: a\n", &post_type(), None)
            .unwrap_err();
        assert!(err.to_string().contains("does not match expected type Post"), "{err}");
    }

    #[test]
    fn test_items_must_be_array_of_objects() {
        let err = DataFile::parse(Path::new("x.yaml"), "items: nope\n", &post_type(), None)
            .unwrap_err();
        assert!(err.to_string().contains("items must be an array"), "{err}");

        let err = DataFile::parse(Path::new("x.yaml"), "items: [1]\n", &post_type(), None)
            .unwrap_err();
        assert!(err.to_string().contains("items[0] must be an object"), "{err}");
    }

    #[test]
    fn test_json_multi_object_file() {
        let file = DataFile::parse(
            Path::new("posts.json"),
            r#"{"type": "Post", "items": [{"id": "a"}, {"id": "b"}]}"#,
            &post_type(),
            None,
        )
        .unwrap();
        assert_eq!(file.format, FileFormat::Json);
        assert_eq!(file.records().len(), 2);
    }

    #[test]
    fn test_selector_records_are_read_only() {
        let file = DataFile::parse(
            Path::new("site.yaml"),
            "site:\n  posts:\n    - id: a\n    - id: b\n  other: 1\n",
            &post_type(),
            Some("$.site.posts[*]"),
        )
        .unwrap();
        assert!(file.read_only);
        assert_eq!(file.records().len(), 2);
        assert_eq!(file.records()[1].get("id"), Some(&Value::from("b")));
    }

    #[test]
    fn test_selector_matching_nothing() {
        let err = DataFile::parse(Path::new("s.yaml"), "a: 1\n", &post_type(), Some("$.missing"))
            .unwrap_err();
        assert!(err.to_string().contains("matched no values"), "{err}");
    }

    #[test]
    fn test_render_orders_by_schema() {
        let mut record = Map::new();
        record.insert("zeta".into(), Value::from("z"));
        record.insert("title".into(), Value::from("Alpha"));
        record.insert("id".into(), Value::from("post-a"));
        let mut meta = Map::new();
        meta.insert("views".into(), Value::Integer(3));
        meta.insert("slug".into(), Value::from("alpha"));
        record.insert("meta".into(), Value::Mapping(meta));

        let mut file = DataFile::new_multi(PathBuf::from("posts.yaml"), &post_type());
        file.push(record).unwrap();

        let expected = "type: Post\nitems:\n- id: post-a\n  title: Alpha\n  meta:\n    slug: alpha\n    views: 3\n  zeta: z\n";
        assert_eq!(file.render(&post_type().fields).unwrap(), expected);
    }

    #[test]
    fn test_render_json_single() {
        let mut record = Map::new();
        record.insert("title".into(), Value::from("A"));
        record.insert("id".into(), Value::from("a"));
        let file = DataFile::new_single(PathBuf::from("a.json"), &post_type(), record);

        let expected = "{\n  \"id\": \"a\",\n  \"title\": \"A\"\n}\n";
        assert_eq!(file.render(&post_type().fields).unwrap(), expected);
    }
}
