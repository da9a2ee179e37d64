//! Import of entity fields from a JSON-Schema document.

use super::types::{is_valid_identifier, FieldDefinition, FieldKind};
use crate::scalar;
use crate::value::Value;
use serde_json::{Map as JsonMap, Value as Json};
use std::collections::HashSet;

const MAX_REF_DEPTH: usize = 32;

/// Convert the root object schema of `document` into field definitions.
pub(crate) fn fields_from_document(document: &Json) -> Result<Vec<FieldDefinition>, String> {
    let converter = Converter { root: document };
    let mut expanding = vec!["#".to_string()];
    let root = converter.resolve(document, 0, &mut expanding)?;
    match schema_type(&root, "#")? {
        "object" => converter.object_properties(&root, "#", &mut expanding),
        other => Err(format!("root schema must be an object, found {other:?}")),
    }
}

struct Converter<'a> {
    root: &'a Json,
}

impl<'a> Converter<'a> {
    /// Inline a `$ref`, letting sibling keys at the ref site override the target.
    /// Every reference followed is appended to `followed`.
    fn resolve(
        &self,
        node: &Json,
        depth: usize,
        followed: &mut Vec<String>,
    ) -> Result<JsonMap<String, Json>, String> {
        let object = node
            .as_object()
            .ok_or_else(|| "schema node must be an object".to_string())?;
        let Some(reference) = object.get("$ref") else {
            return Ok(object.clone());
        };
        if depth >= MAX_REF_DEPTH {
            return Err(format!("$ref chain too deep at {reference}"));
        }
        let reference = reference
            .as_str()
            .ok_or_else(|| "$ref must be a string".to_string())?;

        followed.push(reference.to_string());
        let mut merged = self.resolve(self.pointer(reference)?, depth + 1, followed)?;
        for (key, value) in object {
            if key != "$ref" {
                merged.insert(key.clone(), value.clone());
            }
        }
        Ok(merged)
    }

    fn pointer(&self, reference: &str) -> Result<&'a Json, String> {
        let fragment = reference
            .strip_prefix('#')
            .ok_or_else(|| format!("external $ref {reference:?} is not supported"))?;
        if fragment.is_empty() {
            return Ok(self.root);
        }
        let tokens = fragment
            .strip_prefix('/')
            .ok_or_else(|| format!("$ref {reference:?} is not a JSON pointer"))?;

        let mut current = self.root;
        for token in tokens.split('/') {
            let token = token.replace("~1", "/").replace("~0", "~");
            let next = match current {
                Json::Object(map) => map.get(&token),
                Json::Array(items) => token.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            };
            current = next.ok_or_else(|| format!("$ref {reference:?} does not resolve"))?;
        }
        Ok(current)
    }

    fn object_properties(
        &self,
        schema: &JsonMap<String, Json>,
        ctx: &str,
        expanding: &mut Vec<String>,
    ) -> Result<Vec<FieldDefinition>, String> {
        let required = required_set(schema, ctx)?;
        let empty = JsonMap::new();
        let properties = match schema.get("properties") {
            None => &empty,
            Some(properties) => properties
                .as_object()
                .ok_or_else(|| format!("{ctx}: properties must be an object"))?,
        };
        if let Some(unknown) = required
            .iter()
            .copied()
            .filter(|name| !properties.contains_key(*name))
            .min()
        {
            return Err(format!("{ctx}: marks unknown property {unknown:?} as required"));
        }

        let mut names: Vec<&String> = properties.keys().collect();
        names.sort();

        let mut fields = Vec::with_capacity(names.len());
        for name in names {
            if !is_valid_identifier(name) {
                return Err(format!("{ctx}: invalid property name {name:?}"));
            }
            let field_ctx = format!("{ctx}/{name}");
            fields.push(self.build_field(
                name,
                &properties[name.as_str()],
                required.contains(name.as_str()),
                &field_ctx,
                expanding,
            )?);
        }
        Ok(fields)
    }

    /// Convert one property. References being expanded further up are
    /// tracked in `expanding`; meeting one again is a recursive schema.
    fn build_field(
        &self,
        name: &str,
        node: &Json,
        required: bool,
        ctx: &str,
        expanding: &mut Vec<String>,
    ) -> Result<FieldDefinition, String> {
        let mut followed = Vec::new();
        let schema = self
            .resolve(node, 0, &mut followed)
            .map_err(|e| format!("{ctx}: {e}"))?;
        if let Some(reference) = followed.iter().find(|r| expanding.contains(r)) {
            return Err(format!("{ctx}: recursive $ref {reference:?} is not supported"));
        }

        let mark = expanding.len();
        expanding.extend(followed);
        let field = self.convert_field(name, &schema, required, ctx, expanding);
        expanding.truncate(mark);
        field
    }

    fn convert_field(
        &self,
        name: &str,
        schema: &JsonMap<String, Json>,
        required: bool,
        ctx: &str,
        expanding: &mut Vec<String>,
    ) -> Result<FieldDefinition, String> {
        let mut field = FieldDefinition::new(name, FieldKind::String);
        field.required = required;
        field.description = string_key(schema, "description");
        field.format = string_key(schema, "format");
        field.pattern = string_key(schema, "pattern");
        field.default = schema.get("default").cloned().map(Value::from);

        if let Some(values) = self.one_of_constants(schema)? {
            field.kind = FieldKind::Enum;
            field.enum_values = values;
            return Ok(field);
        }
        if let Some(values) = enum_values(schema) {
            field.kind = FieldKind::Enum;
            field.enum_values = values;
            return Ok(field);
        }
        if let Some(target) = string_key(schema, "x-reference-type") {
            field.kind = FieldKind::Reference(target);
            return Ok(field);
        }

        match schema_type(schema, ctx)? {
            "string" => field.kind = FieldKind::String,
            "integer" => field.kind = FieldKind::Integer,
            "number" => field.kind = FieldKind::Number,
            "boolean" => field.kind = FieldKind::Boolean,
            "array" => {
                let items = schema
                    .get("items")
                    .ok_or_else(|| format!("{ctx}: array without items"))?;
                let item_ctx = format!("{ctx}[]");
                let mut item = self.build_field(name, items, required, &item_ctx, expanding)?;
                if item.repeated {
                    return Err(format!("{ctx}: nested arrays are not supported"));
                }
                item.repeated = true;
                item.default = field.default;
                item.description = field.description.or(item.description);
                return Ok(item);
            }
            "object" => {
                field.kind = FieldKind::Object;
                field.properties = self.object_properties(schema, ctx, expanding)?;
            }
            other => return Err(format!("{ctx}: unsupported type {other:?}")),
        }
        Ok(field)
    }

    /// A `oneOf` whose every branch is a single constant, or a bare `const`.
    fn one_of_constants(&self, schema: &JsonMap<String, Json>) -> Result<Option<Vec<String>>, String> {
        if let Some(constant) = schema.get("const") {
            return Ok(constant_string(constant).map(|c| vec![c]));
        }
        let Some(branches) = schema.get("oneOf").and_then(Json::as_array) else {
            return Ok(None);
        };
        let mut values = Vec::with_capacity(branches.len());
        for branch in branches {
            let branch = self.resolve(branch, 0, &mut Vec::new())?;
            let constant = match (branch.get("const"), branch.get("enum")) {
                (Some(c), _) => constant_string(c),
                (None, Some(Json::Array(single))) if single.len() == 1 => {
                    constant_string(&single[0])
                }
                _ => None,
            };
            match constant {
                Some(c) => values.push(c),
                None => return Ok(None),
            }
        }
        Ok((!values.is_empty()).then_some(values))
    }
}

fn schema_type<'s>(schema: &'s JsonMap<String, Json>, ctx: &str) -> Result<&'s str, String> {
    match schema.get("type") {
        Some(Json::String(t)) => Ok(t),
        Some(Json::Array(types)) => {
            let concrete: Vec<&str> = types
                .iter()
                .filter_map(Json::as_str)
                .filter(|t| *t != "null")
                .collect();
            match concrete.as_slice() {
                [single] => Ok(*single),
                _ => Err(format!("{ctx}: ambiguous type list {types:?}")),
            }
        }
        Some(other) => Err(format!("{ctx}: type must be a string, found {other}")),
        None if schema.contains_key("properties") => Ok("object"),
        None if schema.contains_key("items") => Ok("array"),
        None => Err(format!("{ctx}: missing type")),
    }
}

fn required_set<'s>(schema: &'s JsonMap<String, Json>, ctx: &str) -> Result<HashSet<&'s str>, String> {
    match schema.get("required") {
        None => Ok(HashSet::new()),
        Some(Json::Array(names)) => names
            .iter()
            .map(|n| {
                n.as_str()
                    .ok_or_else(|| format!("{ctx}: required entries must be strings"))
            })
            .collect(),
        Some(_) => Err(format!("{ctx}: required must be an array")),
    }
}

fn enum_values(schema: &JsonMap<String, Json>) -> Option<Vec<String>> {
    let values = schema.get("enum")?.as_array()?;
    Some(values.iter().filter_map(constant_string).collect())
}

fn constant_string(value: &Json) -> Option<String> {
    scalar::as_string(&Value::from(value.clone()))
}

fn string_key(schema: &JsonMap<String, Json>, key: &str) -> Option<String> {
    schema
        .get(key)
        .and_then(Json::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert(doc: &str) -> Result<Vec<FieldDefinition>, String> {
        let json: Json = serde_json::from_str(doc).unwrap();
        fields_from_document(&json)
    }

    #[test]
    fn test_primitives_sorted_with_required() {
        let fields = convert(
            r#"{
                "type": "object",
                "required": ["title"],
                "properties": {
                    "title": {"type": "string", "description": "Headline"},
                    "count": {"type": "integer"},
                    "score": {"type": ["number", "null"]},
                    "draft": {"type": "boolean", "default": false}
                }
            }"#,
        )
        .unwrap();

        let names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["count", "draft", "score", "title"]);
        assert_eq!(fields[0].kind, FieldKind::Integer);
        assert_eq!(fields[1].default, Some(Value::Bool(false)));
        assert_eq!(fields[2].kind, FieldKind::Number);
        assert!(fields[3].required);
        assert_eq!(fields[3].description.as_deref(), Some("Headline"));
    }

    #[test]
    fn test_ref_with_sibling_override() {
        let fields = convert(
            r##"{
                "type": "object",
                "$defs": {"slug": {"type": "string", "pattern": "^[a-z]+$", "description": "base"}},
                "properties": {
                    "slug": {"$ref": "#/$defs/slug", "description": "override"}
                }
            }"##,
        )
        .unwrap();
        assert_eq!(fields[0].pattern.as_deref(), Some("^[a-z]+$"));
        assert_eq!(fields[0].description.as_deref(), Some("override"));
    }

    #[test]
    fn test_pointer_escapes() {
        let fields = convert(
            r##"{
                "type": "object",
                "definitions": {"a/b": {"type": "integer"}, "c~d": {"type": "boolean"}},
                "properties": {
                    "x": {"$ref": "#/definitions/a~1b"},
                    "y": {"$ref": "#/definitions/c~0d"}
                }
            }"##,
        )
        .unwrap();
        assert_eq!(fields[0].kind, FieldKind::Integer);
        assert_eq!(fields[1].kind, FieldKind::Boolean);
    }

    #[test]
    fn test_external_ref_rejected() {
        let err = convert(
            r#"{"type": "object", "properties": {"x": {"$ref": "other.json#/a"}}}"#,
        )
        .unwrap_err();
        assert!(err.contains("external $ref"), "{err}");
    }

    #[test]
    fn test_enum_inference_priority() {
        let fields = convert(
            r#"{
                "type": "object",
                "properties": {
                    "status": {"oneOf": [{"const": "draft"}, {"const": "live"}]},
                    "size": {"type": "string", "enum": ["s", "m"]},
                    "level": {"const": 3}
                }
            }"#,
        )
        .unwrap();
        assert_eq!(fields[0].name, "level");
        assert_eq!(fields[0].enum_values, vec!["3"]);
        assert_eq!(fields[1].kind, FieldKind::Enum);
        assert_eq!(fields[1].enum_values, vec!["s", "m"]);
        assert_eq!(fields[2].enum_values, vec!["draft", "live"]);
    }

    #[test]
    fn test_reference_arrays_and_objects() {
        let fields = convert(
            r#"{
                "type": "object",
                "properties": {
                    "author": {"type": "string", "x-reference-type": "User"},
                    "tags": {"type": "array", "items": {"type": "string", "x-reference-type": "Tag"}},
                    "meta": {
                        "type": "object",
                        "required": ["slug"],
                        "properties": {"slug": {"type": "string"}, "views": {"type": "integer"}}
                    }
                }
            }"#,
        )
        .unwrap();
        assert_eq!(fields[0].kind, FieldKind::Reference("User".into()));

        assert_eq!(fields[1].name, "meta");
        assert_eq!(fields[1].kind, FieldKind::Object);
        assert!(fields[1].property("slug").unwrap().required);
        assert!(!fields[1].property("views").unwrap().required);

        assert_eq!(fields[2].kind, FieldKind::Reference("Tag".into()));
        assert!(fields[2].repeated);
    }

    #[test]
    fn test_recursive_ref_is_an_error() {
        let err = convert(
            r##"{
                "type": "object",
                "properties": {"id": {"type": "string"}, "child": {"$ref": "#"}}
            }"##,
        )
        .unwrap_err();
        assert!(err.contains("recursive $ref \"#\""), "{err}");

        let err = convert(
            r##"{
                "type": "object",
                "$defs": {
                    "node": {
                        "type": "object",
                        "properties": {"children": {"type": "array", "items": {"$ref": "#/$defs/node"}}}
                    }
                },
                "properties": {"tree": {"$ref": "#/$defs/node"}}
            }"##,
        )
        .unwrap_err();
        assert!(err.starts_with("#/tree/children[]: recursive $ref"), "{err}");
    }

    #[test]
    fn test_shared_ref_is_not_recursive() {
        let fields = convert(
            r##"{
                "type": "object",
                "$defs": {"name": {"type": "string"}},
                "properties": {
                    "first": {"$ref": "#/$defs/name"},
                    "pair": {"type": "object", "properties": {"left": {"$ref": "#/$defs/name"}}}
                }
            }"##,
        )
        .unwrap();
        assert_eq!(fields[0].kind, FieldKind::String);
        assert_eq!(fields[1].property("left").unwrap().kind, FieldKind::String);
    }

    #[test]
    fn test_required_must_name_declared_properties() {
        let err = convert(
            r#"{
                "type": "object",
                "required": ["id", "titel"],
                "properties": {"id": {"type": "string"}, "title": {"type": "string"}}
            }"#,
        )
        .unwrap_err();
        assert_eq!(err, "#: marks unknown property \"titel\" as required");

        let err = convert(
            r#"{
                "type": "object",
                "properties": {"meta": {"type": "object", "required": ["slug"]}}
            }"#,
        )
        .unwrap_err();
        assert!(err.starts_with("#/meta: marks unknown property"), "{err}");
    }

    #[test]
    fn test_missing_type_is_an_error() {
        let err = convert(r#"{"type": "object", "properties": {"x": {"description": "?"}}}"#)
            .unwrap_err();
        assert!(err.contains("missing type"), "{err}");
    }
}
