use super::json_schema;
use super::loader::{Aggregate, Loader, SourcedType};
use super::raw::{RawField, RawFieldSpec, RawIdentifier, RawInclude};
use super::types::{
    is_valid_identifier, is_valid_type_name, FieldDefinition, FieldKind, IdentifierPattern,
    IdentifierSpec, IncludeDirective, Schema, TypeDefinition, SUPPORTED_VERSION,
};
use crate::error::{FlatDbError, Result};
use crate::value::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

/// Normalize every type, then check cross-type references once all names are known.
pub(crate) fn normalize(aggregate: Aggregate, loader: &mut Loader) -> Result<Schema> {
    let version = aggregate
        .version
        .ok_or_else(|| FlatDbError::Schema("version is required".into()))?;
    if version != SUPPORTED_VERSION {
        return Err(FlatDbError::Schema(format!(
            "unsupported version {version} (expected {SUPPORTED_VERSION})"
        )));
    }

    let mut types = BTreeMap::new();
    for (name, sourced) in aggregate.types {
        if !is_valid_type_name(&name) {
            return Err(FlatDbError::Schema(format!(
                "invalid type identifier {name:?} in {}",
                sourced.source.display()
            )));
        }
        let definition = normalize_type(&name, sourced, loader)?;
        types.insert(name, definition);
    }

    let schema = Schema { version, types };
    validate_references(&schema)?;
    Ok(schema)
}

fn type_error(name: &str, source: &Path, message: impl std::fmt::Display) -> FlatDbError {
    FlatDbError::Schema(format!("type {name} ({}): {message}", source.display()))
}

fn normalize_type(name: &str, sourced: SourcedType, loader: &mut Loader) -> Result<TypeDefinition> {
    let SourcedType { spec, source } = sourced;
    let fail = |message: String| type_error(name, &source, message);

    let identifier = normalize_identifier(spec.identifier).map_err(fail)?;
    let include = normalize_includes(spec.include).map_err(fail)?;
    let inline_records = normalize_inline(spec.data).map_err(fail)?;
    if include.is_empty() && inline_records.is_empty() {
        return Err(fail(
            "must declare at least one include directive or inline data record".into(),
        ));
    }

    let (fields, json_schema) = match (spec.fields, spec.json_schema) {
        (Some(_), Some(_)) => return Err(fail("declares both fields and json_schema".into())),
        (None, None) => return Err(fail("must declare fields or json_schema".into())),
        (Some(mapping), None) => (normalize_fields(&mapping, "fields").map_err(fail)?, None),
        (None, Some(relative)) => {
            let base = source.parent().unwrap_or_else(|| Path::new("."));
            let path = base.join(relative.trim());
            let document = loader.json_schema(&path)?;
            let fields = json_schema::fields_from_document(document)
                .map_err(|e| fail(format!("json schema {}: {e}", path.display())))?;
            (fields, Some(path))
        }
    };

    Ok(TypeDefinition {
        name: name.to_string(),
        source,
        description: spec.description.filter(|d| !d.trim().is_empty()),
        json_schema,
        identifier,
        include,
        fields,
        inline_records,
    })
}

fn normalize_identifier(raw: Option<RawIdentifier>) -> std::result::Result<IdentifierSpec, String> {
    let (field, generated, pattern) = match raw {
        None => return Err("missing identifier".into()),
        Some(RawIdentifier::Field(field)) => (field, false, None),
        Some(RawIdentifier::Detailed {
            field,
            generated,
            pattern,
        }) => (field, generated, pattern),
    };

    let field = field.trim().to_string();
    if !is_valid_identifier(&field) {
        return Err(format!("invalid identifier field {field:?}"));
    }
    let pattern = pattern
        .filter(|p| !p.is_empty())
        .map(|p| {
            IdentifierPattern::new(&p).map_err(|e| format!("invalid identifier pattern {p:?}: {e}"))
        })
        .transpose()?;

    Ok(IdentifierSpec {
        field,
        generated,
        pattern,
    })
}

fn normalize_includes(raw: Vec<RawInclude>) -> std::result::Result<Vec<IncludeDirective>, String> {
    let mut directives: Vec<IncludeDirective> = Vec::with_capacity(raw.len());
    for entry in raw {
        let (path, selector) = match entry {
            RawInclude::Path(path) => (path, None),
            RawInclude::Detailed { path, selector } => (path, selector),
        };
        let path = path.trim().to_string();
        if path.is_empty() {
            return Err("include path must not be empty".into());
        }
        let directive = IncludeDirective {
            path,
            selector: selector
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        };
        if !directives.contains(&directive) {
            directives.push(directive);
        }
    }
    Ok(directives)
}

fn normalize_inline(data: Vec<serde_yaml::Value>) -> std::result::Result<Vec<Map>, String> {
    data.into_iter()
        .enumerate()
        .map(|(i, record)| match Value::from(record) {
            Value::Mapping(map) => Ok(map),
            other => Err(format!(
                "data[{i}] must be a mapping, found {}",
                other.kind_name()
            )),
        })
        .collect()
}

fn normalize_fields(
    mapping: &serde_yaml::Mapping,
    ctx: &str,
) -> std::result::Result<Vec<FieldDefinition>, String> {
    let mut fields = Vec::with_capacity(mapping.len());
    for (key, value) in mapping {
        let name = key
            .as_str()
            .ok_or_else(|| format!("{ctx}: field names must be strings"))?;
        if !is_valid_identifier(name) {
            return Err(format!("{ctx}: invalid field identifier {name:?}"));
        }
        let path = format!("{ctx}.{name}");
        let raw: RawField =
            serde_yaml::from_value(value.clone()).map_err(|e| format!("{path}: {e}"))?;
        fields.push(normalize_field(name, raw, &path)?);
    }
    Ok(fields)
}

fn normalize_field(
    name: &str,
    raw: RawField,
    path: &str,
) -> std::result::Result<FieldDefinition, String> {
    let spec = match raw {
        RawField::Shorthand(kind) => RawFieldSpec {
            kind: Some(kind),
            ..RawFieldSpec::default()
        },
        RawField::Detailed(spec) => spec,
    };

    let kind = spec
        .kind
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(FieldKind::parse)
        .ok_or_else(|| format!("{path}: missing type"))?;

    let unique = spec.unique.unwrap_or(false);
    if spec.repeated && unique {
        return Err(format!("{path}: cannot declare unique=true on a repeated field"));
    }

    let properties = match &spec.properties {
        Some(_) if kind != FieldKind::Object => {
            return Err(format!("{path}: properties are only allowed on object fields"));
        }
        Some(props) => normalize_fields(props, path)?,
        None => Vec::new(),
    };

    Ok(FieldDefinition {
        name: name.to_string(),
        kind,
        required: spec.required,
        repeated: spec.repeated,
        format: spec.format.filter(|f| !f.is_empty()),
        enum_values: spec.enum_values,
        default: spec.default.map(Value::from),
        properties,
        unique,
        pattern: spec.pattern.filter(|p| !p.is_empty()),
        description: spec.description,
    })
}

fn validate_references(schema: &Schema) -> Result<()> {
    for definition in schema.types.values() {
        check_field_references(schema, definition, &definition.fields, "")?;
    }
    Ok(())
}

fn check_field_references(
    schema: &Schema,
    definition: &TypeDefinition,
    fields: &[FieldDefinition],
    prefix: &str,
) -> Result<()> {
    for field in fields {
        let path = if prefix.is_empty() {
            field.name.clone()
        } else {
            format!("{prefix}.{}", field.name)
        };
        if let Some(target) = field.kind.reference_target() {
            if !is_valid_type_name(target) {
                return Err(type_error(
                    &definition.name,
                    &definition.source,
                    format!("field {path} references invalid type name {target:?}"),
                ));
            }
            if schema.get_type(target).is_none() {
                return Err(type_error(
                    &definition.name,
                    &definition.source,
                    format!("field {path} references unknown type {target}"),
                ));
            }
        }
        check_field_references(schema, definition, &field.properties, &path)?;
    }
    Ok(())
}
