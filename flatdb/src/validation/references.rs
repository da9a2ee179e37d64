use super::{IdentifierIndex, Phase, Record, ValidationError};
use crate::scalar;
use crate::schema::{FieldDefinition, FieldKind, Schema};
use crate::value::Value;

struct Reference<'a> {
    path: String,
    target: &'a str,
    id: String,
}

/// Check every reference-kind value against the identifier index.
pub(crate) fn check_references(
    schema: &Schema,
    records: &[Record],
    index: &IdentifierIndex,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    for record in records {
        let Some(id) = &record.id else {
            continue;
        };
        let Some(definition) = schema.get_type(&record.type_name) else {
            continue;
        };

        let mut references = Vec::new();
        for field in &definition.fields {
            collect(field, record.data.get(&field.name), field.name.clone(), &mut references);
        }

        for reference in references {
            let exists = index
                .get(reference.target)
                .is_some_and(|ids| ids.contains_key(&reference.id));
            if !exists {
                errors.push(ValidationError {
                    phase: Phase::References,
                    type_name: record.type_name.clone(),
                    id: Some(id.clone()),
                    file: record.location.clone(),
                    message: format!(
                        "field {:?} references missing {} {:?}",
                        reference.path, reference.target, reference.id
                    ),
                });
            }
        }
    }
    errors
}

fn collect<'a>(
    field: &'a FieldDefinition,
    value: Option<&Value>,
    path: String,
    out: &mut Vec<Reference<'a>>,
) {
    match value {
        None | Some(Value::Null) => {}
        Some(Value::Sequence(items)) if field.repeated => {
            for item in items {
                collect_single(field, item, &path, out);
            }
        }
        Some(value) => collect_single(field, value, &path, out),
    }
}

fn collect_single<'a>(
    field: &'a FieldDefinition,
    value: &Value,
    path: &str,
    out: &mut Vec<Reference<'a>>,
) {
    match (&field.kind, value) {
        (FieldKind::Reference(target), value) => {
            if let Some(id) = scalar::as_string(value) {
                out.push(Reference {
                    path: path.to_string(),
                    target,
                    id,
                });
            }
        }
        (FieldKind::Object, Value::Mapping(map)) => {
            for property in &field.properties {
                collect(
                    property,
                    map.get(&property.name),
                    format!("{path}.{}", property.name),
                    out,
                );
            }
        }
        _ => {}
    }
}
