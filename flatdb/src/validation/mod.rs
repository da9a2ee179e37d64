mod field;
mod references;

use crate::error::{FlatDbError, Result};
use crate::scalar;
use crate::schema::{Schema, TypeDefinition};
use crate::store::{file::DataFile, match_files};
use crate::util;
use crate::value::{Map, Value};
use field::PatternCache;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Validation phases, always run in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Format,
    Schema,
    References,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Format, Phase::Schema, Phase::References];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Format => "format",
            Phase::Schema => "schema",
            Phase::References => "references",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = FlatDbError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "format" => Ok(Phase::Format),
            "schema" => Ok(Phase::Schema),
            "references" | "refs" => Ok(Phase::References),
            other => Err(FlatDbError::Other(format!("unknown validation phase {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidateOptions {
    /// Phases to report; empty means all.
    pub phases: Vec<Phase>,
    /// Keep only the first error of a failing phase.
    pub fail_fast: bool,
}

/// One finding of a validation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationError {
    pub phase: Phase,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Record location, e.g. `data/posts.yaml (item 2)`.
    pub file: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.phase, self.file, self.type_name)?;
        if let Some(id) = &self.id {
            write!(f, " {id}")?;
        }
        write!(f, ": {}", self.message)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors_in(&self, phase: Phase) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter().filter(move |e| e.phase == phase)
    }
}

/// A record gathered for validation, with its display location.
pub(crate) struct Record {
    pub type_name: String,
    pub location: String,
    pub data: Map,
    /// Set once the schema phase resolved a unique identifier.
    pub id: Option<String>,
}

/// Type name -> identifier -> location of the record that claimed it.
pub(crate) type IdentifierIndex = HashMap<String, HashMap<String, String>>;

/// Validate every record of the repository at `root`. Never touches files.
pub fn validate(
    root: impl AsRef<Path>,
    schema: &Schema,
    options: &ValidateOptions,
) -> Result<ValidationResult> {
    Validator::new(root, schema)?.run(options)
}

/// Runs validation passes; owns the compiled-pattern cache for its lifetime.
pub struct Validator<'a> {
    root: PathBuf,
    schema: &'a Schema,
    patterns: PatternCache,
}

impl<'a> Validator<'a> {
    pub fn new(root: impl AsRef<Path>, schema: &'a Schema) -> Result<Self> {
        let root = util::absolutize(root.as_ref())?;
        if !root.is_dir() {
            return Err(FlatDbError::Other(format!(
                "Repository directory does not exist: {}",
                root.display()
            )));
        }
        Ok(Validator {
            root,
            schema,
            patterns: PatternCache::default(),
        })
    }

    pub fn run(&mut self, options: &ValidateOptions) -> Result<ValidationResult> {
        let selected = |phase: Phase| {
            options.phases.is_empty()
                || options.phases.contains(&phase)
                || (phase == Phase::Schema && options.phases.contains(&Phase::References))
        };
        let limit = |errors: &mut Vec<ValidationError>| {
            if options.fail_fast {
                errors.truncate(1);
            }
        };
        let mut result = ValidationResult::default();

        let (mut records, mut format_errors) = self.collect();
        if !format_errors.is_empty() {
            limit(&mut format_errors);
            if selected(Phase::Format) {
                result.errors = format_errors;
            }
            return Ok(result);
        }

        let (mut schema_errors, index) = self.check_schema(&mut records);
        if !schema_errors.is_empty() {
            limit(&mut schema_errors);
            if selected(Phase::Schema) {
                result.errors = schema_errors;
            }
            return Ok(result);
        }

        if selected(Phase::References) {
            let mut reference_errors = references::check_references(self.schema, &records, &index);
            limit(&mut reference_errors);
            result.errors = reference_errors;
        }
        Ok(result)
    }

    fn collect(&self) -> (Vec<Record>, Vec<ValidationError>) {
        let mut records = Vec::new();
        let mut errors = Vec::new();

        for definition in self.schema.types.values() {
            let format_error = |file: String, message: String| ValidationError {
                phase: Phase::Format,
                type_name: definition.name.clone(),
                id: None,
                file,
                message,
            };

            let matched = match match_files(&self.root, definition) {
                Ok(matched) => matched,
                Err(e) => {
                    errors.push(format_error(definition.name.clone(), e.to_string()));
                    continue;
                }
            };

            for file in matched {
                let location = util::display_path(&self.root, &file.path);
                match DataFile::read(&file.path, definition, file.selector.as_deref()) {
                    Ok(data_file) => {
                        let multi = data_file.is_multi();
                        for (i, data) in data_file.records().iter().enumerate() {
                            records.push(Record {
                                type_name: definition.name.clone(),
                                location: if multi {
                                    format!("{location} (item {})", i + 1)
                                } else {
                                    location.clone()
                                },
                                data: data.clone(),
                                id: None,
                            });
                        }
                    }
                    Err(e) => errors.push(format_error(location, describe(&e))),
                }
            }

            let source = util::display_path(&self.root, &definition.source);
            for (i, data) in definition.inline_records.iter().enumerate() {
                records.push(Record {
                    type_name: definition.name.clone(),
                    location: format!("{source} (inline {})", i + 1),
                    data: data.clone(),
                    id: None,
                });
            }
        }

        (records, errors)
    }

    fn check_schema(&mut self, records: &mut [Record]) -> (Vec<ValidationError>, IdentifierIndex) {
        let mut errors = Vec::new();
        let mut index = IdentifierIndex::new();
        // (type, field) -> value key -> identifier of the first holder
        let mut unique_values: HashMap<(String, String), HashMap<String, String>> = HashMap::new();

        let schema = self.schema;
        for record in records.iter_mut() {
            let Some(definition) = schema.get_type(&record.type_name) else {
                continue;
            };
            let error = |id: Option<&str>, message: String| ValidationError {
                phase: Phase::Schema,
                type_name: record.type_name.clone(),
                id: id.map(String::from),
                file: record.location.clone(),
                message,
            };

            if record.data.is_empty() {
                errors.push(error(None, "object is empty".into()));
                continue;
            }

            let id_field = &definition.identifier.field;
            let Some(id) = record.data.get(id_field).and_then(scalar::as_string) else {
                errors.push(error(
                    None,
                    format!("identifier field {id_field:?} must be a non-empty string"),
                ));
                continue;
            };

            let ids = index.entry(definition.name.clone()).or_default();
            if let Some(previous) = ids.get(&id) {
                errors.push(error(
                    Some(&id),
                    format!("duplicate identifier; already defined in {previous}"),
                ));
                continue;
            }
            ids.insert(id.clone(), record.location.clone());

            if let Some(message) = self.check_identifier_pattern(definition, &id) {
                errors.push(error(Some(&id), message));
            }

            for field_def in &definition.fields {
                for message in field::check_field(
                    field_def,
                    record.data.get(&field_def.name),
                    &field_def.name,
                    &mut self.patterns,
                ) {
                    errors.push(error(Some(&id), message));
                }
            }

            for field_def in definition.fields.iter().filter(|f| f.unique) {
                let Some(value) = record.data.get(&field_def.name).filter(|v| !v.is_null()) else {
                    continue;
                };
                let holders = unique_values
                    .entry((definition.name.clone(), field_def.name.clone()))
                    .or_default();
                let key = unique_key(value);
                match holders.get(&key) {
                    Some(holder) => errors.push(error(
                        Some(&id),
                        format!("field {:?} must be unique; conflict with {holder}", field_def.name),
                    )),
                    None => {
                        holders.insert(key, id.clone());
                    }
                }
            }

            record.id = Some(id);
        }

        (errors, index)
    }

    fn check_identifier_pattern(&self, definition: &TypeDefinition, id: &str) -> Option<String> {
        let pattern = definition.identifier.pattern.as_ref()?;
        (!pattern.is_match(id))
            .then(|| format!("identifier {id:?} does not match pattern {:?}", pattern.as_str()))
    }
}

fn describe(err: &FlatDbError) -> String {
    match err {
        FlatDbError::Data { message, .. } => message.clone(),
        other => other.to_string(),
    }
}

fn unique_key(value: &Value) -> String {
    value.to_json().to_string()
}
