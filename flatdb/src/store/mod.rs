pub mod file;
pub(crate) mod identifier;

use crate::error::{FlatDbError, Result};
use crate::schema::{load_schema, IncludeDirective, Schema, TypeDefinition};
use crate::util;
use crate::value::{Map, Value};
use file::DataFile;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};

/// Conventional name of the entry schema document at the repository root.
pub const SCHEMA_FILE: &str = "flatdb.yaml";

/// A record as seen by callers. Built fresh on every query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Object {
    #[serde(rename = "type")]
    pub type_name: String,
    pub id: String,
    pub fields: Map,
    /// Backing data file; `None` for records defined inline in the schema.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    pub read_only: bool,
}

impl Object {
    pub fn is_inline(&self) -> bool {
        self.file.is_none()
    }
}

/// A data file matched by one of a type's include directives.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct MatchedFile {
    pub path: PathBuf,
    pub selector: Option<String>,
}

/// Expand every include directive of `definition` under `root`.
///
/// Matches are deduplicated per (path, selector) and sorted, so iteration
/// order never depends on the filesystem.
pub(crate) fn match_files(root: &Path, definition: &TypeDefinition) -> Result<Vec<MatchedFile>> {
    let mut matched = BTreeSet::new();
    for directive in &definition.include {
        for path in util::expand_glob(&root.join(&directive.path))? {
            matched.insert(MatchedFile {
                path,
                selector: directive.selector.clone(),
            });
        }
    }
    Ok(matched.into_iter().collect())
}

/// Entry point for reading and mutating the objects of a repository.
pub struct Store {
    root: PathBuf,
    schema: Schema,
}

impl Store {
    /// Open the repository at `root`, loading `flatdb.yaml` from it.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(FlatDbError::Other(format!(
                "Repository directory does not exist: {}",
                root.display()
            )));
        }
        let schema_path = root.join(SCHEMA_FILE);
        if !schema_path.exists() {
            return Err(FlatDbError::Schema(format!(
                "{SCHEMA_FILE} not found in {}",
                root.display()
            )));
        }
        let schema = load_schema(&schema_path)?;
        Self::new(root, schema)
    }

    pub fn new(root: impl AsRef<Path>, schema: Schema) -> Result<Self> {
        Ok(Store {
            root: util::absolutize(root.as_ref())?,
            schema,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Get a handle to the objects of one type.
    pub fn collection(&self, type_name: &str) -> Result<Collection<'_>> {
        let definition = self
            .schema
            .get_type(type_name)
            .ok_or_else(|| FlatDbError::UnknownType(type_name.to_string()))?;
        Ok(Collection {
            store: self,
            definition,
        })
    }

    pub fn list(&self, type_name: &str) -> Result<Vec<String>> {
        self.collection(type_name)?.list()
    }

    pub fn get(&self, type_name: &str, id: &str) -> Result<Object> {
        self.collection(type_name)?.get(id)
    }

    pub fn load_all(&self, type_name: &str) -> Result<Vec<Object>> {
        self.collection(type_name)?.load_all()
    }

    pub fn create(&self, type_name: &str, fields: Map) -> Result<Object> {
        self.collection(type_name)?.create(fields)
    }

    pub fn update(&self, type_name: &str, id: &str, fields: Map, merge: bool) -> Result<Object> {
        self.collection(type_name)?.update(id, fields, merge)
    }

    pub fn delete(&self, type_name: &str, id: &str) -> Result<()> {
        self.collection(type_name)?.delete(id)
    }

    /// Every data file matched by any type, mapped to the type that claims it.
    pub fn data_files(&self) -> Result<BTreeMap<PathBuf, String>> {
        let mut files = BTreeMap::new();
        for definition in self.schema.types.values() {
            for matched in match_files(&self.root, definition)? {
                if let Some(existing) = files.get(&matched.path) {
                    if existing != &definition.name {
                        log::warn!(
                            "{} is included by both {existing} and {}",
                            matched.path.display(),
                            definition.name
                        );
                    }
                    continue;
                }
                files.insert(matched.path, definition.name.clone());
            }
        }
        Ok(files)
    }
}

/// Where a located record lives, and therefore whether it may be mutated.
enum Origin {
    /// A writable data file; `index` is set for multi-object files.
    File { file: DataFile, index: Option<usize> },
    Selector,
    Inline,
}

struct Located {
    object: Object,
    origin: Origin,
}

enum CreateTarget {
    Single(PathBuf),
    Multi(PathBuf),
}

/// A handle to the objects of one entity type.
pub struct Collection<'a> {
    store: &'a Store,
    definition: &'a TypeDefinition,
}

impl<'a> Collection<'a> {
    pub fn definition(&self) -> &TypeDefinition {
        self.definition
    }

    /// Identifiers of every object, in ascending order.
    pub fn list(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self.load_all()?.into_iter().map(|o| o.id).collect();
        ids.sort();
        Ok(ids)
    }

    /// Every object of the type. Inline records shadowed by a file record are skipped.
    pub fn load_all(&self) -> Result<Vec<Object>> {
        let mut objects = Vec::new();
        let mut seen = HashSet::new();

        for matched in match_files(&self.store.root, self.definition)? {
            let file = DataFile::read(&matched.path, self.definition, matched.selector.as_deref())?;
            for record in file.records() {
                let object = self.build_object(record, Some(&file.path), file.read_only)?;
                seen.insert(object.id.clone());
                objects.push(object);
            }
        }

        for record in &self.definition.inline_records {
            let object = self.build_object(record, None, false)?;
            if seen.insert(object.id.clone()) {
                objects.push(object);
            }
        }

        Ok(objects)
    }

    pub fn get(&self, id: &str) -> Result<Object> {
        if id.trim().is_empty() {
            return Err(FlatDbError::Identifier("identifier must not be empty".into()));
        }
        self.find(id)?
            .map(|located| located.object)
            .ok_or_else(|| self.not_found(id))
    }

    /// Create a new object; fails if the identifier is already in use.
    pub fn create(&self, fields: Map) -> Result<Object> {
        let definition = self.definition;
        let id_field = &definition.identifier.field;

        let mut record = fields;
        file::strip_discriminator(definition, &mut record);

        if record.get(id_field).map_or(true, Value::is_null) && definition.identifier.generated {
            let generated = ulid::Ulid::new().to_string().to_lowercase();
            record.insert(id_field.clone(), Value::String(generated));
        }

        let id = identifier::lookup_key(definition, &record)?;
        identifier::check_pattern(definition, &id)?;

        if self.find(&id)?.is_some() {
            return Err(FlatDbError::AlreadyExists {
                type_name: definition.name.clone(),
                id,
            });
        }

        let stored = identifier::coerce(definition, &id, &record[id_field])?;
        record.insert(id_field.clone(), stored);
        identifier::normalize_integers(&definition.fields, &mut record);

        let path = match self.create_target(&id)? {
            CreateTarget::Single(path) => {
                if path.exists() {
                    return Err(FlatDbError::PathConflict {
                        path: util::display_path(&self.store.root, &path),
                    });
                }
                let file = DataFile::new_single(path, definition, record.clone());
                file.write(&definition.fields)?;
                file.path
            }
            CreateTarget::Multi(path) => {
                let mut file = if path.exists() {
                    DataFile::read(&path, definition, None)?
                } else {
                    DataFile::new_multi(path, definition)
                };
                file.push(record.clone())?;
                file.write(&definition.fields)?;
                file.path
            }
        };

        log::debug!("created {} {id} in {}", definition.name, path.display());
        Ok(Object {
            type_name: definition.name.clone(),
            id,
            fields: record,
            file: Some(path),
            read_only: false,
        })
    }

    /// Replace (`merge = false`) or deep-merge (`merge = true`) an object's fields.
    pub fn update(&self, id: &str, fields: Map, merge: bool) -> Result<Object> {
        let definition = self.definition;
        let located = self.find(id)?.ok_or_else(|| self.not_found(id))?;
        let (mut file, index) = self.writable(located.origin, id)?;

        let mut record = if merge {
            let mut base = located.object.fields;
            merge_maps(&mut base, fields);
            base
        } else {
            fields
        };
        file::strip_discriminator(definition, &mut record);

        let id_field = &definition.identifier.field;
        let stored = identifier::coerce(definition, id, &Value::String(id.to_string()))?;
        record.insert(id_field.clone(), stored);
        identifier::normalize_integers(&definition.fields, &mut record);

        file.replace(index, record.clone());
        file.write(&definition.fields)?;
        log::debug!("updated {} {id} in {}", definition.name, file.path.display());

        Ok(Object {
            type_name: definition.name.clone(),
            id: id.to_string(),
            fields: record,
            file: Some(file.path),
            read_only: false,
        })
    }

    /// Remove an object; a data file left without records is deleted.
    pub fn delete(&self, id: &str) -> Result<()> {
        let located = self.find(id)?.ok_or_else(|| self.not_found(id))?;
        let (mut file, index) = self.writable(located.origin, id)?;

        match index {
            Some(i) => {
                file.remove(i);
                if file.records().is_empty() {
                    std::fs::remove_file(&file.path)?;
                } else {
                    file.write(&self.definition.fields)?;
                }
            }
            None => std::fs::remove_file(&file.path)?,
        }
        log::debug!("deleted {} {id} from {}", self.definition.name, file.path.display());
        Ok(())
    }

    fn build_object(&self, record: &Map, file: Option<&Path>, read_only: bool) -> Result<Object> {
        let id = identifier::lookup_key(self.definition, record).map_err(|e| match file {
            Some(path) => FlatDbError::data(path.display(), e.to_string()),
            None => e,
        })?;
        let mut fields = record.clone();
        identifier::normalize_integers(&self.definition.fields, &mut fields);
        Ok(Object {
            type_name: self.definition.name.clone(),
            id,
            fields,
            file: file.map(Path::to_path_buf),
            read_only,
        })
    }

    /// Locate a record by identifier. File records win over inline records.
    fn find(&self, id: &str) -> Result<Option<Located>> {
        for matched in match_files(&self.store.root, self.definition)? {
            let file = DataFile::read(&matched.path, self.definition, matched.selector.as_deref())?;
            // Records without a usable identifier cannot match; skip them.
            let position = file
                .records()
                .iter()
                .position(|record| matches_id(self.definition, record, id));
            let Some(i) = position else {
                continue;
            };

            let object = self.build_object(&file.records()[i], Some(&file.path), file.read_only)?;
            let origin = if file.read_only {
                Origin::Selector
            } else {
                let index = file.is_multi().then_some(i);
                Origin::File { file, index }
            };
            return Ok(Some(Located { object, origin }));
        }

        for record in &self.definition.inline_records {
            if matches_id(self.definition, record, id) {
                return Ok(Some(Located {
                    object: self.build_object(record, None, false)?,
                    origin: Origin::Inline,
                }));
            }
        }
        Ok(None)
    }

    fn writable(&self, origin: Origin, id: &str) -> Result<(DataFile, Option<usize>)> {
        match origin {
            Origin::File { file, index } => Ok((file, index)),
            Origin::Selector => Err(FlatDbError::SelectorRecord {
                type_name: self.definition.name.clone(),
                id: id.to_string(),
            }),
            Origin::Inline => Err(FlatDbError::InlineRecord {
                type_name: self.definition.name.clone(),
                id: id.to_string(),
            }),
        }
    }

    /// Pick the file a new object goes to.
    ///
    /// The first selector-free directive with a wildcard yields a new
    /// single-object file named after the identifier; otherwise the first
    /// selector-free directive is used as a multi-object file.
    fn create_target(&self, id: &str) -> Result<CreateTarget> {
        let writable: Vec<&IncludeDirective> = self
            .definition
            .include
            .iter()
            .filter(|d| d.selector.is_none())
            .collect();

        if let Some(directive) = writable.iter().find(|d| d.has_wildcard()) {
            let relative = substitute_wildcards(&directive.path, &sanitize_id(id));
            return Ok(CreateTarget::Single(self.store.root.join(relative)));
        }
        match writable.first() {
            Some(directive) => Ok(CreateTarget::Multi(self.store.root.join(&directive.path))),
            None => Err(FlatDbError::ReadOnlyType(self.definition.name.clone())),
        }
    }

    fn not_found(&self, id: &str) -> FlatDbError {
        FlatDbError::NotFound {
            type_name: self.definition.name.clone(),
            id: id.to_string(),
        }
    }
}

/// Recursively merge `incoming` into `base`; non-map values overwrite.
fn merge_maps(base: &mut Map, incoming: Map) {
    for (key, value) in incoming {
        match value {
            Value::Mapping(nested) => match base.get_mut(&key) {
                Some(Value::Mapping(existing)) => merge_maps(existing, nested),
                _ => {
                    base.insert(key, Value::Mapping(nested));
                }
            },
            other => {
                base.insert(key, other);
            }
        }
    }
}

/// Filesystem-safe form of an identifier.
fn sanitize_id(id: &str) -> String {
    let slug = slug::slugify(id);
    if slug.is_empty() {
        "object".to_string()
    } else {
        slug
    }
}

/// Replace each run of glob wildcards in `pattern` with `name`.
fn substitute_wildcards(pattern: &str, name: &str) -> String {
    let pattern = pattern.replace("**/", "");
    let mut out = String::with_capacity(pattern.len() + name.len());
    let mut chars = pattern.chars();
    let mut in_wildcard = false;
    while let Some(c) = chars.next() {
        match c {
            '*' | '?' | '[' => {
                if c == '[' {
                    for skipped in chars.by_ref() {
                        if skipped == ']' {
                            break;
                        }
                    }
                }
                if !in_wildcard {
                    out.push_str(name);
                    in_wildcard = true;
                }
            }
            other => {
                out.push(other);
                in_wildcard = false;
            }
        }
    }
    out
}

fn matches_id(definition: &TypeDefinition, record: &Map, id: &str) -> bool {
    identifier::lookup_key(definition, record).is_ok_and(|key| key == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const SCHEMA: &str = r#"
version: 1
entities:
  User:
    identifier: id
    include:
      - data/users/*.yaml
    fields:
      id: string
      name: string
  Post:
    identifier: id
    include:
      - data/posts.yaml
    fields:
      id: string
      title: string
      author: User
      age: integer
      meta:
        type: object
        properties:
          slug: string
          views: integer
  Tag:
    identifier: id
    include:
      - data/tags/*.yaml
    fields:
      id: string
      label: string
  Status:
    identifier: code
    include:
      - data/statuses.yaml
    fields:
      code: string
      label: string
    data:
      - { code: open, label: Open }
      - { code: closed, label: Closed }
  Site:
    identifier: id
    include:
      - path: data/site.yaml
        selector: "$.pages[*]"
    fields:
      id: string
  Counter:
    identifier: { field: n, generated: false }
    include:
      - data/counters.json
    fields:
      n: integer
  Event:
    identifier: { field: id, generated: true }
    include:
      - data/events/*.yaml
    fields:
      id: string
      name: string
"#;

    fn setup_test_store() -> (TempDir, Store) {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(SCHEMA_FILE), SCHEMA).unwrap();
        std::fs::create_dir_all(tmp.path().join("data/users")).unwrap();
        std::fs::write(
            tmp.path().join("data/users/alice.yaml"),
            "id: User-Alice\nname: Alice\n",
        )
        .unwrap();
        std::fs::write(
            tmp.path().join("data/site.yaml"),
            "title: Site\npages:\n  - id: home\n  - id: about\n",
        )
        .unwrap();
        let store = Store::open(tmp.path()).unwrap();
        (tmp, store)
    }

    fn record(yaml: &str) -> Map {
        match Value::from_yaml(yaml).unwrap() {
            Value::Mapping(map) => map,
            other => panic!("expected mapping, got {other:?}"),
        }
    }

    #[test]
    fn test_open_store() {
        let (_tmp, store) = setup_test_store();
        assert_eq!(store.schema().types.len(), 7);
        assert!(matches!(
            store.collection("Nope"),
            Err(FlatDbError::UnknownType(_))
        ));
    }

    #[test]
    fn test_get_from_single_object_file() {
        let (_tmp, store) = setup_test_store();
        let user = store.get("User", "User-Alice").unwrap();
        assert_eq!(user.fields["name"], Value::from("Alice"));
        assert!(user.file.unwrap().ends_with("data/users/alice.yaml"));
        assert!(!user.read_only);

        assert!(matches!(
            store.get("User", "User-Bob"),
            Err(FlatDbError::NotFound { .. })
        ));
    }

    #[test]
    fn test_lookup_skips_records_without_identifier() {
        let (tmp, store) = setup_test_store();
        std::fs::write(tmp.path().join("data/users/aaron.yaml"), "name: Aaron\n").unwrap();

        let user = store.get("User", "User-Alice").unwrap();
        assert_eq!(user.fields["name"], Value::from("Alice"));
        let updated = store
            .update("User", "User-Alice", record("name: Alicia\n"), true)
            .unwrap();
        assert_eq!(updated.fields["name"], Value::from("Alicia"));
        assert!(matches!(
            store.get("User", "User-Bob"),
            Err(FlatDbError::NotFound { .. })
        ));
        store.delete("User", "User-Alice").unwrap();
    }

    #[test]
    fn test_create_uses_sanitized_wildcard_target() {
        let (tmp, store) = setup_test_store();
        let created = store
            .create("Tag", record("id: Tag-New\nlabel: New\n"))
            .unwrap();
        let expected_path = tmp.path().join("data/tags/tag-new.yaml");
        assert!(expected_path.exists());
        assert_eq!(
            std::fs::read_to_string(&expected_path).unwrap(),
            "id: Tag-New\nlabel: New\n"
        );

        let fetched = store.get("Tag", "Tag-New").unwrap();
        assert_eq!(fetched.fields, created.fields);
    }

    #[test]
    fn test_create_appends_to_multi_object_file() {
        let (tmp, store) = setup_test_store();
        store
            .create("Post", record("id: post-b\ntitle: Beta\nauthor: User-Alice\n"))
            .unwrap();
        store
            .create("Post", record("id: post-a\ntitle: Alpha\nauthor: User-Alice\n"))
            .unwrap();

        let text = std::fs::read_to_string(tmp.path().join("data/posts.yaml")).unwrap();
        assert_eq!(
            text,
            "type: Post\nitems:\n- id: post-b\n  title: Beta\n  author: User-Alice\n- id: post-a\n  title: Alpha\n  author: User-Alice\n"
        );
        assert_eq!(store.list("Post").unwrap(), vec!["post-a", "post-b"]);
    }

    #[test]
    fn test_duplicate_create_leaves_files_untouched() {
        let (tmp, store) = setup_test_store();
        store.create("Post", record("id: post-a\ntitle: Alpha\n")).unwrap();
        let before = std::fs::read_to_string(tmp.path().join("data/posts.yaml")).unwrap();

        let err = store
            .create("Post", record("id: post-a\ntitle: Again\n"))
            .unwrap_err();
        assert!(matches!(err, FlatDbError::AlreadyExists { .. }));

        let after = std::fs::read_to_string(tmp.path().join("data/posts.yaml")).unwrap();
        assert_eq!(before, after);

        let err = store
            .create("User", record("id: User-Alice\nname: Other\n"))
            .unwrap_err();
        assert!(matches!(err, FlatDbError::AlreadyExists { .. }));
    }

    #[test]
    fn test_update_replace_and_merge() {
        let (_tmp, store) = setup_test_store();
        store
            .create(
                "Post",
                record("id: post-a\ntitle: Alpha\nmeta:\n  slug: alpha\n  views: 1\n"),
            )
            .unwrap();

        let merged = store
            .update("Post", "post-a", record("meta:\n  views: 2\n"), true)
            .unwrap();
        assert_eq!(merged.fields["title"], Value::from("Alpha"));
        assert_eq!(
            merged.fields["meta"],
            Value::Mapping(record("slug: alpha\nviews: 2\n"))
        );

        let again = store
            .update("Post", "post-a", record("meta:\n  views: 2\n"), true)
            .unwrap();
        assert_eq!(again.fields, merged.fields);
        assert_eq!(store.get("Post", "post-a").unwrap().fields, merged.fields);

        let replaced = store
            .update("Post", "post-a", record("type: Post\ntitle: Only\n"), false)
            .unwrap();
        assert_eq!(replaced.fields, record("id: post-a\ntitle: Only\n"));
    }

    #[test]
    fn test_integer_fields_are_normalized() {
        let (_tmp, store) = setup_test_store();
        let created = store
            .create("Post", record("id: post-a\nage: 3.0\n"))
            .unwrap();
        assert_eq!(created.fields["age"], Value::Integer(3));
        assert_eq!(
            store.get("Post", "post-a").unwrap().fields["age"],
            Value::Integer(3)
        );
    }

    #[test]
    fn test_integer_identifier_is_coerced() {
        let (tmp, store) = setup_test_store();
        store.create("Counter", record("n: 2\n")).unwrap();
        let updated = store.update("Counter", "2", Map::new(), true).unwrap();
        assert_eq!(updated.fields["n"], Value::Integer(2));

        let text = std::fs::read_to_string(tmp.path().join("data/counters.json")).unwrap();
        assert_eq!(text, "{\n  \"type\": \"Counter\",\n  \"items\": [\n    {\n      \"n\": 2\n    }\n  ]\n}\n");
    }

    #[test]
    fn test_update_keeps_wide_numbers_in_other_records() {
        let (tmp, store) = setup_test_store();
        let path = tmp.path().join("data/counters.json");
        std::fs::write(
            &path,
            r#"{"type": "Counter", "items": [{"n": 1, "serial": 123456789012345678901234567890}, {"n": 2}]}"#,
        )
        .unwrap();

        store.update("Counter", "2", record("label: y\n"), true).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            r#"{
  "type": "Counter",
  "items": [
    {
      "n": 1,
      "serial": 123456789012345678901234567890
    },
    {
      "n": 2,
      "label": "y"
    }
  ]
}
"#
        );
    }

    #[test]
    fn test_delete_removes_records_and_empty_files() {
        let (tmp, store) = setup_test_store();
        store.create("Post", record("id: post-a\n")).unwrap();
        store.create("Post", record("id: post-b\n")).unwrap();

        store.delete("Post", "post-a").unwrap();
        assert_eq!(store.list("Post").unwrap(), vec!["post-b"]);

        store.delete("Post", "post-b").unwrap();
        assert!(!tmp.path().join("data/posts.yaml").exists());

        store.delete("User", "User-Alice").unwrap();
        assert!(!tmp.path().join("data/users/alice.yaml").exists());
        assert!(matches!(
            store.delete("User", "User-Alice"),
            Err(FlatDbError::NotFound { .. })
        ));
    }

    #[test]
    fn test_selector_records_are_read_only() {
        let (_tmp, store) = setup_test_store();
        assert_eq!(store.list("Site").unwrap(), vec!["about", "home"]);
        let home = store.get("Site", "home").unwrap();
        assert!(home.read_only);

        assert!(matches!(
            store.update("Site", "home", Map::new(), true),
            Err(FlatDbError::SelectorRecord { .. })
        ));
        assert!(matches!(
            store.delete("Site", "home"),
            Err(FlatDbError::SelectorRecord { .. })
        ));
        assert!(matches!(
            store.create("Site", record("id: contact\n")),
            Err(FlatDbError::ReadOnlyType(_))
        ));
    }

    #[test]
    fn test_inline_records() {
        let (tmp, store) = setup_test_store();
        assert_eq!(store.list("Status").unwrap(), vec!["closed", "open"]);
        let open = store.get("Status", "open").unwrap();
        assert!(open.is_inline());

        assert!(matches!(
            store.update("Status", "open", Map::new(), true),
            Err(FlatDbError::InlineRecord { .. })
        ));
        assert!(matches!(
            store.delete("Status", "closed"),
            Err(FlatDbError::InlineRecord { .. })
        ));

        // A file record with the same identifier shadows the inline one.
        std::fs::write(
            tmp.path().join("data/statuses.yaml"),
            "items:\n  - code: open\n    label: Opened\n",
        )
        .unwrap();
        let open = store.get("Status", "open").unwrap();
        assert_eq!(open.fields["label"], Value::from("Opened"));
        assert_eq!(store.list("Status").unwrap(), vec!["closed", "open"]);
    }

    #[test]
    fn test_generated_identifier() {
        let (_tmp, store) = setup_test_store();
        let event = store.create("Event", record("name: launch\n")).unwrap();
        assert_eq!(event.id.len(), 26);
        assert_eq!(event.id, event.id.to_lowercase());
        assert_eq!(store.get("Event", &event.id).unwrap().fields["name"], Value::from("launch"));
    }

    #[test]
    fn test_list_is_sorted_regardless_of_files() {
        let (tmp, store) = setup_test_store();
        for name in ["zed", "amy", "Bob"] {
            std::fs::write(
                tmp.path().join(format!("data/users/{name}.yaml")),
                format!("id: {name}\n"),
            )
            .unwrap();
        }
        assert_eq!(
            store.list("User").unwrap(),
            vec!["Bob", "User-Alice", "amy", "zed"]
        );
    }

    #[test]
    fn test_data_files() {
        let (tmp, store) = setup_test_store();
        let files = store.data_files().unwrap();
        assert_eq!(
            files.get(&tmp.path().join("data/site.yaml")).map(String::as_str),
            Some("Site")
        );
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn test_substitute_wildcards() {
        assert_eq!(substitute_wildcards("data/tags/*.yaml", "x"), "data/tags/x.yaml");
        assert_eq!(substitute_wildcards("data/**/*.yaml", "x"), "data/x.yaml");
        assert_eq!(substitute_wildcards("data/[ab]*-?.json", "x"), "data/x-x.json");
        assert_eq!(sanitize_id("Tag New!"), "tag-new");
        assert_eq!(sanitize_id("!!!"), "object");
    }
}
