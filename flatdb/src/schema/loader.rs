use super::normalize;
use super::raw::{RawDocument, RawTypeSpec};
use super::types::Schema;
use crate::error::{FlatDbError, Result};
use crate::util;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Types gathered from one schema document and everything it includes.
#[derive(Debug, Clone, Default)]
pub(crate) struct Aggregate {
    pub version: Option<i64>,
    pub version_source: Option<PathBuf>,
    pub types: BTreeMap<String, SourcedType>,
}

#[derive(Debug, Clone)]
pub(crate) struct SourcedType {
    pub spec: RawTypeSpec,
    pub source: PathBuf,
}

/// Loads a schema entry document, following `include:` links.
///
/// Decoded documents and imported JSON-Schema files are cached per loader, so
/// a document reachable along several include paths is read once.
#[derive(Debug, Default)]
pub struct Loader {
    documents: HashMap<PathBuf, Aggregate>,
    json_schemas: HashMap<PathBuf, serde_json::Value>,
    stack: Vec<PathBuf>,
}

impl Loader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and normalize the schema rooted at `entry`.
    pub fn load(&mut self, entry: impl AsRef<Path>) -> Result<Schema> {
        let path = util::absolutize(entry.as_ref())?;
        let aggregate = self.load_document(&path)?;
        normalize::normalize(aggregate, self)
    }

    fn load_document(&mut self, path: &Path) -> Result<Aggregate> {
        if let Some(cached) = self.documents.get(path) {
            return Ok(cached.clone());
        }
        if self.stack.iter().any(|p| p == path) {
            return Err(FlatDbError::Schema(format!(
                "include cycle detected at {}",
                path.display()
            )));
        }

        log::debug!("loading schema document {}", path.display());
        let text = std::fs::read_to_string(path).map_err(|e| {
            FlatDbError::Schema(format!("read {}: {e}", path.display()))
        })?;
        let raw: RawDocument = if text.trim().is_empty() {
            RawDocument::default()
        } else {
            serde_yaml::from_str(&text).map_err(|e| {
                FlatDbError::Schema(format!("parse {}: {e}", path.display()))
            })?
        };

        self.stack.push(path.to_path_buf());
        let assembled = self.assemble(path, raw);
        self.stack.pop();

        let aggregate = assembled?;
        self.documents.insert(path.to_path_buf(), aggregate.clone());
        Ok(aggregate)
    }

    fn assemble(&mut self, path: &Path, raw: RawDocument) -> Result<Aggregate> {
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let mut aggregate = Aggregate {
            version: raw.version,
            version_source: raw.version.map(|_| path.to_path_buf()),
            types: BTreeMap::new(),
        };

        for pattern in &raw.include {
            let matches = util::expand_glob(&base.join(pattern))?;
            if matches.is_empty() {
                return Err(FlatDbError::Schema(format!(
                    "include {pattern:?} in {} matched no files",
                    path.display()
                )));
            }
            for included in matches {
                log::trace!("{} includes {}", path.display(), included.display());
                let child = self.load_document(&included)?;
                merge(&mut aggregate, child)?;
            }
        }

        for (name, spec) in raw.entities {
            let sourced = SourcedType {
                spec,
                source: path.to_path_buf(),
            };
            insert_type(&mut aggregate, name, sourced)?;
        }

        Ok(aggregate)
    }

    /// Parse a JSON-Schema document, reusing an earlier decode of the same file.
    pub(crate) fn json_schema(&mut self, path: &Path) -> Result<&serde_json::Value> {
        if !self.json_schemas.contains_key(path) {
            let text = std::fs::read_to_string(path).map_err(|e| {
                FlatDbError::Schema(format!("read json schema {}: {e}", path.display()))
            })?;
            let parsed: serde_json::Value = serde_json::from_str(&text).map_err(|e| {
                FlatDbError::Schema(format!("parse json schema {}: {e}", path.display()))
            })?;
            self.json_schemas.insert(path.to_path_buf(), parsed);
        }
        self.json_schemas
            .get(path)
            .ok_or_else(|| FlatDbError::Other(format!("json schema {} not cached", path.display())))
    }
}

/// Load and normalize a schema from its entry document.
pub fn load_schema(entry: impl AsRef<Path>) -> Result<Schema> {
    Loader::new().load(entry)
}

fn merge(into: &mut Aggregate, child: Aggregate) -> Result<()> {
    match (into.version, child.version) {
        (Some(a), Some(b)) if a != b => {
            return Err(FlatDbError::Schema(format!(
                "version mismatch: {} declares {a}, {} declares {b}",
                display_source(&into.version_source),
                display_source(&child.version_source),
            )));
        }
        (None, Some(_)) => {
            into.version = child.version;
            into.version_source = child.version_source;
        }
        _ => {}
    }

    for (name, sourced) in child.types {
        insert_type(into, name, sourced)?;
    }
    Ok(())
}

fn insert_type(into: &mut Aggregate, name: String, sourced: SourcedType) -> Result<()> {
    if let Some(existing) = into.types.get(&name) {
        // The same document reached along two include paths.
        if existing.source == sourced.source {
            return Ok(());
        }
        return Err(FlatDbError::Schema(format!(
            "type {name} declared in both {} and {}",
            existing.source.display(),
            sourced.source.display()
        )));
    }
    into.types.insert(name, sourced);
    Ok(())
}

fn display_source(source: &Option<PathBuf>) -> String {
    source
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "<unknown>".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, contents: &str) {
        let path = dir.join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_includes_are_merged() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "flatdb.yaml",
            "version: 1\ninclude:\n  - schema/*.yaml\n",
        );
        write(
            tmp.path(),
            "schema/user.yaml",
            "entities:\n  User:\n    identifier: id\n    include: [data/users/*.yaml]\n    fields:\n      id: string\n",
        );
        write(
            tmp.path(),
            "schema/tag.yaml",
            "entities:\n  Tag:\n    identifier: id\n    include: [data/tags/*.yaml]\n    fields:\n      id: string\n",
        );

        let schema = load_schema(tmp.path().join("flatdb.yaml")).unwrap();
        assert_eq!(schema.type_names().collect::<Vec<_>>(), vec!["Tag", "User"]);
        assert!(schema.types["User"].source.ends_with("schema/user.yaml"));
        assert_eq!(schema.sources().len(), 2);
    }

    #[test]
    fn test_include_cycle_is_an_error() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "flatdb.yaml", "version: 1\ninclude: [a.yaml]\n");
        write(tmp.path(), "a.yaml", "include: [b.yaml]\n");
        write(tmp.path(), "b.yaml", "include: [a.yaml]\n");

        let err = load_schema(tmp.path().join("flatdb.yaml")).unwrap_err();
        assert!(err.to_string().contains("include cycle"), "{err}");
    }

    #[test]
    fn test_include_matching_nothing_is_an_error() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "flatdb.yaml", "version: 1\ninclude: [missing/*.yaml]\n");

        let err = load_schema(tmp.path().join("flatdb.yaml")).unwrap_err();
        assert!(err.to_string().contains("matched no files"), "{err}");
    }

    #[test]
    fn test_duplicate_type_across_documents() {
        let tmp = TempDir::new().unwrap();
        let entity = "entities:\n  User:\n    identifier: id\n    include: [u/*.yaml]\n    fields:\n      id: string\n";
        write(tmp.path(), "flatdb.yaml", "version: 1\ninclude: [a.yaml, b.yaml]\n");
        write(tmp.path(), "a.yaml", entity);
        write(tmp.path(), "b.yaml", entity);

        let err = load_schema(tmp.path().join("flatdb.yaml")).unwrap_err();
        assert!(err.to_string().contains("declared in both"), "{err}");
    }

    #[test]
    fn test_shared_include_is_loaded_once() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "flatdb.yaml", "version: 1\ninclude: [a.yaml, b.yaml]\n");
        write(tmp.path(), "a.yaml", "include: [common.yaml]\n");
        write(tmp.path(), "b.yaml", "include: [common.yaml]\n");
        write(
            tmp.path(),
            "common.yaml",
            "entities:\n  User:\n    identifier: id\n    include: [u/*.yaml]\n    fields:\n      id: string\n",
        );

        let schema = load_schema(tmp.path().join("flatdb.yaml")).unwrap();
        assert!(schema.get_type("User").is_some());
    }

    #[test]
    fn test_version_mismatch() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "flatdb.yaml", "version: 1\ninclude: [a.yaml]\n");
        write(tmp.path(), "a.yaml", "version: 2\n");

        let err = load_schema(tmp.path().join("flatdb.yaml")).unwrap_err();
        assert!(err.to_string().contains("version mismatch"), "{err}");
    }
}
