//! File-backed relations with a transform log
//!
//! A [`FileEntryRelation`] pairs a data file with the relation that scans
//! it and remembers which transforms have been applied, both by the alias
//! the caller chose and by the identity of the transform itself. The same
//! alias can never be used twice; the same transform function is refused a
//! second time unless the caller explicitly asks to re-apply it.

use crate::database::Database;
use crate::loader::SourceType;
use crate::relation::Relation;
use crate::{Error, Result};
use std::any::TypeId;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One entry of the transform log
#[derive(Debug, Clone, PartialEq, Eq)]
struct AppliedTransform {
    alias: String,
    id: TypeId,
}

/// A data file, the relation scanning it and its transform history
#[derive(Debug, Clone)]
pub struct FileEntryRelation<'db> {
    path: PathBuf,
    source_type: SourceType,
    relation: Relation<'db>,
    log: Vec<AppliedTransform>,
    names: BTreeSet<String>,
}

impl<'db> FileEntryRelation<'db> {
    /// Scan a single file with default options for its format.
    ///
    /// # Errors
    /// - [`Error::InvalidPath`] if `path` is not an existing file
    /// - [`Error::MissingExtension`] / [`Error::UnsupportedExtension`] for
    ///   unknown formats
    /// - the engine error if the file cannot be read
    pub fn open<P: AsRef<Path>>(db: &'db Database, path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::InvalidPath(format!(
                "not a file: {}",
                path.display()
            )));
        }
        let source_type = SourceType::from_path(path)?;
        let relation = db.read_file(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            source_type,
            relation,
            log: Vec::new(),
            names: BTreeSet::new(),
        })
    }

    /// Open every supported file directly inside `dir`, ordered by file name.
    ///
    /// Subdirectories and files with other extensions are skipped.
    ///
    /// # Errors
    /// Returns [`Error::Io`] if the directory cannot be listed, otherwise
    /// the first error from [`FileEntryRelation::open`]
    pub fn from_dir<P: AsRef<Path>>(db: &'db Database, dir: P) -> Result<Vec<Self>> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir.as_ref())? {
            let entry = entry?;
            let path = entry.path();
            if !entry.file_type()?.is_file() {
                continue;
            }
            if SourceType::from_path(&path).is_ok() {
                paths.push(path);
            } else {
                debug!(path = %path.display(), "skipping unsupported file");
            }
        }
        paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        paths.iter().map(|p| Self::open(db, p)).collect()
    }

    /// Path of the underlying file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name without directories
    #[must_use]
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Format derived from the file extension
    #[must_use]
    pub const fn source_type(&self) -> SourceType {
        self.source_type
    }

    /// Current relation
    #[must_use]
    pub const fn relation(&self) -> &Relation<'db> {
        &self.relation
    }

    /// Drop the file metadata and keep the relation
    #[must_use]
    pub fn into_relation(self) -> Relation<'db> {
        self.relation
    }

    /// Aliases of the applied transforms
    #[must_use]
    pub const fn transform_names(&self) -> &BTreeSet<String> {
        &self.names
    }

    /// Aliases in the order the transforms were applied
    #[must_use]
    pub fn transform_log(&self) -> Vec<&str> {
        self.log.iter().map(|t| t.alias.as_str()).collect()
    }

    /// Replace the relation, keeping the file and the transform log.
    ///
    /// # Errors
    /// Propagates the error returned by `f`
    pub fn map_relation<F>(mut self, f: F) -> Result<Self>
    where
        F: FnOnce(Relation<'db>) -> Result<Relation<'db>>,
    {
        self.relation = f(self.relation)?;
        Ok(self)
    }

    /// Apply `transform` and record it under `alias`.
    ///
    /// Transforms are identified by type: a given `fn` item or closure
    /// counts as the same transform every time it is passed. Transforms
    /// must work for any database lifetime, so they cannot capture
    /// borrowed state.
    ///
    /// # Errors
    /// - [`Error::TransformAlreadyApplied`] if `alias` was used before, or if
    ///   this transform was applied before and `reapply` is false
    /// - whatever `transform` returns
    pub fn apply_transform<F>(self, transform: F, alias: &str, reapply: bool) -> Result<Self>
    where
        F: for<'a> Fn(FileEntryRelation<'a>) -> Result<FileEntryRelation<'a>> + 'static,
    {
        if self.names.contains(alias) {
            return Err(Error::TransformAlreadyApplied {
                name: alias.to_string(),
                hint: None,
            });
        }
        let id = TypeId::of::<F>();
        if !reapply && self.log.iter().any(|t| t.id == id) {
            return Err(Error::TransformAlreadyApplied {
                name: alias.to_string(),
                hint: Some(
                    "pass `reapply = true` if you intended to run this transform again"
                        .to_string(),
                ),
            });
        }

        let mut log = self.log.clone();
        let mut names = self.names.clone();
        let mut result = transform(self)?;
        log.push(AppliedTransform {
            alias: alias.to_string(),
            id,
        });
        names.insert(alias.to_string());
        result.log = log;
        result.names = names;
        Ok(result)
    }
}

impl std::fmt::Display for FileEntryRelation<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "FileEntryRelation({}, {}, transforms={:?})",
            self.file_name(),
            self.source_type,
            self.transform_log()
        )
    }
}
