//! Path resolution collaborators
//!
//! The compiler never touches the filesystem directly for module lookup or
//! directory listing; it goes through [`PathResolver`] and
//! [`DirectoryLister`] so both can be replaced in tests or embedders.

mod fs;

pub use fs::{FsDirectoryLister, FsPathResolver, DEFAULT_EXTENSIONS, DEFAULT_MODULE_DIRS};

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use crate::error::Result;

/// Options for a single resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Return `Ok(None)` instead of failing when nothing matches
    pub optional: bool,

    /// Resolve module directories down to their main file
    pub full_resolve: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            optional: false,
            full_resolve: true,
        }
    }
}

impl ResolveOptions {
    pub fn required() -> Self {
        Self::default()
    }

    pub fn optional() -> Self {
        Self {
            optional: true,
            ..Self::default()
        }
    }

    /// Stop at a module directory instead of resolving its main file.
    pub fn shallow(mut self) -> Self {
        self.full_resolve = false;
        self
    }
}

/// Resolves relative or module-style references to absolute paths.
///
/// A miss is an `UnresolvedPath` error unless the options are optional, in
/// which case it is `Ok(None)`.
pub trait PathResolver {
    fn resolve(&self, root: &Path, reference: &str, options: ResolveOptions)
        -> Result<Option<PathBuf>>;
}

/// Lists regular files of a directory.
///
/// A missing directory yields an empty list, never an error.
pub trait DirectoryLister {
    fn list_files(&self, dir: &Path) -> Vec<String>;
}

/// Whether `reference` is a path (`./x`, `../x`, `/x`) rather than a module name.
pub fn is_path_reference(reference: &str) -> bool {
    reference == "."
        || reference == ".."
        || reference.starts_with("./")
        || reference.starts_with("../")
        || Path::new(reference).is_absolute()
}

/// Lexically normalize `path`, dropping `.` and folding `..`.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Resolve `path` against `root` and normalize the result.
pub fn absolutize(root: &Path, path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if path.is_absolute() {
        normalize_path(path)
    } else {
        normalize_path(&root.join(path))
    }
}

/// `path` with `.ext` appended to its final component.
pub fn with_appended_extension(path: &Path, ext: &str) -> PathBuf {
    let mut raw: OsString = path.as_os_str().to_owned();
    raw.push(".");
    raw.push(ext);
    PathBuf::from(raw)
}

/// Find the sibling of `file` that shares its stem and has one of `extensions`.
///
/// `siblings` are the file names of `file`'s directory.
pub fn find_source_file(file: &Path, siblings: &[String], extensions: &[String]) -> Option<PathBuf> {
    let stem = file.file_stem()?.to_str()?;
    let dir = file.parent()?;

    extensions.iter().find_map(|ext| {
        let candidate = format!("{}.{}", stem, ext);
        siblings
            .iter()
            .any(|name| *name == candidate)
            .then(|| dir.join(candidate))
    })
}

/// `file` itself when it already names an existing script, otherwise the
/// sibling script sharing its stem.
pub fn fix_file_extension(file: &Path, siblings: &[String], extensions: &[String]) -> Option<PathBuf> {
    let name = file.file_name()?.to_str()?;
    let is_script = file
        .extension()
        .and_then(|e| e.to_str())
        .map_or(false, |ext| extensions.iter().any(|x| x == ext));

    if is_script && siblings.iter().any(|s| s == name) {
        return Some(file.to_path_buf());
    }
    find_source_file(file, siblings, extensions)
}
