//! Filesystem-backed resolver and lister

use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use super::{
    absolutize, is_path_reference, with_appended_extension, DirectoryLister, PathResolver,
    ResolveOptions,
};
use crate::error::{CompileError, Result};

/// Default script extensions
pub const DEFAULT_EXTENSIONS: &[&str] = &["js"];

/// Default directories searched for module-style references
pub const DEFAULT_MODULE_DIRS: &[&str] = &["node_modules"];

/// Resolves references against the real filesystem.
///
/// Path references (`./x`, `../x`, `/x`) are resolved against the root only.
/// Module references are looked up in each module directory of the root and
/// its ancestors, then against the root itself. A candidate matches as an
/// exact file, as a file with one of the extensions appended, or as a
/// directory (its `index.<ext>` file when fully resolving).
#[derive(Debug, Clone)]
pub struct FsPathResolver {
    extensions: Vec<String>,
    module_dirs: Vec<String>,
}

impl Default for FsPathResolver {
    fn default() -> Self {
        Self::new(
            DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            DEFAULT_MODULE_DIRS.iter().map(|s| s.to_string()).collect(),
        )
    }
}

impl FsPathResolver {
    pub fn new(extensions: Vec<String>, module_dirs: Vec<String>) -> Self {
        Self {
            extensions,
            module_dirs,
        }
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    fn candidates(&self, root: &Path, reference: &str) -> Vec<PathBuf> {
        if is_path_reference(reference) {
            return vec![absolutize(root, reference)];
        }

        let mut candidates: Vec<PathBuf> = root
            .ancestors()
            .flat_map(|dir| {
                self.module_dirs
                    .iter()
                    .map(move |module_dir| dir.join(module_dir).join(reference))
            })
            .collect();
        candidates.push(absolutize(root, reference));
        candidates
    }

    fn try_candidate(&self, path: &Path, full_resolve: bool) -> Option<PathBuf> {
        if path.is_file() {
            return Some(path.to_path_buf());
        }

        if let Some(file) = self
            .extensions
            .iter()
            .map(|ext| with_appended_extension(path, ext))
            .find(|p| p.is_file())
        {
            return Some(file);
        }

        if !path.is_dir() {
            return None;
        }
        if !full_resolve {
            return Some(path.to_path_buf());
        }

        self.extensions
            .iter()
            .map(|ext| path.join(format!("index.{}", ext)))
            .find(|p| p.is_file())
    }
}

impl PathResolver for FsPathResolver {
    fn resolve(
        &self,
        root: &Path,
        reference: &str,
        options: ResolveOptions,
    ) -> Result<Option<PathBuf>> {
        let found = self
            .candidates(root, reference)
            .iter()
            .find_map(|candidate| self.try_candidate(candidate, options.full_resolve));

        match found {
            Some(path) => Ok(Some(path)),
            None if options.optional => {
                debug!(reference, root = %root.display(), "Optional path not found");
                Ok(None)
            }
            None => Err(CompileError::UnresolvedPath {
                reference: reference.to_string(),
                root: root.to_path_buf(),
            }),
        }
    }
}

/// Lists a directory with `walkdir`, one level deep, sorted by name.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsDirectoryLister;

impl DirectoryLister for FsDirectoryLister {
    fn list_files(&self, dir: &Path) -> Vec<String> {
        if !dir.is_dir() {
            return Vec::new();
        }

        WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect()
    }
}
