//! Boot script discovery
//!
//! Explicit boot scripts come first, followed by the scripts of every boot
//! directory and its environment subdirectory. A script listed twice keeps
//! its first position.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;
use crate::resolve::{absolutize, DirectoryLister, PathResolver, ResolveOptions};

/// Directory under the app root that is always scanned for boot scripts
pub const DEFAULT_BOOT_DIR: &str = "boot";

/// Script files directly inside `dir`, sorted by name.
pub fn find_scripts(dir: &Path, lister: &dyn DirectoryLister, extensions: &[String]) -> Vec<PathBuf> {
    lister
        .list_files(dir)
        .into_iter()
        .filter_map(|name| {
            let path = dir.join(&name);
            let known = path
                .extension()
                .and_then(|e| e.to_str())
                .map_or(false, |ext| extensions.iter().any(|x| x == ext));
            if known {
                Some(path)
            } else {
                debug!(file = %path.display(), "Skipping file with unknown extension");
                None
            }
        })
        .collect()
}

/// Resolve `reference` against `root`, keeping the plain absolute path when
/// nothing matches.
fn resolve_or_absolutize(
    root: &Path,
    reference: &str,
    options: ResolveOptions,
    resolver: &dyn PathResolver,
) -> Result<PathBuf> {
    Ok(match resolver.resolve(root, reference, options)? {
        Some(path) => path,
        None => {
            debug!(reference, "Unknown boot path, using it as given");
            absolutize(root, reference)
        }
    })
}

/// Collaborators and settings for boot script discovery
pub struct ScriptScan<'a> {
    pub resolver: &'a dyn PathResolver,
    pub lister: &'a dyn DirectoryLister,
    pub extensions: &'a [String],
}

impl ScriptScan<'_> {
    /// Collect the de-duplicated boot script list.
    pub fn collect(
        &self,
        root: &Path,
        env: &str,
        boot_dirs: &[String],
        boot_scripts: &[String],
    ) -> Result<Vec<PathBuf>> {
        let mut scripts = Vec::new();
        for script in boot_scripts {
            scripts.push(resolve_or_absolutize(root, script, ResolveOptions::optional(), self.resolver)?);
        }

        let mut dirs = Vec::with_capacity(boot_dirs.len() + 1);
        for dir in boot_dirs {
            dirs.push(resolve_or_absolutize(
                root,
                dir,
                ResolveOptions::optional().shallow(),
                self.resolver,
            )?);
        }
        dirs.push(absolutize(root, DEFAULT_BOOT_DIR));

        for dir in &dirs {
            scripts.extend(find_scripts(dir, self.lister, self.extensions));
            scripts.extend(find_scripts(&dir.join(env), self.lister, self.extensions));
        }

        let mut seen = HashSet::new();
        scripts.retain(|script| seen.insert(script.clone()));
        debug!(count = scripts.len(), "Collected boot scripts");
        Ok(scripts)
    }
}
