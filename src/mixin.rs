//! Mixin instructions
//!
//! Scripts found in the configured mixin directories are always included.
//! Scripts found in the mixin source directories are included only when a
//! built model lists them in its `mixins` definition.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::Result;
use crate::fragment::FragmentLoader;
use crate::model::{classify_name, ModelInstruction};
use crate::resolve::{DirectoryLister, PathResolver, ResolveOptions};

/// One mixin to register
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MixinInstruction {
    pub name: String,

    pub source_file: PathBuf,

    /// Extra metadata from the mixin's sibling `.json` file
    #[serde(flatten)]
    pub meta: Map<String, Value>,
}

/// List script files in each of `dirs`, in directory order.
///
/// Directories that do not resolve are skipped.
pub fn find_mixin_files(
    root: &Path,
    dirs: &[String],
    resolver: &dyn PathResolver,
    lister: &dyn DirectoryLister,
    extensions: &[String],
) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for dir in dirs {
        let Some(resolved) = resolver.resolve(root, dir, ResolveOptions::optional().shallow())? else {
            debug!(source = %dir, "Skipping unknown mixin source dir");
            continue;
        };

        files.extend(
            lister
                .list_files(&resolved)
                .into_iter()
                .filter(|name| has_extension(name, extensions))
                .map(|name| resolved.join(name)),
        );
    }

    Ok(files)
}

fn has_extension(name: &str, extensions: &[String]) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map_or(false, |ext| extensions.iter().any(|x| x == ext))
}

/// Build one instruction per mixin file.
///
/// A sibling `<stem>.json` file supplies metadata; its `name` overrides the
/// name classified from the file stem.
pub fn load_mixins(
    files: &[PathBuf],
    lister: &dyn DirectoryLister,
    loader: &dyn FragmentLoader,
) -> Result<Vec<MixinInstruction>> {
    let mut mixins = Vec::with_capacity(files.len());

    for file in files {
        let stem = file.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        let meta_name = format!("{}.json", stem);
        let siblings = file.parent().map(|dir| lister.list_files(dir)).unwrap_or_default();

        let mut meta = Map::new();
        if siblings.iter().any(|s| *s == meta_name) {
            if let Value::Object(map) = loader.load_definition(&file.with_file_name(&meta_name))? {
                meta = map;
            }
        }

        let name = match meta.remove("name") {
            Some(Value::String(name)) if !name.is_empty() => name,
            _ => classify_name(stem),
        };

        debug!(mixin = %name, source = %file.display(), "Found mixin");
        mixins.push(MixinInstruction {
            name,
            source_file: file.clone(),
            meta,
        });
    }

    Ok(mixins)
}

/// Names of mixins referenced by the `mixins` object of model definitions.
pub fn referenced_mixins(models: &[ModelInstruction]) -> HashSet<String> {
    models
        .iter()
        .filter_map(|model| model.definition.get("mixins").and_then(Value::as_object))
        .flat_map(|mixins| mixins.keys().cloned())
        .collect()
}

/// Combine mixins from mixin directories with the referenced subset of
/// mixins from mixin sources. The first mixin of a given name wins.
pub fn build_mixin_instructions(
    from_dirs: Vec<MixinInstruction>,
    from_sources: Vec<MixinInstruction>,
    models: &[ModelInstruction],
) -> Vec<MixinInstruction> {
    let referenced = referenced_mixins(models);
    let mut seen = HashSet::new();

    from_dirs
        .into_iter()
        .chain(from_sources.into_iter().filter(|m| referenced.contains(&m.name)))
        .filter(|m| seen.insert(m.name.clone()))
        .collect()
}
