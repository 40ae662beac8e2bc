//! Filesystem fragment loader (JSON and TOML files)

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::{ConfigDomain, ConfigFragment, FragmentLayer, FragmentLoader, FragmentOrigin};
use crate::error::{CompileError, Result};

/// Extensions tried for every candidate file, in order.
const EXTENSIONS: &[&str] = &["json", "toml"];

/// Loads fragments from `<root>/<artifact>[.<layer>].{json,toml}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsFragmentLoader;

impl FsFragmentLoader {
    pub fn new() -> Self {
        Self
    }

    /// Find all files holding configuration for `artifact`, lowest precedence first.
    pub fn find_config_files(
        &self,
        root: &Path,
        env: &str,
        artifact: &str,
    ) -> Vec<(FragmentLayer, PathBuf)> {
        let overrides = [
            (FragmentLayer::Common, format!("{}.common", artifact)),
            (FragmentLayer::Local, format!("{}.local", artifact)),
            (FragmentLayer::Environment, format!("{}.{}", artifact, env)),
        ];

        let Some(primary) = find_with_any_ext(root, artifact) else {
            if overrides
                .iter()
                .any(|(_, stem)| find_with_any_ext(root, stem).is_some())
            {
                warn!(
                    dir = %root.display(),
                    artifact,
                    "Main config file is missing, overrides are ignored"
                );
            }
            return Vec::new();
        };

        let mut files = vec![(FragmentLayer::Primary, primary)];
        for (layer, stem) in &overrides {
            let Some(path) = find_with_any_ext(root, stem) else {
                continue;
            };
            // An env named like a layer resolves to a file already collected
            if files.iter().any(|(_, seen)| *seen == path) {
                continue;
            }
            files.push((*layer, path));
        }
        files
    }

    /// Read and parse one file, returning the tree and its digest.
    pub fn load_file(&self, path: &Path) -> Result<(Value, String)> {
        let bytes = fs::read(path).map_err(|e| CompileError::io(path, e))?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let digest = hex::encode(hasher.finalize());

        let contents = String::from_utf8(bytes).map_err(|e| CompileError::Parse {
            path: path.to_path_buf(),
            message: format!("Invalid UTF-8: {}", e),
        })?;

        let value = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => {
                let table: toml::Value = toml::from_str(&contents).map_err(|e| CompileError::Parse {
                    path: path.to_path_buf(),
                    message: format!("TOML parse error: {}", e),
                })?;
                toml_to_json(table)
            }
            _ => serde_json::from_str(&contents).map_err(|e| CompileError::Parse {
                path: path.to_path_buf(),
                message: format!("JSON parse error: {}", e),
            })?,
        };

        Ok((value, digest))
    }
}

impl FragmentLoader for FsFragmentLoader {
    fn load(&self, root: &Path, env: &str, domain: ConfigDomain) -> Result<Vec<ConfigFragment>> {
        let files = self.find_config_files(root, env, domain.artifact());
        if !files.is_empty() {
            debug!(env, artifact = domain.artifact(), count = files.len(), "Found config files");
        }

        files
            .into_iter()
            .map(|(layer, path)| {
                debug!(path = %path.display(), ?layer, "Loading config file");
                let (tree, digest) = self.load_file(&path)?;
                let origin = FragmentOrigin {
                    domain,
                    layer,
                    path: Some(path.to_string_lossy().to_string()),
                    digest: Some(digest),
                };
                Ok(ConfigFragment::new(origin, tree))
            })
            .collect()
    }

    fn load_definition(&self, path: &Path) -> Result<Value> {
        self.load_file(path).map(|(value, _)| value)
    }
}

fn find_with_any_ext(root: &Path, stem: &str) -> Option<PathBuf> {
    EXTENSIONS
        .iter()
        .map(|ext| root.join(format!("{}.{}", stem, ext)))
        .find(|path| path.is_file())
}

/// Convert a TOML value to the JSON tree model
fn toml_to_json(toml: toml::Value) -> Value {
    match toml {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(i.into()),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(arr) => Value::Array(arr.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}
