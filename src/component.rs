//! Component instructions

use std::path::{Path, PathBuf};

use boot_merge::is_truthy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{CompileError, Result};
use crate::resolve::{PathResolver, ResolveOptions};

/// One component to load
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentInstruction {
    pub source_file: PathBuf,
    pub config: Value,
}

/// Build one instruction per enabled component.
///
/// Keys whose value is falsy (`false`, `null`, `0`, `""`) are disabled.
/// Every enabled key must resolve to a source file.
pub fn build_component_instructions(
    root: &Path,
    config: &Value,
    resolver: &dyn PathResolver,
) -> Result<Vec<ComponentInstruction>> {
    let components = config
        .as_object()
        .ok_or_else(|| CompileError::invalid_shape("component", "root must be an object"))?;

    components
        .iter()
        .filter(|(_, config)| is_truthy(config))
        .map(|(name, config)| {
            let source_file = resolver
                .resolve(root, name, ResolveOptions::required())?
                .ok_or_else(|| CompileError::UnresolvedPath {
                    reference: name.clone(),
                    root: root.to_path_buf(),
                })?;
            debug!(component = %name, source = %source_file.display(), "Component resolved");

            Ok(ComponentInstruction {
                source_file,
                config: config.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::resolve::FsPathResolver;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_enabled_components_only() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("components")).unwrap();
        fs::write(dir.path().join("components/explorer.js"), "").unwrap();

        let config = json!({
            "./components/explorer": {"mountPath": "/explorer"},
            "./components/disabled": false,
            "./components/off": null
        });

        let result =
            build_component_instructions(dir.path(), &config, &FsPathResolver::default()).unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].source_file, dir.path().join("components/explorer.js"));
        assert_eq!(result[0].config, json!({"mountPath": "/explorer"}));
    }

    #[test]
    fn test_missing_component_fails() {
        let dir = TempDir::new().unwrap();
        let config = json!({"./components/missing": true});

        let err = build_component_instructions(dir.path(), &config, &FsPathResolver::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnresolvedPath);
    }
}
