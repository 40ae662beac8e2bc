//! Compile options
//!
//! Options can be built in code or read from a TOML file. Every field has a
//! default, so an empty file is a valid options file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CompileError, Result};
use crate::model::ModelDefinitionInput;
use crate::resolve::{absolutize, DEFAULT_EXTENSIONS};

/// Environment used when none is configured
pub const DEFAULT_ENV: &str = "development";

/// Environment variable the CLI reads the environment name from
pub const ENV_VAR: &str = "BOOT_ENV";

/// Options for one compilation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Application root; relative paths resolve against the working directory
    pub app_root_dir: PathBuf,

    /// Environment name (default: development)
    pub env: Option<String>,

    /// Directory holding the app config (default: app root)
    pub app_config_root_dir: Option<PathBuf>,

    /// Directory holding the model config (default: app root)
    pub models_root_dir: Option<PathBuf>,

    /// Directory holding the data source config (default: app root)
    pub ds_root_dir: Option<PathBuf>,

    pub app_id: Option<String>,

    // Inline configuration, used instead of the files of the same domain
    pub config: Option<Value>,
    pub models: Option<Value>,
    pub data_sources: Option<Value>,
    pub middleware: Option<Value>,
    pub components: Option<Value>,

    /// Model definitions to use instead of scanning model sources
    pub model_definitions: Vec<ModelDefinitionInput>,

    /// Model source directories, overriding `_meta.sources`
    pub model_sources: Option<Vec<String>>,

    /// Directories whose mixins are always included
    pub mixin_dirs: Vec<String>,

    /// Mixin source directories, overriding `_meta.mixins`
    pub mixin_sources: Option<Vec<String>>,

    /// Extra boot script directories, scanned before `<app root>/boot`
    pub boot_dirs: Vec<String>,

    /// Boot scripts listed ahead of every discovered script
    pub boot_scripts: Vec<String>,

    /// Fail on configured models that have no definition
    pub strict_models: bool,

    /// Extensions of loadable script files, without the dot
    pub script_extensions: Vec<String>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            app_root_dir: PathBuf::from("."),
            env: None,
            app_config_root_dir: None,
            models_root_dir: None,
            ds_root_dir: None,
            app_id: None,
            config: None,
            models: None,
            data_sources: None,
            middleware: None,
            components: None,
            model_definitions: Vec::new(),
            model_sources: None,
            mixin_dirs: Vec::new(),
            mixin_sources: None,
            boot_dirs: Vec::new(),
            boot_scripts: Vec::new(),
            strict_models: false,
            script_extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl CompileOptions {
    pub fn new(app_root_dir: impl Into<PathBuf>) -> Self {
        Self {
            app_root_dir: app_root_dir.into(),
            ..Self::default()
        }
    }

    /// Load options from a TOML file.
    ///
    /// A relative `app_root_dir` is taken relative to the file's directory.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| CompileError::io(path, e))?;
        let mut options = Self::parse(&content).map_err(|message| CompileError::Parse {
            path: path.to_path_buf(),
            message,
        })?;

        if options.app_root_dir.is_relative() {
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            options.app_root_dir = absolutize(base, &options.app_root_dir);
        }
        Ok(options)
    }

    /// Parse options from a TOML string
    pub fn parse(content: &str) -> std::result::Result<Self, String> {
        toml::from_str(content).map_err(|e| format!("TOML parse error: {}", e))
    }

    pub fn env(&self) -> &str {
        self.env.as_deref().filter(|e| !e.is_empty()).unwrap_or(DEFAULT_ENV)
    }

    /// Absolute application root
    pub fn root_dir(&self) -> Result<PathBuf> {
        if self.app_root_dir.is_absolute() {
            return Ok(absolutize(&self.app_root_dir, "."));
        }
        let cwd = std::env::current_dir().map_err(|e| CompileError::io(".", e))?;
        Ok(absolutize(&cwd, &self.app_root_dir))
    }

    pub fn config_root_dir(&self, root: &Path) -> PathBuf {
        sub_root(root, self.app_config_root_dir.as_deref())
    }

    pub fn models_root_dir(&self, root: &Path) -> PathBuf {
        sub_root(root, self.models_root_dir.as_deref())
    }

    pub fn ds_root_dir(&self, root: &Path) -> PathBuf {
        sub_root(root, self.ds_root_dir.as_deref())
    }
}

fn sub_root(root: &Path, dir: Option<&Path>) -> PathBuf {
    dir.map_or_else(|| root.to_path_buf(), |dir| absolutize(root, dir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let options = CompileOptions::parse("").unwrap();

        assert_eq!(options.env(), "development");
        assert_eq!(options.script_extensions, ["js"]);
        assert!(options.boot_dirs.is_empty());
        assert!(!options.strict_models);
    }

    #[test]
    fn test_parse_inline_config() {
        let options = CompileOptions::parse(
            r#"
env = "production"
app_id = "shop"
model_sources = ["./common/models"]
strict_models = true

[config]
port = 3000

[[model_definitions]]
source_file = "./models/car.js"
definition = { name = "Car", base = "PersistedModel" }
"#,
        )
        .unwrap();

        assert_eq!(options.env(), "production");
        assert_eq!(options.app_id.as_deref(), Some("shop"));
        assert_eq!(options.config, Some(json!({"port": 3000})));
        assert_eq!(options.model_definitions[0].definition["base"], "PersistedModel");
        assert!(options.strict_models);
    }

    #[test]
    fn test_from_file_resolves_root() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("boot.toml");
        fs::write(&path, "app_root_dir = \"server\"\n").unwrap();

        let options = CompileOptions::from_file(&path).unwrap();
        assert_eq!(options.app_root_dir, dir.path().join("server"));
        assert_eq!(options.models_root_dir(&options.app_root_dir), dir.path().join("server"));
    }

    #[test]
    fn test_from_file_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("boot.toml");
        fs::write(&path, "env = [").unwrap();

        let err = CompileOptions::from_file(&path).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Parse);
    }

    #[test]
    fn test_sub_roots() {
        let mut options = CompileOptions::new("/app");
        options.ds_root_dir = Some(PathBuf::from("./server"));

        let root = options.root_dir().unwrap();
        assert_eq!(options.ds_root_dir(&root), PathBuf::from("/app/server"));
        assert_eq!(options.config_root_dir(&root), PathBuf::from("/app"));
    }
}
