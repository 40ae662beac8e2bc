//! Model definition registry
//!
//! One registry is built per compilation, either from explicitly supplied
//! definitions or by scanning model source directories. Names are unique;
//! a later definition with the same name replaces the earlier one.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use boot_merge::is_truthy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{CompileError, Result};
use crate::fragment::FragmentLoader;
use crate::resolve::{absolutize, fix_file_extension, DirectoryLister, PathResolver, ResolveOptions};

/// A model definition known to the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDefinition {
    pub name: String,

    /// Raw definition tree, with `name` filled in
    pub definition: Value,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_file: Option<PathBuf>,
}

impl ModelDefinition {
    pub fn base(&self) -> Option<&str> {
        base_model_name(&self.definition)
    }
}

/// An explicitly supplied definition, as given in compile options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDefinitionInput {
    pub definition: Value,

    /// Source file, relative to the models root
    #[serde(default, alias = "sourceFile")]
    pub source_file: Option<String>,
}

/// Base model declared by a definition: `base`, else `options.base`.
pub fn base_model_name(definition: &Value) -> Option<&str> {
    definition
        .get("base")
        .filter(|b| is_truthy(b))
        .and_then(Value::as_str)
        .or_else(|| definition.get("options")?.get("base")?.as_str())
        .filter(|b| !b.is_empty())
}

/// Turn a file stem into a model or mixin name: `my-model` -> `MyModel`.
pub fn classify_name(stem: &str) -> String {
    split_words(stem)
        .iter()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect()
}

fn split_words(input: &str) -> Vec<String> {
    let mut words = Vec::new();
    for token in input.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
        let chars: Vec<char> = token.chars().collect();
        let mut current = String::new();
        for (ix, &c) in chars.iter().enumerate() {
            let boundary = ix > 0 && {
                let prev = chars[ix - 1];
                let next_lower = chars.get(ix + 1).map_or(false, |n| n.is_lowercase());
                (c.is_uppercase() && (prev.is_lowercase() || prev.is_numeric()))
                    || (c.is_uppercase() && prev.is_uppercase() && next_lower)
            };
            if boundary && !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            current.push(c);
        }
        if !current.is_empty() {
            words.push(current);
        }
    }
    words
}

/// Registry of model definitions, indexed by name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelRegistry {
    models: BTreeMap<String, ModelDefinition>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition, replacing any previous one with the same name.
    pub fn insert(&mut self, model: ModelDefinition) -> Option<ModelDefinition> {
        let previous = self.models.insert(model.name.clone(), model);
        if let Some(ref prev) = previous {
            debug!(model = %prev.name, "Model definition replaced");
        }
        previous
    }

    pub fn get(&self, name: &str) -> Option<&ModelDefinition> {
        self.models.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    /// Build a registry from explicitly supplied definitions.
    ///
    /// Source files are resolved against `root`; entries without a name are
    /// skipped.
    pub fn from_definitions(
        root: &Path,
        inputs: &[ModelDefinitionInput],
        lister: &dyn DirectoryLister,
        extensions: &[String],
    ) -> Self {
        let mut registry = Self::new();

        for (idx, input) in inputs.iter().enumerate() {
            let Some(name) = input.definition.get("name").and_then(Value::as_str).filter(|n| !n.is_empty())
            else {
                warn!(index = idx, "Skipping model definition without a name");
                continue;
            };

            let source_file = input.source_file.as_deref().and_then(|rel| {
                let full = absolutize(root, rel);
                let siblings = full.parent().map(|dir| lister.list_files(dir)).unwrap_or_default();
                let found = fix_file_extension(&full, &siblings, extensions);
                if found.is_none() {
                    debug!(source = %full.display(), "Model source code not found");
                }
                found
            });

            debug!(model = name, "Found model from options");
            registry.insert(ModelDefinition {
                name: name.to_string(),
                definition: input.definition.clone(),
                source_file,
            });
        }

        registry
    }

    /// Build a registry by scanning model source directories.
    ///
    /// Every `*.json` file not starting with `_` is a definition. Sources that
    /// do not resolve to a directory are skipped.
    pub fn discover(
        root: &Path,
        sources: &[String],
        resolver: &dyn PathResolver,
        lister: &dyn DirectoryLister,
        loader: &dyn FragmentLoader,
        extensions: &[String],
    ) -> Result<Self> {
        let mut registry = Self::new();

        for source in sources {
            let Some(dir) = resolver.resolve(root, source, ResolveOptions::optional().shallow())? else {
                debug!(source = %source, "Skipping unknown model source dir");
                continue;
            };

            let files = lister.list_files(&dir);
            for file in files.iter().filter(|f| !f.starts_with('_') && f.ends_with(".json")) {
                let path = dir.join(file);
                if let Some(model) = load_model_definition(&path, &files, loader, extensions)? {
                    registry.insert(model);
                }
            }
        }

        Ok(registry)
    }
}

fn load_model_definition(
    path: &Path,
    siblings: &[String],
    loader: &dyn FragmentLoader,
    extensions: &[String],
) -> Result<Option<ModelDefinition>> {
    let mut definition = loader.load_definition(path)?;
    let Value::Object(map) = &mut definition else {
        return Err(CompileError::invalid_shape(
            "model",
            format!("definition {} must be an object", path.display()),
        ));
    };

    let name = match map.get("name").and_then(Value::as_str) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => {
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
            classify_name(stem)
        }
    };
    if name.is_empty() {
        warn!(path = %path.display(), "Skipping model definition without a name");
        return Ok(None);
    }
    map.insert("name".to_string(), Value::String(name.clone()));

    let source_file = fix_file_extension(path, siblings, extensions);
    debug!(
        model = %name,
        definition = %path.display(),
        source = ?source_file,
        "Found model"
    );

    Ok(Some(ModelDefinition {
        name,
        definition,
        source_file,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::FsFragmentLoader;
    use crate::resolve::{FsDirectoryLister, FsPathResolver};
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn exts() -> Vec<String> {
        vec!["js".to_string()]
    }

    #[test]
    fn test_classify_name() {
        assert_eq!(classify_name("my-model"), "MyModel");
        assert_eq!(classify_name("user_profile"), "UserProfile");
        assert_eq!(classify_name("car"), "Car");
        assert_eq!(classify_name("timeStamp"), "TimeStamp");
        assert_eq!(classify_name("XMLParser"), "XmlParser");
        assert_eq!(classify_name("--"), "");
    }

    #[test]
    fn test_base_model_name() {
        assert_eq!(base_model_name(&json!({"base": "User"})), Some("User"));
        assert_eq!(base_model_name(&json!({"options": {"base": "Model"}})), Some("Model"));
        assert_eq!(
            base_model_name(&json!({"base": "", "options": {"base": "Model"}})),
            Some("Model")
        );
        assert_eq!(base_model_name(&json!({"name": "Car"})), None);
    }

    #[test]
    fn test_discover_models() {
        let dir = TempDir::new().unwrap();
        let models = dir.path().join("common/models");
        fs::create_dir_all(&models).unwrap();
        fs::write(models.join("car.json"), r#"{"name": "Car", "base": "PersistedModel"}"#).unwrap();
        fs::write(models.join("car.js"), "").unwrap();
        fs::write(models.join("sports-car.json"), r#"{"base": "Car"}"#).unwrap();
        fs::write(models.join("_ignored.json"), r#"{"name": "Hidden"}"#).unwrap();

        let registry = ModelRegistry::discover(
            dir.path(),
            &["./common/models".to_string(), "./missing".to_string()],
            &FsPathResolver::default(),
            &FsDirectoryLister,
            &FsFragmentLoader,
            &exts(),
        )
        .unwrap();

        assert_eq!(registry.names().collect::<Vec<_>>(), ["Car", "SportsCar"]);
        assert_eq!(registry.get("Car").unwrap().source_file, Some(models.join("car.js")));
        assert_eq!(registry.get("SportsCar").unwrap().source_file, None);
        assert_eq!(registry.get("SportsCar").unwrap().definition["name"], "SportsCar");
        assert_eq!(registry.get("SportsCar").unwrap().base(), Some("Car"));
    }

    #[test]
    fn test_later_source_wins() {
        let dir = TempDir::new().unwrap();
        for (sub, color) in [("a", "red"), ("b", "blue")] {
            let models = dir.path().join(sub);
            fs::create_dir_all(&models).unwrap();
            fs::write(models.join("car.json"), format!(r#"{{"color": "{}"}}"#, color)).unwrap();
        }

        let registry = ModelRegistry::discover(
            dir.path(),
            &["./a".to_string(), "./b".to_string()],
            &FsPathResolver::default(),
            &FsDirectoryLister,
            &FsFragmentLoader,
            &exts(),
        )
        .unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("Car").unwrap().definition["color"], "blue");
    }

    #[test]
    fn test_from_definitions() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("models")).unwrap();
        fs::write(dir.path().join("models/order.js"), "").unwrap();

        let inputs = vec![
            ModelDefinitionInput {
                definition: json!({"name": "Order"}),
                source_file: Some("./models/order".to_string()),
            },
            ModelDefinitionInput {
                definition: json!({"base": "Model"}),
                source_file: None,
            },
        ];

        let registry =
            ModelRegistry::from_definitions(dir.path(), &inputs, &FsDirectoryLister, &exts());

        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get("Order").unwrap().source_file,
            Some(dir.path().join("models/order.js"))
        );
    }
}
