//! Model instructions
//!
//! Expands the configured model names over their inheritance chain and
//! orders the resulting instructions so that every base model comes before
//! the models deriving from it.

mod registry;

pub use registry::{
    base_model_name, classify_name, ModelDefinition, ModelDefinitionInput, ModelRegistry,
};

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;

use boot_merge::is_truthy;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{CompileError, Result};

/// Key of the model-config entry holding discovery settings
pub const META_KEY: &str = "_meta";

/// Model source directories used when `_meta.sources` is not configured
pub const DEFAULT_MODEL_SOURCES: &[&str] = &["./models"];

/// Mixin source directories used when `_meta.mixins` is not configured
pub const DEFAULT_MIXIN_SOURCES: &[&str] = &["./mixins"];

/// One model to define, in inheritance order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInstruction {
    pub name: String,

    /// Merged model-config entry; None for base models pulled in only by
    /// inheritance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,

    pub definition: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<PathBuf>,
}

/// Discovery settings carried in the model config
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelMeta {
    pub sources: Vec<String>,
    pub mixins: Vec<String>,
}

impl Default for ModelMeta {
    fn default() -> Self {
        Self {
            sources: DEFAULT_MODEL_SOURCES.iter().map(|s| s.to_string()).collect(),
            mixins: DEFAULT_MIXIN_SOURCES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Result of building model instructions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelBuild {
    pub instructions: Vec<ModelInstruction>,

    /// Configured names without a definition, left out of `instructions`
    pub dropped: Vec<String>,
}

/// Remove `_meta` from the merged model config and return its settings.
pub fn split_model_meta(models_config: &mut Map<String, Value>) -> Result<ModelMeta> {
    let mut meta = ModelMeta::default();
    let Some(raw) = models_config.remove(META_KEY) else {
        return Ok(meta);
    };

    let Value::Object(raw) = raw else {
        return Err(CompileError::invalid_shape("model", "\"_meta\" must be an object"));
    };
    if let Some(sources) = raw.get("sources") {
        meta.sources = string_list(sources, "_meta.sources")?;
    }
    if let Some(mixins) = raw.get("mixins") {
        meta.mixins = string_list(mixins, "_meta.mixins")?;
    }
    Ok(meta)
}

fn string_list(value: &Value, field: &str) -> Result<Vec<String>> {
    value
        .as_array()
        .and_then(|items| {
            items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
        })
        .ok_or_else(|| {
            CompileError::invalid_shape("model", format!("\"{}\" must be a list of strings", field))
        })
}

/// Reject model-config entries in the legacy format, where the entry
/// carries definition data (`properties`, `base`, `plural`).
pub fn validate_model_config(models_config: &Map<String, Value>) -> Result<()> {
    for (name, entry) in models_config {
        let options = entry.get("options");
        let legacy = ["properties", "base", "plural"]
            .iter()
            .any(|key| entry.get(*key).map_or(false, is_truthy))
            || ["base", "plural"]
                .iter()
                .any(|key| options.and_then(|o| o.get(*key)).map_or(false, is_truthy));

        if legacy {
            return Err(CompileError::invalid_shape(
                "model",
                format!(
                    "entry \"{}\" uses the unsupported 1.x format; move properties, base and plural into the model definition",
                    name
                ),
            ));
        }
    }
    Ok(())
}

/// Expand `names` with every base model tracked by `registry`.
///
/// Names are visited once each, in breadth-first order. Bases missing from
/// the registry are built-ins and are not added.
pub fn add_all_base_models<I, S>(registry: &ModelRegistry, names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut queue: VecDeque<String> = names.into_iter().map(Into::into).collect();
    let mut visited = HashSet::new();
    let mut result = Vec::new();

    while let Some(name) = queue.pop_front() {
        if !visited.insert(name.clone()) {
            continue;
        }

        if let Some(base) = registry.get(&name).and_then(ModelDefinition::base) {
            if registry.contains(base) {
                queue.push_back(base.to_string());
            }
        }
        result.push(name);
    }

    result
}

/// Order instructions so that each base precedes its derived models.
///
/// Models not linked by inheritance keep their relative order. Fails with
/// `CyclicInheritance` when base links form a cycle.
pub fn sort_by_inheritance(instructions: Vec<ModelInstruction>) -> Result<Vec<ModelInstruction>> {
    let by_name: HashMap<&str, usize> = instructions
        .iter()
        .enumerate()
        .map(|(ix, inst)| (inst.name.as_str(), ix))
        .collect();

    let mut in_degree = vec![0usize; instructions.len()];
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); instructions.len()];
    for (ix, inst) in instructions.iter().enumerate() {
        if let Some(&base_ix) = base_model_name(&inst.definition).and_then(|b| by_name.get(b)) {
            children[base_ix].push(ix);
            in_degree[ix] += 1;
        }
    }

    let mut queue: VecDeque<usize> = (0..instructions.len())
        .filter(|&ix| in_degree[ix] == 0)
        .collect();
    let mut order = Vec::with_capacity(instructions.len());
    while let Some(ix) = queue.pop_front() {
        order.push(ix);
        for &child in &children[ix] {
            in_degree[child] -= 1;
            if in_degree[child] == 0 {
                queue.push_back(child);
            }
        }
    }

    if order.len() < instructions.len() {
        let stuck = in_degree
            .iter()
            .position(|&degree| degree > 0)
            .unwrap_or_default();
        return Err(CompileError::CyclicInheritance {
            model: instructions[stuck].name.clone(),
        });
    }

    let mut slots: Vec<Option<ModelInstruction>> = instructions.into_iter().map(Some).collect();
    Ok(order.into_iter().filter_map(|ix| slots[ix].take()).collect())
}

/// Build ordered model instructions from the merged model config.
///
/// Configured models without a definition are dropped with a warning, or
/// fail with `UndefinedModel` when `strict` is set.
pub fn build_model_instructions(
    models_config: &Map<String, Value>,
    registry: &ModelRegistry,
    strict: bool,
) -> Result<ModelBuild> {
    validate_model_config(models_config)?;

    let names = add_all_base_models(registry, models_config.keys().cloned());
    let mut instructions = Vec::with_capacity(names.len());
    let mut dropped = Vec::new();

    for name in names {
        let config = models_config.get(&name).cloned();
        let Some(model) = registry.get(&name) else {
            if strict {
                return Err(CompileError::UndefinedModel { name });
            }
            warn!(model = %name, "Model is configured but has no definition, skipping");
            dropped.push(name);
            continue;
        };

        debug!(model = %name, config = ?config, "Using model");
        instructions.push(ModelInstruction {
            name,
            config,
            definition: model.definition.clone(),
            source_file: model.source_file.clone(),
        });
    }

    Ok(ModelBuild {
        instructions: sort_by_inheritance(instructions)?,
        dropped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn registry(entries: &[(&str, Value)]) -> ModelRegistry {
        let mut registry = ModelRegistry::new();
        for (name, definition) in entries {
            let mut definition = definition.clone();
            definition["name"] = json!(name);
            registry.insert(ModelDefinition {
                name: name.to_string(),
                definition,
                source_file: None,
            });
        }
        registry
    }

    fn config(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn names(build: &ModelBuild) -> Vec<&str> {
        build.instructions.iter().map(|i| i.name.as_str()).collect()
    }

    #[test]
    fn test_closure_over_inheritance() {
        let registry = registry(&[
            ("A", json!({})),
            ("B", json!({"base": "A"})),
            ("C", json!({"base": "B"})),
        ]);

        assert_eq!(add_all_base_models(&registry, ["C"]), ["C", "B", "A"]);
    }

    #[test]
    fn test_bases_ordered_first() {
        let registry = registry(&[
            ("A", json!({})),
            ("B", json!({"base": "A"})),
            ("C", json!({"base": "B"})),
        ]);

        let build =
            build_model_instructions(&config(json!({"C": {"dataSource": "db"}})), &registry, false)
                .unwrap();

        assert_eq!(names(&build), ["A", "B", "C"]);
        assert_eq!(build.instructions[2].config, Some(json!({"dataSource": "db"})));
        assert_eq!(build.instructions[0].config, None);
    }

    #[test]
    fn test_cycle_fails() {
        let registry = registry(&[("X", json!({"base": "Y"})), ("Y", json!({"base": "X"}))]);

        let err = build_model_instructions(&config(json!({"X": {}})), &registry, false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CyclicInheritance);
    }

    #[test]
    fn test_self_base_is_cycle() {
        let registry = registry(&[("Loop", json!({"options": {"base": "Loop"}}))]);

        let err =
            build_model_instructions(&config(json!({"Loop": {}})), &registry, false).unwrap_err();
        assert!(matches!(err, CompileError::CyclicInheritance { ref model } if model == "Loop"));
    }

    fn instruction(name: &str, definition: Value) -> ModelInstruction {
        ModelInstruction {
            name: name.to_string(),
            config: None,
            definition,
            source_file: None,
        }
    }

    fn sorted_names(instructions: Vec<ModelInstruction>) -> Vec<String> {
        sort_by_inheritance(instructions)
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect()
    }

    #[test]
    fn test_unrelated_models_keep_config_order() {
        let instructions = ["Car", "Bus", "Truck", "Bike"]
            .iter()
            .map(|name| instruction(name, json!({"name": name})))
            .collect();

        assert_eq!(sorted_names(instructions), ["Car", "Bus", "Truck", "Bike"]);
    }

    #[test]
    fn test_base_moved_before_derived() {
        let instructions = vec![
            instruction("C", json!({"name": "C", "base": "B"})),
            instruction("Other", json!({"name": "Other"})),
            instruction("B", json!({"name": "B"})),
        ];

        assert_eq!(sorted_names(instructions), ["Other", "B", "C"]);
    }

    #[test]
    fn test_builtin_base_not_expanded() {
        let registry = registry(&[("Customer", json!({"base": "User"}))]);

        let build =
            build_model_instructions(&config(json!({"Customer": {}})), &registry, false).unwrap();
        assert_eq!(names(&build), ["Customer"]);
    }

    #[test]
    fn test_undefined_model_dropped() {
        let registry = registry(&[("Car", json!({}))]);
        let models = config(json!({"Car": {}, "Ghost": {"public": true}}));

        let build = build_model_instructions(&models, &registry, false).unwrap();
        assert_eq!(names(&build), ["Car"]);
        assert_eq!(build.dropped, ["Ghost"]);
    }

    #[test]
    fn test_undefined_model_strict() {
        let registry = registry(&[]);

        let err =
            build_model_instructions(&config(json!({"Ghost": {}})), &registry, true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UndefinedModel);
    }

    #[test]
    fn test_legacy_config_rejected() {
        for entry in [
            json!({"properties": {"color": "string"}}),
            json!({"base": "Model"}),
            json!({"options": {"plural": "cars"}}),
        ] {
            let err = validate_model_config(&config(json!({"Car": entry}))).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidConfigShape);
        }
        assert!(validate_model_config(&config(json!({"Car": {"dataSource": "db"}}))).is_ok());
    }

    #[test]
    fn test_split_meta() {
        let mut models = config(json!({
            "_meta": {"sources": ["./common/models"]},
            "Car": {}
        }));

        let meta = split_model_meta(&mut models).unwrap();
        assert_eq!(meta.sources, ["./common/models"]);
        assert_eq!(meta.mixins, ["./mixins"]);
        assert!(!models.contains_key(META_KEY));

        let mut bad = config(json!({"_meta": {"sources": "./models"}}));
        assert!(split_model_meta(&mut bad).is_err());
    }
}
