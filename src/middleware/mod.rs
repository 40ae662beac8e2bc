//! Middleware instructions
//!
//! Folds the middleware domain with [`PhaseAwareMerge`] and turns the result
//! into a flattened phase list plus one instruction per middleware config.

mod phases;

pub use phases::{flatten_phase_names, phase_base_name, PhaseAwareMerge};

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use boot_merge::is_truthy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{CompileError, Result};
use crate::resolve::{absolutize, PathResolver, ResolveOptions};

/// Middleware section of the bundle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MiddlewareInstructions {
    /// Flattened phase names in declaration order
    pub phases: Vec<String>,

    pub middleware: Vec<MiddlewareInstruction>,
}

/// One middleware to register
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MiddlewareInstruction {
    pub source_file: PathBuf,

    /// Middleware config with its `phase` filled in
    pub config: Value,

    /// Named export to use instead of the module itself
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fragment: Option<String>,
}

/// Where a middleware reference resolved to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMiddleware {
    pub source_file: PathBuf,
    pub fragment: Option<String>,
}

/// Build middleware instructions from the merged middleware config.
pub fn build_middleware_instructions(
    root: &Path,
    config: &Value,
    resolver: &dyn PathResolver,
) -> Result<MiddlewareInstructions> {
    let phases = config
        .as_object()
        .ok_or_else(|| CompileError::invalid_shape("middleware", "root must be an object"))?;

    let mut middleware = Vec::new();
    for (phase, phase_config) in phases {
        let entries = phase_config.as_object().ok_or_else(|| {
            CompileError::invalid_shape("middleware", format!("phase \"{}\" must be an object", phase))
        })?;

        for (name, all_configs) in entries {
            let configs = match all_configs {
                Value::Array(items) => items.as_slice(),
                single => std::slice::from_ref(single),
            };

            for config in configs {
                if let Some(instruction) = build_instruction(root, phase, name, config, resolver)? {
                    middleware.push(instruction);
                }
            }
        }
    }

    let phase_names: Vec<&String> = phases.keys().collect();
    Ok(MiddlewareInstructions {
        phases: flatten_phase_names(&phase_names),
        middleware,
    })
}

fn build_instruction(
    root: &Path,
    phase: &str,
    name: &str,
    config: &Value,
    resolver: &dyn PathResolver,
) -> Result<Option<MiddlewareInstruction>> {
    let Value::Object(map) = config else {
        return Err(CompileError::invalid_shape(
            "middleware",
            format!("config of \"{}\" in phase \"{}\" must be an object", name, phase),
        ));
    };

    let optional = map.get("optional").map_or(false, is_truthy);
    let Some(resolved) = resolve_middleware_path(root, name, optional, resolver)? else {
        warn!(middleware = name, phase, "Optional middleware not found, skipping");
        return Ok(None);
    };

    let mut middleware_config = map.clone();
    middleware_config.insert("phase".to_string(), Value::String(phase.to_string()));
    if let Some(params) = middleware_config.get_mut("params") {
        *params = resolve_middleware_params(root, params);
    }

    debug!(middleware = name, phase, source = %resolved.source_file.display(), "Middleware resolved");
    Ok(Some(MiddlewareInstruction {
        source_file: resolved.source_file,
        config: Value::Object(middleware_config),
        fragment: resolved.fragment,
    }))
}

/// Resolve a `module[#fragment]` middleware reference.
///
/// A fragment is first looked up as a file under the module's
/// `server/middleware` or `middleware` directory; if neither exists, the
/// module itself is used and the fragment is kept as an export selector.
pub fn resolve_middleware_path(
    root: &Path,
    name: &str,
    optional: bool,
    resolver: &dyn PathResolver,
) -> Result<Option<ResolvedMiddleware>> {
    let (module, fragment) = match name.split_once('#') {
        Some((module, fragment)) if !fragment.is_empty() => (module, Some(fragment)),
        Some((module, _)) => (module, None),
        None => (name, None),
    };

    let options = if optional {
        ResolveOptions::optional().shallow()
    } else {
        ResolveOptions::required().shallow()
    };

    if let Some(fragment) = fragment {
        let candidates = [
            format!("{}/server/middleware/{}", module, fragment),
            format!("{}/middleware/{}", module, fragment),
        ];
        for candidate in &candidates {
            if let Some(source_file) = resolver.resolve(root, candidate, ResolveOptions::optional())? {
                return Ok(Some(ResolvedMiddleware {
                    source_file,
                    fragment: None,
                }));
            }
        }
    }

    Ok(resolver
        .resolve(root, module, options)?
        .map(|source_file| ResolvedMiddleware {
            source_file,
            fragment: fragment.map(str::to_string),
        }))
}

fn path_param() -> &'static Regex {
    static PATH_PARAM: OnceLock<Regex> = OnceLock::new();
    PATH_PARAM.get_or_init(|| Regex::new(r"^\$!(\./|\.\./)").expect("path param pattern is valid"))
}

/// Replace `$!./x` and `$!../x` strings with absolute paths under `root`.
pub fn resolve_middleware_params(root: &Path, params: &Value) -> Value {
    match params {
        Value::String(s) if path_param().is_match(s) => {
            Value::String(absolutize(root, &s[2..]).to_string_lossy().into_owned())
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| resolve_middleware_params(root, item))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_middleware_params(root, v)))
                .collect(),
        ),
        other => other.clone(),
    }
}
