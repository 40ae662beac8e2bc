//! Phase-aware merge of middleware fragments
//!
//! The primary middleware file is the skeleton: it fixes the set of phases
//! and, per phase, the set of middleware. Later fragments may only extend
//! entries that already exist there.

use std::sync::OnceLock;

use boot_merge::{merge_value, MergeEngine, MergeError};
use regex_lite::Regex;
use serde_json::{Map, Value};

use crate::error::{CompileError, Result};
use crate::fold::MergeStrategy;
use crate::fragment::ConfigFragment;

/// Merge strategy for the middleware domain.
///
/// A fragment is validated against the skeleton and merged into a staged
/// copy; the accumulator is only replaced once the whole fragment applied.
/// A rejected fragment leaves the accumulator untouched.
#[derive(Debug, Clone, Default)]
pub struct PhaseAwareMerge {
    engine: MergeEngine,
}

impl PhaseAwareMerge {
    pub fn new(engine: MergeEngine) -> Self {
        Self { engine }
    }

    /// Check every phase and middleware of `fragment` against the skeleton.
    fn validate(&self, skeleton: &Map<String, Value>, fragment: &ConfigFragment) -> Result<()> {
        let origin = fragment.origin.to_string();
        let incoming = as_phase_map(&fragment.tree, &origin)?;

        for (phase, phase_config) in incoming {
            let known = skeleton
                .get(phase)
                .ok_or_else(|| CompileError::UnknownPhase {
                    origin: origin.clone(),
                    phase: phase.clone(),
                })?;
            let known = as_phase_map(known, &origin)?;

            for middleware in as_phase_map(phase_config, &origin)?.keys() {
                if !known.contains_key(middleware) {
                    return Err(CompileError::UnknownMiddleware {
                        origin: origin.clone(),
                        phase: phase.clone(),
                        middleware: middleware.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn merge_phase(
        &self,
        target: &mut Map<String, Value>,
        incoming: &Map<String, Value>,
        phase: &str,
    ) -> std::result::Result<(), MergeError> {
        for (middleware, config) in incoming {
            let key_path = format!("{}.{}", phase, middleware);
            if let Some(current) = target.get_mut(middleware) {
                self.merge_middleware(current, config, &key_path)?;
            }
        }
        Ok(())
    }

    fn merge_middleware(
        &self,
        current: &mut Value,
        incoming: &Value,
        key_path: &str,
    ) -> std::result::Result<(), MergeError> {
        if !current.is_array() && !incoming.is_array() {
            return merge_value(current, incoming, key_path);
        }

        let merged = match (&*current, incoming) {
            (Value::Array(base), Value::Array(items)) => self.engine.merge_named_items(base, items),
            (Value::Array(base), Value::Object(item)) if !item.is_empty() => {
                self.engine
                    .merge_named_items(base, std::slice::from_ref(incoming))
            }
            // Empty or non-object config against a list: nothing to add
            (Value::Array(_), _) => return Ok(()),
            (Value::Object(base), Value::Array(items)) if !base.is_empty() => {
                self.engine
                    .merge_named_items(std::slice::from_ref(&*current), items)
            }
            (_, items) => Ok(items.as_array().cloned().unwrap_or_default()),
        };

        let merged = merged.map_err(|e| e.with_prefix(key_path))?;
        *current = Value::Array(merged);
        Ok(())
    }
}

impl MergeStrategy for PhaseAwareMerge {
    fn apply(&self, target: &mut Value, fragment: &ConfigFragment) -> Result<()> {
        let origin = fragment.origin.to_string();
        let skeleton = as_phase_map(target, &origin)?;
        self.validate(skeleton, fragment)?;

        let mut staged = skeleton.clone();
        let incoming = as_phase_map(&fragment.tree, &origin)?;
        for (phase, phase_config) in incoming {
            let Some(Value::Object(target_phase)) = staged.get_mut(phase) else {
                continue;
            };
            let Value::Object(phase_config) = phase_config else {
                continue;
            };
            self.merge_phase(target_phase, phase_config, phase)
                .map_err(|source| CompileError::Merge {
                    origin: origin.clone(),
                    source,
                })?;
        }

        *target = Value::Object(staged);
        Ok(())
    }
}

fn as_phase_map<'a>(value: &'a Value, origin: &str) -> Result<&'a Map<String, Value>> {
    value.as_object().ok_or_else(|| {
        CompileError::invalid_shape("middleware", format!("{}: phases and their middleware must be objects", origin))
    })
}

fn phase_suffix() -> &'static Regex {
    static SUFFIX: OnceLock<Regex> = OnceLock::new();
    SUFFIX.get_or_init(|| Regex::new(r":[^:]+$").expect("phase suffix pattern is valid"))
}

/// Base name of a phase, without its `:before`/`:after` style qualifier.
pub fn phase_base_name(phase: &str) -> String {
    phase_suffix().replace(phase, "").into_owned()
}

/// Flatten phase names for the executor.
///
/// Qualifiers are stripped and the consecutive duplicates this produces are
/// collapsed, so `routes:before, routes, routes:after` becomes `routes`.
pub fn flatten_phase_names<S: AsRef<str>>(phases: &[S]) -> Vec<String> {
    let mut flattened: Vec<String> = Vec::with_capacity(phases.len());
    for phase in phases {
        let base = phase_base_name(phase.as_ref());
        if flattened.last() != Some(&base) {
            flattened.push(base);
        }
    }
    flattened
}
