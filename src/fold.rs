//! Left-to-right fold of a domain's fragments
//!
//! The accumulator starts as a private copy of the first fragment; later
//! fragments are applied to it through a [`MergeStrategy`]. Fragments
//! themselves are never mutated.

use boot_merge::MergeEngine;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{CompileError, Result};
use crate::fragment::{ConfigDomain, ConfigFragment, FragmentOrigin};

/// How one fragment is merged into a domain's accumulator.
pub trait MergeStrategy {
    fn apply(&self, target: &mut Value, fragment: &ConfigFragment) -> Result<()>;
}

/// Plain deep merge, used for every domain without special rules.
#[derive(Debug, Clone, Default)]
pub struct DeepMerge {
    engine: MergeEngine,
}

impl DeepMerge {
    pub fn new(engine: MergeEngine) -> Self {
        Self { engine }
    }
}

impl MergeStrategy for DeepMerge {
    fn apply(&self, target: &mut Value, fragment: &ConfigFragment) -> Result<()> {
        self.engine
            .merge(target, &fragment.tree)
            .map_err(|source| CompileError::Merge {
                origin: fragment.origin.to_string(),
                source,
            })
    }
}

/// Result of folding a domain's fragments.
#[derive(Debug, Clone, PartialEq)]
pub struct Folded {
    pub tree: Value,

    /// Contributing fragments in precedence order
    pub sources: Vec<FragmentOrigin>,
}

/// Fold `fragments` left to right with `strategy`.
///
/// No fragments yields an empty object. Every fragment root must be an object.
pub fn fold_fragments<S: MergeStrategy + ?Sized>(
    strategy: &S,
    domain: ConfigDomain,
    fragments: &[ConfigFragment],
) -> Result<Folded> {
    let Some((first, rest)) = fragments.split_first() else {
        return Ok(Folded {
            tree: Value::Object(Map::new()),
            sources: Vec::new(),
        });
    };

    ensure_object_root(domain, first)?;
    let mut tree = first.tree.clone();
    let mut sources = vec![first.origin.clone()];

    for fragment in rest {
        ensure_object_root(domain, fragment)?;
        strategy.apply(&mut tree, fragment)?;
        sources.push(fragment.origin.clone());
    }

    debug!(domain = domain.artifact(), fragments = sources.len(), "Merged configuration");
    Ok(Folded { tree, sources })
}

fn ensure_object_root(domain: ConfigDomain, fragment: &ConfigFragment) -> Result<()> {
    if fragment.tree.is_object() {
        Ok(())
    } else {
        Err(CompileError::invalid_shape(
            domain.label(),
            format!("{} must contain an object", fragment.origin),
        ))
    }
}
