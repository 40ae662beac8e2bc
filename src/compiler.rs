//! Compilation coordinator
//!
//! Loads and folds every configuration domain, hands the merged trees to the
//! domain builders and assembles the [`InstructionBundle`]. A compilation
//! owns everything it builds: the bundle shares no state with the loader or
//! with any other compilation, so callers may mutate it freely.

use std::path::{Path, PathBuf};

use boot_merge::MergeEngine;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::component::{build_component_instructions, ComponentInstruction};
use crate::error::Result;
use crate::fold::{fold_fragments, DeepMerge, Folded, MergeStrategy};
use crate::fragment::{ConfigDomain, ConfigFragment, FragmentLoader, FragmentOrigin, FsFragmentLoader};
use crate::middleware::{build_middleware_instructions, MiddlewareInstructions, PhaseAwareMerge};
use crate::mixin::{build_mixin_instructions, find_mixin_files, load_mixins, MixinInstruction};
use crate::model::{build_model_instructions, split_model_meta, ModelInstruction, ModelRegistry};
use crate::options::CompileOptions;
use crate::resolve::{
    DirectoryLister, FsDirectoryLister, FsPathResolver, PathResolver, DEFAULT_MODULE_DIRS,
};
use crate::script::ScriptScan;

/// Files to execute after models are defined
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BundleFiles {
    pub boot: Vec<PathBuf>,
}

/// Everything an executor needs to boot the application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructionBundle {
    pub env: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,

    /// Merged app config
    pub config: Value,

    /// Merged data source config
    pub data_sources: Value,

    /// Model instructions, bases first
    pub models: Vec<ModelInstruction>,

    pub middleware: MiddlewareInstructions,

    pub components: Vec<ComponentInstruction>,

    pub mixins: Vec<MixinInstruction>,

    pub files: BundleFiles,

    /// Every fragment folded into the bundle, per domain in precedence order
    #[serde(default)]
    pub sources: Vec<FragmentOrigin>,
}

impl InstructionBundle {
    /// SHA-256 hex digest of the RFC 8785 canonical JSON form of the bundle.
    pub fn digest(&self) -> std::result::Result<String, serde_json::Error> {
        let jcs_bytes = serde_json_canonicalizer::to_vec(self)?;

        let mut hasher = Sha256::new();
        hasher.update(&jcs_bytes);
        Ok(hex::encode(hasher.finalize()))
    }

    /// Serialize to JSON (pretty printed)
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Compiles application configuration into an [`InstructionBundle`].
#[derive(Debug, Clone)]
pub struct Compiler<L = FsFragmentLoader, R = FsPathResolver, D = FsDirectoryLister> {
    loader: L,
    resolver: R,
    lister: D,
    engine: MergeEngine,
}

impl Compiler {
    /// Filesystem-backed compiler resolving the script extensions of `options`.
    pub fn from_options(options: &CompileOptions) -> Self {
        let resolver = FsPathResolver::new(
            options.script_extensions.clone(),
            DEFAULT_MODULE_DIRS.iter().map(|s| s.to_string()).collect(),
        );
        Self::new(FsFragmentLoader, resolver, FsDirectoryLister)
    }
}

impl<L, R, D> Compiler<L, R, D>
where
    L: FragmentLoader,
    R: PathResolver,
    D: DirectoryLister,
{
    pub fn new(loader: L, resolver: R, lister: D) -> Self {
        Self {
            loader,
            resolver,
            lister,
            engine: MergeEngine::default(),
        }
    }

    /// Use `engine` for every merge (identity key of named collections).
    pub fn with_engine(mut self, engine: MergeEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Compile one bundle. Any error aborts the compilation.
    pub fn compile(&self, options: &CompileOptions) -> Result<InstructionBundle> {
        let root = options.root_dir()?;
        let env = options.env();
        info!(root = %root.display(), env, "Compiling boot instructions");

        let deep = DeepMerge::new(self.engine.clone());
        let mut sources = Vec::new();

        let app = self.load_domain(
            ConfigDomain::App,
            &options.config_root_dir(&root),
            env,
            options.config.as_ref(),
            &deep,
        )?;
        sources.extend(app.sources);

        let models_root = options.models_root_dir(&root);
        let models = self.load_domain(
            ConfigDomain::Models,
            &models_root,
            env,
            options.models.as_ref(),
            &deep,
        )?;
        sources.extend(models.sources);

        let data_sources = self.load_domain(
            ConfigDomain::DataSources,
            &options.ds_root_dir(&root),
            env,
            options.data_sources.as_ref(),
            &deep,
        )?;
        sources.extend(data_sources.sources);

        let middleware_config = self.load_domain(
            ConfigDomain::Middleware,
            &root,
            env,
            options.middleware.as_ref(),
            &PhaseAwareMerge::new(self.engine.clone()),
        )?;
        sources.extend(middleware_config.sources);
        let middleware = build_middleware_instructions(&root, &middleware_config.tree, &self.resolver)?;

        let component_config = self.load_domain(
            ConfigDomain::Components,
            &root,
            env,
            options.components.as_ref(),
            &deep,
        )?;
        sources.extend(component_config.sources);
        let components = build_component_instructions(&root, &component_config.tree, &self.resolver)?;

        let scan = ScriptScan {
            resolver: &self.resolver,
            lister: &self.lister,
            extensions: &options.script_extensions,
        };
        let boot = scan.collect(&root, env, &options.boot_dirs, &options.boot_scripts)?;

        let mut models_config = into_object(models.tree);
        let meta = split_model_meta(&mut models_config)?;

        let registry = if options.model_definitions.is_empty() {
            let model_sources = options.model_sources.as_ref().unwrap_or(&meta.sources);
            ModelRegistry::discover(
                &models_root,
                model_sources,
                &self.resolver,
                &self.lister,
                &self.loader,
                &options.script_extensions,
            )?
        } else {
            ModelRegistry::from_definitions(
                &models_root,
                &options.model_definitions,
                &self.lister,
                &options.script_extensions,
            )
        };
        debug!(count = registry.len(), "Model registry built");

        let model_build = build_model_instructions(&models_config, &registry, options.strict_models)?;

        let mixin_sources = options.mixin_sources.as_ref().unwrap_or(&meta.mixins);
        let from_dirs = self.load_mixin_dir_list(&root, &options.mixin_dirs, &options.script_extensions)?;
        let from_sources = self.load_mixin_dir_list(&root, mixin_sources, &options.script_extensions)?;
        let mixins = build_mixin_instructions(from_dirs, from_sources, &model_build.instructions);

        let bundle = InstructionBundle {
            env: env.to_string(),
            app_id: options.app_id.clone(),
            config: app.tree,
            data_sources: data_sources.tree,
            models: model_build.instructions,
            middleware,
            components,
            mixins,
            files: BundleFiles { boot },
            sources,
        };

        info!(
            models = bundle.models.len(),
            middleware = bundle.middleware.middleware.len(),
            components = bundle.components.len(),
            boot_scripts = bundle.files.boot.len(),
            dropped_models = model_build.dropped.len(),
            "Compiled boot instructions"
        );
        Ok(bundle)
    }

    /// Fragments of one domain, folded with `strategy`.
    ///
    /// Inline configuration replaces the domain's files.
    fn load_domain<S: MergeStrategy + ?Sized>(
        &self,
        domain: ConfigDomain,
        dir: &Path,
        env: &str,
        inline: Option<&Value>,
        strategy: &S,
    ) -> Result<Folded> {
        let fragments = match inline {
            Some(tree) => vec![ConfigFragment::inline(domain, tree.clone())],
            None => self.loader.load(dir, env, domain)?,
        };
        fold_fragments(strategy, domain, &fragments)
    }

    fn load_mixin_dir_list(
        &self,
        root: &Path,
        dirs: &[String],
        extensions: &[String],
    ) -> Result<Vec<MixinInstruction>> {
        let files = find_mixin_files(root, dirs, &self.resolver, &self.lister, extensions)?;
        load_mixins(&files, &self.lister, &self.loader)
    }
}

fn into_object(tree: Value) -> Map<String, Value> {
    match tree {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Compile `options` with the filesystem-backed collaborators.
pub fn compile(options: &CompileOptions) -> Result<InstructionBundle> {
    Compiler::from_options(options).compile(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;
    use tempfile::TempDir;

    fn inline_options(root: &Path) -> CompileOptions {
        let mut options = CompileOptions::new(root);
        options.config = Some(json!({"port": 3000}));
        options.data_sources = Some(json!({"db": {"connector": "memory"}}));
        options.middleware = Some(json!({}));
        options.components = Some(json!({}));
        options.models = Some(json!({}));
        options
    }

    #[test]
    fn test_compile_inline_options() {
        let dir = TempDir::new().unwrap();
        let mut options = inline_options(dir.path());
        options.app_id = Some("shop".to_string());
        options.env = Some("test".to_string());

        let bundle = compile(&options).unwrap();

        assert_eq!(bundle.env, "test");
        assert_eq!(bundle.app_id.as_deref(), Some("shop"));
        assert_eq!(bundle.config, json!({"port": 3000}));
        assert_eq!(bundle.data_sources["db"]["connector"], "memory");
        assert!(bundle.models.is_empty());
        assert_eq!(bundle.sources.len(), 5);
    }

    #[test]
    fn test_inline_root_must_be_object() {
        let dir = TempDir::new().unwrap();
        let mut options = inline_options(dir.path());
        options.data_sources = Some(json!(["db"]));

        let err = compile(&options).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfigShape);
    }

    #[test]
    fn test_bundle_serialized_shape() {
        let dir = TempDir::new().unwrap();
        let bundle = compile(&inline_options(dir.path())).unwrap();
        let value = serde_json::to_value(&bundle).unwrap();

        assert!(value.get("appId").is_none());
        assert!(value["dataSources"].is_object());
        assert_eq!(value["files"]["boot"], json!([]));
        assert_eq!(value["middleware"]["phases"], json!([]));
    }

    #[test]
    fn test_digest_stable() {
        let dir = TempDir::new().unwrap();
        let options = inline_options(dir.path());

        let first = compile(&options).unwrap();
        let second = compile(&options).unwrap();
        assert_eq!(first.digest().unwrap(), second.digest().unwrap());
        assert_eq!(first.digest().unwrap().len(), 64);

        let mut changed = first.clone();
        changed.config["port"] = json!(4000);
        assert_ne!(changed.digest().unwrap(), first.digest().unwrap());
    }
}
