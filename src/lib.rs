//! Boot compiler - layered app configuration to boot instructions
//!
//! This crate compiles an application's layered configuration (app config,
//! data sources, models, middleware, components) plus its model definitions
//! and boot scripts into one ordered [`InstructionBundle`] for an executor.

pub mod component;
pub mod compiler;
pub mod error;
pub mod fold;
pub mod fragment;
pub mod logging;
pub mod middleware;
pub mod mixin;
pub mod model;
pub mod options;
pub mod resolve;
pub mod script;

pub use compiler::{compile, BundleFiles, Compiler, InstructionBundle};
pub use error::{CompileError, ErrorKind, Result};
pub use fragment::{ConfigDomain, ConfigFragment, FragmentLoader, FragmentOrigin, FsFragmentLoader};
pub use options::CompileOptions;
pub use resolve::{DirectoryLister, FsDirectoryLister, FsPathResolver, PathResolver};
