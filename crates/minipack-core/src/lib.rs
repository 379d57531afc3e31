#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]

pub mod config;
pub mod diagnostics;
pub mod error;
mod graph;
pub mod manifest;
pub mod output;
pub mod platform;
pub mod registry;
pub mod request;
pub mod resolve;
pub mod rules;
pub mod session;
pub mod srcmode;

pub use config::SessionOptions;
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use error::Error;
pub use manifest::{AppConfig, AppManifest, PageComponentConfig, PageEntry, SubPackageManifest};
pub use output::{OutputPathHook, OutputPaths, PathHashMode};
pub use platform::{Capabilities, Mode};
pub use registry::{RegisterRequest, Registration, ResourceKind, ResourceRegistry};
pub use resolve::{
    AssetSink, CollectingSink, ExtensionResolver, FsReader, FsSink, PathResolver, Resolution,
    ResolvedRequest, SourceReader,
};
pub use session::CompileSession;
pub use srcmode::{effective_src_mode, needs_trans, tag_script, UNIFIED_GLOBAL};
