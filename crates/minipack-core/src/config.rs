use crate::error::Error;
use crate::output::PathHashMode;
use crate::platform::Mode;
use std::path::PathBuf;

/// Options for one compilation session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Target platform the build emits for.
    pub mode: Mode,

    /// Platform dialect the sources are authored for, unless a resource
    /// carries a local `?mode=` override.
    pub src_mode: Mode,

    /// Environment tag, free-form (`""` when unset).
    pub env: String,

    /// Project root; anchors relative path hashing and app context.
    pub project_root: PathBuf,

    /// Hash output paths from the absolute path or from the path relative
    /// to `project_root`.
    pub path_hash_mode: PathHashMode,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            mode: Mode::Wx,
            src_mode: Mode::Wx,
            env: String::new(),
            project_root: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            path_hash_mode: PathHashMode::Absolute,
        }
    }
}

impl SessionOptions {
    #[must_use]
    pub fn new(project_root: PathBuf) -> Self {
        Self {
            project_root,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_src_mode(mut self, src_mode: Mode) -> Self {
        self.src_mode = src_mode;
        self
    }

    #[must_use]
    pub fn with_env(mut self, env: impl Into<String>) -> Self {
        self.env = env.into();
        self
    }

    #[must_use]
    pub fn with_path_hash_mode(mut self, hash_mode: PathHashMode) -> Self {
        self.path_hash_mode = hash_mode;
        self
    }

    /// Validate mode combinations.
    ///
    /// Cross-mode compilation is only supported from `wx` sources; `web`
    /// output additionally requires `wx` sources.
    pub fn validate(&self) -> Result<(), Error> {
        if self.mode != self.src_mode && self.src_mode != Mode::Wx {
            return Err(Error::other(format!(
                "cross-mode compilation requires srcMode to be \"wx\", got \"{}\"",
                self.src_mode
            )));
        }
        if self.mode == Mode::Web && self.src_mode != Mode::Wx {
            return Err(Error::other(
                "mode \"web\" is only supported when srcMode is \"wx\"",
            ));
        }
        Ok(())
    }
}
