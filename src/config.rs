use crate::{
    error::Error,
    types::sizes::{Sizes, StdSizes},
    workspace::{package::PackageId, Workspace},
};
use std::fmt;

/// Reserved for future use; must be the default value.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub struct ImportMode(pub u32);

/// A failed import. Importers are encouraged to return whatever package they
/// managed to create so that follow-on errors stay quiet.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ImportFailure {
    pub message: String,
    pub partial: Option<PackageId>,
}

impl ImportFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            partial: None,
        }
    }

    pub fn with_partial(mut self, pkg: PackageId) -> Self {
        self.partial = Some(pkg);
        self
    }
}

/// Resolves import paths to packages.
pub trait Importer {
    fn import(&mut self, ws: &mut Workspace, path: &str, depth: usize) -> Result<PackageId, ImportFailure>;

    /// Importers that know the importing directory return themselves here;
    /// the checker then calls `import_from` instead of `import`.
    fn as_importer_from(&mut self) -> Option<&mut dyn ImporterFrom> {
        None
    }
}

pub trait ImporterFrom: Importer {
    /// Two calls with the same `path` and `dir` must return the same package.
    fn import_from(
        &mut self,
        ws: &mut Workspace,
        path: &str,
        dir: &str,
        mode: ImportMode,
        depth: usize,
    ) -> Result<PackageId, ImportFailure>;
}

pub type ErrorSink = Box<dyn FnMut(&Error)>;

/// Configuration of a type check. The default value checks a complete
/// package in incremental mode without an importer.
pub struct Config {
    /// Skip checking function bodies; signatures are still resolved.
    pub ignore_func_bodies: bool,
    /// `import "C"` declares an empty package and selectors into it are not
    /// reported.
    pub fake_import_c: bool,
    /// Called with every error found. Without a sink, checking stops at the
    /// first hard error, which is returned.
    pub error: Option<ErrorSink>,
    pub importer: Option<Box<dyn Importer>>,
    /// Defaults to `StdSizes` for amd64.
    pub sizes: Option<Box<dyn Sizes>>,
    pub disable_unused_import_check: bool,
    /// Reuse packages across imports of the same (path, dir) pair. When unset
    /// every import statement consults the importer again.
    pub allow_import_caching: bool,
    /// Check a whole package: standalone top-level statements are rejected and
    /// no edit log is produced.
    pub full_package: bool,
    pub allow_over_shadowed_naked_returns: bool,
    pub allow_unused_var: bool,
    /// Package-level names may be declared again, replacing the old binding.
    pub allow_redeclaration: bool,
    /// Depth at which import recursion is reported as an error.
    pub max_import_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ignore_func_bodies: false,
            fake_import_c: false,
            error: None,
            importer: None,
            sizes: None,
            disable_unused_import_check: false,
            allow_import_caching: false,
            full_package: false,
            allow_over_shadowed_naked_returns: false,
            allow_unused_var: false,
            allow_redeclaration: false,
            max_import_depth: 64,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("ignore_func_bodies", &self.ignore_func_bodies)
            .field("fake_import_c", &self.fake_import_c)
            .field("error", &self.error.is_some())
            .field("importer", &self.importer.is_some())
            .field("sizes", &self.sizes.is_some())
            .field("disable_unused_import_check", &self.disable_unused_import_check)
            .field("allow_import_caching", &self.allow_import_caching)
            .field("full_package", &self.full_package)
            .field("allow_over_shadowed_naked_returns", &self.allow_over_shadowed_naked_returns)
            .field("allow_unused_var", &self.allow_unused_var)
            .field("allow_redeclaration", &self.allow_redeclaration)
            .field("max_import_depth", &self.max_import_depth)
            .finish()
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls `f` with the configured sizes, or the default ones.
    pub(crate) fn with_sizes<R>(&self, f: impl FnOnce(&dyn Sizes) -> R) -> R {
        match &self.sizes {
            Some(sizes) => f(sizes.as_ref()),
            None => f(&StdSizes::default()),
        }
    }
}
