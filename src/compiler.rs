//! Compiler path indirection.
//!
//! Anything that shells out to "the compiler" resolves the executable through a
//! [`CompilerPath`] handle instead of reading a process-wide variable directly.
//! The fake-compiler channel installs a scoped override on the handle it was
//! given; the previous override comes back when the [`CompilerOverride`] guard
//! is dropped.
//!
//! ## Resolution order
//!
//! 1. The innermost installed override
//! 2. The `SC` environment variable
//! 3. `sc`, looked up on `PATH` by the OS

use std::env;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use simple_test_core::protocol::{COMPILER_ENV_VAR, DEFAULT_COMPILER};

/// Shared, cloneable handle to the compiler executable location.
///
/// Clones share the same override slot, so a wrapper constructed with a clone
/// sees overrides installed through any other clone.
#[derive(Debug, Clone, Default)]
pub struct CompilerPath {
    current: Arc<Mutex<Option<PathBuf>>>,
}

impl CompilerPath {
    /// A handle with no override; resolves through the environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle that always resolves to `path` unless overridden again.
    pub fn fixed(path: impl Into<PathBuf>) -> Self {
        Self {
            current: Arc::new(Mutex::new(Some(path.into()))),
        }
    }

    /// Resolve the executable to spawn.
    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = self.current_override() {
            return path;
        }
        match env::var_os(COMPILER_ENV_VAR) {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => PathBuf::from(DEFAULT_COMPILER),
        }
    }

    /// The currently installed override, if any.
    pub fn current_override(&self) -> Option<PathBuf> {
        self.lock().clone()
    }

    /// Install `path` until the returned guard is dropped.
    pub fn install(&self, path: impl AsRef<Path>) -> CompilerOverride {
        let path = path.as_ref().to_path_buf();
        let previous = self.lock().replace(path.clone());
        tracing::debug!(compiler = %path.display(), had_previous = previous.is_some(), "installed compiler override");
        CompilerOverride {
            handle: self.clone(),
            previous,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<PathBuf>> {
        // A panic while holding the lock cannot leave the Option half-written.
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Guard restoring the previous compiler override on drop.
#[derive(Debug)]
#[must_use = "dropping the guard immediately restores the previous compiler"]
pub struct CompilerOverride {
    handle: CompilerPath,
    previous: Option<PathBuf>,
}

impl CompilerOverride {
    /// The override that was active before this one.
    pub fn previous(&self) -> Option<&Path> {
        self.previous.as_deref()
    }
}

impl Drop for CompilerOverride {
    fn drop(&mut self) {
        let restored = self.previous.take();
        tracing::debug!(restored = restored.is_some(), "restoring compiler override");
        *self.handle.lock() = restored;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_and_restore_to_empty() {
        let compiler = CompilerPath::new();
        {
            let guard = compiler.install("/tmp/fake/sc");
            assert_eq!(guard.previous(), None);
            assert_eq!(compiler.resolve(), PathBuf::from("/tmp/fake/sc"));
        }
        assert_eq!(compiler.current_override(), None);
    }

    #[test]
    fn nested_overrides_restore_in_order() {
        let compiler = CompilerPath::fixed("/usr/bin/sc");
        let outer = compiler.install("/a/sc");
        assert_eq!(outer.previous(), Some(Path::new("/usr/bin/sc")));
        {
            let inner = compiler.install("/b/sc");
            assert_eq!(inner.previous(), Some(Path::new("/a/sc")));
            assert_eq!(compiler.resolve(), PathBuf::from("/b/sc"));
        }
        assert_eq!(compiler.resolve(), PathBuf::from("/a/sc"));
        drop(outer);
        assert_eq!(compiler.resolve(), PathBuf::from("/usr/bin/sc"));
    }

    #[test]
    fn clones_share_overrides() {
        let compiler = CompilerPath::new();
        let seen_by_wrapper = compiler.clone();
        let _guard = compiler.install("/tmp/x/sc");
        assert_eq!(seen_by_wrapper.resolve(), PathBuf::from("/tmp/x/sc"));
    }

    #[test]
    fn guard_restores_on_unwind() {
        let compiler = CompilerPath::new();
        let inner = compiler.clone();
        let result = std::panic::catch_unwind(move || {
            let _guard = inner.install("/tmp/panicking/sc");
            panic!("wrapper blew up");
        });
        assert!(result.is_err());
        assert_eq!(compiler.current_override(), None);
    }
}
