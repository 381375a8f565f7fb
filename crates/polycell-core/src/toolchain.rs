//! Toolchain resolution.
//!
//! Locating interpreters and compilers is a collaborator concern: the engine
//! only asks a [`ToolchainResolver`] for an executable path and treats `None`
//! as "not found". [`SystemToolchains`] is the default resolver.

use std::fmt;
use std::path::PathBuf;

use crate::config::ToolchainOverrides;

/// A tool a backend needs in order to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Toolchain {
    /// Interpreter hosting the persistent kernel.
    Python,
    /// Compiler for the compiled backend.
    Rustc,
    /// Runtime for plain JavaScript.
    JavaScript,
    /// Runtime able to execute TypeScript directly.
    TypeScript,
}

impl Toolchain {
    pub const ALL: [Toolchain; 4] = [
        Toolchain::Python,
        Toolchain::Rustc,
        Toolchain::JavaScript,
        Toolchain::TypeScript,
    ];

    /// Environment variable that overrides the lookup.
    pub fn env_var(self) -> &'static str {
        match self {
            Toolchain::Python => "POLYCELL_PYTHON",
            Toolchain::Rustc => "POLYCELL_RUSTC",
            Toolchain::JavaScript => "POLYCELL_JS_RUNTIME",
            Toolchain::TypeScript => "POLYCELL_TS_RUNTIME",
        }
    }

    /// Binary names searched on PATH, in preference order.
    pub fn candidates(self) -> &'static [&'static str] {
        match self {
            Toolchain::Python => &["python3", "python"],
            Toolchain::Rustc => &["rustc"],
            Toolchain::JavaScript => &["bun", "node"],
            Toolchain::TypeScript => &["bun"],
        }
    }
}

impl fmt::Display for Toolchain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Toolchain::Python => "Python interpreter",
            Toolchain::Rustc => "Rust compiler (rustc)",
            Toolchain::JavaScript => "JavaScript runtime (bun or node)",
            Toolchain::TypeScript => "TypeScript runtime (bun)",
        };
        f.write_str(name)
    }
}

/// Resolves a toolchain to an executable path.
pub trait ToolchainResolver: Send + Sync {
    fn resolve(&self, toolchain: Toolchain) -> Option<PathBuf>;
}

impl<F> ToolchainResolver for F
where
    F: Fn(Toolchain) -> Option<PathBuf> + Send + Sync,
{
    fn resolve(&self, toolchain: Toolchain) -> Option<PathBuf> {
        self(toolchain)
    }
}

/// Resolver backed by explicit overrides, environment variables and PATH.
///
/// Lookup order:
/// 1. Configured override
/// 2. Toolchain environment variable (e.g. `POLYCELL_PYTHON`)
/// 3. First candidate binary found on PATH
#[derive(Debug, Clone, Default)]
pub struct SystemToolchains {
    overrides: ToolchainOverrides,
}

impl SystemToolchains {
    pub fn new(overrides: ToolchainOverrides) -> Self {
        Self { overrides }
    }

    fn configured(&self, toolchain: Toolchain) -> Option<&PathBuf> {
        match toolchain {
            Toolchain::Python => self.overrides.python.as_ref(),
            Toolchain::Rustc => self.overrides.rustc.as_ref(),
            Toolchain::JavaScript => self.overrides.javascript.as_ref(),
            Toolchain::TypeScript => self.overrides.typescript.as_ref(),
        }
    }
}

impl ToolchainResolver for SystemToolchains {
    fn resolve(&self, toolchain: Toolchain) -> Option<PathBuf> {
        if let Some(path) = self.configured(toolchain) {
            return Some(path.clone());
        }

        if let Ok(path) = std::env::var(toolchain.env_var()) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
            tracing::warn!(
                "{} points to missing path {}, falling back to PATH",
                toolchain.env_var(),
                path.display()
            );
        }

        toolchain
            .candidates()
            .iter()
            .find_map(|name| which::which(name).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_wins() {
        let resolver = SystemToolchains::new(ToolchainOverrides {
            rustc: Some(PathBuf::from("/custom/rustc")),
            ..Default::default()
        });
        assert_eq!(
            resolver.resolve(Toolchain::Rustc),
            Some(PathBuf::from("/custom/rustc"))
        );
    }

    #[test]
    fn test_closure_resolver() {
        let resolver = |tc: Toolchain| (tc == Toolchain::Python).then(|| PathBuf::from("/py"));
        assert_eq!(resolver.resolve(Toolchain::Python), Some(PathBuf::from("/py")));
        assert_eq!(resolver.resolve(Toolchain::Rustc), None);
    }

    #[test]
    fn test_candidates_non_empty() {
        for toolchain in Toolchain::ALL {
            assert!(!toolchain.candidates().is_empty());
            assert!(toolchain.env_var().starts_with("POLYCELL_"));
        }
    }
}
