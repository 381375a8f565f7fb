//! Source preparation for the ephemeral backends.
//!
//! All transformations here are pure string rewrites that run before any
//! process is spawned. They are deliberately line-local heuristics rather
//! than full parsers: a fragment whose trailing expression spans several
//! lines without ending in `}` may be misclassified.
//!
//! - `script` - return-wrapping and import hoisting for JS-family code
//! - `rust` - definition/body separation for the compiled backend

mod rust;
mod script;

pub use rust::{RustSource, defines_entry_point, split_rust_source};
pub use script::{Dialect, ExtractedImports, extract_imports, transform_for_return};
