//! Configuration management for gsplot
//!
//! - **store**: discovers and loads the JSON config file
//! - **schema**: per-feature option declarations and built-in schemas
//! - **resolver**: call-site > config file > default resolution

pub mod resolver;
pub mod schema;
pub mod store;

// Re-export commonly used types
pub use resolver::{ArgValue, CallArgs, ConfigResolver, ResolvedOption, ResolvedParameters, Source};
pub use schema::{FeatureSchema, OptionKind, OptionSpec};
pub use store::{ConfigDocument, ConfigStore, search_paths};
