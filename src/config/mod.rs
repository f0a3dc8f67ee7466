//! Environment and dotenv variable sources.

pub mod dotenv;
pub mod env;

pub use dotenv::{DEFAULT_DOTENV_FILE, DotEnv, MergedEnv};
pub use env::{MemoryEnv, ProcessEnv, VarSource, parse_bool};
