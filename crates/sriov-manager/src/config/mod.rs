pub mod cli;
pub mod daemon;
pub mod host;
pub mod settings;

pub use cli::*;
pub use daemon::*;
pub use host::*;
pub use settings::*;

/// Splits a comma-separated prefix list, dropping blank entries.
pub(crate) fn split_prefixes(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|prefix| !prefix.is_empty())
        .map(str::to_string)
        .collect()
}
