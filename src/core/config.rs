mod parsing;
mod settings;
mod types;

pub(crate) use types::{CorsSettings, Settings};
#[cfg(test)]
pub(crate) use types::{ConfigError, Environment};
