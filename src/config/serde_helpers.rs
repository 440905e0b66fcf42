use super::ConfigError;
use std::path::PathBuf;

/// Source of environment variables. `std::env::var` in production, a map in tests.
pub trait EnvLookup {
    fn get(&self, name: &str) -> Option<String>;
}

impl<F> EnvLookup for F
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, name: &str) -> Option<String> {
        self(name)
    }
}

/// Reads the real process environment.
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Loads and parses an environment variable.
/// Returns Ok(()) if the variable doesn't exist (keeps default).
pub fn load_env_var<T>(env: &impl EnvLookup, name: &str, target: &mut T) -> Result<(), ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(value) = env.get(name) {
        *target = value
            .trim()
            .parse()
            .map_err(|e| ConfigError::EnvError(format!("Invalid {name}: {e}")))?;
    }
    Ok(())
}

/// Like [`load_env_var`] for optional settings; an empty value clears the option.
pub fn load_env_var_opt<T>(
    env: &impl EnvLookup,
    name: &str,
    target: &mut Option<T>,
) -> Result<(), ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(value) = env.get(name) {
        let value = value.trim();
        *target = if value.is_empty() {
            None
        } else {
            Some(
                value
                    .parse()
                    .map_err(|e| ConfigError::EnvError(format!("Invalid {name}: {e}")))?,
            )
        };
    }
    Ok(())
}

/// Booleans accept `1/0`, `true/false`, `yes/no`, `on/off`.
fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::EnvError(format!(
            "Invalid {name}: {value} (expected true or false)"
        ))),
    }
}

pub fn load_env_bool(env: &impl EnvLookup, name: &str, target: &mut bool) -> Result<(), ConfigError> {
    if let Some(value) = env.get(name) {
        *target = parse_bool(name, &value)?;
    }
    Ok(())
}

pub fn load_env_bool_opt(
    env: &impl EnvLookup,
    name: &str,
    target: &mut Option<bool>,
) -> Result<(), ConfigError> {
    if let Some(value) = env.get(name) {
        *target = if value.trim().is_empty() {
            None
        } else {
            Some(parse_bool(name, &value)?)
        };
    }
    Ok(())
}

pub fn load_env_string(env: &impl EnvLookup, name: &str, target: &mut String) {
    if let Some(value) = env.get(name) {
        *target = value;
    }
}

pub fn load_env_string_opt(env: &impl EnvLookup, name: &str, target: &mut Option<String>) {
    if let Some(value) = env.get(name) {
        *target = (!value.is_empty()).then_some(value);
    }
}

pub fn load_env_path_opt(env: &impl EnvLookup, name: &str, target: &mut Option<PathBuf>) {
    if let Some(value) = env.get(name) {
        *target = (!value.is_empty()).then(|| PathBuf::from(value));
    }
}
