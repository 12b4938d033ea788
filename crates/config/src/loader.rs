use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{
    env_subst::substitute_env,
    error::{Error, Result},
    schema::CortexConfig,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["cortex.toml", "cortex.yaml", "cortex.yml", "cortex.json"];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<CortexConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Load an explicit path, or discover one in the standard locations.
///
/// Search order:
/// 1. `./cortex.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/cortex/cortex.{toml,yaml,yml,json}` (user-global)
///
/// Returns `CortexConfig::default()` when nothing is found; validation then
/// decides whether that is usable.
pub fn discover_and_load(explicit: Option<&Path>) -> Result<CortexConfig> {
    if let Some(path) = explicit {
        debug!(path = %path.display(), "loading config");
        return load_config(path);
    }
    match find_config_file() {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(&path)
        },
        None => {
            debug!("no config file found, using defaults");
            Ok(CortexConfig::default())
        },
    }
}

/// Returns the user-global config directory (`~/.config/cortex/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "cortex").map(|d| d.config_dir().to_path_buf())
}

fn find_config_file() -> Option<PathBuf> {
    let local = CONFIG_FILENAMES.iter().map(PathBuf::from);
    let global = config_dir()
        .into_iter()
        .flat_map(|dir| CONFIG_FILENAMES.iter().map(move |name| dir.join(name)));
    local.chain(global).find(|p| p.exists())
}

fn parse_config(raw: &str, path: &Path) -> Result<CortexConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => toml::from_str(raw).map_err(|e| Error::parse(path, e)),
        "yaml" | "yml" => serde_yaml::from_str(raw).map_err(|e| Error::parse(path, e)),
        "json" => serde_json::from_str(raw).map_err(|e| Error::parse(path, e)),
        other => Err(Error::UnsupportedFormat(other.to_string())),
    }
}
