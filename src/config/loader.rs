use std::{
    fs,
    path::{Path, PathBuf},
};

use directories::BaseDirs;

use crate::{Error, Result};

use super::{Config, CONFIG_DIR_NAME, CONFIG_FILE_NAME};

pub fn config_path() -> Result<PathBuf> {
    let base = BaseDirs::new()
        .ok_or_else(|| Error::Config("cannot determine the home directory".into()))?;
    Ok(base
        .home_dir()
        .join(CONFIG_DIR_NAME)
        .join(CONFIG_FILE_NAME))
}

/// Default log sink, next to the config file.
pub fn default_log_path() -> Result<PathBuf> {
    Ok(config_path()?.with_file_name("signwx.log"))
}

pub fn load_or_default() -> Result<Config> {
    let path = config_path()?;
    if !path.exists() {
        let cfg = Config::default();
        cfg.save_to_path(&path)?;
        super::validate(&cfg)?;
        return Ok(cfg);
    }
    load_from_path(&path)
}

pub fn load_from_path(path: &Path) -> Result<Config> {
    if !path.exists() {
        let cfg = Config::default();
        super::validate(&cfg)?;
        return Ok(cfg);
    }

    let raw = fs::read_to_string(path)?;
    parse(&raw)
}

pub fn save(config: &Config) -> Result<()> {
    let path = config_path()?;
    save_to_path(config, &path)
}

pub fn save_to_path(config: &Config, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut contents = serde_json::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("cannot serialize config: {e}")))?;
    contents.push('\n');
    fs::write(path, contents)?;
    Ok(())
}

pub fn parse(raw: &str) -> Result<Config> {
    let cfg: Config =
        serde_json::from_str(raw).map_err(|e| Error::Config(format!("config json: {e}")))?;
    super::validate(&cfg)?;
    Ok(cfg)
}
