use super::Config;
use anyhow::{Context, Result, bail};
use directories::UserDirs;
use std::fs;
use std::path::{Path, PathBuf};

impl Config {
    /// `~/.keepsweep/config.toml`
    pub fn default_path() -> Result<PathBuf> {
        let home = UserDirs::new()
            .map(|u| u.home_dir().to_path_buf())
            .context("Could not find home directory")?;
        Ok(home.join(".keepsweep").join("config.toml"))
    }

    /// Load `explicit` or the default path, then apply env overrides.
    ///
    /// A missing file at the default path yields the built-in defaults; a
    /// missing file the operator named explicitly is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config_path = match explicit {
            Some(path) => path.to_path_buf(),
            None => Self::default_path()?,
        };

        let mut config = if config_path.exists() {
            let contents =
                fs::read_to_string(&config_path).context("Failed to read config file")?;
            toml::from_str::<Config>(&contents)
                .with_context(|| format!("Failed to parse config file {}", config_path.display()))?
        } else if explicit.is_some() {
            bail!("config file {} does not exist", config_path.display());
        } else {
            tracing::debug!(
                "no config at {}, using built-in defaults",
                config_path.display()
            );
            Self::default()
        };
        config.config_path = config_path;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Built-in defaults bound to `explicit` or the default path, for `init`.
    pub fn template(explicit: Option<&Path>) -> Result<Self> {
        let config_path = match explicit {
            Some(path) => path.to_path_buf(),
            None => Self::default_path()?,
        };
        Ok(Self {
            config_path,
            ..Self::default()
        })
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&self.config_path, toml_str).context("Failed to write config file")?;
        Ok(())
    }
}
