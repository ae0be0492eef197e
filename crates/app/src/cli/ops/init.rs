use std::path::PathBuf;

use clap::Args;

use strata::config::{Config, ConfigError, CONFIG_FILE_NAME};

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// Where to write the config (defaults to --config, then ./strata.toml)
    #[arg(long)]
    pub path: Option<PathBuf>,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("{0} already exists, pass --force to overwrite")]
    Exists(PathBuf),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Init {
    fn target(&self, config_path: Option<&PathBuf>) -> PathBuf {
        self.path
            .clone()
            .or_else(|| config_path.cloned())
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
    }

    fn write(&self, path: PathBuf) -> Result<String, InitError> {
        if path.exists() && !self.force {
            return Err(InitError::Exists(path));
        }
        let raw = Config::default().to_toml()?;
        std::fs::write(&path, raw).map_err(|e| InitError::Write {
            path: path.clone(),
            source: e,
        })?;
        Ok(format!("wrote default config to {}", path.display()))
    }
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Init {
    type Error = InitError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        self.write(self.target(ctx.config_path.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_writes_loadable_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let init = Init {
            path: None,
            force: false,
        };

        init.write(path.clone()).unwrap();
        assert_eq!(Config::load(&path).unwrap(), Config::default());

        assert!(matches!(init.write(path.clone()), Err(InitError::Exists(_))));

        let forced = Init {
            path: None,
            force: true,
        };
        forced.write(path).unwrap();
    }

    #[test]
    fn test_target_precedence() {
        let init = Init {
            path: None,
            force: false,
        };
        assert_eq!(init.target(None), PathBuf::from(CONFIG_FILE_NAME));

        let from_ctx = PathBuf::from("/etc/strata.toml");
        assert_eq!(init.target(Some(&from_ctx)), from_ctx);

        let explicit = Init {
            path: Some(PathBuf::from("here.toml")),
            force: false,
        };
        assert_eq!(explicit.target(Some(&from_ctx)), PathBuf::from("here.toml"));
    }
}
