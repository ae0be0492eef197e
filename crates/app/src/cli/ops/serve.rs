use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Args;

use strata::config::{Config, ConfigError};
use strata::process::ProcessError;

#[derive(Args, Debug, Clone)]
pub struct Serve {
    /// Override the listen address (default from config)
    #[arg(long)]
    pub listen_addr: Option<SocketAddr>,

    /// Override the SQLite database path
    #[arg(long)]
    pub sqlite_path: Option<PathBuf>,

    /// Directory for log files (logs to stdout only if not set)
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Override the log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Keep everything in memory, nothing survives a restart
    #[arg(long)]
    pub ephemeral: bool,
}

impl Serve {
    /// Layer the flags over the loaded config
    fn apply(&self, mut config: Config) -> Result<Config, ConfigError> {
        if let Some(addr) = self.listen_addr {
            config.listen_addr = addr;
        }
        if let Some(path) = &self.sqlite_path {
            config.sqlite_path = Some(path.clone());
        }
        if let Some(dir) = &self.log_dir {
            config.log_dir = Some(dir.clone());
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
            config.log_level()?;
        }
        if self.ephemeral {
            config.ephemeral = true;
        }
        Ok(config)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("service failed: {0}")]
    Process(#[from] ProcessError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Serve {
    type Error = ServeError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let config = self.apply(ctx.load_config()?)?;
        strata::spawn_service(&config).await?;
        Ok("service ended".to_string())
    }
}
