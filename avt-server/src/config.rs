//! Command-line configuration

use clap::Parser;
use std::path::PathBuf;

use avt_common::config::{database_path, resolve_data_folder, DATA_FOLDER_ENV};

/// Command-line arguments for avt-server
#[derive(Parser, Debug, Clone)]
#[command(name = "avt-server")]
#[command(about = "Apprentice visit tracking service")]
#[command(version)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "3000", env = "AVT_PORT")]
    pub port: u16,

    /// Address to bind
    #[arg(short, long, default_value = "127.0.0.1", env = "AVT_BIND")]
    pub bind: String,

    /// Folder holding avt.db (overrides config file and OS default)
    #[arg(short, long, env = DATA_FOLDER_ENV)]
    pub data_folder: Option<PathBuf>,

    /// Username of the manager account created when no user exists yet
    #[arg(long, env = "AVT_INIT_MANAGER_USERNAME")]
    pub init_manager_username: Option<String>,

    /// Password of the bootstrap manager account
    #[arg(long, env = "AVT_INIT_MANAGER_PASSWORD", hide_env_values = true)]
    pub init_manager_password: Option<String>,

    /// Email of the bootstrap manager account
    #[arg(long, default_value = "manager@avt.local", env = "AVT_INIT_MANAGER_EMAIL")]
    pub init_manager_email: String,
}

impl Args {
    /// Resolved database file path
    pub fn database_path(&self) -> PathBuf {
        let folder = resolve_data_folder(self.data_folder.as_deref(), DATA_FOLDER_ENV, true);
        database_path(&folder)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    /// Bootstrap credentials, when both were supplied
    pub fn init_manager(&self) -> Option<(&str, &str)> {
        match (&self.init_manager_username, &self.init_manager_password) {
            (Some(username), Some(password)) => Some((username.as_str(), password.as_str())),
            _ => None,
        }
    }
}
