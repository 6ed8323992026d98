//! kq-api bootstrap configuration
//!
//! Command-line arguments layered over the TOML config file. Root folder
//! resolution is shared with kq-common.

use clap::Parser;
use kq_common::config::{RootFolderResolver, TomlConfig};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Port used when neither the command line, environment nor TOML sets one
pub const DEFAULT_PORT: u16 = 5780;

/// Command-line arguments for kq-api
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "kq-api")]
#[command(about = "Karaoke event queue and attendance service")]
#[command(version)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "KQ_PORT")]
    pub port: Option<u16>,

    /// Folder holding karaoke.db (also KQ_ROOT_FOLDER)
    #[arg(short, long)]
    pub root_folder: Option<PathBuf>,
}

/// Resolved server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub root_folder: PathBuf,
    pub db_path: PathBuf,
    pub port: u16,
    /// Tracing filter used when RUST_LOG is unset
    pub log_filter: String,
}

impl Config {
    pub fn resolve(args: Args, toml: TomlConfig) -> Self {
        let port = args.port.or(toml.port).unwrap_or(DEFAULT_PORT);
        let log_filter = format!("kq_api={level},kq_common={level},tower_http=info", level = toml.logging.level);
        let resolver = RootFolderResolver::new(args.root_folder, toml);

        Self {
            root_folder: resolver.resolve(),
            db_path: resolver.database_path(),
            port,
            log_filter,
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}
