use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::{ClientConfig, ENV_BACKEND_URL};
use crate::controller::Tab;
use crate::error::ConfigError;

#[derive(Parser)]
#[command(name = "travel-planner")]
#[command(version)]
#[command(about = "Terminal client for the travel planner assistant")]
pub struct Args {
    /// Backend base URL (defaults to http://localhost:5000)
    #[arg(long, global = true, env = ENV_BACKEND_URL)]
    pub backend_url: Option<String>,

    /// Optional TOML config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log filter when RUST_LOG is unset (e.g. info, debug)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Check once whether the backend is reachable
    Probe,
    /// Upload an image and print the extracted itinerary
    Upload {
        /// Ticket, booking or screenshot image
        path: PathBuf,
    },
    /// Upload an image, then show one tab of the resulting session
    Session {
        path: PathBuf,
        #[arg(long, value_enum, default_value = "plan")]
        tab: TabArg,
    },
    /// Join the group chat; stdin lines are sent, incoming messages printed
    Chat {
        /// Name shown next to your messages
        #[arg(long)]
        name: Option<String>,
    },
    /// Print the built-in sample itinerary
    Sample,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum TabArg {
    Plan,
    Expense,
}

impl From<TabArg> for Tab {
    fn from(arg: TabArg) -> Self {
        match arg {
            TabArg::Plan => Tab::Plan,
            TabArg::Expense => Tab::Expense,
        }
    }
}

/// Build the client config from the file, environment and flags.
///
/// `--backend-url` (or its env fallback) wins over the config file. The
/// base URL is validated only once every layer has been applied.
pub fn resolve_config(args: &Args) -> Result<ClientConfig, ConfigError> {
    let mut config = ClientConfig::load(args.config.as_deref())?;
    if let Some(url) = args.backend_url.as_deref().filter(|u| !u.trim().is_empty()) {
        config = config.with_base_url(url);
    }
    if let Command::Chat { name: Some(name) } = &args.command {
        config = config.with_display_name(name.clone());
    }
    config.validate()?;
    Ok(config)
}
