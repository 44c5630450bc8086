use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod args;


pub use args::{CloseArgs, GetArgs, NavigateArgs, OpenArgs, SearchArgs};

#[derive(Debug, Parser)]
#[command(name = "tabseek")]
#[command(about = "Search open tabs by title and page text", version)]
pub struct Cli {
    #[arg(long, default_value = ".tabseek")]
    pub root: PathBuf,

    /// Browser session fixture; defaults to `<root>/session.json`.
    #[arg(long, value_name = "FILE")]
    pub session: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Index every http(s) tab of the focused window.
    Install,
    Search(SearchArgs),
    Get(GetArgs),
    Open(OpenArgs),
    Close(CloseArgs),
    Navigate(NavigateArgs),
    Status,
}

impl Commands {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Search(_) => "search",
            Self::Get(_) => "get",
            Self::Open(_) => "open",
            Self::Close(_) => "close",
            Self::Navigate(_) => "navigate",
            Self::Status => "status",
        }
    }
}
