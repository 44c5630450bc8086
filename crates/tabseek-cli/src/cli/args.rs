use clap::Args;
use tabseek_core::TabId;

#[derive(Debug, Args)]
pub struct SearchArgs {
    #[arg(allow_hyphen_values = true)]
    pub query: String,
}

#[derive(Debug, Args)]
pub struct GetArgs {
    #[arg(required = true, num_args = 1..)]
    pub ids: Vec<TabId>,
}

#[derive(Debug, Args)]
pub struct OpenArgs {
    pub url: String,
    #[arg(long, default_value = "")]
    pub title: String,
    /// Visible page body text.
    #[arg(long, default_value = "")]
    pub text: String,
}

#[derive(Debug, Args)]
pub struct CloseArgs {
    pub id: TabId,
}

#[derive(Debug, Args)]
pub struct NavigateArgs {
    pub id: TabId,
    pub url: String,
    #[arg(long, default_value = "")]
    pub title: String,
    /// Visible page body text.
    #[arg(long, default_value = "")]
    pub text: String,
}
