use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "inforest",
    about = "inforest: forests of trees with per-user memos",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Base URL of a running inforest server
    #[arg(long, global = true, env = "INFOREST_SERVER", default_value = "http://127.0.0.1:50051")]
    pub server: String,

    /// Bearer token (see `inforest token`)
    #[arg(long, global = true, env = "INFOREST_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the inforest server
    Serve(ServeArgs),
    /// Mint a bearer token for a user
    Token(TokenArgs),
    /// List your forests
    Forests(ForestsArgs),
    /// Create a forest with its root tree
    CreateForest(CreateForestArgs),
    /// Show a forest
    GetForest(GetForestArgs),
    /// Rename or re-describe a forest
    UpdateForest(UpdateForestArgs),
    /// Delete a forest, its trees, and their memos
    DeleteForest(DeleteForestArgs),
    /// Add a tree under a parent
    CreateTree(CreateTreeArgs),
    /// Show a tree
    GetTree(GetTreeArgs),
    /// Rename or re-point a tree
    UpdateTree(UpdateTreeArgs),
    /// Delete a tree and its memos
    DeleteTree(DeleteTreeArgs),
    /// Show your memo for a tree
    GetMemo(GetMemoArgs),
    /// Replace your memo for a tree
    UpdateMemo(UpdateMemoArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Override the bind address
    #[arg(long)]
    pub bind: Option<String>,
}

#[derive(Args)]
pub struct TokenArgs {
    pub user: String,
    #[arg(long, env = "INFOREST_AUTH_SECRET", hide_env_values = true)]
    pub secret: String,
}

#[derive(Args)]
pub struct ForestsArgs {
    #[arg(long)]
    pub children: bool,
}

#[derive(Args)]
pub struct CreateForestArgs {
    pub name: String,
    /// Id of the root tree
    #[arg(long)]
    pub root_id: String,
    #[arg(long, default_value = "")]
    pub description: String,
    #[arg(long)]
    pub root_name: Option<String>,
    #[arg(long, default_value = "")]
    pub root_url: String,
}

#[derive(Args)]
pub struct GetForestArgs {
    pub forest_id: String,
    #[arg(long)]
    pub children: bool,
}

#[derive(Args)]
pub struct UpdateForestArgs {
    pub forest_id: String,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
}

#[derive(Args)]
pub struct DeleteForestArgs {
    pub forest_id: String,
}

#[derive(Args)]
pub struct CreateTreeArgs {
    pub parent_id: String,
    pub id: String,
    pub name: String,
    #[arg(long, default_value = "")]
    pub url: String,
}

#[derive(Args)]
pub struct GetTreeArgs {
    pub tree_id: String,
    #[arg(long)]
    pub children: bool,
}

#[derive(Args)]
pub struct UpdateTreeArgs {
    pub tree_id: String,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub url: Option<String>,
}

#[derive(Args)]
pub struct DeleteTreeArgs {
    pub tree_id: String,
    /// Also delete every descendant
    #[arg(short = 'r', long)]
    pub cascade: bool,
}

#[derive(Args)]
pub struct GetMemoArgs {
    pub tree_id: String,
}

#[derive(Args)]
pub struct UpdateMemoArgs {
    pub tree_id: String,
    pub content: String,
}
