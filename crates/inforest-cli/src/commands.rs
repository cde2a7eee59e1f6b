use colored::Colorize;
use inforest_server::{InforestServer, ServerConfig, SignedTokenAuth};
use inforest_types::wire::*;
use inforest_types::UserId;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::cli::*;
use crate::client::ForestClient;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    if !matches!(cli.command, Command::Serve(_)) {
        init_tracing(if cli.verbose { "debug" } else { "warn" });
    }

    let client = ForestClient::new(&cli.server, cli.token);
    let format = cli.format;
    match cli.command {
        Command::Serve(args) => cmd_serve(args).await,
        Command::Token(args) => cmd_token(args, &format),
        Command::Forests(args) => {
            let req = GetForestsByUserRequest { include_children: args.children };
            let resp: GetForestsByUserResponse = client.call("GetForestsByUser", &req).await?;
            emit(&format, &resp, |r| {
                if r.forests.is_empty() {
                    println!("No forests.");
                }
                for forest in &r.forests {
                    print_forest(forest);
                }
            })
        }
        Command::CreateForest(args) => {
            let root = TreeMsg {
                id: args.root_id,
                name: args.root_name.unwrap_or_else(|| args.name.clone()),
                url: args.root_url,
                children: Vec::new(),
            };
            let req = CreateForestRequest {
                name: args.name,
                description: args.description,
                root: Some(root),
            };
            let forest: ForestMsg = client.call("CreateForest", &req).await?;
            emit(&format, &forest, |f| {
                println!("{} Created forest {} ({})", "✓".green().bold(), f.name.bold(), f.id.cyan());
            })
        }
        Command::GetForest(args) => {
            let req = GetForestRequest { forest_id: args.forest_id, include_children: args.children };
            let resp: GetForestResponse = client.call("GetForest", &req).await?;
            emit(&format, &resp, |r| print_forest(&r.forest))
        }
        Command::UpdateForest(args) => {
            let req = UpdateForestRequest {
                forest_id: args.forest_id,
                name: args.name,
                description: args.description,
            };
            let forest: ForestMsg = client.call("UpdateForest", &req).await?;
            emit(&format, &forest, |f| {
                println!("{} Updated forest {}", "✓".green().bold(), f.id.cyan());
                print_forest(f);
            })
        }
        Command::DeleteForest(args) => {
            let req = DeleteForestRequest { forest_id: args.forest_id.clone() };
            let resp: DeleteForestResponse = client.call("DeleteForest", &req).await?;
            emit(&format, &resp, |_| {
                println!("{} Deleted forest {} with its trees and memos", "✓".green().bold(), args.forest_id.cyan());
            })
        }
        Command::CreateTree(args) => {
            let req = CreateTreeRequest {
                parent_id: args.parent_id,
                id: args.id,
                name: args.name,
                url: args.url,
            };
            let resp: CreateTreeResponse = client.call("CreateTree", &req).await?;
            emit(&format, &resp, |r| {
                println!("{} Created tree {} with an empty memo", "✓".green().bold(), r.tree.id.cyan());
            })
        }
        Command::GetTree(args) => {
            let req = GetTreeRequest { tree_id: args.tree_id, include_children: args.children };
            let tree: TreeMsg = client.call("GetTree", &req).await?;
            emit(&format, &tree, |t| {
                for line in tree_lines(t) {
                    println!("{line}");
                }
            })
        }
        Command::UpdateTree(args) => {
            let req = UpdateTreeRequest { tree_id: args.tree_id, name: args.name, url: args.url };
            let tree: TreeMsg = client.call("UpdateTree", &req).await?;
            emit(&format, &tree, |t| {
                println!("{} Updated tree {} ({})", "✓".green().bold(), t.id.cyan(), t.name);
            })
        }
        Command::DeleteTree(args) => {
            let req = DeleteTreeRequest { tree_id: args.tree_id.clone(), cascade: args.cascade };
            let resp: DeleteTreeResponse = client.call("DeleteTree", &req).await?;
            emit(&format, &resp, |_| {
                let scope = if args.cascade { " and its subtree" } else { "" };
                println!("{} Deleted tree {}{}", "✓".green().bold(), args.tree_id.cyan(), scope);
            })
        }
        Command::GetMemo(args) => {
            let req = GetMemoRequest { tree_id: args.tree_id };
            let memo: MemoMsg = client.call("GetMemo", &req).await?;
            emit(&format, &memo, print_memo)
        }
        Command::UpdateMemo(args) => {
            let req = UpdateMemoRequest { tree_id: args.tree_id, content: args.content };
            let memo: MemoMsg = client.call("UpdateMemo", &req).await?;
            emit(&format, &memo, print_memo)
        }
    }
}

fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => {
            let mut config = ServerConfig::default();
            config.apply_env(|key| std::env::var(key).ok())?;
            config
        }
    };
    if let Some(bind) = &args.bind {
        config.bind_addr = bind.parse()?;
    }
    init_tracing(&config.log_filter);

    let server = InforestServer::in_memory(config)?;
    server.serve().await?;
    Ok(())
}

fn cmd_token(args: TokenArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let user = UserId::new(args.user)?;
    let token = SignedTokenAuth::new(&args.secret).mint(&user);
    match format {
        OutputFormat::Json => println!("{}", serde_json::json!({ "user_id": user.as_str(), "token": token })),
        OutputFormat::Text => println!("{token}"),
    }
    Ok(())
}

/// Print `value` as JSON, or hand it to `text` for the human format.
fn emit<T: Serialize>(format: &OutputFormat, value: &T, text: impl FnOnce(&T)) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => text(value),
    }
    Ok(())
}

fn print_forest(forest: &ForestMsg) {
    println!("{} {}", forest.name.bold(), format!("({})", forest.id).dimmed());
    println!("  Owner: {}", forest.user_id);
    if !forest.description.is_empty() {
        println!("  {}", forest.description);
    }
    if let Some(root) = &forest.root {
        for line in tree_lines(root) {
            println!("  {line}");
        }
    }
}

fn print_memo(memo: &MemoMsg) {
    println!("Memo for {} (v{})", memo.tree_id.cyan(), memo.version.to_string().yellow());
    match &memo.content {
        Some(content) => println!("{content}"),
        None => println!("{}", "(empty)".dimmed()),
    }
}

/// One line per node, indented by depth, parent before children.
fn tree_lines(tree: &TreeMsg) -> Vec<String> {
    let mut out = Vec::new();
    collect_lines(tree, 0, &mut out);
    out
}

fn collect_lines(tree: &TreeMsg, depth: usize, out: &mut Vec<String>) {
    let url = if tree.url.is_empty() { String::new() } else { format!("  {}", tree.url) };
    out.push(format!("{}{} {}{}", "  ".repeat(depth), tree.id, tree.name, url));
    for child in &tree.children {
        collect_lines(child, depth + 1, out);
    }
}
