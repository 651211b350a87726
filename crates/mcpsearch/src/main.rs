mod web;

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, CommandFactory, Parser, Subcommand};
use mcpsearch_core::autocomplete::{autocomplete_from_gateway, render_autocomplete_script};
use mcpsearch_core::request::{LookupParams, LookupRequest, render_lookup};
use mcpsearch_core::runtime::{
    PathOverrides, ResolutionContext, Runtime, inspect_runtime, resolve_runtime,
};
use mcpsearch_core::store::SqliteGateway;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::web::WebConfig;

#[derive(Debug, Parser)]
#[command(
    name = "mcpsearch",
    version,
    about = "Search the character chronology index by comic or by character"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH")]
    project_root: Option<PathBuf>,
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Print resolved runtime diagnostics")]
    diagnostics: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone)]
struct RuntimeOptions {
    project_root: Option<PathBuf>,
    db: Option<PathBuf>,
    config: Option<PathBuf>,
    diagnostics: bool,
}

impl RuntimeOptions {
    fn from_cli(cli: &Cli) -> Self {
        Self {
            project_root: cli.project_root.clone(),
            db: cli.db.clone(),
            config: cli.config.clone(),
            diagnostics: cli.diagnostics,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Appearance table for a comic abbreviation, e.g. \"IM 73\"")]
    Comic { abbreviation: String },
    #[command(name = "comic-id", about = "Appearance table for a numeric comic id")]
    ComicId { id: i64 },
    #[command(about = "Characters whose name contains TEXT")]
    Search { text: String },
    #[command(about = "Chronology of one character")]
    Figure { id: i64 },
    #[command(about = "Dispatch the way the search page does")]
    Lookup(LookupArgs),
    #[command(about = "Generate the comic autocomplete script")]
    Autocomplete(AutocompleteArgs),
    Status,
    #[command(about = "Serve the search page over HTTP")]
    Serve(ServeArgs),
}

#[derive(Debug, Args)]
struct LookupArgs {
    #[arg(long, value_name = "ID")]
    figure: Option<String>,
    #[arg(long, value_name = "TEXT")]
    search_for_characters: Option<String>,
    #[arg(long, value_name = "ABBREVIATION")]
    search_for_comic: Option<String>,
    #[arg(long, value_name = "ID")]
    comic: Option<String>,
}

#[derive(Debug, Args)]
struct AutocompleteArgs {
    #[arg(long, help = "Drop prefixes with more completions than this")]
    limit: Option<usize>,
    #[arg(long, value_name = "PATH", help = "Write the script here instead of stdout")]
    output: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ServeArgs {
    #[arg(long, value_name = "ADDR")]
    addr: Option<SocketAddr>,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let runtime = RuntimeOptions::from_cli(&cli);

    match cli.command {
        Some(Commands::Comic { abbreviation }) => {
            run_lookup(&runtime, LookupRequest::SearchComic(abbreviation))
        }
        Some(Commands::ComicId { id }) => run_lookup(&runtime, LookupRequest::Comic(id)),
        Some(Commands::Search { text }) => {
            run_lookup(&runtime, LookupRequest::SearchCharacters(text))
        }
        Some(Commands::Figure { id }) => run_lookup(&runtime, LookupRequest::Figure(id)),
        Some(Commands::Lookup(args)) => run_lookup_params(&runtime, args),
        Some(Commands::Autocomplete(args)) => run_autocomplete(&runtime, args),
        Some(Commands::Status) => run_status(&runtime),
        Some(Commands::Serve(args)) => run_serve(&runtime, args),
        None => {
            let mut command = Cli::command();
            command.print_help()?;
            println!();
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(Level::WARN.into())
        .with_env_var("MCPSEARCH_LOG")
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_lookup(runtime: &RuntimeOptions, request: LookupRequest) -> Result<()> {
    let resolved = resolve_runtime_state(runtime)?;
    let gateway = SqliteGateway::open(&resolved.paths.db_path)?;
    let html = render_lookup(&gateway, &request, resolved.config.render_options())?;
    println!("{html}");
    if runtime.diagnostics {
        println!("\n[diagnostics]\n{}", resolved.paths.diagnostics());
    }
    Ok(())
}

fn run_lookup_params(runtime: &RuntimeOptions, args: LookupArgs) -> Result<()> {
    let params = LookupParams {
        figure: args.figure,
        search_for_characters: args.search_for_characters,
        search_for_comic: args.search_for_comic,
        comic: args.comic,
    };
    match LookupRequest::from_params(&params)? {
        Some(request) => run_lookup(runtime, request),
        None => bail!(
            "no lookup selected; pass --figure, --search-for-characters, --search-for-comic or --comic"
        ),
    }
}

fn run_autocomplete(runtime: &RuntimeOptions, args: AutocompleteArgs) -> Result<()> {
    let resolved = resolve_runtime_state(runtime)?;
    let limit = args
        .limit
        .unwrap_or_else(|| resolved.config.autocomplete_limit());
    let gateway = SqliteGateway::open(&resolved.paths.db_path)?;
    let dictionary = autocomplete_from_gateway(&gateway, limit)?;
    let script = render_autocomplete_script(&dictionary)?;

    match args.output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            fs::write(&path, &script)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("autocomplete");
            println!("output: {}", normalize_path(&path));
            println!("keys: {}", dictionary.len());
            println!("limit: {limit}");
        }
        None => println!("{script}"),
    }
    if runtime.diagnostics {
        println!("\n[diagnostics]\n{}", resolved.paths.diagnostics());
    }
    Ok(())
}

fn run_status(runtime: &RuntimeOptions) -> Result<()> {
    let resolved = resolve_runtime_state(runtime)?;
    let paths = &resolved.paths;
    let status = inspect_runtime(paths)?;

    println!("runtime status");
    println!("project_root: {}", normalize_path(&paths.project_root));
    println!(
        "project_root_exists: {}",
        format_flag(status.project_root_exists)
    );
    println!("state_dir_exists: {}", format_flag(status.state_dir_exists));
    println!("db_path: {}", normalize_path(&paths.db_path));
    println!("db_exists: {}", format_flag(status.db_exists));
    println!(
        "db_size_bytes: {}",
        status
            .db_size_bytes
            .map(|size| size.to_string())
            .unwrap_or_else(|| "n/a".to_string())
    );
    println!("config_exists: {}", format_flag(status.config_exists));
    println!(
        "batch_lookups: {}",
        format_flag(resolved.config.search.batch_lookups)
    );
    println!(
        "autocomplete_limit: {}",
        resolved.config.autocomplete_limit()
    );
    if !status.warnings.is_empty() {
        println!("warnings:");
        for warning in &status.warnings {
            println!("  - {warning}");
        }
    }
    if runtime.diagnostics {
        println!("\n[diagnostics]\n{}", paths.diagnostics());
    }

    Ok(())
}

fn run_serve(runtime: &RuntimeOptions, args: ServeArgs) -> Result<()> {
    let resolved = resolve_runtime_state(runtime)?;
    let addr = match args.addr {
        Some(addr) => addr,
        None => resolved.config.addr()?,
    };
    if !resolved.paths.db_path.exists() {
        tracing::warn!(
            db = %resolved.paths.db_path.display(),
            "database is missing; lookups will fail until it exists"
        );
    }
    if runtime.diagnostics {
        println!("[diagnostics]\n{}", resolved.paths.diagnostics());
    }

    let config = WebConfig {
        addr,
        db_path: resolved.paths.db_path.clone(),
        options: resolved.config.render_options(),
        autocomplete_limit: resolved.config.autocomplete_limit(),
    };
    let server = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    server.block_on(web::serve(config))?;
    Ok(())
}

fn resolve_runtime_state(runtime: &RuntimeOptions) -> Result<Runtime> {
    dotenvy::dotenv().ok();

    let context = ResolutionContext::from_process()?;
    let overrides = PathOverrides {
        project_root: runtime.project_root.clone(),
        db_path: runtime.db.clone(),
        config: runtime.config.clone(),
    };

    let initial = resolve_runtime(&context, &overrides)?;
    let project_env = initial.paths.project_root.join(".env");
    if project_env.exists() {
        let _ = dotenvy::from_path_override(&project_env);
        return resolve_runtime(&context, &overrides);
    }
    Ok(initial)
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn format_flag(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}
