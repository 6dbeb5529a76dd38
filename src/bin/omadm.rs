//! OMA DM update server CLI binary.
//!
//! # Commands
//!
//! - `server` - Start the HTTP protocol server
//! - `decode` - Decode a WBXML document to its textual form
//! - `encode` - Encode a textual document to WBXML
//! - `check` - Evaluate update eligibility for a build string

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use omadm::{
    create_router, dm,
    server::AppState,
    wbxml::{self, Element, TokenTable},
    Config, PackageRegistry, VERSION,
};

#[derive(Parser)]
#[command(name = "omadm")]
#[command(version = VERSION)]
#[command(about = "OMA DM update server for legacy device fleets", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP protocol server
    Server {
        /// Listen port
        #[arg(short, long, default_value = "8080")]
        port: u16,

        /// Listen host
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Bind to all interfaces
        #[arg(long)]
        bind_all: bool,

        /// Config file path (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Package manifest path (overrides config)
        #[arg(short, long)]
        manifest: Option<PathBuf>,

        /// Enable verbose logging
        #[arg(short, long)]
        verbose: bool,
    },

    /// Decode WBXML to the textual form
    Decode {
        /// Input file path (or - for stdin)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Output file path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Encode the textual form to WBXML
    Encode {
        /// Input file path (or - for stdin)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Output file path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Evaluate update eligibility for a device build
    Check {
        /// Device build string (e.g. Nova-3.0.5-64)
        build: String,

        /// Package manifest path
        #[arg(short, long, default_value = "packages/manifest.json")]
        manifest: PathBuf,

        /// Download base URL
        #[arg(long, default_value = "https://update.example.net")]
        base_url: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Server {
            port,
            host,
            bind_all,
            config,
            manifest,
            verbose,
        } => cmd_server(port, host, bind_all, config, manifest, verbose),

        Commands::Decode { file, output } => cmd_decode(file, output),

        Commands::Encode { file, output } => cmd_encode(file, output),

        Commands::Check {
            build,
            manifest,
            base_url,
        } => cmd_check(&build, &manifest, &base_url),
    }
}

fn cmd_server(
    port: u16,
    host: String,
    bind_all: bool,
    config_path: Option<PathBuf>,
    manifest: Option<PathBuf>,
    verbose: bool,
) -> anyhow::Result<()> {
    let log_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    let mut config = match config_path {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env(),
    };
    if let Some(path) = manifest {
        config.packages.manifest = path;
    }

    let mut server_config = config.to_server_config();
    if bind_all {
        server_config = server_config.with_addr(format!("0.0.0.0:{port}").parse()?);
    } else {
        server_config = server_config.with_addr(format!("{host}:{port}").parse()?);
    }

    let registry = if config.packages.manifest.exists() {
        PackageRegistry::load(&config.packages.manifest, &server_config.base_url)?
    } else {
        tracing::warn!(
            manifest = %config.packages.manifest.display(),
            "manifest not found, serving an empty registry"
        );
        PackageRegistry::empty()
    };

    tracing::info!("Starting OMA DM server on {}", server_config.addr);
    tracing::info!("Server ID: {}", server_config.server_id);
    tracing::info!("Packages: {}", registry.len());

    let addr = server_config.addr;
    let state = Arc::new(AppState::new(server_config, registry));
    let app = create_router(state);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;
        Ok::<(), anyhow::Error>(())
    })?;

    Ok(())
}

fn cmd_decode(file: Option<PathBuf>, output: Option<PathBuf>) -> anyhow::Result<()> {
    let data = read_bytes(file)?;
    let table = TokenTable::syncml_dm();
    let tree = wbxml::decode(&data, &table)?;
    write_output(output, tree.to_xml().as_bytes())
}

fn cmd_encode(file: Option<PathBuf>, output: Option<PathBuf>) -> anyhow::Result<()> {
    let data = read_bytes(file)?;
    let text = String::from_utf8(data)?;
    let tree = Element::from_xml(&text)?;
    let table = TokenTable::syncml_dm();
    write_output(output, &wbxml::encode(&tree, &table))
}

fn cmd_check(build: &str, manifest: &Path, base_url: &str) -> anyhow::Result<()> {
    let registry = PackageRegistry::load(manifest, base_url)?;
    let selected = dm::evaluate(build, registry.packages());

    if selected.is_empty() {
        println!("No update applicable for {build}");
        return Ok(());
    }

    println!("{} package(s) applicable for {build}:", selected.len());
    for pkg in selected {
        println!(
            "  {} {} -> {} ({} bytes)\n    {}",
            pkg.name, pkg.version, pkg.target_build, pkg.size, pkg.url
        );
    }
    Ok(())
}

fn read_bytes(file: Option<PathBuf>) -> anyhow::Result<Vec<u8>> {
    match file {
        Some(path) if path.as_os_str() != "-" => Ok(std::fs::read(path)?),
        _ => {
            let mut buf = Vec::new();
            std::io::stdin().read_to_end(&mut buf)?;
            Ok(buf)
        }
    }
}

fn write_output(output: Option<PathBuf>, data: &[u8]) -> anyhow::Result<()> {
    match output {
        Some(path) => std::fs::write(path, data)?,
        None => {
            std::io::stdout().write_all(data)?;
            std::io::stdout().write_all(b"\n")?;
        }
    }
    Ok(())
}
