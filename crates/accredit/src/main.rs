use accredit_core::AttributeSet;
use accredit_cred::RevealSet;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use accredit::{build_router, initialize_root, EligibilityBackendKind, RootConfig, RootError};

/// Accredit: anonymous attribute credentials with eligibility proofs
///
/// Issues credentials into an accreditation tree, publishes its root and
/// verifies selective-disclosure presentations bound to a challenge.
#[derive(Parser, Debug)]
#[command(name = "accredit", version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create key material, prepare the eligibility backend and save the configuration
    Setup {
        /// Data directory for accredit state
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Eligibility backend: native or snarkjs
        #[arg(long)]
        backend: Option<String>,
    },

    /// Start the HTTP verifier
    Serve {
        /// Bind address
        #[arg(long)]
        bind: Option<String>,

        /// Port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Publish the current accreditation tree root
    PublishRoot,

    /// Issue a sample credential and run a full verification in-process
    Demo {
        /// Attributes to reveal besides the protocol fields
        #[arg(long, value_delimiter = ',', default_value = "name")]
        reveal: Vec<String>,

        /// Birth year of the sample holder
        #[arg(long, default_value = "1990")]
        birth_year: u32,
    },
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new(
            "accredit=debug,accredit_tree=debug,accredit_cred=debug,accredit_zk=debug,accredit_auth=debug,accredit_verify=debug",
        )
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("accredit=info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<RootConfig, RootError> {
    match path {
        Some(p) => RootConfig::load(p),
        None => {
            let default_path = RootConfig::default_config_path();
            RootConfig::load(&default_path)
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = run(cli).await;
    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), RootError> {
    match cli.command {
        Commands::Setup { data_dir, backend } => {
            cmd_setup(cli.config.as_ref(), data_dir, backend).await
        }
        Commands::Serve { bind, port } => cmd_serve(cli.config.as_ref(), bind, port).await,
        Commands::PublishRoot => cmd_publish_root(cli.config.as_ref()),
        Commands::Demo { reveal, birth_year } => {
            cmd_demo(cli.config.as_ref(), reveal, birth_year).await
        }
    }
}

async fn cmd_setup(
    config_path: Option<&PathBuf>,
    data_dir: Option<PathBuf>,
    backend: Option<String>,
) -> Result<(), RootError> {
    let mut config = load_config(config_path)?;

    if let Some(dd) = data_dir {
        config.data_dir = dd;
    }
    if let Some(name) = backend {
        config.eligibility.backend = match name.as_str() {
            "native" => EligibilityBackendKind::Native,
            "snarkjs" => EligibilityBackendKind::Snarkjs,
            other => {
                return Err(RootError::Config(format!(
                    "unknown eligibility backend '{}', expected native or snarkjs",
                    other
                )))
            }
        };
    }

    info!("setting up accredit");

    let state = initialize_root(config.clone())?;
    state.eligibility.prepare().await?;
    let published = state.publish_root()?;

    let save_path = config_path
        .cloned()
        .unwrap_or_else(RootConfig::default_config_path);
    config.save(&save_path)?;

    println!("Accredit set up successfully.");
    println!("  Data dir:    {}", state.config.data_dir.display());
    println!("  Eligibility: {}", state.eligibility.backend().name());
    println!("  Root:        {} (epoch {})", published.root, published.epoch);
    println!("  Config:      {}", save_path.display());

    Ok(())
}

async fn cmd_serve(
    config_path: Option<&PathBuf>,
    bind: Option<String>,
    port: Option<u16>,
) -> Result<(), RootError> {
    let mut config = load_config(config_path)?;
    if let Some(b) = bind {
        config.http.bind = b;
    }
    if let Some(p) = port {
        config.http.port = p;
    }

    let state = Arc::new(initialize_root(config)?);
    if state.current_root()?.is_none() {
        warn!("no accreditation root published yet; logins fail until `accredit publish-root` runs");
    }

    let purge_state = state.clone();
    let purge_every = Duration::from_secs(state.config.challenge.ttl_seconds);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(purge_every);
        loop {
            ticker.tick().await;
            match purge_state.purge_expired_challenges() {
                Ok(0) => {}
                Ok(removed) => info!(removed, "expired challenges purged"),
                Err(e) => warn!(error = %e, "challenge purge failed"),
            }
        }
    });

    let addr = format!("{}:{}", state.config.http.bind, state.config.http.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "HTTP server listening");
    println!("Accredit verifier listening on http://{}", addr);

    axum::serve(listener, build_router(state)).await?;
    Ok(())
}

fn cmd_publish_root(config_path: Option<&PathBuf>) -> Result<(), RootError> {
    let config = load_config(config_path)?;
    let state = initialize_root(config)?;
    let published = state.publish_root()?;
    let tree = state.tree()?;

    println!("Accreditation root published.");
    println!("  Root:     {}", published.root);
    println!("  Epoch:    {}", published.epoch);
    println!("  Occupied: {}/{}", tree.occupied(), tree.capacity());
    Ok(())
}

fn sample_attributes(birth_year: u32) -> Result<AttributeSet, RootError> {
    Ok(AttributeSet::new()
        .with("name", "Sample Holder")?
        .with("birth_year", birth_year.to_string())?
        .with("birth_month", "6")?
        .with("birth_day", "15")?
        .with("expiry_year", "2035")?
        .with("expiry_month", "12")?
        .with("nationality", "FR")?)
}

async fn cmd_demo(
    config_path: Option<&PathBuf>,
    reveal: Vec<String>,
    birth_year: u32,
) -> Result<(), RootError> {
    let config = load_config(config_path)?;
    let state = initialize_root(config)?;
    let today = chrono::Utc::now().date_naive();

    let credential = state.issue(&sample_attributes(birth_year)?)?;
    let published = state.publish_root()?;
    println!("Issued credential at leaf {}.", credential.leaf_index);
    println!("  Root: {} (epoch {})", published.root, published.epoch);

    let challenge = state
        .challenges
        .issue(&credential.binding_keypair.public_key())?;
    let request = state
        .present(
            &credential,
            &RevealSet::with_protocol_fields(reveal),
            &challenge,
            today,
        )
        .await?;

    match state.verifier.verify(&request).await {
        Ok(outcome) => {
            println!("Verification succeeded.");
            println!("  Pseudonym: {}", outcome.pseudonym);
            for (name, value) in &outcome.revealed_attributes {
                println!("  {}: {}", name, value);
            }
        }
        Err(e) => {
            println!("Verification rejected: {} ({})", e.reason_code(), e);
        }
    }
    Ok(())
}
