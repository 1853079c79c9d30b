use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use circa_client::draft::{DraftStore, FileDraftStore, DRAFT_KEY};
use circa_client::{
    guard, AuthFlow, CircaClient, CircaConfig, CompleteOutcome, ConnectOutcome, GuardVerdict,
    LocalWallet, Result, Route, SessionStatus, VerifyOutcome,
};

const DEFAULT_API_URL: &str = "http://localhost:8080";

/// circa — command-line client for the Circa savings circles API.
#[derive(Parser, Debug)]
#[command(name = "circa", version)]
struct Cli {
    /// Base URL of the Circa API server (falls back to CIRCA_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Where the sign-up draft file lives (falls back to CIRCA_DRAFT_PATH)
    #[arg(long, global = true)]
    draft_path: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Begin sign-up: submit your profile and get a magic link by email
    Signup(SignupArgs),

    /// Request a sign-in magic link for an existing account
    Login(LoginArgs),

    /// Redeem a magic link (or bare token) from your inbox
    Verify(VerifyArgs),

    /// Attach a wallet and sign the challenge to finish sign-up
    ConnectWallet(ConnectWalletArgs),

    /// Show who is signed in
    Whoami,

    /// End the current session
    Logout,

    /// Create a savings circle
    CreateCircle(CreateCircleArgs),
}

/// Arguments for the `signup` subcommand.
#[derive(Parser, Debug)]
struct SignupArgs {
    /// Full name; falls back to the saved draft
    #[arg(long)]
    full_name: Option<String>,

    /// Email the magic link is sent to; falls back to the saved draft
    #[arg(long)]
    email: Option<String>,

    /// Public display name; falls back to the saved draft
    #[arg(long)]
    display_name: Option<String>,
}

/// Arguments for the `login` subcommand.
#[derive(Parser, Debug)]
struct LoginArgs {
    /// Email of the registered account
    #[arg(long)]
    email: String,
}

/// Arguments for the `verify` subcommand.
#[derive(Parser, Debug)]
struct VerifyArgs {
    /// The emailed magic link, or just its token
    link: String,
}

/// Arguments for the `connect-wallet` subcommand.
#[derive(Parser, Debug)]
struct ConnectWalletArgs {
    /// Hex private key of the signing wallet (falls back to CIRCA_PRIVATE_KEY)
    #[arg(long)]
    private_key: Option<String>,
}

/// Arguments for the `create-circle` subcommand.
#[derive(Parser, Debug)]
struct CreateCircleArgs {
    /// Name of the circle
    #[arg(long)]
    name: String,

    /// Optional description
    #[arg(long)]
    description: Option<String>,
}

#[tokio::main]
async fn main() {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("failed to install rustls crypto provider");

    let _ = dotenvy::dotenv(); // load .env if present

    let cli = Cli::parse();

    // Initialize tracing
    let filter = cli
        .log_level
        .parse::<tracing_subscriber::filter::LevelFilter>()
        .unwrap_or(tracing_subscriber::filter::LevelFilter::INFO);

    tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let api_url = cli
        .api_url
        .clone()
        .or_else(|| std::env::var("CIRCA_API_URL").ok())
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());

    let client = match CircaClient::new(CircaConfig::new(api_url)) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            tracing::error!(error = %e, "invalid API URL");
            std::process::exit(1);
        }
    };

    let draft_path = cli
        .draft_path
        .clone()
        .or_else(|| std::env::var("CIRCA_DRAFT_PATH").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(format!("{DRAFT_KEY}.json")));
    let drafts: Arc<dyn DraftStore> = Arc::new(FileDraftStore::new(draft_path));

    match cli.command {
        Command::Signup(args) => {
            if let Err(e) = run_signup(&client, drafts, args).await {
                tracing::error!(error = %e, "signup failed");
                std::process::exit(1);
            }
        }

        Command::Login(args) => {
            if let Err(e) = run_login(&client, args).await {
                tracing::error!(error = %e, "login failed");
                std::process::exit(1);
            }
        }

        Command::Verify(args) => {
            if let Err(e) = run_verify(&client, drafts, args).await {
                tracing::error!(error = %e, "verify failed");
                std::process::exit(1);
            }
        }

        Command::ConnectWallet(args) => {
            if let Err(e) = run_connect_wallet(&client, drafts, args).await {
                tracing::error!(error = %e, "connect-wallet failed");
                std::process::exit(1);
            }
        }

        Command::Whoami => {
            if let Err(e) = run_whoami(&client).await {
                tracing::error!(error = %e, "whoami failed");
                std::process::exit(1);
            }
        }

        Command::Logout => {
            if let Err(e) = run_logout(&client).await {
                tracing::error!(error = %e, "logout failed");
                std::process::exit(1);
            }
        }

        Command::CreateCircle(args) => {
            if let Err(e) = run_create_circle(&client, args).await {
                tracing::error!(error = %e, "create-circle failed");
                std::process::exit(1);
            }
        }
    }
}

async fn run_signup(
    client: &Arc<CircaClient>,
    drafts: Arc<dyn DraftStore>,
    args: SignupArgs,
) -> Result<()> {
    if let GuardVerdict::Redirect(route) = guard(client, Route::Signup).await {
        println!("Already signed in; continue at {}.", route.path());
        return Ok(());
    }

    let flow = AuthFlow::new(client.clone(), None, drafts);

    let draft = flow.prefill()?;
    let resuming = draft.is_some()
        && (args.full_name.is_none() || args.email.is_none() || args.display_name.is_none());
    let full_name = args
        .full_name
        .or_else(|| draft.as_ref().map(|d| d.full_name.clone()));
    let email = args.email.or_else(|| draft.as_ref().map(|d| d.email.clone()));
    let display_name = args
        .display_name
        .or_else(|| draft.as_ref().map(|d| d.display_name.clone()));

    let (Some(full_name), Some(email), Some(display_name)) = (full_name, email, display_name)
    else {
        tracing::error!("--full-name, --email and --display-name are required (no saved draft to fall back on)");
        std::process::exit(1);
    };
    if resuming {
        println!("Resuming saved sign-up draft.");
    }

    let message = flow.submit_profile(&full_name, &email, &display_name).await?;
    println!("{message}");
    println!("Redeem the link from your inbox with: circa verify <link>");
    Ok(())
}

async fn run_login(client: &Arc<CircaClient>, args: LoginArgs) -> Result<()> {
    if let GuardVerdict::Redirect(route) = guard(client, Route::Signin).await {
        println!("Already signed in; continue at {}.", route.path());
        return Ok(());
    }

    let message = client.login(&args.email).await?;
    println!("{message}");
    Ok(())
}

async fn run_verify(
    client: &Arc<CircaClient>,
    drafts: Arc<dyn DraftStore>,
    args: VerifyArgs,
) -> Result<()> {
    if let GuardVerdict::Redirect(route) = guard(client, Route::Verify).await {
        println!("Already signed in; continue at {}.", route.path());
        return Ok(());
    }

    let flow = AuthFlow::new(client.clone(), None, drafts);
    match flow.redeem_token(&args.link).await {
        VerifyOutcome::SignedIn => {
            println!("Email verified. You are signed in; continue at /app.");
        }
        VerifyOutcome::WalletRequired => {
            println!("Email verified. Finish sign-up with: circa connect-wallet");
        }
        VerifyOutcome::MissingToken => {
            tracing::error!("no token found in that link");
            std::process::exit(1);
        }
        VerifyOutcome::Failed { message } => {
            tracing::error!("verification failed: {message}");
            std::process::exit(1);
        }
    }
    Ok(())
}

async fn run_connect_wallet(
    client: &Arc<CircaClient>,
    drafts: Arc<dyn DraftStore>,
    args: ConnectWalletArgs,
) -> Result<()> {
    if let GuardVerdict::Redirect(route) = guard(client, Route::ConnectWallet).await {
        println!("Already signed in; continue at {}.", route.path());
        return Ok(());
    }

    let private_key = match args
        .private_key
        .or_else(|| std::env::var("CIRCA_PRIVATE_KEY").ok())
    {
        Some(key) => key,
        None => {
            tracing::error!("CIRCA_PRIVATE_KEY environment variable or --private-key is required");
            std::process::exit(1);
        }
    };
    let wallet = LocalWallet::from_hex_key(&private_key)?;
    println!("Using wallet {}.", wallet.address());

    let flow = AuthFlow::new(client.clone(), Some(Arc::new(wallet)), drafts);
    flow.enter_wallet_connect()?;

    match flow.connect_wallet().await? {
        ConnectOutcome::Cancelled => {
            println!("Wallet connection cancelled.");
            return Ok(());
        }
        ConnectOutcome::Connected { address } => {
            println!("Connected {address}; signing the challenge.");
        }
    }

    match flow.sign_and_complete().await? {
        CompleteOutcome::Done => {
            println!("Account created successfully! Continue at /app.");
        }
        CompleteOutcome::Cancelled => {
            println!("Signing cancelled.");
        }
        CompleteOutcome::SessionExpired => {
            tracing::error!("signup session expired; start again with: circa signup");
            std::process::exit(1);
        }
    }
    Ok(())
}

async fn run_whoami(client: &Arc<CircaClient>) -> Result<()> {
    match client.check_session().await {
        SessionStatus::Authenticated(Some(profile)) => {
            println!(
                "Signed in as {} ({})",
                profile.display_name.as_deref().unwrap_or("unnamed"),
                profile.address
            );
            println!("  id:           {}", profile.id);
            println!("  member since: {}", profile.created_at);
        }
        SessionStatus::Authenticated(None) => {
            println!("Signed in.");
        }
        SessionStatus::Unauthenticated => {
            println!("Not signed in.");
            std::process::exit(1);
        }
    }
    Ok(())
}

async fn run_logout(client: &Arc<CircaClient>) -> Result<()> {
    client.logout().await?;
    println!("Signed out.");
    Ok(())
}

async fn run_create_circle(client: &Arc<CircaClient>, args: CreateCircleArgs) -> Result<()> {
    if let GuardVerdict::Redirect(_) = guard(client, Route::CreateCircle).await {
        tracing::error!("no active session; sign up first: circa signup");
        std::process::exit(1);
    }

    let group = client.create_group(&args.name, args.description).await?;
    println!("Group created successfully: {} (id {})", group.name, group.id);
    Ok(())
}
