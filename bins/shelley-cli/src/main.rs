//! shelley-cli: command-line interface to the Shelley wallet engine.
//!
//! Generates and restores wallets, keeps recovery phrases encrypted on
//! disk, and pays through a Blockfrost-backed ledger.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use shelley_core::address::Address;
use shelley_core::constants::LOVELACE_PER_ADA;
use shelley_core::error::LedgerError;
use shelley_ledger::BlockfrostClient;
use shelley_wallet::{
    ChangeOutcome, SaveRequest, SelectionStrategy, SendRequest, UnlockRequest, WalletEngine,
    WalletError,
};
use tracing::debug;
use zeroize::Zeroizing;

use crate::config::{Overrides, Settings};

/// Environment variable consulted before prompting for a password.
const PASSWORD_ENV: &str = "SHELLEY_WALLET_PASSWORD";

/// Shelley command-line wallet.
#[derive(Parser)]
#[command(name = "shelley-cli")]
#[command(version, about = "Self-custodial Cardano wallet")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Network (mainnet or testnet). Overrides SHELLEY_NETWORK.
    #[arg(long, global = true)]
    network: Option<String>,

    /// Wallet directory. Overrides SHELLEY_WALLET_DIR.
    #[arg(long, global = true)]
    wallet_dir: Option<PathBuf>,

    /// Blockfrost API root. Overrides BLOCKFROST_BASE_URL.
    #[arg(long, global = true)]
    blockfrost_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new 24-word wallet.
    Generate(GenerateArgs),
    /// Encrypt and store an existing recovery phrase.
    Save(SaveArgs),
    /// Decrypt and print a stored recovery phrase.
    Unlock(IdArgs),
    /// Print the receive address of a stored wallet.
    Address(IdArgs),
    /// Query the balance of an address.
    Balance(BalanceArgs),
    /// Send lovelace from a stored wallet.
    Send(SendArgs),
}

#[derive(Args)]
struct GenerateArgs {
    /// Also store the new phrase under this wallet id.
    #[arg(long)]
    save: Option<String>,
}

#[derive(Args)]
struct SaveArgs {
    /// Wallet id ([A-Za-z0-9_-], at most 64 characters).
    #[arg(long)]
    id: String,

    /// Recovery phrase. Read from stdin when omitted.
    #[arg(long)]
    phrase: Option<String>,

    /// Replace an existing wallet with the same id.
    #[arg(long)]
    overwrite: bool,
}

#[derive(Args)]
struct IdArgs {
    /// Wallet id.
    #[arg(long)]
    id: String,
}

#[derive(Args)]
struct BalanceArgs {
    /// Bech32 address to query.
    #[arg(long)]
    address: String,
}

#[derive(Args)]
struct SendArgs {
    /// Wallet id to pay from.
    #[arg(long)]
    id: String,

    /// Recipient address.
    #[arg(long)]
    to: String,

    /// Amount in lovelace (1 ADA = 1000000).
    #[arg(long)]
    amount: String,

    /// Coin selection strategy (largest-first or all).
    #[arg(long)]
    strategy: Option<SelectionStrategy>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let overrides = Overrides {
        network: cli.global.network,
        wallet_dir: cli.global.wallet_dir,
        blockfrost_url: cli.global.blockfrost_url,
    };
    let mut settings = Settings::from_env(&overrides)?;

    match cli.command {
        Commands::Generate(args) => generate(&settings, args),
        Commands::Save(args) => save(&settings, args),
        Commands::Unlock(args) => unlock(&settings, args),
        Commands::Address(args) => address(&settings, args),
        Commands::Balance(args) => balance(&settings, args).await,
        Commands::Send(args) => {
            if let Some(strategy) = args.strategy {
                settings.wallet.selection = strategy;
            }
            send(&settings, args).await
        }
    }
}

/// Open the engine over the configured directory and ledger.
fn open_engine(settings: &Settings) -> Result<WalletEngine> {
    debug!(
        network = %settings.wallet.network,
        dir = %settings.wallet.wallets_dir.display(),
        "cli: opening wallet engine"
    );
    let client = Arc::new(
        BlockfrostClient::new(settings.ledger.clone()).context("Failed to build ledger client")?,
    );
    WalletEngine::new(settings.wallet.clone(), client.clone(), client)
        .with_context(|| format!("Failed to open {}", settings.wallet.wallets_dir.display()))
}

/// Generate a fresh phrase, optionally storing it right away.
fn generate(settings: &Settings, args: GenerateArgs) -> Result<()> {
    let engine = open_engine(settings)?;
    let generated = engine.generate_wallet().context("Failed to generate wallet")?;

    println!("\n=== WALLET GENERATED ===");
    println!("Network: {}", settings.wallet.network);
    println!("Address: {}", generated.address);
    println!("\nRECOVERY PHRASE (BACK UP THESE 24 WORDS):");
    println!("  {}", generated.phrase.as_str());
    println!("\nWARNING: This phrase will NOT be shown again.");
    println!("Anyone who has it can spend your funds.");

    if let Some(id) = args.save {
        let password = new_password()?;
        let req = SaveRequest::parse(
            Some(id.as_str()),
            Some(generated.phrase.as_str()),
            Some(password.as_str()),
        )?;
        engine.save_wallet(&req).context("Failed to save wallet")?;
        println!("\nWallet saved as '{id}'.");
    }
    Ok(())
}

/// Encrypt a phrase given on the command line or stdin.
fn save(settings: &Settings, args: SaveArgs) -> Result<()> {
    let phrase = match args.phrase {
        Some(p) => Zeroizing::new(p),
        None => read_phrase()?,
    };
    let password = new_password()?;
    let req = SaveRequest::parse(
        Some(args.id.as_str()),
        Some(phrase.as_str()),
        Some(password.as_str()),
    )?
    .overwrite(args.overwrite);

    let engine = open_engine(settings)?;
    let address = engine.restore(&req.phrase)?.address();
    engine.save_wallet(&req).context("Failed to save wallet")?;

    println!("Wallet '{}' saved.", args.id);
    println!("Address: {address}");
    Ok(())
}

/// Print the stored phrase.
fn unlock(settings: &Settings, args: IdArgs) -> Result<()> {
    let engine = open_engine(settings)?;
    let req = unlock_request(&args.id)?;
    let phrase = engine
        .unlock_wallet(&req)
        .context("Failed to unlock wallet (check password)")?;
    println!("{}", phrase.as_str());
    Ok(())
}

/// Print the receive address of a stored wallet.
fn address(settings: &Settings, args: IdArgs) -> Result<()> {
    let engine = open_engine(settings)?;
    let req = unlock_request(&args.id)?;
    let address = engine
        .wallet_address(&req)
        .context("Failed to unlock wallet (check password)")?;
    println!("{address}");
    Ok(())
}

/// Query and display an address balance.
async fn balance(settings: &Settings, args: BalanceArgs) -> Result<()> {
    settings.require_project_id()?;
    let address: Address = args
        .address
        .trim()
        .parse()
        .with_context(|| format!("Invalid address: {}", args.address))?;
    let engine = open_engine(settings)?;
    let lovelace = engine
        .balance(&address)
        .await
        .context("Balance query failed")?;
    println!("{} ADA ({lovelace} lovelace)", format_ada(lovelace));
    Ok(())
}

/// Build, sign and submit a payment.
async fn send(settings: &Settings, args: SendArgs) -> Result<()> {
    settings.require_project_id()?;
    let password = read_password("Wallet password")?;
    let req = SendRequest::parse(
        Some(args.id.as_str()),
        Some(password.as_str()),
        Some(args.to.as_str()),
        Some(args.amount.as_str()),
        settings.wallet.network,
    )?;

    let engine = open_engine(settings)?;
    let receipt = match engine.build_and_send(&req).await {
        Ok(receipt) => receipt,
        Err(WalletError::Ledger(LedgerError::AmbiguousSubmission(detail))) => bail!(
            "Submission outcome unknown ({detail}). Check the ledger for the \
             transaction before sending again."
        ),
        Err(e) => return Err(e).context("Send failed"),
    };

    println!("\n=== TRANSACTION SUBMITTED ===");
    println!("TxID: {}", receipt.tx_id);
    println!("To: {}", req.recipient);
    println!("Amount: {} ADA ({} lovelace)", format_ada(req.amount), req.amount);
    println!("Fee: {} ADA ({} lovelace)", format_ada(receipt.fee), receipt.fee);
    match receipt.change {
        ChangeOutcome::Output(change) => {
            println!("Change: {} ADA ({change} lovelace)", format_ada(change));
        }
        ChangeOutcome::Folded(dust) => {
            println!("Change: none ({dust} lovelace below the minimum output was added to the fee)");
        }
        ChangeOutcome::Exact => println!("Change: none"),
    }
    Ok(())
}

fn unlock_request(id: &str) -> Result<UnlockRequest> {
    let password = read_password("Wallet password")?;
    Ok(UnlockRequest::parse(Some(id), Some(password.as_str()))?)
}

/// Password from the environment, or prompted without echo.
fn read_password(prompt: &str) -> Result<Zeroizing<String>> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        return Ok(Zeroizing::new(password));
    }
    rpassword::prompt_password(format!("{prompt}: "))
        .map(Zeroizing::new)
        .context("Failed to read password")
}

/// New password, confirmed when prompted interactively.
fn new_password() -> Result<Zeroizing<String>> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        return Ok(Zeroizing::new(password));
    }
    let password = read_password("Enter wallet password")?;
    let confirm = read_password("Confirm password")?;
    if *password != *confirm {
        bail!("Passwords do not match");
    }
    Ok(password)
}

fn read_phrase() -> Result<Zeroizing<String>> {
    eprintln!("Enter recovery phrase, then press Enter:");
    let mut line = Zeroizing::new(String::new());
    std::io::stdin()
        .read_line(&mut line)
        .context("Failed to read recovery phrase from stdin")?;
    Ok(line)
}

/// Lovelace as a decimal ADA string with six places.
fn format_ada(lovelace: u64) -> String {
    format!(
        "{}.{:06}",
        lovelace / LOVELACE_PER_ADA,
        lovelace % LOVELACE_PER_ADA
    )
}
