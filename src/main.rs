use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};

use devkit::account::Account;
use devkit::{aegis, base32, card, migration, qris, totp};

#[derive(Parser, Debug)]
#[command(name = "devkit", version, about = "Codec toolbox: TOTP, authenticator migration, QRIS, test cards")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a TOTP code from a base32 secret or an otpauth:// URI
    Totp {
        /// Base32 secret, or a full otpauth://totp/... URI
        secret: String,
        #[arg(long, default_value_t = 6)]
        digits: u32,
        /// Time step in seconds
        #[arg(long, default_value_t = 30)]
        period: u64,
    },

    /// Google Authenticator migration export/import
    Migrate {
        #[command(subcommand)]
        cmd: MigrateCommands,
    },

    /// Parse or rewrite QRIS payloads
    Qris {
        #[command(subcommand)]
        cmd: QrisCommands,
    },

    /// Generate Luhn-valid test card numbers
    Card {
        #[command(subcommand)]
        cmd: CardCommands,
    },

    /// Aegis Authenticator vault export/import
    Aegis {
        #[command(subcommand)]
        cmd: AegisCommands,
    },
}

#[derive(Subcommand, Debug)]
enum MigrateCommands {
    /// Emit otpauth-migration:// URIs (one per QR code) for an accounts file
    Export {
        /// JSON array of {name, secret, issuer?}
        file: PathBuf,
    },
    /// Decode an otpauth-migration:// URI back into accounts
    Import { uri: String },
}

#[derive(Subcommand, Debug)]
enum QrisCommands {
    /// Parse a QRIS payload and print its fields as JSON
    Parse { payload: String },
    /// Rewrite a static QRIS payload into a dynamic one with an amount
    Dynamic {
        payload: String,
        /// Transaction amount in IDR
        #[arg(long)]
        amount: u64,
        /// Tag 62-05 reference label
        #[arg(long)]
        reference: Option<String>,
        /// Tag 62-07 terminal label
        #[arg(long)]
        terminal: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum CardCommands {
    /// Generate one or more test cards
    Generate {
        /// Leading digits to build the number on
        #[arg(long)]
        bin: Option<String>,
        /// Card type key (visa, mastercard, amex, discover, jcb, unionpay)
        #[arg(long = "type")]
        card_type: Option<String>,
        #[arg(long, default_value_t = 1)]
        count: usize,
        #[arg(long)]
        month: Option<String>,
        #[arg(long)]
        year: Option<String>,
        /// CVV pattern; x means a random digit
        #[arg(long)]
        cvv: Option<String>,
        #[arg(long, value_enum, default_value = "pipe")]
        format: OutputFormat,
    },
}

#[derive(Subcommand, Debug)]
enum AegisCommands {
    /// Write an Aegis v2 vault for an accounts file
    Export {
        /// JSON array of {name, secret, issuer?}
        file: PathBuf,
    },
    /// Read accounts out of an Aegis vault backup
    Import { file: PathBuf },
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum OutputFormat {
    /// number|MM|YY|cvv
    Pipe,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Totp {
            secret,
            digits,
            period,
        } => cmd_totp(&secret, digits, period),
        Commands::Migrate { cmd } => match cmd {
            MigrateCommands::Export { file } => cmd_migrate_export(&file),
            MigrateCommands::Import { uri } => cmd_migrate_import(&uri),
        },
        Commands::Qris { cmd } => match cmd {
            QrisCommands::Parse { payload } => cmd_qris_parse(&payload),
            QrisCommands::Dynamic {
                payload,
                amount,
                reference,
                terminal,
            } => cmd_qris_dynamic(&payload, amount, reference, terminal),
        },
        Commands::Card { cmd } => match cmd {
            CardCommands::Generate {
                bin,
                card_type,
                count,
                month,
                year,
                cvv,
                format,
            } => cmd_card_generate(bin, card_type, count, month, year, cvv, format),
        },
        Commands::Aegis { cmd } => match cmd {
            AegisCommands::Export { file } => cmd_aegis_export(&file),
            AegisCommands::Import { file } => cmd_aegis_import(&file),
        },
    }
}

fn cmd_totp(secret: &str, digits: u32, period: u64) -> Result<()> {
    if !(6..=8).contains(&digits) {
        return Err(anyhow!("digits must be between 6 and 8"));
    }
    if period < 1 {
        return Err(anyhow!("period must be at least 1 second"));
    }

    let secret = if secret.starts_with("otpauth://") {
        totp::parse_otpauth_uri(secret)
            .ok_or_else(|| anyhow!("unrecognized otpauth URI"))?
            .secret
    } else {
        secret.to_string()
    };

    let options = totp::TotpOptions {
        digits,
        period,
        ..Default::default()
    };
    let code = totp::generate(&secret, &options)?;
    println!("{}", code);
    eprintln!(
        "valid for {}s",
        totp::remaining_seconds(period, options.timestamp_ms)
    );
    Ok(())
}

fn read_accounts(file: &Path) -> Result<Vec<Account>> {
    let data = fs::read_to_string(file)
        .with_context(|| format!("cannot read {}", file.display()))?;
    let accounts: Vec<Account> = serde_json::from_str(&data)
        .context("accounts file must be a JSON array of {name, secret, issuer?}")?;
    if accounts.is_empty() {
        return Err(anyhow!("no accounts in {}", file.display()));
    }
    for account in &accounts {
        if !base32::is_valid_secret(&account.secret) {
            return Err(anyhow!("invalid base32 secret for account {:?}", account.name));
        }
    }
    Ok(accounts)
}

fn cmd_migrate_export(file: &Path) -> Result<()> {
    let accounts = read_accounts(file)?;
    let uris = migration::generate_migration_uris(&accounts);
    for uri in &uris {
        println!("{}", uri);
    }
    eprintln!("exported {} account(s) across {} URI(s)", accounts.len(), uris.len());
    Ok(())
}

fn cmd_migrate_import(uri: &str) -> Result<()> {
    let accounts =
        migration::parse_migration_uri(uri).ok_or_else(|| anyhow!("no accounts recovered from URI"))?;
    println!("{}", serde_json::to_string_pretty(&accounts)?);
    eprintln!("imported {} account(s)", accounts.len());
    Ok(())
}

fn cmd_qris_parse(payload: &str) -> Result<()> {
    let data = qris::parse_qris(payload).ok_or_else(|| anyhow!("not a QRIS payload"))?;
    println!("{}", serde_json::to_string_pretty(&data)?);
    if !data.is_valid {
        eprintln!("warning: CRC mismatch, payload is corrupt or edited");
    }
    Ok(())
}

fn cmd_qris_dynamic(
    payload: &str,
    amount: u64,
    reference: Option<String>,
    terminal: Option<String>,
) -> Result<()> {
    if !qris::is_valid_qris(payload) {
        return Err(anyhow!("input is not a valid QRIS payload"));
    }

    let options = qris::DynamicOptions {
        reference_label: reference,
        terminal_label: terminal,
    };
    let dynamic = qris::convert_to_dynamic(payload, amount, &options)
        .ok_or_else(|| anyhow!("conversion failed"))?;
    println!("{}", dynamic);
    Ok(())
}

fn cmd_card_generate(
    bin: Option<String>,
    card_type: Option<String>,
    count: usize,
    month: Option<String>,
    year: Option<String>,
    cvv: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    if !(1..=100).contains(&count) {
        return Err(anyhow!("count must be between 1 and 100"));
    }
    if let Some(bin) = &bin {
        if !card::is_valid_bin(bin) {
            return Err(anyhow!("BIN must be 1 to 14 digits"));
        }
    }
    if let Some(key) = &card_type {
        if card::card_type(key).is_none() {
            let keys: Vec<&str> = card::CARD_TYPES.iter().map(|(k, _)| *k).collect();
            return Err(anyhow!("unknown card type {:?}; one of {}", key, keys.join(", ")));
        }
    }

    let options = card::GenerateOptions {
        bin,
        expiry_month: month,
        expiry_year: year,
        cvv,
        card_type,
    };
    let cards = card::generate_cards(count, &options);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&cards)?),
        OutputFormat::Pipe => {
            for c in &cards {
                let mut expiry = c.expiry.splitn(2, '/');
                let month = expiry.next().unwrap_or("");
                let year = expiry.next().unwrap_or("");
                println!("{}|{}|{}|{}", c.number, month, year, c.cvv);
            }
        }
    }
    Ok(())
}

fn cmd_aegis_export(file: &Path) -> Result<()> {
    let accounts = read_accounts(file)?;
    println!("{}", aegis::export_accounts(&accounts));
    eprintln!("exported {} account(s)", accounts.len());
    Ok(())
}

fn cmd_aegis_import(file: &Path) -> Result<()> {
    let data = fs::read_to_string(file)
        .with_context(|| format!("cannot read {}", file.display()))?;
    let accounts =
        aegis::parse_vault(&data).ok_or_else(|| anyhow!("no TOTP entries found in vault"))?;
    println!("{}", serde_json::to_string_pretty(&accounts)?);
    eprintln!("imported {} account(s)", accounts.len());
    Ok(())
}
