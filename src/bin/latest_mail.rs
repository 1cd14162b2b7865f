use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};

use latest_mail::auth::credential_store;
use latest_mail::config::{ImapSettings, load_config};
use latest_mail::fetch_latest;
use latest_mail::mail::session::ImapConnector;

const PREVIEW_CHARS: usize = 140;

#[derive(Parser)]
#[command(name = "latest_mail")]
#[command(about = "Show the newest message of an IMAP inbox", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch and print the newest message in INBOX
    Latest {
        /// Print the message as JSON
        #[arg(long)]
        json: bool,

        /// Print a one-line `sender | subject | body` summary
        #[arg(long, conflicts_with = "json")]
        preview: bool,

        /// Truncate the body to this many characters
        #[arg(long, default_value_t = 3500)]
        max_body: usize,
    },

    /// Store the account password in keyring
    SetPassword {
        #[arg(long)]
        user: String,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::SetPassword { user } => {
            eprintln!("Paste password (end with Ctrl-D):");
            let mut secret = String::new();
            std::io::Read::read_to_string(&mut std::io::stdin(), &mut secret)?;
            let secret = secret.trim();
            if secret.is_empty() {
                return Err(anyhow!("empty password, nothing saved"));
            }
            credential_store::save_password(&user, secret)?;
            println!("Saved password for {}", user);
            Ok(())
        }

        Command::Latest {
            json,
            preview,
            max_body,
        } => {
            let cfg = load_config().map_err(|e| anyhow!("Configuration error: {e}"))?;
            let user = cfg
                .user_email
                .clone()
                .ok_or_else(|| anyhow!("user_email not set in config"))?;
            let password = credential_store::resolve_password(&user)?;
            let settings = ImapSettings::resolve(&cfg, password)?;

            let latest = fetch_latest(&ImapConnector::new(settings))
                .context("could not fetch the latest message")?;

            match latest {
                Some(msg) if json => println!("{}", serde_json::to_string_pretty(&msg)?),
                None if json => println!("null"),
                Some(msg) if preview => println!("{}", msg.headline(PREVIEW_CHARS.min(max_body))),
                Some(msg) => println!("{}", msg.render(max_body)),
                None => println!("No messages in INBOX."),
            }
            Ok(())
        }
    }
}
