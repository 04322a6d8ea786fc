use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use khata_core::dues::{self, Clearance};
use khata_core::quick_code::{assign_quick_code, find_by_quick_code};
use khata_core::resolver::EnrollError;
use khata_core::{FaceLookup, LedgerError, Money};
use khata_io::{CommandListener, CommandSpeaker, ConsoleSpeaker, Listener, NoListener, SmsError, Speaker};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod app;
mod config;
mod session;

use app::{App, OrderFailure};
use config::Config;
use session::Session;

#[derive(Parser)]
#[command(name = "khata", version, about = "Shop customer ledger with quick codes and face lookup")]
struct Cli {
    /// Ledger file (overrides KHATA_DATA_FILE)
    #[arg(long, global = true, value_name = "PATH")]
    data_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive session (default)
    Shell,
    /// Print a customer's record as JSON
    Show {
        /// Customer name or quick code
        customer: String,
    },
    /// Print a customer's total due
    Due { name: String },
    /// Clear a customer's total due with a single ledger entry
    ClearDue { name: String },
    /// Record a sale, e.g. `khata add Ravi Maggi 2 Biscuit 1 50`
    Add {
        name: String,
        /// Items and quantities followed by the amount paid
        #[arg(required = true, num_args = 1.., allow_hyphen_values = true)]
        order: Vec<String>,
    },
    /// Set a customer's phone and derive their quick code
    QuickCode { name: String, phone: String },
    /// List customers holding a quick code
    FindCode { code: String },
    /// SMS every customer with a positive due
    SendDues,
    /// Identify a customer with the face extractor
    Scan,
    /// Register or replace a customer's face
    EnrollFace { name: String },
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(path) = cli.data_file {
        config = config.with_data_file(path);
    }
    let mut app = App::open(&config)?;

    let command = cli.command.unwrap_or(Commands::Shell);
    match command {
        Commands::Shell => {
            let speaker: Box<dyn Speaker> = match config.tts_command.as_deref().and_then(CommandSpeaker::parse) {
                Some(speaker) => Box::new(speaker),
                None => Box::new(ConsoleSpeaker),
            };
            let listener: Box<dyn Listener> = match config
                .stt_command
                .as_deref()
                .and_then(|cmd| CommandListener::parse(cmd, &config.speech_language))
            {
                Some(listener) => Box::new(listener),
                None => Box::new(NoListener),
            };
            let stdin = std::io::stdin();
            Session::new(&mut app, stdin.lock(), speaker, listener).run();
            Ok(ExitCode::SUCCESS)
        }
        Commands::Show { customer } => {
            let Some(name) = app.resolver.resolve_token(&app.store, &customer) else {
                return not_found(&customer);
            };
            let Some(record) = app.store.get(&name) else {
                return not_found(&customer);
            };
            println!("{name}");
            println!("{}", serde_json::to_string_pretty(record).context("rendering record")?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Due { name } => match dues::total_due(&app.store, &name) {
            Ok(due) => {
                println!("{}: {due}", khata_core::canonical_name(&name));
                Ok(ExitCode::SUCCESS)
            }
            Err(LedgerError::NotFound(_)) => not_found(&name),
            Err(e) => Err(e.into()),
        },
        Commands::ClearDue { name } => match app.clear_due(&name) {
            Ok(Clearance::Cleared(amount)) => {
                let name = khata_core::canonical_name(&name);
                println!("Cleared {amount} for {name}");
                report_sms(app.notify_due(&name, Money::ZERO));
                Ok(ExitCode::SUCCESS)
            }
            Ok(Clearance::NothingDue(due)) => {
                println!("Nothing to clear for {} (due {due})", khata_core::canonical_name(&name));
                Ok(ExitCode::SUCCESS)
            }
            Err(LedgerError::NotFound(_)) => not_found(&name),
            Err(e) => Err(e.into()),
        },
        Commands::Add { name, order } => match app.record_order(&name, &order.join(" ")) {
            Ok(recorded) => {
                let name = khata_core::canonical_name(&name);
                println!(
                    "{name}: {} | total {}, paid {}, due {}",
                    recorded.order.summary(),
                    recorded.order.total(),
                    recorded.transaction.amount_paid,
                    recorded.transaction.amount_due
                );
                println!("Total due: {}", recorded.total_due);
                if recorded.total_due.is_positive() {
                    report_sms(app.notify_due(&name, recorded.total_due));
                }
                Ok(ExitCode::SUCCESS)
            }
            Err(OrderFailure::Ledger(LedgerError::NotFound(_))) => not_found(&name),
            Err(OrderFailure::Parse(e)) => {
                eprintln!("{}", e.user_message());
                Ok(ExitCode::FAILURE)
            }
            Err(OrderFailure::Ledger(e)) => Err(e.into()),
        },
        Commands::QuickCode { name, phone } => {
            let code = assign_quick_code(&mut app.store, &name, &phone)?;
            println!("{}: {code}", khata_core::canonical_name(&name));
            Ok(ExitCode::SUCCESS)
        }
        Commands::FindCode { code } => {
            let names = find_by_quick_code(&app.store, &code);
            if names.is_empty() {
                eprintln!("No customer with quick code {code:?}");
                return Ok(ExitCode::FAILURE);
            }
            for name in names {
                println!("{name}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::SendDues => {
            let pending = dues::customers_with_dues(&app.store);
            if pending.is_empty() {
                println!("No dues pending");
                return Ok(ExitCode::SUCCESS);
            }
            match app.send_dues() {
                Ok(sent) => {
                    for (name, due, result) in sent {
                        match result {
                            Ok(receipt) => println!("{name}: {due} (sent, HTTP {})", receipt.status),
                            Err(e) => println!("{name}: {due} (failed: {e})"),
                        }
                    }
                }
                Err(e) => {
                    for (name, phone, due) in &pending {
                        println!("{name} {phone}: {due}");
                    }
                    eprintln!("{e}; no messages sent");
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Scan => {
            match app.scan_face()? {
                FaceLookup::Matched { name, distance } => println!("{name} (distance {distance:.3})"),
                FaceLookup::NoMatch => println!("No match"),
                FaceLookup::NoEnrolled => println!("No enrolled faces"),
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::EnrollFace { name } => match app.enroll_face(&name) {
            Ok(()) => {
                println!("Face registered for {}", khata_core::canonical_name(&name));
                Ok(ExitCode::SUCCESS)
            }
            Err(EnrollError::NoFaceDetected) => {
                eprintln!("No face detected");
                Ok(ExitCode::FAILURE)
            }
            Err(e) => Err(e.into()),
        },
    }
}

fn not_found(token: &str) -> Result<ExitCode> {
    eprintln!("Customer not found: {token}");
    Ok(ExitCode::FAILURE)
}

fn report_sms(result: Result<Option<khata_io::SmsReceipt>, SmsError>) {
    match result {
        Ok(Some(receipt)) => println!("SMS sent (HTTP {})", receipt.status),
        Ok(None) => {}
        Err(SmsError::NotConfigured) => tracing::info!("SMS not configured; reminder skipped"),
        Err(e) => eprintln!("SMS failed: {e}"),
    }
}
