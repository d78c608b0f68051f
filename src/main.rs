//! CLI entry point for `mimecrypt`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};

use mimecrypt::config::{self, Config};
use mimecrypt::crypto::annotations::{CryptoAnnotations, CryptoError};
use mimecrypt::crypto::detector::{self, CryptoShape};
use mimecrypt::crypto::helper::CryptoHelper;
use mimecrypt::crypto::provider::CryptoProvider;
use mimecrypt::error::MimeCryptError;
use mimecrypt::imap::{self, ClassifiedResponse, CommandKind};
use mimecrypt::model::part::{format_path, Part, PartId};
use mimecrypt::parser::eml::load_message;
use mimecrypt::parser::mime::ParseOptions;

#[derive(Parser)]
#[command(
    name = "mimecrypt",
    version,
    about = "Find OpenPGP structures in MIME messages and classify IMAP responses"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Report the crypto structure of a message (.eml)
    Scan {
        path: PathBuf,
        #[arg(long)]
        json: bool,
        /// Treat empty bodies as not yet downloaded
        #[arg(long)]
        partial: bool,
    },
    /// Write the detached signature of the first multipart/signed part
    Signature {
        path: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Classify a transcript of IMAP server responses
    Imap {
        path: PathBuf,
        /// Command the responses answer
        #[arg(short, long, value_enum)]
        kind: CommandKind,
        #[arg(long)]
        json: bool,
    },
    /// Show the configuration file location and effective settings
    Config {
        /// Write the default configuration to the config file path
        #[arg(long)]
        init: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = config::load_config();

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Scan {
            path,
            json,
            partial,
        } => cmd_scan(&path, json || config.output.json, partial, &config),
        Commands::Signature { path, output } => cmd_signature(&path, &output),
        Commands::Imap { path, kind, json } => cmd_imap(&path, kind, json || config.output.json),
        Commands::Config { init } => cmd_config(init, &config),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = config::cache_dir(config);
    let log_name = config::log_file_path(config)
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| "mimecrypt.log".into());

    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, log_name);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mimecrypt", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

#[derive(serde::Serialize)]
struct PartReport {
    path: String,
    mime_type: String,
    shape: Option<&'static str>,
}

#[derive(serde::Serialize)]
struct StatusReport {
    path: String,
    mime_type: String,
    status: CryptoError,
}

#[derive(serde::Serialize)]
struct ScanReport {
    root: PartReport,
    complete: bool,
    primary: Option<PartReport>,
    extra_parts: Vec<PartReport>,
    multipart_encrypted: Vec<PartReport>,
    multipart_signed: Vec<PartReport>,
    pgp_inline: Vec<PartReport>,
    identity: String,
    status: Vec<StatusReport>,
}

/// Index paths of every part of `message`, by identity.
fn part_paths(message: &Part) -> HashMap<PartId, String> {
    message
        .walk()
        .into_iter()
        .map(|(path, part)| (part.id(), format_path(&path)))
        .collect()
}

fn report(part: &Part, paths: &HashMap<PartId, String>) -> PartReport {
    PartReport {
        // Parts found through an annotation are not in the message tree.
        path: paths
            .get(&part.id())
            .cloned()
            .unwrap_or_else(|| "replacement".to_string()),
        mime_type: part.mime_type().to_string(),
        shape: detector::classify_part(part).map(CryptoShape::label),
    }
}

/// Parse a message and print what the detector finds in it.
fn cmd_scan(path: &Path, json: bool, partial: bool, config: &Config) -> anyhow::Result<()> {
    let options = ParseOptions {
        partial_download: partial || config.scan.partial_download,
    };
    let message = load_message(path, options)?;
    let paths = part_paths(&message);

    let identity = config.identity.address().identity();
    let helper = CryptoHelper::<dyn CryptoProvider>::new(
        None,
        identity.clone(),
        config.scan.process_signed_only,
    );
    let annotations = helper.run(&message);

    let mut extras = Vec::new();
    let primary = detector::find_primary_encrypted_or_signed_part(&message, &mut extras);

    let status: Vec<StatusReport> = message
        .walk()
        .into_iter()
        .filter_map(|(path, part)| {
            let annotation = annotations.get(part)?;
            Some(StatusReport {
                path: format_path(&path),
                mime_type: part.mime_type().to_string(),
                status: annotation.error_type(),
            })
        })
        .collect();

    let scan = ScanReport {
        root: report(&message, &paths),
        complete: message.is_complete(),
        primary: primary.map(|part| report(part, &paths)),
        extra_parts: extras.iter().map(|part| report(part, &paths)).collect(),
        multipart_encrypted: detector::find_multipart_encrypted_parts(&message)
            .into_iter()
            .map(|part| report(part, &paths))
            .collect(),
        multipart_signed: detector::find_multipart_signed_parts(&message, &annotations)
            .into_iter()
            .map(|part| report(part, &paths))
            .collect(),
        pgp_inline: detector::find_pgp_inline_parts(&message)
            .into_iter()
            .map(|part| report(part, &paths))
            .collect(),
        identity,
        status,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&scan)?);
    } else {
        print_scan_table(path, &scan);
    }
    Ok(())
}

fn print_scan_table(path: &Path, scan: &ScanReport) {
    let line = |part: &PartReport| match part.shape {
        Some(shape) => format!("{:<8} {} ({shape})", part.path, part.mime_type),
        None => format!("{:<8} {}", part.path, part.mime_type),
    };
    let list = |label: &str, parts: &[PartReport]| {
        if parts.is_empty() {
            println!("  {:<20} -", label);
        }
        for (i, part) in parts.iter().enumerate() {
            println!("  {:<20} {}", if i == 0 { label } else { "" }, line(part));
        }
    };

    println!();
    println!("  {:<20} {}", "File", path.display());
    println!("  {:<20} {}", "Root", line(&scan.root));
    println!(
        "  {:<20} {}",
        "Fully downloaded",
        if scan.complete { "yes" } else { "no" }
    );
    match &scan.primary {
        Some(primary) => println!("  {:<20} {}", "Primary part", line(primary)),
        None => println!("  {:<20} -", "Primary part"),
    }
    list("Extra parts", &scan.extra_parts);
    list("Encrypted parts", &scan.multipart_encrypted);
    list("Signed parts", &scan.multipart_signed);
    list("Inline PGP parts", &scan.pgp_inline);
    if !scan.status.is_empty() {
        println!("  {:<20} {}", "Identity", scan.identity);
    }
    for (i, status) in scan.status.iter().enumerate() {
        println!(
            "  {:<20} {:<8} {:?}",
            if i == 0 { "Crypto status" } else { "" },
            status.path,
            status.status
        );
    }
    println!();
}

/// Write the detached signature of the first `multipart/signed` part.
fn cmd_signature(path: &Path, output: &Path) -> anyhow::Result<()> {
    let message = load_message(path, ParseOptions::default())?;
    let annotations = CryptoAnnotations::new();

    let Some(signed) = detector::find_multipart_signed_parts(&message, &annotations)
        .into_iter()
        .next()
    else {
        anyhow::bail!("No multipart/signed part in {}", path.display());
    };
    let Some(signature) = detector::get_signature_data(signed)? else {
        anyhow::bail!("Signature body of {} was not downloaded", path.display());
    };

    std::fs::write(output, &signature).map_err(|e| MimeCryptError::io(output, e))?;
    println!(
        "Wrote {} byte signature to {}",
        signature.len(),
        output.display()
    );
    Ok(())
}

/// Classify a transcript of server responses.
fn cmd_imap(path: &Path, kind: CommandKind, json: bool) -> anyhow::Result<()> {
    let transcript = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => MimeCryptError::FileNotFound(path.to_path_buf()),
        _ => MimeCryptError::io(path, e),
    })?;
    let responses = imap::parser::parse_transcript(&transcript)?;
    let classified = imap::classify(kind, &responses);

    if json {
        println!("{}", serde_json::to_string_pretty(&classified)?);
        return Ok(());
    }

    let Some(classified) = classified else {
        println!("  No {kind:?} response in {} line(s)", responses.len());
        return Ok(());
    };

    println!();
    let state = classified.state();
    if let Some(count) = state.message_count {
        println!("  {:<20} {}", "Messages", count);
    }
    if state.expunged > 0 {
        println!("  {:<20} {}", "Expunged", state.expunged);
    }
    if let Some(uid_next) = state.uid_next {
        println!("  {:<20} {}", "UIDNEXT", uid_next);
    }

    match &classified {
        ClassifiedResponse::Capability(r) => {
            let names: Vec<&str> = r.capabilities.iter().map(String::as_str).collect();
            println!("  {:<20} {}", "Capabilities", names.join(" "));
        }
        ClassifiedResponse::CopyUid(r) => {
            println!("  {:<20} {}", "UIDVALIDITY", r.uid_validity);
            for (source, destination) in &r.uid_mapping {
                println!("  {:<20} {source} -> {destination}", "");
            }
        }
        ClassifiedResponse::Search(r) => {
            let hits: Vec<String> = r.numbers.iter().map(u64::to_string).collect();
            println!("  {:<20} {}", format!("{} hit(s)", hits.len()), hits.join(" "));
        }
        ClassifiedResponse::Store(r) => {
            for update in &r.updates {
                let uid = update.uid.map(|u| format!(" UID {u}")).unwrap_or_default();
                println!(
                    "  {:<20} {}",
                    format!("#{}{uid}", update.sequence),
                    update.flags.join(" ")
                );
            }
        }
        ClassifiedResponse::Select(r) => {
            println!(
                "  {:<20} {}",
                "Access",
                if r.read_only { "read-only" } else { "read-write" }
            );
            if let Some(validity) = r.uid_validity {
                println!("  {:<20} {}", "UIDVALIDITY", validity);
            }
            println!("  {:<20} {}", "Flags", r.flags.join(" "));
        }
    }
    println!();
    Ok(())
}

fn cmd_config(init: bool, config: &Config) -> anyhow::Result<()> {
    let written = if init { Some(config::init_config()?) } else { None };
    match config::config_file_path() {
        Some(path) => println!("# {}", path.display()),
        None => println!("# no config directory on this platform"),
    }
    println!("{}", toml::to_string_pretty(written.as_ref().unwrap_or(config))?);
    Ok(())
}
