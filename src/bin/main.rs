//! Remote PDF Signer CLI
//!
//! Signs or timestamps one or more PDF documents in a single request to the
//! remote signing service.

use clap::{Args, Parser, Subcommand, ValueEnum};
use miette::{Context, IntoDiagnostic, Result};
use remote_pdf_signer::{
    expand_step_up_message, generate_transaction_id, infra::config::LOCAL_PROPERTIES_FILE,
    CertificationLevel, ConfigManager, DssClient, DssClientConfig, ModeInputs, Reporter,
    SignJob, SignWorkflow, SignatureMetadata, SigningError, SigningMode, Verbosity,
};
use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "remote-pdf-signer")]
#[command(about = "Sign and timestamp PDF documents with a remote signing service")]
#[command(long_about = "
Remote PDF Signer - PDF signatures and document timestamps via a DSS service

EXAMPLES:
    # Timestamp a document
    remote-pdf-signer sign --type timestamp --infile in.pdf --outfile out.pdf

    # Sign with the static certificate
    remote-pdf-signer sign --type sign --infile in.pdf --outfile out.pdf -v

    # Batch: pairs of --infile/--outfile in order
    remote-pdf-signer sign --type sign --infile a.pdf --outfile a-signed.pdf \\
        --infile b.pdf --outfile b-signed.pdf

    # On-demand certificate with mobile step-up
    remote-pdf-signer sign --type sign --infile in.pdf --outfile out.pdf \\
        --dn 'cn=Hans Muster,o=ACME,c=CH' --msisdn +41791234567 \\
        --msg 'Sign the contract? (#TRANSID#)' --lang en

CONFIGURATION:
    --config FILE, else ./signpdf.properties, else the per-user config.toml.
    Keys: CERT_FILE, CERT_KEY, SSL_CA, URL, CUSTOMER, KEY_STATIC, KEY_ONDEMAND,
          TIMEOUT_CON, TIMEOUT_READ, DIGEST_METHOD

ENVIRONMENT VARIABLES:
    RUST_LOG        Logging level (overrides -v/-d)
")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (.toml or .properties)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print results and progress
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print debug output, including request and response XML
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign or timestamp PDF documents
    Sign(SignArgs),

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Create a configuration file from the template
    Init,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum SignatureTypeArg {
    /// RFC 3161 document timestamp
    Timestamp,
    /// CMS signature
    Sign,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum LanguageArg {
    En,
    De,
    Fr,
    It,
}

impl LanguageArg {
    fn code(self) -> &'static str {
        match self {
            LanguageArg::En => "en",
            LanguageArg::De => "de",
            LanguageArg::Fr => "fr",
            LanguageArg::It => "it",
        }
    }
}

#[derive(Args, Debug)]
struct SignArgs {
    /// Timestamp or signature
    #[arg(long = "type", value_enum)]
    signature_type: SignatureTypeArg,

    /// Source PDF; repeat for a batch
    #[arg(long = "infile", value_name = "FILE", required = true)]
    infiles: Vec<PathBuf>,

    /// Target PDF, one per --infile and in the same order
    #[arg(long = "outfile", value_name = "FILE", required = true)]
    outfiles: Vec<PathBuf>,

    #[arg(long)]
    reason: Option<String>,

    #[arg(long)]
    location: Option<String>,

    #[arg(long)]
    contact: Option<String>,

    /// Certify: 1 no changes, 2 form filling, 3 form filling and annotations
    #[arg(long, value_parser = clap::value_parser!(i64).range(1..=3))]
    certification: Option<i64>,

    /// Subject of an on-demand certificate
    #[arg(long)]
    dn: Option<String>,

    /// Mobile number for step-up
    #[arg(long)]
    msisdn: Option<String>,

    /// Step-up message; #TRANSID# is replaced by a transaction id
    #[arg(long)]
    msg: Option<String>,

    /// Step-up language
    #[arg(long, value_enum)]
    lang: Option<LanguageArg>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbosity = Verbosity::from_flags(cli.verbose, cli.debug);

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(verbosity.log_filter()),
    )
    .init();

    let outcome = match cli.command {
        Commands::Sign(args) => handle_sign_command(args, cli.config.as_deref(), verbosity),
        Commands::Config(config_cmd) => handle_config_command(config_cmd, cli.config.as_deref()),
    };

    // Silent mode reports through the exit code only.
    match outcome {
        Err(e) if verbosity == Verbosity::Silent => {
            log::debug!("{e:?}");
            std::process::exit(1);
        }
        other => other,
    }
}

fn handle_sign_command(
    args: SignArgs,
    config_path: Option<&Path>,
    verbosity: Verbosity,
) -> Result<()> {
    let reporter = Reporter::new(verbosity);

    let mut message = args.msg.clone();
    if let Some(text) = &args.msg {
        let transaction_id = generate_transaction_id();
        reporter.detail(&format!("Transaction ID {transaction_id}"));
        message = Some(expand_step_up_message(text, &transaction_id));
    }
    let mode = SigningMode::derive(&ModeInputs {
        timestamp: args.signature_type == SignatureTypeArg::Timestamp,
        distinguished_name: args.dn.clone(),
        msisdn: args.msisdn.clone(),
        message,
        language: args.lang.map(|l| l.code().to_string()),
    })
    .into_diagnostic()?;

    let metadata = SignatureMetadata {
        reason: args.reason,
        location: args.location,
        contact: args.contact,
        certification: args
            .certification
            .map(CertificationLevel::from_permission)
            .transpose()
            .into_diagnostic()?,
    };
    let jobs = validate_jobs(&args.infiles, &args.outfiles)?;

    let config_manager = ConfigManager::discover(config_path).into_diagnostic()?;
    let config = config_manager
        .load()
        .into_diagnostic()
        .context("Cannot load signing configuration")?;

    let client_config = DssClientConfig::from_configuration(&config).into_diagnostic()?;
    let client = DssClient::new(client_config)
        .into_diagnostic()
        .context("Cannot set up the connection to the signing service")?;

    let mut workflow =
        SignWorkflow::new(mode, metadata, &config, Box::new(client), reporter).into_diagnostic()?;
    let report = workflow.run(&jobs).into_diagnostic()?;

    if !report.is_complete_success() {
        if verbosity > Verbosity::Silent {
            println!(
                "⚠️  {} of {} document(s) signed",
                report.signed_count(),
                report.documents.len()
            );
        }
        std::process::exit(1);
    }
    Ok(())
}

/// Pair inputs with outputs and check them before any network traffic.
fn validate_jobs(infiles: &[PathBuf], outfiles: &[PathBuf]) -> Result<Vec<SignJob>> {
    if infiles.len() != outfiles.len() {
        return Err(SigningError::InvalidInput(format!(
            "{} --infile but {} --outfile given",
            infiles.len(),
            outfiles.len()
        )))
        .into_diagnostic();
    }

    let mut seen = HashSet::new();
    let mut jobs = Vec::with_capacity(infiles.len());
    for (input, output) in infiles.iter().zip(outfiles) {
        File::open(input)
            .into_diagnostic()
            .with_context(|| format!("Cannot read input file {}", input.display()))?;
        if input == output {
            return Err(SigningError::InvalidInput(format!(
                "Output must differ from input: {}",
                input.display()
            )))
            .into_diagnostic();
        }
        if output.exists() {
            return Err(SigningError::InvalidInput(format!(
                "Output file already exists: {}",
                output.display()
            )))
            .into_diagnostic();
        }
        if !seen.insert(output.clone()) {
            return Err(SigningError::InvalidInput(format!(
                "Output file given twice: {}",
                output.display()
            )))
            .into_diagnostic();
        }
        jobs.push(SignJob::new(input, output));
    }
    Ok(jobs)
}

fn handle_config_command(config_cmd: ConfigCommands, config_path: Option<&Path>) -> Result<()> {
    let config_manager = ConfigManager::discover(config_path).into_diagnostic()?;

    match config_cmd {
        ConfigCommands::Show => match config_manager.load() {
            Ok(config) => {
                println!("📋 Current Configuration:");
                println!("  Service URL: {}", config.url);
                println!("  Customer: {}", config.customer);
                println!("  Static key: {}", config.key_static);
                println!("  On-demand key: {}", config.key_on_demand);
                println!("  Client certificate: {}", config.cert_file.display());
                println!("  Client key: {}", config.cert_key.display());
                match &config.ssl_ca {
                    Some(ca) => println!("  Server CA: {}", ca.display()),
                    None => println!("  Server CA: (not pinned)"),
                }
                println!(
                    "  Timeouts: connect {}s, read {}s",
                    config.timeout_connect, config.timeout_read
                );
                println!("  Digest method: {}", config.digest_method);
                println!(
                    "  Configuration file: {}",
                    config_manager.config_path().display()
                );
            }
            Err(e) => {
                println!("📋 No usable configuration: {e}");
                println!(
                    "   Use 'config init', or put a {LOCAL_PROPERTIES_FILE} in the working directory."
                );
            }
        },

        ConfigCommands::Init => {
            config_manager.init().into_diagnostic()?;
            println!(
                "✅ Configuration initialized: {}",
                config_manager.config_path().display()
            );
            println!("   Edit the file to set your certificate, key and customer.");
        }
    }

    Ok(())
}
