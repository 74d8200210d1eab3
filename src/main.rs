//! CLI entrypoint for `tikbrute`.
//!
//! Parses command-line arguments, loads the word lists, opens the audit CSV,
//! runs one probing round per port and prints the final statistics. Not
//! finding a credential is a normal completion; only configuration problems
//! and an unwritable audit file end with a non-zero status.
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use log::{LevelFilter, error};
use tikbrute::{
    audit::AuditLog,
    config::{DEFAULT_THREADS, RunConfig, UserSource},
    engine::Engine,
    handshake::HandshakeSettings,
    io::DEFAULT_MMAP_THRESHOLD_BYTES,
    probe::{Method, build_probe},
    report::{render_outcome, render_start, render_stats},
};

#[derive(Parser, Debug)]
#[command(
    name = "tikbrute",
    version,
    about = "Login tester for router management front-ends"
)]
struct Args {
    /// Target host
    target: String,

    /// Login front-end to probe
    #[arg(short = 'm', long = "method", value_enum)]
    method: MethodArg,

    /// Single port to test
    #[arg(short = 'p', long = "port", conflicts_with = "ports")]
    port: Option<u16>,

    /// Comma-separated ports to test, one round each
    #[arg(short = 'P', long = "ports")]
    ports: Option<String>,

    /// Single username to test
    #[arg(short = 'u', long = "user")]
    user: Option<String>,

    /// Username wordlist file
    #[arg(short = 'U', long = "userlist")]
    userlist: Option<PathBuf>,

    /// Password wordlist file
    #[arg(short = 'w', long = "passlist")]
    passlist: PathBuf,

    /// Number of concurrent workers
    #[arg(short = 't', long = "threads", default_value_t = DEFAULT_THREADS)]
    threads: usize,

    /// Per-attempt timeout in seconds (default 3 for handshake, 5 for structured-api)
    #[arg(long = "timeout")]
    timeout: Option<f64>,

    /// Wait between sending handshake credentials and reading the reply
    #[arg(long = "settle-delay-ms", default_value_t = 1000)]
    settle_delay_ms: u64,

    /// Directory for the audit CSV
    #[arg(short = 'o', long = "output", default_value = ".")]
    output: PathBuf,

    /// Wordlists at least this large (bytes) are memory-mapped. If zero, disable mmap.
    #[arg(long = "mmap-threshold", default_value_t = DEFAULT_MMAP_THRESHOLD_BYTES)]
    mmap_threshold: u64,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,

    /// Control color output (auto, always, never)
    #[arg(long = "color", value_enum, default_value_t = ColorChoice::Auto)]
    color: ColorChoice,

    /// Suppress the start banner
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MethodArg {
    Handshake,
    StructuredApi,
}

impl From<MethodArg> for Method {
    fn from(m: MethodArg) -> Self {
        match m {
            MethodArg::Handshake => Method::Handshake,
            MethodArg::StructuredApi => Method::StructuredApi,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ColorChoice {
    Auto,
    Always,
    Never,
}

fn init_logger(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    let _ = env_logger::Builder::from_default_env()
        .filter_level(level)
        .try_init();
}

fn load_config(args: &Args) -> Result<RunConfig, tikbrute::config::ConfigError> {
    let users = match (&args.user, &args.userlist) {
        (Some(u), _) => Some(UserSource::Single(u.clone())),
        (None, Some(path)) => Some(UserSource::List(path.clone())),
        (None, None) => None,
    };
    let ports = args
        .ports
        .clone()
        .or_else(|| args.port.map(|p| p.to_string()));
    let threshold = if args.mmap_threshold == 0 {
        u64::MAX
    } else {
        args.mmap_threshold
    };
    let handshake =
        HandshakeSettings::default().with_settle_delay(Duration::from_millis(args.settle_delay_ms));
    RunConfig::load(
        &args.target,
        args.method.into(),
        ports.as_deref(),
        users,
        &args.passlist,
        args.threads,
        args.timeout,
        handshake,
        threshold,
    )
}

fn main() {
    let args = Args::parse();
    init_logger(args.verbose);
    match args.color {
        ColorChoice::Always => {
            colored::control::set_override(true);
        }
        ColorChoice::Never => {
            colored::control::set_override(false);
        }
        ColorChoice::Auto => {}
    }

    let config = match load_config(&args) {
        Ok(c) => c,
        Err(e) => {
            error!("{}", e);
            std::process::exit(2);
        }
    };
    let engine = match Engine::new(config.threads) {
        Ok(e) => e,
        Err(e) => {
            error!("{}", e);
            std::process::exit(2);
        }
    };
    let audit = match AuditLog::create(&args.output, &config.host) {
        Ok(a) => a,
        Err(e) => {
            error!("failed to create audit log in {}: {:#}", args.output.display(), e);
            std::process::exit(3);
        }
    };

    if !args.quiet {
        print!("{}", render_start(&config));
    }
    let probe = build_probe(config.method, config.handshake.clone());
    let summary = engine.run(&config, probe.as_ref(), &audit);

    println!();
    print!("{}", render_stats(&summary.stats));
    println!();
    print!("{}", render_outcome(&summary, audit.path()));
}
