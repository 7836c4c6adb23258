use chrono::Local;
use clap::Parser;
use lazlo_archiver::{
    DEFAULT_LISTING_URL, HttpAudioProvider, HttpListingProvider, RunConfig, run_archive,
};
use log::error;
use std::io;
use std::path::{Path, PathBuf};
use std::process;

/// Archive full-show episodes of The Church of Lazlo podcast.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Listing page to inspect
    #[arg(long, default_value = DEFAULT_LISTING_URL)]
    url: String,

    /// Directory the episodes are written to
    #[arg(short, long, default_value = ".")]
    path: PathBuf,

    /// User (and group) that should own newly written files
    #[arg(short, long)]
    user: Option<String>,
}

/// Installs the logger: everything goes to stdout, mirrored into a dated log
/// file next to the episodes (or into a `log/` subdirectory when one
/// exists). When the log file cannot be opened the run degrades to
/// console-only logging instead of aborting.
fn setup_logger(base_path: &Path) -> Result<(), log::SetLoggerError> {
    let log_dir = if base_path.join("log").is_dir() {
        base_path.join("log")
    } else {
        base_path.to_path_buf()
    };
    let log_path = log_dir.join(format!("col-download.{}.log", Local::now().date_naive()));

    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} {} {}",
                Local::now().format("%H:%M:%S%.3f"),
                record.level(),
                message
            ))
        })
        .level(log::LevelFilter::Debug)
        // Quiet the HTML and HTTP internals at debug level
        .level_for("html5ever", log::LevelFilter::Info)
        .level_for("selectors", log::LevelFilter::Info)
        .level_for("reqwest", log::LevelFilter::Info)
        .chain(io::stdout());

    match fern::log_file(&log_path) {
        Ok(file) => dispatch = dispatch.chain(file),
        Err(err) => eprintln!(
            "warning: could not open log file {}: {err}",
            log_path.display()
        ),
    }

    dispatch.apply()
}

fn main() {
    let args = Args::parse();

    if !args.path.is_dir() {
        eprintln!("Error: Path is not a directory: {}", args.path.display());
        process::exit(1);
    }

    if let Err(err) = setup_logger(&args.path) {
        eprintln!("warning: could not initialize logging: {err}");
    }

    let mut config = RunConfig::new(args.url, args.path);
    config.owner = args.user;

    let listing = HttpListingProvider::new();
    let audio = HttpAudioProvider::new();

    match run_archive(&config, &listing, &audio) {
        Ok(report) => {
            println!(
                "\n{} downloaded, {} already archived, {} without date, {} failed",
                report.downloaded(),
                report.already_archived(),
                report.without_date(),
                report.failed()
            );
        }
        Err(err) => {
            error!("catalog unavailable: {err}");
            eprintln!("\nError: {err}");
            process::exit(1);
        }
    }
}
