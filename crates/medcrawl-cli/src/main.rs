use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use medcrawl::{CsvWriter, Record, health, hira, nedrug};

#[derive(Parser)]
#[command(name = "medcrawl")]
#[command(about = "Crawlers for Korean drug and medical-facility portals", long_about = None)]
struct Cli {
    #[arg(
        short = 'l',
        long = "log-level",
        value_enum,
        default_value = "info",
        global = true,
        help = "Set the logging level"
    )]
    log_level: LogLevel,

    #[arg(
        long,
        default_value = "./data",
        global = true,
        help = "Directory CSV files and downloads are written to"
    )]
    output_dir: PathBuf,

    #[arg(
        long,
        global = true,
        help = "Seconds to wait between pagination requests"
    )]
    delay_secs: Option<u64>,

    #[arg(
        long,
        global = true,
        help = "Rows requested per page",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    page_size: Option<u32>,

    #[arg(
        long,
        global = true,
        help = "Also write a CSV with every field of each record"
    )]
    full: bool,

    #[arg(
        short = 'o',
        long = "output",
        value_enum,
        default_value = "text",
        global = true,
        help = "Output format"
    )]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl the health.kr drug search for every Korean initial
    Health,
    /// Download or re-parse the nedrug.mfds.go.kr product export
    Nedrug {
        #[command(subcommand)]
        action: NedrugAction,
    },
    /// Benefit list and hospital/pharmacy open data from hira.or.kr
    Hira {
        #[command(subcommand)]
        action: HiraAction,
    },
}

#[derive(Subcommand)]
enum NedrugAction {
    /// Page through the spreadsheet export and save every page
    Download,
    /// Parse export pages saved by an earlier download
    Parse {
        #[arg(help = "Directory holding the saved .xls/.xlsx pages (defaults to --output-dir)")]
        dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum HiraAction {
    /// Download the newest 약제급여목록표 attachment
    Download,
    /// Parse benefit-list spreadsheets saved by an earlier download
    Parse {
        #[arg(help = "Directory holding the saved spreadsheets (defaults to --output-dir)")]
        dir: Option<PathBuf>,
    },
    /// Download and unpack the hospital and pharmacy archive
    Opendata {
        #[arg(long, help = "Delete the extracted files afterwards")]
        cleanup: bool,
    },
    /// Print the hospital list from the newest archive
    Hospitals,
    /// Print the pharmacy list from the newest archive
    Pharmacies,
}

fn serialize_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            log::error!("Error serializing to JSON: {}", e);
            process::exit(1);
        }
    }
}

fn print_records<R: Record + Display>(records: &[R], format: OutputFormat) {
    match format {
        OutputFormat::Json => serialize_json(&records),
        OutputFormat::Text => {
            if records.is_empty() {
                println!("No entries to display.");
            } else {
                for record in records {
                    println!("{:>6}. {}", record.id(), record);
                }
            }
        }
    }
}

/// Writes `<name>_full.csv` next to the summary file when `--full` is set.
fn save_full<R: Record>(cli: &Cli, filename: &str, records: &[R]) {
    if !cli.full {
        return;
    }

    let stem = filename.strip_suffix(".csv").unwrap_or(filename);
    let writer = CsvWriter::new(&cli.output_dir, &format!("{stem}_full.csv"));
    if let Err(e) = writer.save_full(records) {
        log::error!("Error writing {}: {}", writer.output_path().display(), e);
        process::exit(1);
    }
}

async fn run_health(cli: &Cli) {
    let mut scraper = health::WebScraper::new()
        .unwrap_or_else(|e| {
            log::error!("Error creating scraper: {}", e);
            process::exit(1);
        })
        .with_output_dir(&cli.output_dir);
    if let Some(secs) = cli.delay_secs {
        scraper = scraper.with_page_delay(Duration::from_secs(secs));
    }
    if let Some(size) = cli.page_size {
        scraper = scraper.with_page_size(size);
    }

    let medicines = scraper
        .medicines()
        .await
        .unwrap_or_else(|e| {
            log::error!("Error crawling health.kr: {}", e);
            process::exit(1);
        });

    save_full(cli, health::scraper::MEDICINE_LIST_FILE, &medicines);
    print_records(&medicines, cli.format);
}

async fn run_nedrug(cli: &Cli, action: &NedrugAction) {
    let mut scraper = nedrug::WebScraper::new()
        .unwrap_or_else(|e| {
            log::error!("Error creating scraper: {}", e);
            process::exit(1);
        })
        .with_output_dir(&cli.output_dir);
    if let Some(secs) = cli.delay_secs {
        scraper = scraper.with_page_delay(Duration::from_secs(secs));
    }
    if let Some(size) = cli.page_size {
        scraper = scraper.with_page_size(size);
    }

    let result = match action {
        NedrugAction::Download => scraper
            .download()
            .await
            .unwrap_or_else(|e| {
                log::error!("Error downloading nedrug export: {}", e);
                process::exit(1);
            }),
        NedrugAction::Parse { dir } => {
            let dir = dir.as_deref().unwrap_or(cli.output_dir.as_path());
            let result = scraper
                .parse_directory(dir)
                .unwrap_or_else(|e| {
                    log::error!("Error parsing saved exports: {}", e);
                    process::exit(1);
                });
            if let Err(e) = scraper.csv_writer().save(&result.products) {
                log::error!("Error writing CSV: {}", e);
                process::exit(1);
            }
            result
        }
    };

    save_full(cli, nedrug::scraper::MEDICINE_LIST_FILE, &result.products);
    match cli.format {
        OutputFormat::Json => serialize_json(&result.products),
        OutputFormat::Text => {
            print_records(&result.products, cli.format);
            println!("{}", result);
        }
    }
}

async fn run_hira(cli: &Cli, action: &HiraAction) {
    let scraper = hira::WebScraper::new()
        .unwrap_or_else(|e| {
            log::error!("Error creating scraper: {}", e);
            process::exit(1);
        })
        .with_output_dir(&cli.output_dir);

    match action {
        HiraAction::Download => {
            let Some(result) = scraper
                .download()
                .await
                .unwrap_or_else(|e| {
                    log::error!("Error downloading benefit list: {}", e);
                    process::exit(1);
                })
            else {
                println!("No bulletins on the benefit-list board.");
                return;
            };

            save_full(cli, hira::scraper::MEDICINE_LIST_FILE, &result.items);
            match cli.format {
                OutputFormat::Json => serialize_json(&result),
                OutputFormat::Text => {
                    print_records(&result.items, cli.format);
                    println!("{}", result);
                }
            }
        }
        HiraAction::Parse { dir } => {
            let dir = dir.as_deref().unwrap_or(cli.output_dir.as_path());
            let items = scraper
                .parse_directory(dir)
                .unwrap_or_else(|e| {
                    log::error!("Error parsing saved spreadsheets: {}", e);
                    process::exit(1);
                });
            if let Err(e) = scraper.csv_writer(hira::scraper::MEDICINE_LIST_FILE).save(&items) {
                log::error!("Error writing CSV: {}", e);
                process::exit(1);
            }

            save_full(cli, hira::scraper::MEDICINE_LIST_FILE, &items);
            print_records(&items, cli.format);
        }
        HiraAction::Opendata { cleanup } => {
            let result = scraper
                .opendata(*cleanup)
                .await
                .unwrap_or_else(|e| {
                    log::error!("Error fetching open data: {}", e);
                    process::exit(1);
                });

            save_full(cli, hira::scraper::HOSPITAL_LIST_FILE, &result.hospitals);
            save_full(cli, hira::scraper::PHARMACY_LIST_FILE, &result.pharmacies);
            match cli.format {
                OutputFormat::Json => serialize_json(&result),
                OutputFormat::Text => println!("{}", result),
            }
        }
        HiraAction::Hospitals => {
            let hospitals = scraper
                .hospitals()
                .await
                .unwrap_or_else(|e| {
                    log::error!("Error fetching hospitals: {}", e);
                    process::exit(1);
                });

            save_full(cli, hira::scraper::HOSPITAL_LIST_FILE, &hospitals);
            print_records(&hospitals, cli.format);
        }
        HiraAction::Pharmacies => {
            let pharmacies = scraper
                .pharmacies()
                .await
                .unwrap_or_else(|e| {
                    log::error!("Error fetching pharmacies: {}", e);
                    process::exit(1);
                });

            save_full(cli, hira::scraper::PHARMACY_LIST_FILE, &pharmacies);
            print_records(&pharmacies, cli.format);
        }
    }
}

fn ensure_dir(dir: &Path) {
    if let Err(e) = std::fs::create_dir_all(dir) {
        log::error!("Error creating {}: {}", dir.display(), e);
        process::exit(1);
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level.clone().into())
        .init();

    ensure_dir(&cli.output_dir);

    match &cli.command {
        Commands::Health => run_health(&cli).await,
        Commands::Nedrug { action } => run_nedrug(&cli, action).await,
        Commands::Hira { action } => run_hira(&cli, action).await,
    }
}
