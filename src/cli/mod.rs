pub mod range;
pub mod report;

use std::path::PathBuf;

use anyhow::Result;
use chrono::{Days, Utc};
use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;

use crate::{
    aggregate::{store::BucketStore, store::JsonBucketStore, DEFAULT_RETENTION_DAYS},
    classify::{Category, CategoryConfig},
    store::{daily_breakdown, summarize, EntryStore},
    tracker::{run_watcher, WatchConfig},
    utils::{
        dir::create_application_default_path,
        logging::{enable_logging, CLI_PREFIX, WATCHER_PREFIX},
    },
};

use range::RangeArgs;
use report::{print_categories, print_daily, print_page, print_summary};

#[derive(Parser, Debug)]
#[command(name = "Tabwatch", version, long_about = None)]
#[command(about = "Tracks which website holds browser focus and where the time goes", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, help = "Enable logging")]
    log: bool,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(
        about = "Watch browser signals on stdin and accumulate sessions. Meant to be launched as a native-messaging host"
    )]
    Watch {
        #[arg(
            long,
            help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
        )]
        dir: Option<PathBuf>,
        #[arg(
            long,
            help = "Remote entry endpoint to mirror sessions to. Without it sessions land in the local entry log"
        )]
        endpoint: Option<String>,
        #[arg(long, help = "Opaque user id attached to mirrored sessions")]
        user: Option<String>,
        #[arg(long, default_value_t = DEFAULT_RETENTION_DAYS, help = "How many days of day buckets to keep")]
        retention_days: u64,
    },
    #[command(about = "Show totals per category, the productivity score and the top domains")]
    Summary {
        #[command(flatten)]
        range: RangeArgs,
        #[arg(long, help = "Application directory")]
        dir: Option<PathBuf>,
    },
    #[command(about = "Show per-day totals per category")]
    Daily {
        #[command(flatten)]
        range: RangeArgs,
        #[arg(long, help = "Application directory")]
        dir: Option<PathBuf>,
    },
    #[command(about = "List recorded entries, newest first")]
    List {
        #[command(flatten)]
        range: RangeArgs,
        #[arg(long, help = "Only entries whose hostname contains this (case-insensitive)")]
        hostname: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 50, help = "Page size, clamped to 1..=100")]
        limit: u32,
        #[arg(long, help = "Application directory")]
        dir: Option<PathBuf>,
    },
    #[command(about = "Edit the productive/unproductive hostname lists")]
    Category {
        #[command(subcommand)]
        command: CategoryCommands,
        #[arg(long, help = "Application directory")]
        dir: Option<PathBuf>,
    },
    #[command(about = "Remove day buckets older than the retention horizon")]
    Purge {
        #[arg(long, default_value_t = DEFAULT_RETENTION_DAYS)]
        days: u64,
        #[arg(long, help = "Application directory")]
        dir: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum CategoryCommands {
    #[command(about = "Assign a hostname to a category. Assigning neutral just clears it")]
    Add {
        hostname: String,
        category: Category,
    },
    #[command(about = "Remove a hostname from both lists")]
    Remove { hostname: String },
    #[command(about = "Print both lists")]
    Show,
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };

    let prefix = match &args.commands {
        Commands::Watch { .. } => WATCHER_PREFIX,
        _ => CLI_PREFIX,
    };

    match args.commands {
        Commands::Watch {
            dir,
            endpoint,
            user,
            retention_days,
        } => {
            let dir = resolve_dir(dir)?;
            enable_logging(prefix, &dir, logging_level, args.log)?;
            run_watcher(WatchConfig {
                dir,
                endpoint,
                user_id: user,
                retention_days,
            })
            .await
        }
        Commands::Summary { range, dir } => {
            let dir = resolve_dir(dir)?;
            enable_logging(prefix, &dir, logging_level, args.log)?;
            let store = EntryStore::open(dir.join("entries.db"))?;
            let entries = store.fetch(&range.to_filter()?)?;
            print_summary(&summarize(&entries));
            Ok(())
        }
        Commands::Daily { range, dir } => {
            let dir = resolve_dir(dir)?;
            enable_logging(prefix, &dir, logging_level, args.log)?;
            let store = EntryStore::open(dir.join("entries.db"))?;
            let entries = store.fetch(&range.to_filter()?)?;
            print_daily(&daily_breakdown(&entries));
            Ok(())
        }
        Commands::List {
            range,
            hostname,
            page,
            limit,
            dir,
        } => {
            let dir = resolve_dir(dir)?;
            enable_logging(prefix, &dir, logging_level, args.log)?;
            let store = EntryStore::open(dir.join("entries.db"))?;
            let mut filter = range.to_filter()?;
            filter.hostname = hostname;
            print_page(&store.list_page(&filter, page, limit)?);
            Ok(())
        }
        Commands::Category { command, dir } => {
            let dir = resolve_dir(dir)?;
            enable_logging(prefix, &dir, logging_level, args.log)?;
            let path = dir.join("categories.json");
            let mut config = CategoryConfig::load(&path)?;
            match command {
                CategoryCommands::Add { hostname, category } => {
                    config.assign(&hostname, category);
                    config.save(&path)?;
                    println!("{hostname} is now {category}");
                }
                CategoryCommands::Remove { hostname } => {
                    if config.remove(&hostname) {
                        config.save(&path)?;
                        println!("{hostname} is now neutral");
                    } else {
                        println!("{hostname} wasn't assigned to anything");
                    }
                }
                CategoryCommands::Show => print_categories(&config),
            }
            Ok(())
        }
        Commands::Purge { days, dir } => {
            let dir = resolve_dir(dir)?;
            enable_logging(prefix, &dir, logging_level, args.log)?;
            let store = JsonBucketStore::new(dir.join("buckets"))?;
            let cutoff = Utc::now()
                .date_naive()
                .checked_sub_days(Days::new(days))
                .expect("Retention horizon before the start of the calendar");
            let removed = store.purge_older_than(cutoff).await?;
            println!("Removed {removed} day buckets older than {cutoff}");
            Ok(())
        }
    }
}

fn resolve_dir(dir: Option<PathBuf>) -> Result<PathBuf> {
    dir.map_or_else(create_application_default_path, Ok)
}
