use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{info, warn};
use std::path::PathBuf;

use sabim_ai_tools::config::{Settings, DEFAULT_MODEL};
use sabim_ai_tools::{load_records, replay, Analyzer, JsonStore, LlmClient, Outcome, RunMode};

const BANNER: &str = "\
#===========================================================================#
# SabiM-AI-Tools  Copyright (C) 2024  Natan Moreira Regis                   #
# This program comes with ABSOLUTELY NO WARRANTY; for details see LICENSE.  #
# This is free software, and you are welcome to redistribute it             #
# under certain conditions; see LICENSE file for details.                   #
#===========================================================================#
";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Activity {
    /// Analyse every article in the bibliography
    All,
    /// Analyse only articles without a stored result
    Remaining,
    /// Print previously stored results without calling a model
    Replay,
}

/// CLI app for summarising scientific articles from a BibTeX file with a language model
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Bibliography file (.bib, or an exported .json record file)
    #[arg(short, long)]
    file: PathBuf,
    /// Model name; `llama*` runs on a local Ollama server, `gemini*` on Google's API
    #[arg(short, long, default_value = DEFAULT_MODEL)]
    model: String,
    /// API key for credentialed backends (falls back to GEMINI_API_KEY)
    #[arg(short = 'k', long)]
    api_key: Option<String>,
    /// What to do with the bibliography
    #[arg(short, long, value_enum, default_value_t = Activity::Remaining)]
    activity: Activity,
    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Configure logging
    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    println!("{}", BANNER);

    let settings = Settings::from_env();
    let store = JsonStore::at(&settings.store_path);

    if args.activity == Activity::Replay {
        let records = replay(&store)
            .with_context(|| format!("Failed to read previous results from {:?}", store.path()))?;
        info!("Replaying {} stored results", records.len());
        for record in records {
            println!("{}", record.id);
            println!("{}", record.ai_result().unwrap_or_default());
        }
        return Ok(());
    }

    let mode = match args.activity {
        Activity::All => RunMode::All,
        _ => RunMode::Remaining,
    };

    let sources = load_records(&args.file)
        .with_context(|| format!("Failed to load bibliography from {:?}", args.file))?;
    if sources.is_empty() {
        warn!("No entries found in {:?}, nothing to analyse", args.file);
        return Ok(());
    }
    info!("Loaded {} entries from {:?}", sources.len(), args.file);

    let client = LlmClient::new(&args.model, args.api_key.clone(), &settings)?;
    let analyzer = Analyzer::new(client, store);

    let report = analyzer
        .run_with_progress(&sources, mode, |record, outcome| {
            if *outcome != Outcome::Skipped {
                println!("{}", record.id);
                println!("{}", record.ai_result().unwrap_or_default());
            }
        })
        .with_context(|| format!("Analysis stopped; results so far are in {:?}", settings.store_path))?;

    info!(
        "Results written to {:?} ({} model calls, {} skipped)",
        settings.store_path, report.model_calls, report.skipped
    );

    Ok(())
}
