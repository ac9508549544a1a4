//! logo-matte - strip near-white backgrounds from images
//!
//! CLI entry point

use anyhow::Context;
use clap::Parser;
use logo_matte::{
    collect_inputs, exit_codes, logging, CheckArgs, Cli, Commands, CommonArgs, Config,
    ItemOutcome, OutputMode, Pipeline, StripArgs, StripError,
};

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() {
                exit_codes::INVALID_ARGS
            } else {
                exit_codes::SUCCESS
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    let code = match cli.command {
        Commands::Strip(args) => run_strip(&args),
        Commands::Check(args) => run_check(&args),
        Commands::Info => run_info(),
    };

    std::process::exit(match code {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            exit_codes::GENERAL_ERROR
        }
    });
}

fn load_config(common: &CommonArgs) -> anyhow::Result<Config> {
    logging::init(common.verbose, common.quiet);

    match &common.config {
        Some(path) => Config::load_from_path(path).context("loading --config"),
        None => Ok(Config::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "ignoring unreadable config, using defaults");
            Config::default()
        })),
    }
}

fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("starting async runtime")
}

// ============ Strip Command ============

fn run_strip(args: &StripArgs) -> anyhow::Result<i32> {
    let config = load_config(&args.common)?.merge_with_cli(&args.overrides());

    let sources = collect_inputs(&args.inputs).context("reading inputs")?;
    if sources.is_empty() {
        eprintln!("Error: no images found in inputs");
        return Ok(exit_codes::INPUT_NOT_FOUND);
    }

    let mode = if args.data_uri {
        OutputMode::DataUri
    } else {
        OutputMode::Directory(config.output_dir.clone())
    };

    let report = runtime()?.block_on(logo_matte::run_batch(sources, &config, mode.clone()));

    for item in &report.items {
        match &item.outcome {
            ItemOutcome::Processed { output } | ItemOutcome::FellBack { output, .. } => {
                if mode == OutputMode::DataUri {
                    println!("{}", output);
                } else if !args.common.quiet {
                    println!("{} -> {}", item.source, output);
                }
            }
            ItemOutcome::Failed { error } => {
                eprintln!("Error processing {}: {}", item.source, error);
            }
        }
    }

    if !args.common.quiet && mode != OutputMode::DataUri {
        println!(
            "Processed: {}, fallback: {}, failed: {}",
            report.processed(),
            report.fell_back(),
            report.failed()
        );
    }

    if report.failed() > 0 {
        return Ok(exit_codes::PROCESSING_FAILED);
    }
    if report.processed() == 0 && report.items.iter().all(|i| is_missing(&i.outcome)) {
        return Ok(exit_codes::INPUT_NOT_FOUND);
    }
    Ok(exit_codes::SUCCESS)
}

fn is_missing(outcome: &ItemOutcome) -> bool {
    let error = match outcome {
        ItemOutcome::FellBack { error, .. } | ItemOutcome::Failed { error } => error,
        ItemOutcome::Processed { .. } => return false,
    };
    matches!(
        error,
        StripError::Load {
            cause: logo_matte::LoadCause::NotFound,
            ..
        }
    )
}

// ============ Check Command ============

fn run_check(args: &CheckArgs) -> anyhow::Result<i32> {
    let config = load_config(&args.common)?.merge_with_cli(&args.overrides());
    let source = logo_matte::ImageSource::parse(&args.input);
    let pipeline = Pipeline::new(config.to_pipeline_options());

    let stats = match runtime()?.block_on(pipeline.inspect(&source)) {
        Ok(stats) => stats,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(exit_codes::PROCESSING_FAILED);
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("Source:     {}", source);
        println!("Size:       {}x{}", stats.image_size.0, stats.image_size.1);
        println!("Threshold:  {}", config.threshold);
        println!(
            "Stripped:   {} of {} pixels ({:.2}%)",
            stats.stripped_pixels,
            stats.total_pixels,
            stats.coverage_percent()
        );
    }

    Ok(exit_codes::SUCCESS)
}

// ============ Info Command ============

fn run_info() -> anyhow::Result<i32> {
    println!("logo-matte v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Config File Locations:");
    for path in Config::search_paths() {
        let state = if path.is_file() { "found" } else { "not found" };
        println!("  {} ({})", path.display(), state);
    }
    println!();
    println!("Effective Config:");
    let config = Config::load().unwrap_or_default();
    println!("{}", config.to_json());
    println!();
    println!("CPUs: {}", num_cpus::get());

    Ok(exit_codes::SUCCESS)
}
