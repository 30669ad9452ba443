#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]

use clap::{Args, CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::PathBuf;
use std::process;

use mutate::config::MutateConfig;
use mutate::data::load_dataset;
use mutate::evaluate::{Evaluator, IterationRecord};
use mutate::progress::IterationObserver;
use mutate::reference::{compare, reference_fit};
use mutate::report::{describe_r_squared, format_comparison, write_iterations, write_summary};
use mutate::summary::summarize;

#[derive(Parser)]
#[command(
    name = "mutate",
    version,
    about = "Multiple train/test resampling of a fixed OLS model",
    long_about = "Repeatedly splits a dataset into training and holdout rows, refits one \
                 linear model form on each training split, and summarizes the sampling \
                 distribution of the coefficients and of training and holdout R-squared."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the resampling loop (outputs: iterations.tsv, summary.toml)
    Run(RunArgs),
    /// Fit the model once on the full dataset and print the coefficient table
    Fit(FitArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Path to the data file (CSV by default, see `separator` in the config)
    data: String,

    /// Path to the TOML run configuration
    #[arg(long)]
    config: String,

    /// Directory that receives iterations.tsv and summary.toml
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Override the configured iteration count
    #[arg(long, value_name = "N")]
    iterations: Option<usize>,

    /// Override the configured training fraction
    #[arg(long, value_name = "RATIO")]
    split_ratio: Option<f64>,

    /// Override the configured seed offset (iteration i uses offset + i)
    #[arg(long)]
    seed_offset: Option<u64>,

    /// Fan iterations out over all cores
    #[arg(long)]
    parallel: bool,
}

#[derive(Args)]
struct FitArgs {
    /// Path to the data file
    data: String,

    /// Path to the TOML run configuration
    #[arg(long)]
    config: String,
}

struct ProgressObserver {
    bar: ProgressBar,
}

impl ProgressObserver {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{bar:40} {pos}/{len} iterations [{elapsed_precise}]")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        Self { bar }
    }
}

impl IterationObserver for ProgressObserver {
    fn on_start(&self, total_iterations: usize) {
        self.bar.set_length(total_iterations as u64);
    }

    fn on_iteration(&self, record: &IterationRecord) {
        let _ = record;
        self.bar.inc(1);
    }

    fn on_finish(&self) {
        self.bar.finish_and_clear();
    }
}

fn run_mutate(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = MutateConfig::load(&args.config)?;
    if let Some(iterations) = args.iterations {
        config.iterations = iterations;
    }
    if let Some(split_ratio) = args.split_ratio {
        config.split_ratio = split_ratio;
    }
    if let Some(seed_offset) = args.seed_offset {
        config.seed_offset = seed_offset;
    }
    config.parallel |= args.parallel;

    println!("Loading data from: {}", args.data);
    let data = load_dataset(&args.data, &config.load_options()?)?;
    println!(
        "Loaded {} rows; model {} ~ {}",
        data.n_rows(),
        config.target,
        config.predictors.join(" + ")
    );

    let spec = config.model_spec();
    let evaluator = Evaluator::new(&data, &spec, config.split_ratio, config.iterations)?;
    println!(
        "Running {} iterations at split ratio {} ({} training / {} holdout rows each)",
        evaluator.iterations(),
        evaluator.split_ratio(),
        evaluator.n_train(),
        evaluator.n_holdout()
    );

    let seeds = config.seeds();
    let observer = ProgressObserver::new();
    let table = if config.parallel {
        evaluator.run_parallel(&seeds, &observer)?
    } else {
        evaluator.run_observed(&seeds, &observer)?
    };

    let summary = summarize(&table);
    let reference = reference_fit(&data, &spec)?;
    let comparison = compare(&summary, &reference);

    fs::create_dir_all(&args.out_dir)?;
    let iterations_path = args.out_dir.join("iterations.tsv");
    let summary_path = args.out_dir.join("summary.toml");
    write_iterations(&table, &iterations_path)?;
    write_summary(&summary, Some(&reference), &comparison, &summary_path)?;

    println!("{}", describe_r_squared(&summary));
    println!();
    println!("{}", format_comparison(&comparison));
    println!();
    println!("Iterations saved to: {}", iterations_path.display());
    println!("Summary saved to: {}", summary_path.display());
    Ok(())
}

fn run_fit(args: FitArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = MutateConfig::load(&args.config)?;
    let data = load_dataset(&args.data, &config.load_options()?)?;
    let fit = reference_fit(&data, &config.model_spec())?;

    println!(
        "{:<16}  {:>12}  {:>12}  {:>8}",
        "coefficient", "estimate", "std_error", "t_value"
    );
    for coefficient in &fit.coefficients {
        println!(
            "{:<16}  {:>12.4}  {:>12.4}  {:>8.3}",
            coefficient.name, coefficient.estimate, coefficient.std_error, coefficient.t_value
        );
    }
    println!();
    println!(
        "Residual standard error: {:.4} on {} degrees of freedom",
        fit.residual_standard_error, fit.df_residual
    );
    println!(
        "R-squared: {:.4}, adjusted R-squared: {:.4}",
        fit.r_squared, fit.adjusted_r_squared
    );
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let result = match cli.command {
        Some(Commands::Run(args)) => run_mutate(args),
        Some(Commands::Fit(args)) => run_fit(args),
        None => {
            Cli::command().print_help().expect("print help");
            println!();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
