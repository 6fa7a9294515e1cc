use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use ollawv::{
    ApplicationLauncher, BiasPolicy, Configuration, FoldPolicy, SearchRange, TrainParams,
};

/// Perform SVM training for the given data set.
#[derive(Parser, Debug)]
#[command(name = "ollawv", version, about)]
struct Cli {
    /// Input data set (LIBSVM sparse text format).
    input: PathBuf,

    /// C value (lower bound).
    #[arg(long, default_value_t = 0.001)]
    c_low: f64,

    /// C value (upper bound).
    #[arg(long, default_value_t = 10000.0)]
    c_high: f64,

    /// Gamma value (lower bound).
    #[arg(long, default_value_t = 0.0009765625)]
    gamma_low: f64,

    /// Gamma value (upper bound).
    #[arg(long, default_value_t = 16.0)]
    gamma_high: f64,

    /// Grid resolution for C and gamma.
    #[arg(long, default_value_t = 8)]
    resolution: usize,

    /// Outer cross-validation folds (1 disables the outer level).
    #[arg(long, default_value_t = 1)]
    outer_folds: usize,

    /// Inner cross-validation folds (1 disables cross-validation).
    #[arg(long, default_value_t = 10)]
    inner_folds: usize,

    /// Bias evaluation strategy.
    #[arg(long, value_enum, default_value = "yes")]
    bias: BiasArg,

    /// SGD iteration budget as a fraction of the problem size.
    #[arg(long, default_value_t = 0.5)]
    epochs: f64,

    /// Early-exit margin in units of C.
    #[arg(long, default_value_t = 0.1)]
    margin: f64,

    /// Kernel cache size in MiB.
    #[arg(long, default_value_t = 200)]
    cache_size: usize,

    /// Fold assignment policy.
    #[arg(long, value_enum, default_value = "fair")]
    fold_policy: FoldArg,

    /// Seed for shuffling and uniform fold assignment.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Keep the input sample order.
    #[arg(long)]
    no_shuffle: bool,

    /// Write the model JSON here instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BiasArg {
    Yes,
    No,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FoldArg {
    Fair,
    Uniform,
}

fn configuration(cli: &Cli) -> Configuration {
    Configuration {
        input: cli.input.clone(),
        search: SearchRange {
            c_low: cli.c_low,
            c_high: cli.c_high,
            c_resolution: cli.resolution,
            gamma_low: cli.gamma_low,
            gamma_high: cli.gamma_high,
            gamma_resolution: cli.resolution,
        },
        train: TrainParams {
            bias: match cli.bias {
                BiasArg::Yes => BiasPolicy::Yes,
                BiasArg::No => BiasPolicy::No,
            },
            epochs: cli.epochs,
            margin: cli.margin,
            cache_bytes: cli.cache_size << 20,
        },
        inner_folds: cli.inner_folds,
        outer_folds: cli.outer_folds,
        fold_policy: match cli.fold_policy {
            FoldArg::Fair => FoldPolicy::Fair,
            FoldArg::Uniform => FoldPolicy::Uniform,
        },
        seed: cli.seed,
        shuffle: !cli.no_shuffle,
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let conf = configuration(&cli);

    let result = ApplicationLauncher::new(conf).and_then(|launcher| launcher.run());
    let (report, document) = match result {
        Ok(run) => run,
        Err(error) => {
            eprintln!("error: {error}");
            return ExitCode::from(2);
        }
    };

    let json = match serde_json::to_string_pretty(&document) {
        Ok(json) => json,
        Err(error) => {
            eprintln!("error: cannot serialize model: {error}");
            return ExitCode::from(2);
        }
    };
    if let Some(path) = &cli.output {
        if let Err(error) = std::fs::write(path, json) {
            eprintln!("error: cannot write '{}': {error}", path.display());
            return ExitCode::from(2);
        }
    } else {
        println!("{json}");
    }

    eprintln!(
        "accuracy={:.4} C={:.4} gamma={:.4} sv={}",
        report.accuracy, report.c, report.gamma, report.sv_count
    );
    ExitCode::SUCCESS
}
