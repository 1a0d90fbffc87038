use clap::{Parser, Subcommand};
use complaint_triage::{
    config::{Config, ObservabilityConfig},
    dataset::{self, DatasetSummary},
    ComplaintInput, SeverityClassifier, TriageError,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "complaint-triage")]
#[command(about = "Severity triage for citizen health complaints", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true, env = "TRIAGE_CONFIG_PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a classifier from a labelled CSV and print its metrics
    Train {
        /// Training CSV (defaults to paths.dataset)
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Where to save the trained model (defaults to paths.model)
        #[arg(short, long)]
        model_out: Option<PathBuf>,
    },

    /// Predict the severity of one complaint
    Predict {
        /// Saved model (defaults to paths.model)
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Complaint text
        #[arg(short = 't', long)]
        comment: String,

        #[arg(long, default_value = ComplaintInput::DEFAULT_CITY)]
        city: String,

        #[arg(long, default_value_t = ComplaintInput::DEFAULT_AGE)]
        age: u32,

        #[arg(long, default_value = ComplaintInput::DEFAULT_GENDER)]
        gender: String,

        #[arg(long, default_value = ComplaintInput::DEFAULT_URGENCY)]
        urgency: String,

        #[arg(long, default_value = ComplaintInput::DEFAULT_CATEGORY)]
        category: String,

        /// Complaint comes from a rural zone
        #[arg(long)]
        rural: bool,

        /// Complainant has no internet access
        #[arg(long)]
        no_internet: bool,

        /// The government has not attended the problem before
        #[arg(long)]
        no_prior_attention: bool,
    },

    /// Print the metrics stored in a saved model
    Metrics {
        #[arg(short, long)]
        model: Option<PathBuf>,
    },

    /// Print descriptive statistics of a dataset
    Summary {
        #[arg(short, long)]
        data: Option<PathBuf>,
    },
}

fn init_tracing(observability: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("complaint_triage={}", observability.log_level).into()
    });

    // Logs go to stderr so stdout stays machine-readable JSON
    let registry = tracing_subscriber::registry().with(filter);
    if observability.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn resolve(arg: Option<PathBuf>, configured: &Option<PathBuf>, what: &str) -> Result<PathBuf, TriageError> {
    arg.or_else(|| configured.clone()).ok_or_else(|| {
        TriageError::Configuration(format!(
            "no {} path given on the command line or in configuration",
            what
        ))
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<(), TriageError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_classifier(path: &Path, config: &Config) -> Result<SeverityClassifier, TriageError> {
    SeverityClassifier::from_file(path, config.classifier.clone())
}

fn run(cli: Cli, config: Config) -> Result<(), TriageError> {
    match cli.command {
        Commands::Train { data, model_out } => {
            let data = resolve(data, &config.paths.dataset, "dataset")?;
            let mut classifier = SeverityClassifier::new(config.classifier.clone());
            let report = classifier.train(&data)?;

            if let Some(out) = model_out.or_else(|| config.paths.model.clone()) {
                classifier.save(&out)?;
            }
            print_json(&report)
        }

        Commands::Predict {
            model,
            comment,
            city,
            age,
            gender,
            urgency,
            category,
            rural,
            no_internet,
            no_prior_attention,
        } => {
            let model = resolve(model, &config.paths.model, "model")?;
            let classifier = load_classifier(&model, &config)?;

            let input = ComplaintInput::new(comment)
                .with_city(city)
                .with_age(Some(age))
                .with_gender(gender)
                .with_urgency(urgency)
                .with_category(category)
                .with_rural(rural)
                .with_internet_access(!no_internet)
                .with_prior_attention(!no_prior_attention);

            print_json(&classifier.predict(&input)?)
        }

        Commands::Metrics { model } => {
            let model = resolve(model, &config.paths.model, "model")?;
            let classifier = load_classifier(&model, &config)?;
            print_json(classifier.metrics()?)
        }

        Commands::Summary { data } => {
            let data = resolve(data, &config.paths.dataset, "dataset")?;
            let records = dataset::load_records(&data, config.classifier.feature_set)?;
            print_json(&DatasetSummary::from_records(&records))
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config.observability);
    tracing::debug!(
        service = %config.observability.service_name,
        version = env!("CARGO_PKG_VERSION"),
        "Configuration loaded"
    );

    match run(cli, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(code = e.error_code(), "{}", e);
            eprintln!("error [{}]: {}", e.error_code(), e);
            ExitCode::FAILURE
        }
    }
}
