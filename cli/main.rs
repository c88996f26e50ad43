#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]

use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use ghicast::config::{DEFAULT_TARGET_END, DEFAULT_TARGET_START, ForecastConfig};
use ghicast::data::load_table;
use ghicast::model::TrainedModel;
use ghicast::pipeline::{fit_from_table, forecast_table, forecast_with_model, write_outputs};
use ghicast::query::{PredictionQuery, load_country_predictions, load_global_predictions};

/// Flags that shape the fitted model. Only meaningful where a model is trained.
#[derive(Args)]
pub struct ModelOptions {
    /// Ridge penalty applied to the trend blocks
    #[arg(long)]
    pub ridge_alpha: Option<f64>,

    /// Degree of the year polynomial
    #[arg(long)]
    pub degree: Option<usize>,

    /// Comma-separated anchor years used for training, e.g. 2000,2008,2016
    #[arg(long, value_delimiter = ',')]
    pub anchor_years: Vec<i32>,
}

impl ModelOptions {
    fn apply(&self, config: &mut ForecastConfig) {
        if let Some(alpha) = self.ridge_alpha {
            config.ridge_alpha = alpha;
        }
        if let Some(degree) = self.degree {
            config.polynomial_degree = degree;
        }
        if !self.anchor_years.is_empty() {
            config.anchor_years = self.anchor_years.iter().copied().collect();
        }
    }
}

/// Flags that shape the published forecast: which years, and the clip range.
#[derive(Args)]
pub struct HorizonOptions {
    /// Comma-separated forecast years, e.g. 2025,2030
    #[arg(long, value_delimiter = ',', conflicts_with_all = ["start_year", "end_year"])]
    pub years: Vec<i32>,

    /// First forecast year (inclusive)
    #[arg(long)]
    pub start_year: Option<i32>,

    /// Last forecast year (inclusive)
    #[arg(long)]
    pub end_year: Option<i32>,

    /// Lower bound every prediction is clipped to
    #[arg(long)]
    pub clip_min: Option<f64>,

    /// Upper bound every prediction is clipped to
    #[arg(long)]
    pub clip_max: Option<f64>,
}

impl HorizonOptions {
    fn apply(&self, config: &mut ForecastConfig) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(min) = self.clip_min {
            config.clip_min = min;
        }
        if let Some(max) = self.clip_max {
            config.clip_max = max;
        }
        if !self.years.is_empty() {
            config.target_years = self.years.clone();
        } else if self.start_year.is_some() || self.end_year.is_some() {
            let start = self
                .start_year
                .or_else(|| config.target_years.first().copied())
                .unwrap_or(DEFAULT_TARGET_START);
            let end = self
                .end_year
                .or_else(|| config.target_years.last().copied())
                .unwrap_or(DEFAULT_TARGET_END);
            config.set_target_range(start, end)?;
        }
        Ok(())
    }
}

/// Loads the optional config file, overlays whichever flag groups the subcommand accepts,
/// and validates the result.
fn resolve_config(
    path: Option<&str>,
    model: Option<&ModelOptions>,
    horizon: Option<&HorizonOptions>,
) -> Result<ForecastConfig, Box<dyn std::error::Error>> {
    let mut config = match path {
        Some(path) => {
            println!("Loading configuration from: {path}");
            ForecastConfig::load(path)?
        }
        None => ForecastConfig::default(),
    };
    if let Some(model) = model {
        model.apply(&mut config);
    }
    if let Some(horizon) = horizon {
        horizon.apply(&mut config)?;
    }
    config.validate()?;
    Ok(config)
}

#[derive(Parser)]
#[command(
    name = "ghicast",
    about = "Forecast country-level indicator tables with a shared ridge trend model",
    long_about = "Normalizes wide or long country-by-year indicator tables, fits one shared \
                 penalized quadratic-trend model on the anchor years and publishes clipped \
                 per-country and global forecasts."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit a model on an indicator table and save it as TOML
    Train {
        /// Path to the indicator table (.csv or .tsv)
        #[arg(value_name = "TABLE")]
        input: String,

        /// Where to write the trained model
        #[arg(long, default_value = "model.toml")]
        model: String,

        /// Optional TOML configuration file; command-line flags override its values
        #[arg(long, value_name = "CONFIG")]
        config: Option<String>,

        #[command(flatten)]
        model_options: ModelOptions,
    },
    /// Forecast every training country with a saved model. The model's own ridge strength,
    /// degree and anchor years apply; only the horizon and clip range can be set here.
    Predict {
        /// Path to trained model file (.toml)
        #[arg(long)]
        model: String,

        /// Directory for the two prediction tables
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,

        /// Optional TOML configuration file; command-line flags override its values
        #[arg(long, value_name = "CONFIG")]
        config: Option<String>,

        #[command(flatten)]
        horizon: HorizonOptions,
    },
    /// Train and forecast in one step
    Forecast {
        /// Path to the indicator table (.csv or .tsv)
        #[arg(value_name = "TABLE")]
        input: String,

        /// Directory for the two prediction tables
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,

        /// Also save the trained model to this path
        #[arg(long)]
        save_model: Option<String>,

        /// Optional TOML configuration file; command-line flags override its values
        #[arg(long, value_name = "CONFIG")]
        config: Option<String>,

        #[command(flatten)]
        model_options: ModelOptions,

        #[command(flatten)]
        horizon: HorizonOptions,
    },
    /// Print published predictions filtered by country and year
    Query {
        /// Directory holding the prediction tables
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,

        /// Comma-separated country names (case-insensitive)
        #[arg(long, value_delimiter = ',')]
        country: Vec<String>,

        /// Exact year
        #[arg(long)]
        year: Option<i32>,

        /// First year of an inclusive range
        #[arg(long)]
        start_year: Option<i32>,

        /// Last year of an inclusive range
        #[arg(long)]
        end_year: Option<i32>,

        /// Print the global series instead of per-country rows
        #[arg(long)]
        global: bool,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let result = match cli.command {
        Some(Commands::Train {
            input,
            model,
            config,
            model_options,
        }) => resolve_config(config.as_deref(), Some(&model_options), None)
            .and_then(|resolved| run_train(&input, &model, &resolved)),
        Some(Commands::Predict {
            model,
            out_dir,
            config,
            horizon,
        }) => resolve_config(config.as_deref(), None, Some(&horizon))
            .and_then(|resolved| run_predict(&model, &out_dir, &resolved)),
        Some(Commands::Forecast {
            input,
            out_dir,
            save_model,
            config,
            model_options,
            horizon,
        }) => resolve_config(config.as_deref(), Some(&model_options), Some(&horizon))
            .and_then(|resolved| {
                run_forecast(&input, &out_dir, save_model.as_deref(), &resolved)
            }),
        Some(Commands::Query {
            out_dir,
            country,
            year,
            start_year,
            end_year,
            global,
        }) => {
            let query = PredictionQuery {
                countries: country,
                year,
                start_year,
                end_year,
            };
            run_query(&out_dir, &query, global)
        }
        None => Cli::command().print_help().map_err(Into::into),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run_train(
    input: &str,
    model_path: &str,
    config: &ForecastConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Loading indicator table from: {input}");
    let df = load_table(input)?;

    println!("Training model on anchor years {:?}", config.anchor_years);
    let model = fit_from_table(&df, config)?;
    println!(
        "Fitted {} countries (RMSE {:.4}, R² {:.4})",
        model.vocabulary.len(),
        model.fit.rmse,
        model.fit.r_squared
    );

    model.save(model_path)?;
    println!("Model saved to: {model_path}");
    Ok(())
}

fn run_predict(
    model_path: &str,
    out_dir: &std::path::Path,
    config: &ForecastConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Loading model from: {model_path}");
    let model = TrainedModel::load(model_path)?;
    println!(
        "Model: {} countries, degree {}, ridge_alpha {}",
        model.vocabulary.len(),
        model.config.polynomial_degree,
        model.config.ridge_alpha
    );

    let (countries, global) = forecast_with_model(&model, config)?;
    write_outputs(out_dir, &countries, &global)?;
    println!(
        "Predictions for {} country-years saved to: {}",
        countries.rows.len(),
        out_dir.display()
    );
    Ok(())
}

fn run_forecast(
    input: &str,
    out_dir: &std::path::Path,
    save_model: Option<&str>,
    config: &ForecastConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Loading indicator table from: {input}");
    let df = load_table(input)?;

    let outputs = forecast_table(&df, config)?;
    if let Some(path) = save_model {
        outputs.model.save(path)?;
        println!("Model saved to: {path}");
    }

    write_outputs(out_dir, &outputs.countries, &outputs.global)?;
    println!(
        "Forecast {} countries for years {:?}; tables saved to: {}",
        outputs.model.vocabulary.len(),
        config.target_years,
        out_dir.display()
    );
    Ok(())
}

fn run_query(
    out_dir: &std::path::Path,
    query: &PredictionQuery,
    global: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(std::io::stdout());
    if global {
        let rows = load_global_predictions(out_dir)?;
        writer.write_record(["year", "global_ghi_mean"])?;
        for row in query.filter_global(&rows) {
            writer.serialize(row)?;
        }
    } else {
        let rows = load_country_predictions(out_dir)?;
        writer.write_record(["country", "year", "ghi_pred"])?;
        for row in query.filter_countries(&rows) {
            writer.serialize(row)?;
        }
    }
    writer.flush()?;
    Ok(())
}
