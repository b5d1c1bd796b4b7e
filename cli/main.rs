// ========================================================================================
//
//                      THE COMMAND-LINE FRONT END: LIQUIDCGP
//
// ========================================================================================
//
// This binary is the input boundary. It gathers one patient's clinical record, either
// from flags or from a TOML record file, enforces the bounds the models assume, and
// drives the encode, score and render pass once before exiting.

#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

use chrono::NaiveDate;
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::error::Error;
use std::path::PathBuf;
use std::process;
use std::time::Instant;

use liquidcgp::encode::encode;
use liquidcgp::ensemble::{DEFAULT_MODEL_DIR, EnsembleSpec, NUM_FOLDS};
use liquidcgp::pipeline::predict_with_spec;
use liquidcgp::record::{
    ClinicalRecord, MAX_AGE, MAX_TREATMENT_LINE, MetastasisSite, PerformanceStatus, Response,
    Sex, parse_date,
};
use liquidcgp::report::DISCLAIMER;

// ========================================================================================
//                           APPLICATION-LEVEL CONSTANTS
// ========================================================================================

/// Edge length, in pixels, of the rendered pie chart.
const DEFAULT_CHART_SIZE_PX: u32 = 200;

// ========================================================================================
//                         COMMAND-LINE INTERFACE DEFINITION
// ========================================================================================

#[derive(Parser)]
#[command(
    name = "liquidcgp",
    version,
    about = "Predict ctDNA detection by liquid CGP in pancreatic adenocarcinoma patients",
    long_about = "Predicts the probability that liquid comprehensive genomic profiling tests \
                 detect circulating tumor DNA, by averaging an ensemble of pre-trained \
                 logistic models over the patient's clinical data."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Score one patient with the model ensemble
    #[command(about = "Predict the probability (%) that ctDNA is detected")]
    Predict(PredictArgs),

    /// Print the feature vector a record encodes to, without loading any models
    #[command(about = "Show the encoded feature vector")]
    Encode(RecordArgs),

    /// Display version information
    #[command(about = "Display version information")]
    Version,
}

/// The patient's clinical data, from flags or from a record file.
#[derive(Args)]
struct RecordArgs {
    /// TOML file holding the whole record instead of individual flags
    #[arg(long, value_name = "PATH", conflicts_with_all = [
        "sex", "age", "ps", "diagnosis_date", "specimen_date", "treatment_line", "response", "metastasis"
    ])]
    record: Option<PathBuf>,

    #[arg(long, value_enum, required_unless_present = "record")]
    sex: Option<Sex>,

    #[arg(long, required_unless_present = "record",
          value_parser = clap::value_parser!(u32).range(..=i64::from(MAX_AGE)))]
    age: Option<u32>,

    /// ECOG performance status
    #[arg(long, value_enum, required_unless_present = "record")]
    ps: Option<PerformanceStatus>,

    /// Diagnosis date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE", required_unless_present = "record", value_parser = parse_date)]
    diagnosis_date: Option<NaiveDate>,

    /// Specimen collection date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE", required_unless_present = "record", value_parser = parse_date)]
    specimen_date: Option<NaiveDate>,

    /// Current treatment line
    #[arg(long, required_unless_present = "record",
          value_parser = clap::value_parser!(u32).range(..=i64::from(MAX_TREATMENT_LINE)))]
    treatment_line: Option<u32>,

    /// Best response to the current treatment line
    #[arg(long, value_enum, required_unless_present = "record")]
    response: Option<Response>,

    /// Metastatic site; repeat the flag or separate sites with commas
    #[arg(long, value_enum, value_delimiter = ',', value_name = "SITE")]
    metastasis: Vec<MetastasisSite>,
}

/// Where to find the ensemble members.
#[derive(Args)]
struct ModelArgs {
    /// Directory containing the ensemble member artifacts
    #[arg(long, value_name = "DIR", env = "LIQUIDCGP_MODELS", default_value = DEFAULT_MODEL_DIR)]
    models: PathBuf,
}

#[derive(Args)]
struct PredictArgs {
    #[command(flatten)]
    record: RecordArgs,

    #[command(flatten)]
    models: ModelArgs,

    /// Write the result as an SVG pie chart to this path
    #[arg(long, value_name = "PATH")]
    chart: Option<PathBuf>,

    /// Edge length of the chart in pixels
    #[arg(long, value_name = "PX", default_value_t = DEFAULT_CHART_SIZE_PX)]
    chart_size: u32,

    /// Also print each member's probability
    #[arg(long)]
    verbose: bool,
}

// ========================================================================================
//                           THE MAIN ORCHESTRATION LOGIC
// ========================================================================================

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Predict(args)) => run_predict(args),
        Some(Commands::Encode(args)) => run_encode(args),
        Some(Commands::Version) => {
            println!("liquidcgp {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        None => Cli::command()
            .print_help()
            .map(|()| println!())
            .map_err(|e| Box::new(e) as Box<dyn Error>),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run_predict(args: PredictArgs) -> Result<(), Box<dyn Error>> {
    let start_time = Instant::now();
    let record = args.record.into_record()?;

    let spec = EnsembleSpec::new(args.models.models);
    eprintln!(
        "> Loading {NUM_FOLDS} ensemble members from {}",
        spec.model_dir.display()
    );

    let prediction = predict_with_spec(&record, &spec)?;

    println!("Result: {}", prediction.formatted());
    if args.verbose {
        println!("{}", prediction.member_breakdown());
    }

    if let Some(path) = &args.chart {
        prediction.chart().write_svg(path, args.chart_size)?;
        eprintln!("> Chart written to {}", path.display());
    }

    println!("{DISCLAIMER}");
    eprintln!("> Prediction done in {:.2?}", start_time.elapsed());
    Ok(())
}

fn run_encode(args: RecordArgs) -> Result<(), Box<dyn Error>> {
    let record = args.into_record()?;
    for (name, value) in encode(&record).named() {
        println!("{name}\t{value}");
    }
    Ok(())
}

// ========================================================================================
//                                  HELPER FUNCTIONS
// ========================================================================================

fn missing(flag: &str) -> Box<dyn Error> {
    format!("Missing required argument {flag}").into()
}

impl RecordArgs {
    /// Builds the record and checks the numeric bounds the models assume.
    fn into_record(self) -> Result<ClinicalRecord, Box<dyn Error>> {
        if let Some(path) = &self.record {
            eprintln!("> Reading clinical record from {}", path.display());
            return Ok(ClinicalRecord::load(path)?);
        }

        let record = ClinicalRecord {
            sex: self.sex.ok_or_else(|| missing("--sex"))?,
            age: self.age.ok_or_else(|| missing("--age"))?,
            performance_status: self.ps.ok_or_else(|| missing("--ps"))?,
            diagnosis_date: self
                .diagnosis_date
                .ok_or_else(|| missing("--diagnosis-date"))?,
            specimen_date: self
                .specimen_date
                .ok_or_else(|| missing("--specimen-date"))?,
            treatment_line: self
                .treatment_line
                .ok_or_else(|| missing("--treatment-line"))?,
            response: self.response.ok_or_else(|| missing("--response"))?,
            metastases: self.metastasis.into_iter().collect(),
        };
        record.check_bounds()?;
        Ok(record)
    }
}
