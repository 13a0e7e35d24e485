use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};

use indperf::criteria::CriteriaTemplate;
use indperf::criteria::loader::load_template;
use indperf::input::{InputError, load_expert_scores, load_press_types, load_series_table};
use indperf::logging::init_tracing;
use indperf::model::family::Family;
use indperf::model::nrmse::{BackTransform, NrmseMethod, Transform};
use indperf::model::settings::{
    FitSettings, InteractionSettings, MissingPressurePolicy, ScoringProfile, SplitMode,
};
use indperf::pipeline::stage7_summary::{Stage7Inputs, SummaryViews, run_stage7};
use indperf::pipeline::{AssessmentInputs, PipelineError, run_assessment};
use indperf::report::json::{load_scores_json, render_summary_json, write_scores_json};
use indperf::report::tables::{
    write_breakdown_csv, write_diagnostics_csv, write_matrix_csv, write_overview_csv,
    write_predictions_csv,
};
use indperf::report::text::render_report_text;
use indperf::report::RunSummary;

#[derive(Parser)]
#[command(name = "indperf")]
#[command(about = "Assess indicator performance against trends and pressures", long_about = None)]
struct Cli {
    /// Debug-level logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit trend and pressure models, score criteria and aggregate
    Run {
        /// Indicator CSV: time column first, one column per indicator
        #[arg(long)]
        ind: PathBuf,

        /// Pressure CSV sharing the indicator time column
        #[arg(long)]
        press: Option<PathBuf>,

        /// Output directory
        #[arg(long)]
        out: PathBuf,

        /// CSV with columns press,press_type
        #[arg(long)]
        press_types: Option<PathBuf>,

        /// CSV with expert scores: ind,subcrit,score
        #[arg(long)]
        expert: Option<PathBuf>,

        /// Criteria template JSON (defaults to the built-in template)
        #[arg(long)]
        template: Option<PathBuf>,

        /// Fraction of time steps used for fitting
        #[arg(long, default_value_t = 0.9)]
        train: f64,

        /// Draw training steps at random instead of taking the first ones
        #[arg(long, default_value_t = false)]
        random_split: bool,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Basis dimension of each smooth term
        #[arg(long, default_value_t = 4)]
        k: usize,

        #[arg(long, default_value = "gaussian")]
        family: String,

        /// Link function (defaults to the canonical link of the family)
        #[arg(long)]
        link: Option<String>,

        #[arg(long, default_value_t = 0.05)]
        alpha: f64,

        #[arg(long, value_enum, default_value_t = NrmseArg::Sd)]
        nrmse: NrmseArg,

        /// Transform already applied to the indicator data
        #[arg(long, value_enum, default_value_t = TransformArg::None)]
        transform: TransformArg,

        /// Series back-transformed before computing the NRMSE
        #[arg(long, value_enum, default_value_t = BackArg::None)]
        back_transform: BackArg,

        /// Skip threshold interaction tests
        #[arg(long, default_value_t = false)]
        no_interactions: bool,

        #[arg(long, value_enum, default_value_t = MissingArg::Zero)]
        missing_pressure: MissingArg,
    },
    /// Aggregate a previously written score table
    Summary {
        /// scores.json written by `run`
        #[arg(long)]
        scores: PathBuf,

        #[arg(long)]
        out: PathBuf,

        #[arg(long)]
        template: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = MissingArg::Zero)]
        missing_pressure: MissingArg,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum NrmseArg {
    Range,
    Mean,
    Sd,
    Iq,
}

#[derive(Clone, Copy, ValueEnum)]
enum TransformArg {
    None,
    Sqrt,
    FourthRoot,
    Log,
    Log10,
    Log1p,
}

#[derive(Clone, Copy, ValueEnum)]
enum BackArg {
    None,
    Observed,
    Predicted,
    Both,
}

#[derive(Clone, Copy, ValueEnum)]
enum MissingArg {
    Zero,
    Missing,
}

impl From<NrmseArg> for NrmseMethod {
    fn from(value: NrmseArg) -> Self {
        match value {
            NrmseArg::Range => NrmseMethod::Range,
            NrmseArg::Mean => NrmseMethod::Mean,
            NrmseArg::Sd => NrmseMethod::Sd,
            NrmseArg::Iq => NrmseMethod::Iq,
        }
    }
}

impl From<TransformArg> for Transform {
    fn from(value: TransformArg) -> Self {
        match value {
            TransformArg::None => Transform::None,
            TransformArg::Sqrt => Transform::Sqrt,
            TransformArg::FourthRoot => Transform::FourthRoot,
            TransformArg::Log => Transform::Log,
            TransformArg::Log10 => Transform::Log10,
            TransformArg::Log1p => Transform::Log1p,
        }
    }
}

impl From<BackArg> for BackTransform {
    fn from(value: BackArg) -> Self {
        match value {
            BackArg::None => BackTransform::None,
            BackArg::Observed => BackTransform::Observed,
            BackArg::Predicted => BackTransform::Predicted,
            BackArg::Both => BackTransform::Both,
        }
    }
}

impl From<MissingArg> for MissingPressurePolicy {
    fn from(value: MissingArg) -> Self {
        match value {
            MissingArg::Zero => MissingPressurePolicy::Zero,
            MissingArg::Missing => MissingPressurePolicy::Missing,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if let Err(err) = run(cli.command) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<(), PipelineError> {
    match command {
        Commands::Run {
            ind,
            press,
            out,
            press_types,
            expert,
            template,
            train,
            random_split,
            seed,
            k,
            family,
            link,
            alpha,
            nrmse,
            transform,
            back_transform,
            no_interactions,
            missing_pressure,
        } => {
            let fit = FitSettings {
                train_fraction: train,
                split: if random_split {
                    SplitMode::Random { seed }
                } else {
                    SplitMode::Sequential
                },
                k,
                family: Family::parse(&family, link.as_deref())?,
                nrmse_method: nrmse.into(),
                transform: transform.into(),
                back_transform: back_transform.into(),
            };
            let mut interaction = InteractionSettings::default_v1();
            interaction.enabled = !no_interactions;
            let mut scoring = ScoringProfile::default_v1();
            scoring.alpha = alpha;
            scoring.missing_pressure = missing_pressure.into();

            let template = resolve_template(template.as_deref())?;
            let indicators = load_series_table(&ind)?;
            let pressures = press.as_deref().map(load_series_table).transpose()?;
            let press_types = match press_types.as_deref() {
                Some(path) => load_press_types(path)?,
                None => BTreeMap::new(),
            };
            let expert = expert.as_deref().map(load_expert_scores).transpose()?;

            let assessment = run_assessment(&AssessmentInputs {
                indicators: &indicators,
                pressures: pressures.as_ref(),
                press_types: &press_types,
                expert: expert.as_deref(),
                template: &template,
                fit: &fit,
                interaction: &interaction,
                scoring: &scoring,
            })?;

            let run_summary = RunSummary {
                tool_name: env!("CARGO_PKG_NAME").to_string(),
                tool_version: env!("CARGO_PKG_VERSION").to_string(),
                family: fit.family.label(),
                k: fit.k,
                train_fraction: fit.train_fraction,
                split: match fit.split {
                    SplitMode::Sequential => "sequential".to_string(),
                    SplitMode::Random { seed } => format!("random (seed {seed})"),
                },
                n_rows: assessment.init.time.len(),
                n_train: assessment.init.split.train.len(),
                n_test: assessment.init.split.test.len(),
                n_indicators: assessment.init.indicators.len(),
                n_pressures: assessment.init.pressures.len(),
                trend_failures: assessment.trend.failures.clone(),
                pressure_failures: assessment.pressure.failures.clone(),
                groups: assessment.views.groups,
            };

            fs::create_dir_all(&out).map_err(InputError::from)?;
            write_diagnostics_csv(&out.join("trend_models.csv"), &assessment.trend_diagnostics)?;
            write_predictions_csv(&out.join("trend_predictions.csv"), &assessment.trend.results)?;
            if !assessment.pressure.results.is_empty() {
                write_diagnostics_csv(
                    &out.join("pressure_models.csv"),
                    &assessment.pressure_diagnostics,
                )?;
                write_predictions_csv(
                    &out.join("pressure_predictions.csv"),
                    &assessment.pressure.results,
                )?;
            }
            write_scores_json(&out.join("scores.json"), &assessment.scores)?;
            write_views(&out, Some(&run_summary), &assessment.views)?;
            tracing::info!(out = %out.display(), "reports written");
            Ok(())
        }
        Commands::Summary {
            scores,
            out,
            template,
            missing_pressure,
        } => {
            let template = resolve_template(template.as_deref())?;
            let table = load_scores_json(&scores)?;
            let views = run_stage7(&Stage7Inputs {
                scores: &table,
                template: &template,
                missing_pressure: missing_pressure.into(),
            })?;
            fs::create_dir_all(&out).map_err(InputError::from)?;
            write_views(&out, None, &views)?;
            tracing::info!(out = %out.display(), "summary written");
            Ok(())
        }
    }
}

fn resolve_template(path: Option<&Path>) -> Result<CriteriaTemplate, InputError> {
    match path {
        Some(path) => load_template(path),
        None => Ok(CriteriaTemplate::builtin()),
    }
}

fn write_views(
    out: &Path,
    run: Option<&RunSummary>,
    views: &SummaryViews,
) -> Result<(), InputError> {
    write_overview_csv(&out.join("overview.csv"), &views.overview)?;
    if let Some(breakdown) = &views.breakdown {
        write_breakdown_csv(&out.join("pressure_breakdown.csv"), breakdown)?;
    }
    write_matrix_csv(&out.join("score_matrix.csv"), &views.matrix)?;
    fs::write(out.join("summary.json"), render_summary_json(run, views)?)?;
    fs::write(out.join("report.txt"), render_report_text(run, views))?;
    Ok(())
}

#[cfg(test)]
#[path = "../tests/src_inline/main_inline.rs"]
mod tests;
