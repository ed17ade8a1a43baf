use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use lantern_abstract::{
    MetricKind, PageScenario, ScenarioAssertion, Settings, SettingsOverride, ThrottlingMethod,
    ThrottlingSettings,
};
use lantern_metrics::{ComputedCache, MetricInputs, TimingSummary, compute_metric};
use lantern_simulator::SimulationReport;

#[derive(Parser, Debug)]
#[command(author, version, about = "Simulated page-load metrics")]
struct Args {
    /// Page scenario (JSON) with artifacts and assertions.
    #[arg(long)]
    scenario: PathBuf,

    /// TOML file with settings overrides, applied after the scenario's own.
    #[arg(long)]
    settings: Option<PathBuf>,

    #[arg(long, value_enum)]
    throttling_method: Option<MethodArg>,

    /// Throttling preset: `mobile`/`mobile-slow-4g` or `desktop`/`desktop-dense-4g`.
    #[arg(long)]
    preset: Option<String>,

    /// Log filter, e.g. `info` or `lantern_simulator=debug`.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Write the timing summary as JSON.
    #[arg(long)]
    summary_out: Option<PathBuf>,

    /// Write the simulated node timings of every Lantern metric as JSON.
    #[arg(long)]
    report_out: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum MethodArg {
    Devtools,
    Simulate,
    Provided,
}

impl From<MethodArg> for ThrottlingMethod {
    fn from(arg: MethodArg) -> Self {
        match arg {
            MethodArg::Devtools => ThrottlingMethod::Devtools,
            MethodArg::Simulate => ThrottlingMethod::Simulate,
            MethodArg::Provided => ThrottlingMethod::Provided,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level)?;
    info!("lantern-cli starting…");

    let mut scenario = load_scenario(&args.scenario)?;
    scenario.artifacts.normalize();
    let settings = args.resolve_settings(&scenario)?;
    info!(
        "Scenario '{}' with {:?} throttling, rtt {}ms, {}kbps",
        scenario.name,
        settings.throttling_method,
        settings.throttling.rtt_ms,
        settings.throttling.throughput_kbps
    );

    let inputs = MetricInputs::new(&scenario.artifacts, &settings);
    let mut cache = ComputedCache::new();
    let summary =
        TimingSummary::summarize(&inputs, &mut cache).context("Failed to process the page trace")?;
    log_summary(&summary);

    if let Some(path) = &args.summary_out {
        write_json(path, &summary)?;
    }
    if let Some(path) = &args.report_out {
        let reports = simulation_reports(&inputs, &mut cache);
        write_json(path, &reports)?;
    }

    let failures: Vec<String> = scenario
        .assertions
        .iter()
        .filter_map(|assertion| check_assertion(assertion, &inputs, &mut cache).err())
        .collect();
    for failure in &failures {
        error!("Assertion failed: {failure}");
    }
    if !failures.is_empty() {
        anyhow::bail!(
            "{} of {} assertions failed",
            failures.len(),
            scenario.assertions.len()
        );
    }
    info!("All {} assertions passed.", scenario.assertions.len());
    Ok(())
}

impl Args {
    /// Defaults, then the scenario, then the settings file, then flags.
    fn resolve_settings(&self, scenario: &PageScenario) -> Result<Settings> {
        let mut settings = Settings::default();
        scenario.settings.apply_to(&mut settings);

        if let Some(path) = &self.settings {
            load_settings(path)?.apply_to(&mut settings);
        }

        if let Some(preset) = &self.preset {
            if ThrottlingSettings::by_preset_name(preset).is_none() {
                anyhow::bail!("Unknown throttling preset '{preset}'");
            }
        }
        SettingsOverride {
            throttling_method: self.throttling_method.map(Into::into),
            preset: self.preset.clone(),
            ..Default::default()
        }
        .apply_to(&mut settings);
        Ok(settings)
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level)
        .with_context(|| format!("Invalid log level '{level}'"))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

fn log_summary(summary: &TimingSummary) {
    let metrics = [
        (MetricKind::FirstContentfulPaint, summary.first_contentful_paint),
        (MetricKind::FirstMeaningfulPaint, summary.first_meaningful_paint),
        (MetricKind::LargestContentfulPaint, summary.largest_contentful_paint),
        (MetricKind::Interactive, summary.interactive),
        (MetricKind::TotalBlockingTime, summary.total_blocking_time),
        (MetricKind::MaxPotentialFid, summary.max_potential_fid),
        (MetricKind::SpeedIndex, summary.speed_index),
    ];
    for (kind, timing) in metrics {
        match timing {
            Some(ms) => info!("{:>6}: {ms:.0}ms", kind.acronym()),
            None => info!("{:>6}: n/a", kind.acronym()),
        }
    }
}

/// Pessimistic simulations of the metrics that ran through Lantern, keyed by acronym.
fn simulation_reports(
    inputs: &MetricInputs,
    cache: &mut ComputedCache,
) -> BTreeMap<&'static str, SimulationReport> {
    MetricKind::ALL
        .into_iter()
        .filter_map(|kind| {
            let result = compute_metric(kind, inputs, cache).ok()?;
            let simulated = result.simulated.as_ref()?;
            let report = simulated
                .pessimistic_estimate
                .export_report(&simulated.pessimistic_graph);
            Some((kind.acronym(), report))
        })
        .collect()
}

fn check_assertion(
    assertion: &ScenarioAssertion,
    inputs: &MetricInputs,
    cache: &mut ComputedCache,
) -> std::result::Result<(), String> {
    match assertion {
        ScenarioAssertion::MetricAtMost { metric, ms } => {
            match compute_metric(*metric, inputs, cache) {
                Ok(result) if result.timing <= *ms => Ok(()),
                Ok(result) => Err(format!(
                    "{metric} was {:.1}ms, expected at most {ms}ms",
                    result.timing
                )),
                Err(err) => Err(format!("{metric} failed: {err}")),
            }
        }
        ScenarioAssertion::MetricAtLeast { metric, ms } => {
            match compute_metric(*metric, inputs, cache) {
                Ok(result) if result.timing >= *ms => Ok(()),
                Ok(result) => Err(format!(
                    "{metric} was {:.1}ms, expected at least {ms}ms",
                    result.timing
                )),
                Err(err) => Err(format!("{metric} failed: {err}")),
            }
        }
        ScenarioAssertion::MetricFails { metric, code } => {
            match compute_metric(*metric, inputs, cache) {
                Err(err) if err.code() == Some(*code) => Ok(()),
                Err(err) => Err(format!("{metric} failed with '{err}', expected {code}")),
                Ok(result) => Err(format!(
                    "{metric} resolved to {:.1}ms, expected {code}",
                    result.timing
                )),
            }
        }
    }
}

fn load_scenario(path: &Path) -> Result<PageScenario> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
    let scenario: PageScenario =
        serde_json::from_str(&content).context("Failed to parse scenario file")?;
    Ok(scenario)
}

fn load_settings(path: &Path) -> Result<SettingsOverride> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings file {}", path.display()))?;
    toml::from_str(&content).context("Failed to parse settings file")
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let data = serde_json::to_vec_pretty(value).context("Failed to serialize output")?;
    fs::write(path, &data)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
