use std::path::PathBuf;

use clap::Parser;
use common::{config::Config, experiment::ExperimentKind};
use eyre::{Context, Result};
use tokio::fs::create_dir_all;
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter,
    fmt::{layer, time::ChronoLocal},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

mod bench;

const MODULES: &[&str] = &["common", "sweep_charts"];

/// Parameter sweeps and charts for the machine storage hierarchy benchmark
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Run the latency sweep
    #[arg(short = 'a', long, help_heading = "Evaluation")]
    latency_eval: bool,
    /// Run the size sweep
    #[arg(short = 'b', long, help_heading = "Evaluation")]
    size_eval: bool,
    /// Run the caching policy sweep
    #[arg(short = 'c', long, help_heading = "Evaluation")]
    cache_eval: bool,
    /// Run the size ratio sweep
    #[arg(short = 'd', long, help_heading = "Evaluation")]
    size_ratio_eval: bool,
    /// Run the disk mode sweep
    #[arg(short = 'e', long, help_heading = "Evaluation")]
    disk_eval: bool,

    #[arg(short = 'm', long, help_heading = "Plotting")]
    latency_plot: bool,
    #[arg(short = 'n', long, help_heading = "Plotting")]
    size_plot: bool,
    #[arg(short = 'o', long, help_heading = "Plotting")]
    cache_plot: bool,
    #[arg(short = 'p', long, help_heading = "Plotting")]
    size_ratio_plot: bool,
    #[arg(short = 'q', long, help_heading = "Plotting")]
    disk_plot: bool,
    /// Render the hierarchy type legend
    #[arg(short = 'g', long, help_heading = "Plotting")]
    legend_plot: bool,

    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
    #[arg(long, default_value_t = false)]
    no_progress: bool,
    /// Print the commands of the selected sweeps instead of running them
    #[arg(long, default_value_t = false)]
    dry_run: bool,
    #[arg(short, long)]
    log: Vec<String>,
}

impl Cli {
    fn evals(&self) -> Vec<ExperimentKind> {
        select([
            self.latency_eval,
            self.size_eval,
            self.cache_eval,
            self.size_ratio_eval,
            self.disk_eval,
        ])
    }

    fn plots(&self) -> Vec<ExperimentKind> {
        select([
            self.latency_plot,
            self.size_plot,
            self.cache_plot,
            self.size_ratio_plot,
            self.disk_plot,
        ])
    }
}

fn select(flags: [bool; 5]) -> Vec<ExperimentKind> {
    ExperimentKind::ALL
        .into_iter()
        .zip(flags)
        .filter_map(|(kind, on)| on.then_some(kind))
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    let log_level = std::env::var("RUST_LOG").unwrap_or("info".to_owned());
    let args = Cli::parse();
    let file_appender = tracing_appender::rolling::never(".", "log.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let mut env_filter = EnvFilter::new(format!("machine_eval={log_level}"));

    for log in &args.log {
        env_filter = env_filter.add_directive(log.parse()?);
    }

    for module in MODULES {
        if !args.log.iter().any(|x| x.starts_with(module)) {
            env_filter = env_filter.add_directive(format!("{module}={log_level}").parse()?);
        }
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            layer()
                .with_timer(ChronoLocal::new("%v %k:%M:%S %z".to_owned()))
                .compact(),
        )
        .with(layer().with_writer(non_blocking))
        .init();

    let config = Config::load(&args.config).await?;
    let evals = args.evals();
    let plots = args.plots();
    if evals.is_empty() && plots.is_empty() && !args.legend_plot {
        warn!("Nothing selected, pass at least one evaluation or plotting flag (see --help)");
        return Ok(());
    }

    if args.dry_run {
        bench::print_commands(&config, &evals)?;
    } else if !evals.is_empty() {
        create_dir_all(&config.settings.results_dir).await?;
        if let Err(err) = bench::run_sweeps(&config, &evals, !args.no_progress).await {
            error!("{err:#?}");
            return Err(err);
        }
    }

    for kind in plots {
        let charts = sweep_charts::plot_kind(&config, kind)
            .await
            .context(format!("Plot {kind}"))?;
        info!("{kind}: {} charts", charts.len());
    }
    if args.legend_plot {
        sweep_charts::plot_legend(&config)
            .await
            .context("Plot legend")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_select_experiments() {
        let args = Cli::parse_from(["machine-eval", "-a", "-c", "-q", "-g"]);
        assert_eq!(
            args.evals(),
            vec![ExperimentKind::Latency, ExperimentKind::Cache]
        );
        assert_eq!(args.plots(), vec![ExperimentKind::Disk]);
        assert!(args.legend_plot);
        assert!(!args.dry_run);
        assert_eq!(args.config, PathBuf::from("config.yaml"));
    }

    #[test]
    fn long_flags() {
        let args = Cli::parse_from([
            "machine-eval",
            "--size-ratio-eval",
            "--size-plot",
            "--config",
            "other.yaml",
            "--dry-run",
            "--log",
            "common=debug",
        ]);
        assert_eq!(args.evals(), vec![ExperimentKind::SizeRatio]);
        assert_eq!(args.plots(), vec![ExperimentKind::Size]);
        assert!(args.dry_run);
        assert_eq!(args.log, vec!["common=debug"]);
    }
}
