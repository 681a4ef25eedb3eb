use common::{config::Config, experiment::ExperimentKind, sweep::Sweep};
use eyre::{Context, Result};
use tracing::{debug, warn};

/// Runs the selected sweeps one after another, each waiting for all of its runs
pub async fn run_sweeps(
    config: &Config,
    kinds: &[ExperimentKind],
    progress: bool,
) -> Result<()> {
    for kind in kinds {
        let sweep = Sweep::new(config, *kind)?;
        debug!("Launching {} runs for {kind}", sweep.len());
        let summary = sweep
            .run(progress)
            .await
            .context(format!("Run the {kind} sweep"))?;
        if summary.failed > 0 {
            warn!(
                "{} of {} {kind} runs left no result line",
                summary.failed, summary.total
            );
        }
    }
    Ok(())
}

pub fn print_commands(config: &Config, kinds: &[ExperimentKind]) -> Result<()> {
    for kind in kinds {
        let sweep = Sweep::new(config, *kind)?;
        println!("{kind}: {} runs", sweep.len());
        sweep.eta();
        for command in sweep.commands() {
            println!("{command}");
        }
    }
    Ok(())
}
