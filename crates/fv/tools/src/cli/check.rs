// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! The analysis command

use super::Cli;
use crate::config::FvConfig;
use crate::output::{ExitStatus, exit_status, write_report};
use anyhow::{Context, Result};
use fv_analyzer::{CancellationToken, Engine, FvError, Report, ReportCache};
use fv_common::{DEFAULT_PROGRESS_CAPACITY, ProgressReporter};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

/// Effective configuration: defaults, file, then flags
pub fn effective_config(cli: &Cli) -> Result<FvConfig> {
    let mut config = FvConfig::resolve_config(cli.config.as_deref())?;
    cli.apply_to(&mut config);
    Ok(config)
}

/// Run the analysis and write the report
///
/// Ctrl-C cancels the run; functions already analyzed are still reported
/// and the report is flagged as cancelled.
pub async fn execute(cli: Cli) -> Result<ExitStatus> {
    let config = effective_config(&cli)?;
    if cli.print_config {
        print!("{}", config.to_toml()?);
        return Ok(ExitStatus::Clean);
    }

    let engine_config = config.engine_config().with_emit_cfg(cli.emit_cfg.clone());
    engine_config.validate().context("invalid configuration")?;

    let cancel = CancellationToken::new();
    let mut engine = Engine::new(engine_config)
        .with_cancellation(cancel.clone())
        .with_cache(config.output.cache_dir.as_ref().map(ReportCache::new));

    let listener = if cli.progress {
        let progress = ProgressReporter::new(DEFAULT_PROGRESS_CAPACITY);
        let receiver = progress.subscribe();
        engine = engine.with_progress(progress);
        receiver.map(|mut receiver| {
            tokio::spawn(async move {
                loop {
                    match receiver.recv().await {
                        Ok(event) => info!(phase = %event.phase, current = event.current, total = event.total, "{}", event.message),
                        Err(RecvError::Lagged(skipped)) => warn!(skipped, "progress events dropped"),
                        Err(RecvError::Closed) => break,
                    }
                }
            })
        })
    } else {
        None
    };

    let paths = cli.paths.clone();
    let mut job = tokio::task::spawn_blocking(move || engine.run(&paths));
    let joined = tokio::select! {
        joined = &mut job => joined,
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupt received, finishing functions in progress");
            cancel.cancel(Some("interrupted"));
            job.await
        }
    };
    if let Some(listener) = listener {
        let _ = listener.await;
    }

    let report: Report = match joined {
        Ok(Ok(report)) => report,
        Ok(Err(err)) => return handle_engine_error(err),
        Err(err) => {
            error!(error = %err, "analysis worker failed");
            return Ok(ExitStatus::Internal);
        }
    };

    write_report(&report, config.output.format, &config.output.render_options(), cli.output.as_deref())?;
    let status = exit_status(&report, config.output.fail_on_error, config.output.min_quality_score);
    info!(findings = report.findings.len(), score = report.score, status = ?status, "done");
    Ok(status)
}

fn handle_engine_error(err: FvError) -> Result<ExitStatus> {
    match err {
        FvError::InvalidConfig(_) => Err(anyhow::Error::new(err).context("invalid configuration")),
        err if err.is_input_error() => Err(anyhow::Error::new(err).context("cannot read input")),
        err => {
            error!(error = %err, "analysis failed");
            Ok(ExitStatus::Internal)
        }
    }
}
