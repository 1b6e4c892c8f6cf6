use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use gallery_core::{IdentityResolver, ProgressReport};
use gallery_engine::{
    ensure_output_dir, CancellationToken, CompiledMarkup, FetchExecutor, FileLedger, FileSink,
    GalleryCursor, HarvestError, HarvestLoop, Ledger, ReqwestFetcher, WebDriverProvider,
};
use gallery_logging::{harvest_error, harvest_info, harvest_warn};

use crate::cli::Cli;
use crate::config::AppConfig;
use crate::summary::{load_summary, save_summary, RunSummary};

pub async fn run(cli: Cli) -> Result<ExitCode> {
    let config = AppConfig::resolve(&cli)?;
    let gallery_url = config.gallery_url(&cli)?;
    let output_dir = config.output_dir.clone();
    ensure_output_dir(&output_dir)
        .with_context(|| format!("preparing output directory {}", output_dir.display()))?;

    if let Some(last) = load_summary(&output_dir) {
        harvest_info!(
            "Last run finished {} with {} item(s) recorded",
            last.finished_utc,
            last.ledger_total
        );
    }

    let sink = FileSink::new(output_dir.clone());
    let mut ledger =
        FileLedger::for_sink(&sink, config.session.resume).context("opening ledger")?;
    if config.session.resume {
        harvest_info!("Resuming with {} item(s) already done", ledger.len());
    }

    let markup = Arc::new(CompiledMarkup::new(&config.markup)?);
    let fetcher = Arc::new(ReqwestFetcher::new(config.download_settings())?);
    let provider = Arc::new(
        WebDriverProvider::connect(&config.webdriver_url, config.headless)
            .await
            .context("starting browser session")?,
    );
    let primary = provider
        .open_gallery(&gallery_url)
        .await
        .context("opening gallery")?;

    if cli.wait_for_enter {
        wait_for_enter().await?;
    }

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            harvest_warn!("Ctrl-C received; stopping after the current item");
            signal_cancel.cancel();
        }
    });

    let started_utc = Utc::now().to_rfc3339();
    let cursor = GalleryCursor::new(
        provider.clone(),
        primary,
        markup.clone(),
        &config.session,
    );
    let executor = FetchExecutor::new(provider.clone(), fetcher, markup, &config.session);
    let mut harvest = HarvestLoop::new(
        cursor,
        executor,
        IdentityResolver::new(config.markup.id_query_params.clone()),
        config.session.limits(),
    )
    .with_cancellation(cancel);

    let result = harvest.run(&mut ledger, &sink).await;
    drop(harvest);

    match Arc::try_unwrap(provider) {
        Ok(provider) => {
            if let Err(err) = provider.shutdown().await {
                harvest_warn!("Browser session did not close cleanly: {}", err);
            }
        }
        Err(_) => harvest_warn!("Browser session still in use; leaving it open"),
    }

    let (report, code) = match &result {
        Ok(report) => (report.clone(), ExitCode::SUCCESS),
        Err(err @ HarvestError::PrimaryContextLost { .. }) => {
            harvest_error!("{}", err);
            (err.report().clone(), ExitCode::from(1))
        }
    };

    let summary = RunSummary::new(
        &gallery_url,
        started_utc,
        Utc::now().to_rfc3339(),
        &report,
        ledger.len(),
    );
    print_summary(&summary, &report);
    save_summary(&output_dir, &summary);
    Ok(code)
}

async fn wait_for_enter() -> Result<()> {
    println!("Gallery is open. Prepare the browser, then press Enter to start.");
    io::stdout().flush()?;
    tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line).map(|_| ())
    })
    .await
    .context("waiting for Enter")??;
    Ok(())
}

fn print_summary(summary: &RunSummary, report: &ProgressReport) {
    println!();
    println!("Gallery:      {}", summary.gallery_url);
    println!(
        "Ended:        {}",
        summary
            .end_reason
            .as_deref()
            .unwrap_or("gallery window lost")
    );
    println!("Discovered:   {}", report.discovered);
    println!("Downloaded:   {}", report.downloaded);
    println!("Skipped:      {}", report.skipped_already_present);
    println!("Gone:         {}", report.already_absent);
    println!("Malformed:    {}", report.malformed);
    println!(
        "Failed:       {} ({} transient attempts)",
        report.permanent_failures, report.transient_failures
    );
    if report.record_failures > 0 {
        println!("Unrecorded:   {}", report.record_failures);
    }
    println!("Ledger total: {}", summary.ledger_total);
}
