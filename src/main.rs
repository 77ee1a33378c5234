use clap::Parser;
use color_eyre::eyre::{bail, WrapErr};
use color_eyre::Result;
use jvm_sampler::{
    analysis::Analysis,
    cli::{Cli, Command},
    config::Config,
    jvm::jcmd::{probe::discover_jvms, JcmdProbe},
    logging,
    metrics::{Clock, ProfilerStore, Sampler, SystemClock},
    report,
    session::Session,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).wrap_err("failed to load configuration")?;
    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    logging::init(level)?;

    match cli.command {
        Command::List => list().await,
        Command::Record {
            pid,
            duration,
            save,
            no_heap,
            folded,
            json,
            top,
        } => {
            let options = RecordOptions {
                pid,
                duration,
                save,
                heap: !no_heap,
            };
            let analysis = record(&config, options).await?;
            write_folded(&analysis, folded.as_deref())?;
            print_analysis(&analysis, json, top)
        }
        Command::Report {
            file,
            folded,
            json,
            top,
        } => {
            let analysis = analyse_saved(&config, &file)?;
            write_folded(&analysis, folded.as_deref())?;
            print_analysis(&analysis, json, top)
        }
    }
}

struct RecordOptions {
    pid: u32,
    duration: Duration,
    save: Option<String>,
    heap: bool,
}

async fn list() -> Result<()> {
    let jvms = discover_jvms().await?;
    if jvms.is_empty() {
        println!("No JVM processes found.");
        println!("Make sure you have running Java applications.");
        return Ok(());
    }
    for jvm in jvms {
        println!("{:>8}  {}", jvm.pid, jvm.main_class);
    }
    Ok(())
}

async fn record(config: &Config, options: RecordOptions) -> Result<Analysis> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let probe = Arc::new(
        JcmdProbe::new(options.pid, clock.clone()).with_timeout(config.sampling.probe_timeout()),
    );
    let store = Arc::new(ProfilerStore::new(&config.history)?);

    let started_at = clock.now_ms();
    let sampler = Sampler::new(probe, store.clone(), &config.sampling, clock.clone());
    let (handle, task) = sampler.spawn();

    // baseline for leak detection; the end-of-run histogram is compared against it
    if options.heap {
        if let Err(e) = handle.capture_heap_histogram().await {
            warn!(error = %e, "baseline heap histogram unavailable");
        }
    }

    info!(pid = options.pid, duration = ?options.duration, "recording");
    tokio::select! {
        _ = tokio::time::sleep(options.duration) => {}
        _ = tokio::signal::ctrl_c() => info!("interrupted, finishing early"),
    }
    handle.stop();
    task.await?;

    let stats = handle.stats();
    if stats.total_samples > 0 && stats.failed_samples == stats.total_samples {
        bail!(
            "every probe call failed; is process {} a running JVM owned by this user?",
            options.pid
        );
    }

    if options.heap {
        if let Err(e) = handle.capture_heap_histogram().await {
            warn!(error = %e, "heap histogram unavailable");
        }
    }

    let ended_at = clock.now_ms();
    if let Some(path) = options.save.as_deref() {
        let written = store
            .to_session(Some(options.pid), started_at, ended_at)
            .save(Some(path))
            .wrap_err("failed to save session")?;
        info!(path = %written.display(), "session saved");
    }

    Ok(Analysis::from_store(&store, &config.advisor))
}

fn analyse_saved(config: &Config, file: &Path) -> Result<Analysis> {
    let session = Session::load(file)
        .wrap_err_with(|| format!("failed to read session {}", file.display()))?;
    let store = ProfilerStore::from_session(&session, &config.history)?;
    Ok(Analysis::from_store(&store, &config.advisor))
}

fn write_folded(analysis: &Analysis, path: Option<&Path>) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    analysis
        .flame
        .write_folded(path)
        .wrap_err_with(|| format!("failed to write folded stacks to {}", path.display()))?;
    info!(path = %path.display(), "folded stacks written");
    Ok(())
}

fn print_analysis(analysis: &Analysis, json: bool, top: usize) -> Result<()> {
    if json {
        println!("{}", analysis.to_json()?);
    } else {
        print!("{}", report::render(analysis, top));
    }
    Ok(())
}
