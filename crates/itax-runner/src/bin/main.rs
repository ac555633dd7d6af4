use clap::Parser;
use itax_runner::tasks::PortalProcessor;
use itax_runner::{BatchOrchestrator, Settings, TaskKind};
use itax_store::{ResultSink, Selection, SupabaseStore};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "itax-runner")]
#[command(about = "Batch automation against the iTax portal")]
#[command(version)]
struct Cli {
    /// Config file
    #[arg(long, default_value = "runner.yaml")]
    config: PathBuf,

    /// Task to run (password-check, obligation-check, pin-certificate,
    /// tcc-certificate, ledger, payroll)
    #[arg(long, value_parser = parse_task)]
    task: TaskKind,

    /// Explicit company ids (comma separated); default is the whole table
    #[arg(long, value_delimiter = ',')]
    ids: Vec<i64>,

    /// Shard window start index (requires --batch-size)
    #[arg(long)]
    start_index: Option<u32>,

    /// Shard window size (requires --start-index)
    #[arg(long)]
    batch_size: Option<u32>,

    /// Run in headless mode (overrides config)
    #[arg(long)]
    headless: bool,

    /// Verbose output (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (only errors)
    #[arg(short, long)]
    quiet: bool,

    /// Validate config without running
    #[arg(long)]
    check: bool,
}

fn parse_task(s: &str) -> Result<TaskKind, String> {
    TaskKind::from_str(s)
}

fn selection_from(cli: &Cli) -> anyhow::Result<Selection> {
    if !cli.ids.is_empty() {
        return Ok(Selection::Ids(cli.ids.clone()));
    }
    match (cli.start_index, cli.batch_size) {
        (Some(start_index), Some(batch_size)) => Ok(Selection::Window {
            start_index,
            batch_size,
        }),
        (None, None) => Ok(Selection::All),
        _ => anyhow::bail!("--start-index and --batch-size must be given together"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let level = if cli.quiet {
        Level::ERROR
    } else {
        match cli.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            _ => Level::DEBUG,
        }
    };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    let mut settings = Settings::load(&cli.config)?;

    if cli.check {
        println!("Config valid");
        println!("  Portal: {}", settings.portal.login_url);
        println!("  Companies table: {}", settings.supabase.companies_table);
        println!("  Captcha retries: {}", settings.retry.max_captcha_attempts);
        println!("  Menu click retries: {}", settings.retry.menu_click_retries);
        println!("  Report dir: {}", settings.report.dir);
        return Ok(());
    }

    if cli.headless {
        settings.browser.headless = true;
    }
    let selection = selection_from(&cli)?;

    let store = Arc::new(SupabaseStore::new(settings.supabase_config()?));
    let sink: Arc<dyn ResultSink> = store.clone();
    let report_dir = PathBuf::from(&settings.report.dir);
    let settings = Arc::new(settings);

    let processor = Arc::new(PortalProcessor::new(settings.clone(), cli.task, sink));
    let orchestrator = Arc::new(BatchOrchestrator::new(
        store,
        processor,
        cli.task.label(),
        Some(report_dir),
    ));

    // Ctrl-C requests a graceful stop at the next company boundary; the
    // in-flight company still finishes and persists.
    let state = orchestrator.state();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("stop requested, finishing current company...");
            state.request_stop();
        }
    });

    println!("Running: {} over {:?}", cli.task.label(), selection);
    let report = orchestrator.run(selection).await?;

    // Print result
    println!();
    if report.stopped_early {
        println!("✗ Stopped early");
    } else {
        println!("✓ Complete");
    }
    println!("  Companies: {}/{}", report.processed, report.total);
    for (status, count) in &report.status_counts {
        println!("    {}: {}", status, count);
    }
    if let Some(path) = &report.report_path {
        println!("  Report: {}", path.display());
    }
    println!(
        "  Duration: {}s",
        (report.finished_at - report.started_at).num_seconds()
    );

    Ok(())
}
