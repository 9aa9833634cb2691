use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use mendlink_checker::{CheckScheduler, Corrector, LinkValidator, SchedulerHandle, SiteChecker};
use mendlink_core::config::{CheckConfig, DeployConfig};
use mendlink_core::deploy::DeployPipeline;
use mendlink_core::report::{generate_json_report, generate_text_report, save_report, ReportFormat};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use url::Url;

// Helper functions shared by the check/watch/deploy handlers

/// Expand `~` and verify the directory exists.
pub fn resolve_site_dir(raw: &str) -> Result<PathBuf, String> {
    let expanded = shellexpand::tilde(raw);
    let path = PathBuf::from(expanded.as_ref());
    if !path.is_dir() {
        return Err(format!("Not a directory: {}", path.display()));
    }
    Ok(path)
}

/// Build the effective check configuration: config file first (or the
/// defaults), then command-line overrides on top.
pub fn build_check_config(matches: &ArgMatches) -> Result<CheckConfig, String> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => CheckConfig::from_file(path)?,
        None => CheckConfig::default(),
    };

    if let Some(base_url) = matches.get_one::<Url>("base-url") {
        config.base_url = Some(base_url.as_str().to_string());
    }
    if let Ok(Some(concurrency)) = matches.try_get_one::<usize>("concurrency") {
        config.concurrency = *concurrency;
    }
    if let Ok(Some(timeout)) = matches.try_get_one::<u64>("timeout") {
        config.timeout_secs = *timeout;
    }
    if let Ok(Some(interval)) = matches.try_get_one::<u64>("interval") {
        config.interval_minutes = *interval;
    }
    Ok(config)
}

pub fn build_checker(config: &CheckConfig, dry_run: bool) -> SiteChecker {
    let validator = LinkValidator::new()
        .with_max_attempts(config.max_retries)
        .with_retry_delay(Duration::from_millis(config.retry_delay_ms))
        .with_timeout(Duration::from_secs(config.timeout_secs))
        .with_base_host(config.base_host());
    let corrector = Corrector::new()
        .with_fallback_path(config.fallback_path.clone())
        .with_logging(config.log_corrections);
    SiteChecker::new()
        .with_validator(validator)
        .with_corrector(corrector)
        .with_concurrency(config.concurrency)
        .with_dry_run(dry_run)
}

fn fail(message: String) -> ! {
    eprintln!("{} {}", "✗".red().bold(), message);
    std::process::exit(1);
}

fn scan_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap(),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(message.to_string());
    spinner
}

fn print_cycle_summary(report: &mendlink_checker::CycleReport) {
    println!(
        "{} {} pages, {} distinct URLs: {} healthy, {} broken, {} corrected",
        "✓".green().bold(),
        report.pages,
        report.distinct_urls,
        report.healthy.to_string().green(),
        report.broken.to_string().red(),
        report.corrections.len().to_string().yellow()
    );
}

pub async fn handle_check(sub_matches: &ArgMatches) {
    tracing_subscriber::fmt::init();

    let dir = resolve_site_dir(sub_matches.get_one::<String>("DIR").unwrap())
        .unwrap_or_else(|e| fail(e));
    let config = build_check_config(sub_matches).unwrap_or_else(|e| fail(e));
    let dry_run = sub_matches.get_flag("dry-run");

    println!("\n🔗 Checking links under {}", dir.display());
    println!("Retries: {}, timeout: {}s, concurrency: {}", config.max_retries, config.timeout_secs, config.concurrency);
    if let Some(ref base) = config.base_url {
        println!("Base URL: {}", base);
    }
    if dry_run {
        println!("Mode: {}", "dry run (no files will be modified)".yellow());
    }
    println!();

    let spinner = scan_spinner("Scanning links...");
    let checker = build_checker(&config, dry_run);

    match checker.run_cycle(&dir).await {
        Ok(report) => {
            spinner.finish_and_clear();
            print_cycle_summary(&report);

            let format = sub_matches
                .get_one::<String>("format")
                .and_then(|f| ReportFormat::from_str(f))
                .unwrap_or(ReportFormat::Text);
            let content = match format {
                ReportFormat::Text => generate_text_report(&report),
                ReportFormat::Json => generate_json_report(&report)
                    .unwrap_or_else(|e| fail(format!("Failed to serialize report: {}", e))),
            };

            match sub_matches.get_one::<PathBuf>("output") {
                Some(path) => {
                    save_report(&content, path)
                        .unwrap_or_else(|e| fail(format!("Failed to save report: {}", e)));
                    println!("Report saved to {}", path.display());
                }
                None => print!("{}", content),
            }
        }
        Err(e) => {
            spinner.finish_and_clear();
            fail(format!("Scan failed: {}", e));
        }
    }
}

pub async fn handle_watch(sub_matches: &ArgMatches) {
    tracing_subscriber::fmt::init();

    let dir = resolve_site_dir(sub_matches.get_one::<String>("DIR").unwrap())
        .unwrap_or_else(|e| fail(e));
    let config = build_check_config(sub_matches).unwrap_or_else(|e| fail(e));

    println!("\n👁  Watching {}", dir.display());
    println!(
        "Initial scan now, then every {} minute(s). Commands: [r]echeck, [q]uit\n",
        config.interval_minutes
    );

    let checker = build_checker(&config, false);
    let scheduler = CheckScheduler::new(checker, dir)
        .with_interval_minutes(config.interval_minutes);
    let (handle, join) = scheduler.spawn();

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    if watch_commands(stdin, &handle).await {
        join.abort();
        println!("Watch stopped.");
    } else {
        // stdin closed (piped input, backgrounded process); the periodic
        // rescans keep running with no command surface
        let _ = join.await;
    }
}

/// Read interactive watch commands until an explicit quit or end of input.
/// Returns true when the user quit, false when the input simply closed.
pub async fn watch_commands<R>(reader: R, handle: &SchedulerHandle) -> bool
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    while let Ok(Some(line)) = lines.next_line().await {
        match line.trim() {
            "r" | "recheck" => match handle.recheck().await {
                Ok(report) => print_cycle_summary(&report),
                Err(e) => eprintln!("{} Recheck failed: {}", "✗".red().bold(), e),
            },
            "q" | "quit" => return true,
            "" => {}
            other => println!("Unknown command '{}'", other),
        }
    }
    false
}

pub fn handle_deploy(sub_matches: &ArgMatches) {
    tracing_subscriber::fmt::init();

    let project_dir = resolve_site_dir(sub_matches.get_one::<String>("DIR").unwrap())
        .unwrap_or_else(|e| fail(e));
    let config = DeployConfig {
        project_dir,
        publish_dir: sub_matches.get_one::<String>("publish-dir").unwrap().clone(),
        package_manager: sub_matches
            .get_one::<String>("package-manager")
            .unwrap()
            .clone(),
        ..DeployConfig::default()
    };

    println!("\n🚀 Deploying {}", config.project_dir.display());
    println!(
        "Marker: {}, publish dir: {}, deploy retries: {}\n",
        config.marker_file, config.publish_dir, config.deploy_retries
    );

    let mut pipeline = DeployPipeline::new(config);
    match pipeline.run() {
        Ok(()) => println!("{} Deploy complete", "✓".green().bold()),
        Err(e) => fail(format!("Deploy failed: {}", e)),
    }
}
