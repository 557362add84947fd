mod cli;

use anyhow::{bail, Context};
use clap::Parser;
use cli::args::Cli;
use gauntlet::checks::{default_checks, select_checks, Check, CheckRunner, ServerErrorFuzz};
use gauntlet::core::config::ScanConfig;
use gauntlet::core::{AuditEngine, ScanContext};
use gauntlet::element::{Page, PageOptions};
use gauntlet::http::{Dispatcher, HttpClient, HttpRequest};
use gauntlet::reporting::json;
use reqwest::Method;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use url::Url;

const BANNER: &str = r#"
 ╔════════════════════════════════════════════════════════════════════╗
 ║                                                                    ║
 ║     ██████╗  █████╗ ██╗   ██╗███╗   ██╗████████╗██╗     ███████╗   ║
 ║    ██╔════╝ ██╔══██╗██║   ██║████╗  ██║╚══██╔══╝██║     ██╔════╝   ║
 ║    ██║  ███╗███████║██║   ██║██╔██╗ ██║   ██║   ██║     █████╗     ║
 ║    ██║   ██║██╔══██║██║   ██║██║╚██╗██║   ██║   ██║     ██╔══╝     ║
 ║    ╚██████╔╝██║  ██║╚██████╔╝██║ ╚████║   ██║   ███████╗███████╗   ║
 ║     ╚═════╝ ╚═╝  ╚═╝ ╚═════╝ ╚═╝  ╚═══╝   ╚═╝   ╚══════╝╚══════╝   ║
 ║                                                                    ║
 ║    Audit engine for web application inputs                         ║
 ║                                                                    ║
 ╚════════════════════════════════════════════════════════════════════╝
"#;

fn print_banner() {
    println!("\x1b[36m{}\x1b[0m", BANNER); // Cyan color
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if !cli.no_banner && !cli.quiet && !cli.print_config {
        print_banner();
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = match cli.config {
        Some(ref path) => ScanConfig::load(path)?,
        None => ScanConfig::default(),
    };
    cli.apply(&mut config);

    if cli.print_config {
        println!("{}", config.to_toml()?);
        return Ok(());
    }

    let checks = available_checks(&cli);
    if cli.list_checks {
        for check in &checks {
            let info = check.info();
            println!("{:<12} {}", info.shortname, info.description);
        }
        return Ok(());
    }
    let checks = select_checks(checks, &cli.checks)?;

    let target = cli.target.as_deref().context("--target is required")?;
    let seed = Url::parse(target).with_context(|| format!("Invalid target URL '{}'", target))?;

    let ctx = Arc::new(ScanContext::new(seed.clone(), config)?);
    if let Some(ref path) = cli.resume {
        let restored = load_coverage(path)?;
        tracing::info!("Restored {} coverage fingerprints from {:?}", restored.len(), path);
        ctx.restore_coverage(restored);
    }

    let abort_ctx = Arc::clone(&ctx);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            abort_ctx.abort();
        }
    });

    let client = Arc::new(HttpClient::new(&ctx.config.http)?);

    if !ctx.scope.admit(&seed) {
        bail!("Target {} is outside the configured scope", seed);
    }

    tracing::info!("Fetching {}", seed);
    let response = client.submit(HttpRequest::new(Method::GET, seed.clone())).await;
    if !response.is_completed() {
        bail!("Could not fetch {}: {:?}", seed, response.outcome);
    }

    let page = Page::parse(&response, &PageOptions::from_config(&ctx.config.audit)?);
    if ctx.scope.page_excluded(&page.body) {
        tracing::info!("Page body matches an exclusion pattern, nothing to audit");
        return Ok(());
    }
    tracing::info!(
        "Page has {} links, {} forms, {} cookies, {} headers",
        page.links().len(),
        page.forms().len(),
        page.cookies().len(),
        page.headers().len()
    );

    let engine = AuditEngine::new(Arc::clone(&ctx), client);
    let summary = CheckRunner::new(engine).run(Arc::new(page), &checks).await;

    let issues = ctx.issues.issues();
    tracing::info!(
        "Scan finished: {} checks completed, {} failed, {} issues",
        summary.completed.len(),
        summary.failed.len(),
        issues.len()
    );

    for issue in &issues {
        println!(
            "[{}] {} via {} '{}' at {}",
            issue.severity,
            issue.name,
            issue.vector.kind,
            issue.vector.affected_input,
            issue.vector.action
        );
    }
    for (check, reason) in &summary.failed {
        println!("check {} failed to run: {}", check, reason);
    }

    if let Some(ref path) = cli.output {
        let failed: Vec<String> = summary.failed.iter().map(|(name, _)| name.clone()).collect();
        let report = json::render(target, &issues, &failed)?;
        std::fs::write(path, report).with_context(|| format!("Failed to write report to {:?}", path))?;
        tracing::info!("Report written to {:?}", path);
    }

    if let Some(ref path) = cli.save_coverage {
        save_coverage(path, &ctx.dump_coverage())?;
        tracing::info!("Saved {} coverage fingerprints to {:?}", ctx.coverage_len(), path);
    }

    Ok(())
}

fn available_checks(cli: &Cli) -> Vec<Arc<dyn Check>> {
    let mut checks = default_checks();
    if let Some(ref path) = cli.fuzz_payloads {
        let fuzz: Arc<dyn Check> = Arc::new(ServerErrorFuzz::with_payload_file(path.clone()));
        for check in checks.iter_mut() {
            if check.info().shortname == fuzz.info().shortname {
                *check = Arc::clone(&fuzz);
            }
        }
    }
    checks
}

fn load_coverage(path: &Path) -> anyhow::Result<Vec<u64>> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read coverage from {:?}", path))?;
    serde_json::from_str(&contents).with_context(|| format!("Malformed coverage file {:?}", path))
}

fn save_coverage(path: &Path, fingerprints: &[u64]) -> anyhow::Result<()> {
    let json = serde_json::to_string(fingerprints)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write coverage to {:?}", path))?;
    Ok(())
}
