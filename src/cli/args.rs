use clap::Parser;
use gauntlet::core::config::ScanConfig;
use std::path::PathBuf;

/// GAUNTLET – audit engine for web application inputs
#[derive(Parser, Debug)]
#[command(
    name = "gauntlet",
    version,
    about = "GAUNTLET – audit engine for web application inputs",
    long_about = r#"
GAUNTLET fetches a page, extracts its links, forms, cookies and headers, and
runs every selected check against them. Each check mutates the page's inputs
with its payloads; the engine filters every mutation through the scope rules
and a scan-wide coverage set before it is sent, so the same test never hits
the target twice.

CHECKS:
  reflected   Inputs echoed back unencoded
  fuzz        Malformed values causing timeouts or new server errors
  timing      Injected sleep expressions, verified with control requests
  boolean     True/false expression pairs compared against a control
"#,
    after_help = r#"EXAMPLES:

  gauntlet -t https://example.com/search?q=test
  gauntlet -t https://example.com/search?q=test --check timing --check boolean
  gauntlet -t https://example.com/ -c scan.toml -o report.json
  gauntlet -t https://example.com/ --cookie "session=abc123" -H "Authorization: Bearer token"
  gauntlet --print-config > scan.toml"#
)]
pub struct Cli {
    /// Target URL (e.g. https://example.com/page.php?id=1)
    #[arg(short, long, required_unless_present_any = ["print_config", "list_checks"])]
    pub target: Option<String>,

    /// TOML configuration file; command line flags take precedence
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    // ═══════════════════════════════════════════════════════════════════
    // CHECKS
    // ═══════════════════════════════════════════════════════════════════

    /// Run only this check (can be used multiple times)
    #[arg(long = "check", help_heading = "CHECKS")]
    pub checks: Vec<String>,

    /// List available checks and exit
    #[arg(long = "list-checks", help_heading = "CHECKS")]
    pub list_checks: bool,

    /// Payload file for the fuzz check, one payload per line
    #[arg(long = "fuzz-payloads", help_heading = "CHECKS")]
    pub fuzz_payloads: Option<PathBuf>,

    // ═══════════════════════════════════════════════════════════════════
    // AUTHENTICATION
    // ═══════════════════════════════════════════════════════════════════

    /// HTTP Cookie header value
    #[arg(long, help_heading = "AUTHENTICATION")]
    pub cookie: Option<String>,

    /// HTTP headers (can be used multiple times)
    #[arg(long = "header", short = 'H', help_heading = "AUTHENTICATION")]
    pub headers: Vec<String>,

    // ═══════════════════════════════════════════════════════════════════
    // PERFORMANCE
    // ═══════════════════════════════════════════════════════════════════

    /// Maximum concurrent requests
    #[arg(long, help_heading = "PERFORMANCE")]
    pub concurrency: Option<usize>,

    /// Maximum HTTP requests per second (0 = unlimited)
    #[arg(long, help_heading = "PERFORMANCE")]
    pub rate: Option<u32>,

    /// Request timeout in milliseconds
    #[arg(long, help_heading = "PERFORMANCE")]
    pub timeout: Option<u64>,

    /// Base delay for timing checks in milliseconds
    #[arg(long = "time-delay", help_heading = "PERFORMANCE")]
    pub time_delay: Option<u64>,

    // ═══════════════════════════════════════════════════════════════════
    // COVERAGE
    // ═══════════════════════════════════════════════════════════════════

    /// Load coverage fingerprints from a previous run before scanning
    #[arg(long = "resume", help_heading = "COVERAGE")]
    pub resume: Option<PathBuf>,

    /// Write coverage fingerprints to this file after the scan
    #[arg(long = "save-coverage", help_heading = "COVERAGE")]
    pub save_coverage: Option<PathBuf>,

    // ═══════════════════════════════════════════════════════════════════
    // OUTPUT
    // ═══════════════════════════════════════════════════════════════════

    /// Skip the banner display
    #[arg(long, help_heading = "OUTPUT")]
    pub no_banner: bool,

    /// Quiet mode (warnings and findings only)
    #[arg(short, long, help_heading = "OUTPUT")]
    pub quiet: bool,

    /// Verbose output (debug level)
    #[arg(short, long, help_heading = "OUTPUT")]
    pub verbose: bool,

    /// Output file path for the JSON report
    #[arg(short, long, help_heading = "OUTPUT")]
    pub output: Option<PathBuf>,

    /// Print the effective configuration as TOML and exit
    #[arg(long = "print-config", help_heading = "OUTPUT")]
    pub print_config: bool,
}

impl Cli {
    /// Overlays command line flags on a loaded configuration.
    pub fn apply(&self, config: &mut ScanConfig) {
        if let Some(concurrency) = self.concurrency {
            config.http.max_concurrency = concurrency;
        }
        if let Some(rate) = self.rate {
            config.http.requests_per_second = rate;
        }
        if let Some(timeout) = self.timeout {
            config.http.timeout_ms = timeout;
        }
        if let Some(delay) = self.time_delay {
            config.audit.timing.delay_ms = delay;
        }
        if let Some(ref cookie) = self.cookie {
            config.http.cookies = Some(cookie.clone());
        }
        for header in &self.headers {
            if let Some((key, value)) = header.split_once(':') {
                config
                    .http
                    .headers
                    .insert(key.trim().to_string(), value.trim().to_string());
            }
        }
    }

    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "gauntlet=debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }
}
