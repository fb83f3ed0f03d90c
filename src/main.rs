use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use lumi_e2e::driver::web::{BrowserType, WebBrowserFactory};
use lumi_e2e::runner::{ConsoleEventListener, EventEmitter};
use lumi_e2e::utils::config::{ConfigOverrides, RunConfig};
use lumi_e2e::{parser, report, runner};

#[derive(Parser)]
#[command(name = "lumi-e2e")]
#[command(author = "NL Team")]
#[command(version = "0.1.3")]
#[command(about = "End-to-end workflow runner for single-page web apps", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run workflow file(s) or directories
    Run {
        /// Workflow files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// YAML run configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Base URL of the application under test
        #[arg(long)]
        base_url: Option<String>,

        #[arg(short, long)]
        username: Option<String>,

        #[arg(short, long)]
        password: Option<String>,

        /// Run the browser without a window
        #[arg(long)]
        headless: bool,

        /// Implicit element wait in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Attempts per workflow (driver failures only are retried)
        #[arg(long)]
        max_attempts: Option<u32>,

        /// Seconds to wait between attempts
        #[arg(long)]
        retry_delay: Option<f64>,

        /// Output directory for reports and screenshots
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Browser engine (chromium, firefox, webkit)
        #[arg(short, long)]
        browser: Option<String>,
    },

    /// Parse workflow files without running them
    Validate {
        /// Workflow files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Generate report from saved results
    Report {
        /// Path to test-results.json
        results: PathBuf,

        /// Output format (json, junit)
        #[arg(short, long, default_value = "junit")]
        format: String,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            paths,
            config,
            base_url,
            username,
            password,
            headless,
            timeout,
            max_attempts,
            retry_delay,
            output,
            browser,
        } => {
            let overrides = ConfigOverrides {
                base_url,
                username,
                password,
                headless: headless.then_some(true),
                timeout_seconds: timeout,
                browser,
                output_dir: output,
                max_attempts,
                retry_delay_seconds: retry_delay,
            };
            let config = RunConfig::load(config.as_deref(), &overrides)
                .context("Invalid run configuration")?;

            let browser_type = BrowserType::from_name(&config.browser);

            println!(
                "{} Running workflows from: {}",
                "▶".green().bold(),
                paths
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            println!("  Base URL: {}", config.base_url.cyan());
            println!("  Browser: {}", config.browser.cyan());
            if config.headless {
                println!("  Headless: {}", "Enabled".yellow());
            }
            println!(
                "  Attempts: {} (delay {}s)",
                config.retry.max_attempts, config.retry.retry_delay_seconds
            );
            println!("  Output: {}", config.output_dir.display().to_string().cyan());

            let (emitter, receiver) = EventEmitter::new();
            let listener = tokio::spawn(ConsoleEventListener::listen(receiver));

            let results = runner::run_workflows(
                &paths,
                WebBrowserFactory::new(browser_type),
                config,
                emitter,
            )
            .await;

            // Emitter is gone once the run returns; let the listener drain
            let _ = listener.await;

            if !results?.all_passed() {
                std::process::exit(1);
            }
        }

        Commands::Validate { paths } => {
            let files = runner::collect_workflow_files(&paths)?;
            let mut invalid = 0;
            for file in &files {
                match parser::parse_workflow_file(file) {
                    Ok(workflow) => println!(
                        "  {} {} ({} steps)",
                        "✓".green(),
                        file.display(),
                        workflow.steps().len()
                    ),
                    Err(e) => {
                        invalid += 1;
                        println!("  {} {}: {:#}", "✗".red(), file.display(), e);
                    }
                }
            }
            if invalid > 0 {
                anyhow::bail!("{} of {} workflow files are invalid", invalid, files.len());
            }
        }

        Commands::Report {
            results,
            format,
            output,
        } => {
            println!(
                "{} Generating {} report from: {}",
                "📊".to_string().blue(),
                format.cyan(),
                results.display()
            );
            report::generate_report(&results, &format, output.as_deref())?;
        }
    }

    Ok(())
}
