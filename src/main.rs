use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use lumi_ddt::parser::Workflow;
use lumi_ddt::runner::{CancelFlag, RunOptions};
use lumi_ddt::{parser, report, runner, HarnessConfig};

#[derive(Parser)]
#[command(name = "lumi-ddt")]
#[command(author = "NL Team")]
#[command(version = "0.1.0")]
#[command(about = "Data-driven storefront acceptance testing CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a test-case worksheet export into a test-case CSV
    Convert {
        /// Worksheet exported as CSV (ID, Test case name, Precondition, Input, Expected Result)
        sheet: PathBuf,

        /// Workflow the sheet describes (registration, checkout)
        #[arg(short, long)]
        workflow: Workflow,

        /// Output CSV path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Run test case CSV file(s) or directory
    Run {
        /// Path to test case CSV or directory
        path: PathBuf,

        /// Workflow (registration, checkout). Detected from the CSV header if not provided.
        #[arg(short, long)]
        workflow: Option<Workflow>,

        /// Config file (defaults to ./lumi-ddt.yaml, then ~/.lumi-tester/ddt.yaml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Test cases to run concurrently
        #[arg(long)]
        workers: Option<usize>,

        /// Output directory for reports and screenshots
        #[arg(short, long, default_value = "./output")]
        output: PathBuf,

        /// Run the browser headless
        #[arg(long, default_value = "false")]
        headless: bool,

        /// Generate reports (JSON, JUnit)
        #[arg(long, default_value = "false")]
        report: bool,

        /// Run only these test ids (comma-separated)
        #[arg(long, value_delimiter = ',')]
        only: Option<Vec<String>>,
    },

    /// Generate report from test results
    Report {
        /// Path to test results JSON
        results: PathBuf,

        /// Output format (json, junit)
        #[arg(short, long, default_value = "json")]
        format: String,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Convert {
            sheet,
            workflow,
            output,
        } => {
            println!(
                "{} Converting {} sheet: {}",
                "▶".green().bold(),
                workflow.name().cyan(),
                sheet.display()
            );

            let converted = parser::convert_sheet(&sheet, workflow, &output)?;
            for error in &converted.errors {
                println!("  {} {}", "✗".red(), error);
            }
            println!(
                "{} Wrote {} test cases to {}",
                "✓".green(),
                converted.written,
                output.display().to_string().cyan()
            );

            if !converted.errors.is_empty() {
                println!("{} {} rows rejected", "⚠".yellow(), converted.errors.len());
                std::process::exit(1);
            }
        }

        Commands::Run {
            path,
            workflow,
            config,
            workers,
            output,
            headless,
            report,
            only,
        } => {
            let mut harness = HarnessConfig::load(config.as_deref())?;
            if let Some(workers) = workers {
                harness.workers = workers;
            }
            if headless {
                harness.browser.headless = true;
            }

            println!(
                "{} Running tests from: {}",
                "▶".green().bold(),
                path.display()
            );
            println!("  Base URL: {}", harness.base_url.cyan());
            if let Some(w) = workflow {
                println!("  Workflow: {}", w.name().cyan());
            }
            if harness.workers > 1 {
                println!("  Workers: {}", harness.workers.to_string().yellow());
            }
            if let Some(ref ids) = only {
                println!("  Only: {}", ids.join(", ").yellow());
            }
            println!("  Output: {}", output.display().to_string().cyan());
            if report {
                println!("  Reports: {}", "Enabled".green());
            }

            let cancel = CancelFlag::new();
            let cancel_handler = cancel.clone();
            ctrlc::set_handler(move || {
                println!("\n{} Interrupted, stopping run...", "⏹️ ".yellow());
                cancel_handler.cancel();
            })?;

            let options = RunOptions {
                workflow,
                output,
                report,
                only,
            };
            let result = runner::run_tests(&path, harness, &options, cancel).await?;

            if !result.success() {
                std::process::exit(1);
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
            report::generate_report(&results, &format, output.as_deref()).await?;
        }
    }

    Ok(())
}
