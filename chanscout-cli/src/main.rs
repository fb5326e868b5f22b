use anyhow::{Context, Result};
use chanscout::{
    config::ScanConfig, logging::init_logging, run_scan, BarProgress, DirectorySource,
    ScanSummary,
};
use clap::Parser;
use colored::Colorize;
use crossterm::{
    cursor::MoveTo,
    execute,
    terminal::{Clear, ClearType},
};
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file to load on top of the global and local ones
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ScanConfig::load_from(cli.config.as_deref()).context("Failed to load configuration")?;
    init_logging(&config).context("Failed to set up logging")?;

    let mut stdout = io::stdout();
    if stdout.is_terminal() {
        execute!(stdout, Clear(ClearType::All), MoveTo(0, 0))?;
    }

    let term = prompt_term()?;
    let source = Arc::new(DirectorySource::new(&config.source_root));
    let progress = BarProgress::new();

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let summary = runtime
        .block_on(run_scan(&config, &term, source, &progress))
        .with_context(|| format!("Scan of channel {} failed", config.channel))?;

    print_summary(&config, &summary);
    Ok(())
}

fn prompt_term() -> Result<String> {
    print!("Enter search term: ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read search term")?;
    Ok(line.trim().to_string())
}

fn print_summary(config: &ScanConfig, summary: &ScanSummary) {
    println!();
    println!(
        "Searched {} attachments ({} files), {} skipped",
        summary.items_scheduled.to_string().bold(),
        summary.output.files_searched,
        summary.items_skipped
    );
    if summary.output.found_any() {
        println!(
            "{} in {} files, written to {}",
            format!("{} matches", summary.output.total_matches).green(),
            summary.output.files_with_matches,
            config.results_file.display().to_string().blue()
        );
    } else {
        println!("{}", "No matches found".yellow());
    }
    if summary.items_failed > 0 || summary.output.failures > 0 {
        println!(
            "{} failed attachments, {} file errors, see {}",
            summary.items_failed.to_string().red(),
            summary.output.failures.to_string().red(),
            config.errors_file.display()
        );
    }
    if summary.retries > 0 {
        println!("{} retries after transient failures", summary.retries);
    }
}
