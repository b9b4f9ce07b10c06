use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use clap_complete::Shell;
use colored::Colorize;

use download_mux::{Config, DownloadMux, print_error};

#[derive(Parser)]
#[command(
    author,
    version,
    name = env!("CARGO_BIN_NAME"),
    about = "Merge downloaded video folders into single MKV files"
)]
struct Args {
    /// Optional root directory, defaults to the current directory
    #[arg(value_hint = clap::ValueHint::DirPath)]
    path: Option<PathBuf>,

    /// Only print ffmpeg commands without merging or deleting anything
    #[arg(short, long)]
    print: bool,

    /// Print verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Exit without waiting for Enter
    #[arg(short = 'n', long)]
    no_pause: bool,

    /// Generate shell completion
    #[arg(short = 'l', long, name = "SHELL")]
    completion: Option<Shell>,
}

fn main() {
    let args = Args::parse();
    if let Some(shell) = args.completion {
        if let Err(error) = download_mux::generate_shell_completion(shell, Args::command(), true, env!("CARGO_BIN_NAME"))
        {
            print_error!("{error:#}");
            std::process::exit(1);
        }
        return;
    }

    let result = run(&args);
    if let Err(error) = &result {
        print_error!("{error:#}");
    }
    if !args.no_pause {
        wait_for_enter();
    }
    if result.is_err() {
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    let root = download_mux::resolve_input_path(args.path.as_deref())?;
    let config = Config::new(root)
        .with_dryrun(args.print)
        .with_verbose(args.verbose);

    println!("{}", format!("Scanning: {}", config.root().display()).bold());
    if config.dryrun() {
        println!("{}", "Dryrun: nothing will be merged or deleted".yellow());
    }
    println!();

    let mux = DownloadMux::new(config)?;

    let abort_flag = Arc::new(AtomicBool::new(false));
    let abort_flag_handler = Arc::clone(&abort_flag);
    ctrlc::set_handler(move || {
        if abort_flag_handler.load(Ordering::SeqCst) {
            // Second Ctrl+C
            std::process::exit(130);
        }
        println!("\n{}", "Received Ctrl+C, finishing current folder...".yellow().bold());
        abort_flag_handler.store(true, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    let stats = mux.run_until_aborted(&abort_flag);
    stats.print_summary();
    Ok(())
}

fn wait_for_enter() {
    print!("\nPress Enter to exit...");
    let _ = io::stdout().flush();
    let mut line = String::new();
    let _ = io::stdin().lock().read_line(&mut line);
}
