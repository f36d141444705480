//! `scout-cli` – Scout command line interface.
//!
//! 1. Installs tracing (see `scout_runtime::telemetry`).
//! 2. Checks for `~/.scout/config.toml`; runs a **First-Run Wizard** when the
//!    file is absent.
//! 3. Opens the research memory and registers one search adapter per crawl
//!    export found in the feeds directory.
//! 4. Drops the user into an **interactive REPL** with slash-commands.
//! 5. Intercepts **Ctrl-C** and exits after the current command.

mod config;
mod repl;

use colored::Colorize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

use scout_runtime::{JsonFileAdapter, Researcher};

fn main() {
    let _telemetry = scout_runtime::telemetry::init_tracing("scout");

    print_banner();

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – finishing the current command …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler");
    }

    // ── First-Run Wizard ──────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(None) => run_first_run_wizard(),
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            config::Config::default()
        }
    };

    // ── Research stack ────────────────────────────────────────────────────
    let researcher = match build_researcher(&cfg) {
        Ok(r) => r,
        Err(e) => {
            println!("{}: {}", "Failed to open research memory".red(), e);
            std::process::exit(1);
        }
    };
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            println!("{}: {}", "Failed to start async runtime".red(), e);
            std::process::exit(1);
        }
    };

    let sources = researcher.sources();
    if sources.is_empty() {
        println!(
            "  {} Drop crawl exports into {} as <source>.json.",
            "No feeds found.".yellow(),
            cfg.feeds_dir.display().to_string().bold()
        );
    } else {
        println!("  Sources: {}", sources.join(", ").bold());
    }

    println!();
    println!("  Type {} for a list of commands.\n", "/help".bold().cyan());

    let shell = repl::Shell {
        runtime,
        researcher,
        config: cfg,
    };
    repl::run(shutdown, &shell);
}

fn build_researcher(cfg: &config::Config) -> Result<Researcher, String> {
    let mut researcher =
        Researcher::open(&cfg.data_dir, &cfg.config_dir).map_err(|e| e.to_string())?;
    let adapters = JsonFileAdapter::discover(&cfg.feeds_dir)
        .map_err(|e| format!("Failed to read {}: {}", cfg.feeds_dir.display(), e))?;
    for adapter in adapters {
        researcher.register(Box::new(adapter));
    }
    Ok(researcher)
}

// ─────────────────────────────────────────────────────────────────────────────
// First-Run Wizard
// ─────────────────────────────────────────────────────────────────────────────

fn run_first_run_wizard() -> config::Config {
    println!();
    println!("{}", "  ╔══════════════════════════════════════╗".bold().cyan());
    println!("{}", "  ║        Scout First-Run Wizard        ║".bold().cyan());
    println!("{}", "  ╚══════════════════════════════════════╝".bold().cyan());
    println!();
    println!("  No configuration found.  Let's set up Scout.\n");

    let mut cfg = config::Config::default();

    let dir = prompt_line(
        &format!("  Data directory [{}]: ", cfg.data_dir.display()),
        &cfg.data_dir.to_string_lossy(),
    );
    cfg.data_dir = dir.into();

    let dir = prompt_line(
        &format!("  Crawl export directory [{}]: ", cfg.feeds_dir.display()),
        &cfg.feeds_dir.to_string_lossy(),
    );
    cfg.feeds_dir = dir.into();

    println!("  Default research type?");
    for (i, kind) in repl::RESEARCH_TYPES.iter().enumerate() {
        println!("    {}) {}", i + 1, kind);
    }
    let choice = prompt_line("  Enter choice [1]: ", "1");
    if let Some(kind) = choice
        .trim()
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| repl::RESEARCH_TYPES.get(i))
    {
        cfg.default_research_type = kind.to_string();
    }

    match config::save(&cfg) {
        Ok(()) => println!(
            "\n  {} Config saved to {}\n",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
    cfg
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   _____                  __ "#.bold().cyan());
    println!("{}", r#"  / ___/_________  __  __/ /_"#.bold().cyan());
    println!("{}", r#"  \__ \/ ___/ __ \/ / / / __/"#.bold().cyan());
    println!("{}", r#" ___/ / /__/ /_/ / /_/ / /_  "#.bold().cyan());
    println!("{}", r#"/____/\___/\____/\__,_/\__/  "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "Scout".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Research scoring and learning");
    println!();
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn prompt_line(msg: &str, default: &str) -> String {
    use std::io::{BufRead, Write};
    print!("{}", msg);
    std::io::stdout().flush().ok();
    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(_) => {
            let t = line.trim().to_string();
            if t.is_empty() { default.to_string() } else { t }
        }
        Err(_) => default.to_string(),
    }
}
