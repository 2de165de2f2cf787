//! `airis-cli` – AIRIS voxel agent client.
//!
//! This binary wires the stack together and drives one session:
//!
//! 1. Loads `~/.airis/config.toml` (writing the defaults on first run) and
//!    applies `AIRIS_*` overrides.
//! 2. Picks the transport: the signed agent binding when `--agent
//!    address@endpoint` is given, plain HTTP otherwise.
//! 3. With `--restore`, only ends the session recorded by the previous run.
//! 4. Otherwise empties the output directory, opens a session and ticks the
//!    control loop against the simulated world until **Ctrl-C**.

mod config;

use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use tracing::{error, info};

use airis_hal::SimWorld;
use airis_memory::{ArtifactPublisher, SessionStore};
use airis_middleware::{
    AgentSession, AgentSessionConfig, AgentTarget, DecisionSession, HttpSession,
    HttpSessionConfig, SessionError,
};
use airis_runtime::{ControlLoop, ControlLoopConfig, init_tracing, restore_and_end};

/// Surface height of the simulated flat world.
const SIM_GROUND_Y: i32 = 64;

#[derive(Parser, Debug)]
#[command(name = "airis", version, about = "AIRIS voxel agent client")]
struct Args {
    /// End the session left over from the previous run, then exit.
    #[arg(long)]
    restore: bool,

    /// Talk to a remote agent (`address@endpoint`) instead of the HTTP API.
    #[arg(long, value_name = "ADDRESS@ENDPOINT")]
    agent: Option<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let _telemetry = init_tracing("airis");

    print_banner();

    // ── Configuration ─────────────────────────────────────────────────────
    let path = config::config_path();
    if !path.exists() {
        match config::save(&config::Config::default()) {
            Ok(()) => println!("  Default config written to {}", path.display().to_string().bold()),
            Err(e) => println!("{}: {}", "Error saving config".red(), e),
        }
    }
    let cfg = match config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            config::Config::default()
        }
    };
    info!(?cfg, "configuration loaded");

    // ── Transport ─────────────────────────────────────────────────────────
    let mut session = match build_session(args.agent.as_deref(), &cfg) {
        Ok(session) => session,
        Err(e) => {
            error!(error = %e, "failed to set up the session transport");
            println!("{}: {}", "Transport error".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };
    let store = SessionStore::new(&cfg.session_file);

    if args.restore {
        return match restore_and_end(&mut session, &store) {
            Ok(id) => {
                println!("  {} Session {} ended.", "✓".green().bold(), id.bold());
                ExitCode::SUCCESS
            }
            Err(e) => {
                println!("{}: {}", "Restore failed".red().bold(), e);
                ExitCode::FAILURE
            }
        };
    }

    // ── Output directory ──────────────────────────────────────────────────
    let publisher = ArtifactPublisher::new(&cfg.output_dir);
    if let Err(e) = publisher.prepare() {
        println!("{}: {}", "Output directory error".red().bold(), e);
        return ExitCode::FAILURE;
    }

    let world = SimWorld::flat(SIM_GROUND_Y);
    let mut ctl = ControlLoop::new(world, session, ControlLoopConfig::default())
        .with_publisher(publisher)
        .with_session_store(store);

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    // Ignored until the session is open; afterwards the loop stops at the
    // next tick boundary and ends the session.
    let token = ctl.cancel_token();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        if token.cancel() {
            println!("{}", "⚠  Ctrl-C received – ending session after this tick …".yellow().bold());
        } else {
            println!("{}", "  Ctrl-C ignored: session not running yet.".dimmed());
        }
    }) {
        tracing::warn!(error = %e, "Failed to install Ctrl-C handler; the loop cannot be stopped gracefully");
    }

    // ── Session ───────────────────────────────────────────────────────────
    let session_id = match ctl.start() {
        Ok(id) => id,
        Err(e) => {
            error!(error = %e, "initialization failed");
            println!("{}: {}", "Initialization failed".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };
    println!("  Session {} running. Press {} to stop.\n", session_id.bold(), "Ctrl-C".bold());

    match ctl.run() {
        Ok(Some(id)) => {
            println!("  {} Session {} ended after {} tick(s).", "✓".green().bold(), id.bold(), ctl.ticks());
            ExitCode::SUCCESS
        }
        Ok(None) => {
            println!("{}", "  Session could not be ended cleanly; try --restore.".yellow());
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("{}: {}", "Control loop error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn build_session(
    agent: Option<&str>,
    cfg: &config::Config,
) -> Result<Box<dyn DecisionSession>, SessionError> {
    match agent {
        Some(raw) => {
            let target: AgentTarget = raw.parse()?;
            let session = AgentSession::new(
                target,
                AgentSessionConfig {
                    timeout: cfg.agent_timeout(),
                },
            )?;
            println!("  Transport: agent {} (as {})", session.target().to_string().bold(), session.address().dimmed());
            Ok(Box::new(session))
        }
        None => {
            let session = HttpSession::new(HttpSessionConfig {
                base_url: cfg.api_url.clone(),
                timeout: None,
            })?;
            println!("  Transport: HTTP {}", session.base_url().bold());
            Ok(Box::new(session))
        }
    }
}

fn print_banner() {
    println!();
    println!("{}", r#"    ___    ________  _________"#.bold().cyan());
    println!("{}", r#"   /   |  /  _/ __ \/  _/ ___/"#.bold().cyan());
    println!("{}", r#"  / /| |  / // /_/ // / \__ \ "#.bold().cyan());
    println!("{}", r#" / ___ |_/ // _, _// / ___/ / "#.bold().cyan());
    println!("{}", r#"/_/  |_/___/_/ |_/___//____/  "#.bold().cyan());
    println!();
    println!("  {} {}",
        "AIRIS".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Voxel agent client");
    println!();
}
