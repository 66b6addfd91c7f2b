use std::error::Error;
use std::io::{BufRead, Write};
use std::sync::Arc;

use clap::Subcommand;
use pomofocus_core::{
    BackgroundSink, Chime, Config, Database, Event, InlineSink, MemorySessionStore,
    RemoteSessionStore, SessionStore, SqliteSessionStore, TimerEngine, TimerMode, TimerRunner,
    TimerSnapshot,
};
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};

use super::require_task;

#[derive(Subcommand)]
pub enum TimerAction {
    /// Run an interactive timer in the foreground
    Run {
        /// Starting mode: focus, short_break or long_break
        #[arg(long, default_value = "focus")]
        mode: String,
        /// Task to credit (defaults to `active_task` from config)
        #[arg(long)]
        task: Option<String>,
        /// Start counting down immediately
        #[arg(long)]
        now: bool,
    },
    /// Print a fresh timer snapshot for the configured settings as JSON
    Status,
}

/// Rings the terminal bell.
struct TerminalBell;

impl Chime for TerminalBell {
    fn play(&self, volume: u8) -> Result<(), Box<dyn Error + Send + Sync>> {
        if volume == 0 {
            return Ok(());
        }
        let mut out = std::io::stdout();
        out.write_all(b"\x07")?;
        out.flush()?;
        Ok(())
    }
}

enum Input {
    Start,
    Pause,
    Resume,
    Reset,
    Skip,
    Mode(TimerMode),
    Reload,
    Help,
    Quit,
}

fn parse_input(line: &str) -> Result<Input, String> {
    let mut parts = line.split_whitespace();
    let cmd = parts.next().unwrap_or("");
    let input = match cmd {
        "g" | "go" | "start" => Input::Start,
        "p" | "pause" => Input::Pause,
        "r" | "resume" => Input::Resume,
        "x" | "reset" => Input::Reset,
        "s" | "skip" => Input::Skip,
        "m" | "mode" => {
            let name = parts.next().ok_or("usage: m <focus|short|long>")?;
            Input::Mode(TimerMode::parse(name).ok_or_else(|| format!("unknown mode: {name}"))?)
        }
        "c" | "reload" => Input::Reload,
        "q" | "quit" => Input::Quit,
        "" | "h" | "help" | "?" => Input::Help,
        other => return Err(format!("unknown command: {other}")),
    };
    Ok(input)
}

const HELP: &str =
    "commands: g start, p pause, r resume, x reset, s skip, m <mode>, c reload config, q quit";

fn render(snapshot: &TimerSnapshot) {
    let mins = snapshot.time_remaining_secs / 60;
    let secs = snapshot.time_remaining_secs % 60;
    let mut out = std::io::stdout();
    let _ = write!(
        out,
        "\r{:<11} {mins:02}:{secs:02}  {:<9} #{}",
        snapshot.mode.as_str(),
        format!("{:?}", snapshot.status).to_lowercase(),
        snapshot.completed_pomodoros,
    );
    let _ = out.flush();
}

fn announce(event: &Event) {
    let message = match event {
        Event::TimerCompleted {
            mode,
            next_mode,
            auto_started,
            ..
        } => {
            let next = if *auto_started { "started" } else { "ready" };
            format!("{mode} complete, {next_mode} {next}")
        }
        Event::TimerReset {
            recorded: true,
            elapsed_secs,
            ..
        } => format!("reset, {elapsed_secs}s recorded as abandoned"),
        Event::TimerSkipped { from, to, .. } => format!("skipped {from}, now {to}"),
        _ => return,
    };
    println!("\n{message}");
}

/// Sessions go to the remote backend when `remote.base_url` is set,
/// otherwise to the local database.
fn session_store(config: &Config, runtime: Handle) -> Result<Arc<dyn SessionStore>, Box<dyn Error>> {
    match &config.remote.base_url {
        Some(base_url) => {
            let token_env = &config.remote.token_env;
            let token = std::env::var(token_env)
                .map_err(|_| format!("remote store configured but {token_env} is not set"))?;
            info!(base_url = %base_url, "recording sessions remotely");
            Ok(Arc::new(RemoteSessionStore::new(base_url, token, runtime)?))
        }
        None => Ok(Arc::new(SqliteSessionStore::new(Database::open()?))),
    }
}

/// Re-read `config.toml` and hand the timer settings to the runner.
/// A running or paused countdown keeps its remaining time.
fn reload_settings(runner: &TimerRunner) -> Result<(), Box<dyn Error>> {
    let config = Config::load()?;
    runner.set_settings(config.timer);
    info!("timer settings reloaded");
    Ok(())
}

/// Stdin is read on a plain thread so quitting never waits on a pending read.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

async fn interactive(runner: TimerRunner, sink: Arc<BackgroundSink>, start_now: bool) -> Result<(), Box<dyn Error>> {
    let mut snapshots = runner.snapshots();
    let mut events = runner.subscribe_events();
    let mut lines = spawn_stdin_reader();

    println!("{HELP}");
    if start_now {
        runner.start();
    }
    render(&snapshots.borrow_and_update());

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                render(&snapshots.borrow_and_update());
            }
            event = events.recv() => match event {
                Ok(event) => announce(&event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "event receiver lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            line = lines.recv() => {
                let Some(line) = line else { break };
                match parse_input(&line) {
                    Ok(Input::Start) => { runner.start(); }
                    Ok(Input::Pause) => { runner.pause(); }
                    Ok(Input::Resume) => { runner.resume(); }
                    Ok(Input::Reset) => { runner.reset(); }
                    Ok(Input::Skip) => { runner.skip(); }
                    Ok(Input::Mode(mode)) => { runner.set_mode(mode); }
                    Ok(Input::Reload) => match reload_settings(&runner) {
                        Ok(()) => println!("\nsettings reloaded"),
                        Err(e) => println!("\nreload failed: {e}"),
                    },
                    Ok(Input::Help) => println!("\n{HELP}"),
                    Ok(Input::Quit) => break,
                    Err(message) => println!("\n{message}"),
                }
                render(&runner.snapshot());
            }
        }
    }

    runner.shutdown();
    println!();
    if sink.pending() > 0 {
        eprintln!("saving sessions...");
    }
    sink.drain().await;
    Ok(())
}

pub fn run(action: TimerAction) -> Result<(), Box<dyn Error>> {
    let config = Config::load()?;

    match action {
        TimerAction::Run { mode, task, now } => {
            let mode = TimerMode::parse(&mode).ok_or_else(|| format!("unknown mode: {mode}"))?;
            let task = task.or(config.active_task.clone());
            if let Some(id) = &task {
                require_task(&Database::open()?, id)?;
            }
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            let store = session_store(&config, runtime.handle().clone())?;
            let sink = Arc::new(BackgroundSink::with_handle(store, runtime.handle().clone()));

            let mut engine = TimerEngine::new(config.timer.clone(), sink.clone())
                .with_chime(Arc::new(TerminalBell));
            engine.set_active_task(task);
            engine.set_mode(mode);

            let runner = TimerRunner::with_handle(engine, runtime.handle().clone());
            runtime.block_on(interactive(runner, sink, now))?;
        }
        TimerAction::Status => {
            let sink = Arc::new(InlineSink::new(Arc::new(MemorySessionStore::new())));
            let mut engine = TimerEngine::new(config.timer.clone(), sink);
            engine.set_active_task(config.active_task.clone());
            println!("{}", serde_json::to_string_pretty(&engine.snapshot())?);
        }
    }
    Ok(())
}
