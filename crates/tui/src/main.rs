mod app;
mod async_ops;
mod config;
mod handoff;
mod run;
mod theme;
mod ui;

use std::io::stdout;
use std::sync::{mpsc, Arc};
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::prelude::*;
use tracing_subscriber::EnvFilter;

use app::{App, Effect};
use async_ops::{dispatch, CommandResult};
use shopwatch_api_client::EventChannel;

/// Terminal dashboard for launching and monitoring shopping-agent runs.
#[derive(Parser)]
#[command(name = "shopwatch", version)]
struct Cli {
    /// Backend base URL (overrides the config file)
    #[arg(long)]
    server: Option<String>,

    /// Identity-provider user id (overrides the config file)
    #[arg(long)]
    user: Option<String>,

    /// Start a run with this task immediately
    #[arg(long)]
    task: Option<String>,

    /// Open a persisted run read-only instead of the launch form
    #[arg(long, value_name = "RUN_ID")]
    attach: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let mut app_config = config::load_config();
    if let Some(server) = cli.server {
        app_config.server.url = server;
    }
    if let Some(user) = cli.user {
        app_config.identity.user_id = user;
    }

    // The terminal loop is synchronous; the runtime only hosts API calls
    // and the push-channel pump. Entering it here lets them spawn from
    // anywhere in the loop.
    let runtime = tokio::runtime::Runtime::new()?;
    let _guard = runtime.enter();

    let (results_tx, results_rx) = mpsc::channel::<CommandResult>();
    let mut app = App::new(app_config);

    let initial_effects = if let Some(run_id) = cli.attach {
        app.open_run(&run_id)
    } else if let Some(task) = cli.task {
        app.start_run(task)
    } else {
        app.resume_from_handoff()
    };

    // Terminal setup
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout());
    let mut terminal = Terminal::new(backend)?;

    apply_effects(&mut app, initial_effects, &results_tx);
    let result = run_loop(&mut terminal, &mut app, &results_tx, &results_rx);

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

/// Route tracing to a file so log lines never tear the alternate screen.
/// Silently disabled when no config directory is available.
fn init_logging() {
    let Some(dir) = config::config_dir() else {
        return;
    };
    if std::fs::create_dir_all(&dir).is_err() {
        return;
    }
    let Ok(file) = std::fs::File::options()
        .create(true)
        .append(true)
        .open(dir.join("shopwatch.log"))
    else {
        return;
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("shopwatch=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .init();
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    app: &mut App,
    results_tx: &mpsc::Sender<CommandResult>,
    results_rx: &mpsc::Receiver<CommandResult>,
) -> Result<()> {
    loop {
        app.tick();
        terminal.draw(|frame| ui::render(frame, app))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                let effects = app.handle_key(key);
                if apply_effects(app, effects, results_tx) {
                    return Ok(());
                }
            }
        }

        // Completed API calls
        while let Ok(result) = results_rx.try_recv() {
            let effects = app.handle_result(result);
            if apply_effects(app, effects, results_tx) {
                return Ok(());
            }
        }

        // Push-channel events
        let effects = app.pump_channel();
        if apply_effects(app, effects, results_tx) {
            return Ok(());
        }
    }
}

/// Execute effects against the real world. Returns true on quit.
fn apply_effects(
    app: &mut App,
    effects: Vec<Effect>,
    results_tx: &mpsc::Sender<CommandResult>,
) -> bool {
    for effect in effects {
        match effect {
            Effect::Api(command) => dispatch(command, &app.config, results_tx.clone()),
            Effect::OpenChannel { url } => {
                app.controller.attach_channel(EventChannel::open(url));
            }
            Effect::Quit => return true,
        }
    }
    false
}
