//! Sightline terminal entry point.

use crossterm::{
    event::{self, Event as CrosstermEvent},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use sightline_tui::api_client::RestClient;
use sightline_tui::config::TuiConfig;
use sightline_tui::dispatch;
use sightline_tui::error::TuiError;
use sightline_tui::events::TuiEvent;
use sightline_tui::keys::{map_editor_key, map_key};
use sightline_tui::logging::init_logging;
use sightline_tui::nav::Pane;
use sightline_tui::notifications::NotificationLevel;
use sightline_tui::persistence;
use sightline_tui::state::{App, Command};
use sightline_tui::views::render_view;
use std::io::{self, Stdout};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), TuiError> {
    let config = TuiConfig::load()?;
    init_logging(&config.log_path)?;
    let rest = RestClient::new(&config)?;
    let mut app = App::new(config);
    match persistence::load(&app.config.persistence_path) {
        Ok(Some(state)) => app.restore(state),
        Ok(None) => {}
        Err(err) => {
            warn!(error = %err, "persisted state unreadable");
            app.notify(NotificationLevel::Warning, format!("Saved state ignored: {err}"));
        }
    }

    let mut terminal = setup_terminal()?;
    let _guard = TerminalGuard;

    let (event_tx, mut event_rx) = mpsc::channel::<TuiEvent>(256);
    spawn_input_reader(event_tx.clone());

    let mut ticker = tokio::time::interval(app.config.tick_interval());

    loop {
        terminal.draw(|f| render_view(f, &app, Instant::now()))?;

        tokio::select! {
            _ = ticker.tick() => {
                app.engine.tick(Instant::now());
            }
            Some(event) = event_rx.recv() => {
                if handle_event(&mut app, event, &rest, &event_tx)? {
                    break;
                }
            }
        }

        for request in app.take_requests() {
            dispatch::spawn_resolution(rest.clone(), request, event_tx.clone());
        }
    }

    let persisted = app.persisted_state();
    if let Err(err) = persistence::save(&app.config.persistence_path, &persisted) {
        warn!(error = %err, "failed to save UI state");
    }
    info!("Sightline exiting");

    Ok(())
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>, TuiError> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Ok(Terminal::new(backend)?)
}

struct TerminalGuard;

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let mut stdout = io::stdout();
        let _ = execute!(stdout, LeaveAlternateScreen);
    }
}

fn spawn_input_reader(sender: mpsc::Sender<TuiEvent>) {
    std::thread::spawn(move || loop {
        if let Ok(true) = event::poll(Duration::from_millis(200)) {
            if let Ok(evt) = event::read() {
                let sent = match evt {
                    CrosstermEvent::Key(key) => sender.blocking_send(TuiEvent::Input(key)),
                    CrosstermEvent::Resize(width, height) => {
                        sender.blocking_send(TuiEvent::Resize { width, height })
                    }
                    _ => Ok(()),
                };
                if sent.is_err() {
                    break;
                }
            }
        }
    });
}

/// Returns `true` when the loop should exit.
fn handle_event(
    app: &mut App,
    event: TuiEvent,
    rest: &RestClient,
    sender: &mpsc::Sender<TuiEvent>,
) -> Result<bool, TuiError> {
    let now = Instant::now();
    match event {
        TuiEvent::Input(key) => {
            let action = if app.pane == Pane::Editor && !app.modal_open() {
                let action = map_editor_key(key);
                if action.is_none() {
                    app.editor.input(key);
                }
                action
            } else {
                map_key(key)
            };
            if let Some(action) = action {
                match app.handle_action(action, now) {
                    Some(Command::Quit) => return Ok(true),
                    Some(Command::RunQuery { text, scope }) => {
                        info!(scope = %scope, "running query");
                        dispatch::spawn_query(rest.clone(), text, scope, sender.clone());
                    }
                    None => {}
                }
            }
        }
        TuiEvent::Resize { .. } => {}
        TuiEvent::QueryCompleted(outcome) => app.on_query_completed(outcome),
        TuiEvent::ResolutionBatch {
            operation,
            generation,
            batch,
        } => {
            app.on_resolution_batch(operation, generation, batch, now);
        }
        TuiEvent::ResolutionFailed { operation, message } => {
            app.on_resolution_failed(operation, &message, now);
        }
    }
    Ok(false)
}
