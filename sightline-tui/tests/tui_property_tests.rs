use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use proptest::prelude::*;
use sightline_core::{Cell, Effect};
use sightline_test_utils::fixtures::{guid, guid_column_model, sample_model};
use sightline_test_utils::MockDirectory;
use sightline_tui::api_client::{FailureDetail, QueryFailure, SourcePosition};
use sightline_tui::config::{
    AnimationConfig, AuthConfig, ResolutionConfig, ThemeConfig, TuiConfig,
};
use sightline_tui::keys::{map_editor_key, map_key, Action};
use sightline_tui::nav::Pane;
use sightline_tui::persistence::{self, PersistedState};
use sightline_tui::state::{App, Command};
use sightline_tui::views::status::status_bar;
use std::time::{Duration, Instant};

fn base_config() -> TuiConfig {
    TuiConfig {
        api_base_url: "http://localhost:8080".to_string(),
        auth: AuthConfig {
            api_key: Some("test-key".to_string()),
            jwt: None,
        },
        request_timeout_ms: 5_000,
        tick_interval_ms: 30,
        persistence_path: "tmp/sightline.json".into(),
        log_path: "tmp/sightline.log".into(),
        default_scope: "cluster/Samples".to_string(),
        theme: ThemeConfig {
            name: "nightgrid".to_string(),
        },
        animation: AnimationConfig {
            fade_ms: 150,
            pulse_ms: 300,
            hold_ms: 400,
            stagger_ms: 40,
        },
        resolution: ResolutionConfig {
            confirm_threshold: 10,
            identifier_ratio: 0.7,
        },
    }
}

fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
}

fn loaded_app(result: sightline_core::QueryResult) -> App {
    let mut app = App::new(base_config());
    app.on_query_completed(Ok(result));
    app.take_requests();
    app
}

/// Tick in coarse steps until every transition has finished.
fn settle(app: &mut App, mut now: Instant) -> Instant {
    for _ in 0..100 {
        if !app.engine.is_animating() {
            break;
        }
        now += Duration::from_secs(1);
        app.engine.tick(now);
    }
    now
}

// ============================================================================
// CONFIG
// ============================================================================

#[test]
fn config_requires_auth() {
    let mut config = base_config();
    config.auth = AuthConfig {
        api_key: None,
        jwt: None,
    };
    assert!(config.validate().is_err());
}

#[test]
fn config_requires_theme_name() {
    let mut config = base_config();
    config.theme = ThemeConfig {
        name: "unknown".to_string(),
    };
    assert!(config.validate().is_err());
}

#[test]
fn config_loads_from_toml_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sightline.toml");
    std::fs::write(
        &path,
        r#"
api_base_url = "https://query.example.net"
request_timeout_ms = 10000
tick_interval_ms = 33
persistence_path = "state/ui.json"
log_path = "state/sightline.log"
default_scope = "cluster/Logs"

[auth]
jwt = "token"

[theme]
name = "Nightgrid"

[animation]
fade_ms = 100
pulse_ms = 200
hold_ms = 300
stagger_ms = 20

[resolution]
confirm_threshold = 25
identifier_ratio = 0.5
"#,
    )
    .unwrap();

    let config = TuiConfig::from_path(&path).unwrap();
    config.validate().unwrap();
    let settings = config.engine_settings();
    assert_eq!(settings.resolution.confirm_threshold, 25);
    assert_eq!(settings.animation.stagger, Duration::from_millis(20));
    assert_eq!(config.tick_interval(), Duration::from_millis(33));
}

#[test]
fn config_rejects_unknown_fields() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "api_base_url = \"http://x\"\nsurprise = 1\n").unwrap();
    assert!(TuiConfig::from_path(&path).is_err());
}

// ============================================================================
// PERSISTENCE
// ============================================================================

#[test]
fn persisted_state_round_trips_through_app() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("ui.json");
    assert!(persistence::load(&path).unwrap().is_none());

    let mut app = App::new(base_config());
    app.restore(PersistedState {
        last_query: "Events\n| take 10".to_string(),
        scope: "cluster/Other".to_string(),
    });
    persistence::save(&path, &app.persisted_state()).unwrap();

    let loaded = persistence::load(&path).unwrap().unwrap();
    assert_eq!(loaded.last_query, "Events\n| take 10");
    assert_eq!(loaded.scope, "cluster/Other");
}

// ============================================================================
// APP FLOWS
// ============================================================================

#[test]
fn run_query_requires_text() {
    let mut app = App::new(base_config());
    assert_eq!(app.handle_action(Action::RunQuery, Instant::now()), None);
    assert!(!app.query_running);

    app.restore(PersistedState {
        last_query: "Events | take 5".to_string(),
        scope: String::new(),
    });
    assert_eq!(
        app.handle_action(Action::RunQuery, Instant::now()),
        Some(Command::RunQuery {
            text: "Events | take 5".to_string(),
            scope: "cluster/Samples".to_string(),
        })
    );
    assert!(app.query_running);
    assert_eq!(app.handle_action(Action::RunQuery, Instant::now()), None);
}

#[test]
fn query_failure_opens_error_modal() {
    let mut app = App::new(base_config());
    app.query_running = true;
    app.on_query_completed(Err(QueryFailure {
        message: "Syntax error".to_string(),
        details: vec![FailureDetail {
            code: "SYN0002".to_string(),
            message: "Unexpected token".to_string(),
            position: Some(SourcePosition { line: 1, column: 9 }),
        }],
    }));
    assert!(!app.query_running);
    assert!(app.modal_open());

    // Grid actions are swallowed while the modal is up.
    app.handle_action(Action::SortColumn, Instant::now());
    app.handle_action(Action::Cancel, Instant::now());
    assert!(!app.modal_open());
}

#[test]
fn column_resolution_streams_into_new_column() {
    let mut app = loaded_app(sample_model());
    assert_eq!(app.pane, Pane::Grid);
    let start = Instant::now();

    assert_eq!(app.handle_action(Action::ResolveColumn, start), None);
    let requests = app.take_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].identifiers.len(), 4);
    assert_eq!(app.engine.model().columns()[1].name, "UserId (resolved)");

    let directory = MockDirectory::new()
        .with_identity(&guid(1), "Ada", "user")
        .with_identity(&guid(2), "Grace", "user");
    let mut now = start;
    for batch in directory.respond(&requests[0], 3) {
        app.on_resolution_batch(requests[0].operation, requests[0].generation, batch, now);
        now = settle(&mut app, now);
    }

    let model = app.engine.model();
    assert_eq!(model.cell(0, 1).unwrap().display_text(), "Ada");
    assert_eq!(model.cell(1, 1).unwrap().display_text(), "Grace");
    assert!(matches!(model.cell(2, 1), Some(Cell::Failed(_))));
    assert!(!app.engine.link_for_source(0).unwrap().is_loading);
    assert_eq!(app.engine.in_flight(), 0);
}

#[test]
fn large_column_needs_confirmation() {
    let ids: Vec<Option<String>> = (1..=11).map(|n| Some(guid(n))).collect();

    let mut app = loaded_app(guid_column_model(&ids));
    app.handle_action(Action::ResolveColumn, Instant::now());
    assert!(app.pending_confirmation.is_some());
    assert!(app.take_requests().is_empty());

    app.handle_action(Action::Decline, Instant::now());
    assert!(app.pending_confirmation.is_none());
    assert!(app.take_requests().is_empty());
    assert_eq!(app.engine.model().column_count(), 2);

    app.handle_action(Action::ResolveColumn, Instant::now());
    app.handle_action(Action::Confirm, Instant::now());
    let requests = app.take_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].identifiers.len(), 11);
}

#[test]
fn broken_stream_finishes_operation() {
    let mut app = loaded_app(sample_model());
    let now = Instant::now();
    app.handle_action(Action::ResolveCell, now);
    let requests = app.take_requests();
    assert_eq!(requests.len(), 1);

    app.on_resolution_failed(requests[0].operation, "connection reset", now);
    settle(&mut app, now);
    assert_eq!(app.engine.in_flight(), 0);
    assert_eq!(app.engine.model().cell(0, 1).unwrap().display_text(), "Not resolved");

    // A second report for the same operation is ignored.
    let notes = app.notifications.len();
    app.on_resolution_failed(requests[0].operation, "connection reset", now);
    assert_eq!(app.notifications.len(), notes);
}

#[test]
fn moving_column_keeps_cursor_on_it() {
    let mut app = loaded_app(sample_model());
    app.handle_action(Action::MoveColumnRight, Instant::now());
    assert_eq!(app.cursor.col, 1);
    assert_eq!(app.engine.model().columns()[1].name, "UserId");

    app.handle_action(Action::MoveColumnLeft, Instant::now());
    app.handle_action(Action::MoveColumnLeft, Instant::now());
    assert_eq!(app.cursor.col, 0);
    assert_eq!(app.engine.model().columns()[0].name, "UserId");
}

#[test]
fn export_and_selection_show_in_status_bar() {
    let mut app = loaded_app(sample_model());
    app.handle_action(Action::ToggleCell, Instant::now());
    app.handle_action(Action::Export, Instant::now());

    let bar = status_bar(&app);
    let texts: Vec<&str> = bar.segments.iter().map(|(t, _)| t.as_str()).collect();
    assert_eq!(texts[0], "5 records");
    assert!(texts.contains(&"42 ms"));
    assert!(texts.contains(&"1 selected"));
    assert!(texts.contains(&"Export 5x4"));
}

#[test]
fn cancel_clears_selection_then_detail() {
    let mut app = loaded_app(sample_model());
    app.handle_action(Action::ToggleCell, Instant::now());
    app.handle_action(Action::ToggleDetailRow, Instant::now());

    app.handle_action(Action::Cancel, Instant::now());
    assert_eq!(app.engine.selection().cell_count(), 0);
    assert_eq!(app.engine.selection().detail_rows(), &[0]);

    app.handle_action(Action::Cancel, Instant::now());
    assert!(app.engine.selection().detail_rows().is_empty());
}

#[test]
fn stale_batches_after_new_query_are_ignored() {
    let mut app = loaded_app(sample_model());
    let now = Instant::now();
    app.handle_action(Action::ResolveColumn, now);
    let requests = app.take_requests();

    app.on_query_completed(Ok(sample_model()));
    let columns_before = app.engine.model().column_count();
    let directory = MockDirectory::new().with_identity(&guid(1), "Ada", "user");
    for batch in directory.respond(&requests[0], 10) {
        let report = app.on_resolution_batch(requests[0].operation, requests[0].generation, batch, now);
        assert!(report.stale);
    }
    assert_eq!(app.engine.model().column_count(), columns_before);
    assert!(app
        .engine
        .drain_effects()
        .iter()
        .all(|e| !matches!(e, Effect::Resolve(_))));
}

// ============================================================================
// KEYBINDINGS
// ============================================================================

#[test]
fn editor_passes_text_through() {
    assert_eq!(map_editor_key(key(KeyCode::Char('q'))), None);
    assert_eq!(map_editor_key(key(KeyCode::Enter)), None);
    assert_eq!(map_editor_key(key(KeyCode::Tab)), Some(Action::NextPane));
    assert_eq!(
        map_editor_key(KeyEvent::new(KeyCode::Char('r'), KeyModifiers::CONTROL)),
        Some(Action::RunQuery)
    );
}

#[test]
fn pane_cycle_returns_to_start() {
    for pane in Pane::all() {
        assert_eq!(pane.next().previous(), *pane);
        assert_eq!(pane.next().next(), *pane);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn navigation_keys_consistent(use_vim in prop::bool::ANY) {
        let (up, down, left, right) = if use_vim {
            (KeyCode::Char('k'), KeyCode::Char('j'), KeyCode::Char('h'), KeyCode::Char('l'))
        } else {
            (KeyCode::Up, KeyCode::Down, KeyCode::Left, KeyCode::Right)
        };
        prop_assert_eq!(map_key(key(up)), Some(Action::MoveUp));
        prop_assert_eq!(map_key(key(down)), Some(Action::MoveDown));
        prop_assert_eq!(map_key(key(left)), Some(Action::MoveLeft));
        prop_assert_eq!(map_key(key(right)), Some(Action::MoveRight));
    }

    #[test]
    fn grid_action_keys_mapped(key_char in "[qdxsrRceyn <>HL]") {
        let ch = key_char.chars().next().unwrap();
        prop_assert!(map_key(key(KeyCode::Char(ch))).is_some());
    }

    #[test]
    fn control_keys_ignore_plain_bindings(ch in "[a-z]") {
        let ch = ch.chars().next().unwrap();
        let action = map_key(KeyEvent::new(KeyCode::Char(ch), KeyModifiers::CONTROL));
        let expected = match ch {
            'c' => Some(Action::Quit),
            'r' => Some(Action::RunQuery),
            _ => None,
        };
        prop_assert_eq!(action, expected);
    }

    #[test]
    fn cursor_stays_inside_grid(moves in prop::collection::vec(0u8..4, 0..40)) {
        let mut app = loaded_app(sample_model());
        for m in moves {
            let action = match m {
                0 => Action::MoveUp,
                1 => Action::MoveDown,
                2 => Action::MoveLeft,
                _ => Action::MoveRight,
            };
            app.handle_action(action, Instant::now());
            prop_assert!(app.cursor.row < app.engine.model().row_count());
            prop_assert!(app.cursor.col < app.engine.model().column_count());
        }
    }

    #[test]
    fn identifier_ratio_bounds_validated(ratio in -1.0f64..2.0) {
        let mut config = base_config();
        config.resolution.identifier_ratio = ratio;
        prop_assert_eq!(config.validate().is_ok(), ratio > 0.0 && ratio <= 1.0);
    }
}
