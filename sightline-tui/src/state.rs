//! Application state and action handling.

use crate::api_client::QueryFailure;
use crate::config::TuiConfig;
use crate::dispatch::{self, RenderSummary};
use crate::keys::Action;
use crate::nav::Pane;
use crate::notifications::{Notification, NotificationLevel, NotificationLog};
use crate::persistence::PersistedState;
use crate::theme::NightgridTheme;
use sightline_core::{
    BatchReport, CellRef, ColumnResolution, ExportTable, GridEngine, GridError, IdentityBatch,
    OperationId, PendingColumnResolution, QueryResult, ResolutionRequest, SortDirection,
};
use std::time::Instant;
use tracing::{debug, info, warn};
use tui_textarea::TextArea;

/// Work the event loop must perform outside the state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Quit,
    RunQuery { text: String, scope: String },
}

#[derive(Debug, Clone)]
pub struct Modal {
    pub title: String,
    pub message: String,
}

pub struct App {
    pub config: TuiConfig,
    pub theme: NightgridTheme,
    pub engine: GridEngine,
    pub pane: Pane,
    pub editor: TextArea<'static>,
    pub scope: String,
    pub cursor: CellRef,
    pub pending_confirmation: Option<PendingColumnResolution>,
    pub query_error: Option<QueryFailure>,
    pub modal: Option<Modal>,
    pub query_running: bool,
    pub last_export: Option<ExportTable>,
    pub last_render: RenderSummary,
    pub notifications: NotificationLog,
}

impl App {
    pub fn new(config: TuiConfig) -> Self {
        let engine = GridEngine::new(config.engine_settings());
        let scope = config.default_scope.clone();
        Self {
            config,
            theme: NightgridTheme::nightgrid(),
            engine,
            pane: Pane::Editor,
            editor: TextArea::default(),
            scope,
            cursor: CellRef::new(0, 0),
            pending_confirmation: None,
            query_error: None,
            modal: None,
            query_running: false,
            last_export: None,
            last_render: RenderSummary::default(),
            notifications: NotificationLog::default(),
        }
    }

    pub fn notify(&mut self, level: NotificationLevel, message: impl Into<String>) {
        self.notifications.push(Notification::new(level, message));
    }

    pub fn restore(&mut self, state: PersistedState) {
        self.editor = TextArea::new(state.last_query.lines().map(str::to_string).collect());
        if !state.scope.trim().is_empty() {
            self.scope = state.scope;
        }
    }

    pub fn persisted_state(&self) -> PersistedState {
        PersistedState {
            last_query: self.query_text(),
            scope: self.scope.clone(),
        }
    }

    pub fn query_text(&self) -> String {
        self.editor.lines().join("\n")
    }

    /// Whether a modal currently captures input.
    pub fn modal_open(&self) -> bool {
        self.pending_confirmation.is_some() || self.query_error.is_some() || self.modal.is_some()
    }

    /// Drain engine effects; returns the resolution requests to send.
    pub fn take_requests(&mut self) -> Vec<ResolutionRequest> {
        let (requests, summary) = dispatch::partition(self.engine.drain_effects());
        if !summary.is_empty() {
            self.last_render = summary;
        }
        requests
    }

    // ------------------------------------------------------------------------
    // Actions
    // ------------------------------------------------------------------------

    pub fn handle_action(&mut self, action: Action, now: Instant) -> Option<Command> {
        match action {
            Action::Quit => return Some(Command::Quit),
            Action::RunQuery => return self.begin_query(),
            _ => {}
        }

        if self.modal_open() {
            self.handle_modal_action(action, now);
            return None;
        }

        let outcome = match action {
            Action::NextPane => {
                self.pane = self.pane.next();
                Ok(())
            }
            Action::PrevPane => {
                self.pane = self.pane.previous();
                Ok(())
            }
            Action::MoveUp => {
                self.move_cursor(-1, 0);
                Ok(())
            }
            Action::MoveDown => {
                self.move_cursor(1, 0);
                Ok(())
            }
            Action::MoveLeft => {
                self.move_cursor(0, -1);
                Ok(())
            }
            Action::MoveRight => {
                self.move_cursor(0, 1);
                Ok(())
            }
            Action::ToggleCell => self.engine.toggle_cell(self.cursor.row, self.cursor.col).map(drop),
            Action::ToggleDetailRow => self.engine.toggle_detail_row(self.cursor.row).map(drop),
            Action::CloseDetail => {
                self.engine.close_detail();
                Ok(())
            }
            Action::SortColumn => self.engine.toggle_sort(self.cursor.col),
            Action::MoveColumnLeft => self.move_column(-1),
            Action::MoveColumnRight => self.move_column(1),
            Action::ResolveCell => self.resolve_cell(now),
            Action::ResolveSelected => self.resolve_selected(now),
            Action::ResolveColumn => self.resolve_column(now),
            Action::Export => {
                self.export();
                Ok(())
            }
            Action::Cancel => {
                self.cancel();
                Ok(())
            }
            Action::Confirm | Action::Decline | Action::Quit | Action::RunQuery => Ok(()),
        };

        if let Err(err) = outcome {
            self.report_grid_error(err);
        }
        None
    }

    fn handle_modal_action(&mut self, action: Action, now: Instant) {
        if let Some(pending) = self.pending_confirmation.take() {
            match action {
                Action::Confirm => match self.engine.confirm_column(pending, now) {
                    Ok(outcome) => self.on_column_resolution(outcome),
                    Err(err) => self.report_grid_error(err),
                },
                Action::Decline | Action::Cancel => {
                    info!(column = pending.column_name(), "column resolution declined");
                    self.engine.decline_column(pending);
                }
                _ => self.pending_confirmation = Some(pending),
            }
            return;
        }
        if matches!(action, Action::Confirm | Action::Cancel | Action::Decline) {
            self.query_error = None;
            self.modal = None;
        }
    }

    fn begin_query(&mut self) -> Option<Command> {
        let text = self.query_text();
        if text.trim().is_empty() {
            self.notify(NotificationLevel::Warning, "Query is empty");
            return None;
        }
        if self.query_running {
            self.notify(NotificationLevel::Warning, "A query is already running");
            return None;
        }
        self.query_running = true;
        self.query_error = None;
        self.notify(NotificationLevel::Info, "Running query...");
        Some(Command::RunQuery {
            text,
            scope: self.scope.clone(),
        })
    }

    fn move_cursor(&mut self, d_row: isize, d_col: isize) {
        let model = self.engine.model();
        self.cursor = CellRef::new(
            step(self.cursor.row, d_row, model.row_count()),
            step(self.cursor.col, d_col, model.column_count()),
        );
    }

    fn move_column(&mut self, delta: isize) -> Result<(), GridError> {
        let width = self.engine.model().column_count();
        let to = step(self.cursor.col, delta, width);
        if to == self.cursor.col {
            return Ok(());
        }
        self.engine.reorder_column(self.cursor.col, to)?;
        self.cursor.col = to;
        Ok(())
    }

    fn resolve_cell(&mut self, now: Instant) -> Result<(), GridError> {
        match self.engine.resolve_single_cell(self.cursor.row, self.cursor.col, now)? {
            Some(operation) => self.notify(NotificationLevel::Info, format!("Resolving identity ({operation})")),
            None => self.notify(NotificationLevel::Info, "Already resolved"),
        }
        Ok(())
    }

    fn resolve_selected(&mut self, now: Instant) -> Result<(), GridError> {
        match self.engine.resolve_selected_cells(now)? {
            Some(operation) => {
                self.notify(NotificationLevel::Info, format!("Resolving selected cells ({operation})"))
            }
            None => self.notify(NotificationLevel::Info, "Nothing to resolve"),
        }
        Ok(())
    }

    fn resolve_column(&mut self, now: Instant) -> Result<(), GridError> {
        let outcome = self.engine.resolve_column(self.cursor.col, now)?;
        self.on_column_resolution(outcome);
        Ok(())
    }

    fn on_column_resolution(&mut self, outcome: ColumnResolution) {
        match outcome {
            ColumnResolution::Started(operation) => {
                self.notify(NotificationLevel::Info, format!("Resolving column ({operation})"))
            }
            ColumnResolution::NeedsConfirmation(pending) => self.pending_confirmation = Some(pending),
            ColumnResolution::NothingToResolve => {
                self.notify(NotificationLevel::Info, "Nothing to resolve")
            }
        }
    }

    fn export(&mut self) {
        let table = self.engine.export_table();
        self.notify(
            NotificationLevel::Success,
            format!(
                "Export ready: {} rows x {} columns",
                table.rows.len(),
                table.headers.len()
            ),
        );
        self.last_export = Some(table);
    }

    fn cancel(&mut self) {
        if self.pane == Pane::Editor {
            self.pane = Pane::Grid;
        } else if self.engine.selection().cell_count() > 0 {
            self.engine.clear_cell_selection();
        } else if !self.engine.selection().detail_rows().is_empty() {
            self.engine.close_detail();
        }
    }

    fn report_grid_error(&mut self, err: GridError) {
        debug!(error = %err, "grid action rejected");
        self.notify(NotificationLevel::Warning, err.to_string());
    }

    // ------------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------------

    pub fn on_query_completed(&mut self, outcome: Result<QueryResult, QueryFailure>) {
        self.query_running = false;
        match outcome {
            Ok(result) => {
                let records = result.total_records;
                match self.engine.load_result(result) {
                    Ok(()) => {
                        self.cursor = CellRef::new(0, 0);
                        self.pending_confirmation = None;
                        self.pane = Pane::Grid;
                        info!(generation = self.engine.generation(), records, "query result loaded");
                        self.notify(NotificationLevel::Success, format!("{records} records"));
                    }
                    Err(err) => {
                        warn!(error = %err, "query result rejected");
                        self.query_error = Some(QueryFailure::from_message(err.to_string()));
                    }
                }
            }
            Err(failure) => {
                warn!(message = %failure.message, details = failure.details.len(), "query failed");
                self.query_error = Some(failure);
            }
        }
    }

    pub fn on_resolution_batch(
        &mut self,
        operation: OperationId,
        generation: u64,
        batch: IdentityBatch,
        now: Instant,
    ) -> BatchReport {
        let report = self.engine.on_resolution_batch(operation, generation, batch, now);
        if report.completed {
            let level = if report.failed > 0 {
                NotificationLevel::Warning
            } else {
                NotificationLevel::Success
            };
            self.notify(
                level,
                format!(
                    "Resolution {operation} finished: {} resolved, {} failed, {} not resolved",
                    report.resolved, report.failed, report.not_resolved
                ),
            );
        }
        report
    }

    pub fn on_resolution_failed(&mut self, operation: OperationId, message: &str, now: Instant) {
        match self.engine.abandon_operation(operation, now) {
            Ok(_) => self.notify(
                NotificationLevel::Error,
                format!("Resolution {operation} failed: {message}"),
            ),
            Err(err) => debug!(error = %err, "failure for finished operation ignored"),
        }
    }

    pub fn sort_indicator(&self, col: usize) -> Option<&'static str> {
        let sort = self.engine.model().sort_state();
        (sort.column == Some(col)).then_some(match sort.direction {
            SortDirection::Ascending => "▲",
            SortDirection::Descending => "▼",
        })
    }
}

fn step(current: usize, delta: isize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    current.saturating_add_signed(delta).min(len - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_clamps() {
        assert_eq!(step(0, -1, 5), 0);
        assert_eq!(step(4, 1, 5), 4);
        assert_eq!(step(2, 1, 5), 3);
        assert_eq!(step(3, 1, 0), 0);
    }
}
