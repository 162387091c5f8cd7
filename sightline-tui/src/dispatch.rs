//! Hands engine effects to the network and reports results back as events.

use crate::api_client::RestClient;
use crate::events::TuiEvent;
use sightline_core::{Effect, RenderInstruction, ResolutionRequest};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Render work collected from one batch of effects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderSummary {
    pub cells: usize,
    pub table: bool,
    pub detail: bool,
}

impl RenderSummary {
    pub fn is_empty(&self) -> bool {
        self.cells == 0 && !self.table && !self.detail
    }
}

/// Split drained effects into resolution requests and a render summary.
pub fn partition(effects: Vec<Effect>) -> (Vec<ResolutionRequest>, RenderSummary) {
    let mut requests = Vec::new();
    let mut summary = RenderSummary::default();
    for effect in effects {
        match effect {
            Effect::Resolve(request) => requests.push(request),
            Effect::Render(RenderInstruction::Cell { .. }) => summary.cells += 1,
            Effect::Render(RenderInstruction::Table) => summary.table = true,
            Effect::Render(RenderInstruction::DetailView) => summary.detail = true,
        }
    }
    (requests, summary)
}

/// Spawn a task streaming the identity batches for `request`.
pub fn spawn_resolution(rest: RestClient, request: ResolutionRequest, sender: mpsc::Sender<TuiEvent>) {
    tokio::spawn(async move {
        info!(
            operation_id = %request.operation,
            column = %request.column,
            identifiers = request.identifiers.len(),
            "resolution request sent"
        );
        if let Err(err) = rest.resolve_identities(&request, &sender).await {
            warn!(operation_id = %request.operation, error = %err, "resolution stream failed");
            let _ = sender
                .send(TuiEvent::ResolutionFailed {
                    operation: request.operation,
                    message: err.to_string(),
                })
                .await;
        }
    });
}

/// Spawn a task running `text` against `scope`.
pub fn spawn_query(rest: RestClient, text: String, scope: String, sender: mpsc::Sender<TuiEvent>) {
    tokio::spawn(async move {
        let outcome = rest.run_query(&text, &scope).await.map_err(Into::into);
        let _ = sender.send(TuiEvent::QueryCompleted(outcome)).await;
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_counts_renders() {
        let effects = vec![
            Effect::Render(RenderInstruction::Cell { row: 0, col: 1 }),
            Effect::Render(RenderInstruction::Cell { row: 2, col: 1 }),
            Effect::Render(RenderInstruction::DetailView),
        ];
        let (requests, summary) = partition(effects);
        assert!(requests.is_empty());
        assert_eq!(
            summary,
            RenderSummary {
                cells: 2,
                table: false,
                detail: true
            }
        );
        assert!(partition(Vec::new()).1.is_empty());
    }
}
