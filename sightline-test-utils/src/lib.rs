//! Sightline Test Utilities
//!
//! Shared test infrastructure for the sightline workspace:
//! - Proptest generators for identifiers, cell values and query results
//! - A mock identity directory standing in for the lookup collaborator
//! - Fixtures for common grid scenarios
//! - Assertions over engine state and effects

pub use sightline_core::{
    Cell, Column, Effect, GridEngine, IdentityBatch, OperationId, QueryResult, RenderInstruction,
    ResolutionEntry, ResolutionError, ResolutionRequest, ResolvedIdentity, TypeAttempt,
};

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::collections::HashMap;

// ============================================================================
// MOCK IDENTITY DIRECTORY
// ============================================================================

/// In-memory identity directory answering resolution requests in batches.
///
/// Unknown identifiers come back as failures with one attempt per object type.
#[derive(Debug, Clone, Default)]
pub struct MockDirectory {
    known: HashMap<String, ResolvedIdentity>,
    object_types: Vec<String>,
}

impl MockDirectory {
    pub fn new() -> Self {
        Self {
            known: HashMap::new(),
            object_types: vec!["user".to_string(), "group".to_string()],
        }
    }

    pub fn with_identity(mut self, id: &str, display_name: &str, object_type: &str) -> Self {
        self.known.insert(
            id.to_ascii_lowercase(),
            ResolvedIdentity {
                id: id.to_string(),
                display_name: display_name.to_string(),
                object_type: object_type.to_string(),
            },
        );
        self
    }

    pub fn lookup(&self, id: &str) -> ResolutionEntry {
        match self.known.get(&id.to_ascii_lowercase()) {
            Some(identity) => ResolutionEntry::Resolved(identity.clone()),
            None => ResolutionEntry::Failed(ResolutionError {
                id: id.to_string(),
                attempts_by_object_type: self
                    .object_types
                    .iter()
                    .map(|t| TypeAttempt {
                        object_type: t.clone(),
                        message: "not found".to_string(),
                    })
                    .collect(),
                summary_message: "Not found".to_string(),
            }),
        }
    }

    /// Answer a request in batches of `batch_size`; the last batch is final.
    pub fn respond(&self, request: &ResolutionRequest, batch_size: usize) -> Vec<IdentityBatch> {
        let entries: Vec<ResolutionEntry> =
            request.identifiers.iter().map(|id| self.lookup(id)).collect();
        if entries.is_empty() {
            return vec![IdentityBatch::last(Vec::new())];
        }
        let chunks: Vec<Vec<ResolutionEntry>> = entries
            .chunks(batch_size.max(1))
            .map(<[ResolutionEntry]>::to_vec)
            .collect();
        let last = chunks.len() - 1;
        chunks
            .into_iter()
            .enumerate()
            .map(|(i, entries)| IdentityBatch {
                entries,
                is_final: i == last,
            })
            .collect()
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for grid values and results.

    use super::*;
    use proptest::prelude::*;
    use uuid::Uuid;

    /// Generate a hyphenated, RFC-variant identifier (version 1-5).
    pub fn arb_guid() -> impl Strategy<Value = String> {
        (any::<[u8; 16]>(), 1u8..=5, any::<bool>()).prop_map(|(bytes, version, upper)| {
            let mut bytes = bytes;
            bytes[6] = (bytes[6] & 0x0f) | (version << 4);
            bytes[8] = (bytes[8] & 0x3f) | 0x80;
            let text = Uuid::from_bytes(bytes).hyphenated().to_string();
            if upper {
                text.to_uppercase()
            } else {
                text
            }
        })
    }

    /// Generate any scalar a result cell may hold.
    pub fn arb_scalar() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            (-1000i64..1000).prop_map(|n| json!(n)),
            (-1000.0f64..1000.0).prop_map(|n| json!(n)),
            "[a-zA-Z ]{0,12}".prop_map(Value::String),
            arb_guid().prop_map(Value::String),
        ]
    }

    /// Generate a rectangular query result with 1-5 columns and up to 12 rows.
    pub fn arb_model() -> impl Strategy<Value = QueryResult> {
        (1usize..=5, 0usize..=12).prop_flat_map(|(width, height)| {
            prop::collection::vec(prop::collection::vec(arb_scalar(), width), height).prop_map(
                move |rows| QueryResult {
                    columns: (0..width)
                        .map(|i| Column::new(format!("col{i}"), "dynamic"))
                        .collect(),
                    total_records: rows.len() as u64,
                    rows,
                    timestamp: fixtures::timestamp(),
                    execution_time_ms: 5,
                },
            )
        })
    }

    /// Generate a result whose first column holds identifiers (some null).
    pub fn arb_guid_model() -> impl Strategy<Value = QueryResult> {
        prop::collection::vec(
            (prop::option::weighted(0.85, arb_guid()), -100i64..100),
            1..=15,
        )
        .prop_map(|rows| QueryResult {
            columns: vec![Column::new("ObjectId", "guid"), Column::new("n", "long")],
            total_records: rows.len() as u64,
            rows: rows
                .into_iter()
                .map(|(id, n)| vec![id.map(Value::String).unwrap_or(Value::Null), json!(n)])
                .collect(),
            timestamp: fixtures::timestamp(),
            execution_time_ms: 5,
        })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built results and resolution outcomes.

    use super::*;

    pub fn timestamp() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_else(Utc::now)
    }

    /// Deterministic, valid identifier number `n`.
    pub fn guid(n: usize) -> String {
        format!("{:08x}-0000-4000-8000-{:012x}", n, n)
    }

    /// A small mixed result: identifier, name, count and a nullable column.
    pub fn sample_model() -> QueryResult {
        QueryResult {
            columns: vec![
                Column::new("UserId", "guid"),
                Column::new("Name", "string"),
                Column::new("Count", "long"),
                Column::new("Note", "string"),
            ],
            rows: vec![
                vec![json!(guid(1)), json!("delta"), json!(10), json!("x")],
                vec![json!(guid(2)), json!("alpha"), json!(2), Value::Null],
                vec![json!(guid(3)), json!("Charlie"), json!(30), json!("y")],
                vec![Value::Null, json!("bravo"), json!(4), json!("z")],
                vec![json!(guid(5)), json!("echo"), json!(2), Value::Null],
            ],
            total_records: 5,
            timestamp: timestamp(),
            execution_time_ms: 42,
        }
    }

    /// One identifier column named `ObjectId` plus a row-number column.
    pub fn guid_column_model(ids: &[Option<String>]) -> QueryResult {
        QueryResult {
            columns: vec![Column::new("ObjectId", "guid"), Column::new("n", "long")],
            rows: ids
                .iter()
                .enumerate()
                .map(|(n, id)| {
                    vec![
                        id.clone().map(Value::String).unwrap_or(Value::Null),
                        json!(n),
                    ]
                })
                .collect(),
            total_records: ids.len() as u64,
            timestamp: timestamp(),
            execution_time_ms: 7,
        }
    }

    pub fn identity(id: &str, display_name: &str) -> ResolutionEntry {
        ResolutionEntry::Resolved(ResolvedIdentity {
            id: id.to_string(),
            display_name: display_name.to_string(),
            object_type: "user".to_string(),
        })
    }

    pub fn failure(id: &str) -> ResolutionEntry {
        ResolutionEntry::Failed(ResolutionError {
            id: id.to_string(),
            attempts_by_object_type: vec![
                TypeAttempt {
                    object_type: "user".to_string(),
                    message: "not found".to_string(),
                },
                TypeAttempt {
                    object_type: "group".to_string(),
                    message: "access denied".to_string(),
                },
            ],
            summary_message: "Could not resolve identity".to_string(),
        })
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over engine state and drained effects.

    use super::*;

    /// Resolution requests among drained effects.
    pub fn requests(effects: &[Effect]) -> Vec<ResolutionRequest> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Resolve(request) => Some(request.clone()),
                Effect::Render(_) => None,
            })
            .collect()
    }

    #[track_caller]
    pub fn assert_loading(engine: &GridEngine, row: usize, col: usize) {
        match engine.model().cell(row, col) {
            Some(Cell::Loading) => {}
            other => panic!("Expected loading at ({row}, {col}), got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_resolved(engine: &GridEngine, row: usize, col: usize, display_name: &str) {
        match engine.model().cell(row, col) {
            Some(Cell::Resolved(badge)) if badge.text == display_name => {}
            other => panic!(
                "Expected resolved '{display_name}' at ({row}, {col}), got: {:?}",
                other
            ),
        }
    }

    #[track_caller]
    pub fn assert_failed(engine: &GridEngine, row: usize, col: usize) {
        match engine.model().cell(row, col) {
            Some(Cell::Failed(_)) => {}
            other => panic!("Expected error badge at ({row}, {col}), got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_rendered(effects: &[Effect], instruction: RenderInstruction) {
        assert!(
            effects.contains(&Effect::Render(instruction)),
            "Expected render {:?} in {:?}",
            instruction,
            effects
        );
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use sightline_core::{is_identifier, ResultModel};

    #[test]
    fn test_fixture_guids_are_identifiers() {
        for n in 0..20 {
            assert!(is_identifier(&fixtures::guid(n)));
        }
    }

    #[test]
    fn test_sample_model_is_rectangular() {
        assert!(ResultModel::from_query(fixtures::sample_model()).is_ok());
    }

    #[test]
    fn test_mock_directory_batches() {
        let directory = MockDirectory::new().with_identity(&fixtures::guid(1), "Ada", "user");
        let request = ResolutionRequest {
            operation: serde_json::from_value::<OperationId>(json!(0)).unwrap(),
            generation: 1,
            column: "UserId".to_string(),
            identifiers: vec![fixtures::guid(1), fixtures::guid(2), fixtures::guid(3)],
        };
        let batches = directory.respond(&request, 2);
        assert_eq!(batches.len(), 2);
        assert!(!batches[0].is_final);
        assert!(batches[1].is_final);
        assert!(batches[0].entries[0].is_resolved());
        assert!(!batches[0].entries[1].is_resolved());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_arb_guid_is_identifier(guid in generators::arb_guid()) {
            prop_assert!(is_identifier(&guid));
        }

        #[test]
        fn prop_arb_model_loads(result in generators::arb_model()) {
            prop_assert!(ResultModel::from_query(result).is_ok());
        }
    }
}
