//! Extraction and editing against a modeler-shaped BPMN fixture.

use procflow_core::types::ExternalId;
use procflow_diagram::{
    apply_edits, extract_nodes, extract_tasks, DiagramError, DocumentEdit, NodeKind,
};
use rstest::rstest;

const ORDER_PROCESS: &str = include_str!("fixtures/order_process.bpmn");

fn ids(document: &str) -> Vec<String> {
    extract_tasks(document)
        .expect("extract")
        .into_iter()
        .map(|t| t.external_id.0)
        .collect()
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

#[test]
fn tasks_follow_document_order_and_omission_rules() {
    let tasks = extract_tasks(ORDER_PROCESS).expect("extract");
    let pairs: Vec<(&str, &str)> = tasks
        .iter()
        .map(|t| (t.external_id.as_str(), t.display_name.as_str()))
        .collect();
    assert_eq!(
        pairs,
        vec![
            ("Activity_review", "Review order"),
            ("Activity_ship", "Ship goods"),
            ("Activity_unnamed", ""),
        ]
    );
}

#[test]
fn nodes_include_events_and_gateways() {
    let nodes = extract_nodes(ORDER_PROCESS).expect("extract");
    let kinds: Vec<NodeKind> = nodes.iter().map(|n| n.kind).collect();
    assert_eq!(
        kinds,
        vec![
            NodeKind::Event,
            NodeKind::Task,
            NodeKind::Gateway,
            NodeKind::Task,
            NodeKind::Task,
        ]
    );
}

#[rstest]
#[case::empty("")]
#[case::plain_text("not a diagram")]
#[case::mismatched("<process><task id=\"a\"></process>")]
#[case::unclosed("<definitions><process id=\"P\">")]
fn malformed_documents_are_rejected(#[case] document: &str) {
    let err = extract_tasks(document).unwrap_err();
    assert!(
        matches!(err, DiagramError::Malformed { .. }),
        "expected Malformed, got: {err}"
    );
}

#[test]
fn process_without_tasks_extracts_nothing() {
    let doc = r#"<definitions><process id="P"><startEvent id="s"/></process></definitions>"#;
    assert!(extract_tasks(doc).expect("extract").is_empty());
}

// ---------------------------------------------------------------------------
// Editing
// ---------------------------------------------------------------------------

#[test]
fn combined_edits_touch_only_named_elements() {
    let out = apply_edits(
        ORDER_PROCESS,
        &[
            DocumentEdit::Relabel {
                id: ExternalId::from("Activity_review"),
                label: "Review & confirm".to_string(),
            },
            DocumentEdit::Remove {
                id: ExternalId::from("Activity_ship"),
            },
            DocumentEdit::Insert {
                id: ExternalId::from("Activity_invoice"),
                label: "Send invoice".to_string(),
            },
        ],
    )
    .expect("apply");

    assert_eq!(
        ids(&out),
        vec!["Activity_review", "Activity_unnamed", "Activity_invoice"]
    );
    let review = extract_tasks(&out)
        .expect("extract")
        .into_iter()
        .find(|t| t.external_id.as_str() == "Activity_review")
        .expect("review");
    assert_eq!(review.display_name, "Review & confirm");

    // Flow_3 pointed at the removed task; its edge and references go too.
    assert!(!out.contains("Flow_3"));
    assert!(!out.contains("Activity_ship_di"));
    // Untouched parts survive verbatim.
    assert!(out.contains(r#"<dc:Bounds x="270" y="77" width="100" height="80" />"#));
    assert!(out.contains(r#"<bpmn:sequenceFlow id="Flow_1" sourceRef="StartEvent_1" targetRef="Activity_review" />"#));
    assert!(out.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
}

#[test]
fn failed_edit_reports_the_missing_id() {
    let err = apply_edits(
        ORDER_PROCESS,
        &[DocumentEdit::Relabel {
            id: ExternalId::from("Activity_gone"),
            label: "x".to_string(),
        }],
    )
    .unwrap_err();
    assert!(err.to_string().contains("Activity_gone"), "got: {err}");
}

#[test]
fn editing_a_malformed_document_fails() {
    let err = apply_edits(
        "<process><task id=\"a\">",
        &[DocumentEdit::Relabel {
            id: ExternalId::from("a"),
            label: "x".to_string(),
        }],
    )
    .unwrap_err();
    assert!(matches!(err, DiagramError::Malformed { .. }));
}
