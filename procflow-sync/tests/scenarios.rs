//! End-to-end sync behaviour against an in-memory store.
//!
//! Scenarios A-E, the derivation/diff properties, per-item failure handling,
//! the records -> diagram policy mapping, and conflict resolution.

use procflow_core::{
    store::{MemoryStore, RecordStore, StoreOp},
    types::{ConflictPolicy, ContainerId, ExternalId, NewRecord, ProcessRecord, RecordId, RecordPatch},
    StoreError,
};
use procflow_diagram::{extract_tasks, DiagramTaskNode, NodeKind};
use procflow_sync::{
    classify, create_record, delete_record, derive_container, derive_successors, diff, resolve,
    resolve_with_hook, set_predecessors, sync_diagram_to_records, sync_records_to_diagram,
    ConflictDecision, Resolution, SyncAction, SyncConflict, SyncError, SyncOptions,
};
use rstest::rstest;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn orders() -> ContainerId {
    ContainerId::from("orders")
}

fn empty_store() -> MemoryStore {
    let mut store = MemoryStore::new();
    store.create_container(orders(), "Order handling").expect("container");
    store
}

fn linked(store: &mut MemoryStore, name: &str, ext: &str) -> RecordId {
    store
        .insert(NewRecord::new(orders(), name).linked_to(ExternalId::from(ext)))
        .expect("insert")
}

fn document(tasks: &[(&str, &str)]) -> String {
    let mut body = String::new();
    for (id, name) in tasks {
        body.push_str(&format!("    <bpmn:task id=\"{id}\" name=\"{name}\" />\n"));
    }
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <bpmn:definitions xmlns:bpmn=\"http://www.omg.org/spec/BPMN/20100524/MODEL\">\n  \
         <bpmn:process id=\"Process_1\">\n{body}  </bpmn:process>\n\
         </bpmn:definitions>\n"
    )
}

fn task(ext: &str, name: &str) -> DiagramTaskNode {
    DiagramTaskNode {
        external_id: ExternalId::from(ext),
        display_name: name.to_string(),
        kind: NodeKind::Task,
    }
}

fn options(policy: ConflictPolicy) -> SyncOptions {
    SyncOptions::default().with_policy(policy)
}

fn records(store: &MemoryStore) -> Vec<ProcessRecord> {
    store.get_by_container(&orders()).expect("records")
}

fn names(document: &str) -> Vec<(String, String)> {
    extract_tasks(document)
        .expect("extract")
        .into_iter()
        .map(|t| (t.external_id.0, t.display_name))
        .collect()
}

/// Store that rejects inserts and renames for chosen names.
struct RejectingStore {
    inner: MemoryStore,
    reject: Vec<String>,
}

impl RejectingStore {
    fn rejecting(inner: MemoryStore, reject: &[&str]) -> Self {
        Self {
            inner,
            reject: reject.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn check(&self, name: &str) -> Result<(), StoreError> {
        if self.reject.iter().any(|r| r == name) {
            return Err(StoreError::Rejected(format!("'{name}' is read-only")));
        }
        Ok(())
    }
}

impl RecordStore for RejectingStore {
    fn container_exists(&self, container: &ContainerId) -> Result<bool, StoreError> {
        self.inner.container_exists(container)
    }

    fn get_by_container(&self, container: &ContainerId) -> Result<Vec<ProcessRecord>, StoreError> {
        self.inner.get_by_container(container)
    }

    fn get_by_id(&self, id: &RecordId) -> Result<Option<ProcessRecord>, StoreError> {
        self.inner.get_by_id(id)
    }

    fn insert(&mut self, record: NewRecord) -> Result<RecordId, StoreError> {
        self.check(&record.name)?;
        self.inner.insert(record)
    }

    fn update(&mut self, id: &RecordId, patch: RecordPatch) -> Result<(), StoreError> {
        if let Some(name) = &patch.name {
            self.check(name)?;
        }
        self.inner.update(id, patch)
    }

    fn delete(&mut self, id: &RecordId) -> Result<(), StoreError> {
        self.inner.delete(id)
    }

    fn apply_batch(&mut self, ops: Vec<StoreOp>) -> Result<(), StoreError> {
        self.inner.apply_batch(ops)
    }
}

// ---------------------------------------------------------------------------
// 1. Scenarios A-E
// ---------------------------------------------------------------------------

#[test]
fn scenario_a_matching_names_are_unchanged() {
    let mut store = empty_store();
    linked(&mut store, "Review", "e1");
    let plan = diff(&[task("e1", "Review")], &records(&store), ConflictPolicy::Manual);
    assert_eq!(plan.unchanged.len(), 1);
    assert!(plan.conflicts.is_empty());
    assert!(plan.is_noop());
}

#[test]
fn scenario_b_diverged_name_under_manual_is_a_conflict() {
    let mut store = empty_store();
    linked(&mut store, "Review", "e1");
    let plan = diff(&[task("e1", "Approve")], &records(&store), ConflictPolicy::Manual);
    assert!(plan.updates.is_empty());
    assert_eq!(plan.conflicts.len(), 1);
    assert_eq!(plan.conflicts[0].diagram_side_name, "Approve");
    assert_eq!(plan.conflicts[0].record_side_name, "Review");
}

#[test]
fn scenario_c_unmatched_task_is_a_create() {
    let store = empty_store();
    let plan = diff(&[task("e2", "Sign-off")], &records(&store), ConflictPolicy::Manual);
    assert_eq!(plan.creates, vec![task("e2", "Sign-off")]);
}

#[test]
fn scenario_d_orphan_deleted_under_diagram_priority_and_edges_cleared() {
    init_logging();
    let mut store = empty_store();
    let r1 = linked(&mut store, "Review", "e1");
    let r3 = linked(&mut store, "Archive", "e3");
    set_predecessors(&mut store, &r1, vec![r3.clone()], false).expect("preds");
    assert_eq!(store.get_by_id(&r3).unwrap().unwrap().successor_ids, vec![r1.clone()]);

    let result = sync_diagram_to_records(
        &mut store,
        &orders(),
        &document(&[("e1", "Review")]),
        &options(ConflictPolicy::DiagramPriority),
    );

    assert!(result.success, "errors: {:?}", result.errors);
    assert_eq!(result.applied_count, 1);
    assert!(store.get_by_id(&r3).unwrap().is_none());
    let remaining = records(&store);
    assert!(remaining.iter().all(|r| !r.successor_ids.contains(&r3)));
    assert!(remaining.iter().all(|r| !r.predecessor_ids.contains(&r3)));
}

#[test]
fn scenario_e_derivation_is_exactly_once_and_idempotent() {
    let mut store = empty_store();
    let r5 = create_record(&mut store, NewRecord::new(orders(), "R5")).expect("r5");
    let r4 = create_record(
        &mut store,
        NewRecord::new(orders(), "R4").with_predecessors(vec![r5.clone(), r5.clone()]),
    )
    .expect("r4");

    derive_container(&mut store, &orders()).expect("derive");
    assert_eq!(derive_container(&mut store, &orders()).expect("derive again"), 0);
    assert_eq!(store.get_by_id(&r5).unwrap().unwrap().successor_ids, vec![r4]);
}

// ---------------------------------------------------------------------------
// 2. Properties
// ---------------------------------------------------------------------------

fn graph_records() -> Vec<ProcessRecord> {
    let mut store = empty_store();
    let a = store.insert(NewRecord::new(orders(), "a")).unwrap();
    let b = store
        .insert(NewRecord::new(orders(), "b").with_predecessors(vec![a.clone()]))
        .unwrap();
    let c = store
        .insert(NewRecord::new(orders(), "c").with_predecessors(vec![a.clone(), b.clone()]))
        .unwrap();
    // Rework loop back to b, and a dangling reference.
    store
        .update(&b, RecordPatch::predecessors(vec![a, c, RecordId::from("gone")]))
        .unwrap();
    records(&store)
}

#[test]
fn derivation_edges_are_symmetric() {
    let mut records = graph_records();
    derive_successors(&mut records);
    for x in &records {
        for y in &records {
            assert_eq!(
                x.successor_ids.contains(&y.id),
                y.predecessor_ids.contains(&x.id),
                "{} / {}",
                x.name,
                y.name
            );
        }
    }
}

#[test]
fn derivation_is_idempotent() {
    let mut once = graph_records();
    derive_successors(&mut once);
    let mut twice = once.clone();
    derive_successors(&mut twice);
    assert_eq!(once, twice);
}

fn mixed_inputs() -> (Vec<DiagramTaskNode>, Vec<ProcessRecord>) {
    let mut store = empty_store();
    linked(&mut store, "Same", "e1");
    linked(&mut store, "Old name", "e2");
    linked(&mut store, "Orphan", "e3");
    store.insert(NewRecord::new(orders(), "Unlinked")).unwrap();
    let tasks = vec![
        task("e1", "Same"),
        task("e2", "New name"),
        task("e4", "Brand new"),
        task("e1", "Repeat"),
    ];
    (tasks, records(&store))
}

#[rstest]
#[case(ConflictPolicy::DiagramPriority)]
#[case(ConflictPolicy::RecordPriority)]
#[case(ConflictPolicy::Manual)]
fn diff_classifies_everything_exactly_once(#[case] policy: ConflictPolicy) {
    let (tasks, records) = mixed_inputs();
    let plan = diff(&tasks, &records, policy);

    let task_slots = plan.creates.len()
        + plan.updates.len()
        + plan.conflicts.len()
        + plan.skipped.len()
        + plan.unchanged.len()
        + plan.duplicates.len();
    assert_eq!(task_slots, tasks.len());

    let linked = records.iter().filter(|r| r.is_linked()).count();
    let record_slots = plan.updates.len()
        + plan.conflicts.len()
        + plan.skipped.len()
        + plan.unchanged.len()
        + plan.orphaned.len()
        + plan.deletes.len();
    assert_eq!(record_slots, linked);
}

#[rstest]
#[case(ConflictPolicy::DiagramPriority)]
#[case(ConflictPolicy::RecordPriority)]
#[case(ConflictPolicy::Manual)]
fn diff_is_deterministic(#[case] policy: ConflictPolicy) {
    let (tasks, records) = mixed_inputs();
    assert_eq!(diff(&tasks, &records, policy), diff(&tasks, &records, policy));
}

#[test]
fn identical_names_with_different_ids_never_merge() {
    let mut store = empty_store();
    linked(&mut store, "Review", "e1");
    let plan = diff(
        &[task("e1", "Review"), task("e2", "Review")],
        &records(&store),
        ConflictPolicy::DiagramPriority,
    );
    assert_eq!(plan.unchanged.len(), 1);
    assert_eq!(plan.creates, vec![task("e2", "Review")]);
}

// ---------------------------------------------------------------------------
// 3. diagram -> records
// ---------------------------------------------------------------------------

#[test]
fn pull_creates_renames_and_reports() {
    init_logging();
    let mut store = empty_store();
    linked(&mut store, "Review", "e1");
    let orphan = linked(&mut store, "Archive", "e3");

    let doc = document(&[("e1", "Approve"), ("e2", "Sign-off")]);
    let result = sync_diagram_to_records(
        &mut store,
        &orders(),
        &doc,
        &options(ConflictPolicy::Manual),
    );

    assert!(result.success);
    assert_eq!(result.applied_count, 1);
    assert_eq!(result.conflicts.len(), 1);
    assert_eq!(result.orphaned, vec![ExternalId::from("e3")]);
    assert!(store.get_by_id(&orphan).unwrap().is_some(), "orphans are kept under manual");

    let created = store
        .find_by_external_id(&orders(), &ExternalId::from("e2"))
        .unwrap()
        .expect("created");
    assert_eq!(created.name, "Sign-off");
    assert!(created.predecessor_ids.is_empty());
}

#[test]
fn record_priority_pull_keeps_record_names() {
    let mut store = empty_store();
    let id = linked(&mut store, "Review", "e1");
    let result = sync_diagram_to_records(
        &mut store,
        &orders(),
        &document(&[("e1", "Approve")]),
        &options(ConflictPolicy::RecordPriority),
    );
    assert!(result.success);
    assert_eq!(result.applied_count, 0);
    assert!(result.conflicts.is_empty());
    assert!(matches!(result.actions.as_slice(), [SyncAction::KeepName { .. }]));
    assert_eq!(store.get_by_id(&id).unwrap().unwrap().name, "Review");
}

#[test]
fn malformed_document_is_fatal_and_mutates_nothing() {
    let mut store = empty_store();
    linked(&mut store, "Review", "e1");
    let before = records(&store);

    let result = sync_diagram_to_records(
        &mut store,
        &orders(),
        "<bpmn:definitions><bpmn:process>",
        &options(ConflictPolicy::DiagramPriority),
    );

    assert!(!result.success);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.applied_count, 0);
    assert_eq!(records(&store), before);
}

#[test]
fn per_item_failures_are_collected_and_the_pass_continues() {
    init_logging();
    let mut inner = empty_store();
    linked(&mut inner, "Review", "e1");
    let mut store = RejectingStore::rejecting(inner, &["Forbidden"]);

    let doc = document(&[("e1", "Approved"), ("e2", "Forbidden"), ("e3", "Allowed")]);
    let result = sync_diagram_to_records(
        &mut store,
        &orders(),
        &doc,
        &options(ConflictPolicy::DiagramPriority),
    );

    assert!(!result.success);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("e2"), "got: {:?}", result.errors);
    assert_eq!(result.applied_count, 2);
    let names: Vec<String> = store
        .get_by_container(&orders())
        .unwrap()
        .into_iter()
        .map(|r| r.name)
        .collect();
    assert_eq!(names, vec!["Approved", "Allowed"]);
}

// ---------------------------------------------------------------------------
// 4. records -> diagram
// ---------------------------------------------------------------------------

#[test]
fn push_inserts_unlinked_records_and_links_them() {
    let mut store = empty_store();
    linked(&mut store, "Review", "e1");
    let new_id = store.insert(NewRecord::new(orders(), "Invoice")).unwrap();

    let doc = document(&[("e1", "Review")]);
    let (result, updated) =
        sync_records_to_diagram(&mut store, &orders(), &doc, &options(ConflictPolicy::Manual));

    assert!(result.success, "errors: {:?}", result.errors);
    assert_eq!(result.applied_count, 1);
    let record = store.get_by_id(&new_id).unwrap().unwrap();
    let ext = record.external_element_id.expect("linked");
    assert!(ext.as_str().starts_with("Activity_"));
    assert!(names(&updated).contains(&(ext.0.clone(), "Invoice".to_string())));

    // A second push has nothing left to do.
    let (again, unchanged) =
        sync_records_to_diagram(&mut store, &orders(), &updated, &options(ConflictPolicy::Manual));
    assert_eq!(again.applied_count, 0);
    assert_eq!(unchanged, updated);
}

#[rstest]
#[case::records_win(ConflictPolicy::RecordPriority, "Review", 0, 0)]
#[case::diagram_wins(ConflictPolicy::DiagramPriority, "Approve", 0, 1)]
#[case::manual(ConflictPolicy::Manual, "Approve", 1, 1)]
fn push_policy_mapping(
    #[case] policy: ConflictPolicy,
    #[case] expected_label: &str,
    #[case] expected_conflicts: usize,
    #[case] expected_orphaned: usize,
) {
    let mut store = empty_store();
    linked(&mut store, "Review", "e1");
    let doc = document(&[("e1", "Approve"), ("stray", "Not in records")]);

    let (result, updated) = sync_records_to_diagram(&mut store, &orders(), &doc, &options(policy));

    assert!(result.success);
    assert_eq!(result.conflicts.len(), expected_conflicts);
    assert_eq!(result.orphaned.len(), expected_orphaned);
    let after = names(&updated);
    assert_eq!(after[0], ("e1".to_string(), expected_label.to_string()));
    let stray_kept = after.iter().any(|(id, _)| id == "stray");
    assert_eq!(stray_kept, policy != ConflictPolicy::RecordPriority);
}

#[test]
fn push_reinserts_missing_linked_node_under_its_id() {
    let mut store = empty_store();
    linked(&mut store, "Review", "e1");
    let (result, updated) = sync_records_to_diagram(
        &mut store,
        &orders(),
        &document(&[]),
        &options(ConflictPolicy::Manual),
    );
    assert!(result.success);
    assert_eq!(names(&updated), vec![("e1".to_string(), "Review".to_string())]);
}

#[test]
fn push_fatal_error_returns_original_document() {
    let mut store = empty_store();
    let doc = "not xml at all";
    let (result, returned) =
        sync_records_to_diagram(&mut store, &ContainerId::from("nope"), doc, &SyncOptions::default());
    assert!(!result.success);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(returned, doc);
}

#[test]
fn push_dry_run_links_nothing() {
    let mut store = empty_store();
    let id = store.insert(NewRecord::new(orders(), "Invoice")).unwrap();
    let (result, proposed) = sync_records_to_diagram(
        &mut store,
        &orders(),
        &document(&[]),
        &options(ConflictPolicy::Manual).dry_run(true),
    );
    assert!(result.success);
    assert_eq!(result.applied_count, 0);
    assert_eq!(names(&proposed).len(), 1);
    assert!(store.get_by_id(&id).unwrap().unwrap().external_element_id.is_none());
}

const GATEWAY_DOC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<bpmn:definitions xmlns:bpmn="http://www.omg.org/spec/BPMN/20100524/MODEL">
  <bpmn:process id="Process_1">
    <bpmn:task id="e1" name="Review" />
    <bpmn:exclusiveGateway id="Gw_1" name="In stock?" />
  </bpmn:process>
</bpmn:definitions>
"#;

fn count_nodes(document: &str, id: &str) -> usize {
    procflow_diagram::extract_nodes(document)
        .expect("extract")
        .iter()
        .filter(|n| n.external_id.as_str() == id)
        .count()
}

#[rstest]
#[case::records_win(ConflictPolicy::RecordPriority)]
#[case::diagram_wins(ConflictPolicy::DiagramPriority)]
#[case::manual(ConflictPolicy::Manual)]
fn push_leaves_gateway_linked_record_alone(#[case] policy: ConflictPolicy) {
    let mut store = empty_store();
    linked(&mut store, "Review", "e1");
    linked(&mut store, "Stock check", "Gw_1");

    let (result, updated) =
        sync_records_to_diagram(&mut store, &orders(), GATEWAY_DOC, &options(policy));

    assert!(result.success, "errors: {:?}", result.errors);
    assert_eq!(count_nodes(&updated, "Gw_1"), 1);
    assert!(!result
        .actions
        .iter()
        .any(|a| matches!(a, SyncAction::InsertNode { external_id, .. } if external_id.as_str() == "Gw_1")));
    assert_eq!(updated, GATEWAY_DOC);
}

#[test]
fn pull_keeps_gateway_linked_record_under_diagram_priority() {
    init_logging();
    let mut store = empty_store();
    linked(&mut store, "Review", "e1");
    let gateway_record = linked(&mut store, "Stock check", "Gw_1");

    let result = sync_diagram_to_records(
        &mut store,
        &orders(),
        GATEWAY_DOC,
        &options(ConflictPolicy::DiagramPriority),
    );

    assert!(result.success, "errors: {:?}", result.errors);
    assert!(result.orphaned.is_empty());
    assert!(!result
        .actions
        .iter()
        .any(|a| matches!(a, SyncAction::DeleteRecord { .. })));
    assert!(store.get_by_id(&gateway_record).unwrap().is_some());
}

#[test]
fn fresh_ids_never_reuse_non_task_node_ids() {
    let mut store = empty_store();
    store.insert(NewRecord::new(orders(), "Invoice")).unwrap();
    let (result, updated) = sync_records_to_diagram(
        &mut store,
        &orders(),
        GATEWAY_DOC,
        &options(ConflictPolicy::Manual),
    );
    assert!(result.success);
    assert_eq!(count_nodes(&updated, "Gw_1"), 1);
    let linked_to = records(&store)
        .into_iter()
        .find(|r| r.name == "Invoice")
        .and_then(|r| r.external_element_id)
        .expect("linked");
    assert_eq!(count_nodes(&updated, linked_to.as_str()), 1);
}

// ---------------------------------------------------------------------------
// 5. Resolution and lifecycle
// ---------------------------------------------------------------------------

fn pending_conflict(store: &mut MemoryStore, doc: &str) -> SyncConflict {
    let tasks = extract_tasks(doc).unwrap();
    diff(&tasks, &records(store), ConflictPolicy::Manual)
        .conflicts
        .into_iter()
        .next()
        .expect("conflict")
}

#[test]
fn prefer_diagram_renames_the_record() {
    let mut store = empty_store();
    let id = linked(&mut store, "Review", "e1");
    let doc = document(&[("e1", "Approve")]);
    let conflict = pending_conflict(&mut store, &doc);

    let resolution = resolve(&mut store, &conflict, ConflictDecision::PreferDiagram, &doc).unwrap();
    assert_eq!(resolution, Resolution::RecordRenamed { name: "Approve".to_string() });
    assert_eq!(store.get_by_id(&id).unwrap().unwrap().name, "Approve");
}

#[test]
fn prefer_records_relabels_the_document_only() {
    let mut store = empty_store();
    let id = linked(&mut store, "Review", "e1");
    let doc = document(&[("e1", "Approve")]);
    let conflict = pending_conflict(&mut store, &doc);

    let Resolution::DocumentRelabeled { document } =
        resolve(&mut store, &conflict, ConflictDecision::PreferRecords, &doc).unwrap()
    else {
        panic!("expected a relabelled document");
    };
    assert_eq!(names(&document), vec![("e1".to_string(), "Review".to_string())]);
    assert_eq!(store.get_by_id(&id).unwrap().unwrap().name, "Review");
}

#[test]
fn merge_without_hook_defers_and_changes_nothing() {
    let mut store = empty_store();
    linked(&mut store, "Review", "e1");
    let doc = document(&[("e1", "Approve")]);
    let conflict = pending_conflict(&mut store, &doc);

    let resolution = resolve(&mut store, &conflict, ConflictDecision::Merge, &doc).unwrap();
    assert_eq!(resolution, Resolution::Deferred(conflict));
    assert!(!classify(&extract_tasks(&doc).unwrap(), &records(&store)).diverged.is_empty());
}

#[test]
fn merge_hook_names_both_sides() {
    let mut store = empty_store();
    let id = linked(&mut store, "Review", "e1");
    let doc = document(&[("e1", "Approve")]);
    let conflict = pending_conflict(&mut store, &doc);

    let hook = |c: &SyncConflict| Some(format!("{} / {}", c.record_side_name, c.diagram_side_name));
    let Resolution::Merged { name, document } =
        resolve_with_hook(&mut store, &conflict, ConflictDecision::Merge, &doc, &hook).unwrap()
    else {
        panic!("expected a merge");
    };
    assert_eq!(name, "Review / Approve");
    assert_eq!(store.get_by_id(&id).unwrap().unwrap().name, name);
    assert_eq!(names(&document), vec![("e1".to_string(), name)]);
}

#[test]
fn resolving_against_a_deleted_or_relinked_record_fails() {
    let mut store = empty_store();
    let id = linked(&mut store, "Review", "e1");
    let doc = document(&[("e1", "Approve")]);
    let conflict = pending_conflict(&mut store, &doc);

    store
        .update(&id, RecordPatch::link(Some(ExternalId::from("elsewhere"))))
        .unwrap();
    let err = resolve(&mut store, &conflict, ConflictDecision::PreferDiagram, &doc).unwrap_err();
    assert!(matches!(err, SyncError::StaleConflict { .. }), "got: {err}");

    store.delete(&id).unwrap();
    let err = resolve(&mut store, &conflict, ConflictDecision::PreferDiagram, &doc).unwrap_err();
    assert!(matches!(err, SyncError::RecordNotFound { .. }), "got: {err}");
}

#[rstest]
#[case::scrubbed(true, 0)]
#[case::tolerated(false, 1)]
fn delete_record_scrub_switch(#[case] scrub: bool, #[case] dangling_refs: usize) {
    let mut store = empty_store();
    let a = create_record(&mut store, NewRecord::new(orders(), "a")).unwrap();
    let b = create_record(
        &mut store,
        NewRecord::new(orders(), "b").with_predecessors(vec![a.clone()]),
    )
    .unwrap();

    delete_record(&mut store, &a, scrub).unwrap();
    let b = store.get_by_id(&b).unwrap().unwrap();
    assert_eq!(b.predecessor_ids.len(), dangling_refs);
    assert!(b.successor_ids.is_empty());
}
