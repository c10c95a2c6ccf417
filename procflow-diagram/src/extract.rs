//! Diagram task extraction.
//!
//! Reads a BPMN 2.0 document with a streaming parser and yields one
//! [`DiagramTaskNode`] per flow node. Elements are classified by local name,
//! so `bpmn:userTask`, `bpmn2:userTask` and `userTask` are all the same.
//!
//! Omission rules:
//! 1. Elements that are not flow nodes (lanes, flows, shapes, ...) are ignored.
//! 2. A flow node with no usable `id`, or whose attributes fail to parse, is
//!    skipped without error.
//! 3. A flow node without `name` is kept with an empty display name.
//!
//! Anything that stops the reader itself (syntax errors, mismatched or
//! unclosed tags, no root element) is a [`DiagramError::Malformed`].

use std::fmt;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use procflow_core::types::ExternalId;

use crate::error::{malformed, DiagramError};

/// Coarse classification of a flow node. Informational only for syncing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Task,
    Event,
    Gateway,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Task => write!(f, "task"),
            NodeKind::Event => write!(f, "event"),
            NodeKind::Gateway => write!(f, "gateway"),
        }
    }
}

/// A flow node read from a diagram document. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramTaskNode {
    pub external_id: ExternalId,
    pub display_name: String,
    pub kind: NodeKind,
}

const TASK_ELEMENTS: &[&[u8]] = &[
    b"task",
    b"userTask",
    b"serviceTask",
    b"manualTask",
    b"scriptTask",
    b"sendTask",
    b"receiveTask",
    b"businessRuleTask",
    b"callActivity",
    b"subProcess",
];

const EVENT_ELEMENTS: &[&[u8]] = &[
    b"startEvent",
    b"endEvent",
    b"intermediateCatchEvent",
    b"intermediateThrowEvent",
    b"boundaryEvent",
];

const GATEWAY_ELEMENTS: &[&[u8]] = &[
    b"exclusiveGateway",
    b"parallelGateway",
    b"inclusiveGateway",
    b"eventBasedGateway",
    b"complexGateway",
];

/// Flow-node kind for an element local name, if it is one.
pub fn classify_element(local_name: &[u8]) -> Option<NodeKind> {
    if TASK_ELEMENTS.contains(&local_name) {
        Some(NodeKind::Task)
    } else if EVENT_ELEMENTS.contains(&local_name) {
        Some(NodeKind::Event)
    } else if GATEWAY_ELEMENTS.contains(&local_name) {
        Some(NodeKind::Gateway)
    } else {
        None
    }
}

/// Task-like nodes only.
pub fn extract_tasks(document: &str) -> Result<Vec<DiagramTaskNode>, DiagramError> {
    let mut nodes = extract_nodes(document)?;
    nodes.retain(|n| n.kind == NodeKind::Task);
    Ok(nodes)
}

/// Every task, event and gateway, in document order.
pub fn extract_nodes(document: &str) -> Result<Vec<DiagramTaskNode>, DiagramError> {
    let mut reader = Reader::from_str(document);
    let mut nodes = Vec::new();
    let mut depth: usize = 0;
    let mut saw_root = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| malformed(reader.buffer_position() as u64, e))?;
        match event {
            Event::Start(e) => {
                depth += 1;
                saw_root = true;
                nodes.extend(node_from_element(&e));
            }
            Event::Empty(e) => {
                saw_root = true;
                nodes.extend(node_from_element(&e));
            }
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Eof => break,
            _ => {}
        }
    }

    if depth > 0 {
        return Err(malformed(
            reader.buffer_position() as u64,
            format!("{depth} element(s) left unclosed at end of document"),
        ));
    }
    if !saw_root {
        return Err(malformed(0, "document has no root element"));
    }
    Ok(nodes)
}

/// Identity attributes of an element: `(id, name)`.
pub(crate) struct Identity {
    pub id: Option<String>,
    pub name: Option<String>,
}

/// Read `id` and `name` (unprefixed) from an element.
pub(crate) fn read_identity(element: &BytesStart<'_>) -> Result<Identity, String> {
    let mut identity = Identity {
        id: None,
        name: None,
    };
    for attr in element.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        let slot = match attr.key.as_ref() {
            b"id" => &mut identity.id,
            b"name" => &mut identity.name,
            _ => continue,
        };
        let value = attr.unescape_value().map_err(|e| e.to_string())?;
        *slot = Some(value.into_owned());
    }
    Ok(identity)
}

fn node_from_element(element: &BytesStart<'_>) -> Option<DiagramTaskNode> {
    let kind = classify_element(element.local_name().as_ref())?;
    let tag = String::from_utf8_lossy(element.name().as_ref()).into_owned();

    let identity = match read_identity(element) {
        Ok(identity) => identity,
        Err(reason) => {
            tracing::debug!("skipping <{tag}>: {reason}");
            return None;
        }
    };
    let Some(id) = identity.id.filter(|id| !id.trim().is_empty()) else {
        tracing::debug!("skipping <{tag}> without id");
        return None;
    };

    Some(DiagramTaskNode {
        external_id: ExternalId::from(id),
        display_name: identity.name.unwrap_or_default(),
        kind,
    })
}
