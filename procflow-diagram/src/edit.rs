//! Minimal in-place editing of a diagram document.
//!
//! `apply_edits` re-streams the document through a writer, rewriting only the
//! elements an edit names; every other event is written back verbatim.
//!
//! Removing a node also removes what would dangle without it: sequence flows
//! that start or end at it, `incoming`/`outgoing` references to those flows,
//! and diagram-interchange shapes/edges whose `bpmnElement` points at any
//! removed id.

use std::collections::{HashMap, HashSet};

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;

use procflow_core::types::ExternalId;

use crate::error::{malformed, DiagramError};
use crate::extract::read_identity;

/// One change to apply to a diagram document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentEdit {
    /// Replace (or add) the `name` attribute of the element with this id.
    Relabel { id: ExternalId, label: String },
    /// Append a new task to the first `process` element.
    Insert { id: ExternalId, label: String },
    /// Drop the element and everything that references it.
    Remove { id: ExternalId },
}

/// Fresh element id in the `Activity_<hex>` style diagram editors use.
pub fn new_element_id() -> ExternalId {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    ExternalId(format!("Activity_{}", &hex[..12]))
}

const FLOW_ELEMENTS: &[&[u8]] = &[b"sequenceFlow", b"messageFlow"];
const FLOW_REFERENCES: &[&[u8]] = &[b"incoming", b"outgoing"];

/// Apply `edits` and return the rewritten document.
///
/// With no edits the input is returned unchanged, byte for byte.
pub fn apply_edits(document: &str, edits: &[DocumentEdit]) -> Result<String, DiagramError> {
    if edits.is_empty() {
        return Ok(document.to_string());
    }

    let mut relabels: HashMap<&str, &str> = HashMap::new();
    let mut inserts: Vec<(&ExternalId, &str)> = Vec::new();
    let mut removals: HashSet<String> = HashSet::new();
    for edit in edits {
        match edit {
            DocumentEdit::Relabel { id, label } => {
                relabels.insert(id.as_str(), label.as_str());
            }
            DocumentEdit::Insert { id, label } => inserts.push((id, label.as_str())),
            DocumentEdit::Remove { id } => {
                removals.insert(id.0.clone());
            }
        }
    }

    let dropped_flows = if removals.is_empty() {
        HashSet::new()
    } else {
        flows_touching(document, &removals)?
    };
    let dropped: HashSet<&str> = removals
        .iter()
        .chain(dropped_flows.iter())
        .map(String::as_str)
        .collect();

    let mut rewriter = Rewriter {
        reader: Reader::from_str(document),
        writer: Writer::new(Vec::new()),
        relabels,
        inserts,
        dropped,
        dropped_flows: &dropped_flows,
        seen: HashSet::new(),
        depth: 0,
        process_depth: None,
        process_tag: None,
        inserted: false,
    };
    rewriter.run()?;
    rewriter.finish(edits)
}

/// Ids of flows whose `sourceRef` or `targetRef` is in `nodes`.
fn flows_touching(
    document: &str,
    nodes: &HashSet<String>,
) -> Result<HashSet<String>, DiagramError> {
    let mut reader = Reader::from_str(document);
    let mut flows = HashSet::new();
    loop {
        let event = reader
            .read_event()
            .map_err(|e| malformed(reader.buffer_position() as u64, e))?;
        match event {
            Event::Start(e) | Event::Empty(e) => {
                if !FLOW_ELEMENTS.contains(&e.local_name().as_ref()) {
                    continue;
                }
                let mut id = None;
                let mut touches = false;
                for attr in e.attributes().flatten() {
                    let Ok(value) = attr.unescape_value() else {
                        continue;
                    };
                    match attr.key.as_ref() {
                        b"id" => id = Some(value.into_owned()),
                        b"sourceRef" | b"targetRef" => touches |= nodes.contains(&*value),
                        _ => {}
                    }
                }
                if let (true, Some(id)) = (touches, id) {
                    flows.insert(id);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(flows)
}

struct Rewriter<'a> {
    reader: Reader<&'a [u8]>,
    writer: Writer<Vec<u8>>,
    relabels: HashMap<&'a str, &'a str>,
    inserts: Vec<(&'a ExternalId, &'a str)>,
    dropped: HashSet<&'a str>,
    dropped_flows: &'a HashSet<String>,
    /// Ids named by relabel/remove edits that were found.
    seen: HashSet<String>,
    depth: usize,
    process_depth: Option<usize>,
    /// Qualified tag of the first process element, e.g. `bpmn:process`.
    process_tag: Option<String>,
    inserted: bool,
}

impl<'a> Rewriter<'a> {
    fn run(&mut self) -> Result<(), DiagramError> {
        loop {
            let event = self.next_event()?;
            match event {
                Event::Start(e) => self.on_start(e)?,
                Event::Empty(e) => self.on_empty(e)?,
                Event::End(e) => {
                    if !self.inserted && self.process_depth == Some(self.depth) {
                        self.write_inserts()?;
                    }
                    self.depth = self.depth.saturating_sub(1);
                    self.write(Event::End(e))?;
                }
                Event::Eof => break,
                other => self.write(other)?,
            }
        }
        if self.depth > 0 {
            return Err(malformed(
                self.reader.buffer_position() as u64,
                format!("{} element(s) left unclosed at end of document", self.depth),
            ));
        }
        Ok(())
    }

    fn finish(self, edits: &[DocumentEdit]) -> Result<String, DiagramError> {
        for edit in edits {
            match edit {
                DocumentEdit::Relabel { id, .. } | DocumentEdit::Remove { id }
                    if !self.seen.contains(id.as_str()) =>
                {
                    return Err(DiagramError::UnknownElement(id.clone()));
                }
                _ => {}
            }
        }
        if !self.inserts.is_empty() && !self.inserted {
            return Err(DiagramError::NoProcess);
        }
        String::from_utf8(self.writer.into_inner()).map_err(|e| DiagramError::Write(e.to_string()))
    }

    fn next_event(&mut self) -> Result<Event<'a>, DiagramError> {
        let position = self.reader.buffer_position() as u64;
        self.reader.read_event().map_err(|e| malformed(position, e))
    }

    fn write(&mut self, event: Event<'_>) -> Result<(), DiagramError> {
        self.writer
            .write_event(event)
            .map_err(|e| DiagramError::Write(e.to_string()))
    }

    fn on_start(&mut self, element: BytesStart<'a>) -> Result<(), DiagramError> {
        let id = self.element_id(&element);
        if self.is_dropped(&element, id.as_deref()) {
            self.note_seen(id);
            return self.skip_subtree();
        }
        if FLOW_REFERENCES.contains(&element.local_name().as_ref()) && !self.dropped_flows.is_empty()
        {
            return self.copy_reference(element);
        }

        self.depth += 1;
        if self.process_depth.is_none() && element.local_name().as_ref() == b"process" {
            self.process_depth = Some(self.depth);
            self.process_tag = Some(String::from_utf8_lossy(element.name().as_ref()).into_owned());
        }
        let element = self.maybe_relabel(element, id)?;
        self.write(Event::Start(element))
    }

    fn on_empty(&mut self, element: BytesStart<'a>) -> Result<(), DiagramError> {
        let id = self.element_id(&element);
        if self.is_dropped(&element, id.as_deref()) {
            self.note_seen(id);
            return Ok(());
        }

        let opens_process = !self.inserted
            && self.process_depth.is_none()
            && element.local_name().as_ref() == b"process"
            && !self.inserts.is_empty();
        let element = self.maybe_relabel(element, id)?;
        if !opens_process {
            return self.write(Event::Empty(element));
        }

        // A self-closing process has to be opened up to take children.
        let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
        self.process_depth = Some(self.depth + 1);
        self.process_tag = Some(name.clone());
        self.write(Event::Start(element))?;
        self.write_inserts()?;
        self.write(Event::End(BytesEnd::new(name)))
    }

    /// Elements with unreadable attributes are treated as anonymous.
    fn element_id(&self, element: &BytesStart<'_>) -> Option<String> {
        read_identity(element).ok().and_then(|identity| identity.id)
    }

    fn is_dropped(&self, element: &BytesStart<'_>, id: Option<&str>) -> bool {
        if self.dropped.is_empty() {
            return false;
        }
        if id.is_some_and(|id| self.dropped.contains(id)) {
            return true;
        }
        element.attributes().flatten().any(|attr| {
            attr.key.as_ref() == b"bpmnElement"
                && attr
                    .unescape_value()
                    .is_ok_and(|target| self.dropped.contains(&*target))
        })
    }

    fn note_seen(&mut self, id: Option<String>) {
        if let Some(id) = id {
            self.seen.insert(id);
        }
    }

    /// Consume events up to and including the end of the current element.
    fn skip_subtree(&mut self) -> Result<(), DiagramError> {
        let mut open: usize = 1;
        while open > 0 {
            match self.next_event()? {
                Event::Start(_) => open += 1,
                Event::End(_) => open -= 1,
                Event::Eof => {
                    return Err(malformed(
                        self.reader.buffer_position() as u64,
                        "removed element is never closed",
                    ))
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Copy an `incoming`/`outgoing` element unless it names a dropped flow.
    fn copy_reference(&mut self, element: BytesStart<'a>) -> Result<(), DiagramError> {
        let mut buffered: Vec<Event<'a>> = vec![Event::Start(element)];
        let mut text = String::new();
        let mut open: usize = 1;
        while open > 0 {
            let event = self.next_event()?;
            match &event {
                Event::Start(_) => open += 1,
                Event::End(_) => open -= 1,
                Event::Text(t) => text.push_str(&String::from_utf8_lossy(t)),
                Event::Eof => {
                    return Err(malformed(
                        self.reader.buffer_position() as u64,
                        "flow reference is never closed",
                    ))
                }
                _ => {}
            }
            buffered.push(event);
        }

        if self.dropped_flows.contains(text.trim()) {
            return Ok(());
        }
        for event in buffered {
            self.write(event)?;
        }
        Ok(())
    }

    fn maybe_relabel(
        &mut self,
        element: BytesStart<'a>,
        id: Option<String>,
    ) -> Result<BytesStart<'a>, DiagramError> {
        let Some(id) = id else {
            return Ok(element);
        };
        let Some(label) = self.relabels.get(id.as_str()).copied() else {
            return Ok(element);
        };

        let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
        let mut relabelled = BytesStart::new(name);
        let mut replaced = false;
        for attr in element.attributes() {
            let attr = attr.map_err(|e| malformed(self.reader.buffer_position() as u64, e))?;
            if attr.key.as_ref() == b"name" {
                relabelled.push_attribute(("name", label));
                replaced = true;
            } else {
                relabelled.push_attribute(attr);
            }
        }
        if !replaced {
            relabelled.push_attribute(("name", label));
        }
        tracing::debug!("relabelled {id} to {label:?}");
        self.seen.insert(id);
        Ok(relabelled)
    }

    fn write_inserts(&mut self) -> Result<(), DiagramError> {
        let prefix = self.process_prefix();
        let inserts = std::mem::take(&mut self.inserts);
        for (id, label) in &inserts {
            let mut task = BytesStart::new(format!("{prefix}task"));
            task.push_attribute(("id", id.as_str()));
            task.push_attribute(("name", *label));
            self.write(Event::Text(BytesText::new("  ")))?;
            self.write(Event::Empty(task))?;
            self.write(Event::Text(BytesText::new("\n  ")))?;
            tracing::debug!("inserted task {id}");
        }
        self.inserts = inserts;
        self.inserted = true;
        Ok(())
    }

    /// Namespace prefix of the process element, e.g. `bpmn:`.
    fn process_prefix(&self) -> String {
        self.process_tag
            .as_deref()
            .and_then(|tag| tag.rsplit_once(':'))
            .map(|(prefix, _)| format!("{prefix}:"))
            .unwrap_or_default()
    }
}
