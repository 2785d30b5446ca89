//! XML wire format for the [`ActionDag`]: nodes carry their component
//! id and `(rule-key, action-string)` attribute pairs in
//! insertion order, edges carry the rule names that produced them.
//! Round-tripping `parse(serialize(dag))` must reproduce the same
//! attribute payload byte-for-byte, so both sides preserve ordering
//! instead of going through a `HashMap`.
//!
//! Low-level `Writer`/`Reader` event API rather than serde-derive:
//! keeps the element/attribute shape explicit and easy to verify by
//! inspection.

use crate::error::{WireError, WireResult};
use hashbrown::HashMap;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::Reader;
use quick_xml::Writer;
use sequencer_core::Component;
use sequencer_dgm::ActionDag;
use std::io::Cursor;
use std::str::FromStr;

pub fn to_xml(dag: &ActionDag) -> WireResult<String> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    let mut root = BytesStart::new("actiondag");
    root.push_attribute(("xmlns", "urn:sequencer:actiondag"));
    writer.write_event(Event::Start(root))?;

    for node in dag.nodes() {
        let id = node.component.id();
        if node.attributes.is_empty() {
            let mut elem = BytesStart::new("node");
            elem.push_attribute(("id", id.as_str()));
            writer.write_event(Event::Empty(elem))?;
            continue;
        }
        let mut elem = BytesStart::new("node");
        elem.push_attribute(("id", id.as_str()));
        writer.write_event(Event::Start(elem))?;
        for (key, command) in &node.attributes {
            let mut attr = BytesStart::new("attribute");
            attr.push_attribute(("key", key.as_str()));
            attr.push_attribute(("value", command.as_str()));
            writer.write_event(Event::Empty(attr))?;
        }
        writer.write_event(Event::End(BytesEnd::new("node")))?;
    }

    for (from, to, labels) in dag.edges_with_labels() {
        let mut elem = BytesStart::new("edge");
        elem.push_attribute(("from", from.as_str()));
        elem.push_attribute(("to", to.as_str()));
        elem.push_attribute(("label", labels.join(",").as_str()));
        writer.write_event(Event::Empty(elem))?;
    }

    writer.write_event(Event::End(BytesEnd::new("actiondag")))?;

    let bytes = writer.into_inner().into_inner();
    Ok(String::from_utf8(bytes).map_err(|e| WireError::Malformed(e.to_string()))?)
}

struct ParsedNode {
    id: String,
    attributes: Vec<(String, String)>,
}

struct ParsedEdge {
    from: String,
    to: String,
    labels: Vec<String>,
}

/// Parse a wire document back into an [`ActionDag`]. Nodes are created
/// in document order, then edges, matching how `ActionDag` wants its
/// endpoints to already exist.
pub fn from_xml(xml: &str) -> WireResult<ActionDag> {
    let mut reader = Reader::from_str(xml);

    let mut nodes: Vec<ParsedNode> = Vec::new();
    let mut edges: Vec<ParsedEdge> = Vec::new();
    let mut current: Option<ParsedNode> = None;

    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Start(e) if e.name().as_ref() == b"node" => {
                let id = required_attr(&e, "id")?;
                current = Some(ParsedNode { id, attributes: Vec::new() });
            }
            Event::End(e) if e.name().as_ref() == b"node" => {
                if let Some(node) = current.take() {
                    nodes.push(node);
                }
            }
            Event::Empty(e) if e.name().as_ref() == b"node" => {
                let id = required_attr(&e, "id")?;
                nodes.push(ParsedNode { id, attributes: Vec::new() });
            }
            Event::Empty(e) if e.name().as_ref() == b"attribute" => {
                let key = required_attr(&e, "key")?;
                let value = required_attr(&e, "value")?;
                let node = current
                    .as_mut()
                    .ok_or_else(|| WireError::Malformed("<attribute> outside of <node>".into()))?;
                node.attributes.push((key, value));
            }
            Event::Empty(e) if e.name().as_ref() == b"edge" => {
                let from = required_attr(&e, "from")?;
                let to = required_attr(&e, "to")?;
                let label = required_attr(&e, "label")?;
                let labels = if label.is_empty() {
                    Vec::new()
                } else {
                    label.split(',').map(|s| s.to_string()).collect()
                };
                edges.push(ParsedEdge { from, to, labels });
            }
            _ => {}
        }
    }

    let mut dag = ActionDag::new();
    let mut components: HashMap<String, Component> = HashMap::new();
    for node in &nodes {
        let component = Component::from_str(&node.id)?;
        components.insert(node.id.clone(), component.clone());
        dag.ensure_node(component);
        for (key, value) in &node.attributes {
            dag.add_attribute(&node.id, key.clone(), value.clone());
        }
    }
    for edge in &edges {
        if !components.contains_key(&edge.from) || !components.contains_key(&edge.to) {
            return Err(WireError::Malformed(format!(
                "edge references unknown node: {} -> {}",
                edge.from, edge.to
            )));
        }
        dag.add_edge(&edge.from, &edge.to, edge.labels.clone());
    }
    Ok(dag)
}

fn required_attr(e: &BytesStart<'_>, name: &str) -> WireResult<String> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == name.as_bytes() {
            return Ok(attr.unescape_value()?.into_owned());
        }
    }
    Err(WireError::Malformed(format!("missing attribute '{name}' on <{}>", String::from_utf8_lossy(e.name().as_ref()))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_dag() -> ActionDag {
        let mut dag = ActionDag::new();
        let a = Component::new("a", "node", "compute");
        let b = Component::new("b", "node", "compute");
        dag.ensure_node(a.clone());
        dag.ensure_node(b.clone());
        dag.add_attribute(&a.id(), "R1".into(), "echo a".into());
        dag.add_attribute(&a.id(), "R1?force=always".into(), "echo a2".into());
        dag.add_edge(&a.id(), &b.id(), vec!["R1".into(), "R2".into()]);
        dag
    }

    #[test]
    fn round_trips_nodes_attributes_and_edges() {
        let dag = sample_dag();
        let xml = to_xml(&dag).unwrap();
        let parsed = from_xml(&xml).unwrap();

        assert_eq!(parsed.node_count(), dag.node_count());
        assert_eq!(parsed.edge_count(), dag.edge_count());
        let a = Component::new("a", "node", "compute").id();
        assert_eq!(parsed.node(&a).unwrap().attributes, dag.node(&a).unwrap().attributes);
        assert_eq!(parsed.edges_with_labels(), dag.edges_with_labels());
    }

    #[test]
    fn serializing_twice_is_byte_stable() {
        let dag = sample_dag();
        let xml1 = to_xml(&dag).unwrap();
        let parsed = from_xml(&xml1).unwrap();
        let xml2 = to_xml(&parsed).unwrap();
        assert_eq!(xml1, xml2);
    }

    #[test]
    fn node_without_attributes_round_trips_as_empty_element() {
        let mut dag = ActionDag::new();
        dag.ensure_node(Component::new("a", "node", "compute"));
        let xml = to_xml(&dag).unwrap();
        assert!(xml.contains("<node id=\"a#node@compute\"/>"));
        let parsed = from_xml(&xml).unwrap();
        assert_eq!(parsed.node_count(), 1);
    }

    #[test]
    fn edge_to_unknown_node_is_rejected() {
        let xml = r#"<actiondag xmlns="urn:sequencer:actiondag"><node id="a#t@c"/><edge from="a#t@c" to="z#t@c" label=""/></actiondag>"#;
        assert!(from_xml(xml).is_err());
    }
}
