//! XML wire format for the [`Instruction`] tree: a namespaced document
//! whose single root child is `<action>`, `<seq>` or `<par>`.
//! `seq`/`par` must be non-empty, `action/@id` must be unique across the
//! whole tree, `action/@force` defaults to `allowed`, `action/@remote`
//! accepts case-insensitive boolean spellings, and `action/@deps` is a
//! comma-separated list of other action ids that must resolve and must
//! not form a cycle.

use crate::error::{WireError, WireResult};
use hashbrown::{HashMap, HashSet};
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::Reader;
use quick_xml::Writer;
use sequencer_core::ForceMode;
use sequencer_ism::{Action, Instruction};
use std::io::Cursor;

const ROOT: &str = "instructiontree";

pub fn to_xml(instr: &Instruction) -> WireResult<String> {
    validate(instr)?;
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    let mut root = BytesStart::new(ROOT);
    root.push_attribute(("xmlns", "urn:sequencer:instructiontree"));
    writer.write_event(Event::Start(root))?;
    write_node(&mut writer, instr)?;
    writer.write_event(Event::End(BytesEnd::new(ROOT)))?;

    let bytes = writer.into_inner().into_inner();
    String::from_utf8(bytes).map_err(|e| WireError::Malformed(e.to_string()))
}

fn write_node(writer: &mut Writer<Cursor<Vec<u8>>>, instr: &Instruction) -> WireResult<()> {
    match instr {
        Instruction::Action(action) => {
            let mut elem = BytesStart::new("action");
            elem.push_attribute(("id", action.id.as_str()));
            elem.push_attribute(("command", action.command.as_str()));
            elem.push_attribute(("component-set", action.component_set.as_str()));
            elem.push_attribute(("remote", if action.remote { "true" } else { "false" }));
            elem.push_attribute(("force", force_str(action.force)));
            let deps = action.deps.join(",");
            if !deps.is_empty() {
                elem.push_attribute(("deps", deps.as_str()));
            }
            writer.write_event(Event::Empty(elem))?;
        }
        Instruction::Seq(items) => {
            writer.write_event(Event::Start(BytesStart::new("seq")))?;
            for item in items {
                write_node(writer, item)?;
            }
            writer.write_event(Event::End(BytesEnd::new("seq")))?;
        }
        Instruction::Par(items) => {
            writer.write_event(Event::Start(BytesStart::new("par")))?;
            for item in items {
                write_node(writer, item)?;
            }
            writer.write_event(Event::End(BytesEnd::new("par")))?;
        }
    }
    Ok(())
}

fn force_str(force: ForceMode) -> &'static str {
    match force {
        ForceMode::Allowed => "allowed",
        ForceMode::Always => "always",
        ForceMode::Never => "never",
    }
}

pub fn from_xml(xml: &str) -> WireResult<Instruction> {
    let mut reader = Reader::from_str(xml);

    loop {
        match reader.read_event()? {
            Event::Eof => return Err(WireError::Malformed("empty document".into())),
            Event::Start(e) if e.name().as_ref() == ROOT.as_bytes() => continue,
            Event::Empty(e) if e.name().as_ref() == ROOT.as_bytes() => {
                return Err(WireError::EmptyContainer("instructiontree"));
            }
            Event::Start(e) => {
                let tag = e.name().as_ref().to_vec();
                let attrs = collect_attrs(&e)?;
                let instr = parse_node(&mut reader, &tag, attrs, false)?;
                validate(&instr)?;
                return Ok(instr);
            }
            Event::Empty(e) => {
                let tag = e.name().as_ref().to_vec();
                let attrs = collect_attrs(&e)?;
                let instr = parse_node(&mut reader, &tag, attrs, true)?;
                validate(&instr)?;
                return Ok(instr);
            }
            _ => continue,
        }
    }
}

fn collect_attrs(e: &BytesStart<'_>) -> WireResult<Vec<(String, String)>> {
    let mut out = Vec::new();
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == b"xmlns" {
            continue;
        }
        out.push((
            String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
            attr.unescape_value()?.into_owned(),
        ));
    }
    Ok(out)
}

fn parse_node(
    reader: &mut Reader<&[u8]>,
    tag: &[u8],
    attrs: Vec<(String, String)>,
    is_empty: bool,
) -> WireResult<Instruction> {
    match tag {
        b"action" => parse_action(attrs),
        b"seq" | b"par" => {
            let name = if tag == b"seq" { "seq" } else { "par" };
            if is_empty {
                return Err(WireError::EmptyContainer(name));
            }
            let mut children = Vec::new();
            loop {
                match reader.read_event()? {
                    Event::End(e) if e.name().as_ref() == tag => break,
                    Event::Start(e) => {
                        let child_tag = e.name().as_ref().to_vec();
                        let child_attrs = collect_attrs(&e)?;
                        children.push(parse_node(reader, &child_tag, child_attrs, false)?);
                    }
                    Event::Empty(e) => {
                        let child_tag = e.name().as_ref().to_vec();
                        let child_attrs = collect_attrs(&e)?;
                        children.push(parse_node(reader, &child_tag, child_attrs, true)?);
                    }
                    Event::Eof => {
                        return Err(WireError::Malformed(format!("unexpected eof inside <{name}>")));
                    }
                    _ => {}
                }
            }
            if children.is_empty() {
                return Err(WireError::EmptyContainer(name));
            }
            Ok(if tag == b"seq" {
                Instruction::Seq(children)
            } else {
                Instruction::Par(children)
            })
        }
        other => Err(WireError::Malformed(format!(
            "unexpected element <{}>",
            String::from_utf8_lossy(other)
        ))),
    }
}

fn parse_action(attrs: Vec<(String, String)>) -> WireResult<Instruction> {
    let mut map: HashMap<String, String> = attrs.into_iter().collect();
    let id = map
        .remove("id")
        .ok_or_else(|| WireError::Malformed("<action> missing 'id'".into()))?;
    let command = map
        .remove("command")
        .ok_or_else(|| WireError::Malformed("<action> missing 'command'".into()))?;
    let component_set = map.remove("component-set").unwrap_or_default();
    let remote = match map.remove("remote") {
        Some(s) => parse_remote(&s)?,
        None => false,
    };
    let force = match map.remove("force") {
        Some(s) => s.parse::<ForceMode>().map_err(WireError::InvalidForce)?,
        None => ForceMode::Allowed,
    };
    let deps = match map.remove("deps") {
        Some(s) => s.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect(),
        None => Vec::new(),
    };
    Ok(Instruction::Action(Action {
        id,
        command,
        component_set,
        remote,
        force,
        deps,
    }))
}

fn parse_remote(s: &str) -> WireResult<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" | "t" => Ok(true),
        "false" | "0" | "no" | "n" | "f" => Ok(false),
        other => Err(WireError::InvalidRemote(other.to_string())),
    }
}

/// Tree-wide uniqueness of `action/@id`, `deps` resolution and acyclicity.
fn validate(instr: &Instruction) -> WireResult<()> {
    let mut ids = HashSet::new();
    let mut deps: HashMap<String, Vec<String>> = HashMap::new();
    collect_actions(instr, &mut ids, &mut deps)?;
    for (id, dep_ids) in &deps {
        for dep in dep_ids {
            if !ids.contains(dep) {
                return Err(WireError::UnknownDep {
                    action: id.clone(),
                    dep: dep.clone(),
                });
            }
        }
    }
    check_cycles(&deps)
}

fn collect_actions(
    instr: &Instruction,
    ids: &mut HashSet<String>,
    deps: &mut HashMap<String, Vec<String>>,
) -> WireResult<()> {
    match instr {
        Instruction::Action(a) => {
            if !ids.insert(a.id.clone()) {
                return Err(WireError::DuplicateActionId(a.id.clone()));
            }
            deps.insert(a.id.clone(), a.deps.clone());
            Ok(())
        }
        Instruction::Seq(items) | Instruction::Par(items) => {
            for item in items {
                collect_actions(item, ids, deps)?;
            }
            Ok(())
        }
    }
}

fn check_cycles(deps: &HashMap<String, Vec<String>>) -> WireResult<()> {
    let mut visited: HashSet<String> = HashSet::new();
    for id in deps.keys() {
        if visited.contains(id) {
            continue;
        }
        let mut stack = Vec::new();
        let mut on_stack = HashSet::new();
        if let Some(cycle) = find_cycle(id, deps, &mut visited, &mut stack, &mut on_stack) {
            return Err(WireError::CyclesDetected(cycle));
        }
    }
    Ok(())
}

fn find_cycle(
    id: &str,
    deps: &HashMap<String, Vec<String>>,
    visited: &mut HashSet<String>,
    stack: &mut Vec<String>,
    on_stack: &mut HashSet<String>,
) -> Option<Vec<String>> {
    visited.insert(id.to_string());
    on_stack.insert(id.to_string());
    stack.push(id.to_string());
    if let Some(children) = deps.get(id) {
        for child in children {
            if on_stack.contains(child) {
                let idx = stack.iter().position(|x| x == child).unwrap();
                return Some(stack[idx..].to_vec());
            }
            if !visited.contains(child) {
                if let Some(cycle) = find_cycle(child, deps, visited, stack, on_stack) {
                    return Some(cycle);
                }
            }
        }
    }
    stack.pop();
    on_stack.remove(id);
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(id: &str, deps: &[&str]) -> Instruction {
        Instruction::Action(Action {
            id: id.to_string(),
            command: "true".to_string(),
            component_set: "a#t@c".to_string(),
            remote: false,
            force: ForceMode::Allowed,
            deps: deps.iter().map(|s| s.to_string()).collect(),
        })
    }

    #[test]
    fn round_trips_a_seq_of_actions() {
        let tree = Instruction::Seq(vec![action("a", &[]), action("b", &["a"])]);
        let xml = to_xml(&tree).unwrap();
        let parsed = from_xml(&xml).unwrap();
        assert_eq!(parsed, tree);
    }

    #[test]
    fn force_defaults_to_allowed_when_absent() {
        let xml = r#"<instructiontree xmlns="urn:sequencer:instructiontree"><action id="a" command="true" component-set="x"/></instructiontree>"#;
        let parsed = from_xml(xml).unwrap();
        match parsed {
            Instruction::Action(a) => assert_eq!(a.force, ForceMode::Allowed),
            _ => panic!("expected an action"),
        }
    }

    #[test]
    fn remote_is_case_insensitive() {
        let xml = r#"<instructiontree xmlns="urn:sequencer:instructiontree"><action id="a" command="true" component-set="x" remote="TRUE"/></instructiontree>"#;
        let parsed = from_xml(xml).unwrap();
        match parsed {
            Instruction::Action(a) => assert!(a.remote),
            _ => panic!("expected an action"),
        }
    }

    #[test]
    fn remote_accepts_single_letter_spellings() {
        for (value, expected) in [("t", true), ("T", true), ("y", true), ("f", false), ("n", false)] {
            let xml = format!(
                r#"<instructiontree xmlns="urn:sequencer:instructiontree"><action id="a" command="true" component-set="x" remote="{value}"/></instructiontree>"#
            );
            match from_xml(&xml).unwrap() {
                Instruction::Action(a) => assert_eq!(a.remote, expected, "remote={value}"),
                _ => panic!("expected an action"),
            }
        }
    }

    #[test]
    fn empty_seq_is_rejected() {
        let xml = r#"<instructiontree xmlns="urn:sequencer:instructiontree"><seq></seq></instructiontree>"#;
        assert!(matches!(from_xml(xml), Err(WireError::EmptyContainer("seq"))));
    }

    #[test]
    fn duplicate_action_id_is_rejected() {
        let tree = Instruction::Par(vec![action("a", &[]), action("a", &[])]);
        assert!(matches!(to_xml(&tree), Err(WireError::DuplicateActionId(_))));
    }

    #[test]
    fn dep_pointing_nowhere_is_rejected() {
        let tree = Instruction::Par(vec![action("a", &["ghost"])]);
        assert!(matches!(to_xml(&tree), Err(WireError::UnknownDep { .. })));
    }

    #[test]
    fn cyclic_deps_are_rejected() {
        let tree = Instruction::Par(vec![action("a", &["b"]), action("b", &["a"])]);
        assert!(matches!(to_xml(&tree), Err(WireError::CyclesDetected(_))));
    }
}
