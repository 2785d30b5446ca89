//! XML wire formats for the ActionDAG and InstructionTree. Both
//! formats round-trip byte-for-byte: `to_xml` always emits
//! attributes and children in a fixed, deterministic order, so
//! `from_xml(to_xml(x))` followed by `to_xml` again reproduces the same
//! bytes.

mod action_dag;
mod error;
mod instruction_tree;

pub use action_dag::{from_xml as action_dag_from_xml, to_xml as action_dag_to_xml};
pub use error::{WireError, WireResult};
pub use instruction_tree::{from_xml as instruction_tree_from_xml, to_xml as instruction_tree_to_xml};
