//! Instruction Sequence Maker: reduces an `ActionDAG` into an
//! [`Instruction`] tree, choosing among four ordering strategies.

mod algo;
mod error;
mod graph;
mod instruction;
mod plan;
mod prepare;

pub use algo::Algorithm;
pub use error::{IsmError, IsmResult};
pub use instruction::{Action, Instruction};
pub use plan::{execution_plan, ExecutionPlan, ExecutionStage};

use graph::WorkGraph;
use sequencer_dgm::ActionDag;

/// Prepare `dag` and reduce it with the chosen algorithm. Returns
/// `None` for an empty result: no actions at all.
pub fn reduce(dag: &ActionDag, algorithm: Algorithm) -> IsmResult<Option<Instruction>> {
    let graph = prepare::prepare(WorkGraph::from_action_dag(dag))?;
    Ok(match algorithm {
        Algorithm::Seq => algo::order_seq(&graph),
        Algorithm::Par => algo::order_par(&graph),
        Algorithm::Mixed => algo::order_mixed(graph),
        Algorithm::Optimal => algo::order_optimal(&graph),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sequencer_core::Component;

    #[test]
    fn empty_dag_reduces_to_nothing() {
        let dag = ActionDag::new();
        assert_eq!(reduce(&dag, Algorithm::Seq).unwrap(), None);
    }

    #[test]
    fn single_action_reduces_to_that_action_regardless_of_algorithm() {
        let mut dag = ActionDag::new();
        let c = Component::new("n1", "node", "compute");
        dag.ensure_node(c.clone());
        dag.add_attribute(&c.id(), "Provision".into(), "true".into());
        for algorithm in [Algorithm::Seq, Algorithm::Par, Algorithm::Mixed, Algorithm::Optimal] {
            let instr = reduce(&dag, algorithm).unwrap().unwrap();
            assert!(matches!(instr, Instruction::Action(_)));
        }
    }
}
