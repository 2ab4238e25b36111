//! Execution waves of a valid submission.

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::Serialize;

use super::GraphValidator;
use crate::error::{ChainrunError, Result};
use crate::jobs::JobContext;

/// Jobs grouped by dependency depth.
///
/// Wave 0 holds the jobs without dependencies; wave `n` holds the jobs whose
/// deepest dependency sits in wave `n - 1`. Within a wave, jobs keep their
/// submission order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionPlan {
    waves: Vec<Vec<String>>,
}

impl ExecutionPlan {
    pub fn build(contexts: &[JobContext]) -> Result<Self> {
        GraphValidator::validate(contexts)?;

        let mut graph: DiGraph<&str, ()> = DiGraph::with_capacity(contexts.len(), 0);
        let index: HashMap<&str, NodeIndex> = contexts
            .iter()
            .map(|c| (c.id.as_str(), graph.add_node(c.id.as_str())))
            .collect();

        for context in contexts {
            let dependent = index[context.id.as_str()];
            for dependency in &context.waits {
                if let Some(&upstream) = index.get(dependency.as_str()) {
                    graph.update_edge(upstream, dependent, ());
                }
            }
        }

        let order = toposort(&graph, None).map_err(|cycle| {
            ChainrunError::dependency_cycle(&[graph[cycle.node_id()].to_string()])
        })?;

        let mut depth = vec![0usize; graph.node_count()];
        for node in order {
            depth[node.index()] = graph
                .neighbors_directed(node, Direction::Incoming)
                .map(|upstream| depth[upstream.index()] + 1)
                .max()
                .unwrap_or(0);
        }

        let mut waves: Vec<Vec<String>> = Vec::new();
        for context in contexts {
            let level = depth[index[context.id.as_str()].index()];
            if waves.len() <= level {
                waves.resize_with(level + 1, Vec::new);
            }
            waves[level].push(context.id.clone());
        }

        Ok(Self { waves })
    }

    pub fn waves(&self) -> &[Vec<String>] {
        &self.waves
    }

    /// Wave index of a job.
    pub fn wave_of(&self, id: &str) -> Option<usize> {
        self.waves.iter().position(|wave| wave.iter().any(|j| j == id))
    }

    pub fn len(&self) -> usize {
        self.waves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waves.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(id: &str, waits: &[&str]) -> JobContext {
        JobContext::new(id, "true").waits(waits.iter().copied())
    }

    #[test]
    fn test_diamond_waves() {
        let contexts = vec![job("a", &[]), job("b", &["a"]), job("c", &["a"]), job("d", &["b", "c"])];
        let plan = ExecutionPlan::build(&contexts).unwrap();

        assert_eq!(plan.waves(), [vec!["a"], vec!["b", "c"], vec!["d"]]);
        assert_eq!(plan.wave_of("d"), Some(2));
        assert_eq!(plan.wave_of("zzz"), None);
    }

    #[test]
    fn test_depth_follows_longest_chain() {
        let contexts = vec![
            job("late", &["a", "c"]),
            job("a", &[]),
            job("b", &["a"]),
            job("c", &["b"]),
        ];
        let plan = ExecutionPlan::build(&contexts).unwrap();

        assert_eq!(plan.len(), 4);
        assert_eq!(plan.wave_of("late"), Some(3));
    }

    #[test]
    fn test_empty_submission() {
        let plan = ExecutionPlan::build(&[]).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_cycle_is_rejected() {
        let contexts = vec![job("a", &["b"]), job("b", &["a"])];
        let error = ExecutionPlan::build(&contexts).unwrap_err();
        assert_eq!(error.code(), crate::error::ErrorCode::DependencyCycle);
    }
}
