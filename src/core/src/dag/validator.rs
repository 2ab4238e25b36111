//! Submission validation.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::error::{ChainrunError, Result};
use crate::jobs::JobContext;

/// Every problem found in a submission, per category.
///
/// Each list is deduplicated and ordered by first appearance in the input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub unknown_dependencies: Vec<String>,
    pub duplicate_ids: Vec<String>,
    pub cyclic_roots: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.unknown_dependencies.is_empty() && self.duplicate_ids.is_empty() && self.cyclic_roots.is_empty()
    }

    /// The error of the first failing category, in the order unknown
    /// references, duplicates, cycles.
    pub fn first_error(&self) -> Option<ChainrunError> {
        if !self.unknown_dependencies.is_empty() {
            Some(ChainrunError::unknown_dependencies(&self.unknown_dependencies))
        } else if !self.duplicate_ids.is_empty() {
            Some(ChainrunError::duplicate_ids(&self.duplicate_ids))
        } else if !self.cyclic_roots.is_empty() {
            Some(ChainrunError::dependency_cycle(&self.cyclic_roots))
        } else {
            None
        }
    }
}

/// Stateless checks over a list of job contexts.
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphValidator;

impl GraphValidator {
    /// Fail on the first category with findings: unknown references, then
    /// duplicate ids, then cycles.
    pub fn validate(contexts: &[JobContext]) -> Result<()> {
        let unknown = Self::unknown_dependencies(contexts);
        if !unknown.is_empty() {
            return Err(ChainrunError::unknown_dependencies(&unknown));
        }

        let duplicates = Self::duplicate_ids(contexts);
        if !duplicates.is_empty() {
            return Err(ChainrunError::duplicate_ids(&duplicates));
        }

        let cyclic = Self::cyclic_roots(contexts);
        if !cyclic.is_empty() {
            return Err(ChainrunError::dependency_cycle(&cyclic));
        }

        Ok(())
    }

    /// Run all three checks.
    pub fn inspect(contexts: &[JobContext]) -> ValidationReport {
        ValidationReport {
            unknown_dependencies: Self::unknown_dependencies(contexts),
            duplicate_ids: Self::duplicate_ids(contexts),
            cyclic_roots: Self::cyclic_roots(contexts),
        }
    }

    /// Dependency ids that name no job of the submission.
    pub fn unknown_dependencies(contexts: &[JobContext]) -> Vec<String> {
        let known: HashSet<&str> = contexts.iter().map(|c| c.id.as_str()).collect();
        let mut seen = HashSet::new();

        contexts
            .iter()
            .flat_map(|c| c.waits.iter())
            .filter(|id| !known.contains(id.as_str()))
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect()
    }

    /// Ids that occur more than once.
    pub fn duplicate_ids(contexts: &[JobContext]) -> Vec<String> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for context in contexts {
            *counts.entry(context.id.as_str()).or_default() += 1;
        }

        let mut seen = HashSet::new();
        contexts
            .iter()
            .map(|c| c.id.as_str())
            .filter(|id| counts[id] > 1 && seen.insert(*id))
            .map(str::to_string)
            .collect()
    }

    /// Roots from which a depth-first traversal hits a back-edge.
    ///
    /// This names every job that can reach a cycle, which is not always
    /// every job that lies on one. Unknown ids are treated as leaves.
    pub fn cyclic_roots(contexts: &[JobContext]) -> Vec<String> {
        let mut edges: HashMap<&str, Vec<&str>> = HashMap::new();
        for context in contexts {
            edges
                .entry(context.id.as_str())
                .or_default()
                .extend(context.waits.iter().map(String::as_str));
        }

        let mut marks: HashMap<&str, Mark> = HashMap::new();
        let mut reaches_cycle: HashSet<&str> = HashSet::new();

        for root in contexts.iter().map(|c| c.id.as_str()) {
            if marks.contains_key(root) {
                continue;
            }

            marks.insert(root, Mark::Visiting);
            let mut stack: Vec<(&str, usize)> = vec![(root, 0)];

            while let Some(frame) = stack.last_mut() {
                let node = frame.0;
                let successors = edges.get(node).map(Vec::as_slice).unwrap_or(&[]);

                if let Some(&next) = successors.get(frame.1) {
                    frame.1 += 1;
                    match marks.get(next) {
                        None => {
                            marks.insert(next, Mark::Visiting);
                            stack.push((next, 0));
                        }
                        Some(Mark::Visiting) => {
                            reaches_cycle.insert(node);
                        }
                        Some(Mark::Done) => {
                            if reaches_cycle.contains(next) {
                                reaches_cycle.insert(node);
                            }
                        }
                    }
                } else {
                    stack.pop();
                    marks.insert(node, Mark::Done);
                    if reaches_cycle.contains(node) {
                        if let Some(&(parent, _)) = stack.last() {
                            reaches_cycle.insert(parent);
                        }
                    }
                }
            }
        }

        let mut seen = HashSet::new();
        contexts
            .iter()
            .map(|c| c.id.as_str())
            .filter(|id| reaches_cycle.contains(id) && seen.insert(*id))
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}
