//! Validated step dependency graph.

use std::collections::HashMap;

use serde_json::json;

use crate::errors::{CoreResult, GraphCoreError};
use crate::hashing::hash_value;
use crate::step::StepDescriptor;

/// Dependency DAG over step indices, grouped into topological levels.
///
/// Level 0 holds the steps without dependencies; level `n` the steps whose
/// dependencies all sit in earlier levels. Within a level steps keep their
/// declaration order.
#[derive(Debug, Clone)]
pub struct StepGraph {
    ids: Vec<String>,
    dependencies: Vec<Vec<usize>>,
    levels: Vec<Vec<usize>>,
    definition_hash: String,
}

impl StepGraph {
    /// Rejects duplicate ids, unknown dependencies, self-dependencies and
    /// cycles before anything runs.
    pub fn new<C>(steps: &[StepDescriptor<C>]) -> CoreResult<Self> {
        let mut position: HashMap<&str, usize> = HashMap::with_capacity(steps.len());
        for (i, step) in steps.iter().enumerate() {
            if position.insert(step.id.as_str(), i).is_some() {
                return Err(GraphCoreError::InvalidStepGraph(format!("duplicate step id {}", step.id)));
            }
        }

        let mut dependencies = Vec::with_capacity(steps.len());
        for step in steps {
            let mut deps = Vec::with_capacity(step.depends_on.len());
            for dep in &step.depends_on {
                let idx = *position.get(dep.as_str()).ok_or_else(|| {
                              GraphCoreError::InvalidStepGraph(format!("step {} depends on unknown step {dep}",
                                                                       step.id))
                          })?;
                if dep == &step.id {
                    return Err(GraphCoreError::InvalidStepGraph(format!("step {} depends on itself", step.id)));
                }
                if !deps.contains(&idx) {
                    deps.push(idx);
                }
            }
            dependencies.push(deps);
        }

        let levels = kahn_levels(&dependencies).map_err(|stuck| {
                         let ids: Vec<&str> = stuck.iter().map(|&i| steps[i].id.as_str()).collect();
                         GraphCoreError::InvalidStepGraph(format!("dependency cycle among {}", ids.join(", ")))
                     })?;

        let definition_hash = hash_value(&json!(steps.iter()
                                                     .map(|s| json!({"id": s.id, "dependsOn": s.depends_on}))
                                                     .collect::<Vec<_>>()));
        Ok(Self { ids: steps.iter().map(|s| s.id.clone()).collect(),
                  dependencies,
                  levels,
                  definition_hash })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn id(&self, index: usize) -> &str {
        &self.ids[index]
    }

    pub fn dependencies(&self, index: usize) -> &[usize] {
        &self.dependencies[index]
    }

    pub fn levels(&self) -> &[Vec<usize>] {
        &self.levels
    }

    /// Hash of the step ids and their dependency lists.
    pub fn definition_hash(&self) -> &str {
        &self.definition_hash
    }

    /// Step ids in execution order (levels flattened).
    pub fn execution_order(&self) -> Vec<&str> {
        self.levels.iter().flatten().map(|&i| self.ids[i].as_str()).collect()
    }
}

/// Kahn's algorithm, level by level. On a cycle returns the indices that
/// could never be scheduled.
fn kahn_levels(dependencies: &[Vec<usize>]) -> Result<Vec<Vec<usize>>, Vec<usize>> {
    let n = dependencies.len();
    let mut in_degree: Vec<usize> = dependencies.iter().map(Vec::len).collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (i, deps) in dependencies.iter().enumerate() {
        for &d in deps {
            dependents[d].push(i);
        }
    }

    let mut levels = Vec::new();
    let mut current: Vec<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
    let mut scheduled = 0;
    while !current.is_empty() {
        scheduled += current.len();
        let mut next = Vec::new();
        for &i in &current {
            for &dep in &dependents[i] {
                in_degree[dep] -= 1;
                if in_degree[dep] == 0 {
                    next.push(dep);
                }
            }
        }
        next.sort_unstable();
        levels.push(std::mem::replace(&mut current, next));
    }

    if scheduled < n {
        return Err((0..n).filter(|&i| in_degree[i] > 0).collect());
    }
    Ok(levels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::StepExecutionContext;

    fn noop(_: &StepExecutionContext<'_, ()>) -> CoreResult<()> {
        Ok(())
    }

    fn step(id: &str, deps: &[&str]) -> StepDescriptor<()> {
        StepDescriptor::new(id, id, noop).with_dependencies(deps)
    }

    #[test]
    fn levels_follow_dependencies() {
        let steps = vec![step("c", &["b"]), step("a", &[]), step("b", &["a"]), step("d", &["a"])];
        let graph = StepGraph::new(&steps).unwrap();
        assert_eq!(graph.execution_order(), vec!["a", "b", "d", "c"]);
        assert_eq!(graph.levels().len(), 3);
    }

    #[test]
    fn cycle_is_rejected_before_run() {
        let steps = vec![step("a", &["c"]), step("b", &["a"]), step("c", &["b"]), step("d", &[])];
        let err = StepGraph::new(&steps).unwrap_err();
        match err {
            GraphCoreError::InvalidStepGraph(msg) => assert!(msg.contains("a, b, c"), "{msg}"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_and_duplicate_ids_are_rejected() {
        assert!(StepGraph::new(&[step("a", &["zzz"])]).is_err());
        assert!(StepGraph::new(&[step("a", &[]), step("a", &[])]).is_err());
        assert!(StepGraph::new(&[step("a", &["a"])]).is_err());
    }

    #[test]
    fn definition_hash_depends_on_edges() {
        let g1 = StepGraph::new(&[step("a", &[]), step("b", &["a"])]).unwrap();
        let g2 = StepGraph::new(&[step("a", &[]), step("b", &[])]).unwrap();
        assert_ne!(g1.definition_hash(), g2.definition_hash());
    }
}
