//! Dependency graph for phase execution ordering.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::error::{PipelineError, Result};

use super::phase::Phase;

/// Validated dependency relationships between phases.
///
/// The graph is built once before a run. A built graph is always acyclic and
/// every dependency refers to a declared phase.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// Map of phase id to its direct dependencies, in declaration order.
    dependencies: HashMap<String, Vec<String>>,
    /// Deterministic topological order.
    order: Vec<String>,
}

impl DependencyGraph {
    /// Create a new dependency graph builder.
    pub fn builder() -> DependencyGraphBuilder {
        DependencyGraphBuilder::new()
    }

    /// Build the graph for a list of phase definitions.
    pub fn from_phases(phases: &[Phase]) -> Result<Self> {
        phases
            .iter()
            .fold(Self::builder(), |builder, phase| {
                builder.add_phase(phase.id.clone(), phase.depends_on.clone())
            })
            .build()
    }

    /// Phases in topological order (dependencies before dependents).
    ///
    /// Among phases that are ready at the same time, the one declared first
    /// comes first.
    pub fn topological_order(&self) -> &[String] {
        &self.order
    }

    /// First direct dependency of `phase` that is not in `satisfied`.
    ///
    /// Dependencies are checked in declaration order; `None` means the phase
    /// may start.
    pub fn unsatisfied_dependency(
        &self,
        phase: &str,
        satisfied: &HashSet<String>,
    ) -> Option<&str> {
        self.dependencies
            .get(phase)?
            .iter()
            .find(|dep| !satisfied.contains(*dep))
            .map(String::as_str)
    }

    /// Reorder phase definitions into topological order.
    pub fn order_phases(&self, phases: Vec<Phase>) -> Vec<Phase> {
        let mut by_id: HashMap<String, Phase> =
            phases.into_iter().map(|p| (p.id.clone(), p)).collect();
        self.order
            .iter()
            .filter_map(|id| by_id.remove(id))
            .collect()
    }
}

/// Find a cycle, returning the path (first node repeated at the end) if one exists.
///
/// Three-colour depth-first search over phases and their dependencies, both
/// visited in declaration order so the reported cycle is deterministic.
fn find_cycle(
    declared: &[String],
    dependencies: &HashMap<String, Vec<String>>,
) -> Option<Vec<String>> {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Unvisited,
        Visiting,
        Visited,
    }

    fn dfs<'a>(
        node: &'a str,
        dependencies: &'a HashMap<String, Vec<String>>,
        state: &mut HashMap<&'a str, State>,
        path: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        state.insert(node, State::Visiting);
        path.push(node);

        if let Some(deps) = dependencies.get(node) {
            for dep in deps {
                match state.get(dep.as_str()) {
                    Some(State::Visiting) => {
                        let start = path.iter().position(|s| *s == dep.as_str())?;
                        let mut cycle: Vec<String> =
                            path[start..].iter().map(|s| s.to_string()).collect();
                        cycle.push(dep.clone());
                        return Some(cycle);
                    }
                    Some(State::Unvisited) | None => {
                        if let Some(cycle) = dfs(dep, dependencies, state, path) {
                            return Some(cycle);
                        }
                    }
                    Some(State::Visited) => {}
                }
            }
        }

        path.pop();
        state.insert(node, State::Visited);
        None
    }

    let mut state: HashMap<&str, State> = declared
        .iter()
        .map(|s| (s.as_str(), State::Unvisited))
        .collect();
    let mut path: Vec<&str> = Vec::new();

    for phase in declared {
        if state.get(phase.as_str()) == Some(&State::Unvisited) {
            if let Some(cycle) = dfs(phase, dependencies, &mut state, &mut path) {
                return Some(cycle);
            }
        }
    }

    None
}

/// Builder for constructing a DependencyGraph.
#[derive(Debug, Default)]
pub struct DependencyGraphBuilder {
    phases: Vec<(String, Vec<String>)>,
}

impl DependencyGraphBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a phase with its dependencies.
    pub fn add_phase(mut self, id: impl Into<String>, depends_on: Vec<String>) -> Self {
        self.phases.push((id.into(), depends_on));
        self
    }

    /// Build the dependency graph.
    ///
    /// Fails on duplicate phase ids, dependencies on undeclared phases, and
    /// cycles. Nothing about a run is decided until all three checks pass.
    pub fn build(self) -> Result<DependencyGraph> {
        let mut declared: Vec<String> = Vec::with_capacity(self.phases.len());
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut dependencies: HashMap<String, Vec<String>> = HashMap::new();

        for (id, deps) in self.phases {
            if index.contains_key(&id) {
                return Err(PipelineError::DuplicatePhase { phase: id });
            }
            index.insert(id.clone(), declared.len());
            declared.push(id.clone());

            let mut unique: Vec<String> = Vec::with_capacity(deps.len());
            for dep in deps {
                if !unique.contains(&dep) {
                    unique.push(dep);
                }
            }
            dependencies.insert(id, unique);
        }

        for phase in &declared {
            for dep in &dependencies[phase] {
                if !index.contains_key(dep) {
                    return Err(PipelineError::UnknownDependency {
                        phase: phase.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        if let Some(cycle) = find_cycle(&declared, &dependencies) {
            return Err(PipelineError::CyclicDependency { cycle });
        }

        let mut dependents: HashMap<String, Vec<String>> =
            declared.iter().map(|p| (p.clone(), Vec::new())).collect();
        for phase in &declared {
            for dep in &dependencies[phase] {
                if let Some(list) = dependents.get_mut(dep) {
                    list.push(phase.clone());
                }
            }
        }

        // Kahn's algorithm, always taking the ready phase declared first.
        let mut in_degree: Vec<usize> = declared
            .iter()
            .map(|p| dependencies[p].len())
            .collect();
        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &d)| d == 0)
            .map(|(i, _)| Reverse(i))
            .collect();
        let mut order = Vec::with_capacity(declared.len());

        while let Some(Reverse(i)) = ready.pop() {
            let phase = &declared[i];
            order.push(phase.clone());
            for dependent in &dependents[phase] {
                let j = index[dependent];
                in_degree[j] -= 1;
                if in_degree[j] == 0 {
                    ready.push(Reverse(j));
                }
            }
        }

        Ok(DependencyGraph {
            dependencies,
            order,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deps(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn position(order: &[String], id: &str) -> usize {
        order.iter().position(|s| s == id).unwrap()
    }

    #[test]
    fn builder_creates_empty_graph() {
        let graph = DependencyGraph::builder().build().unwrap();
        assert!(graph.topological_order().is_empty());
    }

    #[test]
    fn independent_phases_keep_declaration_order() {
        let graph = DependencyGraph::builder()
            .add_phase("c", vec![])
            .add_phase("a", vec![])
            .add_phase("b", vec![])
            .build()
            .unwrap();

        assert_eq!(graph.topological_order(), &deps(&["c", "a", "b"])[..]);
    }

    #[test]
    fn dependencies_come_first() {
        let graph = DependencyGraph::builder()
            .add_phase("sync", vec!["test".to_string()])
            .add_phase("test", vec!["export".to_string()])
            .add_phase("export", vec![])
            .build()
            .unwrap();

        assert_eq!(
            graph.topological_order(),
            &deps(&["export", "test", "sync"])[..]
        );
    }

    #[test]
    fn diamond_respects_every_edge() {
        let graph = DependencyGraph::builder()
            .add_phase("d", deps(&["b", "c"]))
            .add_phase("b", deps(&["a"]))
            .add_phase("c", deps(&["a"]))
            .add_phase("a", vec![])
            .build()
            .unwrap();

        let order = graph.topological_order();
        for (phase, dep) in [("b", "a"), ("c", "a"), ("d", "b"), ("d", "c")] {
            assert!(position(order, dep) < position(order, phase));
        }
        assert_eq!(order, &deps(&["a", "b", "c", "d"])[..]);
    }

    #[test]
    fn ties_broken_by_declaration_order() {
        let graph = DependencyGraph::builder()
            .add_phase("root", vec![])
            .add_phase("late", deps(&["root"]))
            .add_phase("early", vec![])
            .build()
            .unwrap();

        assert_eq!(
            graph.topological_order(),
            &deps(&["root", "late", "early"])[..]
        );
    }

    #[test]
    fn order_is_stable_across_builds() {
        let build = || {
            DependencyGraph::builder()
                .add_phase("x", vec![])
                .add_phase("y", deps(&["x"]))
                .add_phase("z", vec![])
                .add_phase("w", deps(&["z", "x"]))
                .build()
                .unwrap()
                .topological_order()
                .to_vec()
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn unknown_dependency_rejected() {
        let result = DependencyGraph::builder()
            .add_phase("a", deps(&["missing"]))
            .build();

        match result {
            Err(PipelineError::UnknownDependency { phase, dependency }) => {
                assert_eq!(phase, "a");
                assert_eq!(dependency, "missing");
            }
            other => panic!("expected UnknownDependency, got {:?}", other),
        }
    }

    #[test]
    fn duplicate_phase_rejected() {
        let result = DependencyGraph::builder()
            .add_phase("a", vec![])
            .add_phase("a", vec![])
            .build();
        assert!(matches!(result, Err(PipelineError::DuplicatePhase { .. })));
    }

    #[test]
    fn cycle_reported_with_path() {
        let result = DependencyGraph::builder()
            .add_phase("a", deps(&["c"]))
            .add_phase("b", deps(&["a"]))
            .add_phase("c", deps(&["b"]))
            .build();

        match result {
            Err(PipelineError::CyclicDependency { cycle }) => {
                assert_eq!(cycle.first(), cycle.last());
                assert_eq!(cycle.len(), 4);
                for id in ["a", "b", "c"] {
                    assert!(cycle.iter().any(|s| s == id));
                }
            }
            other => panic!("expected CyclicDependency, got {:?}", other),
        }
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let result = DependencyGraph::builder()
            .add_phase("a", deps(&["a"]))
            .build();

        match result {
            Err(PipelineError::CyclicDependency { cycle }) => {
                assert_eq!(cycle, deps(&["a", "a"]));
            }
            other => panic!("expected CyclicDependency, got {:?}", other),
        }
    }

    #[test]
    fn cycle_behind_valid_prefix_still_rejected() {
        let result = DependencyGraph::builder()
            .add_phase("root", vec![])
            .add_phase("x", deps(&["root", "y"]))
            .add_phase("y", deps(&["x"]))
            .build();
        assert!(matches!(
            result,
            Err(PipelineError::CyclicDependency { .. })
        ));
    }

    #[test]
    fn duplicate_dependency_entries_collapse() {
        let graph = DependencyGraph::builder()
            .add_phase("a", vec![])
            .add_phase("b", deps(&["a", "a"]))
            .build()
            .unwrap();
        assert_eq!(graph.topological_order(), &deps(&["a", "b"])[..]);
        assert_eq!(graph.unsatisfied_dependency("b", &HashSet::new()), Some("a"));
    }

    #[test]
    fn unsatisfied_dependency_checks_satisfied_set() {
        let graph = DependencyGraph::builder()
            .add_phase("export", vec![])
            .add_phase("test", vec![])
            .add_phase("sync", deps(&["export", "test"]))
            .build()
            .unwrap();

        let mut satisfied = HashSet::new();
        assert_eq!(graph.unsatisfied_dependency("export", &satisfied), None);
        assert_eq!(graph.unsatisfied_dependency("sync", &satisfied), Some("export"));
        satisfied.insert("export".to_string());
        assert_eq!(graph.unsatisfied_dependency("sync", &satisfied), Some("test"));
        satisfied.insert("test".to_string());
        assert_eq!(graph.unsatisfied_dependency("sync", &satisfied), None);
    }

    #[test]
    fn order_phases_reorders_definitions() {
        let phases = vec![
            Phase::new("sync").depends_on("export"),
            Phase::new("export"),
        ];
        let graph = DependencyGraph::from_phases(&phases).unwrap();
        let ordered = graph.order_phases(phases);
        let ids: Vec<&str> = ordered.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["export", "sync"]);
    }
}
