// Step-graph utilities. Per the design notes: represent the graph as arrays
// of step records plus an adjacency list indexed by name, never as a pointer
// graph, and validate acyclicity with Kahn's algorithm on construction.

use std::collections::{HashMap, HashSet, VecDeque};

/// Adjacency list keyed by step name: `edges[a]` contains every step that
/// depends on `a` (i.e. `a` must complete before those steps start).
pub struct StepGraph<'a> {
    pub names: Vec<&'a str>,
    edges: HashMap<&'a str, Vec<&'a str>>,
    in_degree: HashMap<&'a str, usize>,
}

impl<'a> StepGraph<'a> {
    /// Build the graph from `(step_name, depends_on)` pairs. Does not
    /// validate that every `depends_on` entry names a known step — callers
    /// run that check separately so the error message can name the missing
    /// reference directly rather than surfacing as a dangling edge.
    pub fn build(steps: &[(&'a str, &'a [String])]) -> Self {
        let mut edges: HashMap<&str, Vec<&str>> = HashMap::new();
        let mut in_degree: HashMap<&str, usize> = HashMap::new();
        let names: Vec<&str> = steps.iter().map(|(name, _)| *name).collect();

        for name in &names {
            edges.entry(name).or_default();
            in_degree.entry(name).or_insert(0);
        }

        for (name, depends_on) in steps {
            for dep in depends_on.iter() {
                let dep = dep.as_str();
                if !in_degree.contains_key(dep) {
                    // Unknown dependency; skip here, the validator reports it.
                    continue;
                }
                edges.entry(dep).or_default().push(name);
                *in_degree.entry(name).or_insert(0) += 1;
            }
        }

        Self { names, edges, in_degree }
    }

    /// Kahn's algorithm. Returns `Ok(topo_order)` if acyclic, or `Err(cycle)`
    /// listing the step names that form (or are downstream of) a cycle.
    pub fn topo_sort(&self) -> Result<Vec<&'a str>, Vec<&'a str>> {
        let mut in_degree = self.in_degree.clone();
        let mut queue: VecDeque<&str> = in_degree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(name, _)| *name)
            .collect();
        // Deterministic ordering for identical inputs (property 8).
        let mut queue: Vec<&str> = queue.drain(..).collect();
        queue.sort_unstable();
        let mut queue: VecDeque<&str> = queue.into();

        let mut order = Vec::with_capacity(self.names.len());
        while let Some(name) = queue.pop_front() {
            order.push(name);
            if let Some(successors) = self.edges.get(name) {
                let mut ready = Vec::new();
                for succ in successors {
                    let degree = in_degree.get_mut(succ).expect("successor in in_degree map");
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push(*succ);
                    }
                }
                ready.sort_unstable();
                queue.extend(ready);
            }
        }

        if order.len() == self.names.len() {
            Ok(order)
        } else {
            let remaining: HashSet<&str> = self.names.iter().copied().filter(|n| !order.contains(n)).collect();
            let mut cycle: Vec<&str> = remaining.into_iter().collect();
            cycle.sort_unstable();
            Err(cycle)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acyclic_graph_sorts_respecting_dependencies() {
        let a_deps: Vec<String> = vec![];
        let b_deps: Vec<String> = vec!["a".to_string()];
        let c_deps: Vec<String> = vec!["b".to_string()];
        let steps: Vec<(&str, &[String])> = vec![("a", &a_deps), ("b", &b_deps), ("c", &c_deps)];
        let graph = StepGraph::build(&steps);
        let order = graph.topo_sort().unwrap();
        let pos = |n: &str| order.iter().position(|x| *x == n).unwrap();
        assert!(pos("a") < pos("b"));
        assert!(pos("b") < pos("c"));
    }

    #[test]
    fn cyclic_graph_is_rejected() {
        let a_deps: Vec<String> = vec!["c".to_string()];
        let b_deps: Vec<String> = vec!["a".to_string()];
        let c_deps: Vec<String> = vec!["b".to_string()];
        let steps: Vec<(&str, &[String])> = vec![("a", &a_deps), ("b", &b_deps), ("c", &c_deps)];
        let graph = StepGraph::build(&steps);
        let cycle = graph.topo_sort().unwrap_err();
        assert_eq!(cycle, vec!["a", "b", "c"]);
    }

    #[test]
    fn independent_steps_sort_deterministically() {
        let no_deps: Vec<String> = vec![];
        let steps: Vec<(&str, &[String])> = vec![("z", &no_deps), ("a", &no_deps), ("m", &no_deps)];
        let graph = StepGraph::build(&steps);
        assert_eq!(graph.topo_sort().unwrap(), vec!["a", "m", "z"]);
    }
}
