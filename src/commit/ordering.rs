//! Commit ordering
//!
//! Modules are committed dependencies first, so that a dependent module never
//! observes a dependency's half-applied roots.
//!
//! ## Process
//!
//! 1.  **Graph**: one node per module name, one edge per module order entry,
//!     pointing from the dependent module to its dependency. Edges to names
//!     outside the graph are ignored.
//!
//! 2.  **Components**: strongly connected components are found with an
//!     iterative Tarjan traversal. Nodes and successors are visited in name
//!     order, which makes the result deterministic.
//!
//! 3.  **Order**: Tarjan emits a component only after every component it
//!     reaches, which is exactly dependencies-first. Members of a cycle are
//!     collapsed into one component and ordered by name.

use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Module dependency graph keyed by module name
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    pub fn new<I>(names: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            edges: names.into_iter().map(|name| (name, BTreeSet::new())).collect(),
        }
    }

    pub fn add_node(&mut self, name: &str) {
        self.edges.entry(name.to_string()).or_default();
    }

    /// Record that `from` depends on `to`. Returns false, and records nothing,
    /// for self edges and for names outside the graph.
    pub fn add_edge(&mut self, from: &str, to: &str) -> bool {
        if from == to || !self.edges.contains_key(to) {
            return false;
        }
        match self.edges.get_mut(from) {
            Some(targets) => targets.insert(to.to_string()),
            None => false,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.edges.contains_key(name)
    }

    pub fn dependencies(&self, name: &str) -> impl Iterator<Item = &str> {
        self.edges
            .get(name)
            .into_iter()
            .flat_map(|targets| targets.iter().map(String::as_str))
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn topological_order(&self) -> TopologicalOrder {
        let names: Vec<&str> = self.edges.keys().map(String::as_str).collect();
        let position: HashMap<&str, usize> =
            names.iter().enumerate().map(|(i, name)| (*name, i)).collect();
        let successors: Vec<Vec<usize>> = self
            .edges
            .values()
            .map(|targets| {
                targets
                    .iter()
                    .filter_map(|target| position.get(target.as_str()).copied())
                    .collect()
            })
            .collect();

        let components = strongly_connected_components(&successors);

        let mut order = Vec::with_capacity(names.len());
        let mut cycles = Vec::new();
        for component in components {
            let mut members: Vec<String> =
                component.into_iter().map(|i| names[i].to_string()).collect();
            members.sort();
            if members.len() > 1 {
                cycles.push(members.clone());
            }
            order.extend(members);
        }
        TopologicalOrder::new(order, cycles)
    }
}

/// Iterative Tarjan. Components come out dependencies first.
fn strongly_connected_components(successors: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let n = successors.len();
    let mut index: Vec<Option<usize>> = vec![None; n];
    let mut lowlink = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut stack = Vec::new();
    let mut frames: Vec<(usize, usize)> = Vec::new();
    let mut counter = 0;
    let mut components = Vec::new();

    for root in 0..n {
        if index[root].is_some() {
            continue;
        }
        index[root] = Some(counter);
        lowlink[root] = counter;
        counter += 1;
        stack.push(root);
        on_stack[root] = true;
        frames.push((root, 0));

        while let Some(frame) = frames.last_mut() {
            let v = frame.0;
            if frame.1 < successors[v].len() {
                let w = successors[v][frame.1];
                frame.1 += 1;
                match index[w] {
                    None => {
                        index[w] = Some(counter);
                        lowlink[w] = counter;
                        counter += 1;
                        stack.push(w);
                        on_stack[w] = true;
                        frames.push((w, 0));
                    }
                    Some(w_index) if on_stack[w] => {
                        lowlink[v] = lowlink[v].min(w_index);
                    }
                    Some(_) => {}
                }
                continue;
            }

            frames.pop();
            if let Some(&(parent, _)) = frames.last() {
                lowlink[parent] = lowlink[parent].min(lowlink[v]);
            }
            if index[v] == Some(lowlink[v]) {
                let mut component = Vec::new();
                while let Some(w) = stack.pop() {
                    on_stack[w] = false;
                    component.push(w);
                    if w == v {
                        break;
                    }
                }
                components.push(component);
            }
        }
    }
    components
}

/// Result of ordering a [`DependencyGraph`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopologicalOrder {
    names: Vec<String>,
    rank: HashMap<String, usize>,
    cycles: Vec<Vec<String>>,
}

impl TopologicalOrder {
    fn new(names: Vec<String>, cycles: Vec<Vec<String>>) -> Self {
        let rank = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self { names, rank, cycles }
    }

    /// Names, dependencies first
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn rank(&self, name: &str) -> Option<usize> {
        self.rank.get(name).copied()
    }

    /// Groups of mutually dependent modules, each sorted by name
    pub fn cycles(&self) -> &[Vec<String>] {
        &self.cycles
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
