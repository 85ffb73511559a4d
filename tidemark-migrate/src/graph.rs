//! Dependency graph over pending migrations.
//!
//! Nodes are keyed by `app:model:name`. A node depends on every migration it
//! declares and on the previous migration of its own model. Dependencies that
//! are already applied are satisfied and do not become edges.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::{MigrateResult, MigrationError};
use crate::file::MigrationFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Visited,
}

#[derive(Debug, Clone)]
struct Node {
    file: MigrationFile,
    edges: Vec<String>,
}

/// Dependency graph built at apply time.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: BTreeMap<String, Node>,
}

impl DependencyGraph {
    /// Build the graph over pending migrations.
    ///
    /// `applied` holds the keys of migrations the schema editor has recorded.
    /// A declared dependency that is neither pending nor applied is an error.
    pub fn build(pending: Vec<MigrationFile>, applied: &HashSet<String>) -> MigrateResult<Self> {
        let mut nodes: BTreeMap<String, Node> = pending
            .into_iter()
            .map(|file| {
                (
                    file.key(),
                    Node {
                        file,
                        edges: Vec::new(),
                    },
                )
            })
            .collect();

        // Previous pending migration of each model, by (app, model).
        let mut by_model: HashMap<(String, String), Vec<(u32, String)>> = HashMap::new();
        for (key, node) in &nodes {
            by_model
                .entry((node.file.app.clone(), node.file.model.clone()))
                .or_default()
                .push((node.file.order, key.clone()));
        }
        let mut previous: HashMap<String, String> = HashMap::new();
        for mut list in by_model.into_values() {
            list.sort();
            for pair in list.windows(2) {
                previous.insert(pair[1].1.clone(), pair[0].1.clone());
            }
        }

        let keys: HashSet<String> = nodes.keys().cloned().collect();
        for (key, node) in nodes.iter_mut() {
            let mut edges: Vec<String> = previous.get(key).cloned().into_iter().collect();

            for dep in &node.file.dependencies {
                let dep_key = dep.to_string();
                if keys.contains(&dep_key) {
                    if !edges.contains(&dep_key) {
                        edges.push(dep_key);
                    }
                } else if !applied.contains(&dep_key) {
                    return Err(MigrationError::UnresolvedDependency {
                        migration: key.clone(),
                        dependency: dep_key,
                    });
                }
            }

            node.edges = edges;
        }

        Ok(Self { nodes })
    }

    /// Number of pending migrations.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Pending migrations a migration waits for.
    pub fn edges(&self, key: &str) -> Option<&[String]> {
        self.nodes.get(key).map(|n| n.edges.as_slice())
    }

    /// Order the migrations so that each comes after everything it depends on.
    ///
    /// Independent migrations are visited in key order, so the result is
    /// deterministic.
    pub fn sort(self) -> MigrateResult<Vec<MigrationFile>> {
        let order = self.topological_keys()?;
        let mut nodes = self.nodes;
        Ok(order
            .into_iter()
            .filter_map(|key| nodes.remove(&key))
            .map(|node| node.file)
            .collect())
    }

    fn topological_keys(&self) -> MigrateResult<Vec<String>> {
        let mut marks: HashMap<&str, Mark> = HashMap::with_capacity(self.nodes.len());
        let mut order = Vec::with_capacity(self.nodes.len());

        for root in self.nodes.keys() {
            if marks.contains_key(root.as_str()) {
                continue;
            }
            marks.insert(root.as_str(), Mark::Visiting);
            let mut stack: Vec<(&str, usize)> = vec![(root.as_str(), 0)];

            while let Some(top) = stack.last_mut() {
                let key = top.0;
                let next = self.nodes[key].edges.get(top.1).map(String::as_str);
                top.1 += 1;

                match next {
                    Some(dep) => match marks.get(dep) {
                        Some(Mark::Visiting) => {
                            return Err(MigrationError::CyclicDependency(dep.to_string()));
                        }
                        Some(Mark::Visited) => {}
                        None => {
                            marks.insert(dep, Mark::Visiting);
                            stack.push((dep, 0));
                        }
                    },
                    None => {
                        marks.insert(key, Mark::Visited);
                        order.push(key.to_string());
                        stack.pop();
                    }
                }
            }
        }

        Ok(order)
    }
}
