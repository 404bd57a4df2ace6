use crate::{GraphValidationError, Value};
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

pub type WorkflowId = Uuid;
pub type NodeId = String;

/// Output handle an edge without an explicit `source_handle` belongs to.
pub const DEFAULT_HANDLE: &str = "default";

/// Immutable description of a workflow: typed nodes wired by edges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowGraph {
    #[serde(default = "Uuid::new_v4")]
    pub id: WorkflowId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl WorkflowGraph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn add_node(&mut self, node: NodeSpec) -> NodeId {
        let id = node.id.clone();
        self.nodes.push(node);
        id
    }

    /// Connect two nodes through the source's default output.
    pub fn connect(&mut self, source: impl Into<NodeId>, target: impl Into<NodeId>) -> String {
        self.push_edge(source.into(), target.into(), None)
    }

    /// Connect two nodes through a named output handle of the source.
    pub fn connect_handle(
        &mut self,
        source: impl Into<NodeId>,
        handle: impl Into<String>,
        target: impl Into<NodeId>,
    ) -> String {
        self.push_edge(source.into(), target.into(), Some(handle.into()))
    }

    fn push_edge(&mut self, source: NodeId, target: NodeId, source_handle: Option<String>) -> String {
        let id = format!("e{}-{}-{}", self.edges.len(), source, target);
        self.edges.push(Edge {
            id: id.clone(),
            source,
            target,
            source_handle,
        });
        id
    }

    pub fn find_node(&self, id: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Edges ending at `node_id`, in registration order.
    pub fn incoming<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.target == node_id)
    }

    /// Edges leaving `node_id`, in registration order.
    pub fn outgoing<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.source == node_id)
    }

    /// Nodes without incoming edges, in registration order.
    pub fn start_nodes(&self) -> Vec<&NodeSpec> {
        let targets: HashSet<&str> = self.edges.iter().map(|e| e.target.as_str()).collect();
        self.nodes
            .iter()
            .filter(|n| !targets.contains(n.id.as_str()))
            .collect()
    }

    /// Check the structural invariants a graph must hold before it runs.
    pub fn validate(&self) -> Result<(), GraphValidationError> {
        let mut graph = DiGraph::<&str, ()>::new();
        let mut node_to_index = HashMap::new();

        for node in &self.nodes {
            if node_to_index.contains_key(node.id.as_str()) {
                return Err(GraphValidationError::DuplicateNodeId(node.id.clone()));
            }
            let idx = graph.add_node(node.id.as_str());
            node_to_index.insert(node.id.as_str(), idx);
        }

        let mut edge_ids = HashSet::new();
        for edge in &self.edges {
            if !edge_ids.insert(edge.id.as_str()) {
                return Err(GraphValidationError::DuplicateEdgeId(edge.id.clone()));
            }
            let lookup = |node_id: &str| {
                node_to_index
                    .get(node_id)
                    .copied()
                    .ok_or_else(|| GraphValidationError::DanglingEdge {
                        edge_id: edge.id.clone(),
                        node_id: node_id.to_string(),
                    })
            };
            let from = lookup(&edge.source)?;
            let to = lookup(&edge.target)?;
            graph.add_edge(from, to, ());
        }

        if self.start_nodes().is_empty() {
            return Err(GraphValidationError::NoStartNode);
        }

        if toposort(&graph, None).is_err() {
            return Err(GraphValidationError::CyclicDependency);
        }

        Ok(())
    }
}

/// Node specification in a workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub config: HashMap<String, Value>,
}

impl NodeSpec {
    pub fn new(id: impl Into<NodeId>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            name: None,
            config: HashMap::new(),
        }
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Directed connection between two nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    #[serde(default = "generated_edge_id")]
    pub id: String,
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
}

impl Edge {
    /// The output handle this edge hangs off, `"default"` when unlabeled.
    pub fn handle(&self) -> &str {
        self.source_handle.as_deref().unwrap_or(DEFAULT_HANDLE)
    }
}

fn generated_edge_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(ids: &[&str]) -> WorkflowGraph {
        let mut graph = WorkflowGraph::new("chain");
        for id in ids {
            graph.add_node(NodeSpec::new(*id, "noop"));
        }
        for pair in ids.windows(2) {
            graph.connect(pair[0], pair[1]);
        }
        graph
    }

    #[test]
    fn valid_chain_passes() {
        let graph = chain(&["a", "b", "c"]);
        assert!(graph.validate().is_ok());
        let starts: Vec<_> = graph.start_nodes().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(starts, vec!["a"]);
    }

    #[test]
    fn dangling_edge_is_rejected() {
        let mut graph = chain(&["a"]);
        let edge_id = graph.connect("a", "ghost");
        assert_eq!(
            graph.validate(),
            Err(GraphValidationError::DanglingEdge {
                edge_id,
                node_id: "ghost".to_string()
            })
        );
    }

    #[test]
    fn duplicate_node_is_rejected() {
        let mut graph = chain(&["a", "b"]);
        graph.add_node(NodeSpec::new("a", "noop"));
        assert_eq!(
            graph.validate(),
            Err(GraphValidationError::DuplicateNodeId("a".to_string()))
        );
    }

    #[test]
    fn graph_without_start_node_is_rejected() {
        let mut graph = chain(&["a", "b"]);
        graph.connect("b", "a");
        assert_eq!(graph.validate(), Err(GraphValidationError::NoStartNode));
        assert_eq!(
            WorkflowGraph::new("empty").validate(),
            Err(GraphValidationError::NoStartNode)
        );
    }

    #[test]
    fn cycle_behind_start_node_is_rejected() {
        let mut graph = chain(&["a", "b", "c"]);
        graph.connect("c", "b");
        assert_eq!(graph.validate(), Err(GraphValidationError::CyclicDependency));
    }

    #[test]
    fn unlabeled_edge_uses_default_handle() {
        let mut graph = chain(&["a", "b"]);
        graph.connect_handle("a", "true", "b");
        assert_eq!(graph.edges[0].handle(), DEFAULT_HANDLE);
        assert_eq!(graph.edges[1].handle(), "true");
        assert_eq!(graph.outgoing("a").count(), 2);
        assert_eq!(graph.incoming("b").count(), 2);
    }

    #[test]
    fn loads_from_json() {
        let graph: WorkflowGraph = serde_json::from_str(
            r#"{
                "name": "json",
                "nodes": [
                    {"id": "t", "type": "trigger"},
                    {"id": "c", "type": "condition", "config": {"operator": "truthy"}}
                ],
                "edges": [{"source": "t", "target": "c", "source_handle": "out"}]
            }"#,
        )
        .unwrap();
        assert!(graph.validate().is_ok());
        assert_eq!(graph.nodes[1].config.get("operator"), Some(&Value::from("truthy")));
        assert_eq!(graph.edges[0].handle(), "out");
    }
}
