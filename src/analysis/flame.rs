use crate::jvm::types::{Frame, StackSample};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

/// Index of a node inside a [`FlameGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlameNode {
    /// `None` only for the root.
    pub frame: Option<Frame>,
    /// Samples whose stack passed through this exact path from the root.
    pub sample_count: u64,
    pub parent: Option<NodeId>,
    pub depth: usize,
    children: Vec<NodeId>,
    index: HashMap<Frame, NodeId>,
}

impl FlameNode {
    fn new(frame: Option<Frame>, parent: Option<NodeId>, depth: usize) -> Self {
        Self {
            frame,
            sample_count: 0,
            parent,
            depth,
            children: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Children in first-seen order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn label(&self) -> String {
        match &self.frame {
            Some(frame) => format!("{}.{}", frame.class_name, frame.method_name),
            None => ROOT_LABEL.to_string(),
        }
    }
}

pub const ROOT_LABEL: &str = "(root)";

/// Call tree folded from stack samples, stored as an arena.
#[derive(Debug, Clone, PartialEq)]
pub struct FlameGraph {
    nodes: Vec<FlameNode>,
}

impl Default for FlameGraph {
    fn default() -> Self {
        Self {
            nodes: vec![FlameNode::new(None, None, 0)],
        }
    }
}

/// Nested, serialisable view of a [`FlameGraph`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlameTree {
    pub name: String,
    pub package_name: String,
    pub value: u64,
    pub children: Vec<FlameTree>,
}

impl FlameGraph {
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &FlameNode {
        &self.nodes[id.0]
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = &FlameNode> + '_ {
        self.nodes[id.0].children.iter().map(|c| &self.nodes[c.0])
    }

    /// Child of `id` for `frame`, if that call path was sampled.
    pub fn child(&self, id: NodeId, frame: &Frame) -> Option<NodeId> {
        self.nodes[id.0].index.get(frame).copied()
    }

    /// Follows `path` (root-first) from the root.
    pub fn find(&self, path: &[Frame]) -> Option<NodeId> {
        path.iter()
            .try_fold(self.root(), |current, frame| self.child(current, frame))
    }

    pub fn total_samples(&self) -> u64 {
        self.nodes[0].sample_count
    }

    /// Samples that ended exactly at this node.
    pub fn self_count(&self, id: NodeId) -> u64 {
        let node = &self.nodes[id.0];
        let below: u64 = self.children(id).map(|c| c.sample_count).sum();
        node.sample_count.saturating_sub(below)
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total_samples() == 0
    }

    /// Deepest frame level; 0 when nothing was sampled.
    pub fn depth(&self) -> usize {
        self.nodes.iter().map(|n| n.depth).max().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &FlameNode)> + '_ {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// Collapsed-stack lines, `a;b;c count`, one per path that has self
    /// samples, in depth-first order.
    pub fn folded(&self) -> Vec<String> {
        let mut lines = Vec::new();
        let mut path = Vec::new();
        self.fold_into(self.root(), &mut path, &mut lines);
        lines
    }

    /// Writes [`folded`](Self::folded) lines to `path`, newline terminated,
    /// in the format `flamegraph.pl` and inferno read.
    pub fn write_folded(&self, path: &Path) -> crate::error::Result<()> {
        let mut text = self.folded().join("\n");
        if !text.is_empty() {
            text.push('\n');
        }
        std::fs::write(path, text)?;
        Ok(())
    }

    fn fold_into(&self, id: NodeId, path: &mut Vec<String>, lines: &mut Vec<String>) {
        let node = &self.nodes[id.0];
        if let Some(frame) = &node.frame {
            path.push(frame.to_string());
        }

        let own = self.self_count(id);
        if own > 0 && !path.is_empty() {
            lines.push(format!("{} {}", path.join(";"), own));
        }
        for child in &node.children {
            self.fold_into(*child, path, lines);
        }

        if node.frame.is_some() {
            path.pop();
        }
    }

    pub fn to_tree(&self) -> FlameTree {
        self.subtree(self.root())
    }

    fn subtree(&self, id: NodeId) -> FlameTree {
        let node = &self.nodes[id.0];
        FlameTree {
            name: node.label(),
            package_name: node
                .frame
                .as_ref()
                .map(|f| f.package_name.clone())
                .unwrap_or_default(),
            value: node.sample_count,
            children: node.children.iter().map(|c| self.subtree(*c)).collect(),
        }
    }

    fn child_or_insert(&mut self, parent: NodeId, frame: &Frame) -> NodeId {
        if let Some(id) = self.nodes[parent.0].index.get(frame) {
            return *id;
        }

        let id = NodeId(self.nodes.len());
        let depth = self.nodes[parent.0].depth + 1;
        self.nodes
            .push(FlameNode::new(Some(frame.clone()), Some(parent), depth));
        let parent_node = &mut self.nodes[parent.0];
        parent_node.children.push(id);
        parent_node.index.insert(frame.clone(), id);
        id
    }
}

impl Serialize for FlameGraph {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_tree().serialize(serializer)
    }
}

/// Folds stack samples root-to-leaf into a [`FlameGraph`].
#[derive(Debug, Default)]
pub struct FlameGraphBuilder {
    graph: FlameGraph,
}

impl FlameGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one sample; frameless samples are ignored.
    pub fn add(&mut self, sample: &StackSample) {
        if sample.frames.is_empty() {
            return;
        }

        let mut current = self.graph.root();
        self.graph.nodes[current.0].sample_count += 1;

        for frame in sample.frames.iter().rev() {
            current = self.graph.child_or_insert(current, frame);
            self.graph.nodes[current.0].sample_count += 1;
        }
    }

    pub fn build(self) -> FlameGraph {
        self.graph
    }

    pub fn from_samples(samples: &[StackSample]) -> FlameGraph {
        let mut builder = Self::new();
        for sample in samples {
            builder.add(sample);
        }
        builder.build()
    }
}
