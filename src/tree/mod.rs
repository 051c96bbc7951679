//! Metadata Tree
//!
//! Represents a hierarchy of named nodes assembled from metadata files.
//! Nodes inherit data from their parents, merge operator suffixes fold
//! child values into inherited ones, and `adjust` rules patch node data
//! based on an evaluation context.

pub mod discover;
pub mod loader;

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use regex::Regex;
use tracing::{debug, instrument};

use crate::context::{Context, Outcome};
use crate::error::{ContextError, Error, FilterError};
use crate::filter::{self, FilterOptions};
use crate::merge::merge_data;
use crate::value::{to_yaml, Map, Value};

/// Current metadata format version
pub const VERSION: u32 = 1;

/// Handle of a node within its tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Node assembly directives from the reserved `/` key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Directives {
    /// Inherit data from the parent node (default true)
    pub inherit: Option<bool>,
    /// Yield the node during default selection (default: leaves only)
    pub select: Option<bool>,
}

/// One point in the metadata tree
#[derive(Debug, Clone)]
pub struct Node {
    /// Absolute hierarchical name, `/` for the tree root
    pub name: String,
    /// Merged attribute data
    pub data: Map,
    /// Own data before inheritance and adjustments
    pub original_data: Map,
    /// Files which contributed to this node
    pub sources: Vec<PathBuf>,
    /// True once adjust rules have been applied
    pub adjusted: bool,
    raw_data: Option<Map>,
    children: IndexMap<String, NodeId>,
    parent: Option<NodeId>,
    directives: Directives,
    updated: bool,
}

impl Node {
    fn new(name: String, parent: Option<NodeId>) -> Node {
        Node {
            name,
            data: Map::new(),
            original_data: Map::new(),
            sources: Vec::new(),
            adjusted: false,
            raw_data: None,
            children: IndexMap::new(),
            parent,
            directives: Directives::default(),
            updated: false,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> impl Iterator<Item = (&str, NodeId)> {
        self.children.iter().map(|(name, id)| (name.as_str(), *id))
    }

    pub fn directives(&self) -> Directives {
        self.directives
    }

    /// Deep attribute lookup, `None` when any level is missing.
    ///
    /// `node.get(&["hardware", "memory", "size"])` is the safe equivalent
    /// of indexing nested mappings directly.
    pub fn get(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut current = self.data.get(*first)?;
        for key in rest {
            current = current.as_map()?.get(*key)?;
        }
        Some(current)
    }

    /// Last path segment of the node name.
    pub fn segment(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or_default()
    }
}

/// What to do when an adjust rule condition cannot be decided
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Undecided {
    /// Skip the rule and continue with the next one
    #[default]
    Skip,
    /// Abort the adjustment with an error
    Error,
}

/// Options for [`Tree::adjust`]
pub struct AdjustOptions<'a> {
    /// Node attribute holding the rules
    pub key: String,
    /// Behavior for undecided conditions
    pub undecided: Undecided,
    /// Extra rules appended to each node's own rules
    pub additional_rules: Vec<Value>,
    /// Callback returning the effective rule list for a node
    #[allow(clippy::type_complexity)]
    pub rule_filter: Option<&'a dyn Fn(&Node, Vec<Map>) -> Vec<Map>>,
}

impl Default for AdjustOptions<'_> {
    fn default() -> Self {
        AdjustOptions {
            key: String::from("adjust"),
            undecided: Undecided::Skip,
            additional_rules: Vec::new(),
            rule_filter: None,
        }
    }
}

/// Selection criteria for [`Tree::prune`], combined with logical AND
#[derive(Default)]
pub struct PruneOptions<'a> {
    /// Include branch nodes, not only leaves
    pub whole: bool,
    /// Sort children lexicographically during traversal
    pub sort: bool,
    /// Attribute names which must all be present
    pub keys: Vec<String>,
    /// Node name regular expressions, any must match
    pub names: Vec<String>,
    /// Advanced filter expressions, all must match
    pub filters: Vec<String>,
    /// Arbitrary predicates, all must hold
    #[allow(clippy::type_complexity)]
    pub conditions: Vec<Box<dyn Fn(&Node) -> bool + 'a>>,
    /// Source files, any must have contributed to the node
    pub sources: Vec<PathBuf>,
}

/// Metadata tree assembled from files or provided data
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
    root_path: Option<PathBuf>,
    version: u32,
}

impl Tree {
    fn empty() -> Tree {
        Tree {
            nodes: vec![Node::new(String::from("/"), None)],
            root_path: None,
            version: VERSION,
        }
    }

    /// Grow the metadata tree from a directory path.
    ///
    /// The tree root marker (`.fmf/version`) is searched among the
    /// ancestors of the given path, the whole tree under the root is
    /// assembled and inheritance applied.
    #[instrument]
    pub fn grow(path: impl AsRef<Path> + std::fmt::Debug) -> Result<Tree, Error> {
        let root = discover::find_root(path.as_ref())?;
        let version = discover::read_version(&root)?;
        let mut tree = Tree::empty();
        tree.root_path = Some(root.clone());
        tree.version = version;

        for file in discover::discover(&root)? {
            let data = loader::load(&file.path)?;
            let id = tree.ensure_node(&file.name);
            let node = tree.node_mut(id);
            node.sources.push(file.path.clone());
            node.raw_data = Some(data.clone());
            tree.update(id, Some(data))?;
        }
        tree.inherit()?;
        tree.prune_empty(tree.root_id());
        debug!(nodes = tree.nodes.len(), "Tree assembled");
        Ok(tree)
    }

    /// Build a tree from an in-memory mapping instead of a filesystem.
    pub fn from_data(data: Map) -> Result<Tree, Error> {
        let mut tree = Tree::empty();
        tree.update(tree.root_id(), Some(data))?;
        tree.inherit()?;
        Ok(tree)
    }

    /// Create a metadata tree root under the given path.
    pub fn init(path: &Path) -> Result<PathBuf, Error> {
        let root = std::path::absolute(path.join(".fmf"))?;
        if root.exists() {
            return Err(Error::File {
                path: root,
                message: String::from("already exists"),
            });
        }
        fs::create_dir_all(&root)?;
        fs::write(root.join("version"), format!("{VERSION}\n"))?;
        Ok(root)
    }

    /// Filesystem root of the tree, `None` for data-built trees.
    pub fn root_path(&self) -> Option<&Path> {
        self.root_path.as_deref()
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn root_id(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Find a node by its full name.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.climb(true).find(|&id| self.node(id).name == name)
    }

    /// Create and return an independent deep copy of the tree.
    pub fn copy(&self) -> Tree {
        self.clone()
    }

    fn ensure_child(&mut self, parent: NodeId, segment: &str) -> NodeId {
        if let Some(&existing) = self.node(parent).children.get(segment) {
            return existing;
        }
        let name = if self.node(parent).name == "/" {
            format!("/{segment}")
        } else {
            format!("{}/{segment}", self.node(parent).name)
        };
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(name, Some(parent)));
        self.node_mut(parent)
            .children
            .insert(segment.to_string(), id);
        id
    }

    /// Create the node chain for a hierarchical name, returning the leaf.
    fn ensure_node(&mut self, name: &str) -> NodeId {
        let mut current = self.root_id();
        for segment in name.split('/').filter(|segment| !segment.is_empty()) {
            current = self.ensure_child(current, segment);
        }
        current
    }

    /// Update node data, resolving scope keys and directives.
    fn update(&mut self, id: NodeId, data: Option<Map>) -> Result<(), Error> {
        // Even an empty update marks the node as defined, which keeps it
        // from being pruned as an empty directory
        self.node_mut(id).updated = true;
        let Some(mut data) = data else {
            return Ok(());
        };
        if let Some(directives) = data.shift_remove("/") {
            self.process_directives(id, directives)?;
        }
        for (key, value) in data {
            if let Some(name) = key.strip_prefix('/') {
                let (segment, rest) = match name.split_once('/') {
                    Some((segment, rest)) => (segment, Some(rest)),
                    None => (name, None),
                };
                if segment.is_empty() {
                    return Err(Error::General(format!(
                        "Invalid child key '{}' in '{}'.",
                        key,
                        self.node(id).name
                    )));
                }
                let child_data = match (rest, value) {
                    // Deeper nesting: wrap the remainder back into a key
                    (Some(rest), value) => {
                        let mut wrapped = Map::new();
                        wrapped.insert(format!("/{rest}"), value);
                        Some(wrapped)
                    }
                    (None, Value::Map(map)) => Some(map),
                    (None, Value::Null) => None,
                    (None, other) => {
                        return Err(Error::General(format!(
                            "Invalid data for child '{}' in '{}': expected a mapping, got a {}.",
                            key,
                            self.node(id).name,
                            other.kind()
                        )));
                    }
                };
                let child = self.ensure_child(id, segment);
                self.update(child, child_data)?;
            } else {
                self.node_mut(id).data.insert(key, value);
            }
        }
        Ok(())
    }

    fn process_directives(&mut self, id: NodeId, value: Value) -> Result<(), Error> {
        let node_name = self.node(id).name.clone();
        let directive_error = |message: String| Error::InvalidDirective {
            node: node_name.clone(),
            message,
        };
        let Some(map) = value.as_map() else {
            return Err(directive_error(format!(
                "should be a mapping, got a {}",
                value.kind()
            )));
        };
        let mut directives = self.node(id).directives;
        for (key, value) in map {
            let flag = || {
                value.as_bool().ok_or_else(|| {
                    directive_error(format!(
                        "'{}' should be a bool, got a {}",
                        key,
                        value.kind()
                    ))
                })
            };
            match key.as_str() {
                "inherit" => directives.inherit = Some(flag()?),
                "select" => directives.select = Some(flag()?),
                other => {
                    return Err(directive_error(format!("unknown directive '{other}'")));
                }
            }
        }
        self.node_mut(id).directives = directives;
        Ok(())
    }

    /// Apply inheritance: fold every node's own data into a copy of its
    /// parent's inherited data, top-down. Operator suffixes are resolved
    /// here, so after this pass no data key carries a suffix.
    fn inherit(&mut self) -> Result<(), Error> {
        let order: Vec<NodeId> = self.climb(true).collect();
        for id in order {
            let node = self.node(id);
            let inherit_enabled = node.directives.inherit != Some(false);
            let (base, parent_sources) = match node.parent {
                Some(parent) if inherit_enabled => {
                    let parent = self.node(parent);
                    (parent.data.clone(), parent.sources.clone())
                }
                _ => (Map::new(), Vec::new()),
            };
            let node = self.node_mut(id);
            node.original_data = node.data.clone();
            let own = std::mem::take(&mut node.data);
            let name = node.name.clone();
            let mut merged = base;
            merge_data(&mut merged, &own, &name)?;
            let node = self.node_mut(id);
            node.data = merged;
            if !parent_sources.is_empty() {
                let own_sources = std::mem::take(&mut node.sources);
                let mut sources = parent_sources;
                sources.extend(own_sources);
                node.sources = sources;
            }
            debug!(node = %name, "Data inherited");
        }
        Ok(())
    }

    /// Remove child nodes which have no children and never received data
    /// (directories without any metadata).
    fn prune_empty(&mut self, id: NodeId) -> bool {
        let entries: Vec<(String, NodeId)> = self
            .node(id)
            .children
            .iter()
            .map(|(name, id)| (name.clone(), *id))
            .collect();
        for (name, child) in entries {
            if !self.prune_empty(child) {
                debug!(node = %self.node(child).name, "Empty node removed");
                self.node_mut(id).children.shift_remove(&name);
            }
        }
        let node = self.node(id);
        node.parent.is_none() || node.updated || !node.children.is_empty()
    }

    /// Climb through the tree, yielding leaves or, with `whole`, every
    /// node. The `select` directive overrides the default selection.
    pub fn climb(&self, whole: bool) -> Climb<'_> {
        self.climb_from(self.root_id(), whole, false)
    }

    /// Climb with explicit starting node and child ordering.
    pub fn climb_from(&self, id: NodeId, whole: bool, sort: bool) -> Climb<'_> {
        Climb {
            tree: self,
            stack: vec![id],
            whole,
            sort,
        }
    }

    /// Filter tree nodes based on the given criteria.
    pub fn prune(&self, options: &PruneOptions) -> Result<Vec<NodeId>, Error> {
        let names: Vec<Regex> = options
            .names
            .iter()
            .map(|name| {
                Regex::new(name).map_err(|error| {
                    Error::Filter(FilterError::InvalidPattern {
                        pattern: name.clone(),
                        source: error,
                    })
                })
            })
            .collect::<Result<_, _>>()?;
        let sources: Vec<PathBuf> = options
            .sources
            .iter()
            .map(|source| std::path::absolute(source).map_err(Error::Io))
            .collect::<Result<_, _>>()?;
        let filter_options = FilterOptions {
            sensitive: true,
            regexp: true,
        };

        let mut selected = Vec::new();
        'nodes: for id in self.climb_from(self.root_id(), options.whole, options.sort) {
            let node = self.node(id);
            for key in &options.keys {
                if !node.data.contains_key(key) {
                    continue 'nodes;
                }
            }
            if !names.is_empty() && !names.iter().any(|regex| regex.is_match(&node.name)) {
                continue;
            }
            if !sources.is_empty() && !node.sources.iter().any(|source| sources.contains(source))
            {
                continue;
            }
            for filter in &options.filters {
                if !filter::matches(filter, &node.data, Some(&node.name), &filter_options)? {
                    continue 'nodes;
                }
            }
            for condition in &options.conditions {
                if !condition(node) {
                    continue 'nodes;
                }
            }
            selected.push(id);
        }
        Ok(selected)
    }

    /// Adjust tree data based on the provided context and per-node rules.
    #[instrument(skip(self, context, options))]
    pub fn adjust(&mut self, context: &Context, options: &AdjustOptions) -> Result<(), Error> {
        let order: Vec<NodeId> = self.climb(true).collect();
        for id in order {
            self.adjust_node(id, context, options)?;
        }
        Ok(())
    }

    fn adjust_node(
        &mut self,
        id: NodeId,
        context: &Context,
        options: &AdjustOptions,
    ) -> Result<(), Error> {
        let name = self.node(id).name.clone();

        let mut rules: Vec<Map> = match self.node(id).data.get(&options.key).cloned() {
            None => Vec::new(),
            Some(Value::Map(rule)) => vec![rule],
            Some(Value::List(items)) => items
                .into_iter()
                .map(|item| match item {
                    Value::Map(rule) => Ok(rule),
                    other => Err(Error::General(format!(
                        "Adjust rule should be a dictionary, got a {}.",
                        other.kind()
                    ))),
                })
                .collect::<Result<_, _>>()?,
            Some(other) => {
                return Err(Error::General(format!(
                    "Invalid adjust rule format in '{}': should be a dictionary \
                     or a list of dictionaries, got a {}.",
                    name,
                    other.kind()
                )));
            }
        };
        for extra in &options.additional_rules {
            match extra {
                Value::Map(rule) => rules.push(rule.clone()),
                other => {
                    return Err(Error::General(format!(
                        "Adjust rule should be a dictionary, got a {}.",
                        other.kind()
                    )));
                }
            }
        }
        if let Some(rule_filter) = options.rule_filter {
            rules = rule_filter(self.node(id), rules);
        }

        for mut rule in rules {
            let condition = rule.shift_remove("when");
            let continue_rule = match rule.shift_remove("continue") {
                None => true,
                Some(Value::Bool(flag)) => flag,
                Some(other) => {
                    return Err(Error::General(format!(
                        "The 'continue' value should be bool, got a {}.",
                        other.kind()
                    )));
                }
            };
            rule.shift_remove("because");

            let (outcome, condition_text) = match condition {
                // Missing 'when' means an always enabled rule
                None => (Outcome::True, String::from("true")),
                Some(Value::Bool(flag)) => (Outcome::from(flag), flag.to_string()),
                Some(Value::String(text)) => (context.matches(&text)?, text),
                Some(other) => {
                    return Err(Error::General(format!(
                        "The 'when' value should be a string, got a {}.",
                        other.kind()
                    )));
                }
            };
            match outcome {
                Outcome::True => {
                    debug!(node = %name, rule = %condition_text, "Adjust rule applied");
                    let node = self.node_mut(id);
                    let mut data = std::mem::take(&mut node.data);
                    merge_data(&mut data, &rule, &name)?;
                    self.node_mut(id).data = data;
                    // First matching rule wins unless continue is set
                    if !continue_rule {
                        break;
                    }
                }
                Outcome::False => {}
                Outcome::CannotDecide => match options.undecided {
                    Undecided::Skip => {}
                    Undecided::Error => {
                        return Err(Error::Context(ContextError::CannotDecide(condition_text)));
                    }
                },
            }
        }
        self.node_mut(id).adjusted = true;
        Ok(())
    }

    /// Modify the raw data backing a node and store it to disk.
    ///
    /// The closest file-backed ancestor provides the raw document;
    /// virtual hierarchy levels are created on demand. Changes go to the
    /// last source file the data was read from. Note that the in-memory
    /// tree is not re-assembled, grow the tree again to observe the edit.
    pub fn modify<F>(&mut self, id: NodeId, edit: F) -> Result<PathBuf, Error>
    where
        F: FnOnce(&mut Map),
    {
        let mut hierarchy: Vec<String> = Vec::new();
        let mut current = id;
        loop {
            let node = self.node(current);
            if node
                .raw_data
                .as_ref()
                .map(|raw| !raw.is_empty())
                .unwrap_or(false)
            {
                break;
            }
            match node.parent {
                Some(parent) => {
                    hierarchy.insert(0, format!("/{}", node.segment()));
                    current = parent;
                }
                None => {
                    return Err(Error::General(String::from(
                        "No raw data found, does the tree grow on a filesystem?",
                    )));
                }
            }
        }
        let source = self.node(current).sources.last().cloned().ok_or_else(|| {
            Error::General(format!(
                "No source file recorded for '{}'.",
                self.node(current).name
            ))
        })?;

        let raw = self
            .node_mut(current)
            .raw_data
            .as_mut()
            .expect("raw data checked above");
        let mut target: &mut Map = raw;
        for key in &hierarchy {
            let entry = target
                .entry(key.clone())
                .or_insert_with(|| Value::Map(Map::new()));
            if entry.is_null() {
                *entry = Value::Map(Map::new());
            }
            target = entry
                .as_map_mut()
                .ok_or_else(|| Error::General(format!("Raw data under '{key}' is not a mapping.")))?;
        }
        edit(target);

        let raw = self
            .node(current)
            .raw_data
            .as_ref()
            .expect("raw data checked above");
        fs::write(&source, to_yaml(raw)?)?;
        Ok(source)
    }
}

/// Depth-first tree traversal, see [`Tree::climb`]
pub struct Climb<'a> {
    tree: &'a Tree,
    stack: Vec<NodeId>,
    whole: bool,
    sort: bool,
}

impl Iterator for Climb<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        while let Some(id) = self.stack.pop() {
            let node = self.tree.node(id);
            let mut children: Vec<(&String, NodeId)> =
                node.children.iter().map(|(name, id)| (name, *id)).collect();
            if self.sort {
                children.sort_by(|a, b| a.0.cmp(b.0));
            }
            for (_, child) in children.into_iter().rev() {
                self.stack.push(child);
            }
            let selected = if self.whole {
                true
            } else if node.is_leaf() {
                node.directives.select != Some(false)
            } else {
                node.directives.select == Some(true)
            };
            if selected {
                return Some(id);
            }
        }
        None
    }
}
