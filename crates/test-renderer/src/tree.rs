use std::rc::Rc;

use slotmap::SlotMap;
use smol_str::SmolStr;
use tracing::{debug, span::EnteredSpan, trace};

use crate::{
    config::{ContainerConfig, NodeDescriptor},
    context::HostContext,
    error::RendererError,
    node::{Container, Instance, Node, NodeId, OpaqueHandle, Props, TextInstance},
    registry::{MockNode, MockRegistry},
};

/// Arena holding one container and every live node created for it.
///
/// A removed subtree stays in the arena until the driver hands it to
/// [`HostTree::free_subtree`]; after that its ids resolve to nothing.
#[derive(Debug)]
pub struct HostTree {
    pub(crate) nodes: SlotMap<NodeId, Node>,
    container: NodeId,
    config: Rc<ContainerConfig>,
    mocks: MockRegistry,
    /// Ids freed since the last commit started.
    freed: Vec<NodeId>,
    pub(crate) commit_span: Option<EnteredSpan>,
}

impl Default for HostTree {
    fn default() -> Self {
        Self::new(ContainerConfig::default())
    }
}

impl HostTree {
    pub fn new(config: ContainerConfig) -> Self {
        let config = Rc::new(config);
        let mut nodes = SlotMap::default();
        let container = nodes.insert(Node::Container(Container {
            children: Vec::new(),
            config: Rc::clone(&config),
        }));

        Self {
            nodes,
            container,
            config,
            mocks: MockRegistry::default(),
            freed: Vec::new(),
            commit_span: None,
        }
    }

    pub fn container(&self) -> NodeId {
        self.container
    }

    pub fn config(&self) -> &Rc<ContainerConfig> {
        &self.config
    }

    /// Number of nodes in the arena, the container included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(node_id)
    }

    pub fn parent(&self, node_id: NodeId) -> Option<NodeId> {
        self.nodes.get(node_id).and_then(Node::parent)
    }

    pub fn children(&self, node_id: NodeId) -> &[NodeId] {
        self.nodes.get(node_id).map_or(&[], Node::children)
    }

    /// Children that are not hidden, in sibling order.
    pub fn visible_children(&self, node_id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(node_id)
            .iter()
            .copied()
            .filter(|child| self.nodes.get(*child).is_some_and(|node| !node.is_hidden()))
    }

    pub fn create_instance(&mut self, element_type: &str, props: Props, handle: OpaqueHandle) -> NodeId {
        let node_id = self.nodes.insert(Node::Instance(Instance {
            element_type: element_type.into(),
            props,
            children: Vec::new(),
            parent: None,
            hidden: false,
            config: Rc::clone(&self.config),
            handle,
        }));
        trace!(?node_id, element_type, "create instance");
        node_id
    }

    pub fn create_text_instance(&mut self, text: &str, context: &HostContext) -> Result<NodeId, RendererError> {
        context.validate_text(text)?;

        let node_id = self.nodes.insert(Node::Text(TextInstance {
            text: text.to_string(),
            parent: None,
            hidden: false,
        }));
        trace!(?node_id, text, "create text instance");
        Ok(node_id)
    }

    /// Moves `child` to the end of `parent`'s children, detaching it from wherever it was.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if !self.can_adopt(parent, child) {
            return;
        }

        self.detach(child);
        if let Some(children) = self.nodes.get_mut(parent).and_then(Node::children_mut) {
            children.push(child);
        }
        self.set_parent(child, Some(parent));
        trace!(?parent, ?child, "append child");
    }

    /// Moves `child` into `parent` right before `before`.
    ///
    /// Falls back to appending when `before` is not a child of `parent`.
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, before: NodeId) {
        if child == before {
            return;
        }
        if !self.can_adopt(parent, child) {
            return;
        }

        self.detach(child);
        if let Some(children) = self.nodes.get_mut(parent).and_then(Node::children_mut) {
            match children.iter().position(|id| *id == before) {
                Some(index) => children.insert(index, child),
                None => {
                    debug!(?parent, ?before, "insert before a node that is not a child, appending");
                    children.push(child);
                }
            }
        }
        self.set_parent(child, Some(parent));
        trace!(?parent, ?child, ?before, "insert before");
    }

    /// Removes `child` from `parent`. Descendants of `child` are left as they are.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) {
        let removed = self
            .nodes
            .get_mut(parent)
            .and_then(Node::children_mut)
            .and_then(|children| {
                children
                    .iter()
                    .position(|id| *id == child)
                    .map(|index| children.remove(index))
            })
            .is_some();

        if !removed {
            debug!(?parent, ?child, "remove of a node that is not a child, ignoring");
            return;
        }

        if self.parent(child) == Some(parent) {
            self.set_parent(child, None);
        }
        trace!(?parent, ?child, "remove child");
    }

    /// Detaches every direct child of the container at once.
    pub fn clear_container(&mut self) {
        let children = match self.nodes.get_mut(self.container).and_then(Node::children_mut) {
            Some(children) => std::mem::take(children),
            None => return,
        };

        for child in &children {
            self.set_parent(*child, None);
        }
        trace!(count = children.len(), "clear container");
    }

    /// Drops `node_id` and everything below it from the arena, detaching it first
    /// if it is still attached. The container is never freed.
    pub fn free_subtree(&mut self, node_id: NodeId) {
        if node_id == self.container || !self.nodes.contains_key(node_id) {
            debug!(?node_id, "free of the container or of a freed node, ignoring");
            return;
        }

        self.detach(node_id);
        let mut pending = vec![node_id];
        let mut count = 0;
        while let Some(id) = pending.pop() {
            if let Some(node) = self.nodes.remove(id) {
                pending.extend_from_slice(node.children());
                self.mocks.remove_node(id);
                self.freed.push(id);
                count += 1;
            }
        }
        trace!(?node_id, count, "free subtree");
    }

    /// Ids freed since the last call, for callers that keep per-node caches.
    pub(crate) fn take_freed(&mut self) -> Vec<NodeId> {
        std::mem::take(&mut self.freed)
    }

    pub(crate) fn begin_commit(&mut self, span: EnteredSpan) {
        self.freed.clear();
        self.commit_span = Some(span);
    }

    /// Toggles the node's own hidden flag. Descendants are not touched.
    pub fn set_hidden(&mut self, node_id: NodeId, hidden: bool) {
        match self.nodes.get_mut(node_id) {
            Some(Node::Instance(instance)) => instance.hidden = hidden,
            Some(Node::Text(text)) => text.hidden = hidden,
            Some(Node::Container(_)) | None => {
                debug!(?node_id, hidden, "visibility change on a node that cannot be hidden, ignoring");
                return;
            }
        }
        trace!(?node_id, hidden, "set hidden");
    }

    pub fn commit_text_update(&mut self, node_id: NodeId, new_text: &str) {
        match self.nodes.get_mut(node_id) {
            Some(Node::Text(text)) => {
                text.text = new_text.to_string();
                trace!(?node_id, new_text, "commit text update");
            }
            _ => debug!(?node_id, "text update on a node that is not text, ignoring"),
        }
    }

    pub fn commit_update(&mut self, node_id: NodeId, element_type: &str, props: Props, handle: OpaqueHandle) {
        match self.nodes.get_mut(node_id) {
            Some(Node::Instance(instance)) => {
                instance.element_type = SmolStr::from(element_type);
                instance.props = props;
                instance.handle = handle;
                trace!(?node_id, element_type, "commit update");
            }
            _ => debug!(?node_id, "update on a node that is not an instance, ignoring"),
        }
    }

    /// Produces the mock exposed through a ref and remembers which node it came from.
    pub fn public_instance(&mut self, node_id: NodeId) -> Option<MockNode> {
        let Some(Node::Instance(instance)) = self.nodes.get(node_id) else {
            return None;
        };

        let descriptor = NodeDescriptor {
            element_type: instance.element_type.clone(),
            props: instance.props.clone(),
            key: None,
        };
        let mock = (instance.config.create_node_mock)(&descriptor);
        self.mocks.insert(&mock, node_id);
        Some(mock)
    }

    /// Resolves a mock previously returned by [`HostTree::public_instance`].
    pub fn instance_from_mock(&mut self, mock: &MockNode) -> Option<NodeId> {
        self.mocks
            .get(mock)
            .filter(|node_id| self.nodes.contains_key(*node_id))
    }

    /// Records an externally supplied object as another handle for `node_id`.
    pub fn register_scope(&mut self, scope: &MockNode, node_id: NodeId) {
        self.mocks.insert(scope, node_id);
    }

    pub fn handle(&self, node_id: NodeId) -> Option<&OpaqueHandle> {
        match self.nodes.get(node_id) {
            Some(Node::Instance(instance)) => Some(&instance.handle),
            _ => None,
        }
    }

    fn can_adopt(&self, parent: NodeId, child: NodeId) -> bool {
        let parent_ok = self.nodes.get(parent).is_some_and(|node| !node.is_text());
        let child_ok = self.nodes.get(child).is_some_and(|node| !node.is_container());

        if !parent_ok || !child_ok || self.is_ancestor_or_self(child, parent) {
            debug!(?parent, ?child, "invalid attachment, ignoring");
            return false;
        }

        true
    }

    fn is_ancestor_or_self(&self, ancestor: NodeId, node_id: NodeId) -> bool {
        let mut current = Some(node_id);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    fn detach(&mut self, child: NodeId) {
        if let Some(old_parent) = self.parent(child) {
            if let Some(children) = self.nodes.get_mut(old_parent).and_then(Node::children_mut) {
                children.retain(|id| *id != child);
            }
            self.set_parent(child, None);
        }
    }

    fn set_parent(&mut self, child: NodeId, parent: Option<NodeId>) {
        if let Some(node) = self.nodes.get_mut(child) {
            node.set_parent(parent);
        }
    }
}
