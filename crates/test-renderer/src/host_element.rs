use std::{
    cell::{Ref, RefCell},
    fmt,
    rc::Rc,
};

use smol_str::SmolStr;

use crate::{
    json::{self, JsonNode},
    node::{Node, NodeId, OpaqueHandle, Props},
    query::{self, QueryNode, QueryOptions},
    registry::WrapperCache,
    tree::HostTree,
};

/// Everything a [`Root`](crate::Root) and the wrappers it hands out share.
#[derive(Debug)]
pub(crate) struct Store {
    pub(crate) tree: RefCell<HostTree>,
    wrappers: RefCell<WrapperCache<ElementInner>>,
}

impl Store {
    pub(crate) fn new(tree: HostTree) -> Rc<Self> {
        Rc::new(Self {
            tree: RefCell::new(tree),
            wrappers: RefCell::default(),
        })
    }

    /// The wrapper for `node`, the same object for as long as anyone holds it.
    pub(crate) fn element(self: &Rc<Self>, node: NodeId) -> HostElement {
        let inner = self.wrappers.borrow_mut().get_or_insert_with(node, || ElementInner {
            store: Rc::clone(self),
            node,
        });
        HostElement(inner)
    }

    /// Drops the cache entries of nodes the tree has freed.
    pub(crate) fn collect_freed(&self) {
        let freed = self.tree.borrow_mut().take_freed();
        let mut wrappers = self.wrappers.borrow_mut();
        for node in freed {
            wrappers.remove(node);
        }
    }

    #[cfg(test)]
    pub(crate) fn cached_wrappers(&self) -> usize {
        self.wrappers.borrow().len()
    }
}

#[derive(Debug)]
pub(crate) struct ElementInner {
    store: Rc<Store>,
    node: NodeId,
}

/// A rendered element or the container, as seen by tests.
///
/// Wrappers compare by identity: asking twice for the same node yields equal
/// values, and a wrapper keeps reading the node's latest committed state.
/// Once its node has been removed and freed, a wrapper reads as an empty
/// element without parent or children.
#[derive(Clone)]
pub struct HostElement(Rc<ElementInner>);

/// A visible child of a [`HostElement`].
#[derive(Debug, Clone, PartialEq)]
pub enum HostNode {
    Element(HostElement),
    Text(String),
}

impl HostNode {
    pub fn as_element(&self) -> Option<&HostElement> {
        match self {
            HostNode::Element(element) => Some(element),
            HostNode::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            HostNode::Element(_) => None,
            HostNode::Text(text) => Some(text),
        }
    }
}

impl HostElement {
    fn tree(&self) -> Ref<'_, HostTree> {
        self.0.store.tree.borrow()
    }

    /// The element type; the configured container label for the container.
    pub fn element_type(&self) -> SmolStr {
        match self.tree().node(self.0.node) {
            Some(Node::Instance(instance)) => instance.element_type.clone(),
            Some(Node::Container(container)) => container.config.container_type_label.clone(),
            Some(Node::Text(_)) | None => SmolStr::default(),
        }
    }

    /// Props as last committed, `children` included. Empty for the container.
    pub fn props(&self) -> Props {
        match self.tree().node(self.0.node) {
            Some(Node::Instance(instance)) => instance.props.clone(),
            Some(Node::Container(_)) | Some(Node::Text(_)) | None => Props::new(),
        }
    }

    pub fn prop(&self, name: &str) -> Option<serde_json::Value> {
        match self.tree().node(self.0.node) {
            Some(Node::Instance(instance)) => instance.props.get(name).cloned(),
            Some(Node::Container(_)) | Some(Node::Text(_)) | None => None,
        }
    }

    /// `None` for the container and for detached elements.
    pub fn parent(&self) -> Option<HostElement> {
        let parent = self.tree().parent(self.0.node)?;
        Some(self.0.store.element(parent))
    }

    /// Visible children in sibling order.
    pub fn children(&self) -> Vec<HostNode> {
        let children = {
            let tree = self.tree();
            tree.visible_children(self.0.node)
                .filter_map(|child| match tree.node(child)? {
                    Node::Text(text) => Some(Err(text.text.clone())),
                    Node::Instance(_) => Some(Ok(child)),
                    Node::Container(_) => None,
                })
                .collect::<Vec<_>>()
        };

        children
            .into_iter()
            .map(|child| match child {
                Ok(node) => HostNode::Element(self.0.store.element(node)),
                Err(text) => HostNode::Text(text),
            })
            .collect()
    }

    pub fn is_container(&self) -> bool {
        self.tree().node(self.0.node).is_some_and(Node::is_container)
    }

    /// Snapshot of this element, `None` when it is hidden.
    pub fn to_json(&self) -> Option<JsonNode> {
        json::to_json(&self.tree(), self.0.node)
    }

    /// Descendants matching `predicate`, in tree order. See [`query::query_all`].
    pub fn query<F>(&self, mut predicate: F, options: QueryOptions) -> Vec<HostElement>
    where
        F: FnMut(&HostElement) -> bool,
    {
        query::query_all(self, &mut predicate, options)
    }

    /// This element and its descendants matching `predicate`; the container itself never matches.
    pub fn find_all<F>(&self, mut predicate: F, match_deepest_only: bool) -> Vec<HostElement>
    where
        F: FnMut(&HostElement) -> bool,
    {
        query::find_all(self, &mut predicate, match_deepest_only)
    }

    /// The handle the driver attached to this element.
    ///
    /// Unstable: its content is an implementation detail of the driver and may
    /// change at any time. `None` for the container.
    pub fn unstable_handle(&self) -> Option<OpaqueHandle> {
        self.tree().handle(self.0.node).cloned()
    }
}

impl QueryNode for HostElement {
    fn child_elements(&self) -> Vec<Self> {
        self.children()
            .into_iter()
            .filter_map(|child| match child {
                HostNode::Element(element) => Some(element),
                HostNode::Text(_) => None,
            })
            .collect()
    }

    fn is_container(&self) -> bool {
        HostElement::is_container(self)
    }
}

impl PartialEq for HostElement {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for HostElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostElement")
            .field("node", &self.0.node)
            .field("element_type", &self.element_type())
            .finish()
    }
}

/// Renders the element's snapshot in JSX form, or `null` when it is hidden.
impl fmt::Display for HostElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_json() {
            Some(json) => write!(f, "{json}"),
            None => f.write_str("null"),
        }
    }
}
