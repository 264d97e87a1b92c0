use std::{any::Any, fmt, rc::Rc};

use smol_str::SmolStr;

use crate::config::ContainerConfig;

slotmap::new_key_type! { pub struct NodeId; }

/// Props of a host element. The `children` key, when present, mirrors the
/// element's text content and is stripped from snapshots.
pub type Props = serde_json::Map<String, serde_json::Value>;

pub const CHILDREN_PROP: &str = "children";

/// Token handed in by the driver for every host element.
///
/// The tree stores and returns it verbatim and never looks inside. Callers that
/// know what the driver put in can use [`OpaqueHandle::downcast_ref`].
#[derive(Clone)]
pub struct OpaqueHandle(Rc<dyn Any>);

impl OpaqueHandle {
    pub fn new<T: Any>(value: T) -> Self {
        Self(Rc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for OpaqueHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OpaqueHandle").field(&Rc::as_ptr(&self.0)).finish()
    }
}

#[derive(Debug, Clone)]
pub enum Node {
    Container(Container),
    Instance(Instance),
    Text(TextInstance),
}

#[derive(Debug, Clone)]
pub struct Container {
    pub children: Vec<NodeId>,
    pub config: Rc<ContainerConfig>,
}

#[derive(Debug, Clone)]
pub struct Instance {
    pub element_type: SmolStr,
    pub props: Props,
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
    pub hidden: bool,
    pub config: Rc<ContainerConfig>,
    pub handle: OpaqueHandle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextInstance {
    pub text: String,
    pub parent: Option<NodeId>,
    pub hidden: bool,
}

impl Node {
    pub fn parent(&self) -> Option<NodeId> {
        match self {
            Node::Container(_) => None,
            Node::Instance(instance) => instance.parent,
            Node::Text(text) => text.parent,
        }
    }

    pub(crate) fn set_parent(&mut self, parent: Option<NodeId>) {
        match self {
            Node::Container(_) => {}
            Node::Instance(instance) => instance.parent = parent,
            Node::Text(text) => text.parent = parent,
        }
    }

    /// Raw children in sibling order, hidden ones included.
    pub fn children(&self) -> &[NodeId] {
        match self {
            Node::Container(container) => &container.children,
            Node::Instance(instance) => &instance.children,
            Node::Text(_) => &[],
        }
    }

    pub(crate) fn children_mut(&mut self) -> Option<&mut Vec<NodeId>> {
        match self {
            Node::Container(container) => Some(&mut container.children),
            Node::Instance(instance) => Some(&mut instance.children),
            Node::Text(_) => None,
        }
    }

    pub fn is_hidden(&self) -> bool {
        match self {
            Node::Container(_) => false,
            Node::Instance(instance) => instance.hidden,
            Node::Text(text) => text.hidden,
        }
    }

    #[inline(always)]
    pub fn is_container(&self) -> bool {
        matches!(self, Node::Container(_))
    }

    #[inline(always)]
    pub fn is_text(&self) -> bool {
        matches!(self, Node::Text(_))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn instance(hidden: bool) -> Node {
        Node::Instance(Instance {
            element_type: "div".into(),
            props: Props::new(),
            children: Vec::new(),
            parent: None,
            hidden,
            config: Rc::new(ContainerConfig::default()),
            handle: OpaqueHandle::new(()),
        })
    }

    fn text(hidden: bool) -> Node {
        Node::Text(TextInstance {
            text: "Hello".to_string(),
            parent: None,
            hidden,
        })
    }

    #[rstest]
    #[case(instance(false), false)]
    #[case(instance(true), true)]
    #[case(text(false), false)]
    #[case(text(true), true)]
    fn test_is_hidden(#[case] node: Node, #[case] expected: bool) {
        assert_eq!(node.is_hidden(), expected);
    }

    #[test]
    fn test_text_has_no_children() {
        let mut node = text(false);
        assert!(node.children().is_empty());
        assert!(node.children_mut().is_none());
    }

    #[test]
    fn test_container_ignores_parent() {
        let mut node = Node::Container(Container {
            children: Vec::new(),
            config: Rc::new(ContainerConfig::default()),
        });
        node.set_parent(Some(NodeId::default()));
        assert_eq!(node.parent(), None);
    }

    #[test]
    fn test_opaque_handle_downcast() {
        let handle = OpaqueHandle::new(42_u32);
        assert_eq!(handle.downcast_ref::<u32>(), Some(&42));
        assert_eq!(handle.downcast_ref::<String>(), None);
        assert!(handle.ptr_eq(&handle.clone()));
        assert!(!handle.ptr_eq(&OpaqueHandle::new(42_u32)));
    }
}
