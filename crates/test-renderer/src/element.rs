//! Descriptions of what to render, consumed by [`Root::render`](crate::Root::render).
use std::{fmt, rc::Rc};

use smol_str::SmolStr;

use crate::{
    node::{CHILDREN_PROP, Props},
    registry::MockNode,
};

/// Receives the mock node when its element mounts and `None` when it is removed.
pub type RefCallback = Rc<dyn Fn(Option<MockNode>)>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ActivityMode {
    #[default]
    Visible,
    Hidden,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Host(HostComponent),
    Text(String),
    Fragment(Vec<Element>),
    /// Keeps its children mounted and only toggles whether they are shown.
    Activity { mode: ActivityMode, children: Vec<Element> },
}

impl Element {
    /// Shorthand for [`HostComponent::new`].
    pub fn host(element_type: impl Into<SmolStr>) -> HostComponent {
        HostComponent::new(element_type)
    }

    pub fn text(text: impl Into<String>) -> Self {
        Element::Text(text.into())
    }

    pub fn fragment(children: impl IntoIterator<Item = impl Into<Element>>) -> Self {
        Element::Fragment(children.into_iter().map(Into::into).collect())
    }

    pub fn activity(mode: ActivityMode, children: impl IntoIterator<Item = impl Into<Element>>) -> Self {
        Element::Activity {
            mode,
            children: children.into_iter().map(Into::into).collect(),
        }
    }

    pub(crate) fn key(&self) -> Option<&SmolStr> {
        match self {
            Element::Host(host) => host.key.as_ref(),
            Element::Text(_) | Element::Fragment(_) | Element::Activity { .. } => None,
        }
    }
}

/// A host element such as `<div id="a">…</div>`.
#[derive(Clone, Default)]
pub struct HostComponent {
    pub element_type: SmolStr,
    pub props: Props,
    pub key: Option<SmolStr>,
    pub children: Vec<Element>,
    pub ref_callback: Option<RefCallback>,
}

impl HostComponent {
    pub fn new(element_type: impl Into<SmolStr>) -> Self {
        Self {
            element_type: element_type.into(),
            ..Default::default()
        }
    }

    pub fn prop(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.props.insert(name.into(), value.into());
        self
    }

    pub fn props(mut self, props: Props) -> Self {
        self.props.extend(props);
        self
    }

    pub fn key(mut self, key: impl Into<SmolStr>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn child(mut self, child: impl Into<Element>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = impl Into<Element>>) -> Self {
        self.children.extend(children.into_iter().map(Into::into));
        self
    }

    pub fn with_ref(mut self, callback: impl Fn(Option<MockNode>) + 'static) -> Self {
        self.ref_callback = Some(Rc::new(callback));
        self
    }

    /// Props as the host sees them: a lone text child is mirrored into `children`.
    pub(crate) fn host_props(&self) -> Props {
        let mut props = self.props.clone();
        if let [Element::Text(text)] = self.children.as_slice() {
            props.insert(CHILDREN_PROP.to_string(), serde_json::Value::from(text.as_str()));
        }
        props
    }
}

impl PartialEq for HostComponent {
    fn eq(&self, other: &Self) -> bool {
        self.element_type == other.element_type
            && self.props == other.props
            && self.key == other.key
            && self.children == other.children
            && match (&self.ref_callback, &other.ref_callback) {
                (Some(a), Some(b)) => Rc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            }
    }
}

impl fmt::Debug for HostComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostComponent")
            .field("element_type", &self.element_type)
            .field("props", &self.props)
            .field("key", &self.key)
            .field("children", &self.children)
            .field("ref_callback", &self.ref_callback.is_some())
            .finish()
    }
}

impl From<HostComponent> for Element {
    fn from(host: HostComponent) -> Self {
        Element::Host(host)
    }
}

impl From<&str> for Element {
    fn from(text: &str) -> Self {
        Element::Text(text.to_string())
    }
}

impl From<String> for Element {
    fn from(text: String) -> Self {
        Element::Text(text)
    }
}

impl From<Vec<Element>> for Element {
    fn from(children: Vec<Element>) -> Self {
        Element::Fragment(children)
    }
}
