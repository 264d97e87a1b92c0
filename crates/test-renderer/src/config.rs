use std::{fmt, rc::Rc};

use serde::Deserialize;
use smol_str::SmolStr;

use crate::{node::Props, registry::MockNode};

/// What a node mock factory learns about the element it is mocking.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDescriptor {
    pub element_type: SmolStr,
    pub props: Props,
    /// Always `None`; the key is not forwarded to host nodes.
    pub key: Option<SmolStr>,
}

pub type NodeMockFactory = Rc<dyn Fn(&NodeDescriptor) -> MockNode>;

/// Options accepted by [`create_root`](crate::create_root).
///
/// The data fields can be loaded from JSON:
///
/// ```rust
/// use test_renderer::RootOptions;
///
/// let options: RootOptions =
///     serde_json::from_str(r#"{"textComponentWhitelist": ["Text"], "containerTypeLabel": "Root"}"#).unwrap();
/// assert_eq!(options.container_type_label.as_deref(), Some("Root"));
/// ```
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RootOptions {
    /// Element types inside which raw text may be rendered. `None` allows text anywhere.
    pub text_component_whitelist: Option<Vec<SmolStr>>,
    /// Names shown in diagnostics in place of the whitelist entries.
    pub public_text_component_names: Option<Vec<SmolStr>>,
    /// Type label of the synthetic element the container serializes to.
    pub container_type_label: Option<SmolStr>,
    #[serde(skip)]
    pub create_node_mock: Option<NodeMockFactory>,
}

impl RootOptions {
    pub fn with_text_components<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        self.text_component_whitelist = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_public_text_component_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        self.public_text_component_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_container_type_label(mut self, label: impl Into<SmolStr>) -> Self {
        self.container_type_label = Some(label.into());
        self
    }

    pub fn with_node_mock(mut self, factory: impl Fn(&NodeDescriptor) -> MockNode + 'static) -> Self {
        self.create_node_mock = Some(Rc::new(factory));
        self
    }
}

impl fmt::Debug for RootOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootOptions")
            .field("text_component_whitelist", &self.text_component_whitelist)
            .field("public_text_component_names", &self.public_text_component_names)
            .field("container_type_label", &self.container_type_label)
            .field("create_node_mock", &self.create_node_mock.is_some())
            .finish()
    }
}

/// Per-tree configuration, fixed for the lifetime of the tree.
pub struct ContainerConfig {
    pub text_components: Option<Vec<SmolStr>>,
    pub public_text_components: Option<Vec<SmolStr>>,
    pub container_type_label: SmolStr,
    pub create_node_mock: NodeMockFactory,
}

impl ContainerConfig {
    /// Names used when reporting a misplaced text node.
    pub fn display_text_components(&self) -> &[SmolStr] {
        match (&self.text_components, &self.public_text_components) {
            (Some(_), Some(public)) => public,
            (Some(internal), None) => internal,
            (None, _) => &[],
        }
    }

    pub fn is_text_component(&self, element_type: &str) -> bool {
        self.text_components
            .as_ref()
            .is_some_and(|names| names.iter().any(|name| name == element_type))
    }
}

impl Default for ContainerConfig {
    fn default() -> Self {
        RootOptions::default().into()
    }
}

impl From<RootOptions> for ContainerConfig {
    fn from(options: RootOptions) -> Self {
        Self {
            text_components: options.text_component_whitelist,
            public_text_components: options.public_text_component_names,
            container_type_label: options.container_type_label.unwrap_or_default(),
            create_node_mock: options
                .create_node_mock
                .unwrap_or_else(|| Rc::new(|_: &NodeDescriptor| MockNode::default())),
        }
    }
}

impl fmt::Debug for ContainerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerConfig")
            .field("text_components", &self.text_components)
            .field("public_text_components", &self.public_text_components)
            .field("container_type_label", &self.container_type_label)
            .finish_non_exhaustive()
    }
}
