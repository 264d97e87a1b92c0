//! `test-renderer` renders element trees into an in-memory host tree so they can be
//! inspected, queried and snapshotted without a real display.
//!
//! ## Examples
//!
//! ```rust
//! use test_renderer::{Element, QueryOptions, RootOptions, create_root};
//!
//! let mut root = create_root(RootOptions::default());
//! root.render(Element::host("div").prop("id", "greeting").child("Hello!")).unwrap();
//!
//! let container = root.container().unwrap();
//! assert_eq!(container.to_string(), "<>\n  <div\n    id=\"greeting\"\n  >\n    Hello!\n  </div>\n</>");
//!
//! let found = root
//!     .query(|element| element.prop("id").is_some(), QueryOptions::default())
//!     .unwrap();
//! assert_eq!(found, vec![root.root().unwrap()]);
//!
//! // Raw text is only allowed inside whitelisted components when a whitelist is set.
//! let mut native = create_root(RootOptions::default().with_text_components(["Text"]));
//! let err = native.render(Element::host("View").child("Hello!")).unwrap_err();
//! assert!(err.to_string().contains("within a <Text> component"));
//! ```
mod config;
mod context;
mod element;
mod error;
mod host_config;
mod host_element;
mod json;
mod node;
mod query;
mod reconciler;
mod registry;
mod root;
mod tree;

pub use config::{ContainerConfig, NodeDescriptor, NodeMockFactory, RootOptions};
pub use context::{HostContext, ROOT_CONTEXT_TYPE, format_component_list};
pub use element::{ActivityMode, Element, HostComponent, RefCallback};
pub use error::{ErrorKind, RendererError};
pub use host_config::{HostConfig, PublicInstance, Task, TimeoutHandle, run_microtasks};
pub use host_element::{HostElement, HostNode};
pub use json::{JsonElement, JsonNode, SNAPSHOT_TAG, to_json};
pub use node::{CHILDREN_PROP, Container, Instance, Node, NodeId, OpaqueHandle, Props, TextInstance};
pub use query::{QueryNode, QueryOptions, find_all, query_all};
pub use reconciler::FiberToken;
pub use registry::MockNode;
pub use root::{Root, create_root};
pub use tree::HostTree;
