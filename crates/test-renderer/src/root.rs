use std::rc::Rc;

use tracing::debug;

use crate::{
    config::RootOptions,
    element::Element,
    error::RendererError,
    host_config::run_microtasks,
    host_element::{HostElement, Store},
    json::JsonNode,
    node::Node,
    query::QueryOptions,
    reconciler::{Reconciler, RefUpdate},
    registry::MockNode,
    tree::HostTree,
};

/// Creates an empty tree configured by `options`.
pub fn create_root(options: RootOptions) -> Root {
    let tree = HostTree::new(options.into());
    let reconciler = Reconciler::new(tree.container());
    Root {
        store: Store::new(tree),
        reconciler,
        unmounted: false,
    }
}

/// One rendered tree and the handle tests drive it through.
pub struct Root {
    store: Rc<Store>,
    reconciler: Reconciler,
    unmounted: bool,
}

impl Root {
    /// Renders `element` into the container, replacing the previous render.
    ///
    /// The tree is left as it was when rendering fails.
    pub fn render(&mut self, element: impl Into<Element>) -> Result<(), RendererError> {
        if self.unmounted {
            return Err(RendererError::RenderAfterUnmount);
        }

        let element = element.into();
        debug!("render");
        let rendered = {
            let mut tree = self.store.tree.borrow_mut();
            self.reconciler.render(&mut *tree, &element)
        };
        self.store.collect_freed();
        invoke_refs(rendered?);
        run_microtasks();
        Ok(())
    }

    /// Removes everything rendered and retires the root. Calling it again does nothing.
    pub fn unmount(&mut self) {
        if self.unmounted {
            debug!("unmount of an unmounted root, ignoring");
            return;
        }

        debug!("unmount");
        let refs = {
            let mut tree = self.store.tree.borrow_mut();
            self.reconciler.unmount(&mut *tree)
        };
        self.unmounted = true;
        self.store.collect_freed();
        invoke_refs(refs);
        run_microtasks();
    }

    pub fn is_unmounted(&self) -> bool {
        self.unmounted
    }

    /// The container element, whose children are the top-level rendered nodes.
    pub fn container(&self) -> Result<HostElement, RendererError> {
        if self.unmounted {
            return Err(RendererError::AccessAfterUnmount("container"));
        }

        let container = self.store.tree.borrow().container();
        Ok(self.store.element(container))
    }

    /// The first top-level element.
    pub fn root(&self) -> Result<HostElement, RendererError> {
        if self.unmounted {
            return Err(RendererError::AccessAfterUnmount("root"));
        }

        let first = {
            let tree = self.store.tree.borrow();
            let first = *tree
                .children(tree.container())
                .first()
                .ok_or(RendererError::EmptyContainer)?;
            match tree.node(first) {
                Some(Node::Instance(_)) => first,
                Some(Node::Text(_)) | Some(Node::Container(_)) | None => return Err(RendererError::TextAsRoot),
            }
        };
        Ok(self.store.element(first))
    }

    /// Shorthand for querying the container.
    pub fn query<F>(&self, predicate: F, options: QueryOptions) -> Result<Vec<HostElement>, RendererError>
    where
        F: FnMut(&HostElement) -> bool,
    {
        Ok(self.container()?.query(predicate, options))
    }

    /// Snapshot of the whole container.
    pub fn to_json(&self) -> Result<Option<JsonNode>, RendererError> {
        Ok(self.container()?.to_json())
    }

    /// The element whose ref received `mock`, if it is still part of this tree.
    pub fn find_by_mock(&self, mock: &MockNode) -> Option<HostElement> {
        let node = {
            let mut tree = self.store.tree.borrow_mut();
            tree.instance_from_mock(mock)?
        };
        Some(self.store.element(node))
    }
}

fn invoke_refs(refs: Vec<RefUpdate>) {
    for update in refs {
        update.invoke();
    }
}
