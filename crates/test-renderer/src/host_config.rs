//! The callback protocol a reconciliation engine drives the host tree through.
//!
//! [`HostConfig`] is what an engine calls into; [`HostTree`] is the mutation-mode
//! implementation used by [`Root`](crate::Root). Every node is addressed by
//! [`NodeId`], containers included, so the container variants of each call only
//! differ in their name.
//!
//! Timeouts are spawned on the current tokio [`LocalSet`](tokio::task::LocalSet);
//! microtasks are queued on the calling thread and run by [`run_microtasks`].
use std::{cell::RefCell, collections::VecDeque, time::Duration};

use tokio::task::AbortHandle;
use tracing::{debug, debug_span, trace};

use crate::{
    context::HostContext,
    error::RendererError,
    node::{Node, NodeId, OpaqueHandle, Props},
    registry::MockNode,
    tree::HostTree,
};

/// What a ref resolves to.
#[derive(Debug, Clone)]
pub enum PublicInstance {
    Mock(MockNode),
    Text(NodeId),
}

/// Handle returned by [`HostConfig::schedule_timeout`].
#[derive(Debug, Clone, Default)]
pub struct TimeoutHandle(Option<AbortHandle>);

impl TimeoutHandle {
    /// A value that never refers to a scheduled timeout.
    pub fn none() -> Self {
        Self(None)
    }

    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }
}

pub type Task = Box<dyn FnOnce() + 'static>;

thread_local! {
    static MICROTASKS: RefCell<VecDeque<Task>> = RefCell::default();
}

/// Runs the microtasks queued on this thread, including any they queue in turn.
///
/// Returns how many ran. [`Root`](crate::Root) calls this after every render and unmount.
pub fn run_microtasks() -> usize {
    let mut count = 0;
    while let Some(task) = MICROTASKS.with_borrow_mut(VecDeque::pop_front) {
        task();
        count += 1;
    }
    if count > 0 {
        trace!(count, "run microtasks");
    }
    count
}

pub trait HostConfig {
    /// Nodes are mutated in place rather than cloned on every change.
    const SUPPORTS_MUTATION: bool = true;
    const SUPPORTS_PERSISTENCE: bool = false;
    const SUPPORTS_HYDRATION: bool = false;
    const SUPPORTS_MICROTASKS: bool = true;
    const IS_PRIMARY_RENDERER: bool = true;

    fn get_root_host_context(&self, container: NodeId) -> HostContext;

    fn get_child_host_context(&self, parent: &HostContext, element_type: &str) -> HostContext;

    fn create_instance(
        &mut self,
        element_type: &str,
        props: Props,
        root_container: NodeId,
        host_context: &HostContext,
        handle: OpaqueHandle,
    ) -> NodeId;

    fn create_text_instance(
        &mut self,
        text: &str,
        root_container: NodeId,
        host_context: &HostContext,
    ) -> Result<NodeId, RendererError>;

    fn append_initial_child(&mut self, parent: NodeId, child: NodeId);

    fn finalize_initial_children(
        &mut self,
        _instance: NodeId,
        _element_type: &str,
        _props: &Props,
        _host_context: &HostContext,
    ) -> bool {
        false
    }

    fn should_set_text_content(&self, _element_type: &str, _props: &Props) -> bool {
        false
    }

    fn append_child(&mut self, parent: NodeId, child: NodeId);

    fn append_child_to_container(&mut self, container: NodeId, child: NodeId);

    fn insert_before(&mut self, parent: NodeId, child: NodeId, before: NodeId);

    fn insert_in_container_before(&mut self, container: NodeId, child: NodeId, before: NodeId);

    fn remove_child(&mut self, parent: NodeId, child: NodeId);

    fn remove_child_from_container(&mut self, container: NodeId, child: NodeId);

    fn clear_container(&mut self, container: NodeId);

    fn hide_instance(&mut self, instance: NodeId);

    fn unhide_instance(&mut self, instance: NodeId, props: &Props);

    fn hide_text_instance(&mut self, text_instance: NodeId);

    fn unhide_text_instance(&mut self, text_instance: NodeId, text: &str);

    fn commit_text_update(&mut self, text_instance: NodeId, old_text: &str, new_text: &str);

    fn commit_update(
        &mut self,
        instance: NodeId,
        element_type: &str,
        old_props: &Props,
        new_props: Props,
        handle: OpaqueHandle,
    );

    fn commit_mount(&mut self, _instance: NodeId, _element_type: &str, _props: &Props, _handle: &OpaqueHandle) {}

    fn reset_text_content(&mut self, _instance: NodeId) {}

    fn get_public_instance(&mut self, instance: NodeId) -> PublicInstance;

    fn get_instance_from_node(&mut self, node: &MockNode) -> Option<OpaqueHandle>;

    fn prepare_scope_update(&mut self, scope: &MockNode, instance: NodeId);

    fn get_instance_from_scope(&mut self, scope: &MockNode) -> Option<NodeId>;

    /// Marks the start of a batch of mutations. Must not block.
    fn prepare_for_commit(&mut self, container: NodeId);

    /// Marks the end of the batch opened by [`HostConfig::prepare_for_commit`].
    fn reset_after_commit(&mut self, container: NodeId);

    fn prepare_portal_mount(&mut self, _container: NodeId) {}

    /// Called once for the root of every removed subtree after it left the tree.
    /// Nothing in that subtree is used again.
    fn detach_deleted_instance(&mut self, _instance: NodeId) {}

    /// Runs `task` on the current thread once `delay` has passed, followed by
    /// any microtasks it queued.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio [`LocalSet`](tokio::task::LocalSet).
    fn schedule_timeout(&self, task: Task, delay: Duration) -> TimeoutHandle {
        let handle = tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            task();
            run_microtasks();
        });
        TimeoutHandle(Some(handle.abort_handle()))
    }

    fn cancel_timeout(&self, handle: &TimeoutHandle) {
        if let Some(handle) = &handle.0 {
            handle.abort();
        }
    }

    fn no_timeout(&self) -> TimeoutHandle {
        TimeoutHandle::none()
    }

    /// Queues `task` to run on this thread once the current task finishes.
    fn schedule_microtask(&self, task: Task) {
        MICROTASKS.with_borrow_mut(|queue| queue.push_back(task));
    }
}

impl HostConfig for HostTree {
    fn get_root_host_context(&self, _container: NodeId) -> HostContext {
        HostContext::root(self.config().clone())
    }

    fn get_child_host_context(&self, parent: &HostContext, element_type: &str) -> HostContext {
        parent.child(element_type)
    }

    fn create_instance(
        &mut self,
        element_type: &str,
        props: Props,
        _root_container: NodeId,
        _host_context: &HostContext,
        handle: OpaqueHandle,
    ) -> NodeId {
        HostTree::create_instance(self, element_type, props, handle)
    }

    fn create_text_instance(
        &mut self,
        text: &str,
        _root_container: NodeId,
        host_context: &HostContext,
    ) -> Result<NodeId, RendererError> {
        HostTree::create_text_instance(self, text, host_context)
    }

    fn append_initial_child(&mut self, parent: NodeId, child: NodeId) {
        HostTree::append_child(self, parent, child);
    }

    fn append_child(&mut self, parent: NodeId, child: NodeId) {
        HostTree::append_child(self, parent, child);
    }

    fn append_child_to_container(&mut self, container: NodeId, child: NodeId) {
        HostTree::append_child(self, container, child);
    }

    fn insert_before(&mut self, parent: NodeId, child: NodeId, before: NodeId) {
        HostTree::insert_before(self, parent, child, before);
    }

    fn insert_in_container_before(&mut self, container: NodeId, child: NodeId, before: NodeId) {
        HostTree::insert_before(self, container, child, before);
    }

    fn remove_child(&mut self, parent: NodeId, child: NodeId) {
        HostTree::remove_child(self, parent, child);
    }

    fn remove_child_from_container(&mut self, container: NodeId, child: NodeId) {
        HostTree::remove_child(self, container, child);
    }

    fn clear_container(&mut self, container: NodeId) {
        if container != self.container() {
            debug!(?container, "clear of a foreign container, ignoring");
            return;
        }
        HostTree::clear_container(self);
    }

    fn hide_instance(&mut self, instance: NodeId) {
        self.set_hidden(instance, true);
    }

    fn unhide_instance(&mut self, instance: NodeId, _props: &Props) {
        self.set_hidden(instance, false);
    }

    fn hide_text_instance(&mut self, text_instance: NodeId) {
        self.set_hidden(text_instance, true);
    }

    fn unhide_text_instance(&mut self, text_instance: NodeId, _text: &str) {
        self.set_hidden(text_instance, false);
    }

    fn commit_text_update(&mut self, text_instance: NodeId, _old_text: &str, new_text: &str) {
        HostTree::commit_text_update(self, text_instance, new_text);
    }

    fn commit_update(
        &mut self,
        instance: NodeId,
        element_type: &str,
        _old_props: &Props,
        new_props: Props,
        handle: OpaqueHandle,
    ) {
        HostTree::commit_update(self, instance, element_type, new_props, handle);
    }

    fn get_public_instance(&mut self, instance: NodeId) -> PublicInstance {
        match self.node(instance) {
            Some(Node::Instance(_)) => self
                .public_instance(instance)
                .map_or(PublicInstance::Text(instance), PublicInstance::Mock),
            Some(Node::Text(_)) | Some(Node::Container(_)) | None => PublicInstance::Text(instance),
        }
    }

    fn get_instance_from_node(&mut self, node: &MockNode) -> Option<OpaqueHandle> {
        self.instance_from_mock(node)
            .and_then(|node_id| self.handle(node_id).cloned())
    }

    fn prepare_scope_update(&mut self, scope: &MockNode, instance: NodeId) {
        self.register_scope(scope, instance);
    }

    fn get_instance_from_scope(&mut self, scope: &MockNode) -> Option<NodeId> {
        self.instance_from_mock(scope)
    }

    fn detach_deleted_instance(&mut self, instance: NodeId) {
        self.free_subtree(instance);
    }

    fn prepare_for_commit(&mut self, container: NodeId) {
        self.begin_commit(debug_span!("commit", ?container).entered());
        debug!("prepare for commit");
    }

    fn reset_after_commit(&mut self, _container: NodeId) {
        debug!("reset after commit");
        self.commit_span.take();
    }
}
