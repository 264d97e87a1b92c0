//! Minimal driver that turns [`Element`] descriptions into protocol calls.
//!
//! A render is split in two. The render phase matches the new elements against
//! the fibers of the previous render, creates nodes for everything new and
//! assembles them into detached subtrees; it fails before touching anything
//! attached. The commit phase then applies the collected effects in one batch
//! between `prepare_for_commit` and `reset_after_commit`.
use std::slice;

use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;
use tracing::debug;

use crate::{
    context::HostContext,
    element::{ActivityMode, Element, RefCallback},
    error::RendererError,
    host_config::{HostConfig, PublicInstance},
    node::{NodeId, OpaqueHandle, Props},
    registry::MockNode,
};

/// What the driver stores as the opaque handle of every host element it creates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiberToken {
    pub element_type: SmolStr,
    pub key: Option<SmolStr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum SlotKey {
    Key(SmolStr),
    Index(usize),
}

#[derive(Clone)]
struct Fiber {
    slot: SlotKey,
    kind: FiberKind,
    children: Vec<Fiber>,
    /// Committed visibility of a host or text node.
    hidden: bool,
}

#[derive(Clone)]
enum FiberKind {
    Host {
        node: NodeId,
        element_type: SmolStr,
        props: Props,
        ref_callback: Option<RefCallback>,
        handle: OpaqueHandle,
    },
    Text {
        node: NodeId,
        text: String,
    },
    Fragment,
    Activity {
        mode: ActivityMode,
    },
}

/// A ref callback invocation, deferred until the tree is no longer borrowed.
pub(crate) struct RefUpdate {
    callback: RefCallback,
    value: Option<MockNode>,
}

impl RefUpdate {
    pub(crate) fn invoke(self) {
        (self.callback)(self.value);
    }
}

struct Deletion {
    parent: NodeId,
    fiber: Fiber,
}

struct Update {
    node: NodeId,
    element_type: SmolStr,
    old_props: Props,
    new_props: Props,
    handle: OpaqueHandle,
}

struct TextUpdate {
    node: NodeId,
    old_text: String,
    new_text: String,
}

/// Children of `parent` as last committed, and the order they must end up in.
struct Placement {
    parent: NodeId,
    current: Vec<NodeId>,
    target: Vec<NodeId>,
}

enum VisibilityChange {
    Instance { node: NodeId, props: Props, hidden: bool },
    Text { node: NodeId, text: String, hidden: bool },
}

#[derive(Default)]
struct Effects {
    deletions: Vec<Deletion>,
    text_updates: Vec<TextUpdate>,
    updates: Vec<Update>,
    placements: Vec<Placement>,
    visibility: Vec<VisibilityChange>,
    mounts: Vec<Update>,
    /// Every node the render phase allocated, freed again if the render fails.
    created: Vec<NodeId>,
    detached_refs: Vec<RefCallback>,
    attached_refs: Vec<(NodeId, RefCallback)>,
}

pub(crate) struct Reconciler {
    container: NodeId,
    current: Vec<Fiber>,
    mounted: bool,
}

impl Reconciler {
    pub(crate) fn new(container: NodeId) -> Self {
        Self {
            container,
            current: Vec::new(),
            mounted: false,
        }
    }

    /// Reconciles `element` against the previous render and commits the result.
    ///
    /// On error nothing attached to the container has changed.
    pub(crate) fn render<H: HostConfig>(
        &mut self,
        host: &mut H,
        element: &Element,
    ) -> Result<Vec<RefUpdate>, RendererError> {
        let mut effects = Effects::default();
        let ctx = host.get_root_host_context(self.container);
        let reconciled = self.reconcile_host_children(
            host,
            &ctx,
            self.container,
            self.current.clone(),
            slice::from_ref(element),
            &mut effects,
        );
        let children = match reconciled {
            Ok(children) => children,
            Err(err) => {
                debug!(created = effects.created.len(), "render failed, freeing created nodes");
                for node in effects.created {
                    host.detach_deleted_instance(node);
                }
                return Err(err);
            }
        };

        let refs = self.commit(host, effects);
        self.current = children;
        Ok(refs)
    }

    /// Removes everything rendered so far.
    pub(crate) fn unmount<H: HostConfig>(&mut self, host: &mut H) -> Vec<RefUpdate> {
        let container = self.container;
        let mut effects = Effects::default();
        effects.deletions = std::mem::take(&mut self.current)
            .into_iter()
            .map(|fiber| Deletion {
                parent: container,
                fiber,
            })
            .collect();

        self.commit(host, effects)
    }

    fn reconcile_host_children<H: HostConfig>(
        &self,
        host: &mut H,
        ctx: &HostContext,
        parent: NodeId,
        old: Vec<Fiber>,
        elements: &[Element],
        effects: &mut Effects,
    ) -> Result<Vec<Fiber>, RendererError> {
        let before = host_nodes(&old);
        let mut children = self.reconcile_children(host, ctx, parent, old, elements, effects)?;
        sync_visibility(&mut children, false, effects);

        let target = host_nodes(&children);
        if before != target {
            let kept = target.iter().copied().collect::<FxHashSet<_>>();
            effects.placements.push(Placement {
                parent,
                current: before.into_iter().filter(|node| kept.contains(node)).collect(),
                target,
            });
        }

        Ok(children)
    }

    fn reconcile_children<H: HostConfig>(
        &self,
        host: &mut H,
        ctx: &HostContext,
        parent: NodeId,
        old: Vec<Fiber>,
        elements: &[Element],
        effects: &mut Effects,
    ) -> Result<Vec<Fiber>, RendererError> {
        let mut old_by_slot = FxHashMap::default();
        for (index, fiber) in old.into_iter().enumerate() {
            if let Some((_, duplicate)) = old_by_slot.insert(fiber.slot.clone(), (index, fiber)) {
                effects.deletions.push(Deletion {
                    parent,
                    fiber: duplicate,
                });
            }
        }

        let mut children = Vec::with_capacity(elements.len());
        for (index, element) in elements.iter().enumerate() {
            let slot = element
                .key()
                .map_or(SlotKey::Index(index), |key| SlotKey::Key(key.clone()));
            let fiber = match old_by_slot.remove(&slot) {
                Some((_, fiber)) => self.update_fiber(host, ctx, parent, fiber, element, effects)?,
                None => self.create_fiber(host, ctx, parent, slot, element, effects)?,
            };
            children.push(fiber);
        }

        let mut leftovers = old_by_slot.into_values().collect::<Vec<_>>();
        leftovers.sort_by_key(|(index, _)| *index);
        effects
            .deletions
            .extend(leftovers.into_iter().map(|(_, fiber)| Deletion { parent, fiber }));

        Ok(children)
    }

    fn update_fiber<H: HostConfig>(
        &self,
        host: &mut H,
        ctx: &HostContext,
        parent: NodeId,
        fiber: Fiber,
        element: &Element,
        effects: &mut Effects,
    ) -> Result<Fiber, RendererError> {
        let Fiber {
            slot,
            kind,
            children,
            hidden,
        } = fiber;

        let kind = match (kind, element) {
            (
                FiberKind::Host {
                    node,
                    element_type,
                    props: old_props,
                    ref_callback,
                    handle,
                },
                Element::Host(component),
            ) if element_type == component.element_type => {
                let props = component.host_props();
                if props != old_props {
                    effects.updates.push(Update {
                        node,
                        element_type: element_type.clone(),
                        old_props,
                        new_props: props.clone(),
                        handle: handle.clone(),
                    });
                }

                if !same_ref(&ref_callback, &component.ref_callback) {
                    effects.detached_refs.extend(ref_callback);
                    if let Some(callback) = &component.ref_callback {
                        effects.attached_refs.push((node, callback.clone()));
                    }
                }

                let child_ctx = host.get_child_host_context(ctx, &element_type);
                let children =
                    self.reconcile_host_children(host, &child_ctx, node, children, &component.children, effects)?;

                return Ok(Fiber {
                    slot,
                    kind: FiberKind::Host {
                        node,
                        element_type,
                        props,
                        ref_callback: component.ref_callback.clone(),
                        handle,
                    },
                    children,
                    hidden,
                });
            }
            (FiberKind::Text { node, text: old_text }, Element::Text(text)) => {
                if old_text != *text {
                    effects.text_updates.push(TextUpdate {
                        node,
                        old_text,
                        new_text: text.clone(),
                    });
                }
                FiberKind::Text {
                    node,
                    text: text.clone(),
                }
            }
            (FiberKind::Fragment, Element::Fragment(elements)) => {
                let children = self.reconcile_children(host, ctx, parent, children, elements, effects)?;
                return Ok(Fiber {
                    slot,
                    kind: FiberKind::Fragment,
                    children,
                    hidden,
                });
            }
            (FiberKind::Activity { .. }, Element::Activity { mode, children: elements }) => {
                let children = self.reconcile_children(host, ctx, parent, children, elements, effects)?;
                return Ok(Fiber {
                    slot,
                    kind: FiberKind::Activity { mode: *mode },
                    children,
                    hidden,
                });
            }
            (kind, _) => {
                effects.deletions.push(Deletion {
                    parent,
                    fiber: Fiber {
                        slot: slot.clone(),
                        kind,
                        children,
                        hidden,
                    },
                });
                return self.create_fiber(host, ctx, parent, slot, element, effects);
            }
        };

        Ok(Fiber {
            slot,
            kind,
            children: Vec::new(),
            hidden,
        })
    }

    fn create_fiber<H: HostConfig>(
        &self,
        host: &mut H,
        ctx: &HostContext,
        parent: NodeId,
        slot: SlotKey,
        element: &Element,
        effects: &mut Effects,
    ) -> Result<Fiber, RendererError> {
        let (kind, children) = match element {
            Element::Host(component) => {
                let handle = OpaqueHandle::new(FiberToken {
                    element_type: component.element_type.clone(),
                    key: component.key.clone(),
                });
                let props = component.host_props();
                let node = host.create_instance(
                    &component.element_type,
                    props.clone(),
                    self.container,
                    ctx,
                    handle.clone(),
                );
                effects.created.push(node);

                let child_ctx = host.get_child_host_context(ctx, &component.element_type);
                let mut children =
                    self.reconcile_children(host, &child_ctx, node, Vec::new(), &component.children, effects)?;
                sync_visibility(&mut children, false, effects);
                for child in host_nodes(&children) {
                    host.append_initial_child(node, child);
                }
                if host.finalize_initial_children(node, &component.element_type, &props, ctx) {
                    effects.mounts.push(Update {
                        node,
                        element_type: component.element_type.clone(),
                        old_props: Props::new(),
                        new_props: props.clone(),
                        handle: handle.clone(),
                    });
                }

                if let Some(callback) = &component.ref_callback {
                    effects.attached_refs.push((node, callback.clone()));
                }

                let kind = FiberKind::Host {
                    node,
                    element_type: component.element_type.clone(),
                    props,
                    ref_callback: component.ref_callback.clone(),
                    handle,
                };
                (kind, children)
            }
            Element::Text(text) => {
                let node = host.create_text_instance(text, self.container, ctx)?;
                effects.created.push(node);
                (
                    FiberKind::Text {
                        node,
                        text: text.clone(),
                    },
                    Vec::new(),
                )
            }
            Element::Fragment(elements) => (
                FiberKind::Fragment,
                self.reconcile_children(host, ctx, parent, Vec::new(), elements, effects)?,
            ),
            Element::Activity { mode, children } => (
                FiberKind::Activity { mode: *mode },
                self.reconcile_children(host, ctx, parent, Vec::new(), children, effects)?,
            ),
        };

        Ok(Fiber {
            slot,
            kind,
            children,
            hidden: false,
        })
    }

    fn commit<H: HostConfig>(&mut self, host: &mut H, effects: Effects) -> Vec<RefUpdate> {
        let container = self.container;
        host.prepare_for_commit(container);
        debug!(
            deletions = effects.deletions.len(),
            updates = effects.updates.len() + effects.text_updates.len(),
            placements = effects.placements.len(),
            "commit"
        );

        if !self.mounted {
            host.clear_container(container);
            self.mounted = true;
        }

        let mut refs = effects
            .detached_refs
            .into_iter()
            .map(|callback| RefUpdate { callback, value: None })
            .collect::<Vec<_>>();

        for Deletion { parent, fiber } in effects.deletions {
            for node in host_nodes(slice::from_ref(&fiber)) {
                if parent == container {
                    host.remove_child_from_container(container, node);
                } else {
                    host.remove_child(parent, node);
                }
                host.detach_deleted_instance(node);
            }
            for_each_ref(&fiber, &mut |callback| {
                refs.push(RefUpdate {
                    callback: callback.clone(),
                    value: None,
                });
            });
        }

        for TextUpdate {
            node,
            old_text,
            new_text,
        } in effects.text_updates
        {
            host.commit_text_update(node, &old_text, &new_text);
        }

        for Update {
            node,
            element_type,
            old_props,
            new_props,
            handle,
        } in effects.updates
        {
            host.commit_update(node, &element_type, &old_props, new_props, handle);
        }

        for placement in effects.placements {
            place(host, container, placement);
        }

        for change in effects.visibility {
            match change {
                VisibilityChange::Instance { node, hidden: true, .. } => host.hide_instance(node),
                VisibilityChange::Instance {
                    node,
                    props,
                    hidden: false,
                } => host.unhide_instance(node, &props),
                VisibilityChange::Text { node, hidden: true, .. } => host.hide_text_instance(node),
                VisibilityChange::Text {
                    node,
                    text,
                    hidden: false,
                } => host.unhide_text_instance(node, &text),
            }
        }

        host.reset_after_commit(container);

        for mount in effects.mounts {
            host.commit_mount(mount.node, &mount.element_type, &mount.new_props, &mount.handle);
        }

        for (node, callback) in effects.attached_refs {
            match host.get_public_instance(node) {
                PublicInstance::Mock(mock) => refs.push(RefUpdate {
                    callback,
                    value: Some(mock),
                }),
                PublicInstance::Text(_) => debug!(?node, "ref on a node without a public instance, skipping"),
            }
        }

        refs
    }
}

/// Brings `parent`'s children from `current` into `target` order.
///
/// Walks the target from the end, so every node only has to land right before
/// the one placed previously. Nodes already there are left alone.
fn place<H: HostConfig>(host: &mut H, container: NodeId, placement: Placement) {
    let Placement {
        parent,
        current: mut order,
        target,
    } = placement;

    for (placed, node) in target.iter().rev().enumerate() {
        let in_place = order
            .len()
            .checked_sub(placed + 1)
            .is_some_and(|index| order[index] == *node);
        if in_place {
            continue;
        }

        let next = (placed > 0).then(|| order[order.len() - placed]);
        if let Some(index) = order.iter().position(|id| id == node) {
            order.remove(index);
        }
        order.insert(order.len() - placed, *node);

        match (next, parent == container) {
            (Some(before), true) => host.insert_in_container_before(container, *node, before),
            (Some(before), false) => host.insert_before(parent, *node, before),
            (None, true) => host.append_child_to_container(container, *node),
            (None, false) => host.append_child(parent, *node),
        }
    }
}

/// Host nodes directly under a host boundary, looking through fragments and activities.
fn host_nodes(fibers: &[Fiber]) -> Vec<NodeId> {
    let mut nodes = Vec::new();
    collect_host_nodes(fibers, &mut nodes);
    nodes
}

fn collect_host_nodes(fibers: &[Fiber], nodes: &mut Vec<NodeId>) {
    for fiber in fibers {
        match &fiber.kind {
            FiberKind::Host { node, .. } | FiberKind::Text { node, .. } => nodes.push(*node),
            FiberKind::Fragment | FiberKind::Activity { .. } => collect_host_nodes(&fiber.children, nodes),
        }
    }
}

/// Hides the host nodes under hidden activities and shows everything else at this level.
fn sync_visibility(fibers: &mut [Fiber], hidden: bool, effects: &mut Effects) {
    for fiber in fibers {
        match &fiber.kind {
            FiberKind::Host { node, props, .. } => {
                if fiber.hidden != hidden {
                    effects.visibility.push(VisibilityChange::Instance {
                        node: *node,
                        props: props.clone(),
                        hidden,
                    });
                    fiber.hidden = hidden;
                }
            }
            FiberKind::Text { node, text } => {
                if fiber.hidden != hidden {
                    effects.visibility.push(VisibilityChange::Text {
                        node: *node,
                        text: text.clone(),
                        hidden,
                    });
                    fiber.hidden = hidden;
                }
            }
            FiberKind::Fragment => sync_visibility(&mut fiber.children, hidden, effects),
            FiberKind::Activity { mode } => {
                let hidden = hidden || *mode == ActivityMode::Hidden;
                sync_visibility(&mut fiber.children, hidden, effects);
            }
        }
    }
}

fn for_each_ref(fiber: &Fiber, f: &mut impl FnMut(&RefCallback)) {
    if let FiberKind::Host {
        ref_callback: Some(callback),
        ..
    } = &fiber.kind
    {
        f(callback);
    }
    for child in &fiber.children {
        for_each_ref(child, f);
    }
}

fn same_ref(a: &Option<RefCallback>, b: &Option<RefCallback>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => std::rc::Rc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}
