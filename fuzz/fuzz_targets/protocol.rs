#![no_main]

use arbitrary::Arbitrary;
use itertools::Itertools;
use libfuzzer_sys::fuzz_target;
use test_renderer::{HostConfig, HostTree, NodeId, OpaqueHandle, Props, QueryOptions, RootOptions, create_root};

#[derive(Debug, Clone, Arbitrary)]
enum Call {
    CreateInstance(u8),
    CreateText(String),
    Append { parent: u8, child: u8 },
    InsertBefore { parent: u8, child: u8, before: u8 },
    Remove { parent: u8, child: u8 },
    Hide(u8),
    Unhide(u8),
    UpdateText { node: u8, text: String },
    ClearContainer,
    Free(u8),
}

#[derive(Debug, Clone, Arbitrary)]
enum Tree {
    Text(String),
    Host { element_type: u8, key: Option<u8>, children: Vec<Tree> },
}

impl Tree {
    fn to_element(&self) -> test_renderer::Element {
        match self {
            Tree::Text(text) => test_renderer::Element::text(text.as_str()),
            Tree::Host {
                element_type,
                key,
                children,
            } => {
                let mut host = test_renderer::Element::host(["div", "span", "Text"][*element_type as usize % 3])
                    .children(children.iter().map(Tree::to_element));
                if let Some(key) = key {
                    host = host.key(key.to_string());
                }
                host.into()
            }
        }
    }
}

#[derive(Debug, Clone, Arbitrary)]
struct Context {
    calls: Vec<Call>,
    renders: Vec<Tree>,
    whitelist: bool,
}

fn pick(nodes: &[NodeId], index: u8) -> NodeId {
    nodes[index as usize % nodes.len()]
}

fn assert_consistent(tree: &HostTree, nodes: &[NodeId]) {
    for node in nodes {
        let children = tree.children(*node);
        assert!(children.iter().all_unique());
        for child in children {
            assert_eq!(tree.parent(*child), Some(*node));
        }
        if let Some(parent) = tree.parent(*node) {
            assert!(tree.children(parent).contains(node));
        }
    }
}

fuzz_target!(|context: Context| {
    let mut tree = HostTree::default();
    let container = tree.container();
    let ctx = tree.get_root_host_context(container);
    let mut nodes = vec![container];

    for call in &context.calls {
        match call {
            Call::CreateInstance(kind) => {
                let element_type = ["div", "span", "View"][*kind as usize % 3];
                let node = HostConfig::create_instance(
                    &mut tree,
                    element_type,
                    Props::new(),
                    container,
                    &ctx,
                    OpaqueHandle::new(()),
                );
                nodes.push(node);
            }
            Call::CreateText(text) => {
                if let Ok(node) = HostConfig::create_text_instance(&mut tree, text, container, &ctx) {
                    nodes.push(node);
                }
            }
            Call::Append { parent, child } => {
                HostConfig::append_child(&mut tree, pick(&nodes, *parent), pick(&nodes, *child));
            }
            Call::InsertBefore { parent, child, before } => {
                HostConfig::insert_before(
                    &mut tree,
                    pick(&nodes, *parent),
                    pick(&nodes, *child),
                    pick(&nodes, *before),
                );
            }
            Call::Remove { parent, child } => {
                HostConfig::remove_child(&mut tree, pick(&nodes, *parent), pick(&nodes, *child));
            }
            Call::Hide(node) => tree.hide_instance(pick(&nodes, *node)),
            Call::Unhide(node) => tree.unhide_text_instance(pick(&nodes, *node), ""),
            Call::UpdateText { node, text } => {
                HostConfig::commit_text_update(&mut tree, pick(&nodes, *node), "", text);
            }
            Call::ClearContainer => HostConfig::clear_container(&mut tree, container),
            Call::Free(node) => tree.detach_deleted_instance(pick(&nodes, *node)),
        }
        assert_consistent(&tree, &nodes);
    }
    let _ = test_renderer::to_json(&tree, container);
    assert!(tree.node(container).is_some());

    let options = if context.whitelist {
        RootOptions::default().with_text_components(["Text"])
    } else {
        RootOptions::default()
    };
    let mut root = create_root(options);
    for render in &context.renders {
        let _ = root.render(render.to_element());
        if let Ok(container) = root.container() {
            let all = container.query(|_| true, QueryOptions::default());
            let deepest = container.query(|_| true, QueryOptions::default().match_deepest_only());
            assert!(deepest.iter().all(|element| all.contains(element)));
            let _ = container.to_string();
        }
    }
    root.unmount();
    assert!(root.container().is_err());
});
