use std::{cell::RefCell, rc::Rc};

use rstest::{fixture, rstest};
use serde_json::json;
use test_renderer::{
    ActivityMode, Element, ErrorKind, FiberToken, HostElement, HostNode, MockNode, QueryOptions, RendererError, Root,
    RootOptions, create_root,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[fixture]
fn root() -> Root {
    init_tracing();
    create_root(RootOptions::default())
}

#[fixture]
fn native_root() -> Root {
    init_tracing();
    create_root(RootOptions::default().with_text_components(["Text"]))
}

fn snapshot(root: &Root) -> serde_json::Value {
    serde_json::to_value(root.root().unwrap().to_json()).unwrap()
}

fn by_type(element_type: &'static str) -> impl FnMut(&HostElement) -> bool {
    move |element: &HostElement| element.element_type().as_str() == element_type
}

#[rstest]
fn test_render_text_in_div(mut root: Root) {
    root.render(Element::host("div").child("Hello!")).unwrap();

    assert_eq!(
        snapshot(&root),
        json!({"type": "div", "props": {}, "children": ["Hello!"], "$$typeof": "react.test.json"})
    );
}

#[rstest]
#[case::single(Element::host("div").into(), "<>\n  <div />\n</>")]
#[case::fragment(
    Element::fragment([Element::from(Element::host("div").child("Hello!")), Element::from(Element::host("span").child("World!"))]),
    "<>\n  <div>\n    Hello!\n  </div>\n  <span>\n    World!\n  </span>\n</>"
)]
#[case::props(
    Element::host("input").prop("type", "text").prop("disabled", true).into(),
    "<>\n  <input\n    disabled={true}\n    type=\"text\"\n  />\n</>"
)]
#[case::nested(
    Element::host("ul").children(["a", "b"].map(|item| Element::host("li").key(item).child(item))).into(),
    "<>\n  <ul>\n    <li>\n      a\n    </li>\n    <li>\n      b\n    </li>\n  </ul>\n</>"
)]
fn test_container_snapshot(mut root: Root, #[case] element: Element, #[case] expected: &str) {
    root.render(element).unwrap();

    assert_eq!(root.container().unwrap().to_string(), expected);
}

#[rstest]
fn test_container_type_label() {
    let mut root = create_root(RootOptions::default().with_container_type_label("Container"));
    root.render(Element::host("div").child("Hello!")).unwrap();

    assert_eq!(
        root.container().unwrap().to_string(),
        "<Container>\n  <div>\n    Hello!\n  </div>\n</Container>"
    );
    assert_eq!(root.container().unwrap().element_type().as_str(), "Container");
}

#[rstest]
fn test_empty_container_snapshot(mut root: Root) {
    root.render(Element::fragment(Vec::<Element>::new())).unwrap();

    let json = root.to_json().unwrap().unwrap();
    assert_eq!(json.as_element().unwrap().children, None);
    assert_eq!(json.to_string(), "< />");
}

#[rstest]
fn test_text_inside_text_component(mut native_root: Root) {
    native_root
        .render(Element::host("View").child(Element::host("Text").child("Hello!")))
        .unwrap();

    assert_eq!(native_root.root().unwrap().to_string(), "<View>\n  <Text>\n    Hello!\n  </Text>\n</View>");
}

#[rstest]
fn test_text_outside_text_component(mut native_root: Root) {
    let err = native_root.render(Element::host("div").child("Hello!")).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ProtocolViolation);
    assert_eq!(
        err.to_string(),
        "Invariant Violation: Text strings must be rendered within a <Text> component. Detected attempt to render \"Hello!\" string within a <div> component."
    );
    assert!(native_root.container().unwrap().children().is_empty());
}

#[rstest]
#[case::three(vec!["A", "B", "C"], "<A>, <B>, or <C>")]
#[case::two(vec!["A", "B"], "<A> or <B>")]
fn test_text_error_lists_whitelist(#[case] whitelist: Vec<&str>, #[case] expected: &str) {
    let mut root = create_root(RootOptions::default().with_text_components(whitelist));

    let err = root.render(Element::host("X").child("…")).unwrap_err();

    assert!(err.to_string().contains(&format!(
        "Text strings must be rendered within a {expected} component. Detected attempt to render \"…\" string within a <X> component."
    )));
}

#[rstest]
fn test_public_text_component_names() {
    let mut root = create_root(
        RootOptions::default()
            .with_text_components(["RCTText", "RCTVirtualText"])
            .with_public_text_component_names(["Text"]),
    );

    root.render(Element::host("RCTText").child("ok")).unwrap();
    let err = root.render(Element::host("View").child("bad")).unwrap_err();

    assert!(err.to_string().contains("within a <Text> component"));
    // The failed render left the previous tree in place.
    assert_eq!(root.root().unwrap().element_type().as_str(), "RCTText");
}

#[rstest]
fn test_options_from_json() {
    let options: RootOptions = serde_json::from_value(json!({
        "textComponentWhitelist": ["Text"],
        "containerTypeLabel": "Root"
    }))
    .unwrap();
    let mut root = create_root(options);

    assert!(root.render(Element::host("View").child("bad")).is_err());
    root.render(Element::host("Text").child("good")).unwrap();
    assert_eq!(root.container().unwrap().element_type().as_str(), "Root");
}

#[rstest]
fn test_unmount(mut root: Root) {
    root.render(Element::host("div").child("Hello!")).unwrap();
    let container = root.container().unwrap();
    assert_eq!(container.children().len(), 1);

    root.unmount();
    root.unmount();

    assert!(container.children().is_empty());
    let err = root.container().unwrap_err();
    assert_eq!(err.to_string(), "Can't access .container on unmounted test renderer");
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(
        root.root().unwrap_err().to_string(),
        "Can't access .root on unmounted test renderer"
    );
    assert_eq!(
        root.render(Element::host("div").child("New content")).unwrap_err().to_string(),
        "Cannot render after unmount"
    );
}

#[rstest]
fn test_unmount_before_render(mut root: Root) {
    root.unmount();

    assert_eq!(root.container().unwrap_err(), RendererError::AccessAfterUnmount("container"));
}

#[rstest]
fn test_root_accessor_errors(mut root: Root) {
    assert_eq!(root.root().unwrap_err().to_string(), "Container has no children");

    root.render("Hello!").unwrap();
    let err = root.root().unwrap_err();
    assert_eq!(err.to_string(), "Cannot render text as root element");
    assert_eq!(err.kind(), ErrorKind::StructuralError);
}

#[rstest]
fn test_rerender_removes_child(mut root: Root) {
    root.render(Element::host("div").child(Element::host("span"))).unwrap();
    let div = root.root().unwrap();
    let span = div.children()[0].as_element().cloned().unwrap();
    assert_eq!(span.parent(), Some(div.clone()));

    root.render(Element::host("div")).unwrap();

    assert_eq!(root.root().unwrap(), div);
    assert!(div.children().is_empty());
    assert_eq!(span.parent(), None);
}

#[rstest]
fn test_rerender_updates_props_in_place(mut root: Root) {
    root.render(Element::host("div").prop("className", "a").child("one")).unwrap();
    let div = root.root().unwrap();

    root.render(Element::host("div").prop("className", "b").child("two")).unwrap();

    assert_eq!(root.root().unwrap(), div);
    assert_eq!(div.prop("className"), Some(json!("b")));
    assert_eq!(div.prop("children"), Some(json!("two")));
    assert_eq!(div.children(), vec![HostNode::Text("two".to_string())]);
}

#[rstest]
fn test_keyed_children_keep_identity(mut root: Root) {
    let list = |keys: &[&str]| Element::host("ul").children(keys.iter().map(|key| Element::host("li").key(*key).child(*key)));
    root.render(list(&["a", "b", "c"])).unwrap();
    let items = root.query(by_type("li"), QueryOptions::default()).unwrap();

    root.render(list(&["c", "a", "b"])).unwrap();

    let reordered = root.query(by_type("li"), QueryOptions::default()).unwrap();
    assert_eq!(reordered, vec![items[2].clone(), items[0].clone(), items[1].clone()]);
}

#[rstest]
fn test_wrappers_are_stable(mut root: Root) {
    root.render(Element::host("div").child(Element::host("div").prop("data-testid", "inner").child("Hello!")))
        .unwrap();

    let outer = root.root().unwrap();
    let first_child = outer.children()[0].as_element().cloned().unwrap();
    let inner = root
        .query(|element| element.prop("data-testid") == Some(json!("inner")), QueryOptions::default())
        .unwrap();

    assert_eq!(first_child.parent(), Some(outer.clone()));
    assert_eq!(inner, vec![first_child]);
    assert_eq!(outer.parent(), Some(root.container().unwrap()));
    assert_eq!(root.container().unwrap().parent(), None);
}

#[rstest]
fn test_query_options(mut root: Root) {
    root.render(
        Element::host("View")
            .prop("testID", "outer")
            .child(Element::host("View").prop("testID", "inner").child(Element::host("Text"))),
    )
    .unwrap();
    let outer = root.root().unwrap();

    let names = |elements: Vec<HostElement>| {
        elements
            .iter()
            .map(|element| element.prop("testID").and_then(|id| id.as_str().map(String::from)))
            .collect::<Vec<_>>()
    };

    assert_eq!(names(outer.query(by_type("View"), QueryOptions::default())), vec![Some("inner".to_string())]);
    assert_eq!(
        names(outer.query(by_type("View"), QueryOptions::default().include_self())),
        vec![Some("outer".to_string()), Some("inner".to_string())]
    );
    assert_eq!(
        names(outer.query(by_type("View"), QueryOptions::default().include_self().match_deepest_only())),
        vec![Some("inner".to_string())]
    );
    assert_eq!(names(outer.find_all(by_type("View"), false)).len(), 2);
    assert!(root.container().unwrap().find_all(|_| true, false).iter().all(|e| !e.is_container()));
}

#[rstest]
fn test_activity_hides_subtree(mut root: Root) {
    let view = |mode| {
        Element::activity(
            mode,
            [Element::from(
                Element::host("div").child(Element::host("button").child("Increment")),
            )],
        )
    };

    root.render(view(ActivityMode::Visible)).unwrap();
    let container = root.container().unwrap();
    let div = root.root().unwrap();
    let button = root.query(by_type("button"), QueryOptions::default()).unwrap();
    assert_eq!(button.len(), 1);

    root.render(view(ActivityMode::Hidden)).unwrap();
    assert_eq!(container.to_string(), "< />");
    assert!(container.children().is_empty());
    assert!(root.query(by_type("button"), QueryOptions::default()).unwrap().is_empty());
    // Hidden nodes stay attached.
    assert_eq!(root.root().unwrap(), div);
    assert_eq!(div.to_json(), None);

    root.render(view(ActivityMode::Visible)).unwrap();
    assert_eq!(container.children(), vec![HostNode::Element(div.clone())]);
    assert_eq!(root.query(by_type("button"), QueryOptions::default()).unwrap(), button);
    assert_eq!(
        container.to_string(),
        "<>\n  <div>\n    <button>\n      Increment\n    </button>\n  </div>\n</>"
    );
}

#[rstest]
fn test_hidden_text_is_omitted(mut root: Root) {
    root.render(
        Element::host("div").children([
            Element::text("shown"),
            Element::activity(ActivityMode::Hidden, [Element::text("hidden")]),
        ]),
    )
    .unwrap();

    assert_eq!(root.root().unwrap().children(), vec![HostNode::Text("shown".to_string())]);
    assert_eq!(
        snapshot(&root),
        json!({"type": "div", "props": {}, "children": ["shown"], "$$typeof": "react.test.json"})
    );
}

#[rstest]
fn test_node_mock_factory() {
    let calls = Rc::new(RefCell::new(Vec::new()));
    let recorded = Rc::clone(&calls);
    let mut root = create_root(RootOptions::default().with_node_mock(move |descriptor| {
        recorded.borrow_mut().push(descriptor.clone());
        MockNode::new(json!({"type": descriptor.element_type.as_str(), "id": recorded.borrow().len()}))
    }));
    let refs = Rc::new(RefCell::new(Vec::new()));
    let (first, second) = (Rc::clone(&refs), Rc::clone(&refs));

    root.render(
        Element::host("div").children([
            Element::host("span").with_ref(move |mock| first.borrow_mut().push(mock)).child("First"),
            Element::host("div")
                .prop("id", "test-id")
                .key("test-key")
                .with_ref(move |mock| second.borrow_mut().push(mock))
                .child("Second"),
        ]),
    )
    .unwrap();

    let calls = calls.borrow();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].element_type.as_str(), "span");
    assert_eq!(calls[1].props.get("id"), Some(&json!("test-id")));
    assert_eq!(calls[1].props.get("children"), Some(&json!("Second")));
    assert_eq!(calls[1].key, None);

    let refs = refs.borrow();
    assert_eq!(refs.len(), 2);
    let span_mock = refs[0].clone().unwrap();
    let div_mock = refs[1].clone().unwrap();
    assert_eq!(*span_mock, json!({"type": "span", "id": 1}));
    assert!(!span_mock.ptr_eq(&div_mock));

    let span = root.find_by_mock(&span_mock).unwrap();
    assert_eq!(span.children(), vec![HostNode::Text("First".to_string())]);
}

#[rstest]
fn test_node_mock_not_called_without_refs() {
    let calls = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&calls);
    let mut root = create_root(RootOptions::default().with_node_mock(move |_| {
        *counter.borrow_mut() += 1;
        MockNode::default()
    }));

    root.render(Element::host("div").child(Element::host("span"))).unwrap();

    assert_eq!(*calls.borrow(), 0);
}

#[rstest]
fn test_ref_detached_on_unmount(mut root: Root) {
    let refs = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&refs);
    root.render(Element::host("div").with_ref(move |mock| sink.borrow_mut().push(mock.is_some())))
        .unwrap();

    root.unmount();

    assert_eq!(*refs.borrow(), vec![true, false]);
}

#[rstest]
fn test_unstable_handle(mut root: Root) {
    root.render(Element::host("div").key("main")).unwrap();

    let handle = root.root().unwrap().unstable_handle().unwrap();
    let token = handle.downcast_ref::<FiberToken>().unwrap();
    assert_eq!(token.element_type.as_str(), "div");
    assert_eq!(token.key.as_deref(), Some("main"));
    assert!(root.container().unwrap().unstable_handle().is_none());
}
