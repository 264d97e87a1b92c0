use serde::Deserialize;

/// Controls how [`query_all`] treats the start node and nested matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryOptions {
    /// Consider the start node itself as a candidate.
    pub include_self: bool,
    /// Drop a match when one of its descendants also matched.
    pub match_deepest_only: bool,
}

impl QueryOptions {
    pub fn include_self(mut self) -> Self {
        self.include_self = true;
        self
    }

    pub fn match_deepest_only(mut self) -> Self {
        self.match_deepest_only = true;
        self
    }
}

/// A node the query engine can walk.
pub trait QueryNode: Sized {
    /// Visible element children in sibling order. Text children are skipped.
    fn child_elements(&self) -> Vec<Self>;

    fn is_container(&self) -> bool;
}

/// Collects the nodes under `node` matching `predicate`, in pre-order.
///
/// Descendants are searched first and are always candidates; `node` itself only
/// when [`QueryOptions::include_self`] is set.
pub fn query_all<T, F>(node: &T, predicate: &mut F, options: QueryOptions) -> Vec<T>
where
    T: QueryNode + Clone,
    F: FnMut(&T) -> bool,
{
    let nested = QueryOptions {
        include_self: true,
        ..options
    };
    let descendants = node
        .child_elements()
        .iter()
        .flat_map(|child| query_all(child, predicate, nested))
        .collect::<Vec<_>>();

    collect(node, predicate, options.include_self, options.match_deepest_only, descendants)
}

/// Like [`query_all`] with `include_self`, except that a container is never a candidate.
pub fn find_all<T, F>(node: &T, predicate: &mut F, match_deepest_only: bool) -> Vec<T>
where
    T: QueryNode + Clone,
    F: FnMut(&T) -> bool,
{
    let descendants = node
        .child_elements()
        .iter()
        .flat_map(|child| find_all(child, predicate, match_deepest_only))
        .collect::<Vec<_>>();

    collect(node, predicate, !node.is_container(), match_deepest_only, descendants)
}

fn collect<T, F>(node: &T, predicate: &mut F, is_candidate: bool, match_deepest_only: bool, descendants: Vec<T>) -> Vec<T>
where
    T: Clone,
    F: FnMut(&T) -> bool,
{
    let include = is_candidate && (descendants.is_empty() || !match_deepest_only) && predicate(node);

    if include {
        std::iter::once(node.clone()).chain(descendants).collect()
    } else {
        descendants
    }
}
