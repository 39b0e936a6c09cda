//! Core tick and node abstractions.
//!
//! A behavior tree is described by two closure types:
//!
//! - [`Tick`]: evaluates a node once, given its children
//! - [`Node`]: resolves to a tick plus its children
//!
//! Resolving a node may produce a different tick or child list every time it
//! is called, which is how dynamically rebuilt trees are expressed. Any state
//! a tree needs lives in the closures' captures, never in this crate.

use std::fmt;
use std::sync::Arc;

use crate::{Error, Status};

/// Outcome of a single tick: a status, or an error reported by the tick.
pub type TickResult = Result<Status, Error>;

/// Evaluation function for a node.
pub type Tick = Arc<dyn Fn(&[Node]) -> TickResult + Send + Sync>;

/// A behavior tree node: resolves to its tick (if any) and its children.
///
/// Cheap to clone; clones share the same resolver.
#[derive(Clone)]
pub struct Node(Arc<dyn Fn() -> (Option<Tick>, Vec<Node>) + Send + Sync>);

impl Node {
    /// Calls the resolver, producing this period's tick and children.
    #[inline]
    pub fn resolve(&self) -> (Option<Tick>, Vec<Node>) {
        (self.0)()
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Node(..)")
    }
}

/// Creates a [`Tick`] from a closure.
#[inline]
pub fn tick_fn<F>(f: F) -> Tick
where
    F: Fn(&[Node]) -> TickResult + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Creates a [`Node`] from a resolver closure.
#[inline]
pub fn node_fn<F>(f: F) -> Node
where
    F: Fn() -> (Option<Tick>, Vec<Node>) + Send + Sync + 'static,
{
    Node(Arc::new(f))
}

/// Creates a node that always resolves to the same tick and children.
pub fn node(tick: Option<Tick>, children: Vec<Node>) -> Node {
    Node(Arc::new(move || (tick.clone(), children.clone())))
}

/// Creates a childless node.
///
/// Shorthand for `node(Some(tick), Vec::new())`.
#[inline]
pub fn leaf(tick: Tick) -> Node {
    node(Some(tick), Vec::new())
}

/// Resolves `node` and evaluates its tick against the resolved children.
///
/// Returns [`Error::MissingTick`] if the node resolves to no tick.
pub fn tick(node: &Node) -> TickResult {
    let (tick, children) = node.resolve();
    let tick = tick.ok_or(Error::MissingTick)?;
    tick(&children)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn tick_passes_resolved_children() {
        let child = leaf(tick_fn(|_| Ok(Status::Success)));
        let root = node(
            Some(tick_fn(|children| {
                assert_eq!(children.len(), 2);
                Ok(Status::Failure)
            })),
            vec![child.clone(), child],
        );

        assert_eq!(tick(&root).unwrap(), Status::Failure);
    }

    #[test]
    fn tick_without_tick_is_an_error() {
        let root = node(None, Vec::new());

        let err = tick(&root).unwrap_err();
        assert!(matches!(err, Error::MissingTick));
        assert_eq!(err.to_string(), "cannot tick a node with no tick");
    }

    #[test]
    fn clones_share_the_resolver() {
        let resolved = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&resolved);
        let root = node_fn(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            (None, Vec::new())
        });
        let copy = root.clone();

        let (tick, children) = copy.resolve();
        assert!(tick.is_none());
        assert!(children.is_empty());
        root.resolve();
        assert_eq!(resolved.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn node_fn_is_resolved_on_every_tick() {
        let resolved = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&resolved);
        let root = node_fn(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            let status = if n % 2 == 0 {
                Status::Success
            } else {
                Status::Failure
            };
            (Some(tick_fn(move |_| Ok(status))), Vec::new())
        });

        assert_eq!(tick(&root).unwrap(), Status::Success);
        assert_eq!(tick(&root).unwrap(), Status::Failure);
        assert_eq!(resolved.load(Ordering::SeqCst), 2);
    }
}
