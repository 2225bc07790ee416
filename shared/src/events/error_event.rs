use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use log::error;

use crate::{sync::LockExt, NetError, NodeId, NodeRef};

/// Receives errors the engine could not hand back to a caller
pub trait ErrorHandler: Send + Sync {
    /// An error that came from a known node
    fn handle_error(&self, error: &NetError, node: &NodeRef);

    /// An error with no known originating node
    fn handle_unknown_error(&self, error: &NetError);
}

struct FnErrorHandler<F>(F);

impl<F> ErrorHandler for FnErrorHandler<F>
where
    F: Fn(&NetError, Option<&NodeRef>) + Send + Sync,
{
    fn handle_error(&self, error: &NetError, node: &NodeRef) {
        (self.0)(error, Some(node));
    }

    fn handle_unknown_error(&self, error: &NetError) {
        (self.0)(error, None);
    }
}

/// Adapts a closure into an [`ErrorHandler`]; the node is `None` for
/// errors of unknown origin
pub fn error_handler_fn<F>(callback: F) -> Arc<dyn ErrorHandler>
where
    F: Fn(&NetError, Option<&NodeRef>) + Send + Sync + 'static,
{
    Arc::new(FnErrorHandler(callback))
}

/// Predicate selecting the nodes a dynamic error handler applies to
pub type NodePredicate = Arc<dyn Fn(&NodeRef) -> bool + Send + Sync>;

/// Fans reported errors out to the registered handlers.
///
/// Handlers registered for the exact node run first, then every predicate
/// registration that matches, in registration order. When nothing matched,
/// or the error has no known node, the catch-all handlers run. If no handler
/// at all took the error it is logged.
#[derive(Default)]
pub struct ErrorHandlers {
    by_node: Mutex<HashMap<NodeId, Vec<Arc<dyn ErrorHandler>>>>,
    dynamic: Mutex<Vec<(NodePredicate, Vec<Arc<dyn ErrorHandler>>)>>,
    unknown: Mutex<Vec<Arc<dyn ErrorHandler>>>,
}

impl ErrorHandlers {
    pub fn new() -> Self {
        Self {
            by_node: Mutex::new(HashMap::new()),
            dynamic: Mutex::new(Vec::new()),
            unknown: Mutex::new(Vec::new()),
        }
    }

    pub fn register_node(&self, node: NodeId, handler: Arc<dyn ErrorHandler>) {
        self.by_node
            .lock_or_recover()
            .entry(node)
            .or_default()
            .push(handler);
    }

    /// Drops every handler registered for `node`
    pub fn unregister_node(&self, node: NodeId) {
        self.by_node.lock_or_recover().remove(&node);
    }

    pub fn register_dynamic(&self, predicate: NodePredicate, handlers: Vec<Arc<dyn ErrorHandler>>) {
        self.dynamic.lock_or_recover().push((predicate, handlers));
    }

    pub fn register_unknown(&self, handler: Arc<dyn ErrorHandler>) {
        self.unknown.lock_or_recover().push(handler);
    }

    /// Routes an error to the matching handlers. Returns whether any
    /// handler received it.
    pub fn report(&self, error: &NetError, node: Option<&NodeRef>) -> bool {
        if let Some(node) = node {
            let mut matched: Vec<Arc<dyn ErrorHandler>> = self
                .by_node
                .lock_or_recover()
                .get(&node.id())
                .cloned()
                .unwrap_or_default();

            // snapshot so user predicates run without the lock held
            let dynamic = self.dynamic.lock_or_recover().clone();
            for (predicate, handlers) in &dynamic {
                if predicate(node) {
                    matched.extend(handlers.iter().cloned());
                }
            }

            if !matched.is_empty() {
                for handler in &matched {
                    handler.handle_error(error, node);
                }
                return true;
            }
        }

        let unknown = self.unknown.lock_or_recover().clone();
        if !unknown.is_empty() {
            for handler in &unknown {
                handler.handle_unknown_error(error);
            }
            return true;
        }

        match node {
            Some(node) => error!("unhandled network error from {:?}: {}", node, error),
            None => error!("unhandled network error: {}", error),
        }
        false
    }
}
