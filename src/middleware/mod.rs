//! Middleware composition.
//!
//! A [`Middleware`] turns one [`Executor`] into another. A [`Chain`] folds
//! an ordered list of middleware so that the first entry is the outermost
//! layer: it sees the request first and the response last. The last entry
//! sits next to the real transport.
//!
//! ```text
//! chain(A, B).wrap(base)  ==  A(B(base))
//!
//! A pre -> B pre -> base -> B post -> A post
//! ```

use std::sync::Arc;

use crate::transport::Executor;

/// Decorates an executor with cross-cutting behaviour.
///
/// `wrap` may be called once per request. Any state that has to outlive a
/// single call (a rate limiter's bucket, a metrics registry) belongs to the
/// middleware value, not to the executor it returns.
pub trait Middleware: Send + Sync {
    /// Wraps `next`, returning the decorated executor.
    fn wrap(&self, next: Arc<dyn Executor>) -> Arc<dyn Executor>;
}

impl<F> Middleware for F
where
    F: Fn(Arc<dyn Executor>) -> Arc<dyn Executor> + Send + Sync,
{
    fn wrap(&self, next: Arc<dyn Executor>) -> Arc<dyn Executor> {
        self(next)
    }
}

/// An ordered composition of middleware.
///
/// Holds no mutable state, so one chain can be shared by concurrent calls.
#[derive(Clone, Default)]
pub struct Chain {
    layers: Vec<Arc<dyn Middleware>>,
}

impl Chain {
    /// Creates a chain from middleware listed outermost first.
    pub fn new(layers: Vec<Arc<dyn Middleware>>) -> Self {
        Self { layers }
    }

    /// Appends a middleware as the new innermost layer.
    pub fn push(&mut self, middleware: Arc<dyn Middleware>) {
        self.layers.push(middleware);
    }

    /// Number of layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Returns true if the chain has no layers.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl Middleware for Chain {
    fn wrap(&self, next: Arc<dyn Executor>) -> Arc<dyn Executor> {
        self.layers
            .iter()
            .rev()
            .fold(next, |inner, layer| layer.wrap(inner))
    }
}

impl FromIterator<Arc<dyn Middleware>> for Chain {
    fn from_iter<I: IntoIterator<Item = Arc<dyn Middleware>>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain").field("layers", &self.layers.len()).finish()
    }
}
