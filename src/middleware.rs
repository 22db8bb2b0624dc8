//! Middleware resolution and the wrap-and-call-next pipeline.
//!
//! A chain's middleware is stored as a deferred [`MiddlewareResolver`]
//! (closure, invokable object or literal list, normalized once at
//! builder time). At every bale dispatch the resolver produces a fresh
//! ordered stack and [`MiddlewarePipeline::run`] wraps the dispatch
//! outer-to-inner. A middleware either forwards the bale by running
//! `next` or short-circuits by dropping it; errors raised inside a
//! middleware propagate as the bale's failure.

use std::fmt;
use std::sync::Arc;

use anyhow::Result;

use crate::chain::Bale;

/// Intercepts a pending unit of work and either forwards it or
/// short-circuits.
pub trait Middleware: Send + Sync {
    fn handle(&self, bale: &Bale, next: Next<'_>) -> Result<()>;
}

/// The non-closure form of a middleware resolver: an object that
/// produces the ordered middleware stack when asked.
pub trait ResolvesMiddleware: Send + Sync {
    fn middleware(&self) -> Vec<Arc<dyn Middleware>>;
}

/// Deferred producer of the ordered middleware stack for a chain.
#[derive(Clone)]
pub enum MiddlewareResolver {
    Closure(Arc<dyn Fn() -> Vec<Arc<dyn Middleware>> + Send + Sync>),
    Invokable(Arc<dyn ResolvesMiddleware>),
    Literal(Vec<Arc<dyn Middleware>>),
}

impl MiddlewareResolver {
    pub fn from_fn(f: impl Fn() -> Vec<Arc<dyn Middleware>> + Send + Sync + 'static) -> Self {
        MiddlewareResolver::Closure(Arc::new(f))
    }

    pub fn from_invokable(obj: Arc<dyn ResolvesMiddleware>) -> Self {
        MiddlewareResolver::Invokable(obj)
    }

    pub fn literal(stack: Vec<Arc<dyn Middleware>>) -> Self {
        MiddlewareResolver::Literal(stack)
    }

    /// Produce the concrete ordered middleware stack.
    pub fn resolve(&self) -> Vec<Arc<dyn Middleware>> {
        match self {
            MiddlewareResolver::Closure(f) => f(),
            MiddlewareResolver::Invokable(obj) => obj.middleware(),
            MiddlewareResolver::Literal(stack) => stack.clone(),
        }
    }
}

// Like hooks, resolvers compare by wrapped reference.
impl PartialEq for MiddlewareResolver {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (MiddlewareResolver::Closure(a), MiddlewareResolver::Closure(b)) => Arc::ptr_eq(a, b),
            (MiddlewareResolver::Invokable(a), MiddlewareResolver::Invokable(b)) => {
                Arc::ptr_eq(a, b)
            }
            (MiddlewareResolver::Literal(a), MiddlewareResolver::Literal(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| Arc::ptr_eq(x, y))
            }
            _ => false,
        }
    }
}

impl fmt::Debug for MiddlewareResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MiddlewareResolver::Closure(_) => f.write_str("MiddlewareResolver::Closure(..)"),
            MiddlewareResolver::Invokable(_) => f.write_str("MiddlewareResolver::Invokable(..)"),
            MiddlewareResolver::Literal(stack) => {
                write!(f, "MiddlewareResolver::Literal(len={})", stack.len())
            }
        }
    }
}

/// The continuation handed to each middleware: the remaining stack plus
/// the terminal forward action. Running it forwards the bale; dropping
/// it short-circuits.
pub struct Next<'a> {
    remaining: &'a [Arc<dyn Middleware>],
    terminal: &'a mut dyn FnMut(&Bale) -> Result<()>,
}

impl Next<'_> {
    pub fn run(self, bale: &Bale) -> Result<()> {
        match self.remaining.split_first() {
            Some((head, tail)) => head.handle(
                bale,
                Next {
                    remaining: tail,
                    terminal: self.terminal,
                },
            ),
            None => (self.terminal)(bale),
        }
    }
}

/// A resolved, ordered middleware stack wrapping one bale dispatch.
pub struct MiddlewarePipeline {
    stack: Vec<Arc<dyn Middleware>>,
}

impl MiddlewarePipeline {
    /// Resolve the chain's stored resolver into a concrete stack. A
    /// chain without middleware yields an empty pipeline.
    pub fn resolve(resolver: Option<&MiddlewareResolver>) -> Self {
        Self {
            stack: resolver.map(MiddlewareResolver::resolve).unwrap_or_default(),
        }
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Wrap `terminal` with every middleware in order (outer-to-inner).
    pub fn run(&self, bale: &Bale, terminal: &mut dyn FnMut(&Bale) -> Result<()>) -> Result<()> {
        Next {
            remaining: &self.stack,
            terminal,
        }
        .run(bale)
    }
}
