//! Deferred invocables attached to a chain.
//!
//! A [`Hook`] is "a thing callable later with the chain as argument":
//! either a plain closure or a single-method invokable object. Hooks are
//! stored as data on the builder and the chain, and only run when the
//! chain reaches a terminal state. Equality is by wrapped reference, so
//! overwriting a hook can be observed without calling it.

use std::fmt;
use std::sync::Arc;

use anyhow::Result;

use crate::chain::Chain;

/// A single-method invokable object, the non-closure form of a hook.
pub trait Invokable: Send + Sync {
    fn invoke(&self, chain: &Chain) -> Result<()>;
}

/// A deferred invocation stored on a chain: success, failure and
/// always-run hooks are all represented this way.
#[derive(Clone)]
pub enum Hook {
    /// A plain closure.
    Closure(Arc<dyn Fn(&Chain) -> Result<()> + Send + Sync>),
    /// An invokable object resolved through [`Invokable::invoke`].
    Invokable(Arc<dyn Invokable>),
}

impl Hook {
    /// Wrap a closure as a hook.
    pub fn from_fn(f: impl Fn(&Chain) -> Result<()> + Send + Sync + 'static) -> Self {
        Hook::Closure(Arc::new(f))
    }

    /// Wrap an invokable object as a hook.
    pub fn from_invokable(obj: Arc<dyn Invokable>) -> Self {
        Hook::Invokable(obj)
    }

    /// Run the hook with the chain as context.
    pub fn invoke(&self, chain: &Chain) -> Result<()> {
        match self {
            Hook::Closure(f) => f(chain),
            Hook::Invokable(obj) => obj.invoke(chain),
        }
    }
}

// Hooks compare by wrapped reference, not by behavior. Two hooks built
// from the same Arc are equal; everything else is not.
impl PartialEq for Hook {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Hook::Closure(a), Hook::Closure(b)) => Arc::ptr_eq(a, b),
            (Hook::Invokable(a), Hook::Invokable(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hook::Closure(_) => f.write_str("Hook::Closure(..)"),
            Hook::Invokable(_) => f.write_str("Hook::Invokable(..)"),
        }
    }
}

/// Executes a stored hook with the chain as argument.
///
/// The engine talks to hooks only through this trait so that callers can
/// observe or redirect hook execution. Failures inside a hook are
/// surfaced to the caller but never alter the chain's terminal status.
pub trait HookInvoker: Send + Sync {
    fn invoke(&self, hook: &Hook, chain: &Chain) -> Result<()>;
}

/// Default invoker: calls the hook directly, in-process.
pub struct DirectHookInvoker;

impl HookInvoker for DirectHookInvoker {
    fn invoke(&self, hook: &Hook, chain: &Chain) -> Result<()> {
        hook.invoke(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use anyhow::bail;

    fn empty_chain() -> Chain {
        Chain::new(0)
    }

    #[test]
    fn closure_hook_invokes_with_chain() {
        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);

        let hook = Hook::from_fn(move |chain| {
            seen_clone.lock().unwrap().push(chain.id.clone());
            Ok(())
        });

        let chain = empty_chain();
        hook.invoke(&chain).unwrap();

        assert_eq!(seen.lock().unwrap().as_slice(), [chain.id.clone()]);
    }

    struct MarkerInvokable {
        hits: Mutex<u32>,
    }

    impl Invokable for MarkerInvokable {
        fn invoke(&self, _chain: &Chain) -> Result<()> {
            *self.hits.lock().unwrap() += 1;
            Ok(())
        }
    }

    #[test]
    fn invokable_hook_invokes_object() {
        let obj = Arc::new(MarkerInvokable {
            hits: Mutex::new(0),
        });
        let hook = Hook::from_invokable(obj.clone());

        hook.invoke(&empty_chain()).unwrap();
        hook.invoke(&empty_chain()).unwrap();

        assert_eq!(*obj.hits.lock().unwrap(), 2);
    }

    #[test]
    fn hook_equality_is_by_wrapped_reference() {
        let f: Arc<dyn Fn(&Chain) -> Result<()> + Send + Sync> = Arc::new(|_| Ok(()));
        let a = Hook::Closure(Arc::clone(&f));
        let b = Hook::Closure(f);
        assert_eq!(a, b);

        // Structurally identical but separately allocated closures differ.
        let c = Hook::from_fn(|_| Ok(()));
        let d = Hook::from_fn(|_| Ok(()));
        assert_ne!(c, d);

        let obj = Arc::new(MarkerInvokable {
            hits: Mutex::new(0),
        });
        let e = Hook::from_invokable(obj.clone());
        let g = Hook::from_invokable(obj);
        assert_eq!(e, g);
        assert_ne!(e, c);
    }

    #[test]
    fn hook_errors_propagate() {
        let hook = Hook::from_fn(|_| bail!("hook exploded"));
        let err = hook.invoke(&empty_chain()).unwrap_err();
        assert!(err.to_string().contains("hook exploded"));
    }

    #[test]
    fn direct_invoker_delegates() {
        let hook = Hook::from_fn(|_| Ok(()));
        assert!(DirectHookInvoker.invoke(&hook, &empty_chain()).is_ok());
    }

    #[test]
    fn hook_debug_names_variant() {
        assert_eq!(format!("{:?}", Hook::from_fn(|_| Ok(()))), "Hook::Closure(..)");
    }
}
