//! Reactive Context
//!
//! The reactive context tracks which effect is currently running.
//! This enables automatic dependency tracking: when a tracked source is read,
//! the effect on top of the stack is registered as a dependent.
//!
//! # Implementation
//!
//! We use a thread-local stack of running effects. Entering a context pushes
//! the effect and returns a guard; dropping the guard pops it, so the
//! enclosing effect becomes the attribution target again on every exit path,
//! including unwinding.
//!
//! The stack doubles as the reentrancy guard: an effect that is already on
//! the stack is not run again.

use std::cell::RefCell;

use super::{Effect, SubscriberId};

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<Effect>> = const { RefCell::new(Vec::new()) };
}

/// Guard that pops the context when dropped.
pub struct ReactiveContext {
    subscriber_id: SubscriberId,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given effect.
    ///
    /// While this context is active, reads of tracked sources register the
    /// effect as a dependent. The context is exited when the guard drops.
    pub fn enter(effect: &Effect) -> Self {
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(effect.clone()));
        Self {
            subscriber_id: effect.id(),
        }
    }

    /// Check if there is an active reactive context.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// The effect reads are currently attributed to, if any.
    pub fn current() -> Option<Effect> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().cloned())
    }

    /// Get the current subscriber ID, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().map(Effect::id))
    }

    /// Whether the effect is running somewhere up the stack.
    pub fn contains(subscriber_id: SubscriberId) -> bool {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .iter()
                .any(|effect| effect.id() == subscriber_id)
        })
    }

    /// Number of effects currently running.
    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        // The stack may already be gone during thread teardown.
        let _ = CONTEXT_STACK.try_with(|stack| {
            let popped = stack.borrow_mut().pop();

            if let Some(effect) = popped {
                debug_assert_eq!(
                    effect.id(),
                    self.subscriber_id,
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    self.subscriber_id,
                    effect.id()
                );
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_tracks_effect() {
        let effect = Effect::new_lazy(|| {});

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_subscriber().is_none());

        {
            let _ctx = ReactiveContext::enter(&effect);

            assert!(ReactiveContext::is_active());
            assert_eq!(ReactiveContext::current_subscriber(), Some(effect.id()));
            assert!(ReactiveContext::contains(effect.id()));
        }

        // Context should be cleaned up after drop
        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current().is_none());
        assert!(!ReactiveContext::contains(effect.id()));
    }

    #[test]
    fn nested_contexts() {
        let outer = Effect::new_lazy(|| {});
        let inner = Effect::new_lazy(|| {});

        {
            let _ctx1 = ReactiveContext::enter(&outer);
            assert_eq!(ReactiveContext::current_subscriber(), Some(outer.id()));

            {
                let _ctx2 = ReactiveContext::enter(&inner);
                assert_eq!(ReactiveContext::current_subscriber(), Some(inner.id()));
                assert_eq!(ReactiveContext::depth(), 2);
                assert!(ReactiveContext::contains(outer.id()));
            }

            // After inner context drops, outer should be current
            assert_eq!(ReactiveContext::current_subscriber(), Some(outer.id()));
        }

        assert!(ReactiveContext::current_subscriber().is_none());
    }

    #[test]
    fn context_is_restored_after_panic() {
        let effect = Effect::new_lazy(|| {});

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ctx = ReactiveContext::enter(&effect);
            panic!("computation failed");
        }));

        assert!(result.is_err());
        assert_eq!(ReactiveContext::depth(), 0);
    }
}
