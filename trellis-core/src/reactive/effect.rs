//! Effect Implementation
//!
//! An Effect is a reusable, reentrancy-guarded computation that re-runs
//! whenever one of the sources it read changes.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies (unless it is lazy).
//!
//! 2. While it runs, the effect sits on the reactive context stack, so every
//!    tracked read is attributed to it and not to an enclosing effect.
//!
//! 3. When a dependency changes, the effect is re-run synchronously, or
//!    handed to its scheduler callback if it has one.
//!
//! # Reentrancy
//!
//! Running an effect that is already on the context stack is a no-op. This
//! stops a computation that both reads and writes the same field from
//! re-triggering itself forever.
//!
//! # Disposal
//!
//! Dependencies are not pruned on re-run. [`Effect::stop`] deactivates the
//! effect and removes it from every entry of the dependency graph it joined.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use super::context::ReactiveContext;
use super::runtime::Runtime;
use super::subscriber::SubscriberId;
use crate::graph::{Key, SourceId};

/// Custom scheduling callback, called instead of running the effect when a
/// dependency changes.
pub type SchedulerFn = Rc<dyn Fn(&Effect)>;

/// Options for [`Effect::with_options`].
#[derive(Clone, Default)]
pub struct EffectOptions {
    /// Do not run the effect at creation.
    pub lazy: bool,
    /// Called on dependency change instead of re-running directly.
    pub scheduler: Option<SchedulerFn>,
}

impl EffectOptions {
    /// Defer the first run until the effect is invoked explicitly.
    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    /// Route re-runs through a custom scheduling callback.
    pub fn with_scheduler<F>(mut self, scheduler: F) -> Self
    where
        F: Fn(&Effect) + 'static,
    {
        self.scheduler = Some(Rc::new(scheduler));
        self
    }
}

impl fmt::Debug for EffectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectOptions")
            .field("lazy", &self.lazy)
            .field("scheduler", &self.scheduler.is_some())
            .finish()
    }
}

struct EffectInner {
    id: SubscriberId,
    raw: Box<dyn Fn()>,
    options: EffectOptions,
    active: Cell<bool>,
    run_count: Cell<usize>,
    /// Every `(source, key)` this effect subscribed to.
    dependencies: RefCell<Vec<(SourceId, Key)>>,
}

/// A side-effecting computation that runs when dependencies change.
///
/// Cloning an `Effect` yields another handle to the same unit.
///
/// # Example
///
/// ```rust,ignore
/// let state = reactive(&object([("count", 0.into())]));
///
/// let view = state.clone();
/// let effect = Effect::new(move || {
///     println!("Count is: {}", view.get("count"));
/// });
///
/// state.set("count", 5);  // Prints: "Count is: 5"
/// ```
#[derive(Clone)]
pub struct Effect {
    inner: Rc<EffectInner>,
}

impl Effect {
    /// Create a new effect and run it immediately.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() + 'static,
    {
        Self::with_options(run, EffectOptions::default())
    }

    /// Create a new effect without running it.
    pub fn new_lazy<F>(run: F) -> Self
    where
        F: Fn() + 'static,
    {
        Self::with_options(run, EffectOptions::default().lazy())
    }

    /// Create a new effect with explicit options.
    pub fn with_options<F>(run: F, options: EffectOptions) -> Self
    where
        F: Fn() + 'static,
    {
        let lazy = options.lazy;
        let effect = Self {
            inner: Rc::new(EffectInner {
                id: SubscriberId::new(),
                raw: Box::new(run),
                options,
                active: Cell::new(true),
                run_count: Cell::new(0),
                dependencies: RefCell::new(Vec::new()),
            }),
        };

        if !lazy {
            effect.run();
        }

        effect
    }

    /// Get the effect's creation id.
    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    /// Get the options the effect was created with.
    pub fn options(&self) -> &EffectOptions {
        &self.inner.options
    }

    /// Run the computation with this effect as the attribution target.
    ///
    /// Returns `false` without running if the effect is stopped or already
    /// running further up the stack.
    pub fn run(&self) -> bool {
        if !self.inner.active.get() {
            return false;
        }
        if ReactiveContext::contains(self.id()) {
            trace!(effect = %self.id(), "skipping reentrant effect run");
            return false;
        }

        let _ctx = ReactiveContext::enter(self);
        (self.inner.raw)();
        self.inner.run_count.set(self.inner.run_count.get() + 1);
        true
    }

    /// Notify the effect that a dependency changed.
    ///
    /// Hands the effect to its scheduler if it has one, otherwise runs it.
    pub fn schedule(&self) {
        match &self.inner.options.scheduler {
            Some(scheduler) => scheduler(self),
            None => {
                self.run();
            }
        }
    }

    /// Stop the effect and unsubscribe it from every dependency.
    pub fn stop(&self) {
        if !self.inner.active.replace(false) {
            return;
        }
        let dependencies = self.inner.dependencies.take();
        Runtime::untrack(self.id(), &dependencies);
    }

    /// Check if the effect is still active.
    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.get()
    }

    /// Get the number of dependencies.
    pub fn dependency_count(&self) -> usize {
        self.inner.dependencies.borrow().len()
    }

    /// Whether two handles refer to the same effect.
    pub fn ptr_eq(&self, other: &Effect) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn record_dependency(&self, source: SourceId, key: Key) {
        self.inner.dependencies.borrow_mut().push((source, key));
    }
}

impl PartialEq for Effect {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Effect {}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("active", &self.is_active())
            .finish()
    }
}

/// Create an effect from a computation and options.
///
/// Runs the computation immediately unless `options.lazy` is set.
pub fn effect<F>(run: F, options: EffectOptions) -> Effect
where
    F: Fn() + 'static,
{
    Effect::with_options(run, options)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> (Rc<Cell<i32>>, Rc<Cell<i32>>) {
        let count = Rc::new(Cell::new(0));
        (count.clone(), count)
    }

    #[test]
    fn effect_runs_on_creation() {
        let (run_count, run_count_clone) = counter();

        let _effect = Effect::new(move || {
            run_count_clone.set(run_count_clone.get() + 1);
        });

        // Effect should have run once on creation
        assert_eq!(run_count.get(), 1);
    }

    #[test]
    fn effect_lazy_does_not_run_on_creation() {
        let (run_count, run_count_clone) = counter();

        let effect = Effect::new_lazy(move || {
            run_count_clone.set(run_count_clone.get() + 1);
        });

        assert_eq!(run_count.get(), 0);
        assert_eq!(effect.run_count(), 0);

        // Manually execute
        assert!(effect.run());
        assert_eq!(run_count.get(), 1);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn effect_ids_follow_creation_order() {
        let first = Effect::new_lazy(|| {});
        let second = Effect::new_lazy(|| {});
        assert!(first.id() < second.id());
    }

    #[test]
    fn schedule_uses_custom_scheduler() {
        let scheduled = Rc::new(Cell::new(0));
        let scheduled_clone = scheduled.clone();

        let effect = Effect::with_options(
            || {},
            EffectOptions::default().with_scheduler(move |_| {
                scheduled_clone.set(scheduled_clone.get() + 1);
            }),
        );

        assert_eq!(effect.run_count(), 1);
        effect.schedule();
        assert_eq!(scheduled.get(), 1);
        // The scheduler decides; the effect itself did not re-run.
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn reentrant_run_is_skipped() {
        let slot: Rc<RefCell<Option<Effect>>> = Rc::new(RefCell::new(None));
        let slot_clone = slot.clone();
        let inner_result = Rc::new(Cell::new(true));
        let inner_result_clone = inner_result.clone();

        let effect = Effect::new_lazy(move || {
            if let Some(me) = slot_clone.borrow().as_ref() {
                inner_result_clone.set(me.run());
            }
        });
        *slot.borrow_mut() = Some(effect.clone());

        assert!(effect.run());
        assert!(!inner_result.get());
        assert_eq!(effect.run_count(), 1);

        slot.borrow_mut().take();
    }

    #[test]
    fn effect_does_not_run_after_stop() {
        let (run_count, run_count_clone) = counter();

        let effect = Effect::new(move || {
            run_count_clone.set(run_count_clone.get() + 1);
        });
        assert_eq!(run_count.get(), 1);

        effect.stop();
        assert!(!effect.is_active());

        effect.schedule();
        assert!(!effect.run());
        assert_eq!(run_count.get(), 1);
    }

    #[test]
    fn effect_clone_shares_state() {
        let effect1 = Effect::new(|| {});
        let effect2 = effect1.clone();

        assert_eq!(effect1.id(), effect2.id());
        assert!(effect1.ptr_eq(&effect2));

        effect1.run();
        assert_eq!(effect2.run_count(), 2);

        effect1.stop();
        assert!(!effect2.is_active());
    }

    #[test]
    fn options_debug_hides_callback() {
        let options = EffectOptions::default().lazy().with_scheduler(|_| {});
        let rendered = format!("{options:?}");
        assert!(rendered.contains("lazy: true"));
        assert!(rendered.contains("scheduler: true"));
    }
}
