//! Computed Implementation
//!
//! A Computed is a cached derived value that re-evaluates only when one of
//! its dependencies changed and someone reads it.
//!
//! # How Computeds Work
//!
//! 1. Construction creates a lazy effect around the getter. Nothing runs yet
//!    and the cell starts dirty.
//!
//! 2. Reading a dirty cell runs the effect, caches the result and clears the
//!    dirty flag. Reading a clean cell returns the cache.
//!
//! 3. When a dependency changes, the effect's scheduler marks the cell dirty
//!    and notifies the cell's own subscribers. It never recomputes eagerly.
//!
//! A computed is itself a tracked source (keyed on [`Key::Value`]), so a
//! computed read inside another effect or computed composes.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::warn;

use super::effect::{Effect, EffectOptions};
use super::runtime::Runtime;
use crate::graph::{Key, SourceId, Trigger};

type Setter<T> = Box<dyn Fn(T)>;

struct ComputedInner<T> {
    source: SourceId,
    value: RefCell<Option<T>>,
    dirty: Cell<bool>,
    effect: Effect,
    setter: Option<Setter<T>>,
}

impl<T> Drop for ComputedInner<T> {
    fn drop(&mut self) {
        self.effect.stop();
        Runtime::forget_source(self.source);
    }
}

/// A cached derived value.
///
/// # Example
///
/// ```rust,ignore
/// let count = r#ref(2);
/// let view = count.clone();
/// let doubled = computed(move || view.get().as_f64().unwrap_or_default() * 2.0);
///
/// assert_eq!(doubled.get(), 4.0);
///
/// count.set(5);
/// assert_eq!(doubled.get(), 10.0);
/// ```
pub struct Computed<T: 'static> {
    inner: Rc<ComputedInner<T>>,
}

impl<T: 'static> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + 'static> Computed<T> {
    /// Create a read-only computed from a getter.
    pub fn new<F>(getter: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        Self::build(getter, None)
    }

    /// Create a computed with a setter for writes.
    pub fn with_setter<F, S>(getter: F, setter: S) -> Self
    where
        F: Fn() -> T + 'static,
        S: Fn(T) + 'static,
    {
        Self::build(getter, Some(Box::new(setter)))
    }

    fn build<F>(getter: F, setter: Option<Setter<T>>) -> Self
    where
        F: Fn() -> T + 'static,
    {
        let inner = Rc::new_cyclic(|weak: &std::rc::Weak<ComputedInner<T>>| {
            let for_run = weak.clone();
            let for_schedule = weak.clone();

            let options = EffectOptions::default()
                .lazy()
                .with_scheduler(move |_| {
                    let Some(inner) = for_schedule.upgrade() else {
                        return;
                    };
                    if !inner.dirty.get() {
                        inner.dirty.set(true);
                        Runtime::trigger(inner.source, Trigger::set(Key::Value));
                    }
                });

            let effect = Effect::with_options(
                move || {
                    let value = getter();
                    if let Some(inner) = for_run.upgrade() {
                        *inner.value.borrow_mut() = Some(value);
                    }
                },
                options,
            );

            ComputedInner {
                source: SourceId::new(),
                value: RefCell::new(None),
                dirty: Cell::new(true),
                effect,
                setter,
            }
        });

        Self { inner }
    }

    /// Get the value, recomputing first if a dependency changed.
    ///
    /// Returns `None` only when the getter reads its own cell before it has
    /// ever produced a value.
    pub fn try_get(&self) -> Option<T> {
        if self.inner.dirty.get() {
            self.inner.effect.run();
            self.inner.dirty.set(false);
        }

        Runtime::track(self.inner.source, Key::Value);

        let value = self.inner.value.borrow().clone();
        if value.is_none() {
            warn!(source = ?self.inner.source, "computed read from inside its own first evaluation");
        }
        value
    }

    /// Write through the setter.
    ///
    /// A getter-only computed rejects the write and logs a warning.
    pub fn set(&self, value: T) {
        match &self.inner.setter {
            Some(setter) => setter(value),
            None => warn!("write operation failed: computed value is readonly"),
        }
    }
}

impl<T: Clone + Default + 'static> Computed<T> {
    /// Get the value, recomputing first if a dependency changed.
    ///
    /// A getter that reads its own cell during its first evaluation sees
    /// `T::default()`.
    pub fn get(&self) -> T {
        self.try_get().unwrap_or_default()
    }
}

impl<T: 'static> Computed<T> {
    /// Whether the next read recomputes.
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    /// The source id dependents subscribe to.
    pub fn source(&self) -> SourceId {
        self.inner.source
    }

    /// The lazy effect wrapping the getter.
    pub fn effect(&self) -> &Effect {
        &self.inner.effect
    }

    pub fn has_setter(&self) -> bool {
        self.inner.setter.is_some()
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("source", &self.inner.source)
            .field("dirty", &self.inner.dirty.get())
            .field("value", &self.inner.value.borrow())
            .finish()
    }
}

/// Create a read-only computed.
pub fn computed<T, F>(getter: F) -> Computed<T>
where
    T: Clone + 'static,
    F: Fn() -> T + 'static,
{
    Computed::new(getter)
}

/// Create a writable computed from a getter and a setter.
pub fn computed_with<T, F, S>(getter: F, setter: S) -> Computed<T>
where
    T: Clone + 'static,
    F: Fn() -> T + 'static,
    S: Fn(T) + 'static,
{
    Computed::with_setter(getter, setter)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
