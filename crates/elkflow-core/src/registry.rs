//! Scoped identity contexts.
//!
//! A [`Registry`] hands out stable UUID strings to elements that lack an explicit id. Contexts
//! form a per-thread stack: entering pushes, dropping the guard pops, and
//! [`Registry::current`] returns the innermost one. Contexts are entered around synchronous
//! work only (serialization, indexing, validation) and are never held across an `.await`.

use crate::model::{ElementKey, ElementTree};
use crate::{Error, Result};
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::marker::PhantomData;
use std::rc::Rc;

thread_local! {
    static CONTEXTS: RefCell<Vec<Registry>> = const { RefCell::new(Vec::new()) };
}

/// Identity context. Clones share the same id table.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    ids: Rc<RefCell<FxHashMap<(u64, ElementKey), String>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes this context; it stays current until the returned guard is dropped.
    #[must_use = "the registry is popped as soon as the guard is dropped"]
    pub fn enter(&self) -> RegistryGuard {
        let depth = CONTEXTS.with(|stack| {
            let mut stack = stack.borrow_mut();
            stack.push(self.clone());
            stack.len()
        });
        RegistryGuard {
            depth,
            _not_send: PhantomData,
        }
    }

    /// Runs `f` with this context current.
    pub fn scope<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.enter();
        f()
    }

    pub fn current() -> Result<Registry> {
        Self::try_current().ok_or(Error::Registry)
    }

    pub fn try_current() -> Option<Registry> {
        CONTEXTS.with(|stack| stack.borrow().last().cloned())
    }

    /// Number of active contexts on this thread.
    pub fn depth() -> usize {
        CONTEXTS.with(|stack| stack.borrow().len())
    }

    /// The id of `key` in this context, assigning a fresh UUID on first request.
    pub fn get_id(&self, tree: &ElementTree, key: impl Into<ElementKey>) -> String {
        self.ids
            .borrow_mut()
            .entry((tree.uid(), key.into()))
            .or_insert_with(|| uuid::Uuid::new_v4().to_string())
            .clone()
    }

    /// The id previously assigned to `key`, without assigning one.
    pub fn peek_id(&self, tree: &ElementTree, key: impl Into<ElementKey>) -> Option<String> {
        self.ids.borrow().get(&(tree.uid(), key.into())).cloned()
    }

    /// Looks `key` up in the current context.
    ///
    /// Without an active context this fails with [`Error::Registry`], or returns `Ok(None)` when
    /// `error_if_none` is `false`.
    pub fn current_id(
        tree: &ElementTree,
        key: impl Into<ElementKey>,
        error_if_none: bool,
    ) -> Result<Option<String>> {
        match Self::try_current() {
            Some(registry) => Ok(Some(registry.get_id(tree, key))),
            None if error_if_none => Err(Error::Registry),
            None => Ok(None),
        }
    }

    pub fn len(&self) -> usize {
        self.ids.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ptr_eq(&self, other: &Registry) -> bool {
        Rc::ptr_eq(&self.ids, &other.ids)
    }
}

/// Keeps a [`Registry`] on the context stack; not `Send` so it cannot outlive its thread.
#[derive(Debug)]
pub struct RegistryGuard {
    depth: usize,
    _not_send: PhantomData<*const ()>,
}

impl Drop for RegistryGuard {
    fn drop(&mut self) {
        CONTEXTS.with(|stack| {
            let mut stack = stack.borrow_mut();
            debug_assert_eq!(stack.len(), self.depth, "registry guards dropped out of order");
            stack.truncate(self.depth.saturating_sub(1));
        });
    }
}
