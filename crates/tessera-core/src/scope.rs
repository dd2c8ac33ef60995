// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Ordered cleanup lists that tie resources to the lifetime of their owner.
//!
//! A [`DisposalScope`] is the primitive every teardown in the crate is built
//! on: collections bind their components into one, components bind their own
//! resources into another, and the capability pools bind a single slot
//! cleanup per scope.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(0);

/// The identity of a [`DisposalScope`], shared by all of its handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u64);

type Cleanup = Box<dyn FnOnce()>;

struct ScopeInner {
    id: ScopeId,
    actions: RefCell<Vec<Cleanup>>,
    disposed: Cell<bool>,
}

/// An ordered list of cleanup actions executed once, newest first.
///
/// Cloning a `DisposalScope` yields another handle to the same list. Clearing
/// runs every pending action in reverse registration order and leaves the
/// scope usable; disposing does the same and additionally makes every later
/// [`add`](DisposalScope::add) run its action immediately.
///
/// # Example
///
/// ```rust
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use tessera_core::DisposalScope;
///
/// let log = Rc::new(RefCell::new(Vec::new()));
/// let scope = DisposalScope::new();
/// for i in 0..3 {
///     let log = log.clone();
///     scope.add(move || log.borrow_mut().push(i));
/// }
/// scope.clear();
/// assert_eq!(*log.borrow(), vec![2, 1, 0]);
/// ```
#[derive(Clone)]
pub struct DisposalScope {
    inner: Rc<ScopeInner>,
}

impl DisposalScope {
    /// Creates an empty, live scope.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(ScopeInner {
                id: ScopeId(NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed)),
                actions: RefCell::new(Vec::new()),
                disposed: Cell::new(false),
            }),
        }
    }

    /// Returns the identity shared by every handle to this scope.
    pub fn id(&self) -> ScopeId {
        self.inner.id
    }

    /// Registers a cleanup action.
    ///
    /// If the scope is already disposed the action runs right away.
    pub fn add(&self, action: impl FnOnce() + 'static) {
        if self.inner.disposed.get() {
            log::trace!("Scope {:?} is disposed; running cleanup immediately.", self.id());
            action();
            return;
        }
        self.inner.actions.borrow_mut().push(Box::new(action));
    }

    /// Binds `child` so that tearing this scope down also clears `child`.
    pub fn bind_child(&self, child: &DisposalScope) {
        let child = child.clone();
        self.add(move || child.clear());
    }

    /// Runs every pending action, newest first, and leaves the scope empty
    /// and usable.
    ///
    /// Actions registered while clearing are run before this returns. Calling
    /// `clear` from inside one of the actions is harmless.
    pub fn clear(&self) {
        loop {
            let actions = std::mem::take(&mut *self.inner.actions.borrow_mut());
            if actions.is_empty() {
                break;
            }
            log::trace!("Scope {:?}: running {} cleanup action(s).", self.id(), actions.len());
            for action in actions.into_iter().rev() {
                action();
            }
        }
    }

    /// Clears the scope and marks it disposed. Idempotent.
    pub fn dispose(&self) {
        self.inner.disposed.set(true);
        self.clear();
    }

    /// Returns `true` once [`dispose`](DisposalScope::dispose) has been called.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// Returns the number of pending cleanup actions.
    pub fn len(&self) -> usize {
        self.inner.actions.borrow().len()
    }

    /// Returns `true` if no cleanup action is pending.
    pub fn is_empty(&self) -> bool {
        self.inner.actions.borrow().is_empty()
    }

    /// Returns `true` if both handles refer to the same scope.
    pub fn ptr_eq(&self, other: &DisposalScope) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for DisposalScope {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DisposalScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisposalScope")
            .field("id", &self.inner.id)
            .field("pending", &self.len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
