//! Evaluation environments
//!
//! An [`Env`] is a cheaply clonable handle to a frame of bindings with an
//! optional parent. Closures keep a handle to the frame they were created in.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::lang::value::Value;

struct Frame {
    bindings: RwLock<IndexMap<String, Value>>,
    parent: Option<Env>,
}

/// Handle to an environment frame
#[derive(Clone)]
pub struct Env(Arc<Frame>);

/// Copy of one frame's bindings, see [`Env::snapshot`]
#[derive(Debug, Clone)]
pub struct Snapshot(IndexMap<String, Value>);

impl Env {
    /// Create an empty frame. Pass `None` for a top-level environment.
    pub fn new(parent: Option<&Env>) -> Self {
        Env(Arc::new(Frame {
            bindings: RwLock::new(IndexMap::new()),
            parent: parent.cloned(),
        }))
    }

    /// Bind `name` in this frame, replacing any previous binding
    pub fn define(
        &self,
        name: impl Into<String>,
        value: Value,
    ) {
        self.0.bindings.write().insert(name.into(), value);
    }

    /// Look `name` up through this frame and its ancestors
    pub fn get(
        &self,
        name: &str,
    ) -> Option<Value> {
        let mut env = self;
        loop {
            if let Some(value) = env.0.bindings.read().get(name) {
                return Some(value.clone());
            }
            env = env.0.parent.as_ref()?;
        }
    }

    /// Whether `name` is bound directly in this frame
    pub fn contains(
        &self,
        name: &str,
    ) -> bool {
        self.0.bindings.read().contains_key(name)
    }

    /// Names bound in this frame, in definition order
    pub fn names(&self) -> Vec<String> {
        self.0.bindings.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.0.bindings.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Capture this frame's bindings so a failed evaluation can be undone
    pub fn snapshot(&self) -> Snapshot {
        Snapshot(self.0.bindings.read().clone())
    }

    /// Put back bindings captured by [`Env::snapshot`]
    pub fn restore(
        &self,
        snapshot: Snapshot,
    ) {
        *self.0.bindings.write() = snapshot.0;
    }

    /// Drop every binding in this frame.
    ///
    /// Closures stored in a frame hold a handle to that same frame; clearing
    /// is what lets a discarded environment actually be freed.
    pub fn clear(&self) {
        let drained = std::mem::take(&mut *self.0.bindings.write());
        drop(drained);
    }

    pub fn ptr_eq(
        &self,
        other: &Env,
    ) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Env {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Env")
            .field("bindings", &self.len())
            .field("has_parent", &self.0.parent.is_some())
            .finish()
    }
}
