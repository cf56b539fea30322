//! Session Environment
//!
//! Owns the global environment user input is evaluated against.

use tracing::debug;

use crate::lang::{load_primitives, Env, Value};
use crate::session::backend_trait::SymbolInfo;

/// Owner of the current global environment
///
/// Exactly one environment is current at a time. [`reset`](Self::reset)
/// swaps in a fresh one holding only the built-in primitives.
#[derive(Debug)]
pub struct EnvironmentManager {
    env: Env,
    resets: usize,
}

impl Default for EnvironmentManager {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvironmentManager {
    pub fn new() -> Self {
        Self {
            env: pristine(),
            resets: 0,
        }
    }

    /// The active environment
    pub fn current(&self) -> &Env {
        &self.env
    }

    /// Discard every user binding
    pub fn reset(&mut self) {
        let old = std::mem::replace(&mut self.env, pristine());
        // closures defined at top level point back at the old frame
        old.clear();
        self.resets += 1;
        debug!(resets = self.resets, "environment reset");
    }

    /// How many times the environment has been reset
    pub fn resets(&self) -> usize {
        self.resets
    }

    /// User-visible bindings, built-in primitives excluded
    pub fn user_symbols(&self) -> Vec<SymbolInfo> {
        self.env
            .names()
            .into_iter()
            .filter_map(|name| {
                let value = self.env.get(&name)?;
                if matches!(value, Value::Primitive(_)) {
                    return None;
                }
                let kind = if value.is_callable() {
                    "function"
                } else {
                    value.type_name()
                };
                Some(SymbolInfo { name, kind })
            })
            .collect()
    }
}

impl Drop for EnvironmentManager {
    fn drop(&mut self) {
        self.env.clear();
    }
}

fn pristine() -> Env {
    let env = Env::new(None);
    load_primitives(&env);
    env
}
