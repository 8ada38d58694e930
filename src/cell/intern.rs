//! Process-wide symbol interning

use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

static GLOBAL: OnceLock<SymbolTable> = OnceLock::new();

/// Set of shared symbol names; equal names resolve to one allocation
#[derive(Default)]
pub struct SymbolTable {
    names: RwLock<HashSet<Arc<str>>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The table used by symbol and keyword cells
    pub fn global() -> &'static SymbolTable {
        GLOBAL.get_or_init(SymbolTable::new)
    }

    pub fn intern(&self, name: &str) -> Arc<str> {
        if let Some(existing) = self.names.read().get(name) {
            return existing.clone();
        }
        let mut names = self.names.write();
        if let Some(existing) = names.get(name) {
            return existing.clone();
        }
        let shared: Arc<str> = Arc::from(name);
        names.insert(shared.clone());
        shared
    }

    pub fn len(&self) -> usize {
        self.names.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Intern `name` in the global table
pub fn intern(name: &str) -> Arc<str> {
    SymbolTable::global().intern(name)
}
