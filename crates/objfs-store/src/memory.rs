//! Named in-memory stores for `memory://<name>/` URIs.
//!
//! Resolving the same `memory://` authority twice yields the same store, so a
//! binding created by the harness and one re-resolved by the compute engine see the
//! same objects within a process.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use object_store::memory::InMemory;
use parking_lot::Mutex;

static STORES: OnceLock<Mutex<HashMap<String, Arc<InMemory>>>> = OnceLock::new();

fn registry() -> &'static Mutex<HashMap<String, Arc<InMemory>>> {
    STORES.get_or_init(|| Mutex::new(HashMap::new()))
}

/// The shared store for `name`, created on first use.
pub fn shared_memory_store(name: &str) -> Arc<InMemory> {
    let mut stores = registry().lock();
    Arc::clone(
        stores
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(InMemory::new())),
    )
}
