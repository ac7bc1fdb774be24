//! Process-wide cache of compiled decoders.
//!
//! Reads go through an [`ArcSwap`] snapshot and take no lock. A miss compiles
//! outside of any lock and installs the result with a read-copy-update; when
//! two threads race on the same type both compile and the first install wins.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use arc_swap::ArcSwap;
use tracing::debug;

use super::{Bind, BindError, Decoder, Mode};

type Entry = Arc<dyn Any + Send + Sync>;
type Table = HashMap<(TypeId, Mode), Entry>;

static DECODERS: OnceLock<ArcSwap<Table>> = OnceLock::new();

fn table() -> &'static ArcSwap<Table> {
    DECODERS.get_or_init(|| ArcSwap::from_pointee(HashMap::new()))
}

/// Returns the decoder of `T` for `mode`, compiling it on first use.
pub fn decoder<T: Bind>(mode: Mode) -> Result<Arc<Decoder<T>>, BindError> {
    let key = (TypeId::of::<T>(), mode);

    if let Some(entry) = table().load().get(&key) {
        if let Ok(decoder) = Arc::clone(entry).downcast::<Decoder<T>>() {
            return Ok(decoder);
        }
    }

    let decoder = Arc::new(Decoder::<T>::compile(mode)?);
    debug!(
        target_type = type_name::<T>(),
        ?mode,
        fields = decoder.len(),
        "compiled bind decoder"
    );

    let entry: Entry = decoder.clone();
    let previous = table().rcu(|current| {
        let mut next = Table::clone(current);
        next.entry(key).or_insert_with(|| Arc::clone(&entry));
        next
    });

    // `previous` already holds the entry of a thread that installed first.
    match previous.get(&key).map(|e| Arc::clone(e).downcast::<Decoder<T>>()) {
        Some(Ok(installed)) => Ok(installed),
        _ => Ok(decoder),
    }
}

/// Number of cached decoders, across all types and modes.
pub fn cached_decoders() -> usize {
    table().load().len()
}
