//! Free-list for segment vectors.
//!
//! Patterns draw their segment storage from here when compiled or cloned and
//! hand it back when dropped, so registering and tearing down routes in a loop
//! does not reallocate.

use parking_lot::Mutex;

use crate::pattern::Segment;

/// Upper bound on retained vectors.
const MAX_POOLED: usize = 64;

static POOL: Mutex<Vec<Vec<Segment>>> = parking_lot::const_mutex(Vec::new());

/// Takes an empty segment vector from the pool, or a fresh one.
pub(crate) fn acquire() -> Vec<Segment> {
    POOL.lock().pop().unwrap_or_default()
}

/// Clears `segments` and returns it to the pool.
pub(crate) fn release(mut segments: Vec<Segment>) {
    if segments.capacity() == 0 {
        return;
    }
    segments.clear();

    let mut pool = POOL.lock();
    if pool.len() < MAX_POOLED {
        pool.push(segments);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{ConstSegment, Segment};

    #[test]
    fn test_released_vectors_come_back_empty() {
        let mut segments = acquire();
        segments.push(Segment::Const(ConstSegment {
            value: "/pooled".into(),
            has_optional_slash: false,
        }));
        release(segments);

        // Other tests share the pool, so only the emptiness is asserted.
        let reused = acquire();
        assert!(reused.is_empty());
        release(reused);
    }
}
