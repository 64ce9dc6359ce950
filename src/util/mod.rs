//! Utility types shared across scriptrace.
//!
//! - [`BBox`] - Axis-aligned bounding box over glam vectors
//! - [`Error`] / [`Result`] - Error handling
//! - [`next_id`] - Process-wide resource ids

mod error;
mod math;

pub use error::*;
pub use math::*;

use std::sync::atomic::{AtomicU64, Ordering};

/// Handle naming a model, image or BVH. Handles equal the object's own id.
pub type Handle = u64;

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

/// Allocate a globally unique, monotonically increasing id.
#[inline]
pub fn next_id() -> Handle {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_increase() {
        let a = next_id();
        let b = next_id();
        assert!(b > a);
    }
}
