//! Cycle-to-first broadcasting of short parameter lists.
//!
//! Parameter lists are walked in lock-step with a longer driving list. Whenever the walk
//! reaches the current end of a parameter list, a copy of the list's *first* element is
//! appended. Every index at or past the original length therefore resolves to the
//! original first element, never to the last-seen one.

use crate::error::{AppResult, ToroError};

/// Extends `list` to at least `len` elements, cycling to the first entry.
///
/// `name` labels the list in the `ParameterListEmpty` error raised when there is no seed
/// element to cycle. A `len` of zero never needs a seed and succeeds on any list.
pub fn broadcast<T: Clone>(list: &[T], len: usize, name: &'static str) -> AppResult<Vec<T>> {
    if len == 0 {
        return Ok(list.to_vec());
    }
    let mut out = list.to_vec();
    for i in 0..len {
        if i == out.len() {
            let seed = out.first().cloned().ok_or(ToroError::ParameterListEmpty(name))?;
            out.push(seed);
        }
    }
    Ok(out)
}
