//! Index-based insertion into existing declaration/instruction sequences.
//!
//! Indices refer to positions in the sequence as the caller last saw it. Each insertion
//! shifts later positions by one, so a running count of already-inserted items is added
//! to every subsequent index. Out-of-range indices append rather than fail.

use crate::error::AppResult;
use crate::program::broadcast::broadcast;
use crate::program::compiler::statement;
use tracing::{debug, trace};

/// Inserts `items[k]` at `indices[k] + k` for each `k`, in the order given.
///
/// `items` cycles to its first entry when shorter than `indices`. An index past
/// `len + 1` (or one whose shifted position would land past the end) appends instead.
/// The result always holds `sequence.len() + indices.len()` elements, and the original
/// elements keep their relative order.
///
/// # Errors
/// `ParameterListEmpty` when `items` is empty but `indices` is not.
pub fn insert_at_index<T: Clone>(
    sequence: &[T],
    items: &[T],
    indices: &[usize],
) -> AppResult<Vec<T>> {
    let items = broadcast(items, indices.len(), "items")?;
    let mut out = sequence.to_vec();
    for (cnt, (&index, item)) in indices.iter().zip(items).enumerate() {
        let len = out.len();
        let position = index + cnt;
        if index <= len + 1 && position <= len {
            trace!(index, position, "Inserting");
            out.insert(position, item);
        } else {
            trace!(index, len, "Index out of range; appending");
            out.push(item);
        }
    }
    debug!(
        inserted = indices.len(),
        total = out.len(),
        "Spliced sequence"
    );
    Ok(out)
}

/// Splices raw instruction bodies into an instruction sequence.
///
/// Each body is wrapped as a routine statement (`"\n\t\t<body>;"`) before insertion.
pub fn insert_instructions<S: AsRef<str>>(
    instructions: &[String],
    bodies: &[S],
    indices: &[usize],
) -> AppResult<Vec<String>> {
    let wrapped: Vec<String> = bodies.iter().map(|b| statement(b.as_ref())).collect();
    insert_at_index(instructions, &wrapped, indices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToroError;

    #[test]
    fn out_of_range_index_appends() {
        let out = insert_at_index(&["a", "b"], &["x"], &[10]).expect("splice");
        assert_eq!(out, vec!["a", "b", "x"]);
    }

    #[test]
    fn offsets_accumulate_across_insertions() {
        let out = insert_at_index(&["a", "b", "c", "d"], &["x", "y"], &[1, 2]).expect("splice");
        // "x" at 1, then "y" at 2 + 1.
        assert_eq!(out, vec!["a", "x", "b", "y", "c", "d"]);
    }

    #[test]
    fn short_item_list_cycles_to_first() {
        let out = insert_at_index(&[0, 0, 0], &[7, 8], &[0, 0, 0]).expect("splice");
        assert_eq!(out, vec![7, 8, 7, 0, 0, 0]);
    }

    #[test]
    fn shifted_position_past_end_appends() {
        // Index 3 passes the len+1 check but 3 + 1 lies past the end after the first insert.
        let out = insert_at_index(&["a", "b"], &["x", "y"], &[0, 3]).expect("splice");
        assert_eq!(out, vec!["x", "a", "b", "y"]);
    }

    #[test]
    fn preserves_original_order_and_length() {
        let original: Vec<u32> = (0..6).collect();
        let out = insert_at_index(&original, &[100], &[5, 0, 42, 2]).expect("splice");
        assert_eq!(out.len(), original.len() + 4);
        let kept: Vec<u32> = out.into_iter().filter(|v| *v < 100).collect();
        assert_eq!(kept, original);
    }

    #[test]
    fn empty_items_with_indices_fails() {
        let err = insert_at_index::<u8>(&[1], &[], &[0]).expect_err("no seed");
        assert!(matches!(err, ToroError::ParameterListEmpty("items")));
    }

    #[test]
    fn instruction_bodies_are_wrapped() {
        let existing = vec!["\n\t\tMoveL p0,v100,z50,tool0\\WObj:=wobj0;".to_string()];
        let out = insert_instructions(&existing, &["WaitTime 0.5"], &[1]).expect("splice");
        assert_eq!(out[1], "\n\t\tWaitTime 0.5;");
    }
}
