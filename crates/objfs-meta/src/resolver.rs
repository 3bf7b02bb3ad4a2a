//! Range resolution
//!
//! Answers "which backing objects may hold bytes of `[offset, offset + length)`?"
//!
//! Each descriptor covers two spans: the materialized span
//! `[offset, offset + length)` of bytes already written, and the capacity
//! span `[offset, offset + object_size)` that a later append may still grow
//! into. A requested position that falls in either span belongs to that
//! object.
//!
//! An object can only grow up to where the next object starts, so its
//! capacity span is cut at the next descriptor's offset. Only the last
//! object keeps its full capacity span. A short object in the middle of the
//! file therefore never claims bytes that belong to its successor.

use crate::types::ObjectDescriptor;

/// Resolve a byte range against descriptors visited in ascending offset order.
///
/// A descriptor is selected when it holds the start of the range, when it
/// holds the end of the range, or when it lies between a found start and the
/// end. Each descriptor is selected at most once, so the result is ordered
/// and free of duplicates. An empty result means the range lies beyond the
/// end of the file.
pub fn resolve<'a, I>(descriptors: I, object_size: u64, offset: u64, length: u64) -> Vec<ObjectDescriptor>
where
    I: IntoIterator<Item = &'a ObjectDescriptor>,
{
    let start_data = offset;
    let end_data = offset.saturating_add(length);
    let mut found_start = false;
    let mut selected = Vec::new();

    let mut descriptors = descriptors.into_iter().peekable();
    while let Some(descriptor) = descriptors.next() {
        let capacity_end = descriptors.peek().map_or_else(
            || descriptor.capacity_end(object_size),
            |next| descriptor.capacity_end(object_size).min(next.offset),
        );

        if descriptor.may_contain(start_data, capacity_end) {
            found_start = true;
            selected.push(descriptor.clone());
        } else if descriptor.may_contain(end_data, capacity_end)
            || (found_start && end_data >= descriptor.offset)
        {
            selected.push(descriptor.clone());
        }
    }

    selected
}
