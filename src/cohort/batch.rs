//! Splitting id lists to fit the store's `In` predicate limit.

/// Splits `items` into consecutive chunks of at most `size` (minimum 1).
///
/// Produces `ceil(len / size)` chunks whose concatenation is `items`.
pub fn chunk<T: Clone>(items: &[T], size: usize) -> Vec<Vec<T>> {
    items.chunks(size.max(1)).map(<[T]>::to_vec).collect()
}
