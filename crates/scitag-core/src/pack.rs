//! Fixed-length packing of token sequences.

/// Truncate or right-pad `items` to exactly `max_length` elements.
///
/// Without markers the earliest `max_length` items are kept. With
/// `markers = Some((start, end))` the result is
/// `[start] + items[..max_length - 2] + [end]` followed by padding; the
/// markers count toward `max_length` and are themselves cut when
/// `max_length < 2`.
///
/// # Examples
/// ```
/// use scitag_core::pack::pack_to_length;
///
/// let tokens = ["a", "b", "c"];
/// assert_eq!(pack_to_length(&tokens, 5, &"<PAD>", None), ["a", "b", "c", "<PAD>", "<PAD>"]);
/// assert_eq!(
///     pack_to_length(&tokens, 4, &"<PAD>", Some((&"<SOS>", &"<EOS>"))),
///     ["<SOS>", "a", "b", "<EOS>"]
/// );
/// ```
pub fn pack_to_length<T: Clone>(
    items: &[T],
    max_length: usize,
    pad: &T,
    markers: Option<(&T, &T)>,
) -> Vec<T> {
    let mut packed = Vec::with_capacity(max_length.max(2));

    match markers {
        None => packed.extend_from_slice(&items[..items.len().min(max_length)]),
        Some((start, end)) => {
            let body = max_length.saturating_sub(2).min(items.len());
            packed.push(start.clone());
            packed.extend_from_slice(&items[..body]);
            packed.push(end.clone());
            packed.truncate(max_length);
        }
    }

    packed.resize(max_length, pad.clone());
    packed
}

/// Number of leading items of `packed` that are not padding.
pub fn unpadded_len<T: PartialEq>(packed: &[T], pad: &T) -> usize {
    packed.iter().position(|item| item == pad).unwrap_or(packed.len())
}
