/// Returns whether `byte` is copied into an unquoted field: printable ASCII
/// except comma and double quote, and bytes above `0x7f` when asked to.
#[inline]
pub(crate) fn is_unquoted_content(byte: u8, keep_non_ascii: bool) -> bool {
    matches!(byte, b' ' | b'!' | b'#'..=b'+' | b'-'..=b'~') || (keep_non_ascii && byte > 0x7f)
}

/// Iterate over the runs of `bytes` made of unquoted field content.
#[inline]
pub(crate) fn unquoted_runs(bytes: &[u8], keep_non_ascii: bool) -> impl Iterator<Item = &[u8]> {
    bytes
        .split(move |byte| !is_unquoted_content(*byte, keep_non_ascii))
        .filter(|run| !run.is_empty())
}
