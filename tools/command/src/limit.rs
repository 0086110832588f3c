//! Line-based output truncation.

use std::num::NonZeroUsize;

/// Line limit used when nothing else is configured.
pub const DEFAULT_MAX_LINES: NonZeroUsize = match NonZeroUsize::new(1000) {
    Some(lines) => lines,
    None => unreachable!(),
};

/// Keeps at most `max_lines` newline-separated segments of `text`.
///
/// Segments are split on `\n` only and nothing is stripped, so a trailing newline
/// counts as the start of one more (empty) segment. Returns the kept prefix and
/// whether anything was cut. Empty input is returned unchanged.
#[must_use]
pub fn limit_lines(text: &str, max_lines: usize) -> (&str, bool) {
    if text.is_empty() {
        return (text, false);
    }
    let Some(last_kept) = max_lines.checked_sub(1) else {
        return ("", true);
    };
    // The n-th newline ends the n-th segment.
    match text.match_indices('\n').nth(last_kept) {
        Some((cut, _)) => (&text[..cut], true),
        None => (text, false),
    }
}

/// Bounds captured output to a fixed number of lines.
///
/// Applied to stdout and stderr independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputLimiter {
    max_lines: NonZeroUsize,
}

impl OutputLimiter {
    /// Creates a limiter keeping at most `max_lines` lines.
    #[must_use]
    pub const fn new(max_lines: NonZeroUsize) -> Self {
        Self { max_lines }
    }

    /// The configured line limit.
    #[must_use]
    pub const fn max_lines(&self) -> NonZeroUsize {
        self.max_lines
    }

    /// See [`limit_lines`].
    #[must_use]
    pub fn limit<'a>(&self, text: &'a str) -> (&'a str, bool) {
        limit_lines(text, self.max_lines.get())
    }
}

impl Default for OutputLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINES)
    }
}
