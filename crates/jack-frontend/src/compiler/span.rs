#[derive(Copy, Clone, Default, PartialEq, Eq, Debug)]
/// A byte range of the source text.
pub struct Span {
    /// The byte offset of the first character.
    pub start: u32,
    /// The byte offset one past the last character.
    pub end: u32,
}

impl Span {
    /// Creates a span from byte offsets.
    pub fn new(start: usize, end: usize) -> Span {
        Span {
            start: start as u32,
            end: end as u32,
        }
    }

    /// Returns the text of the span, or an empty string if the span lies outside of `source`.
    pub fn text(self, source: &str) -> &str {
        source
            .get(self.start as usize..self.end as usize)
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{start}..{end}", start = self.start, end = self.end)
    }
}

/// Returns the text of the 1-based `line` of `source` without its line terminator.
pub fn line_text(source: &str, line: u32) -> Option<&str> {
    let idx = (line as usize).checked_sub(1)?;
    source
        .lines()
        .nth(idx)
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
}
