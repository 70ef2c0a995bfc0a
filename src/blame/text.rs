//! Line splitting shared by the parser, diff and assembler stages.

const BYTE_ORDER_MARK: char = '\u{feff}';

/// Strips a leading byte-order mark and turns CRLF endings into LF.
pub fn normalize_content(content: &str) -> String {
    let content = content.strip_prefix(BYTE_ORDER_MARK).unwrap_or(content);
    if content.contains("\r\n") {
        content.replace("\r\n", "\n")
    } else {
        content.to_string()
    }
}

/// Splits content into lines without terminators.
///
/// A trailing newline does not start another line, so `"a\nb\n"` and `"a\nb"`
/// both have two lines and `""` has none.
pub fn split_lines(content: &str) -> Vec<String> {
    let body = content.strip_suffix('\n').unwrap_or(content);
    if content.is_empty() {
        return Vec::new();
    }
    body.split('\n').map(str::to_string).collect()
}

/// Splits content into lines, keeping each line's `\n`.
pub fn split_lines_with_terminators(content: &str) -> Vec<&str> {
    content.split_inclusive('\n').collect()
}
