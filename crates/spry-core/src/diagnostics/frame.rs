//! Code frame rendering.

/// Lines shown above and below the offending line.
const CONTEXT_LINES: usize = 2;

/// Convert a 1-based line and column to a byte offset.
pub fn line_col_to_offset(source: &str, line: u32, column: u32) -> Option<usize> {
    if line == 0 {
        return None;
    }

    let mut offset = 0;
    for (index, text) in source.split('\n').enumerate() {
        if index + 1 == line as usize {
            let col_bytes = if column == 0 {
                0
            } else {
                text.char_indices()
                    .nth((column - 1) as usize)
                    .map(|(pos, _)| pos)
                    .unwrap_or(text.len())
            };
            return Some(offset + col_bytes);
        }
        offset += text.len() + 1;
    }

    None
}

/// Render a frame pointing at `line`:`column` (both 1-based).
///
/// ```text
///   1 | a {
/// > 2 |   color: @missing;
///     |          ^
///   3 | }
/// ```
///
/// Returns `None` when the line is outside the source.
pub fn render_code_frame(source: &str, line: u32, column: u32) -> Option<String> {
    let lines: Vec<&str> = source.lines().collect();
    let line = line as usize;
    if line == 0 || line > lines.len() {
        return None;
    }

    let start = line.saturating_sub(CONTEXT_LINES).max(1);
    let end = (line + CONTEXT_LINES).min(lines.len());
    let gutter = end.to_string().len();

    let mut out = Vec::new();
    for number in start..=end {
        let text = lines[number - 1].trim_end_matches('\r');
        let marker = if number == line { '>' } else { ' ' };
        out.push(format!("{marker} {number:>gutter$} | {text}"));

        if number == line {
            let pad: String = text
                .chars()
                .take((column as usize).saturating_sub(1))
                .map(|c| if c == '\t' { '\t' } else { ' ' })
                .collect();
            out.push(format!("  {:>gutter$} | {pad}^", ""));
        }
    }

    Some(out.join("\n"))
}
