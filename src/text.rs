//! Small string helpers shared by decoding and rendering.

/// Appended to text that was cut short.
pub const ELLIPSIS: &str = "...";

/// Truncate a string to at most `max` characters (by Unicode char boundary).
pub(crate) fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Truncate to `max` characters and append [`ELLIPSIS`] if anything was cut.
pub(crate) fn truncate_marked(s: &str, max: usize) -> String {
    let head = truncate(s, max);
    if head.len() == s.len() {
        s.to_string()
    } else {
        format!("{head}{ELLIPSIS}")
    }
}

/// Keep at most `max` lines, adding an ellipsis line when lines were dropped.
pub(crate) fn truncate_lines(s: &str, max: usize) -> Vec<&str> {
    let mut lines: Vec<&str> = s.lines().collect();
    if lines.len() > max {
        lines.truncate(max);
        lines.push(ELLIPSIS);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("hi", 10), "hi");
    }

    #[test]
    fn truncate_marked_only_marks_when_cut() {
        assert_eq!(truncate_marked("abcdef", 3), "abc...");
        assert_eq!(truncate_marked("abc", 3), "abc");
    }

    #[test]
    fn truncate_lines_appends_ellipsis_line() {
        assert_eq!(truncate_lines("a\nb\nc", 2), vec!["a", "b", "..."]);
        assert_eq!(truncate_lines("a\nb", 2), vec!["a", "b"]);
    }
}
