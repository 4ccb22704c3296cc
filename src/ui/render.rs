//! Record → styled terminal lines, plus the status and help bars.
//!
//! Every record renders as a badge line, an indented body wrapped to the
//! terminal width, and one blank separator line. The same function feeds both
//! drawing and [`TextLayout`], so scroll arithmetic always agrees with what is
//! on screen.

use super::theme::ThemeColors;
use crate::record::DisplayRecord;
use crate::tail::TailStatus;
use crate::text::{truncate_lines, truncate_marked};
use crate::viewport::RecordLayout;
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use std::borrow::Cow;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const INDENT: &str = "  ";

const TEXT_MAX_CHARS: usize = 300;
const TEXT_MAX_LINES: usize = 5;
const REASONING_MAX_CHARS: usize = 200;
const TOOL_INPUT_MAX_CHARS: usize = 150;
const USER_MAX_CHARS: usize = 200;
const OUTCOME_MAX_CHARS: usize = 200;
const OUTCOME_MAX_LINES: usize = 4;

/// Measures records by rendering them.
#[derive(Debug, Clone, Copy)]
pub struct TextLayout {
    colors: ThemeColors,
}

impl TextLayout {
    pub fn new(colors: ThemeColors) -> Self {
        Self { colors }
    }
}

impl RecordLayout for TextLayout {
    fn line_count(&self, record: &DisplayRecord, width: u16) -> usize {
        render_record(record, width, &self.colors).len()
    }
}

fn badge(label: &str, style: Style) -> Span<'static> {
    Span::styled(format!(" {label} "), style)
}

fn owned_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    lines.into_iter().map(str::to_string).collect()
}

/// Render one record at `width` columns.
pub fn render_record(record: &DisplayRecord, width: u16, colors: &ThemeColors) -> Vec<Line<'static>> {
    let (header, body, body_style): (Line<'static>, Vec<String>, Style) = match record {
        DisplayRecord::SystemInfo { model, cwd } => {
            let details: Vec<String> = [("model", model), ("cwd", cwd)]
                .into_iter()
                .filter(|(_, value)| !value.is_empty())
                .map(|(key, value)| format!("{key}: {value}"))
                .collect();
            let body = if details.is_empty() {
                Vec::new()
            } else {
                vec![details.join("  ")]
            };
            (
                Line::from(badge(record.label(), colors.badge_system())),
                body,
                colors.secondary(),
            )
        }
        DisplayRecord::AssistantText { body } => {
            let text = truncate_marked(body, TEXT_MAX_CHARS);
            (
                Line::from(badge(record.label(), colors.badge_text())),
                owned_lines(truncate_lines(text.trim(), TEXT_MAX_LINES)),
                colors.body(),
            )
        }
        DisplayRecord::Reasoning { body } => {
            let text = truncate_marked(body, REASONING_MAX_CHARS);
            (
                Line::from(badge(record.label(), colors.badge_thinking())),
                owned_lines(text.trim().lines()),
                colors.reasoning(),
            )
        }
        DisplayRecord::ToolInvocation { name, input_json } => {
            let input = truncate_marked(input_json, TOOL_INPUT_MAX_CHARS);
            (
                Line::from(vec![
                    badge(record.label(), colors.badge_tool()),
                    Span::raw(" "),
                    Span::styled(name.clone(), colors.tool_name()),
                ]),
                owned_lines(input.lines()),
                colors.secondary(),
            )
        }
        DisplayRecord::ToolOutcome { content_text } => {
            let content = truncate_marked(content_text, OUTCOME_MAX_CHARS);
            (
                Line::from(badge(record.label(), colors.badge_result())),
                owned_lines(truncate_lines(&content, OUTCOME_MAX_LINES)),
                colors.body(),
            )
        }
        DisplayRecord::UserText { body } => {
            let text = truncate_marked(body, USER_MAX_CHARS);
            (
                Line::from(badge(record.label(), colors.badge_user())),
                owned_lines(text.trim().lines()),
                colors.body(),
            )
        }
        DisplayRecord::RunSummary {
            turns,
            cost_usd,
            duration_ms,
        } => (
            Line::from(vec![
                badge(record.label(), colors.badge_done()),
                Span::raw(" "),
                Span::styled(
                    DisplayRecord::summary_text(*turns, *cost_usd, *duration_ms),
                    colors.summary(),
                ),
            ]),
            Vec::new(),
            colors.summary(),
        ),
        DisplayRecord::Unrecognized { .. } => (
            Line::from(badge(record.label(), colors.badge_other())),
            Vec::new(),
            colors.body(),
        ),
    };

    let avail = (width as usize).saturating_sub(INDENT.len()).max(1);
    let mut lines = vec![header];
    for text_line in &body {
        for chunk in wrap(&expand_tabs(text_line), avail) {
            lines.push(Line::from(vec![
                Span::raw(INDENT),
                Span::styled(chunk, body_style),
            ]));
        }
    }
    lines.push(Line::default());
    lines
}

/// Tabs have no unicode width; render them as four spaces.
fn expand_tabs(s: &str) -> Cow<'_, str> {
    if s.contains('\t') {
        Cow::Owned(s.replace('\t', "    "))
    } else {
        Cow::Borrowed(s)
    }
}

/// Hard-wrap `text` into chunks of at most `width` display columns.
fn wrap(text: &str, width: usize) -> Vec<String> {
    if text.width() <= width {
        return vec![text.to_string()];
    }

    let mut out = Vec::new();
    let mut current = String::new();
    let mut current_width = 0;
    for ch in text.chars() {
        let ch_width = ch.width().unwrap_or(0);
        if current_width + ch_width > width && !current.is_empty() {
            out.push(std::mem::take(&mut current));
            current_width = 0;
        }
        current.push(ch);
        current_width += ch_width;
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

/// Inputs for the top status bar.
#[derive(Debug, Clone, Copy)]
pub struct StatusLine<'a> {
    pub file_name: &'a str,
    pub records: usize,
    pub status: TailStatus,
    pub decode_errors: usize,
    pub last_error: Option<&'a str>,
}

pub fn status_bar(info: &StatusLine<'_>, width: u16, colors: &ThemeColors) -> Line<'static> {
    let left = format!(" watching: {}", info.file_name);
    let error = info
        .last_error
        .map(|e| format!("  ! {e}"))
        .unwrap_or_default();

    let mut right = format!(
        "{} events | {} #{}",
        info.records,
        info.status.phase.label(),
        info.status.epoch
    );
    if info.decode_errors > 0 {
        right.push_str(&format!(" | {} bad lines", info.decode_errors));
    }
    right.push(' ');

    let used = left.width() + error.width() + right.width();
    let spaces = (width as usize).saturating_sub(used).max(1);

    Line::from(vec![
        Span::raw(left),
        Span::styled(error, colors.error()),
        Span::raw(" ".repeat(spaces)),
        Span::raw(right),
    ])
    .style(colors.status_bar())
}

pub fn help_bar(follow: bool, colors: &ThemeColors) -> Line<'static> {
    let indicator = if follow {
        Span::styled("[FOLLOW]", colors.follow_on())
    } else {
        Span::styled("[follow off]", colors.secondary())
    };
    Line::from(vec![
        Span::styled(
            " q:quit  ↑↓/jk:scroll  g/G:top/bottom  f:follow  ",
            colors.secondary(),
        ),
        indicator,
    ])
}

pub fn placeholder(file_name: &str, colors: &ThemeColors) -> Line<'static> {
    Line::styled(
        format!("{INDENT}Waiting for events from {file_name}..."),
        colors.secondary(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tail::TailPhase;
    use crate::ui::theme::ThemeStyle;

    fn plain(line: &Line<'_>) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    fn render(record: &DisplayRecord, width: u16) -> Vec<String> {
        render_record(record, width, &ThemeStyle::Dark.colors())
            .iter()
            .map(plain)
            .collect()
    }

    #[test]
    fn tool_invocation_shows_name_and_input() {
        let lines = render(
            &DisplayRecord::ToolInvocation {
                name: "Read".into(),
                input_json: r#"{"file_path":"a.rs"}"#.into(),
            },
            80,
        );
        assert_eq!(
            lines,
            vec![
                " tool_use  Read".to_string(),
                r#"  {"file_path":"a.rs"}"#.to_string(),
                String::new(),
            ]
        );
    }

    #[test]
    fn assistant_text_keeps_five_lines() {
        let body = (1..=8).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        let lines = render(&DisplayRecord::AssistantText { body }, 80);
        // badge + 5 lines + ellipsis + separator
        assert_eq!(lines.len(), 8);
        assert_eq!(lines[5], "  line 5");
        assert_eq!(lines[6], "  ...");
    }

    #[test]
    fn run_summary_is_a_single_line() {
        let lines = render(
            &DisplayRecord::RunSummary {
                turns: 3,
                cost_usd: 0.12,
                duration_ms: 4500,
            },
            80,
        );
        assert_eq!(lines, vec![" done  ✓ 3 turns | $0.1200 | 4500ms".to_string(), String::new()]);
    }

    #[test]
    fn long_lines_wrap_to_width() {
        let lines = render(
            &DisplayRecord::UserText {
                body: "abcdefghij".into(),
            },
            6,
        );
        assert_eq!(lines[1..4], ["  abcd", "  efgh", "  ij"]);
        assert_eq!(TextLayout::new(ThemeStyle::Dark.colors()).line_count(
            &DisplayRecord::UserText {
                body: "abcdefghij".into()
            },
            6
        ), 5);
    }

    #[test]
    fn wrap_counts_wide_characters() {
        assert_eq!(wrap("日本語", 4), vec!["日本".to_string(), "語".to_string()]);
        assert_eq!(wrap("", 4), vec![String::new()]);
    }

    #[test]
    fn status_bar_reports_phase_and_bad_lines() {
        let info = StatusLine {
            file_name: "run.jsonl",
            records: 12,
            status: TailStatus {
                phase: TailPhase::Tailing,
                epoch: 2,
                offset: 0,
            },
            decode_errors: 1,
            last_error: None,
        };
        let line = plain(&status_bar(&info, 80, &ThemeStyle::Dark.colors()));
        assert!(line.starts_with(" watching: run.jsonl"));
        assert!(line.ends_with("12 events | tailing #2 | 1 bad lines "));
    }

    #[test]
    fn help_bar_shows_follow_state() {
        let colors = ThemeStyle::Dark.colors();
        assert!(plain(&help_bar(true, &colors)).ends_with("[FOLLOW]"));
        assert!(plain(&help_bar(false, &colors)).ends_with("[follow off]"));
    }
}
