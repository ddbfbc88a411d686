//! Render a batch of events into one digest body.
//!
//! Each event becomes a block: the formatter output with blank lines removed, preceded by a
//! [`RULE`] line. Blocks keep arrival order.

use crate::event::{Level, LogEvent};
use crate::format::Formatter;
use serde::{Deserialize, Serialize};

/// Separator written before every block.
pub const RULE: &str = "****************************************";

/// Body layout of a digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DigestLayout {
    /// One run of blocks in arrival order.
    #[default]
    Merged,
    /// Blocks grouped under a `== LEVEL (n) ==` header, highest severity first. Arrival order
    /// is kept inside each section.
    BySeverity,
}

/// Formatter output for one event with blank lines dropped.
///
/// Output that is nothing but whitespace becomes `<empty LEVEL message>` so every event still
/// yields a non-empty block.
pub fn render_block(formatter: &dyn Formatter, event: &LogEvent) -> String {
    let block = formatter
        .render(event)
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    if block.is_empty() {
        format!("<empty {} message>", event.level.name())
    } else {
        block
    }
}

/// Render `events` as a digest body.
pub fn render_digest(events: &[LogEvent], formatter: &dyn Formatter, layout: DigestLayout) -> String {
    let mut body = String::new();
    match layout {
        DigestLayout::Merged => push_blocks(&mut body, events.iter(), formatter),
        DigestLayout::BySeverity => {
            for level in Level::ALL.iter().rev() {
                let count = events.iter().filter(|e| e.level == *level).count();
                if count == 0 {
                    continue;
                }
                body.push_str(&format!("== {} ({}) ==\n", level.name(), count));
                push_blocks(&mut body, events.iter().filter(|e| e.level == *level), formatter);
            }
        }
    }
    body
}

fn push_blocks<'a>(
    body: &mut String,
    events: impl Iterator<Item = &'a LogEvent>,
    formatter: &dyn Formatter,
) {
    for event in events {
        body.push_str(RULE);
        body.push('\n');
        body.push_str(&render_block(formatter, event));
        body.push('\n');
    }
}

/// Split a merged digest back into its blocks.
pub fn blocks(body: &str) -> Vec<String> {
    body.split(RULE)
        .map(|chunk| chunk.trim_matches('\n'))
        .filter(|chunk| !chunk.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(e: &LogEvent) -> String {
        format!("{}|{}", e.level.name(), e.message)
    }

    #[test]
    fn merged_digest_preserves_order_and_count() {
        let events: Vec<LogEvent> =
            (0..5).map(|i| LogEvent::new(Level::Error, format!("event {i}"))).collect();
        let body = render_digest(&events, &plain, DigestLayout::Merged);
        let parts = blocks(&body);
        assert_eq!(parts.len(), 5);
        for (i, block) in parts.iter().enumerate() {
            assert_eq!(block, &format!("ERROR|event {i}"));
        }
        assert!(body.starts_with(RULE));
        assert_eq!(RULE.len(), 40);
    }

    #[test]
    fn blank_lines_are_stripped_from_blocks() {
        let noisy = |e: &LogEvent| format!("\r\nfirst {}\r\n\r\n   \nsecond\n\n", e.message);
        let block = render_block(&noisy, &LogEvent::new(Level::Warning, "x"));
        assert_eq!(block, "first x\nsecond");
    }

    #[test]
    fn whitespace_only_output_still_yields_a_block() {
        let message_only = |e: &LogEvent| e.message.clone();
        let events = vec![
            LogEvent::new(Level::Error, "a"),
            LogEvent::new(Level::Warning, "   "),
            LogEvent::new(Level::Error, "c"),
        ];
        let body = render_digest(&events, &message_only, DigestLayout::Merged);
        assert_eq!(blocks(&body), vec!["a", "<empty WARNING message>", "c"]);
        assert!(body.lines().all(|line| !line.trim().is_empty()));
    }

    #[test]
    fn severity_layout_groups_highest_first() {
        let events = vec![
            LogEvent::new(Level::Warning, "w1"),
            LogEvent::new(Level::Critical, "c1"),
            LogEvent::new(Level::Warning, "w2"),
        ];
        let body = render_digest(&events, &plain, DigestLayout::BySeverity);
        let critical = body.find("== CRITICAL (1) ==").unwrap();
        let warning = body.find("== WARNING (2) ==").unwrap();
        assert!(critical < warning);
        assert!(body.find("w1").unwrap() < body.find("w2").unwrap());
        assert!(!body.contains("== ERROR"));
    }

    #[test]
    fn empty_batch_renders_empty_body() {
        assert!(render_digest(&[], &plain, DigestLayout::Merged).is_empty());
    }
}
