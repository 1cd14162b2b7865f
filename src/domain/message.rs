use serde::Serialize;

/// The decoded view of the newest message.
///
/// `from` and `date` are the raw header text; only `subject` and `body` are decoded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizedMessage {
    pub from: String,
    pub subject: String,
    pub body: String,
    pub date: String,
}

impl NormalizedMessage {
    /// Body flattened to one line, at most `max_chars` characters.
    pub fn preview(&self, max_chars: usize) -> String {
        self.body
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
            .chars()
            .take(max_chars)
            .collect()
    }

    /// `sender | subject | preview` on a single line.
    pub fn headline(&self, max_preview_chars: usize) -> String {
        format!(
            "{} | {} | {}",
            self.from,
            self.subject_or_placeholder(),
            self.preview(max_preview_chars)
        )
    }

    fn subject_or_placeholder(&self) -> &str {
        match self.subject.trim() {
            "" => "(no subject)",
            subject => subject,
        }
    }

    /// Reply text for a chat user.
    pub fn render(&self, max_body_chars: usize) -> String {
        let subject = self.subject_or_placeholder();

        let body = self.body.trim();
        let body = if body.is_empty() {
            "(empty body)".to_string()
        } else if body.chars().count() > max_body_chars {
            let mut cut: String = body.chars().take(max_body_chars).collect();
            cut.push('…');
            cut
        } else {
            body.to_string()
        };

        format!(
            "From: {}\nSubject: {}\nDate: {}\n\n{}",
            self.from, subject, self.date, body
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(body: &str) -> NormalizedMessage {
        NormalizedMessage {
            from: "Alice <alice@example.com>".into(),
            subject: "Quarterly report".into(),
            body: body.into(),
            date: "Tue, 14 Oct 2025 09:12:00 +0000".into(),
        }
    }

    #[test]
    fn preview_joins_non_empty_lines() {
        let msg = sample("Hi Bob,\r\n\r\n  see attached.  \r\nThanks\r\n");
        assert_eq!(msg.preview(140), "Hi Bob, see attached. Thanks");
    }

    #[test]
    fn preview_truncates() {
        let msg = sample("abcdefghij");
        assert_eq!(msg.preview(4), "abcd");
    }

    #[test]
    fn headline_is_single_line() {
        let msg = sample("Line one\r\nLine two\r\n");
        assert_eq!(
            msg.headline(12),
            "Alice <alice@example.com> | Quarterly report | Line one Lin"
        );
    }

    #[test]
    fn headline_placeholder_subject() {
        let msg = NormalizedMessage {
            from: "x@example.com".into(),
            ..Default::default()
        };
        assert_eq!(msg.headline(10), "x@example.com | (no subject) | ");
    }

    #[test]
    fn render_lists_headers_and_body() {
        let text = sample("Numbers inside.").render(100);
        assert_eq!(
            text,
            "From: Alice <alice@example.com>\nSubject: Quarterly report\nDate: Tue, 14 Oct 2025 09:12:00 +0000\n\nNumbers inside."
        );
    }

    #[test]
    fn render_truncates_on_char_boundary() {
        let text = sample("привет мир").render(6);
        assert!(text.ends_with("\n\nпривет…"));
    }

    #[test]
    fn render_placeholders_for_empty_fields() {
        let msg = NormalizedMessage::default();
        let text = msg.render(10);
        assert!(text.contains("Subject: (no subject)"));
        assert!(text.ends_with("(empty body)"));
    }

    #[test]
    fn serializes_to_json() {
        let v = serde_json::to_value(sample("x")).unwrap();
        assert_eq!(v["subject"], "Quarterly report");
        assert_eq!(v["from"], "Alice <alice@example.com>");
    }
}
