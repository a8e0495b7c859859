//! Thin stand-in for the out-of-scope HTML/Markdown rendering layer: wraps
//! the already-computed report text, escaping only HTML-significant
//! characters. Not a Markdown parser.

pub fn render_html(session_id: uuid::Uuid, report: &str) -> String {
    format!(
        "<html><head><title>Session {session_id}</title></head><body><pre>{}</pre></body></html>",
        escape_html(report)
    )
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_html_significant_characters() {
        let html = render_html(uuid::Uuid::nil(), "<script>alert('x')</script> & \"quotes\"");
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("&amp;"));
        assert!(html.contains("&#39;"));
        assert!(html.contains("&quot;"));
    }

    #[test]
    fn wraps_report_in_html_body() {
        let html = render_html(uuid::Uuid::nil(), "plain report");
        assert!(html.starts_with("<html>"));
        assert!(html.contains("plain report"));
    }
}
