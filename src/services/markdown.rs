//! Markdown rendering service
//!
//! Articles and legal pages are written in Markdown and stored alongside
//! their rendered HTML. Raw HTML in the source is dropped and script-like
//! link targets are neutralised, so the output is safe to embed unescaped.
//!
//! # Example
//!
//! ```
//! use pemuda_magelang::services::markdown::MarkdownRenderer;
//!
//! let renderer = MarkdownRenderer::new();
//! let html = renderer.render("# Halo\n\nIni **tebal**.<script>x()</script>");
//! assert!(html.contains("<h1>"));
//! assert!(!html.contains("<script>"));
//! ```

use pulldown_cmark::{html, Event, Options, Parser, Tag, TagEnd};

const BLOCKED_SCHEMES: [&str; 3] = ["javascript:", "vbscript:", "data:"];

#[derive(Debug, Clone, Default)]
pub struct MarkdownRenderer {
    /// Keep raw HTML blocks instead of dropping them
    allow_raw_html: bool,
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    fn options() -> Options {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_SMART_PUNCTUATION);
        options
    }

    /// Render Markdown to sanitized HTML.
    pub fn render(&self, markdown: &str) -> String {
        let parser = Parser::new_ext(markdown, Self::options());
        let events = self.process_events(parser);

        let mut html_output = String::new();
        html::push_html(&mut html_output, events.into_iter());
        html_output
    }

    /// Plain-text summary of the first `max_chars` characters, cut on a word
    /// boundary.
    pub fn excerpt(&self, markdown: &str, max_chars: usize) -> String {
        let mut text = String::new();
        for event in Parser::new_ext(markdown, Self::options()) {
            match event {
                Event::Text(t) | Event::Code(t) => text.push_str(&t),
                Event::SoftBreak | Event::HardBreak | Event::End(TagEnd::Paragraph) | Event::End(TagEnd::Heading(_)) => {
                    text.push(' ')
                }
                _ => {}
            }
        }

        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.chars().count() <= max_chars {
            return collapsed;
        }

        let cut: String = collapsed.chars().take(max_chars).collect();
        let trimmed = match cut.rfind(' ') {
            Some(idx) if idx > 0 => &cut[..idx],
            _ => cut.as_str(),
        };
        format!("{}…", trimmed.trim_end())
    }

    fn process_events<'a>(&self, parser: Parser<'a>) -> Vec<Event<'a>> {
        parser
            .filter_map(|event| match event {
                Event::Html(_) | Event::InlineHtml(_) if !self.allow_raw_html => None,
                Event::Start(Tag::Link { link_type, dest_url, title, id }) => Some(Event::Start(Tag::Link {
                    link_type,
                    dest_url: safe_url(dest_url),
                    title,
                    id,
                })),
                Event::Start(Tag::Image { link_type, dest_url, title, id }) => Some(Event::Start(Tag::Image {
                    link_type,
                    dest_url: safe_url(dest_url),
                    title,
                    id,
                })),
                other => Some(other),
            })
            .collect()
    }
}

fn safe_url(url: pulldown_cmark::CowStr<'_>) -> pulldown_cmark::CowStr<'_> {
    let lower = url.trim().to_ascii_lowercase();
    if BLOCKED_SCHEMES.iter().any(|scheme| lower.starts_with(scheme)) {
        "#".into()
    } else {
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_basic_markdown() {
        let html = MarkdownRenderer::new().render("# Judul\n\nParagraf dengan **tebal** dan *miring*.");
        assert!(html.contains("<h1>Judul</h1>"));
        assert!(html.contains("<strong>tebal</strong>"));
        assert!(html.contains("<em>miring</em>"));
    }

    #[test]
    fn test_render_tables_and_strikethrough() {
        let html = MarkdownRenderer::new().render("| a | b |\n|---|---|\n| 1 | 2 |\n\n~~coret~~");
        assert!(html.contains("<table>"));
        assert!(html.contains("<del>coret</del>"));
    }

    #[test]
    fn test_raw_html_is_dropped() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render("<script>alert(1)</script>\n\nteks <b onclick=\"x\">aman</b>");
        assert!(!html.contains("<script"));
        assert!(!html.contains("onclick"));
        assert!(html.contains("aman"));
    }

    #[test]
    fn test_javascript_links_are_neutralised() {
        let html = MarkdownRenderer::new().render("[klik](javascript:alert(1)) [ok](https://example.com)");
        assert!(!html.contains("javascript:"));
        assert!(html.contains("href=\"#\""));
        assert!(html.contains("href=\"https://example.com\""));
    }

    #[test]
    fn test_code_is_escaped() {
        let html = MarkdownRenderer::new().render("```\n<div>kode</div>\n```");
        assert!(html.contains("&lt;div&gt;"));
    }

    #[test]
    fn test_excerpt_strips_markup() {
        let renderer = MarkdownRenderer::new();
        let excerpt = renderer.excerpt("# Judul\n\nPemuda **Magelang** bergerak.", 200);
        assert_eq!(excerpt, "Judul Pemuda Magelang bergerak.");
    }

    #[test]
    fn test_excerpt_cuts_on_word_boundary() {
        let renderer = MarkdownRenderer::new();
        let excerpt = renderer.excerpt("satu dua tiga empat lima", 12);
        assert_eq!(excerpt, "satu dua…");
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(50))]

            #[test]
            fn rendered_output_never_contains_script_tags(body in ".{0,200}") {
                let input = format!("{}<script>evil()</script>{}", body, body);
                let html = MarkdownRenderer::new().render(&input);
                prop_assert!(!html.to_lowercase().contains("<script"));
            }

            #[test]
            fn excerpt_respects_length(text in "[a-z ]{0,300}", max in 5usize..100) {
                let excerpt = MarkdownRenderer::new().excerpt(&text, max);
                // cut text plus the ellipsis
                prop_assert!(excerpt.chars().count() <= max + 1);
            }
        }
    }
}
