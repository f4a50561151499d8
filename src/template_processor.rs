// src/template_processor.rs
use scraper::Html;
use std::collections::HashMap;

pub const LAYOUT: &str = include_str!("../templates/layout.html");
pub const STYLE: &str = include_str!("../templates/style.css");
pub const JOB_PAGE: &str = include_str!("../templates/job.html");
pub const LISTING_PAGE: &str = include_str!("../templates/listing.html");
pub const JOB_CARD: &str = include_str!("../templates/card.html");
pub const FILTER_SCRIPT: &str = include_str!("../templates/filter.js");
pub const JOB_POSTING_SCRIPT: &str = include_str!("../templates/job_posting.jsonld");
pub const IMPRESSUM: &str = include_str!("../templates/impressum.html");
pub const DATENSCHUTZ: &str = include_str!("../templates/datenschutz.html");

pub type Bindings<'a> = HashMap<&'a str, String>;

pub struct TemplateProcessor;

impl TemplateProcessor {
    /// Replace `{{ key }}` / `{{key}}` placeholders in one pass. Substituted
    /// values are never rescanned; unknown placeholders are left as they are.
    pub fn render(template: &str, bindings: &Bindings<'_>) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after_open = &rest[start + 2..];

            match after_open.find("}}") {
                Some(end) => {
                    let key = after_open[..end].trim();
                    match bindings.get(key) {
                        Some(value) => out.push_str(value),
                        None => out.push_str(&rest[start..start + 2 + end + 2]),
                    }
                    rest = &after_open[end + 2..];
                }
                None => {
                    out.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }

        out.push_str(rest);
        out
    }

    pub fn escape_html(text: &str) -> String {
        let mut escaped = String::with_capacity(text.len());
        for c in text.chars() {
            match c {
                '&' => escaped.push_str("&amp;"),
                '<' => escaped.push_str("&lt;"),
                '>' => escaped.push_str("&gt;"),
                '"' => escaped.push_str("&quot;"),
                '\'' => escaped.push_str("&#x27;"),
                c => escaped.push(c),
            }
        }
        escaped
    }

    /// Plain-text prefix of a (possibly HTML) fragment, whitespace collapsed,
    /// cut on a char boundary.
    pub fn text_excerpt(html: &str, max_chars: usize) -> String {
        let fragment = Html::parse_fragment(html);
        let text = fragment
            .root_element()
            .text()
            .collect::<Vec<_>>()
            .join(" ");
        let cleaned = text.split_whitespace().collect::<Vec<_>>().join(" ");
        cleaned.chars().take(max_chars).collect()
    }
}
