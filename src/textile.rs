//! A small Textile-to-HTML converter covering the subset blog posts use:
//! `hN.` headings, `bq.` quotes, `p.` paragraphs, `*`/`#` lists, and inline
//! `*strong*`, `_emphasis_`, `@code@` and `"text":url` links.

use regex::Regex;
use std::sync::OnceLock;

struct Inline {
    link: Regex,
    code: Regex,
    strong: Regex,
    emphasis: Regex,
}

fn inline_rules() -> &'static Inline {
    static RULES: OnceLock<Inline> = OnceLock::new();
    RULES.get_or_init(|| Inline {
        link: Regex::new(r#""([^"]+)":([^\s<]*[^\s<.,;:!?)])"#).unwrap(),
        code: Regex::new(r"@([^@\n]+)@").unwrap(),
        strong: Regex::new(r"(^|[\s(>])\*([^*\s](?:[^*]*[^*\s])?)\*").unwrap(),
        emphasis: Regex::new(r"(^|[\s(>])_([^_\s](?:[^_]*[^_\s])?)_").unwrap(),
    })
}

fn block_signature() -> &'static Regex {
    static SIGNATURE: OnceLock<Regex> = OnceLock::new();
    SIGNATURE.get_or_init(|| Regex::new(r"(?s)^(h[1-6]|bq|p)\. (.*)$").unwrap())
}

/// Converts Textile markup to HTML.
pub fn to_html(input: &str) -> String {
    let input = input.replace("\r\n", "\n");
    let mut output = String::with_capacity(input.len() * 3 / 2);
    for block in input.split("\n\n").map(str::trim).filter(|b| !b.is_empty()) {
        output.push_str(&convert_block(block));
        output.push('\n');
    }
    output
}

fn convert_block(block: &str) -> String {
    if let Some(captures) = block_signature().captures(block) {
        let body = inline(&captures[2].replace('\n', " "));
        return match &captures[1] {
            "bq" => format!("<blockquote><p>{}</p></blockquote>", body),
            "p" => format!("<p>{}</p>", body),
            heading => format!("<{0}>{1}</{0}>", heading, body),
        };
    }

    let lines: Vec<&str> = block.lines().collect();
    if let Some(tag) = list_tag(&lines) {
        let items: String = lines
            .iter()
            .map(|line| format!("\t<li>{}</li>\n", inline(line[2..].trim())))
            .collect();
        return format!("<{0}>\n{1}</{0}>", tag, items);
    }

    let body: Vec<String> = lines.iter().map(|line| inline(line)).collect();
    format!("<p>{}</p>", body.join("<br />\n"))
}

fn list_tag(lines: &[&str]) -> Option<&'static str> {
    if lines.iter().all(|line| line.starts_with("* ")) {
        Some("ul")
    } else if lines.iter().all(|line| line.starts_with("# ")) {
        Some("ol")
    } else {
        None
    }
}

fn inline(text: &str) -> String {
    let rules = inline_rules();
    let text = rules.link.replace_all(text, r#"<a href="$2">$1</a>"#);
    let text = rules.code.replace_all(&text, "<code>$1</code>");
    let text = rules.strong.replace_all(&text, "${1}<strong>${2}</strong>");
    let text = rules.emphasis.replace_all(&text, "${1}<em>${2}</em>");
    text.into_owned()
}
