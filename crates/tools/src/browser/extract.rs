//! DOM-to-text reduction for rendered pages.

use scraper::{ElementRef, Html, Selector};

/// Elements whose text is never page content.
const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "nav", "header", "footer", "aside",
];

/// Reduce rendered HTML to clean text: boilerplate elements dropped,
/// whitespace collapsed to single spaces.
pub fn text_from_html(html: &str) -> String {
    let document = Html::parse_document(html);
    let body_selector = Selector::parse("body").unwrap();

    let mut parts = Vec::new();
    match document.select(&body_selector).next() {
        Some(body) => collect_text(body, &mut parts),
        None => collect_text(document.root_element(), &mut parts),
    }

    parts
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn collect_text(element: ElementRef, out: &mut Vec<String>) {
    for child in element.children() {
        if let Some(el) = ElementRef::wrap(child) {
            if SKIPPED_TAGS.contains(&el.value().name()) {
                continue;
            }
            collect_text(el, out);
        } else if let Some(text) = child.value().as_text() {
            out.push(text.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_visible_text() {
        let html = "<html><body><p>Hello <b>World</b></p></body></html>";
        assert_eq!(text_from_html(html), "Hello World");
    }

    #[test]
    fn strips_script_and_style() {
        let html = r#"<html><head><style>body { color: red; }</style></head>
            <body><script>var hidden = 1;</script><p>Visible</p></body></html>"#;
        let text = text_from_html(html);
        assert_eq!(text, "Visible");
    }

    #[test]
    fn strips_navigation_boilerplate() {
        let html = r#"<body>
            <nav><a href="/">Home</a><a href="/about">About</a></nav>
            <header>Site header</header>
            <main><p>The article body.</p></main>
            <footer>Copyright 2024</footer>
        </body>"#;
        assert_eq!(text_from_html(html), "The article body.");
    }

    #[test]
    fn collapses_whitespace() {
        let html = "<body><p>line\n one</p>\n\n  <p>line\ttwo</p></body>";
        assert_eq!(text_from_html(html), "line one line two");
    }

    #[test]
    fn handles_fragment_without_body() {
        let text = text_from_html("<p>bare fragment</p>");
        assert_eq!(text, "bare fragment");
    }
}
