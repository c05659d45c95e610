//! Small text helpers over parsed HTML shared by the classifier and extractor

use scraper::{ElementRef, Html, Node};

/// Elements whose text is never shown to a reader
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Collapses runs of whitespace into single spaces and trims
pub(crate) fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text of an element with whitespace collapsed
pub(crate) fn element_text(element: &ElementRef) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

/// Text of an element with line structure kept (for code blocks)
pub(crate) fn raw_text(element: &ElementRef) -> String {
    element.text().collect::<String>()
}

/// All reader-visible text of a document, one line per text node
pub(crate) fn visible_text(document: &Html) -> String {
    let mut lines = Vec::new();
    for node in document.root_element().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|p| p.value().as_element().map(|e| e.name().to_string()))
            .is_some_and(|name| HIDDEN_ELEMENTS.contains(&name.as_str()));
        if hidden {
            continue;
        }
        let line = collapse_whitespace(text);
        if !line.is_empty() {
            lines.push(line);
        }
    }
    lines.join("\n")
}

/// Checks whether any ancestor of the element has one of the given names
pub(crate) fn has_ancestor(element: &ElementRef, names: &[&str]) -> bool {
    element.ancestors().any(|node| {
        node.value()
            .as_element()
            .is_some_and(|e| names.contains(&e.name()))
    })
}
