// HTML serialization of a Document subtree.

use super::{ContentTree, Document, NodeId};

const VOID_TAGS: &[&str] = &["br", "hr"];

impl Document {
    /// Serialize `node` and its descendants as HTML.
    pub fn to_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_html(node, &mut out);
        out
    }

    /// Serialize only the children of `node`.
    pub fn inner_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        for &child in self.children(node) {
            self.write_html(child, &mut out);
        }
        out
    }

    fn write_html(&self, node: NodeId, out: &mut String) {
        if let Some(text) = self.text(node) {
            escape_into(text, false, out);
            return;
        }
        let Some(tag) = self.tag_name(node) else {
            return;
        };

        out.push('<');
        out.push_str(tag);
        for (name, value) in self.attributes(node) {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            escape_into(value, true, out);
            out.push('"');
        }
        out.push('>');

        if VOID_TAGS.contains(&tag) {
            return;
        }
        for &child in self.children(node) {
            self.write_html(child, out);
        }
        out.push_str("</");
        out.push_str(tag);
        out.push('>');
    }
}

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::markdown::parse_markdown;

    #[test]
    fn renders_nested_markup() {
        let doc = parse_markdown("Hello *big* world").unwrap();
        assert_eq!(doc.inner_html(doc.root()), "<p>Hello <em>big</em> world</p>");
    }

    #[test]
    fn escapes_text_and_attributes() {
        let mut doc = Document::new();
        let root = doc.root();
        let span = doc.append_element(root, "span").unwrap();
        doc.set_attribute(span, "title", "a \"b\" & c").unwrap();
        doc.append_text(span, "1 < 2 & 3 > 2").unwrap();
        assert_eq!(
            doc.to_html(span),
            "<span title=\"a &quot;b&quot; &amp; c\">1 &lt; 2 &amp; 3 &gt; 2</span>"
        );
    }

    #[test]
    fn void_elements_have_no_close_tag() {
        let mut doc = Document::new();
        let root = doc.root();
        doc.append_element(root, "hr").unwrap();
        assert_eq!(doc.inner_html(root), "<hr>");
    }
}
