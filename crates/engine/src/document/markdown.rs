// Markdown → Document loader.
//
// Each top-level block is built detached and attached to the target parent
// only once complete, so an observer on the target sees one insertion per
// block rather than one per inline node.

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag};

use super::{ContentTree, Document, DocumentError, NodeId};

/// Parse `markdown` into a fresh document.
pub fn parse_markdown(markdown: &str) -> Result<Document, DocumentError> {
    let mut doc = Document::new();
    let root = doc.root();
    append_markdown(&mut doc, root, markdown)?;
    Ok(doc)
}

/// Parse `markdown` and append its blocks under `parent`, returning the
/// top-level nodes in order.
pub fn append_markdown(
    doc: &mut Document,
    parent: NodeId,
    markdown: &str,
) -> Result<Vec<NodeId>, DocumentError> {
    let mut builder = Builder { doc, target: parent, open: Vec::new(), last_text: None, blocks: Vec::new() };
    for event in Parser::new_ext(markdown, parser_options()) {
        builder.event(event)?;
    }
    Ok(builder.blocks)
}

/// Split `markdown` into its top-level block sources, in order.
///
/// Used to feed a document incrementally; each chunk parses on its own.
pub fn block_sources(markdown: &str) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    for (event, range) in Parser::new_ext(markdown, parser_options()).into_offset_iter() {
        match event {
            Event::Start(_) => {
                if depth == 0 {
                    start = Some(range.start);
                }
                depth += 1;
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    if let Some(begin) = start.take() {
                        chunks.push(&markdown[begin..range.end]);
                    }
                }
            }
            _ if depth == 0 => chunks.push(&markdown[range]),
            _ => {}
        }
    }
    chunks
}

fn parser_options() -> Options {
    Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH
}

struct Builder<'a> {
    doc: &'a mut Document,
    target: NodeId,
    open: Vec<NodeId>,
    last_text: Option<NodeId>,
    blocks: Vec<NodeId>,
}

impl Builder<'_> {
    fn event(&mut self, event: Event<'_>) -> Result<(), DocumentError> {
        match event {
            Event::Start(tag) => {
                self.last_text = None;
                let element = self.element_for(&tag)?;
                self.open.push(element);
            }
            Event::End(_) => {
                self.last_text = None;
                if let Some(finished) = self.open.pop() {
                    self.place(finished)?;
                }
            }
            Event::Text(text) => self.push_text(&text)?,
            Event::Code(code) => {
                self.last_text = None;
                let element = self.doc.create_element("code");
                self.doc.append_text(element, &code)?;
                self.place(element)?;
            }
            Event::SoftBreak => self.push_text("\n")?,
            Event::HardBreak => self.leaf_element("br")?,
            Event::Rule => self.leaf_element("hr")?,
            Event::Html(html) | Event::InlineHtml(html) => {
                tracing::trace!(len = html.len(), "dropping raw html from markdown");
            }
            _ => {}
        }
        Ok(())
    }

    fn element_for(&mut self, tag: &Tag<'_>) -> Result<NodeId, DocumentError> {
        let element = match tag {
            Tag::Paragraph => self.doc.create_element("p"),
            Tag::Heading { level, .. } => self.doc.create_element(heading_tag(*level)),
            Tag::BlockQuote(_) => self.doc.create_element("blockquote"),
            Tag::CodeBlock(kind) => {
                let code = self.doc.create_element("code");
                if let CodeBlockKind::Fenced(lang) = kind {
                    if !lang.is_empty() {
                        self.doc.set_attribute(code, "class", &format!("language-{lang}"))?;
                    }
                }
                let pre = self.doc.create_element("pre");
                self.doc.append_child(pre, code)?;
                // Text lands in the inner <code>; closing pops both.
                self.open.push(pre);
                code
            }
            Tag::List(Some(first)) => {
                let list = self.doc.create_element("ol");
                if *first != 1 {
                    self.doc.set_attribute(list, "start", &first.to_string())?;
                }
                list
            }
            Tag::List(None) => self.doc.create_element("ul"),
            Tag::Item => self.doc.create_element("li"),
            Tag::Emphasis => self.doc.create_element("em"),
            Tag::Strong => self.doc.create_element("strong"),
            Tag::Strikethrough => self.doc.create_element("del"),
            Tag::Link { dest_url, .. } => {
                let link = self.doc.create_element("a");
                self.doc.set_attribute(link, "href", dest_url)?;
                link
            }
            Tag::Image { dest_url, .. } => {
                let image = self.doc.create_element("img");
                self.doc.set_attribute(image, "src", dest_url)?;
                image
            }
            Tag::Table(_) => self.doc.create_element("table"),
            Tag::TableHead => self.doc.create_element("thead"),
            Tag::TableRow => self.doc.create_element("tr"),
            Tag::TableCell => self.doc.create_element("td"),
            _ => self.doc.create_element("div"),
        };
        Ok(element)
    }

    fn push_text(&mut self, text: &str) -> Result<(), DocumentError> {
        if let Some(previous) = self.last_text {
            let merged = format!("{}{text}", self.doc.text(previous).unwrap_or_default());
            return self.doc.set_text(previous, &merged);
        }
        let node = self.doc.create_text(text);
        self.place(node)?;
        self.last_text = Some(node);
        Ok(())
    }

    fn leaf_element(&mut self, tag: &str) -> Result<(), DocumentError> {
        self.last_text = None;
        let node = self.doc.create_element(tag);
        self.place(node)
    }

    /// Attach a finished node to the innermost open element, or to the target
    /// when it is top-level.
    fn place(&mut self, node: NodeId) -> Result<(), DocumentError> {
        match self.open.last().copied() {
            // A code block's <code> already sits inside its <pre>.
            Some(open) if self.doc.parent(node) == Some(open) => {
                if let Some(outer) = self.open.pop() {
                    self.place(outer)?;
                }
                Ok(())
            }
            Some(open) => self.doc.append_child(open, node),
            None => {
                self.doc.append_child(self.target, node)?;
                self.blocks.push(node);
                Ok(())
            }
        }
    }
}

fn heading_tag(level: HeadingLevel) -> &'static str {
    match level {
        HeadingLevel::H1 => "h1",
        HeadingLevel::H2 => "h2",
        HeadingLevel::H3 => "h3",
        HeadingLevel::H4 => "h4",
        HeadingLevel::H5 => "h5",
        HeadingLevel::H6 => "h6",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(doc: &Document, parent: NodeId) -> Vec<String> {
        doc.children(parent)
            .iter()
            .map(|&child| doc.tag_name(child).unwrap_or("#text").to_string())
            .collect()
    }

    #[test]
    fn builds_blocks_in_order() {
        let doc = parse_markdown("# Title\n\nSome *emphasis* here.\n\n- one\n- two\n").unwrap();
        assert_eq!(tags(&doc, doc.root()), vec!["h1", "p", "ul"]);
        let list = doc.children(doc.root())[2];
        assert_eq!(tags(&doc, list), vec!["li", "li"]);
        assert_eq!(doc.text_content(doc.root()), "TitleSome emphasis here.onetwo");
    }

    #[test]
    fn code_block_nests_code_in_pre() {
        let doc = parse_markdown("```rust\nlet cat = 1;\n```\n").unwrap();
        let pre = doc.children(doc.root())[0];
        assert_eq!(doc.tag_name(pre), Some("pre"));
        let code = doc.children(pre)[0];
        assert_eq!(doc.tag_name(code), Some("code"));
        assert_eq!(doc.attribute(code, "class"), Some("language-rust"));
        assert_eq!(doc.text_content(code), "let cat = 1;\n");
        assert_eq!(doc.children(doc.root()).len(), 1);
    }

    #[test]
    fn inline_code_becomes_code_element() {
        let doc = parse_markdown("use `cat` here").unwrap();
        let p = doc.children(doc.root())[0];
        assert_eq!(tags(&doc, p), vec!["#text", "code", "#text"]);
    }

    #[test]
    fn adjacent_text_events_merge() {
        let doc = parse_markdown("fish &amp; chips").unwrap();
        let p = doc.children(doc.root())[0];
        assert_eq!(doc.children(p).len(), 1);
        assert_eq!(doc.text_content(p), "fish & chips");
    }

    #[test]
    fn links_keep_href() {
        let doc = parse_markdown("[home](https://example.com)").unwrap();
        let p = doc.children(doc.root())[0];
        let a = doc.children(p)[0];
        assert_eq!(doc.attribute(a, "href"), Some("https://example.com"));
    }

    #[test]
    fn raw_html_is_dropped() {
        let doc = parse_markdown("<div>cat</div>\n\nplain\n").unwrap();
        assert_eq!(doc.text_content(doc.root()), "plain");
    }

    #[test]
    fn append_reports_one_insertion_per_block() {
        let mut doc = Document::new();
        let root = doc.root();
        let observer = doc.observe(root);
        let blocks = append_markdown(&mut doc, root, "first\n\nsecond *inline*\n").unwrap();
        assert_eq!(blocks.len(), 2);
        let records = doc.take_records(observer);
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.target == root));
    }

    #[test]
    fn block_sources_split_top_level() {
        let source = "# A\n\npara one\n\n- x\n- y\n";
        let chunks = block_sources(source);
        assert_eq!(chunks.len(), 3);
        assert!(chunks[0].starts_with("# A"));
        assert!(chunks[1].starts_with("para one"));
        assert!(chunks[2].contains("- y"));
    }
}
