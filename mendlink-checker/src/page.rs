use crate::error::Result;
use scraper::{Html, Selector};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Class added to every anchor the corrector has rewritten.
pub const MARKER_CLASS: &str = "mendlink-corrected";
/// Class of the inline notice appended inside a corrected anchor.
pub const NOTICE_CLASS: &str = "mendlink-notice";
/// id of the style block injected once per mutated document.
pub const STYLE_ID: &str = "mendlink-style";
/// id of the status node injected once per mutated document.
pub const STATUS_ID: &str = "mendlink-status";

const NOTICE_TEXT: &str = "(auto-corrected)";

/// An `<a href>` element lifted out of the document. The page owns the
/// anchor; callers mutate it in place and the page renders the change back.
#[derive(Debug, Clone, Serialize)]
pub struct Anchor {
    pub href: String,
    pub text: String,
    title: Option<String>,
    data_original_url: Option<String>,
    marker_class: bool,
    notice: bool,
}

impl Anchor {
    fn new(href: String, text: String) -> Self {
        Self {
            href,
            text,
            title: None,
            data_original_url: None,
            marker_class: false,
            notice: false,
        }
    }

    pub fn is_corrected(&self) -> bool {
        self.data_original_url.is_some()
    }

    /// The href as it appears in the source document. After a correction the
    /// live `href` points at the replacement, so the renderer matches on this.
    pub fn original_href(&self) -> &str {
        self.data_original_url.as_deref().unwrap_or(&self.href)
    }

    pub fn original_url(&self) -> Option<&str> {
        self.data_original_url.as_deref()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// One-shot rewrite of the anchor destination. Keeps the first original
    /// URL if called twice; the notice stays single either way.
    pub fn rewrite(&mut self, new_url: &str, title: String) {
        if self.data_original_url.is_none() {
            self.data_original_url = Some(self.href.clone());
        }
        self.href = new_url.to_string();
        self.title = Some(title);
        self.marker_class = true;
        self.notice = true;
    }
}

/// A parsed HTML document plus mutation state for its anchors.
pub struct Page {
    path: Option<PathBuf>,
    source: String,
    anchors: Vec<Anchor>,
}

impl Page {
    /// Parse a document and lift out every anchor carrying an href
    /// attribute, in document order. No filtering beyond attribute presence.
    pub fn parse(source: String) -> Self {
        let anchors = {
            let document = Html::parse_document(&source);
            let selector = Selector::parse("a[href]").unwrap();
            document
                .select(&selector)
                .filter_map(|element| {
                    element.value().attr("href").map(|href| {
                        let text = element.text().collect::<String>().trim().to_string();
                        Anchor::new(href.to_string(), text)
                    })
                })
                .collect()
        };
        Self {
            path: None,
            source,
            anchors,
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let source = fs::read_to_string(path)?;
        let mut page = Self::parse(source);
        page.path = Some(path.to_path_buf());
        Ok(page)
    }

    /// Walk an exported site directory and load every .html/.htm file.
    pub fn load_site(dir: &Path) -> Result<Vec<Self>> {
        let mut files = Vec::new();
        collect_html_files(dir, &mut files)?;
        files.sort();
        debug!("Found {} HTML files under {}", files.len(), dir.display());
        files.iter().map(|path| Self::from_file(path)).collect()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn anchors(&self) -> &[Anchor] {
        &self.anchors
    }

    pub fn anchors_mut(&mut self) -> &mut [Anchor] {
        &mut self.anchors
    }

    pub fn corrected_count(&self) -> usize {
        self.anchors.iter().filter(|a| a.is_corrected()).count()
    }

    pub fn is_dirty(&self) -> bool {
        self.corrected_count() > 0
    }

    /// Render the document with all anchor mutations applied. Untouched
    /// pages come back byte-identical. Mutated pages additionally get one
    /// style block in the head and one status node in the body.
    pub fn render(&self) -> String {
        let src = &self.source;
        let mut out = String::with_capacity(src.len() + 512);
        let mut emit = 0usize;
        let mut search = 0usize;

        for anchor in &self.anchors {
            // Every anchor consumes its <a> tag occurrence, corrected or
            // not, so duplicate hrefs later in the document line up
            // correctly. Hrefs on other elements (link, base, area) are
            // never candidates.
            let Some(span) = find_anchor_with_href(src, search, anchor.original_href()) else {
                continue;
            };
            search = span.tag_end + 1;
            if !anchor.is_corrected() {
                continue;
            }
            let (tag_start, tag_end) = (span.tag_start, span.tag_end);

            out.push_str(&src[emit..tag_start]);
            out.push_str(&rebuild_anchor_tag(&src[tag_start..=tag_end], anchor));

            match src[tag_end + 1..].find("</a>") {
                Some(offset) => {
                    let close = tag_end + 1 + offset;
                    let inner = &src[tag_end + 1..close];
                    out.push_str(inner);
                    if anchor.notice && !inner.contains(NOTICE_CLASS) {
                        out.push_str(&format!(
                            r#" <span class="{}">{}</span>"#,
                            NOTICE_CLASS, NOTICE_TEXT
                        ));
                    }
                    out.push_str("</a>");
                    emit = close + "</a>".len();
                    search = emit;
                }
                None => {
                    // Unclosed anchor tag, leave the inner content alone.
                    emit = tag_end + 1;
                }
            }
        }
        out.push_str(&src[emit..]);

        if self.is_dirty() {
            inject_style_block(&mut out);
            inject_status_node(&mut out, self.corrected_count());
        }
        out
    }

    /// Write the rendered document back over the source file.
    pub fn write_back(&self) -> Result<()> {
        if let Some(ref path) = self.path {
            fs::write(path, self.render())?;
        }
        Ok(())
    }
}

fn collect_html_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_html_files(&path, files)?;
        } else if let Some(ext) = path.extension().and_then(|e| e.to_str())
            && matches!(ext.to_ascii_lowercase().as_str(), "html" | "htm")
        {
            files.push(path);
        }
    }
    Ok(())
}

/// Byte range of an `<a ...>` opening tag, inclusive of the closing `>`.
struct AnchorSpan {
    tag_start: usize,
    tag_end: usize,
}

/// Locate the first `<a>` opening tag at or after `from` whose href
/// attribute carries `value`. Only anchor tags are candidates; hrefs on
/// other elements never match. The parsed value is decoded, so the source
/// may carry it either verbatim or with `&` entity-encoded.
fn find_anchor_with_href(src: &str, from: usize, value: &str) -> Option<AnchorSpan> {
    let mut pos = from;
    while let Some(rel) = src[pos..].find("<a") {
        let tag_start = pos + rel;
        // reject <article>, <abbr> and friends
        match src[tag_start + 2..].chars().next() {
            Some(c) if c.is_whitespace() || c == '>' || c == '/' => {}
            _ => {
                pos = tag_start + 2;
                continue;
            }
        }
        let gt = src[tag_start..].find('>')?;
        let tag_end = tag_start + gt;
        if tag_has_href(&src[tag_start..=tag_end], value) {
            return Some(AnchorSpan { tag_start, tag_end });
        }
        pos = tag_end + 1;
    }
    None
}

fn tag_has_href(tag: &str, value: &str) -> bool {
    let encoded = value.replace('&', "&amp;");
    let mut candidates = vec![value];
    if encoded != value {
        candidates.push(&encoded);
    }
    candidates.iter().any(|candidate| {
        tag.contains(&format!(r#"href="{}""#, candidate))
            || tag.contains(&format!("href='{}'", candidate))
    })
}

/// Rebuild an `<a ...>` opening tag with the anchor's mutations applied:
/// replacement href, title, marker class and data-original-url.
fn rebuild_anchor_tag(tag: &str, anchor: &Anchor) -> String {
    let mut attrs = parse_attrs(tag);

    set_attr(&mut attrs, "href", &anchor.href);
    if let Some(title) = anchor.title() {
        set_attr(&mut attrs, "title", title);
    }
    if let Some(original) = anchor.original_url() {
        set_attr(&mut attrs, "data-original-url", original);
    }
    if anchor.marker_class {
        let class = attrs
            .iter()
            .find(|(name, _)| name == "class")
            .and_then(|(_, value)| value.clone())
            .unwrap_or_default();
        if !class.split_whitespace().any(|c| c == MARKER_CLASS) {
            let merged = if class.is_empty() {
                MARKER_CLASS.to_string()
            } else {
                format!("{} {}", class, MARKER_CLASS)
            };
            set_attr(&mut attrs, "class", &merged);
        }
    }

    let mut out = String::from("<a");
    for (name, value) in attrs {
        match value {
            Some(value) => {
                out.push_str(&format!(r#" {}="{}""#, name, value.replace('"', "&quot;")))
            }
            None => out.push_str(&format!(" {}", name)),
        }
    }
    out.push('>');
    out
}

fn set_attr(attrs: &mut Vec<(String, Option<String>)>, name: &str, value: &str) {
    if let Some(slot) = attrs.iter_mut().find(|(n, _)| n == name) {
        slot.1 = Some(value.to_string());
    } else {
        attrs.push((name.to_string(), Some(value.to_string())));
    }
}

/// Minimal attribute tokenizer for a single opening tag. Handles quoted,
/// unquoted and bare attributes; good enough for generator-emitted HTML.
fn parse_attrs(tag: &str) -> Vec<(String, Option<String>)> {
    let body = tag
        .trim_start_matches("<a")
        .trim_end_matches('>')
        .trim_end_matches('/');
    let mut attrs = Vec::new();
    let mut chars = body.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        // attribute name
        let mut name_end = start;
        while let Some(&(i, c)) = chars.peek() {
            if c.is_whitespace() || c == '=' {
                break;
            }
            name_end = i + c.len_utf8();
            chars.next();
        }
        let name = body[start..name_end].to_string();
        // skip whitespace before a possible '='
        while let Some(&(_, c)) = chars.peek() {
            if c.is_whitespace() {
                chars.next();
            } else {
                break;
            }
        }
        let value = if let Some(&(_, '=')) = chars.peek() {
            chars.next();
            while let Some(&(_, c)) = chars.peek() {
                if c.is_whitespace() {
                    chars.next();
                } else {
                    break;
                }
            }
            match chars.peek() {
                Some(&(vstart, quote)) if quote == '"' || quote == '\'' => {
                    chars.next();
                    let mut vend = vstart + 1;
                    for (i, c) in chars.by_ref() {
                        if c == quote {
                            break;
                        }
                        vend = i + c.len_utf8();
                    }
                    Some(body[vstart + 1..vend].to_string())
                }
                Some(&(vstart, _)) => {
                    let mut vend = vstart;
                    while let Some(&(i, c)) = chars.peek() {
                        if c.is_whitespace() {
                            break;
                        }
                        vend = i + c.len_utf8();
                        chars.next();
                    }
                    Some(body[vstart..vend].to_string())
                }
                None => Some(String::new()),
            }
        } else {
            None
        };
        if !name.is_empty() {
            attrs.push((name, value));
        }
    }
    attrs
}

fn inject_style_block(out: &mut String) {
    if out.contains(STYLE_ID) {
        return;
    }
    let style = format!(
        "<style id=\"{}\">.{} {{ border-bottom: 1px dashed #e0a800; }} .{} {{ font-size: 0.8em; color: #e0a800; }}</style>",
        STYLE_ID, MARKER_CLASS, NOTICE_CLASS
    );
    insert_before_closing(out, "</head>", &style, true);
}

fn inject_status_node(out: &mut String, corrected: usize) {
    if out.contains(STATUS_ID) {
        return;
    }
    let status = format!(
        "<div id=\"{}\" hidden data-corrected=\"{}\">mendlink corrected {} link(s)</div>",
        STATUS_ID, corrected, corrected
    );
    insert_before_closing(out, "</body>", &status, false);
}

fn insert_before_closing(out: &mut String, closing: &str, fragment: &str, prepend_on_miss: bool) {
    let lowered = out.to_ascii_lowercase();
    match lowered.find(closing) {
        Some(pos) => out.insert_str(pos, fragment),
        None => {
            if prepend_on_miss {
                out.insert_str(0, fragment);
            } else {
                out.push_str(fragment);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<html><head><title>t</title></head><body>
<a href="http://example.com/old" class="nav">Old</a>
<a href="/about">About</a>
<a href="http://example.com/old">Old again</a>
</body></html>"#;

    #[test]
    fn parse_collects_anchors_in_document_order() {
        let page = Page::parse(SAMPLE.to_string());
        let hrefs: Vec<&str> = page.anchors().iter().map(|a| a.href.as_str()).collect();
        assert_eq!(
            hrefs,
            vec!["http://example.com/old", "/about", "http://example.com/old"]
        );
        assert_eq!(page.anchors()[0].text, "Old");
    }

    #[test]
    fn render_is_identity_without_corrections() {
        let page = Page::parse(SAMPLE.to_string());
        assert_eq!(page.render(), SAMPLE);
    }

    #[test]
    fn render_rewrites_corrected_anchor() {
        let mut page = Page::parse(SAMPLE.to_string());
        page.anchors_mut()[0].rewrite(
            "https://example.com/old",
            "Original link: http://example.com/old".to_string(),
        );
        let html = page.render();

        assert!(html.contains(r#"href="https://example.com/old""#));
        assert!(html.contains(r#"data-original-url="http://example.com/old""#));
        assert!(html.contains(r#"class="nav mendlink-corrected""#));
        assert!(html.contains(NOTICE_CLASS));
        assert!(html.contains(STYLE_ID));
        assert!(html.contains(STATUS_ID));
        // the untouched duplicate keeps its original href
        assert!(html.contains(r#"<a href="http://example.com/old">Old again</a>"#));
    }

    #[test]
    fn render_corrects_each_element_sharing_a_href() {
        let mut page = Page::parse(SAMPLE.to_string());
        for idx in [0usize, 2] {
            page.anchors_mut()[idx].rewrite("https://example.com/old", "t".to_string());
        }
        let html = page.render();
        assert_eq!(html.matches(r#"href="https://example.com/old""#).count(), 2);
        assert!(!html.contains(r#"href="http://example.com/old""#));
    }

    #[test]
    fn notice_is_not_duplicated_on_second_render() {
        let mut page = Page::parse(SAMPLE.to_string());
        page.anchors_mut()[0].rewrite("https://example.com/old", "t".to_string());
        let once = page.render();

        // re-parse the mutated document and correct the same element again
        let mut again = Page::parse(once);
        let idx = again
            .anchors()
            .iter()
            .position(|a| a.href == "https://example.com/old")
            .unwrap();
        again.anchors_mut()[idx].rewrite("https://example.com/older", "t".to_string());
        let twice = again.render();
        let notice_span = format!(r#"<span class="{}">"#, NOTICE_CLASS);
        assert_eq!(twice.matches(notice_span.as_str()).count(), 1);
    }

    #[test]
    fn entity_encoded_href_is_still_rewritten() {
        let source = r#"<html><head></head><body><a href="http://example.com/p?a=1&amp;b=2">q</a></body></html>"#;
        let mut page = Page::parse(source.to_string());
        // the parsed value is decoded
        assert_eq!(page.anchors()[0].href, "http://example.com/p?a=1&b=2");

        page.anchors_mut()[0].rewrite("https://example.com/p?a=1&b=2", "t".to_string());
        let html = page.render();
        assert!(html.contains(r#"href="https://example.com/p?a=1&b=2""#));
        assert!(html.contains("data-original-url"));
        assert!(!html.contains(r#"href="http://example.com/p?a=1&amp;b=2""#));
    }

    #[test]
    fn href_on_a_link_element_does_not_shadow_the_anchor() {
        let source = r#"<html><head><link rel="canonical" href="http://example.com/x"></head><body><a href="http://example.com/x">x</a></body></html>"#;
        let mut page = Page::parse(source.to_string());
        assert_eq!(page.anchors().len(), 1);

        page.anchors_mut()[0].rewrite("https://example.com/x", "t".to_string());
        let html = page.render();
        // the <link> keeps its href, the <a> gets the correction
        assert!(html.contains(r#"<link rel="canonical" href="http://example.com/x">"#));
        assert!(html.contains(r#"<a href="https://example.com/x""#));
        assert!(!html.contains(r#"<a href="http://example.com/x""#));
    }

    #[test]
    fn rewrite_twice_keeps_first_original_url() {
        let mut page = Page::parse(SAMPLE.to_string());
        page.anchors_mut()[0].rewrite("https://example.com/old", "t".to_string());
        page.anchors_mut()[0].rewrite("/404.html", "t".to_string());
        assert_eq!(
            page.anchors()[0].original_url(),
            Some("http://example.com/old")
        );
        assert_eq!(page.anchors()[0].href, "/404.html");
    }

    #[test]
    fn load_site_walks_nested_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), SAMPLE).unwrap();
        std::fs::create_dir(dir.path().join("blog")).unwrap();
        std::fs::write(dir.path().join("blog/post.htm"), SAMPLE).unwrap();
        std::fs::write(dir.path().join("style.css"), "body {}").unwrap();

        let pages = Page::load_site(dir.path()).unwrap();
        assert_eq!(pages.len(), 2);
        assert!(pages.iter().all(|p| p.path().is_some()));
    }
}
