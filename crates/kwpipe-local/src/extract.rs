use html_scraper::{ElementRef, Html, Node, Selector};
use kwpipe_core::ExtractedContent;

/// Tags whose whole subtree never counts as page content.
pub const NOISY_TAGS: [&str; 13] = [
    "script", "style", "noscript", "template", "svg", "canvas", "nav", "header", "footer",
    "aside", "iframe", "object", "form",
];

pub fn is_noisy_tag(name: &str) -> bool {
    NOISY_TAGS.iter().any(|t| name.eq_ignore_ascii_case(t))
}

fn norm_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub content: ExtractedContent,
    /// Elements dropped by the noisy-tag pass (noisy elements plus everything inside them).
    pub stripped_tags: usize,
}

/// Split `html` into labeled zones.
///
/// Notes:
/// - Total over arbitrary input: malformed markup yields fewer/empty zones, never an error.
/// - Text comes out of the parser already entity-decoded; we only normalize whitespace.
pub fn extract(html: &str, source_url: &str) -> ExtractedContent {
    extract_with_stats(html, source_url).content
}

pub fn extract_with_stats(html: &str, source_url: &str) -> Extraction {
    let doc = Html::parse_document(html);

    let content = ExtractedContent {
        title: first_title(&doc),
        meta_description: meta_description(&doc),
        h1: select_visible_texts(&doc, "h1"),
        h2: select_visible_texts(&doc, "h2"),
        h3: select_visible_texts(&doc, "h3"),
        alt_texts: alt_texts(&doc),
        main_content: main_text(&doc),
        url_slug: url_slug(source_url),
    };

    Extraction {
        content,
        stripped_tags: count_stripped_elements(&doc),
    }
}

fn inside_svg(el: &ElementRef) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| a.value().name().eq_ignore_ascii_case("svg"))
}

fn first_title(doc: &Html) -> String {
    let Ok(sel) = Selector::parse("title") else {
        return String::new();
    };
    doc.select(&sel)
        .find(|el| !inside_svg(el))
        .map(|el| norm_ws(&el.text().collect::<Vec<_>>().join(" ")))
        .unwrap_or_default()
}

fn meta_description(doc: &Html) -> String {
    let Ok(sel) = Selector::parse("meta[content]") else {
        return String::new();
    };
    let mut og: Option<String> = None;
    for el in doc.select(&sel) {
        let v = el.value();
        let key = v
            .attr("name")
            .or_else(|| v.attr("property"))
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        let content = norm_ws(v.attr("content").unwrap_or(""));
        if content.is_empty() {
            continue;
        }
        match key.as_str() {
            "description" => return content,
            "og:description" if og.is_none() => og = Some(content),
            _ => {}
        }
    }
    og.unwrap_or_default()
}

/// Visible text under `root`, skipping noisy subtrees. Text nodes are joined with spaces.
///
/// Iterative: nesting depth comes from untrusted markup.
fn visible_text(root: ElementRef) -> String {
    let mut out = String::new();
    let mut stack: Vec<_> = root.children().collect();
    stack.reverse();
    while let Some(node) = stack.pop() {
        match node.value() {
            Node::Text(t) => {
                out.push_str(t);
                out.push(' ');
            }
            Node::Element(e) if is_noisy_tag(e.name()) => {}
            Node::Element(_) => {
                let start = stack.len();
                stack.extend(node.children());
                stack[start..].reverse();
            }
            _ => {}
        }
    }
    norm_ws(&out)
}

fn select_visible_texts(doc: &Html, selector: &str) -> Vec<String> {
    let Ok(sel) = Selector::parse(selector) else {
        return Vec::new();
    };
    doc.select(&sel)
        .map(visible_text)
        .filter(|t| !t.is_empty())
        .collect()
}

fn alt_texts(doc: &Html) -> Vec<String> {
    let Ok(sel) = Selector::parse("img[alt]") else {
        return Vec::new();
    };
    doc.select(&sel)
        .filter_map(|el| el.value().attr("alt"))
        .map(norm_ws)
        .filter(|t| !t.is_empty())
        .collect()
}

/// `<main>` wins over `<body>`; the noisy-tag removal is re-applied inside whichever we pick.
fn main_text(doc: &Html) -> String {
    for selector in ["main", "body"] {
        if let Ok(sel) = Selector::parse(selector) {
            if let Some(el) = doc.select(&sel).next() {
                return visible_text(el);
            }
        }
    }
    visible_text(doc.root_element())
}

fn count_stripped_elements(doc: &Html) -> usize {
    let mut removed = 0usize;
    // (node, inside a noisy subtree)
    let mut stack = vec![(*doc.root_element(), false)];
    while let Some((node, in_noise)) = stack.pop() {
        let Node::Element(e) = node.value() else {
            continue;
        };
        let noisy = in_noise || is_noisy_tag(e.name());
        if noisy {
            removed += 1;
        }
        stack.extend(node.children().map(|c| (c, noisy)));
    }
    removed
}

/// Last non-empty path segment with any file extension removed.
pub fn url_slug(source_url: &str) -> String {
    let Ok(u) = url::Url::parse(source_url.trim()) else {
        return String::new();
    };
    let Some(last) = u
        .path_segments()
        .and_then(|segs| segs.filter(|s| !s.is_empty()).last())
    else {
        return String::new();
    };
    let stem = match last.rfind('.') {
        Some(i) if i > 0 => &last[..i],
        _ => last,
    };
    stem.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!doctype html>
<html>
<head>
  <title>  Best SEO &amp; Content   Tools </title>
  <meta property="og:description" content="OG fallback text">
  <meta name="description" content="Compare keyword &quot;research&quot; tools">
  <style>.hero { color: #fff; }</style>
  <script>var tracking = "should never leak";</script>
</head>
<body>
  <header><h1>Site Brand</h1><nav><a href="/">Home</a></nav></header>
  <h1>Keyword Research Guide</h1>
  <p>Intro paragraph outside main.</p>
  <main>
    <h2>Why &#8220;long tail&#8221; matters</h2>
    <p>Long tail keywords&nbsp;convert   better.</p>
    <img src="a.png" alt="  chart of   rankings ">
    <img src="b.png" alt="">
    <form><label>Subscribe newsletter</label></form>
    <h3>Tools &#x26; tips</h3>
    <aside>Sponsored sidebar</aside>
  </main>
  <footer>Copyright footer text</footer>
</body>
</html>"#;

    #[test]
    fn extracts_every_zone() {
        let c = extract(PAGE, "https://example.com/blog/keyword-research.html");
        assert_eq!(c.title, "Best SEO & Content Tools");
        assert_eq!(c.meta_description, "Compare keyword \"research\" tools");
        assert_eq!(c.h1, vec!["Site Brand", "Keyword Research Guide"]);
        assert_eq!(c.h2, vec!["Why \u{201c}long tail\u{201d} matters"]);
        assert_eq!(c.h3, vec!["Tools & tips"]);
        assert_eq!(c.alt_texts, vec!["chart of rankings"]);
        assert_eq!(c.url_slug, "keyword-research");
    }

    #[test]
    fn main_is_preferred_and_noisy_subtrees_never_leak() {
        let c = extract(PAGE, "https://example.com/");
        assert!(c.main_content.contains("Long tail keywords convert better."));
        assert!(c.main_content.starts_with("Why"));
        for leaked in [
            "Intro paragraph",
            "Subscribe",
            "Sponsored",
            "Copyright",
            "should never leak",
            "Site Brand",
        ] {
            assert!(
                !c.main_content.contains(leaked),
                "leaked {leaked:?} into {:?}",
                c.main_content
            );
        }
    }

    #[test]
    fn body_is_used_when_there_is_no_main() {
        let html = r#"<html><body>
            <nav>Menu Items</nav>
            <div>Alpha <b>beta</b>
            gamma</div>
            <script>if (a < b) { alert("x") }</script>
            <noscript>Enable JavaScript</noscript>
        </body></html>"#;
        let c = extract(html, "https://example.com/");
        assert_eq!(c.main_content, "Alpha beta gamma");
    }

    #[test]
    fn og_description_is_a_fallback() {
        let html = r#"<html><head><meta property="og:description" content="  Only OG  "></head></html>"#;
        assert_eq!(extract(html, "").meta_description, "Only OG");
    }

    #[test]
    fn svg_titles_are_ignored() {
        let html = r#"<html><body><svg><title>Icon</title></svg></body></html>"#;
        let c = extract(html, "");
        assert_eq!(c.title, "");
        assert_eq!(c.main_content, "");
    }

    #[test]
    fn malformed_and_empty_markup_degrades_to_empty_zones() {
        assert_eq!(extract("", ""), ExtractedContent::default());
        let c = extract("<h1>Unclosed <b>heading<p>text", "not a url");
        assert_eq!(c.url_slug, "");
        assert!(!c.h1.is_empty());
        assert!(c.main_content.contains("text"));
    }

    #[test]
    fn counts_elements_removed_by_the_noise_pass() {
        let html = r#"<html><head><script>x</script><style>y</style></head>
            <body><nav><ul><li>a</li><li>b</li></ul></nav><p>kept</p></body></html>"#;
        let ex = extract_with_stats(html, "");
        // script + style + nav + ul + 2 li
        assert_eq!(ex.stripped_tags, 6);
        assert_eq!(extract_with_stats("<p>plain</p>", "").stripped_tags, 0);
    }

    #[test]
    fn deeply_nested_markup_does_not_overflow() {
        let depth = 5_000;
        let html = format!("{}deep{}", "<div>".repeat(depth), "</div>".repeat(depth));
        let c = extract(&html, "");
        assert_eq!(c.main_content, "deep");
    }

    #[test]
    fn url_slug_takes_last_non_empty_segment() {
        assert_eq!(url_slug("https://example.com/a/b/best-tools/"), "best-tools");
        assert_eq!(url_slug("https://example.com/guide.html?x=1"), "guide");
        assert_eq!(url_slug("https://example.com/archive.tar.gz"), "archive.tar");
        assert_eq!(url_slug("https://example.com/.hidden"), ".hidden");
        assert_eq!(url_slug("https://example.com/"), "");
        assert_eq!(url_slug("https://example.com"), "");
    }
}
