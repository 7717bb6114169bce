//! Header/footer splicing for project-wide navigation refreshes
//!
//! The structural splice parses both the page and the navigation fragment
//! with html5ever (via scraper), swaps the first `<header>` (or `<nav>` when
//! the page has no header) and the first `<footer>` for copies of the
//! fragment's elements, and inserts them at the top or bottom of `<body>`
//! when the page lacks them. If the structural pass cannot run, a regex
//! fallback does a best-effort textual replacement.

use regex::{NoExpand, Regex};
use scraper::{ElementRef, Html, Node, Selector};
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum SpliceError {
    #[error("Navigation fragment has no header, nav or footer element")]
    EmptyFragment,

    #[error("Document is empty")]
    EmptyDocument,

    #[error("Document has no body element")]
    NoBody,

    #[error("Invalid selector: {0}")]
    Selector(String),
}

/// Splice the fragment's header and footer into `document`
///
/// Falls back to the regex splice when structural parsing fails, and returns
/// the document unchanged when neither pass can apply the fragment.
pub fn splice_navigation(document: &str, fragment: &str) -> String {
    match splice_structural(document, fragment) {
        Ok(html) => html,
        Err(e) => {
            warn!("Structural splice failed ({}), using text fallback", e);
            match splice_fallback(document, fragment) {
                Ok(html) => html,
                Err(e) => {
                    warn!("Fallback splice failed: {}", e);
                    document.to_string()
                }
            }
        }
    }
}

fn selector(css: &str) -> Result<Selector, SpliceError> {
    Selector::parse(css).map_err(|e| SpliceError::Selector(format!("{:?}", e)))
}

pub fn splice_structural(document: &str, fragment: &str) -> Result<String, SpliceError> {
    if document.trim().is_empty() {
        return Err(SpliceError::EmptyDocument);
    }

    let header_sel = selector("header")?;
    let nav_sel = selector("nav")?;
    let footer_sel = selector("footer")?;
    let body_sel = selector("body")?;

    let source = Html::parse_fragment(fragment);
    let src_header = source
        .select(&header_sel)
        .next()
        .or_else(|| source.select(&nav_sel).find(|nav| !inside_footer(nav)));
    let src_footer = source.select(&footer_sel).next();
    if src_header.is_none() && src_footer.is_none() {
        return Err(SpliceError::EmptyFragment);
    }

    let mut doc = Html::parse_document(document);
    let body_id = doc
        .select(&body_sel)
        .next()
        .map(|body| body.id())
        .ok_or(SpliceError::NoBody)?;
    // A nav inside the footer belongs to the footer; it is never the header
    let header_target = doc
        .select(&header_sel)
        .next()
        .or_else(|| doc.select(&nav_sel).find(|nav| !inside_footer(nav)))
        .map(|el| el.id());
    let footer_target = doc.select(&footer_sel).next().map(|el| el.id());

    let placements = [
        (src_header, header_target, true),
        (src_footer, footer_target, false),
    ];

    for (src, target, at_top) in placements {
        let Some(src) = src else { continue };

        // Copy the fragment subtree into the document tree as an orphan
        let copy_id = doc.tree.orphan(Node::Element(src.value().clone())).id();
        let mut stack = vec![(*src, copy_id)];
        while let Some((from, to)) = stack.pop() {
            for child in from.children() {
                if let Some(mut parent) = doc.tree.get_mut(to) {
                    let id = parent.append(child.value().clone()).id();
                    stack.push((child, id));
                }
            }
        }

        match target {
            Some(target_id) => {
                if let Some(mut existing) = doc.tree.get_mut(target_id) {
                    existing.insert_id_before(copy_id);
                    existing.detach();
                }
            }
            None => {
                if let Some(mut body) = doc.tree.get_mut(body_id) {
                    if at_top {
                        body.prepend_id(copy_id);
                    } else {
                        body.append_id(copy_id);
                    }
                }
            }
        }
    }

    Ok(doc.html())
}

fn inside_footer(element: &ElementRef<'_>) -> bool {
    element.ancestors().any(|node| {
        node.value()
            .as_element()
            .map(|el| el.name() == "footer")
            .unwrap_or(false)
    })
}

/// Serialize a document the way the structural splice does
pub fn normalize(document: &str) -> String {
    Html::parse_document(document).html()
}

struct FallbackPatterns {
    header: Regex,
    nav: Regex,
    footer: Regex,
    body_open: Regex,
    body_close: Regex,
}

impl FallbackPatterns {
    fn compile() -> Result<Self, regex::Error> {
        Ok(Self {
            header: Regex::new(r"(?is)<header\b.*?</header\s*>")?,
            nav: Regex::new(r"(?is)<nav\b.*?</nav\s*>")?,
            footer: Regex::new(r"(?is)<footer\b.*?</footer\s*>")?,
            body_open: Regex::new(r"(?i)<body\b[^>]*>")?,
            body_close: Regex::new(r"(?i)</body\s*>")?,
        })
    }
}

/// Best-effort textual splice: replace the first matching block or insert
/// right after `<body>` / right before `</body>`
pub fn splice_fallback(document: &str, fragment: &str) -> Result<String, regex::Error> {
    let re = FallbackPatterns::compile()?;

    let header = re
        .header
        .find(fragment)
        .or_else(|| re.nav.find(fragment))
        .map(|m| m.as_str());
    let footer = re.footer.find(fragment).map(|m| m.as_str());

    let mut out = document.to_string();

    if let Some(header) = header {
        out = if re.header.is_match(&out) {
            re.header.replace(&out, NoExpand(header)).into_owned()
        } else if re.nav.is_match(&out) {
            re.nav.replace(&out, NoExpand(header)).into_owned()
        } else {
            match re.body_open.find(&out) {
                Some(m) => format!("{}\n{}{}", &out[..m.end()], header, &out[m.end()..]),
                None => format!("{}\n{}", header, out),
            }
        };
    }

    if let Some(footer) = footer {
        out = if re.footer.is_match(&out) {
            re.footer.replace(&out, NoExpand(footer)).into_owned()
        } else {
            match re.body_close.find_iter(&out).last() {
                Some(m) => format!("{}{}\n{}", &out[..m.start()], footer, &out[m.start()..]),
                None => format!("{}\n{}", out, footer),
            }
        };
    }

    Ok(out)
}
