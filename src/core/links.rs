//! Page link rewriting and preview navigation helpers
//!
//! The rename rewrite only matches the quoted attribute form `href="path"` or
//! `href='path'` where the value equals the old path exactly. Relative
//! variants (`./about.html`) and suffixed targets (`about.html#team`) are left
//! untouched.

use regex::{Captures, Regex};

/// Rewrite every `href` that points at exactly `old_path` to `new_path`,
/// keeping the original quote style
pub fn rewrite_links(html: &str, old_path: &str, new_path: &str) -> String {
    if old_path.is_empty() || old_path == new_path {
        return html.to_string();
    }

    let escaped = regex::escape(old_path);
    let pattern = format!(r#"href="{0}"|href='{0}'"#, escaped);
    let Ok(re) = Regex::new(&pattern) else {
        return html.to_string();
    };

    re.replace_all(html, |caps: &Captures| {
        let quote = if caps[0].starts_with("href=\"") { '"' } else { '\'' };
        format!("href={quote}{new_path}{quote}")
    })
    .into_owned()
}

/// Normalize a clicked link target to a page path
///
/// Drops any `#fragment` and `?query` suffix and any leading `./` or `/`.
pub fn normalize_href(raw: &str) -> String {
    let end = raw.find(['#', '?']).unwrap_or(raw.len());
    let mut target = raw[..end].trim();

    loop {
        if let Some(rest) = target.strip_prefix("./") {
            target = rest;
        } else if let Some(rest) = target.strip_prefix('/') {
            target = rest;
        } else {
            break;
        }
    }

    target.to_string()
}

/// Remove markdown fence markers a model sometimes wraps code in
pub fn strip_code_fences(content: &str) -> String {
    content.replace("```html", "").replace("```", "")
}
