//! Prompt text sent to the generation backend

use crate::core::model::PageRef;

pub const SYSTEM_INSTRUCTION: &str = r#"You are an expert web developer and UI/UX designer who builds and iterates on website pages from user requests.

RULES:
1. When asked to create or change a page, return the COMPLETE, valid HTML document for the page currently being edited.
2. Never wrap code in Markdown fences. Return raw code only.
3. For questions, feedback, analysis or suggestions, answer in plain text. Only return HTML when creating or updating the page.
4. A code response must begin exactly with "<!DOCTYPE html>". Put no explanation before or after the document.
5. Style with Tailwind CSS from its CDN: <script src="https://cdn.tailwindcss.com"></script>.
6. Icons come from Font Awesome: <link rel="stylesheet" href="https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.4.0/css/all.min.css">.
7. Placeholder images use "https://picsum.photos/width/height".
8. Prefer semantic HTML5 elements (header, nav, main, section, article, footer).

PAGES AND NAVIGATION:
- Each request names the file being edited and lists the project's pages as "Name: filename".
- Internal links and navigation menus MUST use exactly those filenames. If the list says About Us: "about.html", the link is <a href="about.html">About Us</a>.
- Never invent filenames or link to pages that do not exist.
- Keep header, footer and styling consistent across pages.

CONTENT:
- When given pasted text, organize it into sections with headings and grids as appropriate.
- When told to keep content unchanged, present it in a readable container without rewording it.
- New pages get a header and footer consistent with the rest of the site, with the content in the main area.
- When adding a section, append it where it fits and preserve existing content unless asked otherwise.

IMAGES AND PERFORMANCE:
- Use loading="lazy" for images below the fold and fetchpriority="high" for the hero image.
- Every <img> needs a descriptive alt attribute.
- Reserve image space with Tailwind aspect or fixed-height utilities to avoid layout shift.
"#;

pub const SYNC_LINKS_PROMPT: &str = "Update the navigation menu (header/nav) in the current page to exactly match the project structure provided in the context. Ensure all links work correctly.";

/// What the model is told about the project alongside a request
#[derive(Debug, Clone)]
pub struct PageContext {
    pub current_page: String,
    pub available_pages: Vec<PageRef>,
}

/// Prefix a request with the current page and the project's page list
pub fn with_context(prompt: &str, context: &PageContext) -> String {
    let pages = if context.available_pages.is_empty() {
        "None (this is the only page)".to_string()
    } else {
        context
            .available_pages
            .iter()
            .map(|p| format!("- {}: \"{}\"", p.name, p.path))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "[Current Context]\nEditing Page File: {}\n\n[Project Structure (Name: Filename)]\n{}\n\n[User Request]\n{}",
        context.current_page, pages, prompt
    )
}

/// Attach the page's current source to a user request
pub fn page_request(path: &str, html: &str, request: &str) -> String {
    format!(
        "Current HTML content of {}:\n{}\n\nUser Request: {}",
        path, html, request
    )
}

/// File content attached to a request
#[derive(Debug, Clone)]
pub struct Attachment {
    pub file_name: String,
    pub content: String,
}

/// Append an attached file's content to a request
pub fn with_attachment(prompt: &str, attachment: &Attachment) -> String {
    format!(
        "{}\n\n[Attached Content from file: {}]:\n{}\n\n\
         [Instruction]: Use the content above to populate the website sections appropriately.",
        prompt, attachment.file_name, attachment.content
    )
}

/// Tell the model the request creates a new page
pub fn with_new_page_action(prompt: &str, name: &str, path: &str) -> String {
    format!(
        "{prompt}\n\n[Action]: Create a new page named \"{name}\" with filename \"{path}\". \
         Use the attached content as the primary content for this page."
    )
}

/// Follow-up sent after a page is cloned from the home page
pub fn cleanup_prompt(name: &str, path: &str) -> String {
    format!(
        "I just created this page \"{name}\" ({path}) by cloning the home page.\n\
         1. Clear the main content area but KEEP the Header/Nav and Footer.\n\
         2. Update the Page Title to \"{name}\".\n\
         3. Update the Navigation Menu to include this new page \"{name}\" linking to \"{path}\"."
    )
}

/// Request for one shared header and footer covering every page
pub fn navigation_prompt(pages: &[PageRef]) -> String {
    let list = pages
        .iter()
        .map(|p| format!("- {}: \"{}\"", p.name, p.path))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Produce the shared navigation for this website.\n\
         Pages (Name: Filename):\n{list}\n\n\
         Return ONLY a <header> element containing a <nav> that links every page above, \
         followed by a <footer> element. Use exactly the filenames listed. \
         No doctype, no <html> or <body> tags, no Markdown, no explanation."
    )
}
