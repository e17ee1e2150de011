//! Rich-text helpers for task descriptions.

use comrak::{Options, markdown_to_html};

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render provider markdown. Raw HTML in the source is not passed through.
pub fn markdown(source: &str) -> String {
    if source.trim().is_empty() {
        return String::new();
    }
    let mut options = Options::default();
    options.extension.strikethrough = true;
    options.extension.table = true;
    options.extension.autolink = true;
    options.extension.tasklist = true;
    markdown_to_html(source, &options).trim_end().to_string()
}

pub fn link(url: &str, text: &str) -> String {
    format!(
        "<p><a href=\"{}\">{}</a></p>",
        escape(url),
        escape(if text.is_empty() { url } else { text })
    )
}

/// Append an HTML fragment to a description, newline separated.
pub fn append(description: &mut String, fragment: &str) {
    if fragment.is_empty() {
        return;
    }
    if !description.is_empty() {
        description.push('\n');
    }
    description.push_str(fragment);
}

pub struct ChecklistItem<'a> {
    pub text: &'a str,
    pub checked: bool,
}

/// Render a checklist as the editor's task-list fragment, headed by its title.
pub fn checklist(title: &str, items: &[ChecklistItem<'_>]) -> String {
    let mut html = String::new();
    if !title.is_empty() {
        html.push_str(&format!("<h3>{}</h3>", escape(title)));
    }
    html.push_str("<ul data-type=\"taskList\">");
    for item in items {
        html.push_str(&format!(
            concat!(
                "<li data-checked=\"{}\" data-type=\"taskItem\">",
                "<label><input type=\"checkbox\"{}><span></span></label>",
                "<div><p>{}</p></div></li>",
            ),
            item.checked,
            if item.checked { " checked=\"checked\"" } else { "" },
            escape(item.text),
        ));
    }
    html.push_str("</ul>");
    html
}
