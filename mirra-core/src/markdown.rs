use pulldown_cmark::{Options, Parser, html};

fn options() -> Options {
    // Heading attributes stay off: headings never get generated ids, so
    // the same source always produces the same markup.
    Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_FOOTNOTES
}

/// Converts a markdown body to HTML.
///
/// Raw HTML, including component reference comments, passes through
/// untouched so the template engine still sees it.
pub fn to_html(markdown: &str) -> String {
    let parser = Parser::new_ext(markdown, options());

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);

    out
}
