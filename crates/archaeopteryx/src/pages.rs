//! Built-in HTML pages.

/// HTML-escape a string to prevent markup injection from file names and
/// request paths.
pub fn html_escape(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Render the 404 page for `path`.
pub fn not_found_page(path: &str) -> String {
    let path = html_escape(path);
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>404 - {path}</title>
    <style>
        body {{
            margin: 0;
            min-height: 100vh;
            display: flex;
            align-items: center;
            justify-content: center;
            font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, Helvetica, Arial, sans-serif;
            background: #fff;
            color: #424242;
        }}
        @media (prefers-color-scheme: dark) {{
            body {{ background: #2b333b; color: #c1c3c4; }}
        }}
        h1 {{ font-size: 64px; margin: 0; color: #f27a3a; }}
        code {{ font-family: "SFMono-Regular", Consolas, Menlo, monospace; }}
    </style>
</head>
<body>
    <main>
        <h1>404</h1>
        <p>Nothing to serve at <code>{path}</code></p>
    </main>
</body>
</html>
"#
    )
}
