//! HTML pages for browser clients.
//!
//! The preview page does not proxy file content: it loads the raw file
//! client-side from the CDN and shows it in a `<pre>` block.

use crate::resolve::ResolvedTarget;

const TITLE: &str = "ghuc.cc";

/// Preview of a resolved file.
pub fn preview_page(target: &ResolvedTarget, raw_url: &str) -> String {
    // serde_json quoting yields a valid JS string literal; `</` is split so
    // the literal cannot close the surrounding <script> element.
    let url_literal = serde_json::to_string(raw_url)
        .unwrap_or_else(|_| "\"\"".to_string())
        .replace("</", "<\\/");

    let content = format!(
        r#"<div>
        <script>
          (async () => {{
            const res = await fetch({url_literal});
            if (res.ok) document.getElementById('code').textContent = await res.text();
          }})();
        </script>
        <span>Showing contents for: <a href="{href}">{shown}</a></span>
        <hr/>
        <pre><code id="code"></code></pre>
      </div>"#,
        href = escape_html(raw_url),
        shown = escape_html(&target.display_path()),
    );
    layout(TITLE, &content)
}

/// Error page carrying the same message as the plain-text response.
pub fn error_page(message: &str) -> String {
    layout(
        TITLE,
        &format!("<p><code>{}</code></p>", escape_html(message)),
    )
}

fn layout(title: &str, content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width">
    <title>{title}</title>
  </head>
  <body>
    <main style="width:800px;margin:auto">
      <h1>GHUC.CC</h1>
      <span>ghuc.cc stands for "GitHub User Content Carbon Copy".
        It redirects short, versioned paths to raw files on GitHub so they can be imported directly.</span>
      <br/>
      <br/>
      {content}
    </main>
  </body>
</html>"#,
        title = escape_html(title),
    )
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
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
