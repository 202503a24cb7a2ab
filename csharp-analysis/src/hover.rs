//! Display strings and XML documentation formatting for hover tooltips.

use crate::syntax::{CsSymbolKind, Declaration};

/// Short display form of a declaration, e.g. `Greeter.Greet(string name)` for
/// a method or `App.Greeter` for a type.
pub fn declaration_display(decl: &Declaration) -> String {
    match decl.kind {
        CsSymbolKind::Method | CsSymbolKind::Constructor => {
            let params = decl.parameters().unwrap_or("");
            match &decl.container {
                Some(container) => format!("{}.{}({})", container, decl.name, params),
                None => format!("{}({})", decl.name, params),
            }
        }
        CsSymbolKind::Namespace => decl.full_name.clone(),
        kind if kind.is_type() => decl.full_name.clone(),
        _ => match &decl.container {
            Some(container) => format!("{}.{}", container, decl.name),
            None => decl.name.clone(),
        },
    }
}

/// Render `///` XML documentation lines as a small markdown block.
///
/// `<summary>` content becomes the leading paragraph, `<param>` entries a
/// bullet list, `<returns>` a trailing line. Unknown tags are stripped rather
/// than escaped; hover text should degrade to plain prose.
pub fn format_documentation(doc: &[String]) -> Option<String> {
    if doc.is_empty() {
        return None;
    }
    let joined = doc.join("\n");
    let mut out: Vec<String> = Vec::new();

    if let Some(summary) = extract_tag(&joined, "summary") {
        out.push(strip_inline_tags(&summary));
    }
    for (name, body) in extract_named_tags(&joined, "param") {
        out.push(format!("- `{}`: {}", name, strip_inline_tags(&body)));
    }
    if let Some(returns) = extract_tag(&joined, "returns") {
        out.push(format!("Returns: {}", strip_inline_tags(&returns)));
    }
    if out.is_empty() {
        // Doc block without recognized tags; show it as written.
        out.push(strip_inline_tags(&joined));
    }
    let text = out.join("\n\n").trim().to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn extract_tag(text: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = text.find(&open)? + open.len();
    let end = text[start..].find(&close)? + start;
    Some(normalize_ws(&text[start..end]))
}

fn extract_named_tags(text: &str, tag: &str) -> Vec<(String, String)> {
    let mut results = Vec::new();
    let open_prefix = format!("<{tag} name=\"");
    let close = format!("</{tag}>");
    let mut cursor = 0;
    while let Some(found) = text[cursor..].find(&open_prefix) {
        let name_start = cursor + found + open_prefix.len();
        let Some(name_len) = text[name_start..].find('"') else {
            break;
        };
        let name = text[name_start..name_start + name_len].to_string();
        let Some(body_start) = text[name_start + name_len..].find('>') else {
            break;
        };
        let body_start = name_start + name_len + body_start + 1;
        let Some(body_len) = text[body_start..].find(&close) else {
            break;
        };
        let body = normalize_ws(&text[body_start..body_start + body_len]);
        results.push((name, body));
        cursor = body_start + body_len + close.len();
    }
    results
}

/// Replace `<see cref="X"/>`-style inline references with backticked names
/// and drop any other markup.
fn strip_inline_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find('<') {
        out.push_str(&rest[..open]);
        let Some(close) = rest[open..].find('>') else {
            out.push_str(&rest[open..]);
            rest = "";
            break;
        };
        let tag = &rest[open + 1..open + close];
        if let Some(cref) = tag
            .strip_prefix("see cref=\"")
            .and_then(|t| t.strip_suffix("\"/"))
        {
            // Crefs carry prefixes like `T:` or `M:`; show only the name.
            let name = cref.rsplit_once(':').map(|(_, n)| n).unwrap_or(cref);
            out.push('`');
            out.push_str(name);
            out.push('`');
        }
        rest = &rest[open + close + 1..];
    }
    out.push_str(rest);
    normalize_ws(&out)
}

fn normalize_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
