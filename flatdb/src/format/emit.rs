use super::node::{Document, Node, NodeKind, Pair, ScalarStyle};

const INDENT: usize = 2;

/// Render as block YAML with two-space indentation and sequences nested
/// under their keys.
pub(crate) fn to_yaml(document: &Document) -> String {
    let mut out = String::new();
    write_comments(&mut out, &document.head, 0);
    if let Some(root) = &document.root {
        match &root.kind {
            NodeKind::Scalar { value, style } => {
                if style.is_block() && block_safe(value) {
                    write_block_scalar(&mut out, value, INDENT, None);
                } else {
                    out.push_str(&inline_scalar(value, *style));
                    out.push('\n');
                }
            }
            _ if is_block_collection(root) => write_entries(&mut out, root, 0),
            _ => {
                out.push_str(&flow_text(root));
                out.push('\n');
            }
        }
    }
    write_comments(&mut out, &document.foot, 0);
    out
}

fn is_block_collection(node: &Node) -> bool {
    !node.flow && !node.is_empty_collection() && !matches!(node.kind, NodeKind::Scalar { .. })
}

fn pad(out: &mut String, indent: usize) {
    out.extend(std::iter::repeat(' ').take(indent));
}

fn write_comments(out: &mut String, comments: &[String], indent: usize) {
    for comment in comments {
        pad(out, indent);
        out.push_str(comment);
        out.push('\n');
    }
}

fn end_line(out: &mut String, comment: Option<&str>) {
    if let Some(comment) = comment {
        out.push(' ');
        out.push_str(comment);
    }
    out.push('\n');
}

fn write_entries(out: &mut String, node: &Node, indent: usize) {
    match &node.kind {
        NodeKind::Mapping(pairs) => pairs.iter().for_each(|pair| write_pair(out, pair, indent)),
        NodeKind::Sequence(items) => items.iter().for_each(|item| write_item(out, item, indent)),
        NodeKind::Scalar { .. } => {}
    }
}

fn write_pair(out: &mut String, pair: &Pair, indent: usize) {
    write_comments(out, &pair.comments.head, indent);
    pad(out, indent);
    out.push_str(&key_text(&pair.key));
    out.push(':');
    write_value(out, &pair.value, indent, pair.comments.line.as_deref());
}

/// Write what follows `key:` or `-`.
fn write_value(out: &mut String, value: &Node, indent: usize, comment: Option<&str>) {
    match &value.kind {
        NodeKind::Scalar { value: text, style } => {
            if style.is_block() && block_safe(text) {
                out.push(' ');
                write_block_scalar(out, text, indent + INDENT, comment);
            } else if text.is_empty() && *style == ScalarStyle::Plain {
                end_line(out, comment);
            } else {
                out.push(' ');
                out.push_str(&inline_scalar(text, *style));
                end_line(out, comment);
            }
        }
        _ if is_block_collection(value) => {
            end_line(out, comment);
            write_entries(out, value, indent + INDENT);
        }
        _ => {
            out.push(' ');
            out.push_str(&flow_text(value));
            end_line(out, comment);
        }
    }
}

fn write_item(out: &mut String, item: &Node, indent: usize) {
    if !is_block_collection(item) {
        write_comments(out, &item.comments.head, indent);
        pad(out, indent);
        out.push('-');
        write_value(out, item, indent, item.comments.line.as_deref());
        return;
    }

    // The first entry shares the dash line, so its head comments go above the dash.
    let mut item = item.clone();
    let mut head = std::mem::take(&mut item.comments.head);
    hoist_first_comments(&mut item, &mut head);
    write_comments(out, &head, indent);

    let mut body = String::new();
    write_entries(&mut body, &item, indent + INDENT);
    pad(out, indent);
    out.push_str("- ");
    out.push_str(&body[indent + INDENT..]);
}

fn hoist_first_comments(node: &mut Node, into: &mut Vec<String>) {
    match &mut node.kind {
        NodeKind::Mapping(pairs) => {
            if let Some(pair) = pairs.first_mut() {
                into.append(&mut pair.comments.head);
            }
        }
        NodeKind::Sequence(items) => {
            if let Some(first) = items.first_mut() {
                into.append(&mut first.comments.head);
                if is_block_collection(first) {
                    hoist_first_comments(first, into);
                }
            }
        }
        NodeKind::Scalar { .. } => {}
    }
}

/// Block scalars whose text cannot round-trip through a literal block are
/// written double-quoted instead.
fn block_safe(text: &str) -> bool {
    !text.is_empty()
        && !text.starts_with([' ', '\n', '\t'])
        && !text.contains('\r')
        && text.trim_end_matches('\n').split('\n').all(|l| !l.starts_with('\t'))
}

fn write_block_scalar(out: &mut String, text: &str, indent: usize, comment: Option<&str>) {
    let chomp = if text.ends_with("\n\n") {
        "+"
    } else if text.ends_with('\n') {
        ""
    } else {
        "-"
    };
    out.push('|');
    out.push_str(chomp);
    end_line(out, comment);
    let body = text.strip_suffix('\n').unwrap_or(text);
    for line in body.split('\n') {
        if !line.is_empty() {
            pad(out, indent);
            out.push_str(line);
        }
        out.push('\n');
    }
}

fn key_text(key: &Node) -> String {
    match &key.kind {
        NodeKind::Scalar { value, style } if !(value.is_empty() && *style == ScalarStyle::Plain) => {
            inline_scalar(value, *style)
        }
        NodeKind::Scalar { .. } => "\"\"".to_string(),
        _ => flow_text(key),
    }
}

fn inline_scalar(value: &str, style: ScalarStyle) -> String {
    match style {
        ScalarStyle::Plain if !value.contains('\n') => value.to_string(),
        ScalarStyle::SingleQuoted if !value.contains('\n') => {
            format!("'{}'", value.replace('\'', "''"))
        }
        _ => double_quoted(value),
    }
}

fn double_quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn flow_text(node: &Node) -> String {
    match &node.kind {
        NodeKind::Scalar { value, style } => {
            if value.is_empty() && *style == ScalarStyle::Plain {
                "~".to_string()
            } else if style.is_block() {
                double_quoted(value)
            } else {
                inline_scalar(value, *style)
            }
        }
        NodeKind::Sequence(items) => {
            let items: Vec<String> = items.iter().map(flow_text).collect();
            format!("[{}]", items.join(", "))
        }
        NodeKind::Mapping(pairs) => {
            let pairs: Vec<String> = pairs
                .iter()
                .map(|p| format!("{}: {}", key_text(&p.key), flow_text(&p.value)))
                .collect();
            format!("{{{}}}", pairs.join(", "))
        }
    }
}

/// Render as indented JSON, preserving key order and numeric text.
pub(crate) fn to_json(document: &Document) -> String {
    let mut out = String::new();
    match &document.root {
        Some(root) => write_json(&mut out, root, 0),
        None => out.push_str("null"),
    }
    out.push('\n');
    out
}

fn write_json(out: &mut String, node: &Node, indent: usize) {
    match &node.kind {
        NodeKind::Scalar { value, style } => out.push_str(&json_scalar(value, *style)),
        NodeKind::Sequence(items) if items.is_empty() => out.push_str("[]"),
        NodeKind::Mapping(pairs) if pairs.is_empty() => out.push_str("{}"),
        NodeKind::Sequence(items) => {
            out.push_str("[\n");
            for (i, item) in items.iter().enumerate() {
                pad(out, indent + INDENT);
                write_json(out, item, indent + INDENT);
                out.push_str(if i + 1 < items.len() { ",\n" } else { "\n" });
            }
            pad(out, indent);
            out.push(']');
        }
        NodeKind::Mapping(pairs) => {
            out.push_str("{\n");
            for (i, pair) in pairs.iter().enumerate() {
                pad(out, indent + INDENT);
                let key = match pair.key.scalar_value() {
                    Some(key) => key.to_string(),
                    None => flow_text(&pair.key),
                };
                out.push_str(&json_string(&key));
                out.push_str(": ");
                write_json(out, &pair.value, indent + INDENT);
                out.push_str(if i + 1 < pairs.len() { ",\n" } else { "\n" });
            }
            pad(out, indent);
            out.push('}');
        }
    }
}

fn json_scalar(value: &str, style: ScalarStyle) -> String {
    if style != ScalarStyle::Plain {
        return json_string(value);
    }
    match value {
        "" | "~" | "null" | "Null" | "NULL" => return "null".into(),
        "true" | "True" | "TRUE" => return "true".into(),
        "false" | "False" | "FALSE" => return "false".into(),
        _ => {}
    }
    if is_json_number(value) {
        return value.to_string();
    }
    if let Ok(n) = value.parse::<i64>() {
        return n.to_string();
    }
    json_string(value)
}

fn is_json_number(text: &str) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text);
    let (int, rest) = digits.split_at(digits.find(|c: char| !c.is_ascii_digit()).unwrap_or(digits.len()));
    if int.is_empty() || (int.len() > 1 && int.starts_with('0')) {
        return false;
    }
    let rest = match rest.strip_prefix('.') {
        Some(frac) => {
            let end = frac.find(|c: char| !c.is_ascii_digit()).unwrap_or(frac.len());
            if end == 0 {
                return false;
            }
            &frac[end..]
        }
        None => rest,
    };
    match rest.strip_prefix(['e', 'E']) {
        Some(exp) => {
            let exp = exp.strip_prefix(['+', '-']).unwrap_or(exp);
            !exp.is_empty() && exp.chars().all(|c| c.is_ascii_digit())
        }
        None => rest.is_empty(),
    }
}

fn json_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::super::node::parse;
    use super::*;
    use pretty_assertions::assert_eq;

    fn yaml(source: &str) -> String {
        to_yaml(&parse(source).unwrap())
    }

    fn json(source: &str) -> String {
        to_json(&parse(source).unwrap())
    }

    #[test]
    fn test_yaml_indents_sequences_under_keys() {
        let out = yaml("items:\n- id: a\n  tags:\n  - x\n  - y\n");
        assert_eq!(out, "items:\n  - id: a\n    tags:\n      - x\n      - y\n");
    }

    #[test]
    fn test_yaml_scalar_styles() {
        let out = yaml("a: 'it''s'\nb: \"tab\\there\"\nc: >\n  folded\n  text\nd: |-\n  keep\ne:\nf: [1, 'two']\ng: {}\n");
        assert_eq!(
            out,
            "a: 'it''s'\nb: \"tab\\there\"\nc: |\n  folded text\nd: |-\n  keep\ne:\nf: [1, 'two']\ng: {}\n"
        );
    }

    #[test]
    fn test_yaml_comments_and_nested_sequences() {
        let source = "# head\nlist: # trailing\n  - - a\n    - b\n  # before c\n  - c\n# foot\n";
        assert_eq!(yaml(source), source);
    }

    #[test]
    fn test_yaml_literal_with_blank_lines() {
        let source = "body: |\n  one\n\n  two\n";
        assert_eq!(yaml(source), source);
    }

    #[test]
    fn test_json_resolves_plain_scalars() {
        let out = json("{\"a\": 1.50, \"b\": \"2\", \"c\": true, \"d\": null, \"e\": [], \"f\": {\"g\": 12345678901234567890}}");
        assert_eq!(
            out,
            "{\n  \"a\": 1.50,\n  \"b\": \"2\",\n  \"c\": true,\n  \"d\": null,\n  \"e\": [],\n  \"f\": {\n    \"g\": 12345678901234567890\n  }\n}\n"
        );
    }

    #[test]
    fn test_json_number_syntax() {
        assert!(is_json_number("0"));
        assert!(is_json_number("-1.5e+3"));
        assert!(!is_json_number("01"));
        assert!(!is_json_number("1."));
        assert!(!is_json_number(".5"));
        assert!(!is_json_number("1e"));
    }
}
