//! Comment-preserving document tree.
//!
//! The structure comes from the `yaml-rust2` event stream; comments are
//! recovered from the source text and hung on the mapping pairs and sequence
//! items they belong to, so they travel with those entries when reordered.

use std::collections::HashMap;
use yaml_rust2::parser::{Event, MarkedEventReceiver, Parser};
use yaml_rust2::scanner::{Marker, TScalarStyle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScalarStyle {
    Plain,
    SingleQuoted,
    DoubleQuoted,
    Literal,
    Folded,
}

impl ScalarStyle {
    pub fn is_block(self) -> bool {
        matches!(self, ScalarStyle::Literal | ScalarStyle::Folded)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Comments {
    /// Full-line comments directly above the entry.
    pub head: Vec<String>,
    /// Comment trailing the entry's first line.
    pub line: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum NodeKind {
    /// An empty plain scalar (`key:` with no value) has an empty `value`.
    Scalar { value: String, style: ScalarStyle },
    Sequence(Vec<Node>),
    Mapping(Vec<Pair>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Node {
    pub kind: NodeKind,
    /// Zero-based source line where the node starts.
    pub line: usize,
    /// Written in flow style (`[...]` / `{...}`).
    pub flow: bool,
    /// Comments of this node as a sequence item.
    pub comments: Comments,
}

impl Node {
    pub fn scalar_value(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Scalar { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn is_empty_collection(&self) -> bool {
        match &self.kind {
            NodeKind::Sequence(items) => items.is_empty(),
            NodeKind::Mapping(pairs) => pairs.is_empty(),
            NodeKind::Scalar { .. } => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Pair {
    pub key: Node,
    pub value: Node,
    pub comments: Comments,
}

impl Pair {
    pub fn key_is(&self, name: &str) -> bool {
        self.key.scalar_value() == Some(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Document {
    pub root: Option<Node>,
    /// Comments before a root that has no entries to carry them.
    pub head: Vec<String>,
    /// Comments after the last entry.
    pub foot: Vec<String>,
}

/// Parse the first document of `source`.
pub(crate) fn parse(source: &str) -> Result<Document, String> {
    let lines: Vec<&str> = source.lines().collect();
    let mut builder = TreeBuilder::new(&lines);
    Parser::new(source.chars())
        .load(&mut builder, false)
        .map_err(|e| e.to_string())?;
    if let Some(err) = builder.error {
        return Err(err);
    }

    let mut document = Document {
        root: builder.root,
        ..Document::default()
    };
    attach_comments(&mut document, scan_comments(&lines));
    Ok(document)
}

enum Frame {
    Sequence {
        line: usize,
        flow: bool,
        anchor: usize,
        items: Vec<Node>,
    },
    Mapping {
        line: usize,
        flow: bool,
        anchor: usize,
        pairs: Vec<Pair>,
        key: Option<Node>,
    },
}

struct TreeBuilder<'s> {
    lines: &'s [&'s str],
    /// Line number the scanner reports for the first line.
    line_base: Option<usize>,
    stack: Vec<Frame>,
    root: Option<Node>,
    anchors: HashMap<usize, Node>,
    error: Option<String>,
}

impl<'s> TreeBuilder<'s> {
    fn new(lines: &'s [&'s str]) -> Self {
        TreeBuilder {
            lines,
            line_base: None,
            stack: Vec::new(),
            root: None,
            anchors: HashMap::new(),
            error: None,
        }
    }

    fn line_of(&self, mark: &Marker) -> usize {
        mark.line().saturating_sub(self.line_base.unwrap_or(0))
    }

    fn char_at(&self, mark: &Marker) -> Option<char> {
        self.lines
            .get(self.line_of(mark))
            .and_then(|line| line.chars().nth(mark.col()))
    }

    fn push(&mut self, node: Node) {
        match self.stack.last_mut() {
            None => {
                if self.root.is_none() {
                    self.root = Some(node);
                }
            }
            Some(Frame::Sequence { items, .. }) => items.push(node),
            Some(Frame::Mapping { pairs, key, .. }) => match key.take() {
                None => *key = Some(node),
                Some(k) => pairs.push(Pair {
                    key: k,
                    value: node,
                    comments: Comments::default(),
                }),
            },
        }
    }

    fn finish(&mut self, node: Node, anchor: usize) {
        if anchor > 0 {
            self.anchors.insert(anchor, node.clone());
        }
        self.push(node);
    }
}

impl MarkedEventReceiver for TreeBuilder<'_> {
    fn on_event(&mut self, event: Event, mark: Marker) {
        if self.line_base.is_none() {
            self.line_base = Some(mark.line());
        }
        if self.error.is_some() {
            return;
        }

        match event {
            Event::Scalar(value, style, anchor, ..) => {
                let style = match style {
                    TScalarStyle::SingleQuoted => ScalarStyle::SingleQuoted,
                    TScalarStyle::DoubleQuoted => ScalarStyle::DoubleQuoted,
                    TScalarStyle::Literal => ScalarStyle::Literal,
                    TScalarStyle::Folded => ScalarStyle::Folded,
                    _ => ScalarStyle::Plain,
                };
                let empty = style == ScalarStyle::Plain
                    && (value.is_empty() || (value == "~" && self.char_at(&mark) != Some('~')));
                let node = Node {
                    kind: NodeKind::Scalar {
                        value: if empty { String::new() } else { value },
                        style,
                    },
                    line: self.line_of(&mark),
                    flow: false,
                    comments: Comments::default(),
                };
                self.finish(node, anchor);
            }
            Event::SequenceStart(anchor, ..) => {
                let frame = Frame::Sequence {
                    line: self.line_of(&mark),
                    flow: self.char_at(&mark) == Some('['),
                    anchor,
                    items: Vec::new(),
                };
                self.stack.push(frame);
            }
            Event::MappingStart(anchor, ..) => {
                let frame = Frame::Mapping {
                    line: self.line_of(&mark),
                    flow: self.char_at(&mark) == Some('{'),
                    anchor,
                    pairs: Vec::new(),
                    key: None,
                };
                self.stack.push(frame);
            }
            Event::SequenceEnd | Event::MappingEnd => {
                let (node, anchor) = match self.stack.pop() {
                    Some(Frame::Sequence {
                        line,
                        flow,
                        anchor,
                        items,
                    }) => (
                        Node {
                            kind: NodeKind::Sequence(items),
                            line,
                            flow,
                            comments: Comments::default(),
                        },
                        anchor,
                    ),
                    Some(Frame::Mapping {
                        line,
                        flow,
                        anchor,
                        pairs,
                        ..
                    }) => (
                        Node {
                            kind: NodeKind::Mapping(pairs),
                            line,
                            flow,
                            comments: Comments::default(),
                        },
                        anchor,
                    ),
                    None => {
                        self.error = Some("unbalanced collection end".into());
                        return;
                    }
                };
                self.finish(node, anchor);
            }
            Event::Alias(id) => match self.anchors.get(&id).cloned() {
                Some(mut node) => {
                    node.line = self.line_of(&mark);
                    node.comments = Comments::default();
                    self.push(node);
                }
                None => self.error = Some(format!("unknown alias at line {}", mark.line())),
            },
            _ => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct SourceComment {
    line: usize,
    text: String,
    /// Follows other content on the same line.
    trailing: bool,
}

/// Find `#` comments in the source, skipping quoted text and block scalars.
fn scan_comments(lines: &[&str]) -> Vec<SourceComment> {
    let mut comments = Vec::new();
    let mut quote: Option<char> = None;
    let mut block_indent: Option<usize> = None;

    for (number, line) in lines.iter().enumerate() {
        let indent = line.len() - line.trim_start_matches(' ').len();
        if let Some(parent) = block_indent {
            if line.trim().is_empty() || indent > parent {
                continue;
            }
            block_indent = None;
        }

        let chars: Vec<char> = line.chars().collect();
        let mut comment_at = None;
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            match quote {
                Some('\'') => {
                    if c == '\'' {
                        if chars.get(i + 1) == Some(&'\'') {
                            i += 1;
                        } else {
                            quote = None;
                        }
                    }
                }
                Some(_) => {
                    if c == '\\' {
                        i += 1;
                    } else if c == '"' {
                        quote = None;
                    }
                }
                None => {
                    if c == '#' && (i == 0 || chars[i - 1].is_whitespace()) {
                        comment_at = Some(i);
                        break;
                    }
                    if (c == '\'' || c == '"') && opens_quote(&chars[..i]) {
                        quote = Some(c);
                    }
                }
            }
            i += 1;
        }

        let content: String = chars[..comment_at.unwrap_or(chars.len())].iter().collect();
        if let Some(at) = comment_at {
            comments.push(SourceComment {
                line: number,
                text: chars[at..].iter().collect::<String>().trim_end().to_string(),
                trailing: !content.trim().is_empty(),
            });
        }
        if quote.is_none() && starts_block_scalar(&content) {
            block_indent = Some(block_owner_indent(&content));
        }
    }
    comments
}

fn opens_quote(before: &[char]) -> bool {
    match before.iter().rev().find(|c| !c.is_whitespace()) {
        None => true,
        Some(c) => matches!(c, ':' | '-' | '[' | '{' | ',' | '?'),
    }
}

/// Column of the node owning a block scalar header: the key after any `- `
/// indicators, or the last dash when the scalar is itself a sequence item.
/// Block content is every following line indented deeper than this.
fn block_owner_indent(content: &str) -> usize {
    let mut column = content.len() - content.trim_start_matches(' ').len();
    let mut rest = &content[column..];
    while let Some(after) = rest.strip_prefix('-') {
        if !after.starts_with(' ') {
            break;
        }
        let item = after.trim_start_matches(' ');
        if item.starts_with(['|', '>']) {
            break;
        }
        column += rest.len() - item.len();
        rest = item;
    }
    column
}

/// Whether a line (comment stripped) ends in a `|` or `>` block scalar header.
fn starts_block_scalar(content: &str) -> bool {
    let trimmed = content.trim_end();
    let header = trimmed.trim_end_matches(|c: char| c.is_ascii_digit() || c == '+' || c == '-');
    let Some(rest) = header
        .strip_suffix('|')
        .or_else(|| header.strip_suffix('>'))
    else {
        return false;
    };
    rest.is_empty() || rest.ends_with([' ', ':', '-'])
}

fn visit_entries(node: &mut Node, f: &mut dyn FnMut(usize, &mut Comments)) {
    if node.flow {
        return;
    }
    match &mut node.kind {
        NodeKind::Mapping(pairs) => {
            for pair in pairs.iter_mut() {
                f(pair.key.line, &mut pair.comments);
                visit_entries(&mut pair.value, f);
            }
        }
        NodeKind::Sequence(items) => {
            for item in items.iter_mut() {
                f(item.line, &mut item.comments);
                visit_entries(item, f);
            }
        }
        NodeKind::Scalar { .. } => {}
    }
}

/// Hang each comment on an entry.
///
/// A full-line comment belongs to the next entry below it, taking the
/// outermost entry starting on that line. A trailing comment belongs to the
/// innermost entry starting on its line. Anything left over is a foot comment.
fn attach_comments(document: &mut Document, comments: Vec<SourceComment>) {
    if comments.is_empty() {
        return;
    }

    let mut order: Vec<usize> = Vec::new();
    if let Some(root) = document.root.as_mut() {
        visit_entries(root, &mut |line: usize, _: &mut Comments| order.push(line));
    }
    let mut lines = order.clone();
    lines.sort_unstable();
    lines.dedup();
    let last_on_line: HashMap<usize, usize> = order
        .iter()
        .enumerate()
        .map(|(ordinal, line)| (*line, ordinal))
        .collect();

    let root_line = document.root.as_ref().map(|r| r.line);
    let mut heads: HashMap<usize, Vec<String>> = HashMap::new();
    let mut trailing: HashMap<usize, String> = HashMap::new();
    for comment in comments {
        if comment.trailing && last_on_line.contains_key(&comment.line) {
            trailing.insert(comment.line, comment.text);
            continue;
        }
        let next = lines.partition_point(|l| *l <= comment.line);
        match lines.get(next) {
            Some(target) => heads.entry(*target).or_default().push(comment.text),
            None if lines.is_empty() && root_line.is_some_and(|l| comment.line < l) => {
                document.head.push(comment.text)
            }
            None => document.foot.push(comment.text),
        }
    }

    if let Some(root) = document.root.as_mut() {
        let mut ordinal = 0;
        visit_entries(root, &mut |line: usize, slot: &mut Comments| {
            if let Some(head) = heads.remove(&line) {
                slot.head = head;
            }
            if last_on_line.get(&line) == Some(&ordinal) {
                slot.line = trailing.remove(&line);
            }
            ordinal += 1;
        });
    }
}
