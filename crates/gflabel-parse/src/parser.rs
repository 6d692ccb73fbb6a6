#![forbid(unsafe_code)]

//! Label string parser.
//!
//! Grammar, informally:
//!
//! ```text
//! label      := (text | escape | newline | directive)*
//! escape     := "{{" | "}}"
//! newline    := LF | CR LF | "\n" (backslash, n)
//! directive  := "{" body (":" modifier)* "}"
//! body       := number                      gap in mm
//!             | ratio? "|" ratio?           column separator
//!             | "<" | ">"                   alignment marker
//!             | name ("(" args? ")")?       fragment
//! modifier   := ident "(" args ")"
//! args       := arg ("," arg)*
//! arg        := value | key "=" value
//! ```
//!
//! Parsing is a pure function of the input and the registry. Alignment
//! markers are only accepted as the first node of a column.

use gflabel_core::{LabelError, LocalTransform, Position, Result, Span, Vec2};
use gflabel_fragments::{Arg, Capabilities, FragmentKind, FragmentRegistry, bind};

use crate::ast::{AlignMarker, FragmentRef, LabelAst, Modifiers, Node, SpannedNode};

/// Attributes a modifier chain passes through untouched.
const ATTRIBUTE_MODIFIERS: &[&str] = &["color", "material"];

/// Parse one label string.
pub fn parse(text: &str, registry: &FragmentRegistry) -> Result<LabelAst> {
    let _span = tracing::debug_span!("parse", len = text.len()).entered();
    let nodes = Parser::new(text, registry).run()?;
    tracing::debug!(nodes = nodes.len(), "parsed label");
    Ok(LabelAst {
        source: text.to_string(),
        nodes,
    })
}

struct Parser<'a> {
    input: &'a str,
    registry: &'a FragmentRegistry,
    idx: usize,
    line: usize,
    col: usize,
    nodes: Vec<SpannedNode>,
    text: String,
    text_start: Position,
    /// No node has been placed in the current column yet.
    at_column_start: bool,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str, registry: &'a FragmentRegistry) -> Self {
        Self {
            input,
            registry,
            idx: 0,
            line: 1,
            col: 1,
            nodes: Vec::new(),
            text: String::new(),
            text_start: Position::START,
            at_column_start: true,
        }
    }

    fn run(mut self) -> Result<Vec<SpannedNode>> {
        while let Some(c) = self.peek() {
            match c {
                '{' if self.peek_second() == Some('{') => self.escape('{'),
                '}' if self.peek_second() == Some('}') => self.escape('}'),
                '{' => {
                    self.flush_text();
                    self.directive()?;
                }
                '}' => {
                    let at = self.position();
                    return Err(LabelError::syntax(
                        "unmatched '}' (write '}}' for a literal brace)",
                        Span::point(at),
                    ));
                }
                '\n' => self.newline(1),
                '\r' if self.peek_second() == Some('\n') => self.newline(2),
                '\\' if self.peek_second() == Some('n') => self.newline(2),
                _ => {
                    if self.text.is_empty() {
                        self.text_start = self.position();
                    }
                    self.text.push(c);
                    self.advance();
                }
            }
        }
        self.flush_text();
        Ok(self.nodes)
    }

    fn escape(&mut self, brace: char) {
        if self.text.is_empty() {
            self.text_start = self.position();
        }
        self.text.push(brace);
        self.advance();
        self.advance();
    }

    fn newline(&mut self, width: usize) {
        self.flush_text();
        let start = self.position();
        for _ in 0..width {
            self.advance();
        }
        self.push(Node::Newline, Span::new(start, self.position()));
    }

    fn flush_text(&mut self) {
        if self.text.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.text);
        let span = Span::new(self.text_start, self.position());
        self.push(Node::TextRun { text }, span);
    }

    fn push(&mut self, node: Node, span: Span) {
        self.at_column_start = matches!(node, Node::ColumnSeparator { .. });
        self.nodes.push(SpannedNode { node, span });
    }

    fn directive(&mut self) -> Result<()> {
        let start = self.position();
        self.advance();
        let body_start = self.idx;
        loop {
            match self.peek() {
                None | Some('\n') => {
                    return Err(LabelError::syntax(
                        "unclosed '{'",
                        Span::new(start, self.position()),
                    ));
                }
                Some('{') => {
                    return Err(LabelError::syntax(
                        "unexpected '{' inside fragment",
                        Span::new(start, self.position()),
                    ));
                }
                Some('}') => break,
                Some(_) => self.advance(),
            }
        }
        let input = self.input;
        let body = &input[body_start..self.idx];
        self.advance();
        let span = Span::new(start, self.position());
        tracing::trace!(body, line = start.line, col = start.col, "directive");

        let node = self.directive_node(body, span)?;
        if matches!(node, Node::Align { .. }) && !self.at_column_start {
            return Err(LabelError::column_spec(
                "alignment marker must be the first thing in a label or column",
                span,
            ));
        }
        self.push(node, span);
        Ok(())
    }

    fn directive_node(&self, body: &str, span: Span) -> Result<Node> {
        let mut parts = split_top_level(body, ':').map_err(|message| LabelError::syntax(message, span))?;
        let head = parts.remove(0).trim();
        let modifiers = parts;

        if head.is_empty() {
            return Err(LabelError::syntax("empty fragment", span));
        }

        if let Some(separator) = column_separator(head, span)? {
            reject_modifiers(FragmentKind::Splitter.name(), &modifiers, span)?;
            return Ok(separator);
        }
        if let Ok(width_mm) = head.parse::<f64>() {
            if !width_mm.is_finite() || width_mm < 0.0 {
                return Err(LabelError::arguments(
                    "gap",
                    format!("gap width must be a non-negative number, got '{head}'"),
                )
                .at(span));
            }
            reject_modifiers("gap", &modifiers, span)?;
            return Ok(Node::Gap { width_mm });
        }
        let marker = match head {
            "<" => Some(AlignMarker::Left),
            ">" => Some(AlignMarker::Right),
            _ => None,
        };
        if let Some(marker) = marker {
            reject_modifiers(head, &modifiers, span)?;
            return Ok(Node::Align { marker });
        }

        let (name, args) = name_and_args(head).map_err(|message| LabelError::syntax(message, span))?;
        let descriptor = self.registry.lookup(name).map_err(|error| error.at(span))?;
        if descriptor.has(Capabilities::STRUCTURAL) {
            return Err(LabelError::syntax(
                format!("'{name}' is a layout marker and takes no arguments"),
                span,
            ));
        }
        let params = bind(descriptor.kind, &args).map_err(|error| error.at(span))?;

        let modifiers = if modifiers.is_empty() {
            Modifiers::default()
        } else if !descriptor.accepts_modifiers() {
            return Err(LabelError::arguments(
                descriptor.name(),
                "does not accept modifiers",
            )
            .at(span));
        } else {
            parse_modifiers(descriptor.name(), &modifiers, span)?
        };

        Ok(Node::Fragment(FragmentRef {
            name: name.to_string(),
            kind: descriptor.kind,
            args,
            params,
            modifiers,
        }))
    }

    fn peek(&self) -> Option<char> {
        self.input[self.idx..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.input[self.idx..].chars();
        chars.next();
        chars.next()
    }

    fn advance(&mut self) {
        let Some(c) = self.peek() else {
            return;
        };
        self.idx += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
    }

    fn position(&self) -> Position {
        Position {
            line: self.line,
            col: self.col,
            byte: self.idx,
        }
    }
}

/// Split on `delimiter` outside parentheses.
fn split_top_level(input: &str, delimiter: char) -> std::result::Result<Vec<&str>, String> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (index, c) in input.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| "unmatched ')'".to_string())?;
            }
            c if c == delimiter && depth == 0 => {
                parts.push(&input[start..index]);
                start = index + c.len_utf8();
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err("unclosed '('".to_string());
    }
    parts.push(&input[start..]);
    Ok(parts)
}

/// Recognise `{a|b}`. Missing ratios default to 1.
fn column_separator(head: &str, span: Span) -> Result<Option<Node>> {
    let Some((left, right)) = head.split_once('|') else {
        return Ok(None);
    };
    if head.contains('(') {
        return Ok(None);
    }
    let ratio = |raw: &str| -> Result<f64> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(1.0);
        }
        match raw.parse::<f64>() {
            Ok(value) if value.is_finite() && value > 0.0 => Ok(value),
            _ => Err(LabelError::column_spec(
                format!("column ratio must be a positive number, got '{raw}'"),
                span,
            )),
        }
    };
    if right.contains('|') {
        return Err(LabelError::column_spec(
            "column separator takes exactly two ratios",
            span,
        ));
    }
    Ok(Some(Node::ColumnSeparator {
        left: ratio(left)?,
        right: ratio(right)?,
    }))
}

/// Split `name(a, b, key=c)` into its name and arguments.
fn name_and_args(head: &str) -> std::result::Result<(&str, Vec<Arg>), String> {
    let Some(open) = head.find('(') else {
        return Ok((head.trim(), Vec::new()));
    };
    let name = head[..open].trim();
    if name.is_empty() {
        return Err("missing fragment name before '('".to_string());
    }
    let rest = &head[open + 1..];
    let close = rest
        .rfind(')')
        .ok_or_else(|| format!("unclosed '(' after '{name}'"))?;
    if !rest[close + 1..].trim().is_empty() {
        return Err(format!("unexpected text after arguments of '{name}'"));
    }
    let inner = &rest[..close];
    if inner.contains('(') || inner.contains(')') {
        return Err(format!("nested parentheses in arguments of '{name}'"));
    }
    Ok((name, split_args(inner, name)?))
}

fn split_args(inner: &str, name: &str) -> std::result::Result<Vec<Arg>, String> {
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    inner
        .split(',')
        .map(|raw| {
            let raw = raw.trim();
            if raw.is_empty() {
                return Err(format!("empty argument in '{name}'"));
            }
            match raw.split_once('=') {
                Some((key, value)) => {
                    let key = key.trim();
                    if key.is_empty() || !key.chars().all(|c| c.is_alphanumeric() || c == '_') {
                        return Err(format!("malformed keyword argument '{raw}' in '{name}'"));
                    }
                    Ok(Arg::keyed(key, value.trim()))
                }
                None => Ok(Arg::positional(raw)),
            }
        })
        .collect()
}

fn reject_modifiers(owner: &str, modifiers: &[&str], span: Span) -> Result<()> {
    if modifiers.is_empty() {
        Ok(())
    } else {
        Err(LabelError::arguments(owner, "does not accept modifiers").at(span))
    }
}

fn parse_modifiers(fragment: &str, chain: &[&str], span: Span) -> Result<Modifiers> {
    let mut modifiers = Modifiers::default();
    for raw in chain {
        let (name, args) = name_and_args(raw.trim()).map_err(|message| LabelError::syntax(message, span))?;
        let name = name.to_ascii_lowercase();
        match name.as_str() {
            "scale" => modifiers.transform = scale(fragment, modifiers.transform, &args, span)?,
            "offset" => modifiers.transform = offset(fragment, modifiers.transform, &args, span)?,
            attribute if ATTRIBUTE_MODIFIERS.contains(&attribute) => {
                let [Arg::Positional(value)] = args.as_slice() else {
                    return Err(LabelError::arguments(
                        fragment,
                        format!("{attribute} takes exactly one value"),
                    )
                    .at(span));
                };
                modifiers.attributes.insert(attribute.to_string(), value.clone());
            }
            other => {
                return Err(LabelError::syntax(format!("unknown modifier '{other}'"), span));
            }
        }
    }
    Ok(modifiers)
}

fn modifier_number(fragment: &str, modifier: &str, raw: &str, span: Span) -> Result<f64> {
    raw.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| {
            LabelError::arguments(fragment, format!("{modifier} expects numbers, got '{raw}'")).at(span)
        })
}

fn scale(fragment: &str, mut transform: LocalTransform, args: &[Arg], span: Span) -> Result<LocalTransform> {
    let mut factor = Vec2::ONE;
    for arg in args {
        match arg {
            Arg::Positional(raw) if args.len() == 1 => {
                let uniform = modifier_number(fragment, "scale", raw, span)?;
                factor = Vec2::new(uniform, uniform);
            }
            Arg::Keyed { key, value } if key == "x" => {
                factor.x = modifier_number(fragment, "scale", value, span)?;
            }
            Arg::Keyed { key, value } if key == "y" => {
                factor.y = modifier_number(fragment, "scale", value, span)?;
            }
            other => {
                return Err(LabelError::arguments(
                    fragment,
                    format!("scale takes one factor or x=/y= factors, got '{other}'"),
                )
                .at(span));
            }
        }
    }
    if factor.x <= 0.0 || factor.y <= 0.0 {
        return Err(LabelError::arguments(fragment, "scale factors must be positive").at(span));
    }
    transform.scale = Vec2::new(transform.scale.x * factor.x, transform.scale.y * factor.y);
    Ok(transform)
}

fn offset(fragment: &str, mut transform: LocalTransform, args: &[Arg], span: Span) -> Result<LocalTransform> {
    for arg in args {
        match arg {
            Arg::Keyed { key, value } if key == "x" => {
                transform.offset.x += modifier_number(fragment, "offset", value, span)?;
            }
            Arg::Keyed { key, value } if key == "y" => {
                transform.offset.y += modifier_number(fragment, "offset", value, span)?;
            }
            Arg::Keyed { key, value } if key == "z" => {
                transform.z_offset += modifier_number(fragment, "offset", value, span)?;
            }
            other => {
                return Err(LabelError::arguments(
                    fragment,
                    format!("offset takes x=, y= and z= distances, got '{other}'"),
                )
                .at(span));
            }
        }
    }
    Ok(transform)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gflabel_fragments::FragmentParams;

    fn parse_builtin(text: &str) -> Result<LabelAst> {
        parse(text, FragmentRegistry::builtin())
    }

    fn nodes(text: &str) -> Vec<Node> {
        parse_builtin(text)
            .unwrap()
            .nodes
            .into_iter()
            .map(|spanned| spanned.node)
            .collect()
    }

    fn text(value: &str) -> Node {
        Node::TextRun {
            text: value.to_string(),
        }
    }

    #[test]
    fn plain_text_is_one_run() {
        assert_eq!(nodes("M3 x 10"), vec![text("M3 x 10")]);
    }

    #[test]
    fn empty_label_has_no_nodes() {
        assert!(nodes("").is_empty());
    }

    #[test]
    fn brace_escapes_become_text() {
        assert_eq!(nodes("{{x}}"), vec![text("{x}")]);
    }

    #[test]
    fn literal_and_escaped_newlines() {
        assert_eq!(
            nodes("a\nb\\nc"),
            vec![text("a"), Node::Newline, text("b"), Node::Newline, text("c")]
        );
        assert_eq!(nodes("a\r\nb"), vec![text("a"), Node::Newline, text("b")]);
    }

    #[test]
    fn gap_directive() {
        assert_eq!(nodes("{4.2}"), vec![Node::Gap { width_mm: 4.2 }]);
    }

    #[test]
    fn negative_gap_is_rejected() {
        assert!(matches!(
            parse_builtin("{-3}"),
            Err(LabelError::InvalidArguments { .. })
        ));
    }

    #[test]
    fn separators_default_to_one() {
        assert_eq!(
            nodes("a{|}b{4|}c{|2.5}"),
            vec![
                text("a"),
                Node::ColumnSeparator {
                    left: 1.0,
                    right: 1.0
                },
                text("b"),
                Node::ColumnSeparator {
                    left: 4.0,
                    right: 1.0
                },
                text("c"),
                Node::ColumnSeparator {
                    left: 1.0,
                    right: 2.5
                },
            ]
        );
    }

    #[test]
    fn non_numeric_ratio_is_a_column_error() {
        let err = parse_builtin("a{x|1}b").unwrap_err();
        assert!(matches!(err, LabelError::InvalidColumnSpec { .. }));
        let err = parse_builtin("a{0|1}b").unwrap_err();
        assert!(matches!(err, LabelError::InvalidColumnSpec { .. }));
    }

    #[test]
    fn fragment_with_arguments() {
        let ast = parse_builtin("{bolt(12, countersunk)}").unwrap();
        let Node::Fragment(fragment) = &ast.nodes[0].node else {
            panic!("expected fragment");
        };
        assert_eq!(fragment.kind, FragmentKind::Bolt);
        assert_eq!(
            fragment.args,
            vec![Arg::positional("12"), Arg::positional("countersunk")]
        );
        assert!(matches!(fragment.params, FragmentParams::Bolt(_)));
    }

    #[test]
    fn prefix_names_resolve() {
        let ast = parse_builtin("{thread}").unwrap();
        let Node::Fragment(fragment) = &ast.nodes[0].node else {
            panic!("expected fragment");
        };
        assert_eq!(fragment.kind, FragmentKind::ThreadedInsert);
        assert_eq!(fragment.name, "thread");
    }

    #[test]
    fn align_at_label_and_column_start() {
        let parsed = nodes("{<}A{|}{>}B");
        assert_eq!(
            parsed[0],
            Node::Align {
                marker: AlignMarker::Left
            }
        );
        assert_eq!(
            parsed[3],
            Node::Align {
                marker: AlignMarker::Right
            }
        );
    }

    #[test]
    fn align_elsewhere_is_rejected() {
        for source in ["A{<}", "A\n{>}B", "{<}{<}A"] {
            let err = parse_builtin(source).unwrap_err();
            assert!(
                matches!(err, LabelError::InvalidColumnSpec { .. }),
                "{source:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn unbalanced_braces_are_syntax_errors() {
        for source in ["{bolt(3)", "a}", "{a{b}}", "{}", "{washer\n}"] {
            let err = parse_builtin(source).unwrap_err();
            assert!(matches!(err, LabelError::Syntax { .. }), "{source:?} gave {err:?}");
        }
    }

    #[test]
    fn malformed_arguments_are_syntax_errors() {
        for source in [
            "{bolt(3}",
            "{bolt(3,,4)}",
            "{box(3)x}",
            "{box((3))}",
            "{(3)}",
            "{|()}",
            "{<()}",
        ] {
            let err = parse_builtin(source).unwrap_err();
            assert!(matches!(err, LabelError::Syntax { .. }), "{source:?} gave {err:?}");
        }
    }

    #[test]
    fn unknown_fragment_carries_name_and_position() {
        let err = parse_builtin("ab\ncd{sprocket}").unwrap_err();
        let LabelError::UnknownFragment { name, span } = err else {
            panic!("expected unknown fragment, got {err:?}");
        };
        assert_eq!(name, "sprocket");
        assert_eq!(span.start.line, 2);
        assert_eq!(span.start.col, 3);
        assert_eq!(span.start.byte, 5);
    }

    #[test]
    fn ambiguous_prefix_is_reported() {
        let err = parse_builtin("{hex}").unwrap_err();
        assert!(matches!(err, LabelError::AmbiguousFragment { .. }));
        assert_eq!(err.span().start.col, 1);
    }

    #[test]
    fn modifiers_build_transform_and_attributes() {
        let ast = parse_builtin("{washer:scale(x=2):offset(y=0.5, z=0.2):color(red)}").unwrap();
        let Node::Fragment(fragment) = &ast.nodes[0].node else {
            panic!("expected fragment");
        };
        let transform = fragment.modifiers.transform;
        assert_eq!(transform.scale, Vec2::new(2.0, 1.0));
        assert_eq!(transform.offset, Vec2::new(0.0, 0.5));
        assert_eq!(transform.z_offset, 0.2);
        assert_eq!(fragment.modifiers.attributes.get("color").map(String::as_str), Some("red"));
    }

    #[test]
    fn uniform_scale() {
        let ast = parse_builtin("{circle:scale(0.5)}").unwrap();
        let Node::Fragment(fragment) = &ast.nodes[0].node else {
            panic!("expected fragment");
        };
        assert_eq!(fragment.modifiers.transform.scale, Vec2::new(0.5, 0.5));
    }

    #[test]
    fn unknown_modifier_is_a_syntax_error() {
        let err = parse_builtin("{circle:spin(90)}").unwrap_err();
        assert!(matches!(err, LabelError::Syntax { .. }));
    }

    #[test]
    fn modifiers_on_plain_spacing_are_rejected() {
        for source in ["{...:scale(2)}", "{3:scale(2)}", "A{|:color(red)}B"] {
            let err = parse_builtin(source).unwrap_err();
            assert!(
                matches!(err, LabelError::InvalidArguments { .. }),
                "{source:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn text_spans_cover_multibyte_characters() {
        let ast = parse_builtin("ø{washer}").unwrap();
        assert_eq!(ast.nodes[0].span.end.byte, 2);
        assert_eq!(ast.nodes[1].span.start.col, 2);
    }
}
