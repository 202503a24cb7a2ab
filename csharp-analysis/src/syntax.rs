//! Declaration and identifier scanning for C# source text.
//!
//! This is a line-and-segment scanner, not a parser: it recognizes namespace,
//! type and member declarations by token shape and tracks brace depth to give
//! each declaration a body span. Anything that needs real syntax or semantics
//! (overload resolution, type inference, flow analysis) is out of scope for
//! this crate and belongs to a full compiler front end.
//!
//! The scanner works on a "code mask" of the text: a same-length copy with
//! comment and string-literal contents blanked out, so brace tracking and
//! identifier matching never trip over literals.

use lsp_types::SymbolKind;

use crate::text::TextSpan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CsSymbolKind {
    Namespace,
    Class,
    Struct,
    Interface,
    Enum,
    Record,
    Method,
    Constructor,
    Property,
    Field,
    Event,
    EnumMember,
    Local,
}

impl CsSymbolKind {
    pub fn is_type(self) -> bool {
        matches!(
            self,
            Self::Class | Self::Struct | Self::Interface | Self::Enum | Self::Record
        )
    }

    pub fn lsp_symbol_kind(self) -> SymbolKind {
        match self {
            Self::Namespace => SymbolKind::NAMESPACE,
            Self::Class | Self::Record => SymbolKind::CLASS,
            Self::Struct => SymbolKind::STRUCT,
            Self::Interface => SymbolKind::INTERFACE,
            Self::Enum => SymbolKind::ENUM,
            Self::Method => SymbolKind::METHOD,
            Self::Constructor => SymbolKind::CONSTRUCTOR,
            Self::Property => SymbolKind::PROPERTY,
            Self::Field => SymbolKind::FIELD,
            Self::Event => SymbolKind::EVENT,
            Self::EnumMember => SymbolKind::ENUM_MEMBER,
            Self::Local => SymbolKind::VARIABLE,
        }
    }

    /// Roslyn-style completion tag for this kind of symbol.
    pub fn roslyn_tag(self) -> &'static str {
        match self {
            Self::Namespace => "Namespace",
            Self::Class | Self::Record => "Class",
            Self::Struct => "Structure",
            Self::Interface => "Interface",
            Self::Enum => "Enum",
            Self::Method | Self::Constructor => "Method",
            Self::Property => "Property",
            Self::Field => "Field",
            Self::Event => "Event",
            Self::EnumMember => "EnumMember",
            Self::Local => "Local",
        }
    }
}

/// One declaration found in a document, with nested members as children.
#[derive(Debug, Clone)]
pub struct Declaration {
    pub name: String,
    /// Namespace-qualified reflection-style name, e.g. `App.Greeter.Greet`.
    pub full_name: String,
    pub kind: CsSymbolKind,
    /// Whole declaration including its body.
    pub span: TextSpan,
    /// Just the declared identifier.
    pub selection_span: TextSpan,
    /// Enclosing type chain for members, enclosing namespace for types.
    pub container: Option<String>,
    /// The declaration header with whitespace collapsed, without body.
    pub signature: String,
    /// Base types and interfaces named after `:` on a type declaration.
    pub bases: Vec<String>,
    /// `///` documentation lines above the declaration, markers stripped.
    pub doc: Vec<String>,
    pub children: Vec<Declaration>,
}

impl Declaration {
    /// Parameter list text taken from the signature, or `None` for
    /// parameterless member kinds.
    pub fn parameters(&self) -> Option<&str> {
        let open = self.signature.find('(')?;
        let close = self.signature.rfind(')')?;
        if close <= open {
            return None;
        }
        Some(self.signature[open + 1..close].trim())
    }
}

const MODIFIERS: &[&str] = &[
    "public", "private", "protected", "internal", "static", "readonly", "const", "volatile",
    "sealed", "override", "virtual", "abstract", "extern", "unsafe", "partial", "required",
    "async", "new", "event", "ref", "file",
];

const TYPE_KEYWORDS: &[&str] = &["class", "struct", "interface", "enum", "record"];

/// Keywords that can never be a declared member name.
const RESERVED: &[&str] = &[
    "abstract", "as", "base", "bool", "break", "byte", "case", "catch", "char", "checked",
    "class", "const", "continue", "decimal", "default", "delegate", "do", "double", "else",
    "enum", "event", "explicit", "extern", "false", "finally", "fixed", "float", "for",
    "foreach", "get", "goto", "if", "implicit", "in", "int", "interface", "internal", "is",
    "lock", "long", "namespace", "new", "null", "object", "operator", "out", "override",
    "params", "private", "protected", "public", "readonly", "record", "ref", "return", "sbyte",
    "sealed", "set", "short", "sizeof", "stackalloc", "static", "string", "struct", "switch",
    "this", "throw", "true", "try", "typeof", "uint", "ulong", "unchecked", "unsafe", "ushort",
    "using", "virtual", "void", "volatile", "when", "where", "while", "yield",
];

pub fn is_reserved(word: &str) -> bool {
    RESERVED.contains(&word)
}

fn is_identifier_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_'
}

fn is_identifier_continue(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

/// Blank out comments, string literals and char literals, preserving byte
/// offsets (multi-byte characters are replaced by an equal number of spaces;
/// newlines survive).
pub fn code_mask(text: &str) -> String {
    #[derive(PartialEq)]
    enum State {
        Code,
        LineComment,
        BlockComment,
        Str { verbatim: bool },
        Char,
    }

    let mut out = String::with_capacity(text.len());
    let mut state = State::Code;
    let mut chars = text.char_indices().peekable();

    while let Some((_, ch)) = chars.next() {
        let next = chars.peek().map(|(_, c)| *c);
        match state {
            State::Code => match ch {
                '/' if next == Some('/') => {
                    state = State::LineComment;
                    out.push(' ');
                }
                '/' if next == Some('*') => {
                    state = State::BlockComment;
                    out.push(' ');
                }
                '"' => {
                    state = State::Str { verbatim: false };
                    out.push(' ');
                }
                '@' if next == Some('"') => {
                    chars.next();
                    state = State::Str { verbatim: true };
                    out.push_str("  ");
                }
                '$' if next == Some('"') => {
                    chars.next();
                    state = State::Str { verbatim: false };
                    out.push_str("  ");
                }
                '\'' => {
                    state = State::Char;
                    out.push(' ');
                }
                _ => out.push(ch),
            },
            State::LineComment => {
                if ch == '\n' {
                    state = State::Code;
                    out.push('\n');
                } else {
                    blank(&mut out, ch);
                }
            }
            State::BlockComment => {
                if ch == '*' && next == Some('/') {
                    chars.next();
                    state = State::Code;
                    out.push_str("  ");
                } else if ch == '\n' {
                    out.push('\n');
                } else {
                    blank(&mut out, ch);
                }
            }
            State::Str { verbatim } => {
                if verbatim {
                    if ch == '"' {
                        if next == Some('"') {
                            chars.next();
                            out.push_str("  ");
                        } else {
                            state = State::Code;
                            out.push(' ');
                        }
                    } else if ch == '\n' {
                        out.push('\n');
                    } else {
                        blank(&mut out, ch);
                    }
                } else if ch == '\\' {
                    if let Some((_, escaped)) = chars.next() {
                        out.push(' ');
                        blank(&mut out, escaped);
                    } else {
                        out.push(' ');
                    }
                } else if ch == '"' {
                    state = State::Code;
                    out.push(' ');
                } else if ch == '\n' {
                    // Unterminated literal; recover at the line break.
                    state = State::Code;
                    out.push('\n');
                } else {
                    blank(&mut out, ch);
                }
            }
            State::Char => {
                if ch == '\\' {
                    if let Some((_, escaped)) = chars.next() {
                        out.push(' ');
                        blank(&mut out, escaped);
                    } else {
                        out.push(' ');
                    }
                } else if ch == '\'' {
                    state = State::Code;
                    out.push(' ');
                } else if ch == '\n' {
                    state = State::Code;
                    out.push('\n');
                } else {
                    blank(&mut out, ch);
                }
            }
        }
    }
    out
}

fn blank(out: &mut String, ch: char) {
    for _ in 0..ch.len_utf8() {
        out.push(' ');
    }
}

#[derive(Debug, Clone)]
struct Token {
    text: String,
    span: TextSpan,
}

fn identifier_tokens(masked: &str, base: usize) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut iter = masked.char_indices().peekable();
    while let Some((idx, ch)) = iter.next() {
        if is_identifier_start(ch) || (ch == '@' && iter.peek().is_some_and(|(_, c)| is_identifier_start(*c))) {
            let start = idx;
            let mut end = idx + ch.len_utf8();
            while let Some((next_idx, next_ch)) = iter.peek().copied() {
                if is_identifier_continue(next_ch) {
                    end = next_idx + next_ch.len_utf8();
                    iter.next();
                } else {
                    break;
                }
            }
            let text = masked[start..end].trim_start_matches('@').to_string();
            tokens.push(Token {
                text,
                span: TextSpan::new(base + start, base + end),
            });
        }
    }
    tokens
}

/// Identifier under the cursor offset, if any. An offset sitting just after
/// the last character of a word still hits it.
pub fn identifier_at(text: &str, offset: usize) -> Option<(String, TextSpan)> {
    let offset = offset.min(text.len());
    let mut start = offset;
    while start > 0 {
        let prev = text[..start].chars().next_back()?;
        if is_identifier_continue(prev) || prev == '@' {
            start -= prev.len_utf8();
        } else {
            break;
        }
    }
    let mut end = offset;
    for ch in text[offset..].chars() {
        if is_identifier_continue(ch) {
            end += ch.len_utf8();
        } else {
            break;
        }
    }
    if start == end {
        return None;
    }
    let word = text[start..end].trim_start_matches('@');
    let first = word.chars().next()?;
    if !is_identifier_start(first) {
        return None;
    }
    Some((word.to_string(), TextSpan::new(start, end)))
}

/// All whole-word occurrences of `name` outside comments and literals.
pub fn identifier_occurrences(text: &str, name: &str) -> Vec<TextSpan> {
    if name.is_empty() {
        return Vec::new();
    }
    let masked = code_mask(text);
    let mut spans = Vec::new();
    let mut search_from = 0;
    while let Some(found) = masked[search_from..].find(name) {
        let start = search_from + found;
        let end = start + name.len();
        let before_ok = masked[..start]
            .chars()
            .next_back()
            .map_or(true, |ch| !is_identifier_continue(ch));
        let after_ok = masked[end..]
            .chars()
            .next()
            .map_or(true, |ch| !is_identifier_continue(ch));
        if before_ok && after_ok {
            spans.push(TextSpan::new(start, end));
        }
        search_from = start + name.len().max(1);
    }
    spans
}

struct Pending {
    decl: Declaration,
    /// Brace depth of the declaration body, set when its `{` is consumed.
    body_depth: Option<usize>,
    /// File-scoped namespaces have no braces and close at end of file.
    file_scoped: bool,
}

enum Terminator {
    Open,
    Semi,
    Comma,
    Close,
    Eof,
}

/// Scan a document into a declaration tree.
pub fn scan_declarations(text: &str) -> Vec<Declaration> {
    let masked = code_mask(text);
    let mut scanner = Scanner {
        text,
        masked: &masked,
        roots: Vec::new(),
        stack: Vec::new(),
        depth: 0,
    };
    scanner.run();
    scanner.roots
}

struct Scanner<'a> {
    text: &'a str,
    masked: &'a str,
    roots: Vec<Declaration>,
    stack: Vec<Pending>,
    depth: usize,
}

impl Scanner<'_> {
    fn run(&mut self) {
        let mut segment_start = 0usize;
        let bytes = self.masked.as_bytes();
        for idx in 0..bytes.len() {
            match bytes[idx] {
                b'{' => {
                    self.segment(segment_start, idx, Terminator::Open);
                    self.depth += 1;
                    if let Some(top) = self.stack.last_mut() {
                        if top.body_depth.is_none() && !top.file_scoped {
                            top.body_depth = Some(self.depth);
                        }
                    }
                    segment_start = idx + 1;
                }
                b'}' => {
                    self.segment(segment_start, idx, Terminator::Close);
                    if self
                        .stack
                        .last()
                        .is_some_and(|top| top.body_depth == Some(self.depth))
                    {
                        self.complete_top(idx + 1);
                    }
                    self.depth = self.depth.saturating_sub(1);
                    segment_start = idx + 1;
                }
                b';' => {
                    self.segment(segment_start, idx, Terminator::Semi);
                    segment_start = idx + 1;
                }
                b',' if self.in_enum_body() => {
                    self.segment(segment_start, idx, Terminator::Comma);
                    segment_start = idx + 1;
                }
                _ => {}
            }
        }
        self.segment(segment_start, self.masked.len(), Terminator::Eof);
        while !self.stack.is_empty() {
            self.complete_top(self.text.len());
        }
    }

    fn in_enum_body(&self) -> bool {
        self.stack
            .last()
            .is_some_and(|top| top.decl.kind == CsSymbolKind::Enum && top.body_depth.is_some())
    }

    fn complete_top(&mut self, end: usize) {
        let Some(mut finished) = self.stack.pop() else {
            return;
        };
        finished.decl.span.end = end.max(finished.decl.span.start);
        match self.stack.last_mut() {
            Some(parent) => parent.decl.children.push(finished.decl),
            None => self.roots.push(finished.decl),
        }
    }

    fn namespace_chain(&self) -> Vec<&str> {
        self.stack
            .iter()
            .filter(|p| p.decl.kind == CsSymbolKind::Namespace)
            .map(|p| p.decl.name.as_str())
            .collect()
    }

    fn type_chain(&self) -> Vec<&str> {
        self.stack
            .iter()
            .filter(|p| p.decl.kind.is_type())
            .map(|p| p.decl.name.as_str())
            .collect()
    }

    fn qualified(&self, name: &str) -> String {
        let mut parts: Vec<&str> = self.namespace_chain();
        parts.extend(self.type_chain());
        parts.push(name);
        parts.join(".")
    }

    fn segment(&mut self, start: usize, end: usize, terminator: Terminator) {
        if start >= end {
            return;
        }
        let masked_seg = &self.masked[start..end];
        let trim_offset = masked_seg.len() - masked_seg.trim_start().len();
        let mut seg_start = start + trim_offset;
        let mut masked_seg = masked_seg.trim_start();
        if masked_seg.trim().is_empty() {
            return;
        }
        // Preprocessor directives occupy whole lines and come through the
        // mask untouched; skip them and classify whatever follows.
        while masked_seg.starts_with('#') {
            let Some(newline) = masked_seg.find('\n') else {
                return;
            };
            let rest = &masked_seg[newline + 1..];
            let ws = rest.len() - rest.trim_start().len();
            seg_start += newline + 1 + ws;
            masked_seg = rest.trim_start();
            if masked_seg.trim().is_empty() {
                return;
            }
        }
        // Skip leading attribute lists so `[Fact] public void ...` still
        // classifies by its declaration tokens.
        let attr_skip = skip_attributes(masked_seg);
        let seg_start = seg_start + attr_skip;
        let masked_seg = &masked_seg[attr_skip..];
        if masked_seg.trim().is_empty() {
            return;
        }

        let tokens = identifier_tokens(masked_seg, seg_start);
        let Some(first) = tokens.first() else {
            return;
        };
        if matches!(first.text.as_str(), "using" | "extern" | "global") {
            return;
        }

        let context = self.stack.last().map(|p| p.decl.kind);
        let in_type_body = context.map_or(false, |kind| {
            kind.is_type() && kind != CsSymbolKind::Enum
        });
        let at_namespace_level = match context {
            None => true,
            Some(CsSymbolKind::Namespace) => true,
            _ => false,
        };

        if at_namespace_level && first.text == "namespace" {
            self.detect_namespace(seg_start, masked_seg, &tokens, terminator);
            return;
        }
        if at_namespace_level || in_type_body {
            if let Some(keyword_idx) = tokens
                .iter()
                .position(|t| TYPE_KEYWORDS.contains(&t.text.as_str()))
            {
                self.detect_type(seg_start, end, masked_seg, &tokens, keyword_idx, terminator);
                return;
            }
        }
        if context == Some(CsSymbolKind::Enum) {
            if self.in_enum_body() && matches!(terminator, Terminator::Comma | Terminator::Close) {
                self.detect_enum_member(end, &tokens);
            }
            return;
        }
        if in_type_body {
            self.detect_member(seg_start, end, masked_seg, &tokens, terminator);
        }
    }

    fn detect_namespace(
        &mut self,
        seg_start: usize,
        masked_seg: &str,
        tokens: &[Token],
        terminator: Terminator,
    ) {
        let parts: Vec<&Token> = tokens.iter().skip(1).collect();
        let (Some(first_part), Some(last_part)) = (parts.first(), parts.last()) else {
            return;
        };
        let name = parts
            .iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(".");
        let selection = TextSpan::new(first_part.span.start, last_part.span.end);
        let file_scoped = matches!(terminator, Terminator::Semi);
        let full_name = self.qualified(&name);
        let container = join_nonempty(self.namespace_chain());
        let decl = Declaration {
            name,
            full_name,
            kind: CsSymbolKind::Namespace,
            span: TextSpan::new(seg_start, seg_start + masked_seg.trim_end().len()),
            selection_span: selection,
            container,
            signature: self.signature_of(seg_start, seg_start + masked_seg.trim_end().len()),
            bases: Vec::new(),
            doc: doc_above(self.text, seg_start),
            children: Vec::new(),
        };
        match terminator {
            Terminator::Open | Terminator::Semi => self.stack.push(Pending {
                decl,
                body_depth: None,
                file_scoped,
            }),
            _ => {}
        }
    }

    fn detect_type(
        &mut self,
        seg_start: usize,
        seg_end: usize,
        masked_seg: &str,
        tokens: &[Token],
        keyword_idx: usize,
        terminator: Terminator,
    ) {
        let keyword = &tokens[keyword_idx].text;
        let mut name_idx = keyword_idx + 1;
        if keyword == "record"
            && tokens
                .get(name_idx)
                .is_some_and(|t| t.text == "class" || t.text == "struct")
        {
            name_idx += 1;
        }
        let Some(name_token) = tokens.get(name_idx) else {
            return;
        };
        if is_reserved(&name_token.text) {
            return;
        }
        let kind = match keyword.as_str() {
            "class" => CsSymbolKind::Class,
            "struct" => CsSymbolKind::Struct,
            "interface" => CsSymbolKind::Interface,
            "enum" => CsSymbolKind::Enum,
            _ => CsSymbolKind::Record,
        };
        let bases = base_list(masked_seg, seg_start, tokens, name_idx);
        let full_name = self.qualified(&name_token.text);
        let mut container = join_nonempty(self.type_chain());
        if container.is_none() {
            container = join_nonempty(self.namespace_chain());
        }
        let trimmed_end = seg_start + masked_seg.trim_end().len();
        let decl = Declaration {
            name: name_token.text.clone(),
            full_name,
            kind,
            span: TextSpan::new(seg_start, seg_end.min(self.text.len())),
            selection_span: name_token.span,
            container,
            signature: self.signature_of(seg_start, trimmed_end),
            bases,
            doc: doc_above(self.text, seg_start),
            children: Vec::new(),
        };
        match terminator {
            Terminator::Open => self.stack.push(Pending {
                decl,
                body_depth: None,
                file_scoped: false,
            }),
            // Positional records and empty declarations complete in place.
            _ => self.attach(decl),
        }
    }

    fn detect_enum_member(&mut self, seg_end: usize, tokens: &[Token]) {
        let Some(token) = tokens.iter().find(|t| !is_reserved(&t.text)) else {
            return;
        };
        let full_name = self.qualified(&token.text);
        let container = join_nonempty(self.type_chain());
        let decl = Declaration {
            name: token.text.clone(),
            full_name,
            kind: CsSymbolKind::EnumMember,
            span: TextSpan::new(token.span.start, seg_end.min(self.text.len())),
            selection_span: token.span,
            container,
            signature: self.signature_of(token.span.start, token.span.end),
            bases: Vec::new(),
            doc: doc_above(self.text, token.span.start),
            children: Vec::new(),
        };
        self.attach(decl);
    }

    fn detect_member(
        &mut self,
        seg_start: usize,
        seg_end: usize,
        masked_seg: &str,
        tokens: &[Token],
        terminator: Terminator,
    ) {
        let paren = masked_seg.find('(');
        let arrow = masked_seg.find("=>");
        let assign = find_assignment(masked_seg);

        let method_like = match (paren, arrow, assign) {
            (Some(p), Some(a), _) if a < p => false,
            (Some(p), _, Some(eq)) if eq < p => false,
            (Some(_), _, _) => true,
            _ => false,
        };
        // An `=` left of the `=>` means a lambda initializer, not an
        // expression body.
        let expr_bodied = match (arrow, assign) {
            (Some(a), Some(eq)) => a < eq,
            (Some(_), None) => true,
            _ => false,
        };

        if method_like {
            self.detect_method(seg_start, seg_end, masked_seg, tokens, terminator);
        } else if expr_bodied || matches!(terminator, Terminator::Open) && assign.is_none() {
            self.detect_property(seg_start, seg_end, masked_seg, tokens, terminator);
        } else if matches!(terminator, Terminator::Semi) || assign.is_some() {
            self.detect_field(seg_start, seg_end, masked_seg, tokens, terminator);
        }
    }

    fn detect_method(
        &mut self,
        seg_start: usize,
        seg_end: usize,
        masked_seg: &str,
        tokens: &[Token],
        terminator: Terminator,
    ) {
        let paren = match masked_seg.find('(') {
            Some(p) => p,
            None => return,
        };
        let Some(name_token) = name_before(masked_seg, seg_start, tokens, paren) else {
            return;
        };
        if is_reserved(&name_token.text) {
            return;
        }
        let containing_type = self.type_chain().last().map(|s| s.to_string());
        let name_pos = tokens
            .iter()
            .position(|t| t.span == name_token.span)
            .unwrap_or(0);
        let has_return_type = tokens[..name_pos]
            .iter()
            .any(|t| !MODIFIERS.contains(&t.text.as_str()));
        let is_ctor = containing_type.as_deref() == Some(name_token.text.as_str());
        if !has_return_type && !is_ctor {
            // A bare `Name(...)` with no leading type is a call, not a
            // declaration.
            return;
        }
        let kind = if is_ctor {
            CsSymbolKind::Constructor
        } else {
            CsSymbolKind::Method
        };
        let trimmed_end = seg_start + masked_seg.trim_end().len();
        let decl = Declaration {
            name: name_token.text.clone(),
            full_name: self.qualified(&name_token.text),
            kind,
            span: TextSpan::new(seg_start, seg_end.min(self.text.len())),
            selection_span: name_token.span,
            container: join_nonempty(self.type_chain()),
            signature: self.signature_of(seg_start, trimmed_end),
            bases: Vec::new(),
            doc: doc_above(self.text, seg_start),
            children: Vec::new(),
        };
        match terminator {
            Terminator::Open => self.stack.push(Pending {
                decl,
                body_depth: None,
                file_scoped: false,
            }),
            // Abstract/interface signatures and expression bodies end at `;`.
            _ => self.attach(decl),
        }
    }

    fn detect_property(
        &mut self,
        seg_start: usize,
        seg_end: usize,
        masked_seg: &str,
        tokens: &[Token],
        terminator: Terminator,
    ) {
        let boundary = masked_seg.find("=>").unwrap_or(masked_seg.len());
        let name_token = tokens
            .iter()
            .rev()
            .find(|t| t.span.end <= seg_start + boundary && !is_reserved(&t.text));
        let Some(name_token) = name_token else {
            return;
        };
        let name_pos = tokens
            .iter()
            .position(|t| t.span == name_token.span)
            .unwrap_or(0);
        if tokens[..name_pos]
            .iter()
            .all(|t| MODIFIERS.contains(&t.text.as_str()))
        {
            // No property type before the name; not a declaration.
            return;
        }
        let is_event = tokens.iter().any(|t| t.text == "event");
        let kind = if is_event {
            CsSymbolKind::Event
        } else {
            CsSymbolKind::Property
        };
        let trimmed_end = seg_start + masked_seg.trim_end().len();
        let decl = Declaration {
            name: name_token.text.clone(),
            full_name: self.qualified(&name_token.text),
            kind,
            span: TextSpan::new(seg_start, seg_end.min(self.text.len())),
            selection_span: name_token.span,
            container: join_nonempty(self.type_chain()),
            signature: self.signature_of(seg_start, trimmed_end),
            bases: Vec::new(),
            doc: doc_above(self.text, seg_start),
            children: Vec::new(),
        };
        match terminator {
            Terminator::Open => self.stack.push(Pending {
                decl,
                body_depth: None,
                file_scoped: false,
            }),
            _ => self.attach(decl),
        }
    }

    fn detect_field(
        &mut self,
        seg_start: usize,
        seg_end: usize,
        masked_seg: &str,
        tokens: &[Token],
        _terminator: Terminator,
    ) {
        let is_event = tokens.iter().any(|t| t.text == "event");
        let declarators = declarator_names(masked_seg, seg_start, tokens);
        let trimmed_end = seg_start + masked_seg.trim_end().len();
        for name_token in declarators {
            let decl = Declaration {
                name: name_token.text.clone(),
                full_name: self.qualified(&name_token.text),
                kind: if is_event {
                    CsSymbolKind::Event
                } else {
                    CsSymbolKind::Field
                },
                span: TextSpan::new(seg_start, seg_end.min(self.text.len())),
                selection_span: name_token.span,
                container: join_nonempty(self.type_chain()),
                signature: self.signature_of(seg_start, trimmed_end),
                bases: Vec::new(),
                doc: doc_above(self.text, seg_start),
                children: Vec::new(),
            };
            self.attach(decl);
        }
    }

    fn attach(&mut self, decl: Declaration) {
        match self.stack.last_mut() {
            Some(parent) => parent.decl.children.push(decl),
            None => self.roots.push(decl),
        }
    }

    fn signature_of(&self, start: usize, end: usize) -> String {
        collapse_whitespace(&self.text[start..end.min(self.text.len())])
    }
}

/// Byte length of the leading `[...]` attribute lists in a masked segment.
fn skip_attributes(masked_seg: &str) -> usize {
    let mut offset = 0;
    loop {
        let rest = &masked_seg[offset..];
        let leading_ws = rest.len() - rest.trim_start().len();
        let rest = rest.trim_start();
        if !rest.starts_with('[') {
            return offset;
        }
        let mut balance = 0i32;
        let mut consumed = None;
        for (idx, ch) in rest.char_indices() {
            match ch {
                '[' => balance += 1,
                ']' => {
                    balance -= 1;
                    if balance == 0 {
                        consumed = Some(idx + 1);
                        break;
                    }
                }
                _ => {}
            }
        }
        match consumed {
            Some(len) => offset += leading_ws + len,
            None => return offset,
        }
    }
}

/// Position of a top-level `=` that is assignment, not `==`, `!=`, `<=`,
/// `>=` or `=>`.
fn find_assignment(masked_seg: &str) -> Option<usize> {
    let bytes = masked_seg.as_bytes();
    for (idx, &byte) in bytes.iter().enumerate() {
        if byte != b'=' {
            continue;
        }
        let prev = idx.checked_sub(1).map(|i| bytes[i]);
        let next = bytes.get(idx + 1).copied();
        if matches!(prev, Some(b'=') | Some(b'!') | Some(b'<') | Some(b'>')) {
            continue;
        }
        if matches!(next, Some(b'=') | Some(b'>')) {
            continue;
        }
        return Some(idx);
    }
    None
}

fn name_before<'t>(
    masked_seg: &str,
    seg_start: usize,
    tokens: &'t [Token],
    paren: usize,
) -> Option<&'t Token> {
    let mut end = paren;
    let bytes = masked_seg.as_bytes();
    while end > 0 && bytes[end - 1].is_ascii_whitespace() {
        end -= 1;
    }
    // Skip a generic argument list between the name and its parameter list.
    if end > 0 && bytes[end - 1] == b'>' {
        let mut balance = 0i32;
        while end > 0 {
            match bytes[end - 1] {
                b'>' => balance += 1,
                b'<' => {
                    balance -= 1;
                    if balance == 0 {
                        end -= 1;
                        break;
                    }
                }
                _ => {}
            }
            end -= 1;
        }
        while end > 0 && bytes[end - 1].is_ascii_whitespace() {
            end -= 1;
        }
    }
    let absolute = seg_start + end;
    let token = tokens.iter().find(|t| t.span.end == absolute)?;
    // `obj.Method(...)` is an invocation, not a declaration.
    let before = token.span.start.checked_sub(seg_start)?;
    if masked_seg[..before].trim_end().ends_with('.') {
        return None;
    }
    Some(token)
}

fn base_list(masked_seg: &str, seg_start: usize, tokens: &[Token], name_idx: usize) -> Vec<String> {
    let Some(colon) = masked_seg.find(':') else {
        return Vec::new();
    };
    let colon_abs = seg_start + colon;
    tokens
        .iter()
        .skip(name_idx + 1)
        .skip_while(|t| t.span.start < colon_abs)
        .take_while(|t| t.text != "where")
        .map(|t| t.text.clone())
        .filter(|t| !is_reserved(t))
        .collect()
}

/// Declared names of a field segment. `int x, y = 1;` declares `x` and `y`:
/// the first comma group contributes its last identifier (the one after the
/// type), later groups their first, and nothing right of the initializer
/// counts.
fn declarator_names<'t>(masked_seg: &str, seg_start: usize, tokens: &'t [Token]) -> Vec<&'t Token> {
    let cutoff = find_assignment(masked_seg).map(|rel| seg_start + rel);
    let mut boundaries: Vec<usize> = masked_seg
        .char_indices()
        .filter(|(_, ch)| *ch == ',')
        .map(|(idx, _)| seg_start + idx)
        .filter(|abs| cutoff.map_or(true, |cut| *abs < cut))
        .collect();
    boundaries.push(usize::MAX);

    let mut groups: Vec<Vec<&Token>> = vec![Vec::new(); boundaries.len()];
    for token in tokens {
        if is_reserved(&token.text) || MODIFIERS.contains(&token.text.as_str()) {
            continue;
        }
        if cutoff.is_some_and(|cut| token.span.end > cut) {
            continue;
        }
        if let Some(slot) = boundaries.iter().position(|b| token.span.end <= *b) {
            groups[slot].push(token);
        }
    }

    let mut names = Vec::new();
    for (idx, group) in groups.iter().filter(|g| !g.is_empty()).enumerate() {
        let pick = if idx == 0 {
            group.last()
        } else {
            group.first()
        };
        if let Some(token) = pick {
            names.push(*token);
        }
    }
    names
}

fn join_nonempty(parts: Vec<&str>) -> Option<String> {
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("."))
    }
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_was_space = false;
    for ch in text.trim().chars() {
        if ch.is_whitespace() {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(ch);
            last_was_space = false;
        }
    }
    out
}

/// `///` documentation block immediately above `offset`, skipping attribute
/// lines, with comment markers stripped.
fn doc_above(text: &str, offset: usize) -> Vec<String> {
    let head = &text[..offset.min(text.len())];
    let mut lines: Vec<&str> = head.lines().collect();
    // Drop the partial line the declaration itself starts on.
    if !head.ends_with('\n') {
        lines.pop();
    }
    let mut doc = Vec::new();
    for line in lines.iter().rev() {
        let trimmed = line.trim();
        if trimmed.starts_with("///") {
            doc.push(trimmed.trim_start_matches("///").trim().to_string());
        } else if doc.is_empty() && (trimmed.is_empty() || trimmed.starts_with('[')) {
            // Attributes and blank lines may sit between docs and the
            // declaration.
            continue;
        } else {
            break;
        }
    }
    doc.reverse();
    doc
}

/// Depth-first flattening of a declaration tree.
pub fn flatten(declarations: &[Declaration]) -> Vec<&Declaration> {
    let mut out = Vec::new();
    fn walk<'a>(decls: &'a [Declaration], out: &mut Vec<&'a Declaration>) {
        for decl in decls {
            out.push(decl);
            walk(&decl.children, out);
        }
    }
    walk(declarations, &mut out);
    out
}

/// Innermost declaration whose identifier or body covers `offset`.
pub fn declaration_at<'a>(declarations: &'a [Declaration], offset: usize) -> Option<&'a Declaration> {
    let mut best: Option<&Declaration> = None;
    for decl in flatten(declarations) {
        if decl.selection_span.touches(offset) {
            return Some(decl);
        }
        if decl.span.touches(offset) {
            let narrower = best.map_or(true, |current| decl.span.len() < current.span.len());
            if narrower {
                best = Some(decl);
            }
        }
    }
    best
}

/// All declarations in the tree with the given name.
pub fn find_by_name<'a>(declarations: &'a [Declaration], name: &str) -> Vec<&'a Declaration> {
    flatten(declarations)
        .into_iter()
        .filter(|decl| decl.name == name)
        .collect()
}
