//! Parsing of `.proto` source into the tree model.
//!
//! Hand-rolled tokenizer plus recursive descent over the proto subset the
//! filtering engine needs: syntax/package/import/option headers, services
//! with unary and streaming RPCs, messages with normal, map and oneof
//! fields, nested messages and enums, reserved statements. Comments are
//! attached to the following declaration with their 1-based source lines.

use std::path::{Path, PathBuf};

use crate::ast::{
    Comment, CommentLine, EnumDef, EnumValue, Field, FieldLabel, Import, Item, Member, Message,
    OneOf, Package, ProtoFile, ProtoOption, Reserved, Rpc, Service, ServiceItem, Syntax,
};
use crate::error::ParseError;
use crate::graph::{Definition, DefinitionKind};

/// Recursively walks `input_dir` and returns the sorted relative paths of
/// all `*.proto` files.
pub fn discover_proto_files(input_dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    walk(input_dir, input_dir, &mut files)?;
    files.sort();
    Ok(files)
}

fn walk(root: &Path, dir: &Path, files: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            walk(root, &path, files)?;
        } else if path.extension().map(|e| e == "proto").unwrap_or(false) {
            if let Ok(rel) = path.strip_prefix(root) {
                files.push(rel.to_path_buf());
            }
        }
    }
    Ok(())
}

/// Parses a single `.proto` file.
pub fn parse_file(path: &Path) -> Result<ProtoFile, ParseError> {
    if !path.exists() {
        return Err(ParseError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let source = std::fs::read_to_string(path).map_err(|source| ParseError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_source(&source, path)
}

/// Parses proto source text. `file` is used for error reporting only.
pub fn parse_source(source: &str, file: &Path) -> Result<ProtoFile, ParseError> {
    let tokens = lex(source, file)?;
    Parser {
        tokens,
        pos: 0,
        file,
    }
    .parse_file()
}

/// Extracts top-level definitions with their package-qualified, scalar-free
/// type references, for dependency graph construction.
pub fn extract_definitions(tree: &ProtoFile, rel: &Path) -> Vec<Definition> {
    let pkg = tree.package();
    let mut defs = Vec::new();

    for item in &tree.items {
        match item {
            Item::Service(service) => {
                let mut references = Vec::new();
                for rpc in service.rpcs() {
                    push_ref(&mut references, pkg, &rpc.request);
                    push_ref(&mut references, pkg, &rpc.response);
                }
                defs.push(Definition {
                    fqn: crate::ast::qualified_name(pkg, &service.name),
                    kind: DefinitionKind::Service,
                    file: rel.to_path_buf(),
                    references,
                });
            }
            Item::Message(message) => {
                let mut references = Vec::new();
                collect_message_refs(message, pkg, &mut references);
                defs.push(Definition {
                    fqn: crate::ast::qualified_name(pkg, &message.name),
                    kind: DefinitionKind::Message,
                    file: rel.to_path_buf(),
                    references,
                });
            }
            Item::Enum(e) => {
                defs.push(Definition {
                    fqn: crate::ast::qualified_name(pkg, &e.name),
                    kind: DefinitionKind::Enum,
                    file: rel.to_path_buf(),
                    references: Vec::new(),
                });
            }
            _ => {}
        }
    }

    defs
}

fn collect_message_refs(message: &Message, pkg: &str, out: &mut Vec<String>) {
    for member in &message.members {
        match member {
            Member::Field(field) => {
                if crate::ast::is_user_type(&field.type_name) {
                    push_ref(out, pkg, &field.type_name);
                }
            }
            Member::OneOf(oneof) => {
                for field in &oneof.fields {
                    if crate::ast::is_user_type(&field.type_name) {
                        push_ref(out, pkg, &field.type_name);
                    }
                }
            }
            Member::Message(nested) => collect_message_refs(nested, pkg, out),
            _ => {}
        }
    }
}

fn push_ref(out: &mut Vec<String>, pkg: &str, type_name: &str) {
    if type_name.is_empty() {
        return;
    }
    out.push(crate::ast::qualified_name(pkg, type_name));
}

// --- Tokenizer ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokKind {
    Ident,
    Number,
    Str,
    Symbol,
    LineComment,
    BlockComment,
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokKind,
    text: String,
    line: usize,
}

fn lex(source: &str, file: &Path) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = source.chars().collect();
    let mut i = 0;
    let mut line = 1;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\n' => {
                line += 1;
                i += 1;
            }
            ' ' | '\t' | '\r' => i += 1,
            '/' if chars.get(i + 1) == Some(&'/') => {
                let start = i + 2;
                let mut end = start;
                while end < chars.len() && chars[end] != '\n' {
                    end += 1;
                }
                let text: String = chars[start..end].iter().collect();
                tokens.push(Token {
                    kind: TokKind::LineComment,
                    text: text.trim_end_matches('\r').to_string(),
                    line,
                });
                i = end;
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                let start_line = line;
                let mut end = i + 2;
                loop {
                    if end + 1 >= chars.len() {
                        return Err(syntax_err(file, start_line, "unterminated block comment"));
                    }
                    if chars[end] == '*' && chars[end + 1] == '/' {
                        break;
                    }
                    if chars[end] == '\n' {
                        line += 1;
                    }
                    end += 1;
                }
                let text: String = chars[i + 2..end].iter().collect();
                tokens.push(Token {
                    kind: TokKind::BlockComment,
                    text,
                    line: start_line,
                });
                i = end + 2;
            }
            '"' | '\'' => {
                let quote = c;
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && chars[end] != quote && chars[end] != '\n' {
                    end += 1;
                }
                if end >= chars.len() || chars[end] != quote {
                    return Err(syntax_err(file, line, "unterminated string literal"));
                }
                tokens.push(Token {
                    kind: TokKind::Str,
                    text: chars[start..end].iter().collect(),
                    line,
                });
                i = end + 1;
            }
            _ if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_alphanumeric() || chars[i] == '_' || chars[i] == '.')
                {
                    i += 1;
                }
                tokens.push(Token {
                    kind: TokKind::Ident,
                    text: chars[start..i].iter().collect(),
                    line,
                });
            }
            _ if c.is_ascii_digit() || c == '-' || c == '+' => {
                let start = i;
                i += 1;
                while i < chars.len()
                    && (chars[i].is_ascii_alphanumeric() || matches!(chars[i], '.' | '_' | '+' | '-'))
                {
                    i += 1;
                }
                tokens.push(Token {
                    kind: TokKind::Number,
                    text: chars[start..i].iter().collect(),
                    line,
                });
            }
            '{' | '}' | '(' | ')' | '=' | ';' | ',' | '<' | '>' | '[' | ']' => {
                tokens.push(Token {
                    kind: TokKind::Symbol,
                    text: c.to_string(),
                    line,
                });
                i += 1;
            }
            _ => {
                return Err(syntax_err(
                    file,
                    line,
                    &format!("unexpected character '{c}'"),
                ));
            }
        }
    }

    Ok(tokens)
}

fn syntax_err(file: &Path, line: usize, message: &str) -> ParseError {
    ParseError::Syntax {
        file: file.to_path_buf(),
        line,
        message: message.to_string(),
    }
}

// --- Recursive descent ---

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    file: &'a Path,
}

impl Parser<'_> {
    fn parse_file(mut self) -> Result<ProtoFile, ParseError> {
        let mut items = Vec::new();

        loop {
            let comment = self.take_comment();
            let Some(tok) = self.peek() else {
                break;
            };
            match (tok.kind, tok.text.as_str()) {
                (TokKind::Ident, "syntax") => {
                    self.bump();
                    self.expect_symbol("=")?;
                    let value = self.expect_str()?;
                    self.expect_symbol(";")?;
                    items.push(Item::Syntax(Syntax { value, comment }));
                }
                (TokKind::Ident, "package") => {
                    self.bump();
                    let name = self.expect_ident()?;
                    self.expect_symbol(";")?;
                    items.push(Item::Package(Package { name, comment }));
                }
                (TokKind::Ident, "import") => {
                    self.bump();
                    let mut public = false;
                    if self.peek_ident_is("public") {
                        self.bump();
                        public = true;
                    } else if self.peek_ident_is("weak") {
                        self.bump();
                    }
                    let path = self.expect_str()?;
                    self.expect_symbol(";")?;
                    items.push(Item::Import(Import {
                        path,
                        public,
                        comment,
                    }));
                }
                (TokKind::Ident, "option") => {
                    items.push(Item::Option(self.parse_option(comment)?));
                }
                (TokKind::Ident, "service") => {
                    items.push(Item::Service(self.parse_service(comment)?));
                }
                (TokKind::Ident, "message") => {
                    items.push(Item::Message(self.parse_message(comment)?));
                }
                (TokKind::Ident, "enum") => {
                    items.push(Item::Enum(self.parse_enum(comment)?));
                }
                (TokKind::Symbol, ";") => {
                    self.bump();
                }
                _ => {
                    return Err(self.unexpected(tok.line, &tok.text));
                }
            }
        }

        Ok(ProtoFile { items })
    }

    fn parse_option(&mut self, comment: Option<Comment>) -> Result<ProtoOption, ParseError> {
        self.bump(); // option
        let mut name = String::new();
        loop {
            let tok = self.bump_some("option name")?;
            match (tok.kind, tok.text.as_str()) {
                (TokKind::Symbol, "=") => break,
                (TokKind::Ident, _) | (TokKind::Symbol, "(") | (TokKind::Symbol, ")") => {
                    name.push_str(&tok.text);
                }
                _ => return Err(self.unexpected(tok.line, &tok.text)),
            }
        }
        let value_tok = self.bump_some("option value")?;
        let value = match value_tok.kind {
            TokKind::Str => format!("\"{}\"", value_tok.text),
            TokKind::Ident | TokKind::Number => value_tok.text,
            _ => return Err(self.unexpected(value_tok.line, &value_tok.text)),
        };
        self.expect_symbol(";")?;
        Ok(ProtoOption {
            name,
            value,
            comment,
        })
    }

    fn parse_service(&mut self, comment: Option<Comment>) -> Result<Service, ParseError> {
        self.bump(); // service
        let name = self.expect_ident()?;
        self.expect_symbol("{")?;
        let mut svc_items = Vec::new();

        loop {
            let item_comment = self.take_comment();
            let tok = self.peek_some("service body")?;
            match (tok.kind, tok.text.as_str()) {
                (TokKind::Symbol, "}") => {
                    self.bump();
                    break;
                }
                (TokKind::Symbol, ";") => {
                    self.bump();
                }
                (TokKind::Ident, "rpc") => {
                    svc_items.push(ServiceItem::Rpc(self.parse_rpc(item_comment)?));
                }
                (TokKind::Ident, "option") => {
                    svc_items.push(ServiceItem::Option(self.parse_option(item_comment)?));
                }
                _ => return Err(self.unexpected(tok.line, &tok.text)),
            }
        }

        Ok(Service {
            name,
            comment,
            items: svc_items,
        })
    }

    fn parse_rpc(&mut self, comment: Option<Comment>) -> Result<Rpc, ParseError> {
        self.bump(); // rpc
        let name = self.expect_ident()?;
        self.expect_symbol("(")?;
        let mut client_streaming = false;
        if self.peek_ident_is("stream") {
            self.bump();
            client_streaming = true;
        }
        let request = self.expect_ident()?;
        self.expect_symbol(")")?;
        let returns = self.expect_ident()?;
        if returns != "returns" {
            let line = self.prev_line();
            return Err(syntax_err(
                self.file,
                line,
                &format!("expected \"returns\", found \"{returns}\""),
            ));
        }
        self.expect_symbol("(")?;
        let mut server_streaming = false;
        if self.peek_ident_is("stream") {
            self.bump();
            server_streaming = true;
        }
        let response = self.expect_ident()?;
        self.expect_symbol(")")?;

        let mut options = Vec::new();
        let tok = self.bump_some("rpc terminator")?;
        match (tok.kind, tok.text.as_str()) {
            (TokKind::Symbol, ";") => {}
            (TokKind::Symbol, "{") => loop {
                self.take_comment();
                let tok = self.peek_some("rpc body")?;
                match (tok.kind, tok.text.as_str()) {
                    (TokKind::Symbol, "}") => {
                        self.bump();
                        break;
                    }
                    (TokKind::Symbol, ";") => {
                        self.bump();
                    }
                    (TokKind::Ident, "option") => {
                        options.push(self.parse_option(None)?);
                    }
                    _ => return Err(self.unexpected(tok.line, &tok.text)),
                }
            },
            _ => return Err(self.unexpected(tok.line, &tok.text)),
        }

        Ok(Rpc {
            name,
            request,
            response,
            client_streaming,
            server_streaming,
            comment,
            options,
        })
    }

    fn parse_message(&mut self, comment: Option<Comment>) -> Result<Message, ParseError> {
        self.bump(); // message
        let name = self.expect_ident()?;
        self.expect_symbol("{")?;
        let mut members = Vec::new();

        loop {
            let member_comment = self.take_comment();
            let tok = self.peek_some("message body")?;
            match (tok.kind, tok.text.as_str()) {
                (TokKind::Symbol, "}") => {
                    self.bump();
                    break;
                }
                (TokKind::Symbol, ";") => {
                    self.bump();
                }
                (TokKind::Ident, "message") => {
                    members.push(Member::Message(self.parse_message(member_comment)?));
                }
                (TokKind::Ident, "enum") => {
                    members.push(Member::Enum(self.parse_enum(member_comment)?));
                }
                (TokKind::Ident, "oneof") => {
                    members.push(Member::OneOf(self.parse_oneof(member_comment)?));
                }
                (TokKind::Ident, "option") => {
                    members.push(Member::Option(self.parse_option(member_comment)?));
                }
                (TokKind::Ident, "reserved") => {
                    self.bump();
                    let ranges = self.raw_until_semicolon()?;
                    members.push(Member::Reserved(Reserved {
                        ranges,
                        comment: member_comment,
                    }));
                }
                (TokKind::Ident, "map") => {
                    self.bump();
                    self.expect_symbol("<")?;
                    let key = self.expect_ident()?;
                    self.expect_symbol(",")?;
                    let value = self.expect_ident()?;
                    self.expect_symbol(">")?;
                    let field =
                        self.parse_field_tail(value, FieldLabel::None, Some(key), member_comment)?;
                    members.push(Member::Field(field));
                }
                (TokKind::Ident, "repeated") => {
                    self.bump();
                    let type_name = self.expect_ident()?;
                    let field =
                        self.parse_field_tail(type_name, FieldLabel::Repeated, None, member_comment)?;
                    members.push(Member::Field(field));
                }
                (TokKind::Ident, "optional") => {
                    self.bump();
                    let type_name = self.expect_ident()?;
                    let field =
                        self.parse_field_tail(type_name, FieldLabel::Optional, None, member_comment)?;
                    members.push(Member::Field(field));
                }
                (TokKind::Ident, _) => {
                    let type_name = self.expect_ident()?;
                    let field =
                        self.parse_field_tail(type_name, FieldLabel::None, None, member_comment)?;
                    members.push(Member::Field(field));
                }
                _ => return Err(self.unexpected(tok.line, &tok.text)),
            }
        }

        Ok(Message {
            name,
            comment,
            members,
        })
    }

    /// Parses `name = number [options];` after the type has been consumed.
    fn parse_field_tail(
        &mut self,
        type_name: String,
        label: FieldLabel,
        map_key: Option<String>,
        comment: Option<Comment>,
    ) -> Result<Field, ParseError> {
        let name = self.expect_ident()?;
        self.expect_symbol("=")?;
        let (number_text, number_line) = self.expect_number()?;
        let number: u32 = number_text
            .parse()
            .map_err(|_| syntax_err(self.file, number_line, "invalid field number"))?;

        let mut options = None;
        if self.peek_symbol_is("[") {
            self.bump();
            options = Some(self.raw_until_bracket_close()?);
        }
        let semi_line = self.expect_symbol(";")?;
        let inline = self.take_inline(semi_line);

        Ok(Field {
            name,
            type_name,
            number,
            label,
            map_key,
            options,
            comment,
            inline,
        })
    }

    fn parse_oneof(&mut self, comment: Option<Comment>) -> Result<OneOf, ParseError> {
        self.bump(); // oneof
        let name = self.expect_ident()?;
        self.expect_symbol("{")?;
        let mut fields = Vec::new();

        loop {
            let field_comment = self.take_comment();
            let tok = self.peek_some("oneof body")?;
            match (tok.kind, tok.text.as_str()) {
                (TokKind::Symbol, "}") => {
                    self.bump();
                    break;
                }
                (TokKind::Symbol, ";") => {
                    self.bump();
                }
                (TokKind::Ident, _) => {
                    let type_name = self.expect_ident()?;
                    fields.push(self.parse_field_tail(
                        type_name,
                        FieldLabel::None,
                        None,
                        field_comment,
                    )?);
                }
                _ => return Err(self.unexpected(tok.line, &tok.text)),
            }
        }

        Ok(OneOf {
            name,
            comment,
            fields,
        })
    }

    fn parse_enum(&mut self, comment: Option<Comment>) -> Result<EnumDef, ParseError> {
        self.bump(); // enum
        let name = self.expect_ident()?;
        self.expect_symbol("{")?;
        let mut options = Vec::new();
        let mut values = Vec::new();

        loop {
            let value_comment = self.take_comment();
            let tok = self.peek_some("enum body")?;
            match (tok.kind, tok.text.as_str()) {
                (TokKind::Symbol, "}") => {
                    self.bump();
                    break;
                }
                (TokKind::Symbol, ";") => {
                    self.bump();
                }
                (TokKind::Ident, "option") => {
                    options.push(self.parse_option(value_comment)?);
                }
                (TokKind::Ident, _) => {
                    let value_name = self.expect_ident()?;
                    self.expect_symbol("=")?;
                    let (number_text, number_line) = self.expect_number()?;
                    let number: i32 = number_text
                        .parse()
                        .map_err(|_| syntax_err(self.file, number_line, "invalid enum value"))?;
                    let mut value_options = None;
                    if self.peek_symbol_is("[") {
                        self.bump();
                        value_options = Some(self.raw_until_bracket_close()?);
                    }
                    let semi_line = self.expect_symbol(";")?;
                    let inline = self.take_inline(semi_line);
                    values.push(EnumValue {
                        name: value_name,
                        number,
                        options: value_options,
                        comment: value_comment,
                        inline,
                    });
                }
                _ => return Err(self.unexpected(tok.line, &tok.text)),
            }
        }

        Ok(EnumDef {
            name,
            comment,
            options,
            values,
        })
    }

    // --- Token helpers ---

    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).cloned()
    }

    fn peek_some(&self, context: &str) -> Result<Token, ParseError> {
        self.peek()
            .ok_or_else(|| syntax_err(self.file, self.prev_line(), &format!("unexpected end of file in {context}")))
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    fn bump_some(&mut self, context: &str) -> Result<Token, ParseError> {
        let tok = self.peek_some(context)?;
        self.bump();
        Ok(tok)
    }

    fn prev_line(&self) -> usize {
        self.tokens
            .get(self.pos.saturating_sub(1))
            .map(|t| t.line)
            .unwrap_or(1)
    }

    fn peek_ident_is(&self, text: &str) -> bool {
        self.peek()
            .map(|t| t.kind == TokKind::Ident && t.text == text)
            .unwrap_or(false)
    }

    fn peek_symbol_is(&self, text: &str) -> bool {
        self.peek()
            .map(|t| t.kind == TokKind::Symbol && t.text == text)
            .unwrap_or(false)
    }

    fn expect_ident(&mut self) -> Result<String, ParseError> {
        let tok = self.bump_some("identifier")?;
        if tok.kind != TokKind::Ident {
            return Err(self.unexpected(tok.line, &tok.text));
        }
        Ok(tok.text)
    }

    fn expect_number(&mut self) -> Result<(String, usize), ParseError> {
        let tok = self.bump_some("number")?;
        if tok.kind != TokKind::Number {
            return Err(self.unexpected(tok.line, &tok.text));
        }
        Ok((tok.text, tok.line))
    }

    fn expect_str(&mut self) -> Result<String, ParseError> {
        let tok = self.bump_some("string literal")?;
        if tok.kind != TokKind::Str {
            return Err(self.unexpected(tok.line, &tok.text));
        }
        Ok(tok.text)
    }

    fn expect_symbol(&mut self, text: &str) -> Result<usize, ParseError> {
        let tok = self.bump_some(text)?;
        if tok.kind != TokKind::Symbol || tok.text != text {
            return Err(syntax_err(
                self.file,
                tok.line,
                &format!("expected \"{text}\", found \"{}\"", tok.text),
            ));
        }
        Ok(tok.line)
    }

    fn unexpected(&self, line: usize, text: &str) -> ParseError {
        syntax_err(self.file, line, &format!("unexpected \"{text}\""))
    }

    /// Consumes a run of comment tokens preceding a declaration.
    fn take_comment(&mut self) -> Option<Comment> {
        let mut lines: Vec<CommentLine> = Vec::new();
        let mut block = false;

        while let Some(tok) = self.peek() {
            match tok.kind {
                TokKind::LineComment => {
                    lines.push(CommentLine {
                        text: tok.text,
                        line: tok.line,
                    });
                    self.bump();
                }
                TokKind::BlockComment => {
                    block = true;
                    for (i, text) in tok.text.split('\n').enumerate() {
                        lines.push(CommentLine {
                            text: text.trim_end_matches('\r').to_string(),
                            line: tok.line + i,
                        });
                    }
                    self.bump();
                }
                _ => break,
            }
        }

        if lines.is_empty() {
            None
        } else {
            Some(Comment { lines, block })
        }
    }

    /// A trailing line comment on the statement's own line.
    fn take_inline(&mut self, stmt_line: usize) -> Option<Comment> {
        let tok = self.peek()?;
        if tok.kind == TokKind::LineComment && tok.line == stmt_line {
            self.bump();
            return Some(Comment {
                lines: vec![CommentLine {
                    text: tok.text,
                    line: tok.line,
                }],
                block: false,
            });
        }
        None
    }

    /// Collects raw token text until the terminating `;`, which is consumed.
    fn raw_until_semicolon(&mut self) -> Result<String, ParseError> {
        let mut out = String::new();
        loop {
            let tok = self.bump_some(";")?;
            if tok.kind == TokKind::Symbol && tok.text == ";" {
                return Ok(out);
            }
            push_raw(&mut out, &tok);
        }
    }

    /// Collects raw token text until the closing `]`, which is consumed.
    fn raw_until_bracket_close(&mut self) -> Result<String, ParseError> {
        let mut out = String::new();
        loop {
            let tok = self.bump_some("]")?;
            if tok.kind == TokKind::Symbol && tok.text == "]" {
                return Ok(out);
            }
            push_raw(&mut out, &tok);
        }
    }
}

fn push_raw(out: &mut String, tok: &Token) {
    let text = if tok.kind == TokKind::Str {
        format!("\"{}\"", tok.text)
    } else {
        tok.text.clone()
    };
    if !out.is_empty() && text != "," {
        out.push(' ');
    }
    out.push_str(&text);
}
