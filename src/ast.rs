//! Tree model for a single parsed `.proto` file.
//!
//! One `ProtoFile` is exclusively owned by the pipeline step processing it.
//! Filtering passes rebuild the child vectors via filter/map instead of
//! splicing in place.

/// Built-in scalar type names. References to these never become graph edges.
pub const SCALAR_TYPES: &[&str] = &[
    "double", "float", "int32", "int64", "uint32", "uint64", "sint32", "sint64", "fixed32",
    "fixed64", "sfixed32", "sfixed64", "bool", "string", "bytes",
];

/// Returns true if `type_name` is a user-defined type rather than a scalar.
pub fn is_user_type(type_name: &str) -> bool {
    !SCALAR_TYPES.contains(&type_name)
}

/// Qualify a bare type name with the file package. Already-dotted names are
/// returned untouched.
pub fn qualified_name(package: &str, name: &str) -> String {
    if package.is_empty() || name.contains('.') {
        name.to_string()
    } else {
        format!("{}.{}", package, name)
    }
}

/// One line of a comment, without the `//` or `/* */` markers.
///
/// `line` is the 1-based source line the text came from, or 0 for lines
/// synthesized by a transformation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentLine {
    pub text: String,
    pub line: usize,
}

/// A comment attached to a declaration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Comment {
    pub lines: Vec<CommentLine>,
    /// True when the source used `/* */` block style.
    pub block: bool,
}

impl Comment {
    pub fn from_text_lines<I, S>(lines: I, first_line: usize, block: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Comment {
            lines: lines
                .into_iter()
                .enumerate()
                .map(|(i, text)| CommentLine {
                    text: text.into(),
                    line: first_line + i,
                })
                .collect(),
            block,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// A top-level item in a proto file, in source order.
#[derive(Debug, Clone)]
pub enum Item {
    Syntax(Syntax),
    Package(Package),
    Import(Import),
    Option(ProtoOption),
    Service(Service),
    Message(Message),
    Enum(EnumDef),
}

#[derive(Debug, Clone)]
pub struct Syntax {
    /// The declared syntax level, e.g. `proto3`.
    pub value: String,
    pub comment: Option<Comment>,
}

#[derive(Debug, Clone)]
pub struct Package {
    pub name: String,
    pub comment: Option<Comment>,
}

#[derive(Debug, Clone)]
pub struct Import {
    pub path: String,
    pub public: bool,
    pub comment: Option<Comment>,
}

/// An `option name = value;` statement. The value keeps its raw source
/// spelling (quotes included) so formatting round-trips.
#[derive(Debug, Clone)]
pub struct ProtoOption {
    pub name: String,
    pub value: String,
    pub comment: Option<Comment>,
}

#[derive(Debug, Clone)]
pub struct Service {
    pub name: String,
    pub comment: Option<Comment>,
    pub items: Vec<ServiceItem>,
}

#[derive(Debug, Clone)]
pub enum ServiceItem {
    Rpc(Rpc),
    Option(ProtoOption),
}

impl Service {
    pub fn rpcs(&self) -> impl Iterator<Item = &Rpc> {
        self.items.iter().filter_map(|item| match item {
            ServiceItem::Rpc(rpc) => Some(rpc),
            ServiceItem::Option(_) => None,
        })
    }

    pub fn has_rpcs(&self) -> bool {
        self.rpcs().next().is_some()
    }
}

#[derive(Debug, Clone)]
pub struct Rpc {
    pub name: String,
    pub request: String,
    pub response: String,
    pub client_streaming: bool,
    pub server_streaming: bool,
    pub comment: Option<Comment>,
    pub options: Vec<ProtoOption>,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub name: String,
    pub comment: Option<Comment>,
    pub members: Vec<Member>,
}

/// A member of a message body.
#[derive(Debug, Clone)]
pub enum Member {
    Field(Field),
    OneOf(OneOf),
    Message(Message),
    Enum(EnumDef),
    Option(ProtoOption),
    /// A `reserved` statement, kept as raw text (e.g. `2, 15, 9 to 11`).
    Reserved(Reserved),
}

#[derive(Debug, Clone)]
pub struct Reserved {
    pub ranges: String,
    pub comment: Option<Comment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldLabel {
    None,
    Repeated,
    Optional,
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    /// Value type. For map fields this is the value type; the key type is
    /// in `map_key`.
    pub type_name: String,
    pub number: u32,
    pub label: FieldLabel,
    pub map_key: Option<String>,
    /// Raw bracket options text, without the brackets.
    pub options: Option<String>,
    pub comment: Option<Comment>,
    /// Trailing comment on the same line as the field.
    pub inline: Option<Comment>,
}

#[derive(Debug, Clone)]
pub struct OneOf {
    pub name: String,
    pub comment: Option<Comment>,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone)]
pub struct EnumDef {
    pub name: String,
    pub comment: Option<Comment>,
    pub options: Vec<ProtoOption>,
    pub values: Vec<EnumValue>,
}

#[derive(Debug, Clone)]
pub struct EnumValue {
    pub name: String,
    pub number: i32,
    pub options: Option<String>,
    pub comment: Option<Comment>,
    pub inline: Option<Comment>,
}

/// A parsed proto file: the ordered top-level item list.
#[derive(Debug, Clone, Default)]
pub struct ProtoFile {
    pub items: Vec<Item>,
}

impl ProtoFile {
    /// The declared package name, or an empty string when absent.
    pub fn package(&self) -> &str {
        self.items
            .iter()
            .find_map(|item| match item {
                Item::Package(p) => Some(p.name.as_str()),
                _ => None,
            })
            .unwrap_or("")
    }

    pub fn services(&self) -> impl Iterator<Item = &Service> {
        self.items.iter().filter_map(|item| match item {
            Item::Service(s) => Some(s),
            _ => None,
        })
    }

    pub fn services_mut(&mut self) -> impl Iterator<Item = &mut Service> {
        self.items.iter_mut().filter_map(|item| match item {
            Item::Service(s) => Some(s),
            _ => None,
        })
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.items.iter().filter_map(|item| match item {
            Item::Message(m) => Some(m),
            _ => None,
        })
    }

    pub fn messages_mut(&mut self) -> impl Iterator<Item = &mut Message> {
        self.items.iter_mut().filter_map(|item| match item {
            Item::Message(m) => Some(m),
            _ => None,
        })
    }

    /// True if at least one service, message, or enum remains.
    pub fn has_definitions(&self) -> bool {
        self.items
            .iter()
            .any(|item| matches!(item, Item::Service(_) | Item::Message(_) | Item::Enum(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_are_not_user_types() {
        assert!(!is_user_type("string"));
        assert!(!is_user_type("sfixed64"));
        assert!(is_user_type("Money"));
        assert!(is_user_type("common.Money"));
    }

    #[test]
    fn qualified_name_leaves_dotted_names_alone() {
        assert_eq!(qualified_name("orders", "Money"), "orders.Money");
        assert_eq!(qualified_name("orders", "common.Money"), "common.Money");
        assert_eq!(qualified_name("", "Money"), "Money");
    }

    #[test]
    fn comment_from_text_lines_numbers_sequentially() {
        let c = Comment::from_text_lines(["a", "b"], 7, false);
        assert_eq!(c.lines[0].line, 7);
        assert_eq!(c.lines[1].line, 8);
        assert!(!c.is_empty());
    }

    #[test]
    fn package_defaults_to_empty() {
        let file = ProtoFile::default();
        assert_eq!(file.package(), "");
        assert!(!file.has_definitions());
    }
}
