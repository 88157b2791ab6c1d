//! Content expression compiler.
//!
//! Node types describe their allowed children with small regular grammars
//! over child type names, e.g. `"block+"`, `"inline*"` or
//! `"(paragraph | heading) block*"`. A name may refer to a node type or to
//! a group of node types. Expressions are compiled once, at schema build
//! time, into a `regex::Regex` that runs over the child sequence encoded
//! as space-terminated type names (`"paragraph heading "`). Malformed
//! expressions fail registration, never an edit.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use regex::Regex;

use super::SchemaError;

/// A compiled content expression for one node type.
#[derive(Debug, Clone)]
pub struct ContentMatch {
    expr: String,
    regex: Regex,
    /// Node type names reachable from the expression (after group expansion).
    referenced: BTreeSet<String>,
}

impl ContentMatch {
    /// Compile `expr` against the known node names and group memberships.
    ///
    /// `groups` maps a group name to the node type names belonging to it.
    pub(crate) fn compile(
        type_name: &str,
        expr: &str,
        node_names: &BTreeSet<String>,
        groups: &BTreeMap<String, BTreeSet<String>>,
    ) -> Result<Self, SchemaError> {
        let tokens = tokenize(type_name, expr)?;
        let mut parser = ExprParser {
            type_name,
            expr,
            tokens: &tokens,
            pos: 0,
            node_names,
            groups,
            referenced: BTreeSet::new(),
        };
        let pattern = parser.parse_expr()?;
        if parser.pos != tokens.len() {
            return Err(SchemaError::MalformedContent {
                type_name: type_name.to_string(),
                expr: expr.to_string(),
                reason: format!("unexpected `{}`", tokens[parser.pos]),
            });
        }
        let referenced = parser.referenced;
        let anchored = format!("^{pattern}$");
        let regex = Regex::new(&anchored).map_err(|err| SchemaError::MalformedContent {
            type_name: type_name.to_string(),
            expr: expr.to_string(),
            reason: err.to_string(),
        })?;
        Ok(Self {
            expr: expr.to_string(),
            regex,
            referenced,
        })
    }

    /// The source expression, as registered.
    pub fn expr(&self) -> &str {
        &self.expr
    }

    /// Whether a sequence of child type names satisfies the expression.
    pub fn matches<'a>(&self, child_types: impl Iterator<Item = &'a str>) -> bool {
        let mut encoded = String::new();
        for name in child_types {
            encoded.push_str(name);
            encoded.push(' ');
        }
        self.regex.is_match(&encoded)
    }

    /// Whether the expression can produce the given node type at all.
    pub fn references(&self, type_name: &str) -> bool {
        self.referenced.contains(type_name)
    }
}

#[derive(Debug, PartialEq)]
enum Token {
    Name(String),
    Open,
    Close,
    Pipe,
    Star,
    Plus,
    Question,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Name(name) => write!(f, "{name}"),
            Token::Open => write!(f, "("),
            Token::Close => write!(f, ")"),
            Token::Pipe => write!(f, "|"),
            Token::Star => write!(f, "*"),
            Token::Plus => write!(f, "+"),
            Token::Question => write!(f, "?"),
        }
    }
}

fn tokenize(type_name: &str, expr: &str) -> Result<Vec<Token>, SchemaError> {
    let mut tokens = Vec::new();
    let mut chars = expr.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            }
            '|' => {
                chars.next();
                tokens.push(Token::Pipe);
            }
            '*' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '?' => {
                chars.next();
                tokens.push(Token::Question);
            }
            c if c.is_ascii_alphanumeric() || c == '_' => {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Name(name));
            }
            other => {
                return Err(SchemaError::MalformedContent {
                    type_name: type_name.to_string(),
                    expr: expr.to_string(),
                    reason: format!("unexpected character `{other}`"),
                });
            }
        }
    }
    Ok(tokens)
}

struct ExprParser<'a> {
    type_name: &'a str,
    expr: &'a str,
    tokens: &'a [Token],
    pos: usize,
    node_names: &'a BTreeSet<String>,
    groups: &'a BTreeMap<String, BTreeSet<String>>,
    referenced: BTreeSet<String>,
}

impl<'a> ExprParser<'a> {
    fn error(&self, reason: impl Into<String>) -> SchemaError {
        SchemaError::MalformedContent {
            type_name: self.type_name.to_string(),
            expr: self.expr.to_string(),
            reason: reason.into(),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    /// expr := seq ('|' seq)*
    fn parse_expr(&mut self) -> Result<String, SchemaError> {
        let mut branches = vec![self.parse_seq()?];
        while matches!(self.peek(), Some(Token::Pipe)) {
            self.pos += 1;
            branches.push(self.parse_seq()?);
        }
        if branches.len() == 1 {
            Ok(branches.pop().unwrap())
        } else {
            Ok(format!("(?:{})", branches.join("|")))
        }
    }

    /// seq := term+
    fn parse_seq(&mut self) -> Result<String, SchemaError> {
        let mut parts = Vec::new();
        while matches!(self.peek(), Some(Token::Name(_)) | Some(Token::Open)) {
            parts.push(self.parse_term()?);
        }
        if parts.is_empty() {
            return Err(self.error("expected a name or `(`"));
        }
        Ok(parts.concat())
    }

    /// term := atom ('*' | '+' | '?')?
    fn parse_term(&mut self) -> Result<String, SchemaError> {
        let atom = self.parse_atom()?;
        let suffix = match self.peek() {
            Some(Token::Star) => "*",
            Some(Token::Plus) => "+",
            Some(Token::Question) => "?",
            _ => "",
        };
        if !suffix.is_empty() {
            self.pos += 1;
        }
        Ok(format!("(?:{atom}){suffix}"))
    }

    /// atom := NAME | '(' expr ')'
    fn parse_atom(&mut self) -> Result<String, SchemaError> {
        match self.peek() {
            Some(Token::Open) => {
                self.pos += 1;
                let inner = self.parse_expr()?;
                match self.peek() {
                    Some(Token::Close) => {
                        self.pos += 1;
                        Ok(inner)
                    }
                    _ => Err(self.error("missing `)`")),
                }
            }
            Some(Token::Name(name)) => {
                let name = name.clone();
                self.pos += 1;
                self.resolve_name(&name)
            }
            Some(other) => {
                let msg = format!("unexpected `{other}`");
                Err(self.error(msg))
            }
            None => Err(self.error("unexpected end of expression")),
        }
    }

    /// A name resolves either to a single node type or to every member of
    /// a group. Unknown names fail registration.
    fn resolve_name(&mut self, name: &str) -> Result<String, SchemaError> {
        if self.node_names.contains(name) {
            self.referenced.insert(name.to_string());
            return Ok(format!("(?:{} )", regex::escape(name)));
        }
        if let Some(members) = self.groups.get(name) {
            if members.is_empty() {
                return Err(self.error(format!("group `{name}` has no members")));
            }
            self.referenced.extend(members.iter().cloned());
            let alts: Vec<String> = members.iter().map(|m| regex::escape(m)).collect();
            return Ok(format!("(?:(?:{}) )", alts.join("|")));
        }
        Err(self.error(format!("unknown node type or group `{name}`")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn fixture() -> (BTreeSet<String>, BTreeMap<String, BTreeSet<String>>) {
        let names: BTreeSet<String> = ["paragraph", "heading", "text", "code_block"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut groups = BTreeMap::new();
        groups.insert(
            "block".to_string(),
            ["paragraph", "heading", "code_block"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
        groups.insert(
            "inline".to_string(),
            ["text"].iter().map(|s| s.to_string()).collect(),
        );
        (names, groups)
    }

    fn compile(expr: &str) -> ContentMatch {
        let (names, groups) = fixture();
        ContentMatch::compile("test", expr, &names, &groups).expect("expression should compile")
    }

    #[rstest]
    #[case("block+", &["paragraph"], true)]
    #[case("block+", &["paragraph", "heading"], true)]
    #[case("block+", &[], false)]
    #[case("block+", &["text"], false)]
    #[case("inline*", &[], true)]
    #[case("inline*", &["text", "text"], true)]
    #[case("inline*", &["paragraph"], false)]
    #[case("heading block*", &["heading"], true)]
    #[case("heading block*", &["heading", "paragraph", "code_block"], true)]
    #[case("heading block*", &["paragraph"], false)]
    #[case("(paragraph | heading)+", &["paragraph", "heading"], true)]
    #[case("(paragraph | heading)+", &["code_block"], false)]
    #[case("paragraph?", &[], true)]
    #[case("paragraph?", &["paragraph"], true)]
    #[case("paragraph?", &["paragraph", "paragraph"], false)]
    fn matching(#[case] expr: &str, #[case] children: &[&str], #[case] expected: bool) {
        let m = compile(expr);
        assert_eq!(m.matches(children.iter().copied()), expected);
    }

    #[test]
    fn group_names_expand_to_members() {
        let m = compile("block*");
        assert!(m.references("paragraph"));
        assert!(m.references("code_block"));
        assert!(!m.references("text"));
    }

    #[test]
    fn unknown_name_fails_at_compile_time() {
        let (names, groups) = fixture();
        let err = ContentMatch::compile("doc", "banana+", &names, &groups).unwrap_err();
        assert!(matches!(err, SchemaError::MalformedContent { .. }));
    }

    #[rstest]
    #[case("block+)")]
    #[case("(block+")]
    #[case("| block")]
    #[case("block ^")]
    #[case("")]
    fn malformed_expressions_fail(#[case] expr: &str) {
        let (names, groups) = fixture();
        assert!(ContentMatch::compile("doc", expr, &names, &groups).is_err());
    }

    #[test]
    fn name_is_matched_whole_not_by_prefix() {
        // "head" is not a registered type even though "heading" is
        let (names, groups) = fixture();
        assert!(ContentMatch::compile("doc", "head+", &names, &groups).is_err());

        let m = compile("heading+");
        assert!(!m.matches(["head"].into_iter()));
    }
}
