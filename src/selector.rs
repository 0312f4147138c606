//! A small cytoscape-flavoured selector language.
//!
//! Supported: comma-separated alternatives, each an optional group or tag
//! (`node`, `edge`, `div`, `*`) followed by any number of `#id`, `.class`,
//! `[attr]`, `[!attr]` and `[attr OP value]` tests. Descendant and child
//! combinators are not supported.

use crate::error::{Error, Result};
use serde_json::Value;

/// Something a selector can be tested against.
pub trait Selectable {
    fn tag(&self) -> &str;
    fn element_id(&self) -> Option<&str>;
    fn has_class(&self, class: &str) -> bool;
    fn attribute(&self, name: &str) -> Option<Value>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    alternatives: Vec<Compound>,
}

#[derive(Debug, Clone, PartialEq, Default)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrTest>,
}

#[derive(Debug, Clone, PartialEq)]
enum AttrTest {
    Exists(String),
    Missing(String),
    Compare {
        name: String,
        op: AttrOp,
        value: Literal,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrOp {
    Eq,
    Ne,
    Prefix,
    Suffix,
    Contains,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
enum Literal {
    Str(String),
    Num(f64),
    Bool(bool),
}

impl Selector {
    pub fn parse(query: &str) -> Result<Self> {
        if query.trim().is_empty() {
            return Err(Error::selector(query, "empty selector"));
        }
        let mut parser = Parser { src: query, pos: 0 };
        let mut alternatives = Vec::new();
        loop {
            parser.skip_ws();
            alternatives.push(parser.compound()?);
            parser.skip_ws();
            match parser.peek() {
                None => break,
                Some(',') => parser.bump(),
                Some(ch) => return Err(parser.error(format!("unexpected `{ch}`"))),
            }
        }
        Ok(Self { alternatives })
    }

    pub fn matches<T: Selectable + ?Sized>(&self, target: &T) -> bool {
        self.alternatives.iter().any(|compound| compound.matches(target))
    }
}

impl Compound {
    fn matches<T: Selectable + ?Sized>(&self, target: &T) -> bool {
        if let Some(tag) = self.tag.as_deref() {
            if tag != "*" && !tag.eq_ignore_ascii_case(target.tag()) {
                return false;
            }
        }
        if let Some(id) = self.id.as_deref() {
            if target.element_id() != Some(id) {
                return false;
            }
        }
        if !self.classes.iter().all(|class| target.has_class(class)) {
            return false;
        }
        self.attrs.iter().all(|test| test.matches(target))
    }
}

impl AttrTest {
    fn matches<T: Selectable + ?Sized>(&self, target: &T) -> bool {
        match self {
            AttrTest::Exists(name) => present(target.attribute(name)),
            AttrTest::Missing(name) => !present(target.attribute(name)),
            AttrTest::Compare { name, op, value } => match target.attribute(name) {
                Some(actual) if !actual.is_null() => compare(&actual, *op, value),
                _ => *op == AttrOp::Ne,
            },
        }
    }
}

fn present(value: Option<Value>) -> bool {
    matches!(value, Some(v) if !v.is_null())
}

fn compare(actual: &Value, op: AttrOp, expected: &Literal) -> bool {
    match op {
        AttrOp::Eq => equals(actual, expected),
        AttrOp::Ne => !equals(actual, expected),
        AttrOp::Prefix | AttrOp::Suffix | AttrOp::Contains => {
            let (Some(haystack), Literal::Str(needle)) = (as_text(actual), expected) else {
                return false;
            };
            match op {
                AttrOp::Prefix => haystack.starts_with(needle.as_str()),
                AttrOp::Suffix => haystack.ends_with(needle.as_str()),
                _ => haystack.contains(needle.as_str()),
            }
        }
        AttrOp::Lt | AttrOp::Le | AttrOp::Gt | AttrOp::Ge => {
            let (Some(lhs), Literal::Num(rhs)) = (as_number(actual), expected) else {
                return false;
            };
            match op {
                AttrOp::Lt => lhs < *rhs,
                AttrOp::Le => lhs <= *rhs,
                AttrOp::Gt => lhs > *rhs,
                _ => lhs >= *rhs,
            }
        }
    }
}

fn equals(actual: &Value, expected: &Literal) -> bool {
    match expected {
        Literal::Str(text) => as_text(actual).is_some_and(|value| value == *text),
        Literal::Num(number) => as_number(actual).is_some_and(|value| value == *number),
        Literal::Bool(flag) => match actual {
            Value::Bool(value) => value == flag,
            Value::String(value) => value == if *flag { "true" } else { "false" },
            _ => false,
        },
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) {
        if let Some(ch) = self.peek() {
            self.pos += ch.len_utf8();
        }
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.src[self.pos..].starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::selector(self.src, format!("{} at offset {}", message.into(), self.pos))
    }

    fn expect(&mut self, ch: char) -> Result<()> {
        if self.peek() == Some(ch) {
            self.bump();
            Ok(())
        } else {
            Err(self.error(format!("expected `{ch}`")))
        }
    }

    fn name(&mut self) -> Result<String> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|ch| ch.is_alphanumeric() || ch == '_' || ch == '-')
        {
            self.bump();
        }
        if start == self.pos {
            return Err(self.error("expected a name"));
        }
        Ok(self.src[start..self.pos].to_string())
    }

    fn compound(&mut self) -> Result<Compound> {
        let mut compound = Compound::default();
        let mut seen = false;
        match self.peek() {
            Some('*') => {
                self.bump();
                compound.tag = Some("*".to_string());
                seen = true;
            }
            Some(ch) if ch.is_alphabetic() => {
                compound.tag = Some(self.name()?);
                seen = true;
            }
            _ => {}
        }
        loop {
            match self.peek() {
                Some('#') => {
                    self.bump();
                    compound.id = Some(self.name()?);
                }
                Some('.') => {
                    self.bump();
                    compound.classes.push(self.name()?);
                }
                Some('[') => compound.attrs.push(self.attr()?),
                _ => break,
            }
            seen = true;
        }
        if !seen {
            return Err(self.error("expected a selector"));
        }
        Ok(compound)
    }

    fn attr(&mut self) -> Result<AttrTest> {
        self.expect('[')?;
        self.skip_ws();
        let negated = self.eat("!");
        self.skip_ws();
        let name = self.name()?;
        self.skip_ws();
        if self.eat("]") {
            return Ok(if negated {
                AttrTest::Missing(name)
            } else {
                AttrTest::Exists(name)
            });
        }
        if negated {
            return Err(self.error("`!` only applies to presence tests"));
        }
        let op = self.op()?;
        self.skip_ws();
        let value = self.literal()?;
        self.skip_ws();
        self.expect(']')?;
        Ok(AttrTest::Compare { name, op, value })
    }

    fn op(&mut self) -> Result<AttrOp> {
        const OPS: [(&str, AttrOp); 9] = [
            ("!=", AttrOp::Ne),
            ("^=", AttrOp::Prefix),
            ("$=", AttrOp::Suffix),
            ("*=", AttrOp::Contains),
            ("<=", AttrOp::Le),
            (">=", AttrOp::Ge),
            ("=", AttrOp::Eq),
            ("<", AttrOp::Lt),
            (">", AttrOp::Gt),
        ];
        for (token, op) in OPS {
            if self.eat(token) {
                return Ok(op);
            }
        }
        Err(self.error("expected a comparison operator"))
    }

    fn literal(&mut self) -> Result<Literal> {
        if let Some(quote @ ('"' | '\'')) = self.peek() {
            self.bump();
            let mut text = String::new();
            loop {
                match self.peek() {
                    None => return Err(self.error("unterminated string")),
                    Some('\\') => {
                        self.bump();
                        if let Some(ch) = self.peek() {
                            text.push(ch);
                            self.bump();
                        }
                    }
                    Some(ch) if ch == quote => {
                        self.bump();
                        return Ok(Literal::Str(text));
                    }
                    Some(ch) => {
                        text.push(ch);
                        self.bump();
                    }
                }
            }
        }
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|ch| !ch.is_whitespace() && ch != ']')
        {
            self.bump();
        }
        let token = &self.src[start..self.pos];
        if token.is_empty() {
            return Err(self.error("expected a value"));
        }
        Ok(match token {
            "true" => Literal::Bool(true),
            "false" => Literal::Bool(false),
            _ => token
                .parse::<f64>()
                .map(Literal::Num)
                .unwrap_or_else(|_| Literal::Str(token.to_string())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Probe {
        tag: &'static str,
        id: &'static str,
        classes: Vec<&'static str>,
        data: Value,
    }

    impl Selectable for Probe {
        fn tag(&self) -> &str {
            self.tag
        }

        fn element_id(&self) -> Option<&str> {
            Some(self.id)
        }

        fn has_class(&self, class: &str) -> bool {
            self.classes.contains(&class)
        }

        fn attribute(&self, name: &str) -> Option<Value> {
            self.data.get(name).cloned()
        }
    }

    fn probe() -> Probe {
        Probe {
            tag: "node",
            id: "node-order-3",
            classes: vec!["special", "hub"],
            data: json!({"order": 3, "name": "Third Node", "weight": "12", "flag": true}),
        }
    }

    fn check(query: &str) -> bool {
        Selector::parse(query).unwrap().matches(&probe())
    }

    #[test]
    fn group_id_and_classes() {
        assert!(check("node"));
        assert!(check("*"));
        assert!(!check("edge"));
        assert!(check("#node-order-3"));
        assert!(check("node.special"));
        assert!(check("node.special.hub"));
        assert!(!check("node.special.missing"));
        assert!(check("edge, node.hub"));
    }

    #[test]
    fn attribute_tests() {
        assert!(check("[order]"));
        assert!(check("[!missing]"));
        assert!(!check("[!order]"));
        assert!(check("[order = 3]"));
        assert!(check("[order >= 3][order < 4]"));
        assert!(!check("[order > 3]"));
        assert!(check("[name ^= 'Third']"));
        assert!(check("[name $= \"Node\"]"));
        assert!(check("[name *= 'rd N']"));
        assert!(check("[weight > 10]"));
        assert!(check("[flag = true]"));
        assert!(check("[missing != 1]"));
        assert!(!check("[order != 3]"));
    }

    #[test]
    fn rejects_malformed_queries() {
        for query in ["", "  ", "node .a", "[order", "[order ~ 1]", "[!order = 1]", "node,", "#"] {
            assert!(Selector::parse(query).is_err(), "{query} should fail");
        }
    }
}
