//! CSS selector subset used by the in-memory document.
//!
//! Supported: type and universal selectors, `#id`, `.class`, attribute
//! selectors (`[a]`, `[a=v]`, `[a*=v]`, `[a^=v]`, `[a$=v]`, `[a~=v]`),
//! descendant and child combinators, and comma-separated selector lists.
//! Backslash escapes are honoured inside identifiers (`.group\/query`).

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    #[error("Empty selector")]
    Empty,

    #[error("Unexpected '{0}' at offset {1}")]
    Unexpected(char, usize),

    #[error("Unexpected end of selector")]
    UnexpectedEnd,
}

/// Read access the matcher needs from a tree
pub trait SelectorTarget {
    type Node: Copy;

    /// Lowercase tag name, `None` for non-element nodes
    fn element_tag(&self, node: Self::Node) -> Option<&str>;

    fn element_attr(&self, node: Self::Node, name: &str) -> Option<&str>;

    fn parent_element(&self, node: Self::Node) -> Option<Self::Node>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrOp {
    Exists,
    Equals,
    Contains,
    Prefix,
    Suffix,
    Word,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrSelector {
    name: String,
    op: AttrOp,
    value: String,
}

impl AttrSelector {
    fn matches(&self, actual: Option<&str>) -> bool {
        let Some(actual) = actual else {
            return false;
        };
        match self.op {
            AttrOp::Exists => true,
            AttrOp::Equals => actual == self.value,
            AttrOp::Contains => !self.value.is_empty() && actual.contains(&self.value),
            AttrOp::Prefix => !self.value.is_empty() && actual.starts_with(&self.value),
            AttrOp::Suffix => !self.value.is_empty() && actual.ends_with(&self.value),
            AttrOp::Word => actual.split_whitespace().any(|w| w == self.value),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrSelector>,
}

impl Compound {
    fn is_empty(&self) -> bool {
        self.tag.is_none() && self.id.is_none() && self.classes.is_empty() && self.attrs.is_empty()
    }

    fn matches<T: SelectorTarget>(&self, target: &T, node: T::Node) -> bool {
        let Some(tag) = target.element_tag(node) else {
            return false;
        };
        if let Some(expected) = &self.tag {
            if expected != "*" && !expected.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if target.element_attr(node, "id") != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let class_attr = target.element_attr(node, "class").unwrap_or("");
            let present: Vec<&str> = class_attr.split_whitespace().collect();
            if !self.classes.iter().all(|c| present.contains(&c.as_str())) {
                return false;
            }
        }
        self.attrs
            .iter()
            .all(|a| a.matches(target.element_attr(node, &a.name)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

/// Compounds left to right; `combinators[i]` joins `compounds[i]` and `compounds[i + 1]`
#[derive(Debug, Clone, PartialEq, Eq)]
struct ComplexSelector {
    compounds: Vec<Compound>,
    combinators: Vec<Combinator>,
}

impl ComplexSelector {
    fn matches<T: SelectorTarget>(&self, target: &T, node: T::Node) -> bool {
        self.matches_at(target, node, self.compounds.len() - 1)
    }

    fn matches_at<T: SelectorTarget>(&self, target: &T, node: T::Node, index: usize) -> bool {
        if !self.compounds[index].matches(target, node) {
            return false;
        }
        if index == 0 {
            return true;
        }
        match self.combinators[index - 1] {
            Combinator::Child => target
                .parent_element(node)
                .map(|parent| self.matches_at(target, parent, index - 1))
                .unwrap_or(false),
            Combinator::Descendant => {
                let mut ancestor = target.parent_element(node);
                while let Some(candidate) = ancestor {
                    if self.matches_at(target, candidate, index - 1) {
                        return true;
                    }
                    ancestor = target.parent_element(candidate);
                }
                false
            }
        }
    }
}

/// A parsed, comma-separated selector list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList {
    selectors: Vec<ComplexSelector>,
}

impl SelectorList {
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        let mut parser = Parser::new(input);
        let mut selectors = vec![parser.complex()?];
        while parser.eat(',') {
            selectors.push(parser.complex()?);
        }
        parser.skip_whitespace();
        match parser.peek() {
            None => Ok(Self { selectors }),
            Some(c) => Err(SelectorError::Unexpected(c, parser.pos)),
        }
    }

    pub fn matches<T: SelectorTarget>(&self, target: &T, node: T::Node) -> bool {
        self.selectors.iter().any(|s| s.matches(target, node))
    }
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn eat(&mut self, expected: char) -> bool {
        self.skip_whitespace();
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), SelectorError> {
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(c) => Err(SelectorError::Unexpected(c, self.pos - 1)),
            None => Err(SelectorError::UnexpectedEnd),
        }
    }

    fn complex(&mut self) -> Result<ComplexSelector, SelectorError> {
        self.skip_whitespace();
        let mut compounds = vec![self.compound()?];
        let mut combinators = Vec::new();

        loop {
            let had_space = self.skip_whitespace();
            match self.peek() {
                Some('>') => {
                    self.pos += 1;
                    self.skip_whitespace();
                    combinators.push(Combinator::Child);
                    compounds.push(self.compound()?);
                }
                Some(',') | None => break,
                Some(_) if had_space => {
                    combinators.push(Combinator::Descendant);
                    compounds.push(self.compound()?);
                }
                Some(c) => return Err(SelectorError::Unexpected(c, self.pos)),
            }
        }

        Ok(ComplexSelector {
            compounds,
            combinators,
        })
    }

    fn compound(&mut self) -> Result<Compound, SelectorError> {
        let mut compound = Compound::default();

        match self.peek() {
            Some('*') => {
                self.pos += 1;
                compound.tag = Some("*".to_string());
            }
            Some(c) if is_ident_start(c) => {
                compound.tag = Some(self.ident()?.to_ascii_lowercase());
            }
            _ => {}
        }

        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    compound.id = Some(self.ident()?);
                }
                Some('.') => {
                    self.pos += 1;
                    compound.classes.push(self.ident()?);
                }
                Some('[') => {
                    self.pos += 1;
                    compound.attrs.push(self.attribute()?);
                }
                _ => break,
            }
        }

        if compound.is_empty() {
            return match self.peek() {
                Some(c) => Err(SelectorError::Unexpected(c, self.pos)),
                None if self.chars.is_empty() => Err(SelectorError::Empty),
                None => Err(SelectorError::UnexpectedEnd),
            };
        }
        Ok(compound)
    }

    fn attribute(&mut self) -> Result<AttrSelector, SelectorError> {
        self.skip_whitespace();
        let name = self.ident()?.to_ascii_lowercase();
        self.skip_whitespace();

        let op = match self.bump() {
            Some(']') => {
                return Ok(AttrSelector {
                    name,
                    op: AttrOp::Exists,
                    value: String::new(),
                })
            }
            Some('=') => AttrOp::Equals,
            Some(c @ ('*' | '^' | '$' | '~')) => {
                self.expect('=')?;
                match c {
                    '*' => AttrOp::Contains,
                    '^' => AttrOp::Prefix,
                    '$' => AttrOp::Suffix,
                    _ => AttrOp::Word,
                }
            }
            Some(c) => return Err(SelectorError::Unexpected(c, self.pos - 1)),
            None => return Err(SelectorError::UnexpectedEnd),
        };

        self.skip_whitespace();
        let value = match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.pos += 1;
                let mut value = String::new();
                loop {
                    match self.bump() {
                        Some('\\') => value.extend(self.bump()),
                        Some(c) if c == quote => break,
                        Some(c) => value.push(c),
                        None => return Err(SelectorError::UnexpectedEnd),
                    }
                }
                value
            }
            _ => self.ident()?,
        };
        self.skip_whitespace();
        self.expect(']')?;

        Ok(AttrSelector { name, op, value })
    }

    fn ident(&mut self) -> Result<String, SelectorError> {
        let mut ident = String::new();
        while let Some(c) = self.peek() {
            if c == '\\' {
                self.pos += 1;
                ident.extend(self.bump());
            } else if is_ident_char(c) {
                self.pos += 1;
                ident.push(c);
            } else {
                break;
            }
        }
        if ident.is_empty() {
            return match self.peek() {
                Some(c) => Err(SelectorError::Unexpected(c, self.pos)),
                None => Err(SelectorError::UnexpectedEnd),
            };
        }
        Ok(ident)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '-' || c == '\\'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-' || !c.is_ascii()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Flat tree: (tag, attrs, parent index)
    struct Tree(Vec<(&'static str, Vec<(&'static str, &'static str)>, Option<usize>)>);

    impl SelectorTarget for Tree {
        type Node = usize;

        fn element_tag(&self, node: usize) -> Option<&str> {
            Some(self.0[node].0)
        }

        fn element_attr(&self, node: usize, name: &str) -> Option<&str> {
            self.0[node]
                .1
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| *v)
        }

        fn parent_element(&self, node: usize) -> Option<usize> {
            self.0[node].2
        }
    }

    fn tree() -> Tree {
        Tree(vec![
            ("form", vec![("class", "composer stretch")], None),
            ("div", vec![("class", "flex items-center")], Some(0)),
            (
                "button",
                vec![("data-testid", "send-button"), ("aria-label", "Send prompt")],
                Some(1),
            ),
            ("div", vec![("id", "prompt-textarea"), ("contenteditable", "true")], Some(0)),
            ("span", vec![("class", "group/query")], Some(3)),
        ])
    }

    fn matches(selector: &str, node: usize) -> bool {
        SelectorList::parse(selector).unwrap().matches(&tree(), node)
    }

    #[test]
    fn test_simple_selectors() {
        assert!(matches("button", 2));
        assert!(matches("#prompt-textarea", 3));
        assert!(matches(".flex.items-center", 1));
        assert!(!matches(".flex.hidden", 1));
        assert!(matches("*", 0));
    }

    #[test]
    fn test_attribute_operators() {
        assert!(matches("[data-testid]", 2));
        assert!(matches("button[data-testid=\"send-button\"]", 2));
        assert!(matches("[aria-label*='Send']", 2));
        assert!(matches("[aria-label^=Send]", 2));
        assert!(matches("[aria-label$=\"prompt\"]", 2));
        assert!(matches("form[class~=\"composer\"]", 0));
        assert!(!matches("[aria-label=\"Send\"]", 2));
        assert!(!matches("[aria-label*=\"\"]", 2));
    }

    #[test]
    fn test_combinators() {
        assert!(matches("form button", 2));
        assert!(matches("form > div > button", 2));
        assert!(!matches("form > button", 2));
        assert!(matches("form div[contenteditable=\"true\"] span", 4));
    }

    #[test]
    fn test_selector_list() {
        assert!(matches("textarea, #prompt-textarea", 3));
        assert!(!matches("textarea, fieldset", 3));
    }

    #[test]
    fn test_escaped_identifier() {
        assert!(matches(".group\\/query", 4));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(SelectorList::parse(""), Err(SelectorError::Empty));
        assert!(SelectorList::parse("div[").is_err());
        assert!(SelectorList::parse("div >").is_err());
        assert!(SelectorList::parse("div:hover").is_err());
        assert!(SelectorList::parse("[a=\"b").is_err());
    }
}
