//! Turtle reader covering the syntax used by SKOS vocabularies: directives,
//! predicate and object lists, literals, blank nodes. Collections are rejected.

use super::triples::{resolve_iri, Term, Triple, RDF_TYPE, XSD_NS};
use crate::OntologyError;
use std::collections::HashMap;

type ParseResult<T> = Result<T, OntologyError>;

pub fn parse_turtle(input: &str) -> ParseResult<Vec<Triple>> {
    let mut parser = TurtleParser::new(input);
    parser.document()?;
    Ok(parser.triples)
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':' | '%')
}

struct TurtleParser {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    prefixes: HashMap<String, String>,
    base: Option<String>,
    triples: Vec<Triple>,
    blank_counter: usize,
}

impl TurtleParser {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
            line: 1,
            prefixes: HashMap::new(),
            base: None,
            triples: Vec::new(),
            blank_counter: 0,
        }
    }

    fn error(&self, message: impl Into<String>) -> OntologyError {
        OntologyError::Turtle {
            line: self.line,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn expect(&mut self, expected: char) -> ParseResult<()> {
        self.skip_ws();
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(c) => Err(self.error(format!("expected '{expected}', found '{c}'"))),
            None => Err(self.error(format!("expected '{expected}', found end of input"))),
        }
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else if c == '#' {
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.bump();
                }
            } else {
                break;
            }
        }
    }

    /// SPARQL-style `PREFIX` / `BASE` keyword, case-insensitive, followed by whitespace.
    fn keyword_ahead(&self, keyword: &str) -> bool {
        let len = keyword.chars().count();
        let matches = keyword
            .chars()
            .enumerate()
            .all(|(offset, expected)| {
                self.peek_at(offset)
                    .is_some_and(|c| c.eq_ignore_ascii_case(&expected))
            });
        matches && self.peek_at(len).is_some_and(char::is_whitespace)
    }

    fn document(&mut self) -> ParseResult<()> {
        loop {
            self.skip_ws();
            let Some(c) = self.peek() else {
                return Ok(());
            };

            if c == '@' {
                self.bump();
                let name = self.read_while(|c| c.is_ascii_alphabetic());
                match name.as_str() {
                    "prefix" => self.prefix_body()?,
                    "base" => self.base_body()?,
                    other => return Err(self.error(format!("unknown directive @{other}"))),
                }
                self.expect('.')?;
            } else if self.keyword_ahead("PREFIX") {
                self.pos += "PREFIX".len();
                self.prefix_body()?;
            } else if self.keyword_ahead("BASE") {
                self.pos += "BASE".len();
                self.base_body()?;
            } else {
                self.triples_statement()?;
                self.expect('.')?;
            }
        }
    }

    fn read_while(&mut self, accept: impl Fn(char) -> bool) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if !accept(c) {
                break;
            }
            out.push(c);
            self.bump();
        }
        out
    }

    fn prefix_body(&mut self) -> ParseResult<()> {
        self.skip_ws();
        let prefix = self.read_while(|c| c != ':' && !c.is_whitespace());
        self.expect(':')?;
        self.skip_ws();
        let namespace = self.iri_ref()?;
        self.prefixes.insert(prefix, namespace);
        Ok(())
    }

    fn base_body(&mut self) -> ParseResult<()> {
        self.skip_ws();
        let base = self.iri_ref()?;
        self.base = Some(base);
        Ok(())
    }

    fn iri_ref(&mut self) -> ParseResult<String> {
        self.expect('<')?;
        let mut raw = String::new();
        loop {
            match self.bump() {
                Some('>') => break,
                Some('\\') => raw.push(self.escape()?),
                Some(c) if c == '\n' || c == ' ' => return Err(self.error("whitespace inside IRI")),
                Some(c) => raw.push(c),
                None => return Err(self.error("unterminated IRI")),
            }
        }
        Ok(resolve_iri(self.base.as_deref(), &raw))
    }

    /// Reads a name token; a trailing `.` belongs to the statement, not the name.
    fn read_name(&mut self) -> String {
        let mut token = self.read_while(is_name_char);
        while token.ends_with('.') {
            token.pop();
            self.pos -= 1;
        }
        token
    }

    fn prefixed_name(&mut self) -> ParseResult<String> {
        let token = self.read_name();
        if token.is_empty() {
            let found = self
                .peek()
                .map(|c| format!("'{c}'"))
                .unwrap_or_else(|| "end of input".to_string());
            return Err(self.error(format!("unexpected {found}")));
        }
        let Some((prefix, local)) = token.split_once(':') else {
            return Err(self.error(format!("expected prefixed name, found {token}")));
        };
        match self.prefixes.get(prefix) {
            Some(namespace) => Ok(format!("{namespace}{local}")),
            None => Err(self.error(format!("unknown prefix '{prefix}:'"))),
        }
    }

    fn fresh_blank(&mut self) -> Term {
        self.blank_counter += 1;
        Term::Blank(format!("genid{}", self.blank_counter))
    }

    fn blank_label(&mut self) -> Term {
        self.pos += 2;
        Term::Blank(self.read_name())
    }

    fn triples_statement(&mut self) -> ParseResult<()> {
        self.skip_ws();
        if self.peek() == Some('[') {
            let subject = self.blank_property_list()?;
            self.skip_ws();
            if self.peek() != Some('.') {
                self.predicate_object_list(&subject)?;
            }
            return Ok(());
        }

        let subject = match self.peek() {
            Some('<') => Term::Iri(self.iri_ref()?),
            Some('_') if self.peek_at(1) == Some(':') => self.blank_label(),
            Some('(') => return Err(self.error("collections are not supported")),
            _ => Term::Iri(self.prefixed_name()?),
        };
        self.predicate_object_list(&subject)
    }

    fn predicate_object_list(&mut self, subject: &Term) -> ParseResult<()> {
        loop {
            self.skip_ws();
            let predicate = self.verb()?;
            self.object_list(subject, &predicate)?;
            self.skip_ws();
            if self.peek() != Some(';') {
                return Ok(());
            }
            while self.peek() == Some(';') {
                self.bump();
                self.skip_ws();
            }
            if matches!(self.peek(), Some('.') | Some(']') | None) {
                return Ok(());
            }
        }
    }

    fn verb(&mut self) -> ParseResult<String> {
        if self.peek() == Some('a') && !self.peek_at(1).is_some_and(is_name_char) {
            self.bump();
            return Ok(RDF_TYPE.to_string());
        }
        if self.peek() == Some('<') {
            return self.iri_ref();
        }
        self.prefixed_name()
    }

    fn object_list(&mut self, subject: &Term, predicate: &str) -> ParseResult<()> {
        loop {
            self.skip_ws();
            let object = self.object()?;
            self.triples
                .push(Triple::new(subject.clone(), predicate, object));
            self.skip_ws();
            if self.peek() == Some(',') {
                self.bump();
                continue;
            }
            return Ok(());
        }
    }

    fn object(&mut self) -> ParseResult<Term> {
        match self.peek() {
            Some('<') => Ok(Term::Iri(self.iri_ref()?)),
            Some('"') | Some('\'') => self.literal(),
            Some('[') => self.blank_property_list(),
            Some('_') if self.peek_at(1) == Some(':') => Ok(self.blank_label()),
            Some('(') => Err(self.error("collections are not supported")),
            Some(c)
                if c.is_ascii_digit()
                    || c == '+'
                    || c == '-'
                    || (c == '.' && self.peek_at(1).is_some_and(|d| d.is_ascii_digit())) =>
            {
                Ok(self.number())
            }
            _ => {
                let start = self.pos;
                let token = self.read_name();
                if token == "true" || token == "false" {
                    return Ok(Term::typed(token, &format!("{XSD_NS}boolean")));
                }
                self.pos = start;
                Ok(Term::Iri(self.prefixed_name()?))
            }
        }
    }

    fn blank_property_list(&mut self) -> ParseResult<Term> {
        self.bump();
        let node = self.fresh_blank();
        self.skip_ws();
        if self.peek() == Some(']') {
            self.bump();
            return Ok(node);
        }
        self.predicate_object_list(&node)?;
        self.expect(']')?;
        Ok(node)
    }

    fn escape(&mut self) -> ParseResult<char> {
        let c = self
            .bump()
            .ok_or_else(|| self.error("unterminated escape sequence"))?;
        let hex_digits = match c {
            't' => return Ok('\t'),
            'n' => return Ok('\n'),
            'r' => return Ok('\r'),
            'b' => return Ok('\u{8}'),
            'f' => return Ok('\u{c}'),
            '"' | '\'' | '\\' => return Ok(c),
            'u' => 4,
            'U' => 8,
            other => return Err(self.error(format!("invalid escape '\\{other}'"))),
        };
        let mut code = String::new();
        for _ in 0..hex_digits {
            match self.bump() {
                Some(digit) if digit.is_ascii_hexdigit() => code.push(digit),
                _ => return Err(self.error("invalid unicode escape")),
            }
        }
        u32::from_str_radix(&code, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| self.error(format!("invalid code point U+{code}")))
    }

    fn literal(&mut self) -> ParseResult<Term> {
        let quote = self.bump().unwrap_or('"');
        let long = self.peek() == Some(quote) && self.peek_at(1) == Some(quote);
        if long {
            self.pos += 2;
        }

        let mut value = String::new();
        loop {
            let Some(c) = self.bump() else {
                return Err(self.error("unterminated string literal"));
            };
            if c == '\\' {
                value.push(self.escape()?);
            } else if c == quote && !long {
                break;
            } else if c == quote && self.peek() == Some(quote) && self.peek_at(1) == Some(quote) {
                self.pos += 2;
                break;
            } else if c == '\n' && !long {
                return Err(self.error("newline in short string literal"));
            } else {
                value.push(c);
            }
        }

        if self.peek() == Some('@') {
            self.bump();
            let language = self.read_while(|c| c.is_ascii_alphanumeric() || c == '-');
            return Ok(Term::Literal {
                value,
                language: Some(language),
                datatype: None,
            });
        }
        if self.peek() == Some('^') && self.peek_at(1) == Some('^') {
            self.pos += 2;
            let datatype = if self.peek() == Some('<') {
                self.iri_ref()?
            } else {
                self.prefixed_name()?
            };
            return Ok(Term::Literal {
                value,
                language: None,
                datatype: Some(datatype),
            });
        }
        Ok(Term::literal(value))
    }

    fn number(&mut self) -> Term {
        let mut lexical = String::new();
        if let Some(sign @ ('+' | '-')) = self.peek() {
            lexical.push(sign);
            self.bump();
        }
        lexical.push_str(&self.read_while(|c| c.is_ascii_digit()));

        let mut datatype = "integer";
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
            lexical.push('.');
            lexical.push_str(&self.read_while(|c| c.is_ascii_digit()));
            datatype = "decimal";
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            lexical.push('e');
            self.bump();
            if let Some(sign @ ('+' | '-')) = self.peek() {
                lexical.push(sign);
                self.bump();
            }
            lexical.push_str(&self.read_while(|c| c.is_ascii_digit()));
            datatype = "double";
        }
        Term::typed(lexical, &format!("{XSD_NS}{datatype}"))
    }
}
