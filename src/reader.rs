//! Tokenizer and parser for `define <type> { ... }` blocks.
//!
//! Input is read line by line. CR-LF and bare CR line endings become plain
//! line breaks, lines whose first non-blank character is `#` are comments, and
//! blank lines are skipped. Within a line, whitespace separates fields.
//!
//! Between blocks, any `{` opens a block, wherever it sits on the line.
//! Inside a block, braces are told apart from value text by their column
//! alone: a `{` at a character column up to [`DEFAULT_ALIGN`] is a nested
//! opener (an error), and a field that starts with `}` at such a column closes
//! the block. Braces further to the right are literal characters of a value.
//! Values aligned the usual way start past that column, so
//! `notes  {not a block}` survives a round trip, but a value that begins with
//! a brace and is written with a small alignment does not.
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor};
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{NagcfgError, ParseCause, Result};
use crate::identifier::IdentifierGenerator;
use crate::object::ConfigObject;
use crate::schema::{DEFAULT_ALIGN, ObjectType};
use crate::store::ObjectStore;

const COMMENT: char = '#';
const DEFINE: &str = "define";

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum State {
    /// between objects
    Out,
    /// saw `define <type> {`
    Begin,
    /// consuming `key value...` lines
    In,
    /// saw the closing `}`
    End,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Delimiter {
    Open(usize),
    Close(usize),
}

#[derive(Debug)]
struct Field {
    column: usize,
    text: String,
}

#[derive(Debug)]
struct Tokens {
    line: usize,
    fields: Vec<Field>,
    delimiter: Option<Delimiter>,
}

impl Tokens {
    fn split(line: usize, text: &str, limit: usize) -> Self {
        let mut fields = Vec::new();
        let mut delimiter = None;
        let mut current = String::new();
        let mut start = 0;
        for (column, ch) in text.chars().enumerate() {
            if ch.is_whitespace() {
                flush(&mut fields, &mut current, start);
                continue;
            }
            if column <= limit {
                if ch == '{' {
                    flush(&mut fields, &mut current, start);
                    delimiter = Some(Delimiter::Open(column));
                    break;
                }
                if ch == '}' && current.is_empty() {
                    delimiter = Some(Delimiter::Close(column));
                    break;
                }
            }
            if current.is_empty() {
                start = column;
            }
            current.push(ch);
        }
        flush(&mut fields, &mut current, start);
        Self {
            line,
            fields,
            delimiter,
        }
    }
    fn first_column(&self) -> usize {
        self.fields.first().map_or(0, |f| f.column)
    }
    // key plus the remaining fields joined by single spaces
    fn property(&self) -> Option<(&str, String)> {
        let (key, rest) = self.fields.split_first()?;
        if rest.is_empty() {
            return None;
        }
        let value = rest
            .iter()
            .map(|f| f.text.as_str())
            .collect::<Vec<&str>>()
            .join(" ");
        Some((&key.text, value))
    }
}

fn flush(fields: &mut Vec<Field>, current: &mut String, column: usize) {
    if !current.is_empty() {
        fields.push(Field {
            column,
            text: std::mem::take(current),
        });
    }
}

// ------------- Reader -------------
pub struct Reader<R> {
    input: R,
    state: State,
    line: usize,
    lines: VecDeque<String>,
    opener: Option<Tokens>,
    current: Option<ConfigObject>,
    // line and column of the opener of the current block
    block_start: (usize, usize),
    provenance: String,
    generator: Option<Arc<IdentifierGenerator>>,
    sequence: u64,
    finished: bool,
}

impl<R: BufRead> Reader<R> {
    pub fn new(input: R) -> Self {
        Self {
            input,
            state: State::Out,
            line: 0,
            lines: VecDeque::new(),
            opener: None,
            current: None,
            block_start: (0, 0),
            provenance: String::new(),
            generator: None,
            sequence: 0,
            finished: false,
        }
    }
    /// Stamps every object read with the given source name.
    pub fn with_provenance(mut self, provenance: impl Into<String>) -> Self {
        self.provenance = provenance.into();
        self
    }
    /// Gives every object read an identifier from the generator. Without one,
    /// objects are left without identity.
    pub fn with_generator(mut self, generator: Arc<IdentifierGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }
    pub fn provenance(&self) -> &str {
        &self.provenance
    }
    pub fn state(&self) -> State {
        self.state
    }
    /// Number of the last line read, starting at 1.
    pub fn line(&self) -> usize {
        self.line
    }

    /// Returns the next object, or `None` once the input is exhausted. After
    /// an error the reader is finished.
    pub fn read_one(&mut self) -> Result<Option<ConfigObject>> {
        if self.finished {
            return Ok(None);
        }
        let result = self.advance();
        if !matches!(result, Ok(Some(_))) {
            self.finished = true;
        }
        result
    }

    pub fn read_all(&mut self) -> Result<Vec<ConfigObject>> {
        let mut objects = Vec::new();
        while let Some(object) = self.read_one()? {
            objects.push(object);
        }
        Ok(objects)
    }

    /// Reads everything into the store, returning how many objects were kept.
    /// Objects need identifiers to be stored, so the reader must have a generator.
    pub fn read_into(&mut self, store: &mut ObjectStore) -> Result<usize> {
        if self.generator.is_none() {
            return Err(NagcfgError::Invariant(
                "reading into a store requires an identifier generator".into(),
            ));
        }
        let mut kept = 0;
        while let Some(object) = self.read_one()? {
            store.insert(object)?;
            kept += 1;
        }
        Ok(kept)
    }

    fn advance(&mut self) -> Result<Option<ConfigObject>> {
        loop {
            match self.state {
                State::Out => {
                    let Some(tokens) = self.next_tokens(usize::MAX)? else {
                        return Ok(None);
                    };
                    match tokens.delimiter {
                        Some(Delimiter::Open(_)) => {
                            self.opener = Some(tokens);
                            self.state = State::Begin;
                        }
                        Some(Delimiter::Close(column)) => {
                            warn!(line = tokens.line, column, provenance = %self.provenance, "closing brace outside of a definition ignored");
                        }
                        None => {
                            debug!(line = tokens.line, provenance = %self.provenance, "text outside of a definition skipped");
                        }
                    }
                }
                State::Begin => {
                    let opener = self.opener.take();
                    let object = match opener {
                        Some(tokens) => self.begin(&tokens)?,
                        None => {
                            return Err(NagcfgError::Invariant(
                                "begin state without an opener line".into(),
                            ));
                        }
                    };
                    self.current = Some(object);
                    self.state = State::In;
                }
                State::In => {
                    let Some(tokens) = self.next_tokens(DEFAULT_ALIGN)? else {
                        let (line, column) = self.block_start;
                        return Err(NagcfgError::Parse {
                            line,
                            column,
                            cause: ParseCause::UnexpectedEof,
                        });
                    };
                    if let Some(Delimiter::Open(column)) = tokens.delimiter {
                        return Err(NagcfgError::Parse {
                            line: tokens.line,
                            column,
                            cause: ParseCause::NestedBlock,
                        });
                    }
                    match tokens.property() {
                        Some((key, value)) => self.add_property(tokens.line, key, &value),
                        None if tokens.fields.is_empty() => {}
                        None => {
                            debug!(line = tokens.line, column = tokens.first_column(), provenance = %self.provenance, "line without a value skipped");
                        }
                    }
                    if matches!(tokens.delimiter, Some(Delimiter::Close(_))) {
                        self.state = State::End;
                    }
                }
                State::End => {
                    self.state = State::Out;
                    if let Some(mut object) = self.current.take() {
                        object.sequence = self.sequence;
                        self.sequence += 1;
                        return Ok(Some(object));
                    }
                }
            }
        }
    }

    fn begin(&mut self, tokens: &Tokens) -> Result<ConfigObject> {
        let column = match tokens.delimiter {
            Some(Delimiter::Open(column)) => column,
            _ => tokens.first_column(),
        };
        let error = |cause| NagcfgError::Parse {
            line: tokens.line,
            column,
            cause,
        };
        let [keyword, kind, rest @ ..] = tokens.fields.as_slice() else {
            return Err(error(ParseCause::MissingType));
        };
        if keyword.text != DEFINE {
            return Err(error(ParseCause::ExpectedDefine(keyword.text.clone())));
        }
        let object_type: ObjectType = kind
            .text
            .parse()
            .map_err(|_| error(ParseCause::UnknownType(kind.text.clone())))?;
        if !rest.is_empty() {
            debug!(line = tokens.line, provenance = %self.provenance, "extra fields before block opener ignored");
        }
        let mut object = match &self.generator {
            Some(generator) => ConfigObject::with_id(object_type, generator.generate()),
            None => ConfigObject::new(object_type),
        };
        object.provenance = self.provenance.clone();
        self.block_start = (tokens.line, column);
        Ok(object)
    }

    fn add_property(&mut self, line: usize, key: &str, value: &str) {
        if let Some(object) = self.current.as_mut() {
            if !object.add(key, value) {
                debug!(line, key, provenance = %self.provenance, "repeated key ignored, first value kept");
            }
        }
    }

    // Next non-blank, non-comment line, split into fields. Braces past
    // `limit` are value text.
    fn next_tokens(&mut self, limit: usize) -> Result<Option<Tokens>> {
        while let Some(text) = self.next_line()? {
            let trimmed = text.trim_start();
            if trimmed.is_empty() || trimmed.starts_with(COMMENT) {
                continue;
            }
            return Ok(Some(Tokens::split(self.line, &text, limit)));
        }
        Ok(None)
    }

    fn next_line(&mut self) -> Result<Option<String>> {
        if self.lines.is_empty() {
            let mut raw = Vec::new();
            if self.input.read_until(b'\n', &mut raw)? == 0 {
                return Ok(None);
            }
            if raw.last() == Some(&b'\n') {
                raw.pop();
                if raw.last() == Some(&b'\r') {
                    raw.pop();
                }
            }
            let text = String::from_utf8_lossy(&raw);
            // a bare CR ends a line too
            self.lines.extend(text.split('\r').map(str::to_string));
        }
        let line = self.lines.pop_front();
        if line.is_some() {
            self.line += 1;
        }
        Ok(line)
    }
}

impl<R: BufRead> Iterator for Reader<R> {
    type Item = Result<ConfigObject>;
    fn next(&mut self) -> Option<Self::Item> {
        self.read_one().transpose()
    }
}

/// Reads every object in a file, using the path as provenance.
pub fn read_file(
    path: impl AsRef<Path>,
    generator: Option<Arc<IdentifierGenerator>>,
) -> Result<Vec<ConfigObject>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut reader = Reader::new(BufReader::new(file)).with_provenance(path.display().to_string());
    if let Some(generator) = generator {
        reader = reader.with_generator(generator);
    }
    reader.read_all()
}

/// Throwaway parse of in-memory text: no identifiers, no provenance.
pub fn parse_str(text: &str) -> Result<Vec<ConfigObject>> {
    Reader::new(Cursor::new(text.as_bytes())).read_all()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(tokens: &Tokens) -> Vec<&str> {
        tokens.fields.iter().map(|f| f.text.as_str()).collect()
    }

    #[test]
    fn opener_ends_the_field_before_it() {
        let tokens = Tokens::split(1, "define host{", DEFAULT_ALIGN);
        assert_eq!(texts(&tokens), vec!["define", "host"]);
        assert_eq!(tokens.delimiter, Some(Delimiter::Open(11)));
    }

    #[test]
    fn braces_past_the_limit_are_text() {
        let line = format!("    notes{}{{curly}}", " ".repeat(30));
        let tokens = Tokens::split(1, &line, DEFAULT_ALIGN);
        assert_eq!(tokens.delimiter, None);
        assert_eq!(texts(&tokens), vec!["notes", "{curly}"]);
    }

    #[test]
    fn closing_brace_must_start_a_field() {
        let tokens = Tokens::split(1, "    alias a}b", DEFAULT_ALIGN);
        assert_eq!(tokens.delimiter, None);
        assert_eq!(texts(&tokens), vec!["alias", "a}b"]);

        let tokens = Tokens::split(1, "    }", DEFAULT_ALIGN);
        assert_eq!(tokens.delimiter, Some(Delimiter::Close(4)));
        assert!(tokens.fields.is_empty());
    }
}
