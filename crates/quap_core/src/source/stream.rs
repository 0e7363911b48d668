//! Lazy reader over the top-level JSON array of the import document.
//!
//! # Responsibility
//! - Walk the array punctuation (`[`, `,`, `]`) directly on a buffered reader.
//! - Hand each element to `serde_json` for typed deserialization.
//!
//! # Invariants
//! - Only the element being decoded is held in memory.
//! - Elements must be JSON objects; anything else is malformed input.
//! - The iterator is fused after the first error or the closing `]`.

use crate::source::record::QuestionnaireRecord;
use serde::Deserialize;
use serde_json::error::Category;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Errors raised while reading the import document.
#[derive(Debug)]
pub enum StreamError {
    /// The input location does not exist.
    SourceAbsent(PathBuf),
    /// Reading the input failed.
    Io(io::Error),
    /// The byte stream is not the expected JSON array of objects.
    Malformed { index: usize, message: String },
    /// A record lacks a required key or carries a value of the wrong shape.
    MissingField { index: usize, message: String },
}

impl StreamError {
    fn from_json(index: usize, err: serde_json::Error) -> Self {
        match err.classify() {
            Category::Io => Self::Io(err.into()),
            Category::Data => Self::MissingField {
                index,
                message: err.to_string(),
            },
            Category::Syntax | Category::Eof => Self::Malformed {
                index,
                message: err.to_string(),
            },
        }
    }
}

impl Display for StreamError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SourceAbsent(path) => write!(f, "import source not found: {}", path.display()),
            Self::Io(err) => write!(f, "failed to read import source: {err}"),
            Self::Malformed { index, message } => {
                write!(f, "malformed import document at record {index}: {message}")
            }
            Self::MissingField { index, message } => {
                write!(f, "invalid questionnaire record {index}: {message}")
            }
        }
    }
}

impl Error for StreamError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::SourceAbsent(_) => None,
            Self::Malformed { .. } => None,
            Self::MissingField { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    BeforeArray,
    FirstElement,
    AfterElement,
    Done,
}

/// Forward-only sequence of questionnaire records.
pub struct QuestionnaireStream<R> {
    reader: R,
    position: Position,
    index: usize,
}

impl QuestionnaireStream<BufReader<File>> {
    /// Opens the document at `path`.
    ///
    /// Returns `StreamError::SourceAbsent` when the file does not exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StreamError> {
        let path = path.as_ref();
        match File::open(path) {
            Ok(file) => Ok(Self::new(BufReader::new(file))),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Err(StreamError::SourceAbsent(path.to_path_buf()))
            }
            Err(err) => Err(StreamError::Io(err)),
        }
    }
}

impl<R: BufRead> QuestionnaireStream<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            position: Position::BeforeArray,
            index: 0,
        }
    }

    /// Number of records yielded so far.
    pub fn records_read(&self) -> usize {
        self.index
    }

    fn next_record(&mut self) -> Result<Option<QuestionnaireRecord>, StreamError> {
        loop {
            match self.position {
                Position::Done => return Ok(None),
                Position::BeforeArray => match self.peek_significant()? {
                    Some(b'[') => {
                        self.reader.consume(1);
                        self.position = Position::FirstElement;
                    }
                    Some(other) => return Err(self.malformed_byte("`[`", other)),
                    None => return Err(self.malformed("document is empty")),
                },
                Position::FirstElement => match self.peek_significant()? {
                    Some(b']') => {
                        self.reader.consume(1);
                        self.finish()?;
                        return Ok(None);
                    }
                    Some(_) => return self.read_element().map(Some),
                    None => return Err(self.malformed("unterminated array")),
                },
                Position::AfterElement => match self.peek_significant()? {
                    Some(b',') => {
                        self.reader.consume(1);
                        return self.read_element().map(Some);
                    }
                    Some(b']') => {
                        self.reader.consume(1);
                        self.finish()?;
                        return Ok(None);
                    }
                    Some(other) => return Err(self.malformed_byte("`,` or `]`", other)),
                    None => return Err(self.malformed("unterminated array")),
                },
            }
        }
    }

    fn read_element(&mut self) -> Result<QuestionnaireRecord, StreamError> {
        match self.peek_significant()? {
            // Objects end on `}`, so the decoder never reads past the element.
            Some(b'{') => {}
            Some(other) => return Err(self.malformed_byte("a questionnaire object", other)),
            None => return Err(self.malformed("unterminated array")),
        }

        let mut deserializer = serde_json::Deserializer::from_reader(&mut self.reader);
        let record = QuestionnaireRecord::deserialize(&mut deserializer)
            .map_err(|err| StreamError::from_json(self.index, err))?;
        self.index += 1;
        self.position = Position::AfterElement;
        Ok(record)
    }

    fn finish(&mut self) -> Result<(), StreamError> {
        self.position = Position::Done;
        match self.peek_significant()? {
            None => Ok(()),
            Some(_) => Err(self.malformed("trailing characters after the array")),
        }
    }

    /// Skips JSON whitespace and returns the next byte without consuming it.
    fn peek_significant(&mut self) -> Result<Option<u8>, StreamError> {
        loop {
            let buf = self.reader.fill_buf().map_err(StreamError::Io)?;
            if buf.is_empty() {
                return Ok(None);
            }
            let skip = buf
                .iter()
                .take_while(|byte| matches!(byte, b' ' | b'\t' | b'\n' | b'\r'))
                .count();
            if skip < buf.len() {
                let byte = buf[skip];
                self.reader.consume(skip);
                return Ok(Some(byte));
            }
            let len = buf.len();
            self.reader.consume(len);
        }
    }

    fn malformed(&self, message: &str) -> StreamError {
        StreamError::Malformed {
            index: self.index,
            message: message.to_string(),
        }
    }

    fn malformed_byte(&self, expected: &str, found: u8) -> StreamError {
        StreamError::Malformed {
            index: self.index,
            message: format!("expected {expected}, found `{}`", char::from(found)),
        }
    }
}

impl<R: BufRead> Iterator for QuestionnaireStream<R> {
    type Item = Result<QuestionnaireRecord, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position == Position::Done {
            return None;
        }
        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.position = Position::Done;
                None
            }
            Err(err) => {
                self.position = Position::Done;
                Some(Err(err))
            }
        }
    }
}
