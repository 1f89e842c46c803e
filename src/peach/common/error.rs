use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::rc::Rc;

use nonempty::NonEmpty;

pub trait PeachError: Debug {
    fn get_info(&self) -> ErrorInfo;
    fn get_message(&self) -> String;
    fn get_kind(&self) -> ErrorKind;
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct ErrorInfo {
    pub row: usize,
    pub col: usize,
}

impl ErrorInfo {
    pub fn new(row: usize, col: usize) -> Self { ErrorInfo { row, col } }
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.row, self.col)
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ErrorKind {
    Syntax,
    TypeError,
    DoesNotExist,
    MultipleDefinition,
    ArgumentError,
    MacroExpansionError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorKind::Syntax => "Syntax",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::DoesNotExist => "DoesNotExist",
            ErrorKind::MultipleDefinition => "MultipleDefinition",
            ErrorKind::ArgumentError => "ArgumentError",
            ErrorKind::MacroExpansionError => "MacroExpansionError",
        })
    }
}

/// A located, rendered error, attributed to the source file that was active when it was raised.
#[derive(Debug, PartialEq, Clone)]
pub struct Diagnostic {
    pub kind: ErrorKind,
    pub file: Rc<str>,
    pub info: ErrorInfo,
    pub message: String,
}

impl Diagnostic {
    pub fn new<S: Into<String>>(kind: ErrorKind, file: &Rc<str>, info: ErrorInfo, message: S) -> Self {
        Diagnostic { kind, file: file.clone(), info, message: message.into() }
    }

    pub fn from_error<E: PeachError>(file: &Rc<str>, error: &E) -> Self {
        Diagnostic::new(error.get_kind(), file, error.get_info(), error.get_message())
    }
}

impl PeachError for Diagnostic {
    fn get_info(&self) -> ErrorInfo { self.info }
    fn get_message(&self) -> String { self.message.to_owned() }
    fn get_kind(&self) -> ErrorKind { self.kind }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {} error: {}", self.file, self.info, self.kind, self.message)
    }
}

pub type PeachResult<A> = Result<A, NonEmpty<Diagnostic>>;

pub fn convert_errors<A, E: PeachError>(file: &Rc<str>, result: Result<A, NonEmpty<E>>) -> PeachResult<A> {
    result.map_err(|e| e.map(|a| Diagnostic::from_error(file, &a)))
}

pub fn convert_error<A, E: PeachError>(file: &Rc<str>, result: Result<A, E>) -> PeachResult<A> {
    convert_errors(file, result.to_nonempty())
}

pub fn report_errors(errors: &NonEmpty<Diagnostic>) {
    for error in errors.iter() {
        eprintln!("{}", error);
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct ParserError {
    pub message: String,
    pub info: ErrorInfo,
}

impl ParserError {
    pub fn new<S: Into<String>>(message: S, info: ErrorInfo) -> Self {
        ParserError { message: message.into(), info }
    }
}

impl PeachError for ParserError {
    fn get_info(&self) -> ErrorInfo { self.info }
    fn get_message(&self) -> String { self.message.to_owned() }
    fn get_kind(&self) -> ErrorKind { ErrorKind::Syntax }
}

pub trait ToNonEmpty<B> {
    fn to_nonempty(self) -> B;
}

impl<A, Err> ToNonEmpty<Result<A, NonEmpty<Err>>> for Result<A, Err> {
    fn to_nonempty(self) -> Result<A, NonEmpty<Err>> {
        self.map_err(NonEmpty::new)
    }
}
