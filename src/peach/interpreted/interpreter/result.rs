use crate::peach::common::error::{Diagnostic, ErrorInfo, ErrorKind, PeachError};
use crate::peach::interpreted::interpreter::result::InterpreterErrorOrControlFlow::{Error, Returned};

#[derive(Debug, PartialEq, Clone)]
pub enum InterpreterErrorOrControlFlow {
    // Already recorded in the interpreter's error list by the time it is raised.
    Error(Diagnostic),

    // Not an actual error; the returned value is on top of the operand stack.
    Returned(ErrorInfo),
}

impl PeachError for InterpreterErrorOrControlFlow {
    fn get_info(&self) -> ErrorInfo {
        match self {
            Error(d) => d.info,
            Returned(i) => *i,
        }
    }

    fn get_message(&self) -> String {
        match self {
            Error(d) => d.message.to_owned(),
            Returned(_) => "Return outside of a function".to_owned(),
        }
    }

    fn get_kind(&self) -> ErrorKind {
        match self {
            Error(d) => d.kind,
            Returned(_) => ErrorKind::Syntax,
        }
    }
}

pub type InterpretResult<A> = Result<A, InterpreterErrorOrControlFlow>;
