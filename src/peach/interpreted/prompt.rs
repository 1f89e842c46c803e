use std::io;
use std::io::{BufRead, Write};
use std::rc::Rc;

use crate::peach::common::error::{report_errors, ErrorInfo, PeachResult};
use crate::peach::common::lexer::{tokenize, TokenType};
use crate::peach::interpreted::interpreter::value::Value;
use crate::peach::interpreted::interpreter::Interpreter;
use crate::peach::interpreted::parser::parse;
use crate::peach::interpreted::runfile::interpreter;

const PROMPT: &str = "> ";
const CONTINUATION: &str = "... ";

pub fn run_prompt() {
    let file: Rc<str> = Rc::from("<stdin>");
    let mut interpreter = interpreter(file.clone());
    let stdin = io::stdin();
    let mut buffer = String::new();
    loop {
        print!("{}", if buffer.is_empty() { PROMPT } else { CONTINUATION });
        let _ = io::stdout().flush();
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => buffer.push_str(&line),
        }
        if open_delimiters(&buffer) > 0 {
            continue;
        }
        match run(&mut interpreter, &file, &buffer) {
            Ok(Value::Null) => (),
            Ok(value) => match interpreter.stringify(value, ErrorInfo::default()) {
                Ok(s) => println!("{}", s),
                Err(_) => println!("<unprintable>"),
            },
            Err(errors) => report_errors(&errors),
        }
        buffer.clear();
    }
}

/// Runs every statement of `source`, yielding the value of the last one.
pub fn run(interpreter: &mut Interpreter, file: &Rc<str>, source: &str) -> PeachResult<Value> {
    let program = parse(tokenize(source), file)?;
    interpreter.run(&program)
}

/// How many `(`, `[` and `{` are still waiting to be closed.
pub fn open_delimiters(source: &str) -> i64 {
    tokenize(source).iter().map(|t| match t.get_type() {
        TokenType::OpenParen | TokenType::OpenBracket | TokenType::OpenBrace => 1,
        TokenType::CloseParen | TokenType::CloseBracket | TokenType::CloseBrace => -1,
        _ => 0,
    }).sum()
}

#[cfg(test)]
mod tests {
    use crate::peach::interpreted::tests::TEST_FILE;

    use super::*;

    #[test]
    fn counts_unclosed_delimiters() {
        assert_eq!(open_delimiters("func f(a) {"), 1);
        assert_eq!(open_delimiters("func f(a) { return [a]; }"), 0);
        assert_eq!(open_delimiters("print(\"(\""), 1);
    }

    #[test]
    fn state_survives_between_inputs() {
        let file: Rc<str> = Rc::from(TEST_FILE);
        let mut interpreter = interpreter(file.clone());
        assert!(run(&mut interpreter, &file, "let a = 20;").is_ok());
        let value = run(&mut interpreter, &file, "a + 22;").unwrap();
        assert!(matches!(value, Value::Int(42)));
        assert!(run(&mut interpreter, &file, "let a = 1;").is_err());
    }
}
