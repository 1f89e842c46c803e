use std::env;
use std::fs::read_to_string;
use std::rc::Rc;

use nonempty::NonEmpty;
use tracing::debug;

use crate::peach::common::error::{report_errors, Diagnostic, ErrorInfo, ErrorKind};
use crate::peach::common::lexer::tokenize;
use crate::peach::interpreted::interpreter::io;
use crate::peach::interpreted::interpreter::Interpreter;
use crate::peach::interpreted::parser::Parser;

pub const PRELUDE_VARIABLE: &str = "PEACH_PRELUDE";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOptions {
    /// Files imported ahead of the program itself.
    pub default_imports: Vec<String>,
}

impl RunOptions {
    pub fn from_env() -> Self {
        RunOptions::from_prelude(env::var(PRELUDE_VARIABLE).ok().as_deref())
    }

    fn from_prelude(prelude: Option<&str>) -> Self {
        let default_imports = prelude
            .map(|p| p.split(':').filter(|s| !s.is_empty()).map(|s| s.to_owned()).collect())
            .unwrap_or_default();
        RunOptions { default_imports }
    }
}

/// A fresh interpreter with the console natives installed.
pub fn interpreter(file: Rc<str>) -> Interpreter {
    let mut interpreter = Interpreter::new(file);
    io::install(&mut interpreter);
    interpreter
}

/// Runs a script. Nothing is evaluated if it fails to parse; otherwise a failing statement is
/// reported and the next one runs anyway. Returns whether everything succeeded.
pub fn run_file(path: &str, options: &RunOptions) -> bool {
    let file: Rc<str> = Rc::from(path);
    let source = match read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            let message = format!("Could not open '{}': {}", path, e);
            eprintln!("{}", Diagnostic::new(ErrorKind::DoesNotExist, &file, ErrorInfo::default(), message));
            return false;
        }
    };
    let output = Parser::new(tokenize(&source), file.clone()).parse_with_imports(&options.default_imports);
    if let Some(errors) = NonEmpty::from_vec(output.error_list) {
        report_errors(&errors);
        return false;
    }
    debug!(path, statements = output.program.statements.len(), "running");
    let mut interpreter = interpreter(file);
    let mut succeeded = true;
    for statement in &output.program.statements {
        if let Err(errors) = interpreter.execute(statement) {
            report_errors(&errors);
            succeeded = false;
        }
    }
    succeeded
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn prelude_paths_are_colon_separated() {
        assert_eq!(
            RunOptions::from_prelude(Some("a.peach::b.peach")).default_imports,
            vec!["a.peach".to_owned(), "b.peach".to_owned()],
        );
        assert_eq!(RunOptions::from_prelude(None), RunOptions::default());
    }

    #[test]
    fn missing_scripts_fail() {
        assert!(!run_file("/definitely/not/here.peach", &RunOptions::default()));
    }

    #[test]
    fn scripts_with_runtime_errors_keep_going_but_fail() {
        let dir = env::temp_dir();
        let path = dir.join(format!("peach-runfile-{}.peach", std::process::id()));
        fs::write(&path, "let x = 1;\nx.nothing;\nlet y = 2;\n").unwrap();
        let path = path.to_string_lossy().into_owned();
        assert!(!run_file(&path, &RunOptions::default()));
        fs::write(&path, "let x = 1;\nlet y = x + 1;\n").unwrap();
        assert!(run_file(&path, &RunOptions::default()));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn default_imports_run_first() {
        let dir = env::temp_dir();
        let prelude = dir.join(format!("peach-prelude-{}.peach", std::process::id()));
        let script = dir.join(format!("peach-main-{}.peach", std::process::id()));
        fs::write(&prelude, "let answer = 42;\n").unwrap();
        fs::write(&script, "let check: Int = answer;\n").unwrap();
        let options = RunOptions { default_imports: vec![prelude.to_string_lossy().into_owned()] };
        assert!(run_file(&script.to_string_lossy(), &options));
        assert!(!run_file(&script.to_string_lossy(), &RunOptions::default()));
        let _ = fs::remove_file(&prelude);
        let _ = fs::remove_file(&script);
    }
}
