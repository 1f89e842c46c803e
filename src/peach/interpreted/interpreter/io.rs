use std::fs;
use std::io::BufRead;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::peach::common::error::ErrorKind;
use crate::peach::interpreted::interpreter::result::InterpretResult;
use crate::peach::interpreted::interpreter::value::{NativeCall, Value};
use crate::peach::interpreted::interpreter::Interpreter;

/// Console, file and clock natives. Everything printed goes through the interpreter's output sink.
pub fn install(interpreter: &mut Interpreter) {
    interpreter.define_native("print", print);
    interpreter.define_native("write", write);
    interpreter.define_native("input", input);
    interpreter.define_native("read_file", read_file);
    interpreter.define_native("write_file", write_file);
    interpreter.define_native("now", now);
    interpreter.define_native("sleep", sleep);
    interpreter.define_native("exit", exit);
    interpreter.define_native("color", color);
}

fn render(interpreter: &mut Interpreter, call: &NativeCall) -> InterpretResult<String> {
    let mut parts = Vec::with_capacity(call.arguments.len());
    for argument in &call.arguments {
        parts.push(interpreter.stringify(argument.clone(), call.error_info)?);
    }
    Ok(parts.join(" "))
}

fn emit(interpreter: &mut Interpreter, call: &NativeCall, text: &str) -> InterpretResult<Value> {
    let result = {
        let output = interpreter.output();
        output.write_all(text.as_bytes()).and_then(|_| output.flush())
    };
    match result {
        Ok(()) => Ok(Value::Null),
        Err(e) => Err(interpreter.error(ErrorKind::TypeError, call.error_info, format!("Could not write output: {}", e))),
    }
}

fn string_argument(interpreter: &mut Interpreter, call: &NativeCall, index: usize) -> InterpretResult<String> {
    match call.argument(index).extract() {
        Value::Str(s) => Ok(s),
        other => Err(interpreter.error(
            ErrorKind::TypeError, call.error_info, format!("Expected a Str, got {}", other.type_name()),
        )),
    }
}

fn print(interpreter: &mut Interpreter, call: NativeCall) -> InterpretResult<Value> {
    let mut text = render(interpreter, &call)?;
    text.push('\n');
    emit(interpreter, &call, &text)
}

fn write(interpreter: &mut Interpreter, call: NativeCall) -> InterpretResult<Value> {
    let text = render(interpreter, &call)?;
    emit(interpreter, &call, &text)
}

fn input(interpreter: &mut Interpreter, call: NativeCall) -> InterpretResult<Value> {
    let prompt = render(interpreter, &call)?;
    emit(interpreter, &call, &prompt)?;
    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(_) => Ok(Value::Str(line.trim_end_matches(&['\r', '\n'][..]).to_owned())),
        Err(e) => Err(interpreter.error(ErrorKind::TypeError, call.error_info, format!("Could not read input: {}", e))),
    }
}

fn read_file(interpreter: &mut Interpreter, call: NativeCall) -> InterpretResult<Value> {
    let path = string_argument(interpreter, &call, 0)?;
    fs::read_to_string(&path).map(Value::Str).map_err(|e| interpreter.error(
        ErrorKind::DoesNotExist, call.error_info, format!("Could not open '{}': {}", path, e),
    ))
}

fn write_file(interpreter: &mut Interpreter, call: NativeCall) -> InterpretResult<Value> {
    let path = string_argument(interpreter, &call, 0)?;
    let contents = interpreter.stringify(call.argument(1), call.error_info)?;
    fs::write(&path, contents).map(|_| Value::Null).map_err(|e| interpreter.error(
        ErrorKind::DoesNotExist, call.error_info, format!("Could not write '{}': {}", path, e),
    ))
}

/// Seconds since the epoch.
fn now(_: &mut Interpreter, _: NativeCall) -> InterpretResult<Value> {
    let elapsed = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    Ok(Value::Float(elapsed.as_secs_f64()))
}

fn sleep(interpreter: &mut Interpreter, call: NativeCall) -> InterpretResult<Value> {
    let seconds = match call.argument(0).extract() {
        Value::Int(i) if i >= 0 => i as f64,
        Value::Float(f) if f >= 0.0 && f.is_finite() => f,
        other => return Err(interpreter.error(
            ErrorKind::ArgumentError, call.error_info, format!("Cannot sleep for {}", other.repr()),
        )),
    };
    thread::sleep(Duration::from_secs_f64(seconds));
    Ok(Value::Null)
}

fn exit(interpreter: &mut Interpreter, call: NativeCall) -> InterpretResult<Value> {
    let code = match call.argument(0).extract() {
        Value::Int(i) => match i32::try_from(i) {
            Ok(code) => code,
            Err(_) => return Err(interpreter.error(
                ErrorKind::ArgumentError, call.error_info, format!("Exit code {} is out of range", i),
            )),
        },
        Value::Null => 0,
        other => return Err(interpreter.error(
            ErrorKind::ArgumentError, call.error_info, format!("Invalid exit code {}", other.repr()),
        )),
    };
    let _ = interpreter.output().flush();
    std::process::exit(code)
}

fn ansi_code(name: &str) -> Option<u8> {
    match name {
        "black" => Some(30),
        "red" => Some(31),
        "green" => Some(32),
        "yellow" => Some(33),
        "blue" => Some(34),
        "magenta" => Some(35),
        "cyan" => Some(36),
        "white" => Some(37),
        _ => None,
    }
}

/// `color(name, text)` wraps `text` in ANSI escapes for the named foreground color.
fn color(interpreter: &mut Interpreter, call: NativeCall) -> InterpretResult<Value> {
    let name = string_argument(interpreter, &call, 0)?;
    let text = interpreter.stringify(call.argument(1), call.error_info)?;
    match ansi_code(&name) {
        Some(code) => Ok(Value::Str(format!("\x1b[{}m{}\x1b[0m", code, text))),
        None => Err(interpreter.error(ErrorKind::ArgumentError, call.error_info, format!("Unknown color '{}'", name))),
    }
}

#[cfg(test)]
mod tests {
    use crate::assert_msg_contains;
    use crate::peach::common::error::ErrorKind;
    use crate::peach::interpreted::tests::run_capturing;

    #[test]
    fn print_separates_with_spaces() {
        let run = run_capturing(vec!["print(1, \"two\", [3], null, true);"]);
        assert_eq!(run.output, "1 two [3] null true\n");
    }

    #[test]
    fn write_does_not_end_the_line() {
        let run = run_capturing(vec!["write(\"a\");", "write(\"b\");"]);
        assert_eq!(run.output, "ab");
    }

    #[test]
    fn color_wraps_in_escapes() {
        let run = run_capturing(vec!["print(color(\"red\", \"hot\"));", "color(\"plaid\", 1);"]);
        assert_eq!(run.output, "\x1b[31mhot\x1b[0m\n");
        assert_eq!(run.errors()[0].kind, ErrorKind::ArgumentError);
    }

    #[test]
    fn files_round_trip() {
        let path = std::env::temp_dir().join(format!("peach-io-{}.txt", std::process::id()));
        let path = path.to_string_lossy().replace('\\', "/");
        let write = format!("write_file(\"{}\", \"stone fruit\");", path);
        let read = format!("print(read_file(\"{}\"));", path);
        let run = run_capturing(vec![write.as_str(), read.as_str()]);
        assert!(run.errors().is_empty(), "{:?}", run.errors());
        assert_eq!(run.output, "stone fruit\n");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_files_do_not_exist() {
        let run = run_capturing(vec!["read_file(\"/definitely/not/here.peach\");"]);
        assert_eq!(run.errors()[0].kind, ErrorKind::DoesNotExist);
    }

    #[test]
    fn oversized_exit_codes_are_rejected() {
        let run = run_capturing(vec!["exit(4294967296);"]);
        assert_eq!(run.errors()[0].kind, ErrorKind::ArgumentError);
        assert_msg_contains!(run.errors(), "out of range");
    }

    #[test]
    fn now_is_a_float() {
        let run = run_capturing(vec!["print(now() > 0);"]);
        assert_eq!(run.output, "1\n");
    }
}
