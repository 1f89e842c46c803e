use std::cmp::Ordering;
use std::collections::HashMap;

use option_ext::OptionExt;

use crate::peach::common::error::ErrorKind;
use crate::peach::common::utils::rcrc;
use crate::peach::interpreted::interpreter::object::{clone_object, lookup_member, Object};
use crate::peach::interpreted::interpreter::result::InterpretResult;
use crate::peach::interpreted::interpreter::typing::{property_type, satisfies_type, TypeResolver};
use crate::peach::interpreted::interpreter::value::{ArrayRef, NativeCall, ObjRef, Value, VALUE_MEMBER};
use crate::peach::interpreted::interpreter::Interpreter;

fn truth(b: bool) -> Value { Value::Int(b as i64) }

fn receiver(interpreter: &mut Interpreter, call: &NativeCall) -> InterpretResult<ObjRef> {
    match &call.this {
        Some(this) => Ok(this.clone()),
        None => Err(interpreter.error(ErrorKind::ArgumentError, call.error_info, "Expected a receiver")),
    }
}

fn object_argument(interpreter: &mut Interpreter, call: &NativeCall, index: usize, what: &str) -> InterpretResult<ObjRef> {
    match call.argument(index) {
        Value::Object(o) => Ok(o),
        other => Err(interpreter.error(
            ErrorKind::TypeError,
            call.error_info,
            format!("Expected {}, got {}", what, other.type_name()),
        )),
    }
}

fn int_argument(interpreter: &mut Interpreter, call: &NativeCall, index: usize) -> InterpretResult<i64> {
    match call.argument(index).extract() {
        Value::Int(i) => Ok(i),
        other => Err(interpreter.error(
            ErrorKind::TypeError, call.error_info, format!("Expected an Int index, got {}", other.type_name()),
        )),
    }
}

fn array_receiver(interpreter: &mut Interpreter, call: &NativeCall) -> InterpretResult<ArrayRef> {
    match call.this_value().extract() {
        Value::Array(a) => Ok(a),
        other => Err(interpreter.error(
            ErrorKind::TypeError, call.error_info, format!("Expected an Array, got {}", other.type_name()),
        )),
    }
}

fn string_receiver(interpreter: &mut Interpreter, call: &NativeCall) -> InterpretResult<String> {
    match call.this_value().extract() {
        Value::Str(s) => Ok(s),
        other => Err(interpreter.error(
            ErrorKind::TypeError, call.error_info, format!("Expected a Str, got {}", other.type_name()),
        )),
    }
}

// Python-style: negative indices count from the end.
fn resolve_index(interpreter: &mut Interpreter, call: &NativeCall, index: i64, len: usize) -> InterpretResult<usize> {
    let resolved = if index < 0 { index + len as i64 } else { index };
    if resolved < 0 || resolved >= len as i64 {
        Err(interpreter.error(
            ErrorKind::TypeError, call.error_info, format!("Index {} out of range for length {}", index, len),
        ))
    } else {
        Ok(resolved as usize)
    }
}

/* Object */

pub fn object_new(interpreter: &mut Interpreter, call: NativeCall) -> InterpretResult<Value> {
    let ty = receiver(interpreter, &call)?;
    interpreter.construct(&ty, call.arguments, call.error_info).map(Value::Object)
}

pub fn object_type(interpreter: &mut Interpreter, call: NativeCall) -> InterpretResult<Value> {
    Ok(interpreter.runtime_type(&call.this_value()).map_or2(Value::Object, Value::Null))
}

pub fn to_str(interpreter: &mut Interpreter, call: NativeCall) -> InterpretResult<Value> {
    match call.this_value().extract() {
        Value::Array(elements) => {
            let elements: Vec<Value> = elements.borrow().clone();
            let mut rendered = Vec::with_capacity(elements.len());
            for element in elements {
                rendered.push(match element.extract() {
                    s @ Value::Str(_) => s.repr(),
                    _ => interpreter.stringify(element, call.error_info)?,
                });
            }
            Ok(Value::Str(format!("[{}]", rendered.join(", "))))
        }
        other => Ok(Value::Str(other.stringify())),
    }
}

/// On a type, a new structural type parented by it: function-valued properties become methods,
/// anything else goes into the instance template. On a plain object, a copy with the properties
/// merged in.
pub fn extend(interpreter: &mut Interpreter, call: NativeCall) -> InterpretResult<Value> {
    let this = receiver(interpreter, &call)?;
    let props = object_argument(interpreter, &call, 0, "an object of properties")?;
    let props = props.borrow().members.clone();
    if !this.borrow().is_type() {
        let copy = clone_object(&this, None);
        copy.borrow_mut().members.extend(props);
        return Ok(Value::Object(copy));
    }
    let template = match lookup_member(&this, "instance") {
        Some(Value::Object(t)) => clone_object(&t, None),
        _ => rcrc(Object::new(None, HashMap::new())),
    };
    let mut methods = HashMap::new();
    for (name, value) in props {
        match value {
            Value::Function(_) | Value::Native(_) => { methods.insert(name, value); }
            other => template.borrow_mut().assign_member(name, other),
        }
    }
    methods.insert("instance".to_owned(), Value::Object(template));
    Ok(Value::Object(rcrc(Object::new_type("", Some(this), methods, false))))
}

pub fn patch(interpreter: &mut Interpreter, call: NativeCall) -> InterpretResult<Value> {
    let this = receiver(interpreter, &call)?;
    let source = object_argument(interpreter, &call, 0, "an object to patch from")?;
    let members = source.borrow().members.clone();
    this.borrow_mut().members.extend(members);
    Ok(Value::Object(this))
}

pub fn satisfies(interpreter: &mut Interpreter, call: NativeCall) -> InterpretResult<Value> {
    let this = receiver(interpreter, &call)?;
    let required = object_argument(interpreter, &call, 0, "a type or object to satisfy")?;
    Ok(truth(satisfies_type(&this, &required, &*interpreter)))
}

pub fn compare(_: &mut Interpreter, call: NativeCall) -> InterpretResult<Value> {
    let lhs = call.this_value().extract();
    let rhs = call.argument(0).extract();
    Ok(truth(match ordering(&lhs, &rhs) {
        Some(o) => o == Ordering::Equal,
        None => lhs.identical(&rhs),
    }))
}

pub fn not(interpreter: &mut Interpreter, call: NativeCall) -> InterpretResult<Value> {
    let truthy = interpreter.truthy_value(call.this_value(), call.error_info)?;
    Ok(truth(!truthy))
}

pub fn object_bool(_: &mut Interpreter, _: NativeCall) -> InterpretResult<Value> {
    Ok(truth(true))
}

pub fn and(interpreter: &mut Interpreter, call: NativeCall) -> InterpretResult<Value> {
    let lhs = interpreter.truthy_value(call.this_value(), call.error_info)?;
    let rhs = interpreter.truthy_value(call.argument(0), call.error_info)?;
    Ok(truth(lhs && rhs))
}

pub fn or(interpreter: &mut Interpreter, call: NativeCall) -> InterpretResult<Value> {
    let lhs = interpreter.truthy_value(call.this_value(), call.error_info)?;
    let rhs = interpreter.truthy_value(call.argument(0), call.error_info)?;
    Ok(truth(lhs || rhs))
}

/* Type */

pub fn property(interpreter: &mut Interpreter, call: NativeCall) -> InterpretResult<Value> {
    let this = receiver(interpreter, &call)?;
    let name = match call.argument(0).extract() {
        Value::Str(s) => s,
        other => return Err(interpreter.error(
            ErrorKind::TypeError, call.error_info, format!("Expected a property name, got {}", other.type_name()),
        )),
    };
    Ok(property_type(&this, &name, &*interpreter).map_or2(Value::Object, Value::Null))
}

/* Scalars */

/// Stores the argument as the instance's `_value`, coerced to the kind of the template's default.
pub fn scalar_construct(interpreter: &mut Interpreter, call: NativeCall) -> InterpretResult<Value> {
    let this = receiver(interpreter, &call)?;
    let argument = match call.arguments.first() {
        Some(a) => a.extract(),
        None => return Ok(Value::Null),
    };
    let default = this.borrow().members.get(VALUE_MEMBER).cloned().unwrap_or(Value::Null);
    let value = match (&default, argument) {
        (Value::Int(_), v @ Value::Int(_)) | (Value::Float(_), v @ Value::Float(_)) => v,
        (Value::Int(_), other) => as_int(interpreter, &call, other)?,
        (Value::Float(_), other) => as_float(interpreter, &call, other)?,
        (Value::Str(_), v @ Value::Str(_)) => v,
        (Value::Str(_), other) => Value::Str(interpreter.stringify(other, call.error_info)?),
        (Value::Bool(_), v @ Value::Bool(_)) => v,
        (Value::Bool(_), other) => Value::Bool(interpreter.truthy_value(other, call.error_info)?),
        (Value::Array(_), v @ Value::Array(_)) => v,
        (Value::Null, v @ (Value::Function(_) | Value::Native(_) | Value::Null)) => v,
        (_, other) => return Err(interpreter.error(
            ErrorKind::TypeError,
            call.error_info,
            format!("Cannot construct a {} from {}", default.type_name(), other.type_name()),
        )),
    };
    this.borrow_mut().assign_member(VALUE_MEMBER, value);
    Ok(Value::Null)
}

pub fn scalar_bool(_: &mut Interpreter, call: NativeCall) -> InterpretResult<Value> {
    Ok(truth(match call.this_value().extract() {
        Value::Null => false,
        Value::Bool(b) => b,
        Value::Int(i) => i != 0,
        Value::Float(f) => f != 0.0,
        Value::Str(s) => !s.is_empty(),
        Value::Array(a) => !a.borrow().is_empty(),
        _ => true,
    }))
}

fn as_int(interpreter: &mut Interpreter, call: &NativeCall, value: Value) -> InterpretResult<Value> {
    match value {
        Value::Int(i) => Ok(Value::Int(i)),
        Value::Float(f) if f.is_finite() => Ok(Value::Int(f.trunc() as i64)),
        Value::Bool(b) => Ok(Value::Int(b as i64)),
        Value::Str(s) => s.trim().parse::<i64>().map(Value::Int).map_err(|_| interpreter.error(
            ErrorKind::TypeError, call.error_info, format!("Cannot convert \"{}\" to Int", s),
        )),
        other => Err(interpreter.error(
            ErrorKind::TypeError, call.error_info, format!("Cannot convert {} to Int", other.type_name()),
        )),
    }
}

fn as_float(interpreter: &mut Interpreter, call: &NativeCall, value: Value) -> InterpretResult<Value> {
    match value {
        Value::Int(i) => Ok(Value::Float(i as f64)),
        Value::Float(f) => Ok(Value::Float(f)),
        Value::Bool(b) => Ok(Value::Float(b as i64 as f64)),
        Value::Str(s) => s.trim().parse::<f64>().map(Value::Float).map_err(|_| interpreter.error(
            ErrorKind::TypeError, call.error_info, format!("Cannot convert \"{}\" to Float", s),
        )),
        other => Err(interpreter.error(
            ErrorKind::TypeError, call.error_info, format!("Cannot convert {} to Float", other.type_name()),
        )),
    }
}

pub fn to_int(interpreter: &mut Interpreter, call: NativeCall) -> InterpretResult<Value> {
    let value = call.this_value().extract();
    as_int(interpreter, &call, value)
}

pub fn to_float(interpreter: &mut Interpreter, call: NativeCall) -> InterpretResult<Value> {
    let value = call.this_value().extract();
    as_float(interpreter, &call, value)
}

/* Num */

fn float_of(value: &Value) -> f64 {
    match value {
        Value::Int(i) => *i as f64,
        Value::Float(f) => *f,
        _ => f64::NAN,
    }
}

fn is_number(value: &Value) -> bool { matches!(value, Value::Int(_) | Value::Float(_)) }

fn ordering(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        (a, b) if is_number(a) && is_number(b) => float_of(a).partial_cmp(&float_of(b)),
        _ => None,
    }
}

fn numeric_operands(interpreter: &mut Interpreter, call: &NativeCall, method: &str) -> InterpretResult<(Value, Value)> {
    let lhs = call.this_value().extract();
    let rhs = call.argument(0).extract();
    if is_number(&lhs) && is_number(&rhs) {
        Ok((lhs, rhs))
    } else {
        Err(interpreter.error(
            ErrorKind::TypeError,
            call.error_info,
            format!("Cannot {} {} and {}", method, lhs.type_name(), rhs.type_name()),
        ))
    }
}

// Int with Int stays an Int; anything involving a Float is a Float.
fn arithmetic(
    interpreter: &mut Interpreter,
    call: NativeCall,
    method: &str,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> InterpretResult<Value> {
    match numeric_operands(interpreter, &call, method)? {
        (Value::Int(a), Value::Int(b)) => match int_op(a, b) {
            Some(v) => Ok(Value::Int(v)),
            None => Err(interpreter.error(
                ErrorKind::TypeError, call.error_info, format!("Integer overflow in {}", method),
            )),
        },
        (a, b) => Ok(Value::Float(float_op(float_of(&a), float_of(&b)))),
    }
}

fn check_divisor(interpreter: &mut Interpreter, call: &NativeCall) -> InterpretResult<()> {
    if float_of(&call.argument(0).extract()) == 0.0 {
        Err(interpreter.error(ErrorKind::TypeError, call.error_info, "Division by zero"))
    } else {
        Ok(())
    }
}

// Rounds toward negative infinity.
fn floor_div(a: i64, b: i64) -> Option<i64> {
    let q = a.checked_div(b)?;
    Some(if a % b != 0 && (a < 0) != (b < 0) { q - 1 } else { q })
}

// Takes the sign of the divisor.
fn floor_mod(a: i64, b: i64) -> Option<i64> {
    let r = a.checked_rem(b)?;
    Some(if r != 0 && (r < 0) != (b < 0) { r + b } else { r })
}

fn float_mod(a: f64, b: f64) -> f64 {
    let r = a % b;
    if r != 0.0 && (r < 0.0) != (b < 0.0) { r + b } else { r }
}

pub fn num_add(interpreter: &mut Interpreter, call: NativeCall) -> InterpretResult<Value> {
    arithmetic(interpreter, call, "add", i64::checked_add, |a, b| a + b)
}

pub fn num_sub(interpreter: &mut Interpreter, call: NativeCall) -> InterpretResult<Value> {
    arithmetic(interpreter, call, "subtract", i64::checked_sub, |a, b| a - b)
}

pub fn num_mul(interpreter: &mut Interpreter, call: NativeCall) -> InterpretResult<Value> {
    arithmetic(interpreter, call, "multiply", i64::checked_mul, |a, b| a * b)
}

pub fn num_div(interpreter: &mut Interpreter, call: NativeCall) -> InterpretResult<Value> {
    numeric_operands(interpreter, &call, "divide")?;
    check_divisor(interpreter, &call)?;
    arithmetic(interpreter, call, "divide", floor_div, |a, b| a / b)
}

pub fn num_mod(interpreter: &mut Interpreter, call: NativeCall) -> InterpretResult<Value> {
    numeric_operands(interpreter, &call, "take the modulo of")?;
    check_divisor(interpreter, &call)?;
    arithmetic(interpreter, call, "take the modulo of", floor_mod, float_mod)
}

pub fn num_neg(interpreter: &mut Interpreter, call: NativeCall) -> InterpretResult<Value> {
    match call.this_value().extract() {
        Value::Int(i) => match i.checked_neg() {
            Some(v) => Ok(Value::Int(v)),
            None => Err(interpreter.error(ErrorKind::TypeError, call.error_info, "Integer overflow in negate")),
        },
        Value::Float(f) => Ok(Value::Float(-f)),
        other => Err(interpreter.error(
            ErrorKind::TypeError, call.error_info, format!("Cannot negate {}", other.type_name()),
        )),
    }
}

pub fn num_pos(interpreter: &mut Interpreter, call: NativeCall) -> InterpretResult<Value> {
    match call.this_value().extract() {
        v @ (Value::Int(_) | Value::Float(_)) => Ok(v),
        other => Err(interpreter.error(
            ErrorKind::TypeError, call.error_info, format!("Cannot apply unary plus to {}", other.type_name()),
        )),
    }
}

fn comparison(
    interpreter: &mut Interpreter, call: NativeCall, method: &str, accept: fn(Ordering) -> bool,
) -> InterpretResult<Value> {
    let lhs = call.this_value().extract();
    let rhs = call.argument(0).extract();
    match ordering(&lhs, &rhs) {
        Some(o) => Ok(truth(accept(o))),
        None => Err(interpreter.error(
            ErrorKind::TypeError,
            call.error_info,
            format!("Cannot compare {} and {} with '{}'", lhs.type_name(), rhs.type_name(), method),
        )),
    }
}

pub fn lt(interpreter: &mut Interpreter, call: NativeCall) -> InterpretResult<Value> {
    comparison(interpreter, call, "<", Ordering::is_lt)
}

pub fn lte(interpreter: &mut Interpreter, call: NativeCall) -> InterpretResult<Value> {
    comparison(interpreter, call, "<=", Ordering::is_le)
}

pub fn gt(interpreter: &mut Interpreter, call: NativeCall) -> InterpretResult<Value> {
    comparison(interpreter, call, ">", Ordering::is_gt)
}

pub fn gte(interpreter: &mut Interpreter, call: NativeCall) -> InterpretResult<Value> {
    comparison(interpreter, call, ">=", Ordering::is_ge)
}

/* Str */

pub fn str_len(interpreter: &mut Interpreter, call: NativeCall) -> InterpretResult<Value> {
    let s = string_receiver(interpreter, &call)?;
    Ok(Value::Int(s.chars().count() as i64))
}

pub fn str_add(interpreter: &mut Interpreter, call: NativeCall) -> InterpretResult<Value> {
    let mut s = string_receiver(interpreter, &call)?;
    let rhs = interpreter.stringify(call.argument(0), call.error_info)?;
    s.push_str(&rhs);
    Ok(Value::Str(s))
}

pub fn str_at(interpreter: &mut Interpreter, call: NativeCall) -> InterpretResult<Value> {
    let chars: Vec<char> = string_receiver(interpreter, &call)?.chars().collect();
    let index = int_argument(interpreter, &call, 0)?;
    let i = resolve_index(interpreter, &call, index, chars.len())?;
    Ok(Value::Str(chars[i].to_string()))
}

/* Array */

pub fn array_len(interpreter: &mut Interpreter, call: NativeCall) -> InterpretResult<Value> {
    let array = array_receiver(interpreter, &call)?;
    let len = array.borrow().len();
    Ok(Value::Int(len as i64))
}

pub fn array_at(interpreter: &mut Interpreter, call: NativeCall) -> InterpretResult<Value> {
    let array = array_receiver(interpreter, &call)?;
    let index = int_argument(interpreter, &call, 0)?;
    let len = array.borrow().len();
    let i = resolve_index(interpreter, &call, index, len)?;
    let element = array.borrow()[i].clone();
    Ok(element)
}

pub fn array_set(interpreter: &mut Interpreter, call: NativeCall) -> InterpretResult<Value> {
    let array = array_receiver(interpreter, &call)?;
    let index = int_argument(interpreter, &call, 0)?;
    let len = array.borrow().len();
    let i = resolve_index(interpreter, &call, index, len)?;
    let value = call.argument(1);
    array.borrow_mut()[i] = value.clone();
    Ok(value)
}

pub fn array_append(interpreter: &mut Interpreter, call: NativeCall) -> InterpretResult<Value> {
    let array = array_receiver(interpreter, &call)?;
    array.borrow_mut().push(call.argument(0));
    Ok(Value::Null)
}

pub fn array_clone(interpreter: &mut Interpreter, call: NativeCall) -> InterpretResult<Value> {
    let array = array_receiver(interpreter, &call)?;
    let copy = array.borrow().clone();
    Ok(Value::Array(rcrc(copy)))
}

/// Calls `callback` with each element in turn; the array may grow while this runs.
pub fn array_iterate(interpreter: &mut Interpreter, call: NativeCall) -> InterpretResult<Value> {
    let array = array_receiver(interpreter, &call)?;
    let callback = call.argument(0);
    let mut i = 0;
    loop {
        let element = match array.borrow().get(i) {
            Some(e) => e.clone(),
            None => break,
        };
        interpreter.call_value(callback.clone(), None, vec![element], call.error_info)?;
        i += 1;
    }
    Ok(Value::Null)
}

/* Func */

fn argument_array(interpreter: &mut Interpreter, call: &NativeCall) -> InterpretResult<Vec<Value>> {
    match call.argument(0).extract() {
        Value::Array(a) => Ok(a.borrow().clone()),
        other => Err(interpreter.error(
            ErrorKind::TypeError, call.error_info, format!("Expected an Array of arguments, got {}", other.type_name()),
        )),
    }
}

pub fn func_call(interpreter: &mut Interpreter, call: NativeCall) -> InterpretResult<Value> {
    let function = call.this_value().extract();
    let arguments = argument_array(interpreter, &call)?;
    interpreter.call_value(function, None, arguments, call.error_info)
}

/* Macro */

const MACRO_FUNCTION: &str = "function";

pub fn macro_construct(interpreter: &mut Interpreter, call: NativeCall) -> InterpretResult<Value> {
    let this = receiver(interpreter, &call)?;
    match call.argument(0).extract() {
        f @ (Value::Function(_) | Value::Native(_)) => {
            this.borrow_mut().assign_member(MACRO_FUNCTION, f);
            Ok(Value::Null)
        }
        other => Err(interpreter.error(
            ErrorKind::TypeError, call.error_info, format!("A macro needs a function, got {}", other.type_name()),
        )),
    }
}

/// Runs the macro's function with the macro itself as `self`. A `Str` result is expanded in the
/// caller's scope.
pub fn macro_call(interpreter: &mut Interpreter, call: NativeCall) -> InterpretResult<Value> {
    let this = receiver(interpreter, &call)?;
    let arguments = argument_array(interpreter, &call)?;
    let function = interpreter.member(&this, MACRO_FUNCTION, call.error_info)?;
    let result = interpreter.call_value(function, Some(this), arguments, call.error_info)?;
    match result.extract() {
        Value::Str(source) => interpreter.expand_source(&source, call.error_info),
        _ => Ok(result),
    }
}

fn expand_argument(interpreter: &mut Interpreter, call: &NativeCall, index: usize) -> InterpretResult<Value> {
    match call.argument(index).extract() {
        Value::Str(source) => interpreter.expand_source(&source, call.error_info),
        _ => Err(interpreter.error(
            ErrorKind::MacroExpansionError, call.error_info, "Expected a string for macro expansion",
        )),
    }
}

pub fn macro_expand_member(interpreter: &mut Interpreter, call: NativeCall) -> InterpretResult<Value> {
    expand_argument(interpreter, &call, 0)
}

pub fn macro_expand(interpreter: &mut Interpreter, call: NativeCall) -> InterpretResult<Value> {
    expand_argument(interpreter, &call, 0)
}

/* Free functions */

fn extremum(interpreter: &mut Interpreter, call: NativeCall, name: &str, wanted: Ordering) -> InterpretResult<Value> {
    let candidates = match call.arguments.as_slice() {
        [single] => match single.extract() {
            Value::Array(a) => a.borrow().clone(),
            other => vec![other],
        },
        many => many.to_vec(),
    };
    let mut best: Option<Value> = None;
    for candidate in candidates {
        let candidate = candidate.extract();
        best = Some(match best {
            None => candidate,
            Some(current) => match ordering(&candidate, &current) {
                Some(o) if o == wanted => candidate,
                Some(_) => current,
                None => return Err(interpreter.error(
                    ErrorKind::TypeError,
                    call.error_info,
                    format!("{}: cannot compare {} and {}", name, candidate.type_name(), current.type_name()),
                )),
            },
        });
    }
    match best {
        Some(v) => Ok(v),
        None => Err(interpreter.error(
            ErrorKind::ArgumentError, call.error_info, format!("{} expects at least one value", name),
        )),
    }
}

pub fn max(interpreter: &mut Interpreter, call: NativeCall) -> InterpretResult<Value> {
    extremum(interpreter, call, "max", Ordering::Greater)
}

pub fn min(interpreter: &mut Interpreter, call: NativeCall) -> InterpretResult<Value> {
    extremum(interpreter, call, "min", Ordering::Less)
}

#[cfg(test)]
mod tests {
    use crate::assert_msg_contains;
    use crate::peach::common::error::ErrorKind;
    use crate::peach::interpreted::tests::run_capturing;

    fn printed(program: Vec<&str>) -> String {
        let run = run_capturing(program);
        assert!(run.errors().is_empty(), "{:?}", run.errors());
        run.output
    }

    #[test]
    fn integer_arithmetic_floors() {
        assert_eq!(printed(vec!["print(7 / 2, -7 / 2, 7 % 3, -7 % 3);"]), "3 -4 1 2\n");
    }

    #[test]
    fn mixed_arithmetic_is_float() {
        assert_eq!(printed(vec!["print(1 + 1.5, 2.0 * 2, 3 / 2.0);"]), "2.5 4.0 1.5\n");
    }

    #[test]
    fn division_by_zero_is_a_type_error() {
        let run = run_capturing(vec!["1 / 0;"]);
        assert_eq!(run.errors()[0].kind, ErrorKind::TypeError);
        assert_msg_contains!(run.errors(), "Division by zero");
    }

    #[test]
    fn comparisons_yield_integers() {
        assert_eq!(printed(vec!["print(1 < 2, 2 <= 1, 3 == 3.0, 3 != 4, \"a\" < \"b\");"]), "1 0 1 1 1\n");
    }

    #[test]
    fn comparing_unrelated_types() {
        assert_eq!(printed(vec!["print(1 == \"1\");"]), "0\n");
        let run = run_capturing(vec!["1 < \"1\";"]);
        assert_eq!(run.errors()[0].kind, ErrorKind::TypeError);
    }

    #[test]
    fn logical_operators() {
        assert_eq!(printed(vec!["print(1 && 0, 1 || 0, !0, !\"\", [] || [1]);"]), "0 1 1 1 1\n");
    }

    #[test]
    fn string_members() {
        assert_eq!(
            printed(vec!["let s = \"peach\";", "print(s.len(), s[0], s[-1], s + 1, \"12\".to_int() + 1);"]),
            "5 p h peach1 13\n",
        );
    }

    #[test]
    fn array_members() {
        assert_eq!(
            printed(vec![
                "let xs = [1, 2];",
                "xs.append(3);",
                "xs[0] = 10;",
                "let ys = xs.clone();",
                "ys.append(4);",
                "print(xs, ys.len(), xs[-1]);",
            ]),
            "[10, 2, 3] 4 3\n",
        );
    }

    #[test]
    fn array_index_out_of_range() {
        let run = run_capturing(vec!["[1][3];"]);
        assert_msg_contains!(run.errors(), "out of range");
    }

    #[test]
    fn conversions() {
        assert_eq!(printed(vec!["print(3.9.to_int(), 2.to_float(), Int.new(\"41\") + 1, Str.new(5) + \"!\");"]), "3 2.0 42 5!\n");
    }

    #[test]
    fn extended_types_construct_instances() {
        assert_eq!(
            printed(vec![
                "let Point = Object.extend({",
                "  x = 0;",
                "  y = 0;",
                "  construct = func(self, x, y) { self.x = x; self.y = y; };",
                "  sum = func(self) { return self.x + self.y; };",
                "});",
                "let p: Point = Point.new(3, 4);",
                "print(p.sum(), p.type(), Point.new(1, 1).x);",
            ]),
            "7 <type Point> 1\n",
        );
    }

    #[test]
    fn instances_do_not_share_template_state() {
        assert_eq!(
            printed(vec![
                "let Bag = Object.extend({ items = []; });",
                "let a = Bag.new();",
                "let b = Bag.new();",
                "a.items.append(1);",
                "print(a.items.len(), b.items.len());",
            ]),
            "1 0\n",
        );
    }

    #[test]
    fn satisfies_checks_structure() {
        assert_eq!(
            printed(vec![
                "let Named = { name: Str; };",
                "let ok = { name = \"a\"; other = 1; };",
                "let bad = { name = 5; };",
                "print(ok.satisfies(Named), bad.satisfies(Named));",
            ]),
            "1 0\n",
        );
    }

    #[test]
    fn union_types_accept_either_side() {
        let run = run_capturing(vec!["let x: Int | Str = 1;", "x = \"s\";", "x = 2.5;"]);
        assert_eq!(run.errors().len(), 1);
        assert_eq!(run.errors()[0].kind, ErrorKind::TypeError);
        assert_eq!(run.errors()[0].info.row, 3);
    }

    #[test]
    fn property_types() {
        assert_eq!(
            printed(vec![
                "let I = Int | Str;",
                "print(Int.property(\"nothing\"), I.to_str());",
            ]),
            "null <type Int | Str>\n",
        );
    }

    #[test]
    fn patch_copies_members() {
        assert_eq!(printed(vec!["let a = { x = 1; };", "a.patch({ y = 2; });", "print(a.x + a.y);"]), "3\n");
    }

    #[test]
    fn operator_overloads_go_through_members() {
        assert_eq!(
            printed(vec![
                "let V = Object.extend({",
                "  n = 0;",
                "  construct = func(self, n) { self.n = n; };",
                "  add = func(self, other) { print(\"adding\"); return V.new(self.n + other.n); };",
                "});",
                "print((V.new(1) + V.new(2)).n);",
            ]),
            "adding\n3\n",
        );
    }

    #[test]
    fn identity_differs_from_equality() {
        assert_eq!(printed(vec!["let a = [1];", "let b = [1];", "print(a <=> a, a <=> b, 1 <=> 1);"]), "1 0 1\n");
    }

    #[test]
    fn bitwise_operators_on_integers() {
        assert_eq!(printed(vec!["print(6 | 1, 6 & 3);"]), "7 2\n");
    }

    #[test]
    fn max_and_min() {
        assert_eq!(printed(vec!["print(max(1, 5, 3), min([4, 2, 8]), max(1, 2.5));"]), "5 2 2.5\n");
        let run = run_capturing(vec!["max();"]);
        assert_eq!(run.errors()[0].kind, ErrorKind::ArgumentError);
    }

    #[test]
    fn func_call_spreads_an_array() {
        assert_eq!(printed(vec!["func f(a, b) { return a * b; }", "print(f.call([6, 7]));"]), "42\n");
    }

    #[test]
    fn objects_with_call_are_callable() {
        assert_eq!(
            printed(vec!["let c = { call = func(self, args) { return args.len(); }; };", "print(c(1, 2, 3));"]),
            "3\n",
        );
    }

    #[test]
    fn macro_expand_requires_a_string() {
        let run = run_capturing(vec!["macro_expand(5);"]);
        assert_eq!(run.errors()[0].kind, ErrorKind::MacroExpansionError);
        assert_msg_contains!(run.errors(), "Expected a string for macro expansion");
    }

    #[test]
    fn macro_expansion_failures_report_the_parse_errors() {
        let run = run_capturing(vec!["macro_expand(\"let = ;\");"]);
        assert_eq!(run.errors()[0].kind, ErrorKind::MacroExpansionError);
        assert_msg_contains!(run.errors(), "Macro expansion failed");
    }
}
