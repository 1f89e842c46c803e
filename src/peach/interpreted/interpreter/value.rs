use std::collections::HashSet;
use std::fmt;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

use crate::peach::common::error::ErrorInfo;
use crate::peach::common::utils::{address, RcRc};
use crate::peach::interpreted::ast::FunctionExpression;
use crate::peach::interpreted::interpreter::object::Object;
use crate::peach::interpreted::interpreter::result::InterpretResult;
use crate::peach::interpreted::interpreter::Interpreter;

pub type ObjRef = RcRc<Object>;
pub type ArrayRef = RcRc<Vec<Value>>;

pub type NativeFn = fn(&mut Interpreter, NativeCall) -> InterpretResult<Value>;

#[derive(Clone)]
pub struct NativeFunction {
    pub name: &'static str,
    pub func: NativeFn,
}

impl NativeFunction {
    pub fn new(name: &'static str, func: NativeFn) -> Self { NativeFunction { name, func } }
}

impl Debug for NativeFunction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<native {}>", self.name)
    }
}

/// What a native function is handed: the receiver for member-style calls, the evaluated
/// arguments (splats already expanded), and where it was called from.
#[derive(Debug)]
pub struct NativeCall {
    pub this: Option<ObjRef>,
    pub arguments: Vec<Value>,
    pub error_info: ErrorInfo,
}

impl NativeCall {
    pub fn argument(&self, index: usize) -> Value {
        self.arguments.get(index).cloned().unwrap_or(Value::Null)
    }

    pub fn this_value(&self) -> Value {
        self.this.clone().map(Value::Object).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(ArrayRef),
    Function(Rc<FunctionExpression>),
    Native(NativeFunction),
    Object(ObjRef),
}

pub const VALUE_MEMBER: &str = "_value";

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::Str(_) => "Str",
            Value::Array(_) => "Array",
            Value::Function(_) | Value::Native(_) => "Func",
            Value::Object(_) => "Object",
        }
    }

    pub fn as_object(&self) -> Option<&ObjRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Unwraps boxed scalars all the way down to the raw payload. Objects without a `_value`
    /// member are returned as is.
    pub fn extract(&self) -> Value {
        let mut visited = HashSet::new();
        let mut current = self.clone();
        loop {
            let inner = match &current {
                Value::Object(o) if visited.insert(address(o)) => o.borrow().members.get(VALUE_MEMBER).cloned(),
                _ => None,
            };
            match inner {
                Some(v) => current = v,
                None => return current,
            }
        }
    }

    /// Like `extract`, but stops at the innermost object, keeping its identity and other members.
    pub fn extract_basicvalue(&self) -> Value {
        let mut visited = HashSet::new();
        let mut current = self.clone();
        loop {
            let inner = match &current {
                Value::Object(o) if visited.insert(address(o)) => o.borrow().members.get(VALUE_MEMBER).cloned(),
                _ => None,
            };
            match inner {
                Some(v @ Value::Object(_)) => current = v,
                _ => return current,
            }
        }
    }

    /// Identity: same scalar, or the very same array/object/function.
    pub fn identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => a.name == b.name,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Raw rendering, without dispatching to any `to_str` member.
    pub fn stringify(&self) -> String {
        match self {
            Value::Null => "null".to_owned(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => format_float(*f),
            Value::Str(s) => s.to_owned(),
            Value::Array(a) => format!(
                "[{}]",
                a.borrow().iter().map(Value::repr).collect::<Vec<_>>().join(", "),
            ),
            Value::Function(f) => format!(
                "<func({})>",
                f.arguments.arguments.iter().map(|a| a.name.as_str()).collect::<Vec<_>>().join(", "),
            ),
            Value::Native(n) => format!("<native {}>", n.name),
            Value::Object(o) => match o.borrow().type_name() {
                Some(name) => format!("<type {}>", name),
                None => "<object>".to_owned(),
            },
        }
    }

    // Strings are quoted when shown inside a container.
    pub fn repr(&self) -> String {
        match self.extract() {
            Value::Str(s) => format!("\"{}\"", s),
            Value::Object(o) if !o.borrow().is_type() => "<object>".to_owned(),
            other => other.stringify(),
        }
    }
}

pub fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 {
        format!("{:.1}", f)
    } else {
        f.to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use crate::peach::common::utils::rcrc;

    use super::*;

    fn boxed(value: Value) -> Value {
        let mut members = HashMap::new();
        members.insert(VALUE_MEMBER.to_owned(), value);
        Value::Object(rcrc(Object::new(None, members)))
    }

    #[test]
    fn extract_unwraps_nested_boxes() {
        let value = boxed(boxed(Value::Int(3)));
        assert!(matches!(value.extract(), Value::Int(3)));
    }

    #[test]
    fn extract_basicvalue_stops_at_the_innermost_object() {
        let inner = boxed(Value::Int(3));
        let value = boxed(inner.clone());
        assert!(value.extract_basicvalue().identical(&inner));
    }

    #[test]
    fn extract_terminates_on_self_reference() {
        let object = rcrc(Object::new(None, HashMap::new()));
        object.borrow_mut().members.insert(VALUE_MEMBER.to_owned(), Value::Object(object.clone()));
        assert!(matches!(Value::Object(object.clone()).extract(), Value::Object(_)));
        // Break the cycle so the test doesn't leak.
        object.borrow_mut().members.clear();
    }

    #[test]
    fn stringify_scalars_and_arrays() {
        assert_eq!(Value::Float(2.0).stringify(), "2.0");
        assert_eq!(Value::Float(2.5).stringify(), "2.5");
        let array = Value::Array(rcrc(vec![Value::Int(1), Value::Str("a".to_owned()), Value::Null]));
        assert_eq!(array.stringify(), "[1, \"a\", null]");
    }
}
