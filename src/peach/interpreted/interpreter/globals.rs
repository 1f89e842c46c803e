use std::collections::HashMap;

use crate::peach::common::utils::rcrc;
use crate::peach::interpreted::interpreter::builtins;
use crate::peach::interpreted::interpreter::environment::Scope;
use crate::peach::interpreted::interpreter::object::Object;
use crate::peach::interpreted::interpreter::value::{NativeFn, NativeFunction, ObjRef, Value, VALUE_MEMBER};

type Members = &'static [(&'static str, NativeFn)];

const OBJECT_MEMBERS: Members = &[
    ("new", builtins::object_new),
    ("type", builtins::object_type),
    ("to_str", builtins::to_str),
    ("extend", builtins::extend),
    ("patch", builtins::patch),
    ("satisfies", builtins::satisfies),
    ("compare", builtins::compare),
    ("not", builtins::not),
    ("bool", builtins::object_bool),
    ("and", builtins::and),
    ("or", builtins::or),
];

const TYPE_MEMBERS: Members = &[
    ("extend", builtins::extend),
    ("to_str", builtins::to_str),
    ("property", builtins::property),
];

const NUM_MEMBERS: Members = &[
    ("construct", builtins::scalar_construct),
    ("add", builtins::num_add),
    ("sub", builtins::num_sub),
    ("mul", builtins::num_mul),
    ("div", builtins::num_div),
    ("mod", builtins::num_mod),
    ("lt", builtins::lt),
    ("lte", builtins::lte),
    ("gt", builtins::gt),
    ("gte", builtins::gte),
    ("compare", builtins::compare),
    ("neg", builtins::num_neg),
    ("pos", builtins::num_pos),
    ("bool", builtins::scalar_bool),
    ("to_int", builtins::to_int),
    ("to_float", builtins::to_float),
    ("to_str", builtins::to_str),
];

const STR_MEMBERS: Members = &[
    ("construct", builtins::scalar_construct),
    ("len", builtins::str_len),
    ("add", builtins::str_add),
    ("at", builtins::str_at),
    ("lt", builtins::lt),
    ("lte", builtins::lte),
    ("gt", builtins::gt),
    ("gte", builtins::gte),
    ("compare", builtins::compare),
    ("bool", builtins::scalar_bool),
    ("to_int", builtins::to_int),
    ("to_float", builtins::to_float),
    ("to_str", builtins::to_str),
];

const SCALAR_MEMBERS: Members = &[
    ("construct", builtins::scalar_construct),
    ("bool", builtins::scalar_bool),
    ("to_str", builtins::to_str),
];

const ARRAY_MEMBERS: Members = &[
    ("construct", builtins::scalar_construct),
    ("len", builtins::array_len),
    ("at", builtins::array_at),
    ("set", builtins::array_set),
    ("append", builtins::array_append),
    ("clone", builtins::array_clone),
    ("iterate", builtins::array_iterate),
    ("bool", builtins::scalar_bool),
    ("to_str", builtins::to_str),
];

const FUNC_MEMBERS: Members = &[
    ("construct", builtins::scalar_construct),
    ("call", builtins::func_call),
    ("to_str", builtins::to_str),
];

const MACRO_MEMBERS: Members = &[
    ("construct", builtins::macro_construct),
    ("call", builtins::macro_call),
    ("expand", builtins::macro_expand_member),
];

const FREE_FUNCTIONS: Members = &[
    ("macro_expand", builtins::macro_expand),
    ("max", builtins::max),
    ("min", builtins::min),
];

fn natives(members: Members) -> HashMap<String, Value> {
    members.iter()
        .map(|(name, func)| (name.to_string(), Value::Native(NativeFunction::new(*name, *func))))
        .collect()
}

fn template(default: Option<Value>) -> Value {
    let members = default.into_iter().map(|v| (VALUE_MEMBER.to_owned(), v)).collect();
    Value::Object(rcrc(Object::new(None, members)))
}

fn core_type(name: &str, parent: &ObjRef, members: Members, default: Option<Value>) -> ObjRef {
    let mut members = natives(members);
    members.insert("instance".to_owned(), template(default));
    rcrc(Object::new_type(name, Some(parent.clone()), members, true))
}

/// Creates the core types and free functions in `scope`. `Type` and `Object` are each other's
/// parent; every other type hangs off `Object`.
pub fn install(scope: &mut Scope) {
    let ty = rcrc(Object::new_type("Type", None, natives(TYPE_MEMBERS), true));
    let mut object_members = natives(OBJECT_MEMBERS);
    object_members.insert("instance".to_owned(), template(None));
    let object = rcrc(Object::new_type("Object", Some(ty.clone()), object_members, true));
    ty.borrow_mut().parent = Some(object.clone());

    let num = rcrc(Object::new_type("Num", Some(object.clone()), natives(NUM_MEMBERS), true));
    let types = vec![
        ("Int", core_type("Int", &num, &[], Some(Value::Int(0)))),
        ("Float", core_type("Float", &num, &[], Some(Value::Float(0.0)))),
        ("Str", core_type("Str", &object, STR_MEMBERS, Some(Value::Str(String::new())))),
        ("Bool", core_type("Bool", &object, SCALAR_MEMBERS, Some(Value::Bool(false)))),
        ("Null", core_type("Null", &object, SCALAR_MEMBERS, Some(Value::Null))),
        ("Array", core_type("Array", &object, ARRAY_MEMBERS, Some(Value::Array(rcrc(Vec::new()))))),
        ("Func", core_type("Func", &object, FUNC_MEMBERS, Some(Value::Null))),
        ("Macro", core_type("Macro", &object, MACRO_MEMBERS, None)),
        ("Num", num),
        ("Object", object),
        ("Type", ty),
    ];
    for (name, value) in types {
        if let Some(symbol) = scope.declare(name, None) {
            symbol.assign_value(Value::Object(value));
        }
    }
    for (name, value) in natives(FREE_FUNCTIONS) {
        if let Some(symbol) = scope.declare(&name, None) {
            symbol.assign_value(value);
        }
    }
}
