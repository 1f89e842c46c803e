use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fmt::{Debug, Formatter};

use crate::peach::common::utils::{address, rcrc};
use crate::peach::interpreted::interpreter::value::{ArrayRef, ObjRef, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo {
    pub name: String,
    /// Nominative types only ever equal types of the same name.
    pub nominative: bool,
}

#[derive(Debug, Clone)]
pub enum ObjectKind {
    Plain,
    Type(TypeInfo),
    // Satisfied by either side.
    Union(ObjRef, ObjRef),
}

pub struct Object {
    pub members: HashMap<String, Value>,
    pub parent: Option<ObjRef>,
    pub kind: ObjectKind,
}

// Object graphs are cyclic by construction, so only the local shape is printed.
impl Debug for Object {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.members.keys().collect();
        names.sort();
        f.debug_struct("Object")
            .field("kind", &self.type_name())
            .field("members", &names)
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

impl Object {
    pub fn new(parent: Option<ObjRef>, members: HashMap<String, Value>) -> Self {
        Object { members, parent, kind: ObjectKind::Plain }
    }

    pub fn new_type<S: Into<String>>(
        name: S, parent: Option<ObjRef>, members: HashMap<String, Value>, nominative: bool,
    ) -> Self {
        Object { members, parent, kind: ObjectKind::Type(TypeInfo { name: name.into(), nominative }) }
    }

    pub fn union(lhs: ObjRef, rhs: ObjRef) -> Self {
        Object { members: HashMap::new(), parent: None, kind: ObjectKind::Union(lhs, rhs) }
    }

    pub fn is_type(&self) -> bool {
        !matches!(self.kind, ObjectKind::Plain)
    }

    pub fn type_name(&self) -> Option<String> {
        match &self.kind {
            ObjectKind::Plain => None,
            ObjectKind::Type(info) => Some(info.name.to_owned()),
            ObjectKind::Union(l, r) => Some(format!(
                "{} | {}",
                l.borrow().type_name().unwrap_or_default(),
                r.borrow().type_name().unwrap_or_default(),
            )),
        }
    }

    /// Anonymous types pick up the name of the first variable they're bound to.
    pub fn name_if_anonymous(&mut self, name: &str) {
        if let ObjectKind::Type(info) = &mut self.kind {
            if info.name.is_empty() {
                info.name = name.to_owned();
            }
        }
    }

    pub fn assign_member<S: Into<String>>(&mut self, name: S, value: Value) {
        self.members.insert(name.into(), value);
    }
}

pub fn lookup_member(object: &ObjRef, name: &str) -> Option<Value> {
    lookup_member_where(object, name, |_| true)
}

/// Walks the parent chain for the first member called `name` that `accept`s. A parent chain
/// that loops back on itself ends the walk instead of spinning.
pub fn lookup_member_where<F>(object: &ObjRef, name: &str, mut accept: F) -> Option<Value>
    where F: FnMut(&Value) -> bool
{
    let mut visited = HashSet::new();
    let mut current = Some(object.clone());
    while let Some(obj) = current {
        if !visited.insert(address(&obj)) {
            return None;
        }
        let (member, parent) = {
            let borrowed = obj.borrow();
            (borrowed.members.get(name).cloned(), borrowed.parent.clone())
        };
        if let Some(m) = member {
            if accept(&m) {
                return Some(m);
            }
        }
        current = parent;
    }
    None
}

#[derive(Default)]
struct CloneState {
    objects: HashMap<usize, ObjRef>,
    arrays: HashMap<usize, ArrayRef>,
}

/// Deep copy of an object's members; types, functions and the parent link are shared.
pub fn clone_object(object: &ObjRef, parent_override: Option<ObjRef>) -> ObjRef {
    let result = clone_object_go(object, &mut CloneState::default());
    if let Some(parent) = parent_override {
        result.borrow_mut().parent = Some(parent);
    }
    result
}

fn clone_object_go(object: &ObjRef, state: &mut CloneState) -> ObjRef {
    if let Some(done) = state.objects.get(&address(object)) {
        return done.clone();
    }
    let (members, parent, kind) = {
        let borrowed = object.borrow();
        (borrowed.members.clone(), borrowed.parent.clone(), borrowed.kind.clone())
    };
    let result = rcrc(Object { members: HashMap::new(), parent, kind });
    state.objects.insert(address(object), result.clone());
    let members = members.into_iter().map(|(k, v)| (k, clone_value(&v, state))).collect();
    result.borrow_mut().members = members;
    result
}

fn clone_value(value: &Value, state: &mut CloneState) -> Value {
    match value {
        Value::Object(o) if !o.borrow().is_type() => Value::Object(clone_object_go(o, state)),
        Value::Array(a) => {
            if let Some(done) = state.arrays.get(&address(a)) {
                return Value::Array(done.clone());
            }
            let result = rcrc(Vec::new());
            state.arrays.insert(address(a), result.clone());
            let elements: Vec<Value> = a.borrow().clone();
            *result.borrow_mut() = elements.iter().map(|v| clone_value(v, state)).collect();
            Value::Array(result)
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object_with(parent: Option<ObjRef>, members: Vec<(&str, Value)>) -> ObjRef {
        rcrc(Object::new(parent, members.into_iter().map(|(k, v)| (k.to_owned(), v)).collect()))
    }

    #[test]
    fn lookup_walks_the_parent_chain() {
        let grandparent = object_with(None, vec![("x", Value::Int(1))]);
        let parent = object_with(Some(grandparent), vec![("y", Value::Int(2))]);
        let child = object_with(Some(parent), vec![]);
        assert!(matches!(lookup_member(&child, "x"), Some(Value::Int(1))));
        assert!(matches!(lookup_member(&child, "y"), Some(Value::Int(2))));
        assert!(lookup_member(&child, "z").is_none());
    }

    #[test]
    fn lookup_terminates_on_a_parent_cycle() {
        let a = object_with(None, vec![("a", Value::Int(1))]);
        let b = object_with(Some(a.clone()), vec![]);
        a.borrow_mut().parent = Some(b.clone());
        assert!(lookup_member(&a, "missing").is_none());
        assert!(matches!(lookup_member(&b, "a"), Some(Value::Int(1))));
        a.borrow_mut().parent = None;
    }

    #[test]
    fn filtered_lookup_skips_to_the_parent() {
        let parent = object_with(None, vec![("x", Value::Int(1))]);
        let child = object_with(Some(parent), vec![("x", Value::Str("no".to_owned()))]);
        let found = lookup_member_where(&child, "x", |v| matches!(v, Value::Int(_)));
        assert!(matches!(found, Some(Value::Int(1))));
    }

    #[test]
    fn clone_is_deep_and_overrides_the_parent() {
        let nested = object_with(None, vec![("n", Value::Int(1))]);
        let array = Value::Array(rcrc(vec![Value::Int(5)]));
        let original = object_with(None, vec![("nested", Value::Object(nested.clone())), ("xs", array)]);
        let new_parent = object_with(None, vec![]);
        let copy = clone_object(&original, Some(new_parent.clone()));

        let copied_nested = lookup_member(&copy, "nested").and_then(|v| v.as_object().cloned()).unwrap();
        assert!(!std::rc::Rc::ptr_eq(&copied_nested, &nested));
        copied_nested.borrow_mut().assign_member("n", Value::Int(2));
        assert!(matches!(lookup_member(&nested, "n"), Some(Value::Int(1))));

        match (lookup_member(&copy, "xs"), lookup_member(&original, "xs")) {
            (Some(Value::Array(a)), Some(Value::Array(b))) => assert!(!std::rc::Rc::ptr_eq(&a, &b)),
            other => panic!("Expected arrays, got {:?}", other),
        }
        assert!(std::rc::Rc::ptr_eq(copy.borrow().parent.as_ref().unwrap(), &new_parent));
    }

    #[test]
    fn clone_preserves_internal_sharing() {
        let shared = object_with(None, vec![]);
        let original = object_with(None, vec![
            ("a", Value::Object(shared.clone())),
            ("b", Value::Object(shared)),
        ]);
        let copy = clone_object(&original, None);
        let a = lookup_member(&copy, "a").unwrap();
        let b = lookup_member(&copy, "b").unwrap();
        assert!(a.identical(&b));
    }

    #[test]
    fn anonymous_types_take_a_name_once() {
        let mut t = Object::new_type("", None, HashMap::new(), false);
        t.name_if_anonymous("Point");
        t.name_if_anonymous("Other");
        assert_eq!(t.type_name(), Some("Point".to_owned()));
    }
}
