use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::peach::common::utils::RcRc;
use crate::peach::interpreted::interpreter::value::{ObjRef, Value};

/// A declared variable. The value cell is mutated in place, so every holder of the symbol sees
/// assignments.
#[derive(Debug)]
pub struct SymbolInfo {
    pub decltype: Option<ObjRef>,
    value: RefCell<Value>,
}

impl SymbolInfo {
    pub fn new(decltype: Option<ObjRef>) -> Self {
        SymbolInfo { decltype, value: RefCell::new(Value::Null) }
    }

    pub fn value(&self) -> Value { self.value.borrow().clone() }

    pub fn assign_value(&self, value: Value) {
        *self.value.borrow_mut() = value;
    }
}

#[derive(Debug, Default)]
pub struct Scope {
    variables: HashMap<String, Rc<SymbolInfo>>,
    parent: Option<RcRc<Scope>>,
}

impl Scope {
    pub fn new(parent: Option<RcRc<Scope>>) -> Self {
        Scope { variables: HashMap::new(), parent }
    }

    pub fn parent(&self) -> Option<RcRc<Scope>> { self.parent.clone() }

    /// Returns `None` if `name` is already declared in this very frame; shadowing a parent's
    /// binding is fine.
    pub fn declare(&mut self, name: &str, decltype: Option<ObjRef>) -> Option<Rc<SymbolInfo>> {
        if self.variables.contains_key(name) {
            return None;
        }
        let symbol = Rc::new(SymbolInfo::new(decltype));
        self.variables.insert(name.to_owned(), symbol.clone());
        Some(symbol)
    }

    pub fn find(&self, name: &str, local_only: bool) -> Option<Rc<SymbolInfo>> {
        match self.variables.get(name) {
            Some(symbol) => Some(symbol.clone()),
            None if local_only => None,
            None => self.parent.as_ref().and_then(|p| p.borrow().find(name, false)),
        }
    }

    /// Mutates the nearest binding of `name`; false if there is none. Declared types are
    /// checked by the caller.
    pub fn assign(&self, name: &str, value: Value) -> bool {
        match self.find(name, false) {
            Some(symbol) => {
                symbol.assign_value(value);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::peach::common::utils::rcrc;

    use super::*;

    #[test]
    fn redeclaring_in_the_same_frame_fails() {
        let mut scope = Scope::new(None);
        assert!(scope.declare("a", None).is_some());
        assert!(scope.declare("a", None).is_none());
    }

    #[test]
    fn child_frames_shadow_their_parents() {
        let global = rcrc(Scope::new(None));
        global.borrow_mut().declare("a", None).unwrap().assign_value(Value::Int(1));
        let mut child = Scope::new(Some(global.clone()));
        child.declare("a", None).unwrap().assign_value(Value::Int(2));
        assert!(matches!(child.find("a", false).map(|s| s.value()), Some(Value::Int(2))));
        assert!(matches!(global.borrow().find("a", false).map(|s| s.value()), Some(Value::Int(1))));
    }

    #[test]
    fn find_respects_local_only() {
        let global = rcrc(Scope::new(None));
        global.borrow_mut().declare("g", None);
        let child = Scope::new(Some(global));
        assert!(child.find("g", false).is_some());
        assert!(child.find("g", true).is_none());
    }

    #[test]
    fn assignment_is_visible_through_every_holder() {
        let global = rcrc(Scope::new(None));
        let held = global.borrow_mut().declare("x", None).unwrap();
        let child = Scope::new(Some(global));
        assert!(child.assign("x", Value::Int(7)));
        assert!(matches!(held.value(), Value::Int(7)));
        assert!(!child.assign("missing", Value::Null));
    }
}
