use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use option_ext::OptionExt;

use crate::peach::common::utils::{address, rcrc};
use crate::peach::interpreted::interpreter::object::{lookup_member_where, Object, ObjectKind};
use crate::peach::interpreted::interpreter::value::{ObjRef, Value};

/// Maps runtime values to the type objects describing them.
pub trait TypeResolver {
    fn runtime_type(&self, value: &Value) -> Option<ObjRef>;
}

/// The type a member stands for: type-valued members are their own type, anything else is typed
/// by its runtime value.
pub fn member_type(value: &Value, resolver: &dyn TypeResolver) -> Option<ObjRef> {
    match value {
        Value::Object(o) if o.borrow().is_type() => Some(o.clone()),
        other => resolver.runtime_type(other),
    }
}

pub fn compare_types(declared: &ObjRef, actual: &ObjRef, resolver: &dyn TypeResolver) -> bool {
    compare_go(declared, actual, resolver, &mut HashSet::new())
}

fn compare_go(
    a: &ObjRef, b: &ObjRef, resolver: &dyn TypeResolver, visited: &mut HashSet<(usize, usize)>,
) -> bool {
    if Rc::ptr_eq(a, b) {
        return true;
    }
    // A pair already under comparison is assumed equal; any real difference shows up elsewhere.
    if !visited.insert((address(a), address(b))) {
        return true;
    }
    let a_kind = a.borrow().kind.clone();
    let b_kind = b.borrow().kind.clone();
    if let ObjectKind::Union(l, r) = &a_kind {
        return compare_go(l, b, resolver, visited) || compare_go(r, b, resolver, visited);
    }
    if let ObjectKind::Union(l, r) = &b_kind {
        return compare_go(a, l, resolver, visited) && compare_go(a, r, resolver, visited);
    }
    if let (ObjectKind::Type(ai), ObjectKind::Type(bi)) = (&a_kind, &b_kind) {
        if ai.nominative || bi.nominative {
            return ai.nominative == bi.nominative && ai.name == bi.name;
        }
    }

    let (a_parent, a_members) = {
        let borrowed = a.borrow();
        (borrowed.parent.clone(), borrowed.members.clone())
    };
    let (b_parent, b_members) = {
        let borrowed = b.borrow();
        (borrowed.parent.clone(), borrowed.members.clone())
    };
    let parents_match = match (&a_parent, &b_parent) {
        (None, None) => true,
        (Some(ap), Some(bp)) => compare_go(ap, bp, resolver, visited),
        _ => false,
    };
    parents_match && members_match(&a_members, &b_members, resolver, visited)
}

// Every member `a` declares must be matched in `b`; `b` may have more. Plain objects (such as
// `instance` templates) are compared field by field rather than as values of type `Object`.
fn members_match(
    a_members: &HashMap<String, Value>,
    b_members: &HashMap<String, Value>,
    resolver: &dyn TypeResolver,
    visited: &mut HashSet<(usize, usize)>,
) -> bool {
    a_members.iter().all(|(name, av)| {
        b_members.get(name).map_or2(
            |bv| match (av, bv) {
                (Value::Object(ao), Value::Object(bo)) if !ao.borrow().is_type() && !bo.borrow().is_type() => {
                    if Rc::ptr_eq(ao, bo) || !visited.insert((address(ao), address(bo))) {
                        return true;
                    }
                    let a_fields = ao.borrow().members.clone();
                    let b_fields = bo.borrow().members.clone();
                    members_match(&a_fields, &b_fields, resolver, visited)
                }
                _ => match (member_type(av, resolver), member_type(bv, resolver)) {
                    (Some(at), Some(bt)) => compare_go(&at, &bt, resolver, visited),
                    _ => false,
                },
            },
            false,
        )
    })
}

/// Whether `object` has every member `required` declares (each of a fitting type), and satisfies
/// the required type's parent as well.
pub fn satisfies_type(object: &ObjRef, required: &ObjRef, resolver: &dyn TypeResolver) -> bool {
    satisfies_go(object, required, resolver, &mut HashSet::new())
}

fn satisfies_go(
    object: &ObjRef, required: &ObjRef, resolver: &dyn TypeResolver, visited: &mut HashSet<(usize, usize)>,
) -> bool {
    if !visited.insert((address(object), address(required))) || inherits_from(object, required) {
        return true;
    }
    let (kind, members, parent) = {
        let borrowed = required.borrow();
        (borrowed.kind.clone(), borrowed.members.clone(), borrowed.parent.clone())
    };
    if let ObjectKind::Union(l, r) = kind {
        return satisfies_go(object, &l, resolver, visited) || satisfies_go(object, &r, resolver, visited);
    }
    let members_satisfied = members.iter().all(|(name, declared)| {
        let member_required = member_type(declared, resolver);
        lookup_member_where(object, name, |candidate| match &member_required {
            Some(t) => value_satisfies_go(candidate, t, resolver, visited),
            None => true,
        }).is_some()
    });
    members_satisfied && parent.map_or2(|p| satisfies_go(object, &p, resolver, visited), true)
}

// An object trivially satisfies anything on its own parent chain.
fn inherits_from(object: &ObjRef, ancestor: &ObjRef) -> bool {
    let mut visited = HashSet::new();
    let mut current = Some(object.clone());
    while let Some(obj) = current {
        if Rc::ptr_eq(&obj, ancestor) {
            return true;
        }
        if !visited.insert(address(&obj)) {
            return false;
        }
        current = obj.borrow().parent.clone();
    }
    false
}

fn value_satisfies_go(
    value: &Value, required: &ObjRef, resolver: &dyn TypeResolver, visited: &mut HashSet<(usize, usize)>,
) -> bool {
    match value {
        Value::Object(o) if !o.borrow().is_type() => satisfies_go(o, required, resolver, visited),
        other => resolver.runtime_type(other).map_or2(|t| compare_types(required, &t, resolver), false),
    }
}

/// The type of the member `name` under `ty`; for unions, the union of both sides where both have it.
pub fn property_type(ty: &ObjRef, name: &str, resolver: &dyn TypeResolver) -> Option<ObjRef> {
    let kind = ty.borrow().kind.clone();
    match kind {
        ObjectKind::Union(l, r) => match (property_type(&l, name, resolver), property_type(&r, name, resolver)) {
            (Some(a), Some(b)) => Some(rcrc(Object::union(a, b))),
            (Some(a), None) | (None, Some(a)) => Some(a),
            (None, None) => None,
        },
        _ => {
            let member = ty.borrow().members.get(name).cloned();
            member.and_then(|m| member_type(&m, resolver))
        }
    }
}

/// `a & b` on types: a structural type with the members of both, parented like `a`. A member both
/// sides declare with different types becomes a union of the two.
pub fn merge_types(a: &ObjRef, b: &ObjRef, resolver: &dyn TypeResolver) -> Object {
    let (a_members, parent) = {
        let borrowed = a.borrow();
        (borrowed.members.clone(), borrowed.parent.clone())
    };
    let b_members = b.borrow().members.clone();
    let mut members: HashMap<String, Value> = a_members.clone();
    for (name, bv) in b_members {
        let merged = match a_members.get(&name) {
            Some(av) => match (member_type(av, resolver), member_type(&bv, resolver)) {
                (Some(at), Some(bt)) if !compare_types(&at, &bt, resolver) =>
                    Value::Object(rcrc(Object::union(at, bt))),
                _ => av.clone(),
            },
            None => bv,
        };
        members.insert(name, merged);
    }
    let name = format!(
        "{} & {}",
        a.borrow().type_name().unwrap_or_default(),
        b.borrow().type_name().unwrap_or_default(),
    );
    Object::new_type(name, parent, members, false)
}
