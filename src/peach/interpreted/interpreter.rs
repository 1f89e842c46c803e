use std::collections::HashMap;
use std::io::Write;
use std::mem;
use std::rc::Rc;

use either::{Left, Right};
use nonempty::NonEmpty;
use tracing::{debug, trace};

use crate::peach::common::error::{convert_error, Diagnostic, ErrorInfo, ErrorKind, PeachResult};
use crate::peach::common::lexer::{render_tokens, tokenize};
use crate::peach::common::utils::{rcrc, RcRc};
use crate::peach::interpreted::ast::{
    Atom, BinaryOperator, Block, Declaration, Expression, FunctionExpression, Import, Program, Statement,
};
use crate::peach::interpreted::interpreter::environment::{Scope, SymbolInfo};
use crate::peach::interpreted::interpreter::object::{clone_object, lookup_member, Object, ObjectKind};
use crate::peach::interpreted::interpreter::result::InterpreterErrorOrControlFlow::{Error, Returned};
use crate::peach::interpreted::interpreter::result::{InterpretResult, InterpreterErrorOrControlFlow};
use crate::peach::interpreted::interpreter::stack::OperandStack;
use crate::peach::interpreted::interpreter::typing::{compare_types, merge_types, satisfies_type, TypeResolver};
use crate::peach::interpreted::interpreter::value::{NativeCall, NativeFn, NativeFunction, ObjRef, Value};
use crate::peach::interpreted::parser::Parser;

pub mod builtins;
pub mod environment;
pub mod globals;
pub mod io;
pub mod object;
pub mod result;
pub mod stack;
pub mod typing;
pub mod value;

/// Walks the AST. Function bodies run in a scope whose parent is the caller's scope at the time of
/// the call, so free variables resolve dynamically.
pub struct Interpreter {
    global_scope: RcRc<Scope>,
    current_scope: RcRc<Scope>,
    stack: OperandStack,
    error_list: Vec<Diagnostic>,
    // The file diagnostics are attributed to; swapped while evaluating an import.
    source_location: Rc<str>,
    output: Box<dyn Write>,
}

impl TypeResolver for Interpreter {
    fn runtime_type(&self, value: &Value) -> Option<ObjRef> {
        let name = match value {
            Value::Object(o) => {
                let borrowed = o.borrow();
                if borrowed.is_type() {
                    "Type"
                } else {
                    if let Some(parent) = &borrowed.parent {
                        if parent.borrow().is_type() {
                            return Some(parent.clone());
                        }
                    }
                    "Object"
                }
            }
            other => other.type_name(),
        };
        self.global_type(name)
    }
}

fn type_label(ty: &ObjRef) -> String {
    ty.borrow().type_name().unwrap_or_else(|| "<object>".to_owned())
}

impl Interpreter {
    pub fn new(file: Rc<str>) -> Self {
        Interpreter::with_output(file, Box::new(std::io::stdout()))
    }

    pub fn with_output(file: Rc<str>, output: Box<dyn Write>) -> Self {
        let global_scope = rcrc(Scope::new(None));
        globals::install(&mut global_scope.borrow_mut());
        Interpreter {
            current_scope: global_scope.clone(),
            global_scope,
            stack: OperandStack::new(),
            error_list: Vec::new(),
            source_location: file,
            output,
        }
    }

    /// Binds (or rebinds) a native function in the global scope.
    pub fn define_native(&mut self, name: &'static str, func: NativeFn) {
        let native = Value::Native(NativeFunction::new(name, func));
        let mut global = self.global_scope.borrow_mut();
        match global.declare(name, None) {
            Some(symbol) => symbol.assign_value(native),
            None => {
                global.assign(name, native);
            }
        }
    }

    /// Runs every statement, carrying on past failing ones; fails with all diagnostics raised.
    pub fn run(&mut self, program: &Program) -> PeachResult<Value> {
        let mut errors = Vec::new();
        let mut last = Value::Null;
        for statement in &program.statements {
            match self.execute(statement) {
                Ok(v) => last = v,
                Err(es) => errors.extend(es),
            }
        }
        match NonEmpty::from_vec(errors) {
            Some(errors) => Err(errors),
            None => Ok(last),
        }
    }

    /// Evaluates a single top-level statement. A failure aborts just this statement: the scope and
    /// the operand stack are reset so the next one starts clean.
    pub fn execute(&mut self, statement: &Statement) -> PeachResult<Value> {
        self.error_list.clear();
        let height = self.stack.len();
        let result = match self.visit_statement(statement) {
            Err(Returned(info)) => {
                self.stack.pop();
                Err(self.error(ErrorKind::Syntax, info, "Return outside of a function"))
            }
            other => other,
        };
        if result.is_err() {
            self.current_scope = self.global_scope.clone();
            self.stack.unwind_to(height);
        }
        match (result, NonEmpty::from_vec(mem::take(&mut self.error_list))) {
            (_, Some(errors)) => Err(errors),
            (Ok(v), None) => Ok(v),
            (Err(e), None) => convert_error(&self.source_location, Err(e)),
        }
    }

    pub fn stack_depth(&self) -> usize { self.stack.len() }

    pub fn output(&mut self) -> &mut dyn Write { self.output.as_mut() }

    /// Records a diagnostic against the active file, returning the error to raise.
    pub fn error<S: Into<String>>(&mut self, kind: ErrorKind, info: ErrorInfo, message: S) -> InterpreterErrorOrControlFlow {
        let diagnostic = Diagnostic::new(kind, &self.source_location, info, message);
        debug!(%diagnostic, "raising");
        self.error_list.push(diagnostic.clone());
        Error(diagnostic)
    }

    pub fn global_type(&self, name: &str) -> Option<ObjRef> {
        let symbol = self.global_scope.borrow().find(name, true)?;
        match symbol.value() {
            Value::Object(o) if o.borrow().is_type() => Some(o),
            _ => None,
        }
    }

    pub fn lookup_variable(&mut self, name: &str, info: ErrorInfo) -> InterpretResult<Value> {
        let found = self.current_scope.borrow().find(name, false);
        match found {
            Some(symbol) => Ok(symbol.value()),
            None => Err(self.error(ErrorKind::DoesNotExist, info, format!("Referencing undefined variable '{}'", name))),
        }
    }

    fn declare(&mut self, name: &str, decltype: Option<ObjRef>, info: ErrorInfo) -> InterpretResult<Rc<SymbolInfo>> {
        let declared = self.current_scope.borrow_mut().declare(name, decltype);
        declared.ok_or_else(|| {
            self.error(ErrorKind::MultipleDefinition, info, format!("'{}' is already defined in this scope", name))
        })
    }

    fn open_scope(&mut self) {
        self.current_scope = rcrc(Scope::new(Some(self.current_scope.clone())));
    }

    fn close_scope(&mut self, info: ErrorInfo) -> InterpretResult<()> {
        let parent = if Rc::ptr_eq(&self.current_scope, &self.global_scope) {
            None
        } else {
            self.current_scope.borrow().parent()
        };
        match parent {
            Some(p) => {
                self.current_scope = p;
                Ok(())
            }
            None => Err(self.error(ErrorKind::TypeError, info, "Cannot close the global scope")),
        }
    }

    fn visit_statement(&mut self, statement: &Statement) -> InterpretResult<Value> {
        match statement {
            Statement::Expression(e) => self.visit_expression(e),
            Statement::Declare(d) => self.visit_declare(d),
            Statement::Block(b) => self.visit_block(b, true),
            Statement::IfElse { branches, else_block, .. } => {
                for (cond, block) in branches {
                    if self.truthy(cond)? {
                        return self.visit_block(block, true);
                    }
                }
                match else_block {
                    Some(block) => self.visit_block(block, true),
                    None => Ok(Value::Null),
                }
            }
            Statement::While(cond, body, _) => {
                while self.truthy(cond)? {
                    self.visit_block(body, true)?;
                }
                Ok(Value::Null)
            }
            Statement::For { iterable, body, error_info, .. } => {
                let iterable = self.visit_expression(iterable)?;
                self.invoke_method(iterable, "iterate", vec![Value::Function(body.clone())], *error_info)?;
                Ok(Value::Null)
            }
            Statement::Return(e, info) => {
                let value = self.visit_expression(e)?;
                self.stack.push(value);
                Err(Returned(*info))
            }
            Statement::Import(import) => self.visit_import(import),
            Statement::Macro { name, function, error_info } => self.visit_macro(name, function, *error_info),
            Statement::Empty(_) => Ok(Value::Null),
        }
    }

    fn visit_block(&mut self, block: &Block, create_scope: bool) -> InterpretResult<Value> {
        if create_scope {
            self.open_scope();
        }
        for statement in &block.statements {
            self.visit_statement(statement)?;
        }
        if create_scope {
            self.close_scope(block.error_info)?;
        }
        Ok(Value::Null)
    }

    fn visit_declare(&mut self, declaration: &Declaration) -> InterpretResult<Value> {
        let info = declaration.error_info;
        let decltype = match &declaration.type_expr {
            Some(t) => Some(self.evaluate_type(t)?),
            None => None,
        };
        let symbol = self.declare(&declaration.name, decltype.clone(), info)?;
        match &declaration.value {
            Some(expr) => {
                let value = self.visit_expression(expr)?;
                if let Some(t) = &decltype {
                    self.typecheck(&value, t, info)?;
                }
                if let Value::Object(o) = &value {
                    o.borrow_mut().name_if_anonymous(&declaration.name);
                }
                symbol.assign_value(value.clone());
                Ok(value)
            }
            None => Ok(Value::Null),
        }
    }

    fn visit_import(&mut self, import: &Import) -> InterpretResult<Value> {
        debug!(path = %import.path, "evaluating import");
        let previous = mem::replace(&mut self.source_location, import.file.clone());
        let scope = self.current_scope.clone();
        let height = self.stack.len();
        let mut last = Value::Null;
        for statement in &import.statements {
            match self.visit_statement(statement) {
                Ok(v) => last = v,
                // Already recorded; the rest of the file still runs.
                Err(Error(_)) => {
                    self.current_scope = scope.clone();
                    self.stack.unwind_to(height);
                }
                Err(returned) => {
                    self.source_location = previous;
                    return Err(returned);
                }
            }
        }
        self.source_location = previous;
        Ok(last)
    }

    // `macro NAME(ARGS) {BLOCK}` is `let NAME = Macro.new(func(self, ARGS) {BLOCK});`
    fn visit_macro(&mut self, name: &str, function: &Rc<FunctionExpression>, info: ErrorInfo) -> InterpretResult<Value> {
        let macro_type = self.lookup_variable("Macro", info)?;
        let instance = self.invoke_method(macro_type, "new", vec![Value::Function(function.clone())], info)?;
        let symbol = self.declare(name, None, info)?;
        symbol.assign_value(instance.clone());
        Ok(instance)
    }

    fn visit_expression(&mut self, expression: &Expression) -> InterpretResult<Value> {
        match expression {
            Expression::Atomic(atom, _) => Ok(match atom {
                Atom::Int(i) => Value::Int(*i),
                Atom::Float(f) => Value::Float(*f),
                Atom::Str(s) => Value::Str(s.to_owned()),
                Atom::True => Value::Bool(true),
                Atom::False => Value::Bool(false),
                Atom::Null => Value::Null,
            }),
            Expression::Variable(name, info) => self.lookup_variable(name, *info),
            Expression::Unary(op, operand, info) => {
                trace!(operator = op.symbol(), method = op.method(), "desugaring unary operator");
                self.eval_member_call(operand, op.method(), std::iter::empty(), *info)
            }
            Expression::Binary(op, lhs, rhs, info) => match op.method() {
                Some(Left(method)) => {
                    trace!(operator = op.symbol(), method, "desugaring binary operator");
                    self.eval_member_call(lhs, method, [&**rhs], *info)
                }
                Some(Right(method)) => {
                    trace!(operator = op.symbol(), method, "desugaring negated binary operator");
                    let result = self.eval_member_call(lhs, method, [&**rhs], *info)?;
                    self.invoke_method(result, "not", vec![], *info)
                }
                None => {
                    let lhs = self.visit_expression(lhs)?;
                    let rhs = self.visit_expression(rhs)?;
                    self.native_binary(*op, lhs, rhs, *info)
                }
            },
            Expression::Assign(target, value, info) => self.visit_assign(target, value, *info),
            Expression::Call(callee, arguments, info) => match &**callee {
                Expression::Member(target, name, _) => self.eval_member_call(target, name, arguments, *info),
                other => {
                    let function = self.visit_expression(other)?;
                    let arguments = self.evaluate_arguments(arguments)?;
                    self.call_value(function, None, arguments, *info)
                }
            },
            Expression::Member(target, name, info) => {
                let object = self.eval_boxed(target, *info)?;
                self.member(&object, name, *info)
            }
            Expression::Index(target, index, info) => self.eval_member_call(target, "at", [&**index], *info),
            Expression::Function(f) => Ok(Value::Function(f.clone())),
            Expression::Array(elements, _) => {
                let values = elements.iter().map(|e| self.visit_expression(e)).collect::<InterpretResult<Vec<_>>>()?;
                Ok(Value::Array(rcrc(values)))
            }
            Expression::Object(members, _) => self.visit_object(members),
            Expression::Splat(_, info) =>
                Err(self.error(ErrorKind::TypeError, *info, "A splat argument is only allowed in a call")),
            Expression::Mixin(tokens, _) => Ok(Value::Str(render_tokens(tokens))),
        }
    }

    fn visit_assign(&mut self, target: &Expression, value: &Expression, info: ErrorInfo) -> InterpretResult<Value> {
        match target {
            Expression::Variable(name, _) => {
                let value = self.visit_expression(value)?;
                let found = self.current_scope.borrow().find(name, false);
                let symbol = match found {
                    Some(s) => s,
                    None => return Err(self.error(
                        ErrorKind::DoesNotExist, info, format!("Assigning to undeclared variable '{}'", name),
                    )),
                };
                if let Some(t) = &symbol.decltype {
                    self.typecheck(&value, t, info)?;
                }
                symbol.assign_value(value.clone());
                Ok(value)
            }
            // Set directly on the object; never written through to a parent.
            Expression::Member(object, name, _) => {
                let object = self.eval_boxed(object, info)?;
                let value = self.visit_expression(value)?;
                object.borrow_mut().assign_member(name.as_str(), value.clone());
                Ok(value)
            }
            Expression::Index(object, index, _) => self.eval_member_call(object, "set", [&**index, value], info),
            _ => Err(self.error(ErrorKind::TypeError, info, "Invalid assignment target")),
        }
    }

    // Members are declared in a throwaway scope so later members can refer to earlier ones. A
    // literal made only of `name: Type;` members is an anonymous structural type.
    fn visit_object(&mut self, declarations: &[Declaration]) -> InterpretResult<Value> {
        let saved = self.current_scope.clone();
        self.open_scope();
        let members = self.object_members(declarations);
        self.current_scope = saved;
        let members = members?;
        let parent = self.global_type("Object");
        let describes_shape = !declarations.is_empty()
            && declarations.iter().all(|d| d.value.is_none() && d.type_expr.is_some());
        let object = if describes_shape {
            Object::new_type("", parent, members, false)
        } else {
            Object::new(parent, members)
        };
        Ok(Value::Object(rcrc(object)))
    }

    fn object_members(&mut self, declarations: &[Declaration]) -> InterpretResult<HashMap<String, Value>> {
        let mut members = HashMap::new();
        for declaration in declarations {
            let value = match (&declaration.value, &declaration.type_expr) {
                // `name: Type;` describes the member rather than giving it a value.
                (None, Some(t)) => {
                    let ty = self.evaluate_type(t)?;
                    self.declare(&declaration.name, Some(ty.clone()), declaration.error_info)?;
                    Value::Object(ty)
                }
                _ => self.visit_declare(declaration)?,
            };
            members.insert(declaration.name.clone(), value);
        }
        Ok(members)
    }

    fn native_binary(&mut self, op: BinaryOperator, lhs: Value, rhs: Value, info: ErrorInfo) -> InterpretResult<Value> {
        if op == BinaryOperator::Identity {
            let same = lhs.extract_basicvalue().identical(&rhs.extract_basicvalue());
            return Ok(Value::Int(same as i64));
        }
        match (lhs.extract(), rhs.extract()) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(if op == BinaryOperator::BitOr { a | b } else { a & b })),
            (Value::Object(a), Value::Object(b)) if a.borrow().is_type() && b.borrow().is_type() => {
                let combined = if op == BinaryOperator::BitOr {
                    let mut union = Object::union(a, b);
                    union.parent = self.global_type("Type");
                    union
                } else {
                    merge_types(&a, &b, &*self)
                };
                Ok(Value::Object(rcrc(combined)))
            }
            (a, b) => Err(self.error(
                ErrorKind::TypeError,
                info,
                format!("Cannot apply operator '{}' to {} and {}", op.symbol(), a.type_name(), b.type_name()),
            )),
        }
    }

    fn truthy(&mut self, condition: &Expression) -> InterpretResult<bool> {
        let value = self.visit_expression(condition)?;
        self.truthy_value(value, condition.error_info())
    }

    /// Truthiness goes through the value's `bool` member, which must produce an integer.
    pub fn truthy_value(&mut self, value: Value, info: ErrorInfo) -> InterpretResult<bool> {
        let result = self.invoke_method(value, "bool", vec![], info)?;
        match result.extract() {
            Value::Int(i) => Ok(i != 0),
            Value::Bool(b) => Ok(b),
            other => Err(self.error(
                ErrorKind::TypeError,
                info,
                format!("Expected 'bool' to return an integer, got {}", other.type_name()),
            )),
        }
    }

    /// The value's string form, as produced by its `to_str` member.
    pub fn stringify(&mut self, value: Value, info: ErrorInfo) -> InterpretResult<String> {
        let result = self.invoke_method(value, "to_str", vec![], info)?;
        Ok(match result.extract() {
            Value::Str(s) => s,
            other => other.stringify(),
        })
    }

    fn evaluate_type(&mut self, expression: &Expression) -> InterpretResult<ObjRef> {
        match self.visit_expression(expression)? {
            Value::Object(o) if o.borrow().is_type() => Ok(o),
            other => Err(self.error(
                ErrorKind::TypeError,
                expression.error_info(),
                format!("{} is not a type", other.repr()),
            )),
        }
    }

    pub fn typecheck(&mut self, value: &Value, declared: &ObjRef, info: ErrorInfo) -> InterpretResult<()> {
        let actual = match self.runtime_type(value) {
            Some(t) => t,
            None => return Err(self.error(
                ErrorKind::TypeError, info, format!("Cannot resolve the type of {}", value.repr()),
            )),
        };
        if compare_types(declared, &actual, &*self) || self.fits_shape(value, declared, &actual) {
            Ok(())
        } else {
            Err(self.error(
                ErrorKind::TypeError,
                info,
                format!("Expected a value of type {}, got {}", type_label(declared), type_label(&actual)),
            ))
        }
    }

    // Plain object literals have no type of their own beyond `Object`, so they are held to a
    // structural type by their members.
    fn fits_shape(&self, value: &Value, declared: &ObjRef, actual: &ObjRef) -> bool {
        let structural = matches!(&declared.borrow().kind, ObjectKind::Type(info) if !info.nominative);
        let plain = self.global_type("Object").map_or(false, |o| Rc::ptr_eq(&o, actual));
        match value {
            Value::Object(object) if structural && plain => satisfies_type(object, declared, self),
            _ => false,
        }
    }

    fn eval_boxed(&mut self, expression: &Expression, info: ErrorInfo) -> InterpretResult<ObjRef> {
        let value = self.visit_expression(expression)?;
        self.box_value(value, info)
    }

    /// Wraps scalars in an instance of their type, so they can be sent messages.
    pub fn box_value(&mut self, value: Value, info: ErrorInfo) -> InterpretResult<ObjRef> {
        match value {
            Value::Object(o) => Ok(o),
            other => match self.runtime_type(&other) {
                Some(ty) => self.construct(&ty, vec![other], info),
                None => Err(self.error(
                    ErrorKind::TypeError, info, format!("Cannot resolve the type of {}", other.repr()),
                )),
            },
        }
    }

    /// A fresh clone of the type's `instance`, parented by the type, passed through `construct`
    /// if the type has one. The constructor's own result is ignored.
    pub fn construct(&mut self, ty: &ObjRef, arguments: Vec<Value>, info: ErrorInfo) -> InterpretResult<ObjRef> {
        let template = match lookup_member(ty, "instance") {
            Some(Value::Object(t)) => t,
            _ => return Err(self.error(
                ErrorKind::TypeError,
                info,
                format!("{} cannot be constructed because no cloneable 'instance' member exists", type_label(ty)),
            )),
        };
        let instance = clone_object(&template, Some(ty.clone()));
        match lookup_member(ty, "construct") {
            Some(constructor @ Value::Native(_)) | Some(constructor @ Value::Function(_)) => {
                self.call_value(constructor, Some(instance.clone()), arguments, info)?;
            }
            Some(other) => return Err(self.error(
                ErrorKind::TypeError, info, format!("Invalid constructor {}", other.repr()),
            )),
            None => (),
        }
        Ok(instance)
    }

    pub fn member(&mut self, object: &ObjRef, name: &str, info: ErrorInfo) -> InterpretResult<Value> {
        match lookup_member(object, name) {
            Some(v) => Ok(v),
            None => Err(self.error(
                ErrorKind::DoesNotExist,
                info,
                format!("{} has no direct or inherited member '{}'", Value::Object(object.clone()).repr(), name),
            )),
        }
    }

    /// Sends `method` to an already evaluated receiver.
    pub fn invoke_method(&mut self, receiver: Value, method: &str, arguments: Vec<Value>, info: ErrorInfo) -> InterpretResult<Value> {
        let receiver = self.box_value(receiver, info)?;
        let function = self.member(&receiver, method, info)?;
        self.call_value(function, Some(receiver), arguments, info)
    }

    // Operators, indexing and member calls all end up here: the receiver is evaluated and boxed
    // before the arguments.
    fn eval_member_call<'a, I>(&mut self, target: &Expression, method: &str, arguments: I, info: ErrorInfo) -> InterpretResult<Value>
        where I: IntoIterator<Item=&'a Expression>
    {
        let receiver = self.eval_boxed(target, info)?;
        let function = self.member(&receiver, method, info)?;
        let arguments = self.evaluate_arguments(arguments)?;
        self.call_value(function, Some(receiver), arguments, info)
    }

    fn evaluate_arguments<'a, I>(&mut self, arguments: I) -> InterpretResult<Vec<Value>>
        where I: IntoIterator<Item=&'a Expression>
    {
        let mut values = Vec::new();
        for argument in arguments {
            match argument {
                Expression::Splat(inner, info) => match self.visit_expression(inner)?.extract() {
                    Value::Array(a) => values.extend(a.borrow().iter().cloned()),
                    other => return Err(self.error(
                        ErrorKind::TypeError, *info, format!("Cannot splat a value of type {}", other.type_name()),
                    )),
                },
                other => values.push(self.visit_expression(other)?),
            }
        }
        Ok(values)
    }

    /// Calls anything callable. Objects that aren't functions are sent `call` with their
    /// arguments packed into a single array.
    pub fn call_value(&mut self, function: Value, this: Option<ObjRef>, arguments: Vec<Value>, info: ErrorInfo) -> InterpretResult<Value> {
        match function {
            Value::Native(native) => {
                trace!(native = native.name, arguments = arguments.len(), "calling native");
                (native.func)(self, NativeCall { this, arguments, error_info: info })
            }
            Value::Function(f) => self.call_function(&f, this, arguments, info),
            Value::Object(object) => match lookup_member(&object, "call") {
                Some(call) => self.call_value(call, Some(object), vec![Value::Array(rcrc(arguments))], info),
                None => Err(self.error(
                    ErrorKind::TypeError,
                    info,
                    format!("{} is not callable", Value::Object(object.clone()).repr()),
                )),
            },
            other => {
                let boxed = self.box_value(other, info)?;
                self.call_value(Value::Object(boxed), this, arguments, info)
            }
        }
    }

    fn call_function(
        &mut self, function: &FunctionExpression, this: Option<ObjRef>, arguments: Vec<Value>, info: ErrorInfo,
    ) -> InterpretResult<Value> {
        let mut bound = Vec::with_capacity(arguments.len() + 1);
        if let Some(this) = this {
            bound.push(Value::Object(this));
        }
        bound.extend(arguments);
        let declared = &function.arguments;
        if !declared.accepts(bound.len()) {
            return Err(self.error(
                ErrorKind::ArgumentError,
                info,
                format!(
                    "Expected {}{} argument(s), got {}",
                    if declared.splat.is_some() { "at least " } else { "" },
                    declared.arguments.len(),
                    bound.len(),
                ),
            ));
        }
        let types = self.argument_types(function, &bound, info)?;
        let height = self.stack.len();
        let count = bound.len();
        for value in bound {
            self.stack.push(value);
        }
        self.invoke(function, count, types, height, info)
    }

    // Typed parameters are checked against the caller-side values, before anything is pushed.
    fn argument_types(&mut self, function: &FunctionExpression, bound: &[Value], info: ErrorInfo) -> InterpretResult<Vec<Option<ObjRef>>> {
        let mut types = Vec::with_capacity(function.arguments.arguments.len());
        for (argument, value) in function.arguments.arguments.iter().zip(bound) {
            let ty = match &argument.type_expr {
                Some(t) => {
                    let ty = self.evaluate_type(t)?;
                    self.typecheck(value, &ty, info)?;
                    Some(ty)
                }
                None => None,
            };
            types.push(ty);
        }
        if let Some(splat) = &function.arguments.splat {
            if let Some(t) = &splat.type_expr {
                let ty = self.evaluate_type(t)?;
                for value in &bound[types.len()..] {
                    self.typecheck(value, &ty, info)?;
                }
            }
        }
        Ok(types)
    }

    fn invoke(
        &mut self, function: &FunctionExpression, count: usize, types: Vec<Option<ObjRef>>, height: usize, info: ErrorInfo,
    ) -> InterpretResult<Value> {
        let caller_scope = self.current_scope.clone();
        self.open_scope();
        let function_scope = self.current_scope.clone();
        debug!(arguments = count, stack_height = height, "entering function");
        let outcome = self.bind_arguments(function, count, types, info)
            .and_then(|_| self.visit_block(&function.body, false));
        match outcome {
            Ok(_) => {
                self.close_scope(info)?;
                self.stack.push(Value::Int(0));
            }
            Err(Returned(_)) => {
                while !Rc::ptr_eq(&self.current_scope, &function_scope) {
                    self.close_scope(info)?;
                }
                self.close_scope(info)?;
            }
            Err(e) => {
                self.current_scope = caller_scope;
                self.stack.unwind_to(height);
                return Err(e);
            }
        }
        let result = self.pop_operand(info)?;
        debug_assert_eq!(self.stack.len(), height, "unbalanced operand stack");
        Ok(result)
    }

    // Arguments were pushed first to last, so they come off last to first.
    fn bind_arguments(
        &mut self, function: &FunctionExpression, count: usize, types: Vec<Option<ObjRef>>, info: ErrorInfo,
    ) -> InterpretResult<()> {
        let fixed = function.arguments.arguments.len();
        if let Some(splat) = &function.arguments.splat {
            let mut rest = Vec::with_capacity(count - fixed);
            for _ in fixed..count {
                rest.push(self.pop_operand(info)?);
            }
            rest.reverse();
            let symbol = self.declare(&splat.name, None, splat.error_info)?;
            symbol.assign_value(Value::Array(rcrc(rest)));
        }
        for (argument, decltype) in function.arguments.arguments.iter().zip(types).rev() {
            let value = self.pop_operand(info)?;
            let symbol = self.declare(&argument.name, decltype, argument.error_info)?;
            symbol.assign_value(value);
        }
        Ok(())
    }

    fn pop_operand(&mut self, info: ErrorInfo) -> InterpretResult<Value> {
        match self.stack.pop() {
            Some(v) => Ok(v),
            None => Err(self.error(ErrorKind::TypeError, info, "Operand stack underflow")),
        }
    }

    /// Scans, parses and runs `source` right here, in the current scope, so whatever it declares
    /// stays visible to the caller. Yields the value of the last statement.
    pub fn expand_source(&mut self, source: &str, info: ErrorInfo) -> InterpretResult<Value> {
        debug!(source, "expanding macro");
        let output = Parser::new(tokenize(source), self.source_location.clone()).parse();
        if !output.error_list.is_empty() {
            let details = output.error_list.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("\n\t");
            return Err(self.error(ErrorKind::MacroExpansionError, info, format!("Macro expansion failed:\n\t{}", details)));
        }
        let mut last = Value::Null;
        for statement in &output.program.statements {
            last = self.visit_statement(statement)?;
        }
        Ok(last)
    }
}

#[cfg(test)]
mod tests {
    use crate::assert_msg_contains;
    use crate::peach::interpreted::tests::run_capturing;

    use super::*;

    #[test]
    fn integer_literals_round_trip() {
        for n in [0i64, 1, 42, -7, 1_000_000_007, i64::MAX] {
            let line = format!("{};", n);
            let run = run_capturing(vec![line.as_str()]);
            assert!(matches!(run.last_value(), Value::Int(v) if v == n), "literal {}", n);
        }
    }

    #[test]
    fn typed_assignment_is_checked_and_leaves_the_value_alone() {
        let run = run_capturing(vec!["let x: Int = 5;", "x = \"s\";", "print(x);"]);
        let errors = run.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::TypeError);
        assert_eq!(errors[0].info.row, 2);
        assert_eq!(run.output, "5\n");
    }

    #[test]
    fn redeclaration_in_one_frame_fails_but_nested_shadowing_is_fine() {
        let run = run_capturing(vec!["let a = 1;", "let a = 2;"]);
        assert_eq!(run.errors().len(), 1);
        assert_eq!(run.errors()[0].kind, ErrorKind::MultipleDefinition);

        let run = run_capturing(vec!["let a = 1;", "{ let a = 2; print(a); }", "print(a);"]);
        assert!(run.errors().is_empty(), "{:?}", run.errors());
        assert_eq!(run.output, "2\n1\n");
    }

    #[test]
    fn lookup_through_a_circular_parent_chain_terminates() {
        let mut run = run_capturing(vec![]);
        let a = rcrc(Object::new(None, HashMap::new()));
        let b = rcrc(Object::new(Some(a.clone()), HashMap::new()));
        a.borrow_mut().parent = Some(b.clone());
        let result = run.interpreter.member(&a, "missing", ErrorInfo::new(1, 1));
        assert!(matches!(result, Err(Error(Diagnostic { kind: ErrorKind::DoesNotExist, .. }))));
        a.borrow_mut().parent = None;
    }

    #[test]
    fn arguments_bind_in_declaration_order() {
        let run = run_capturing(vec!["func f(a, b) { return a - b; }", "f(10, 3);"]);
        assert!(matches!(run.last_value(), Value::Int(7)));
        assert_eq!(run.interpreter.stack_depth(), 0);
    }

    #[test]
    fn functions_without_return_yield_zero() {
        let run = run_capturing(vec!["func f() { let unused = 1; }", "f();"]);
        assert!(matches!(run.last_value(), Value::Int(0)));
    }

    #[test]
    fn return_unwinds_nested_blocks() {
        let run = run_capturing(vec![
            "func f(n) { while 1 { if n > 2 { { return n * 10; } } n = n + 1; } }",
            "print(f(0));",
            "let after = 5;",
            "print(after);",
        ]);
        assert!(run.errors().is_empty(), "{:?}", run.errors());
        assert_eq!(run.output, "30\n5\n");
        assert_eq!(run.interpreter.stack_depth(), 0);
    }

    #[test]
    fn arity_is_checked_after_splat_expansion() {
        let run = run_capturing(vec!["func f(a, b) { return a + b; }", "let xs = [1, 2];", "f(*xs);"]);
        assert!(matches!(run.last_value(), Value::Int(3)));

        let run = run_capturing(vec!["func f(a, b) { return a + b; }", "f(1, *[2, 3]);"]);
        assert_eq!(run.errors()[0].kind, ErrorKind::ArgumentError);
        assert_eq!(run.interpreter.stack_depth(), 0);
    }

    #[test]
    fn variadic_parameters_collect_the_rest() {
        let run = run_capturing(vec!["func f(a, *rest) { return rest.len() * 100 + a; }", "f(7, 1, 2, 3);"]);
        assert!(matches!(run.last_value(), Value::Int(307)));
    }

    #[test]
    fn typed_parameters_are_checked() {
        let run = run_capturing(vec!["func f(a: Int) { return a; }", "f(\"nope\");", "f(4);"]);
        assert_eq!(run.errors().len(), 1);
        assert_eq!(run.errors()[0].kind, ErrorKind::TypeError);
        assert!(matches!(run.last_value(), Value::Int(4)));
        assert_eq!(run.interpreter.stack_depth(), 0);
    }

    #[test]
    fn scoping_is_dynamic() {
        let run = run_capturing(vec![
            "func show() { return level; }",
            "func outer() { let level = 2; return show(); }",
            "print(outer());",
        ]);
        assert!(run.errors().is_empty(), "{:?}", run.errors());
        assert_eq!(run.output, "2\n");
    }

    #[test]
    fn failed_statements_leave_the_stack_balanced() {
        let run = run_capturing(vec![
            "func bad(a) { return a + undefined_thing; }",
            "bad(1);",
            "func good(a, b) { return a * b; }",
            "print(good(6, 7));",
        ]);
        assert_eq!(run.errors().len(), 1);
        assert_eq!(run.errors()[0].kind, ErrorKind::DoesNotExist);
        assert_eq!(run.output, "42\n");
        assert_eq!(run.interpreter.stack_depth(), 0);
    }

    #[test]
    fn top_level_return_is_an_error() {
        let run = run_capturing(vec!["return 1;", "print(2);"]);
        assert_msg_contains!(run.errors(), "Return outside of a function");
        assert_eq!(run.output, "2\n");
        assert_eq!(run.interpreter.stack_depth(), 0);
    }

    #[test]
    fn calling_a_non_callable_is_a_type_error() {
        let run = run_capturing(vec!["let x = 5;", "x(1);"]);
        assert_eq!(run.errors()[0].kind, ErrorKind::TypeError);
        assert_msg_contains!(run.errors(), "is not callable");
    }

    #[test]
    fn undefined_variables_do_not_exist() {
        let run = run_capturing(vec!["nope;"]);
        assert_eq!(run.errors()[0].kind, ErrorKind::DoesNotExist);
        assert_eq!(run.errors()[0].to_string(), "<test>:1:1: DoesNotExist error: Referencing undefined variable 'nope'");
    }

    #[test]
    fn boxing_fails_when_a_core_type_is_shadowed_by_a_non_type() {
        let run = run_capturing(vec!["Int = 3;", "5.to_str();"]);
        assert_eq!(run.errors().len(), 1);
        assert_eq!(run.errors()[0].kind, ErrorKind::TypeError);
        assert_msg_contains!(run.errors(), "Cannot resolve the type");
    }
}
