use tracing::trace;

use crate::peach::common::utils::Truncateable;
use crate::peach::interpreted::interpreter::value::Value;

/// Arguments travel to a callee, and results back to the caller, through this stack. Every call
/// pushes one value per argument and leaves exactly one result behind.
#[derive(Debug, Default)]
pub struct OperandStack {
    values: Vec<Value>,
}

impl OperandStack {
    pub fn new() -> Self { OperandStack { values: Vec::new() } }

    pub fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    pub fn pop(&mut self) -> Option<Value> {
        self.values.pop()
    }

    pub fn len(&self) -> usize { self.values.len() }

    pub fn is_empty(&self) -> bool { self.values.is_empty() }

    /// Drops everything above `height`, e.g. after an error cut a call short.
    pub fn unwind_to(&mut self, height: usize) {
        if self.values.len() > height {
            trace!(from = self.values.len(), to = height, "unwinding operand stack");
            let surplus = self.values.len() - height;
            self.values.popn(surplus);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_in_reverse_order() {
        let mut stack = OperandStack::new();
        stack.push(Value::Int(1));
        stack.push(Value::Int(2));
        assert!(matches!(stack.pop(), Some(Value::Int(2))));
        assert!(matches!(stack.pop(), Some(Value::Int(1))));
        assert!(stack.pop().is_none());
    }

    #[test]
    fn unwinds_to_a_recorded_height() {
        let mut stack = OperandStack::new();
        stack.push(Value::Null);
        let height = stack.len();
        stack.push(Value::Int(1));
        stack.push(Value::Int(2));
        stack.unwind_to(height);
        assert_eq!(stack.len(), 1);
        stack.unwind_to(5);
        assert_eq!(stack.len(), 1);
    }
}
