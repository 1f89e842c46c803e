use std::cell::RefCell;
use std::rc::Rc;

pub type RcRc<A> = Rc<RefCell<A>>;

pub fn rcrc<A>(a: A) -> RcRc<A> {
    Rc::new(RefCell::new(a))
}

/// Identity of a shared cell, usable as a key in visited sets.
pub fn address<A>(a: &RcRc<A>) -> usize {
    Rc::as_ptr(a) as *const () as usize
}

pub trait Truncateable {
    fn len(&self) -> usize;
    fn truncate(&mut self, amount: usize);
    fn popn(&mut self, amount: usize) {
        let len = self.len();
        assert!(len >= amount);
        self.truncate(len - amount);
    }
}

impl<A> Truncateable for Vec<A> {
    fn len(&self) -> usize { self.len() }

    fn truncate(&mut self, amount: usize) { self.truncate(amount) }
}
