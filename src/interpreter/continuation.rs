//! Continuation protocol
//!
//! Every evaluation step receives a success continuation and an error
//! continuation. Exactly one of them is invoked, exactly once, for each node
//! evaluation; both are `FnOnce` so the type system enforces the "at most" half.

use crate::interpreter::types::{Exception, Value};
use std::cell::RefCell;
use std::rc::Rc;

/// Success callback, receives the produced value
pub type Continuation = Box<dyn FnOnce(Value)>;

/// Failure callback, receives a located signal
pub type ErrorContinuation = Box<dyn FnOnce(Exception)>;

/// Success callback of an ordered sibling sequence
pub type ValuesContinuation = Box<dyn FnOnce(Vec<Value>)>;

/// One-shot callback that several code paths may hold at once
///
/// The first call consumes the inner callback; later calls are no-ops. Used
/// wherever one error continuation has to be handed to more than one child
/// (sibling sequences, loop iterations, try/finally).
pub struct SharedContinuation<T>(Rc<RefCell<Option<Box<dyn FnOnce(T)>>>>);

impl<T: 'static> SharedContinuation<T> {
    pub fn new(callback: Box<dyn FnOnce(T)>) -> Self {
        SharedContinuation(Rc::new(RefCell::new(Some(callback))))
    }

    pub fn call(&self, value: T) {
        // Release the borrow before running the callback, it may re-enter
        let callback = self.0.borrow_mut().take();
        if let Some(callback) = callback {
            callback(value);
        }
    }

    /// Boxed handle that forwards into this shared callback
    pub fn boxed(&self) -> Box<dyn FnOnce(T)> {
        let shared = self.clone();
        Box::new(move |value| shared.call(value))
    }

    pub fn is_spent(&self) -> bool {
        self.0.borrow().is_none()
    }
}

impl<T> Clone for SharedContinuation<T> {
    fn clone(&self) -> Self {
        SharedContinuation(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_shared_continuation_fires_once() {
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let shared: SharedContinuation<Value> = SharedContinuation::new(Box::new(move |_| {
            counter.set(counter.get() + 1);
        }));

        let first = shared.boxed();
        let second = shared.boxed();
        first(Value::from(1));
        second(Value::from(2));
        shared.call(Value::from(3));

        assert_eq!(calls.get(), 1);
        assert!(shared.is_spent());
    }
}
