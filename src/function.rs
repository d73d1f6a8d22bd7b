use std::cell::RefCell;
use std::rc::Rc;

use crate::ast::FunctionDecl;
use crate::environment::Environment;
use crate::value::Value;

/// A user-defined function: the declaration it was built from, the
/// environment captured at the declaration site, and whether it is a class
/// initializer (`init`), which changes its return semantics.
#[derive(Debug)]
pub struct LoxFunction {
    pub declaration: Rc<FunctionDecl>,
    pub closure: Rc<RefCell<Environment>>,
    pub is_initializer: bool,
}

impl LoxFunction {
    pub fn new(
        declaration: Rc<FunctionDecl>,
        closure: Rc<RefCell<Environment>>,
        is_initializer: bool,
    ) -> Self {
        LoxFunction {
            declaration,
            closure,
            is_initializer,
        }
    }

    pub fn name(&self) -> &str {
        &self.declaration.name.lexeme
    }

    pub fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    /// Produces a copy of this function whose closure is a fresh frame with
    /// `this` bound to the receiver, parented at the original closure.
    pub fn bind(&self, instance: Value) -> LoxFunction {
        let mut scope = Environment::with_enclosing(self.closure.clone());
        scope.define("this", instance);

        LoxFunction {
            declaration: self.declaration.clone(),
            closure: Rc::new(RefCell::new(scope)),
            is_initializer: self.is_initializer,
        }
    }
}
