use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{LoxError, Result};
use crate::function::LoxFunction;
use crate::token::Token;
use crate::value::Value;

/// A class value: its name and the method table fixed at declaration time.
#[derive(Debug)]
pub struct LoxClass {
    pub name: String,
    methods: HashMap<String, Rc<LoxFunction>>,
}

impl LoxClass {
    pub fn new(name: String, methods: HashMap<String, Rc<LoxFunction>>) -> Self {
        LoxClass { name, methods }
    }

    pub fn find_method(&self, name: &str) -> Option<Rc<LoxFunction>> {
        self.methods.get(name).cloned()
    }

    /// Calling a class constructs an instance; arity is borrowed from `init`.
    pub fn arity(&self) -> usize {
        self.find_method("init").map_or(0, |init| init.arity())
    }
}

/// An instance: a reference to its class and a field map that grows as
/// fields are assigned.  The method table never changes after class
/// declaration; fields shadow methods on lookup.
#[derive(Debug)]
pub struct LoxInstance {
    pub class: Rc<LoxClass>,
    fields: HashMap<String, Value>,
}

impl LoxInstance {
    pub fn new(class: Rc<LoxClass>) -> Self {
        LoxInstance {
            class,
            fields: HashMap::new(),
        }
    }

    /// Property access.  Takes the `Rc` handle rather than `&self` because a
    /// method hit must bind `this` to the receiver.
    pub fn get(this: &Rc<RefCell<LoxInstance>>, name: &Token) -> Result<Value> {
        if let Some(value) = this.borrow().fields.get(&name.lexeme) {
            return Ok(value.clone());
        }

        if let Some(method) = this.borrow().class.find_method(&name.lexeme) {
            let bound = method.bind(Value::Instance(this.clone()));
            return Ok(Value::Function(Rc::new(bound)));
        }

        Err(LoxError::runtime(
            name.line,
            format!("Undefined property '{}'.", name.lexeme),
        ))
    }

    pub fn set(&mut self, name: &Token, value: Value) {
        self.fields.insert(name.lexeme.clone(), value);
    }
}
