use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{LoxError, Result};
use crate::value::Value;

/// A single scope frame: name bindings plus an optional link to the
/// enclosing scope.  Frames are linked at creation and never rewired.
#[derive(Debug)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: Rc<RefCell<Environment>>) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Declaration: always writes into this frame, shadowing or replacing
    /// any existing binding of the same name.
    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str, line: usize) -> Result<Value> {
        if let Some(value) = self.values.get(name) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name, line)
        } else {
            Err(LoxError::runtime(
                line,
                format!("Undefined variable '{}'.", name),
            ))
        }
    }

    pub fn assign(&mut self, name: &str, value: Value, line: usize) -> Result<()> {
        if self.values.contains_key(name) {
            self.values.insert(name.to_string(), value);
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value, line)
        } else {
            Err(LoxError::runtime(
                line,
                format!("Undefined variable '{}'.", name),
            ))
        }
    }

    /// Reads from the frame exactly `distance` hops up the chain.  The
    /// resolver guarantees the binding exists at that depth; the error arm
    /// exists so a stale side-table cannot panic the interpreter.
    pub fn get_at(&self, distance: usize, name: &str, line: usize) -> Result<Value> {
        if distance == 0 {
            self.values.get(name).cloned().ok_or_else(|| {
                LoxError::runtime(line, format!("Undefined variable '{}'.", name))
            })
        } else {
            match &self.enclosing {
                Some(enclosing) => enclosing.borrow().get_at(distance - 1, name, line),
                None => Err(LoxError::runtime(
                    line,
                    format!("Undefined variable '{}'.", name),
                )),
            }
        }
    }

    /// Writes into the frame exactly `distance` hops up the chain.
    pub fn assign_at(&mut self, distance: usize, name: &str, value: Value, line: usize) -> Result<()> {
        if distance == 0 {
            self.values.insert(name.to_string(), value);
            Ok(())
        } else {
            match &self.enclosing {
                Some(enclosing) => enclosing
                    .borrow_mut()
                    .assign_at(distance - 1, name, value, line),
                None => Err(LoxError::runtime(
                    line,
                    format!("Undefined variable '{}'.", name),
                )),
            }
        }
    }
}
