use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::ast::{Expr, ExprId, LiteralValue, Stmt};
use crate::class::{LoxClass, LoxInstance};
use crate::environment::Environment;
use crate::error::{LoxError, Result};
use crate::function::LoxFunction;
use crate::token::{Token, TokenType};
use crate::value::{NativeResult, Value};

/// Non-local exits threaded through the evaluator's `Err` channel.
///
/// A `return` statement unwinds through nested blocks exactly like a runtime
/// error (restoring environments on the way out), but is absorbed at the
/// function-call boundary instead of being reported.
#[derive(Debug)]
pub enum Interrupt {
    Return(Value),
    Error(LoxError),
}

impl From<LoxError> for Interrupt {
    fn from(e: LoxError) -> Self {
        Interrupt::Error(e)
    }
}

impl From<std::io::Error> for Interrupt {
    fn from(e: std::io::Error) -> Self {
        Interrupt::Error(LoxError::Io(e))
    }
}

/// Tree-walking evaluator.
///
/// Generic over its output sink so tests capture `print` exactly as a user
/// would see it on stdout.  Holds the global environment, the current
/// environment (a chain link into block/function scopes), and the `locals`
/// side-table populated by the resolver.
pub struct Interpreter<W: Write> {
    globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    locals: HashMap<ExprId, usize>,
    output: W,
}

impl<W: Write> Interpreter<W> {
    pub fn new(output: W) -> Self {
        let globals = Rc::new(RefCell::new(Environment::new()));

        globals.borrow_mut().define(
            "clock",
            Value::NativeFunction {
                arity: 0,
                func: clock_native,
            },
        );

        Interpreter {
            environment: globals.clone(),
            globals,
            locals: HashMap::new(),
            output,
        }
    }

    /// Resolver callback: the expression with this identity lives `depth`
    /// environment hops away from its use site.
    pub fn resolve_local(&mut self, id: ExprId, depth: usize) {
        self.locals.insert(id, depth);
    }

    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<()> {
        for statement in statements {
            match self.execute(statement) {
                Ok(()) => {}

                Err(Interrupt::Error(e)) => return Err(e),

                // Top-level `return` is rejected by the resolver; if one
                // slips through in unresolved code, stop quietly.
                Err(Interrupt::Return(_)) => return Ok(()),
            }
        }

        Ok(())
    }

    // ── statements ──────────────────────────────────────────────────────

    fn execute(&mut self, stmt: &Stmt) -> std::result::Result<(), Interrupt> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;

                Ok(())
            }

            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;

                writeln!(self.output, "{}", value)?;
                self.output.flush()?;

                Ok(())
            }

            Stmt::Var { name, initializer } => {
                let value: Value = if let Some(expr) = initializer {
                    self.evaluate(expr)?
                } else {
                    Value::Nil
                };

                self.environment.borrow_mut().define(&name.lexeme, value);

                Ok(())
            }

            Stmt::Function(declaration) => {
                let function =
                    LoxFunction::new(declaration.clone(), self.environment.clone(), false);

                self.environment
                    .borrow_mut()
                    .define(&declaration.name.lexeme, Value::Function(Rc::new(function)));

                Ok(())
            }

            Stmt::Class { name, methods } => {
                // Two-step binding so methods can refer to the class by name.
                self.environment
                    .borrow_mut()
                    .define(&name.lexeme, Value::Nil);

                let mut table: HashMap<String, Rc<LoxFunction>> = HashMap::new();

                for method in methods {
                    let is_initializer = method.name.lexeme == "init";

                    let function = LoxFunction::new(
                        method.clone(),
                        self.environment.clone(),
                        is_initializer,
                    );

                    table.insert(method.name.lexeme.clone(), Rc::new(function));
                }

                let class = Value::Class(Rc::new(LoxClass::new(name.lexeme.clone(), table)));

                self.environment
                    .borrow_mut()
                    .assign(&name.lexeme, class, name.line)?;

                Ok(())
            }

            Stmt::Block(statements) => {
                let scope = Environment::with_enclosing(self.environment.clone());

                self.execute_block(statements, Rc::new(RefCell::new(scope)))
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if is_truthy(&self.evaluate(condition)?) {
                    self.execute(then_branch)?;
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)?;
                }

                Ok(())
            }

            Stmt::While { condition, body } => {
                while is_truthy(&self.evaluate(condition)?) {
                    self.execute(body)?;
                }

                Ok(())
            }

            Stmt::Return { keyword: _, value } => {
                let value: Value = if let Some(expr) = value {
                    self.evaluate(expr)?
                } else {
                    Value::Nil
                };

                Err(Interrupt::Return(value))
            }
        }
    }

    /// Runs `statements` inside `environment`, restoring the previous
    /// environment on every exit path: normal completion, runtime error,
    /// and return signal.
    fn execute_block(
        &mut self,
        statements: &[Stmt],
        environment: Rc<RefCell<Environment>>,
    ) -> std::result::Result<(), Interrupt> {
        let previous = std::mem::replace(&mut self.environment, environment);

        let mut result = Ok(());

        for statement in statements {
            result = self.execute(statement);

            if result.is_err() {
                break;
            }
        }

        self.environment = previous;

        result
    }

    // ── expressions ─────────────────────────────────────────────────────

    fn evaluate(&mut self, expr: &Expr) -> std::result::Result<Value, Interrupt> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::String(s.clone()),
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => self.evaluate_unary(operator, right),

            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right),

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left_val = self.evaluate(left)?;

                match operator.token_type {
                    TokenType::OR if is_truthy(&left_val) => Ok(left_val),

                    TokenType::AND if !is_truthy(&left_val) => Ok(left_val),

                    _ => self.evaluate(right),
                }
            }

            Expr::Variable { name, id } => Ok(self.look_up_variable(name, *id)?),

            Expr::This { keyword, id } => Ok(self.look_up_variable(keyword, *id)?),

            Expr::Assign { name, value, id } => {
                let value = self.evaluate(value)?;

                if let Some(&distance) = self.locals.get(id) {
                    self.environment.borrow_mut().assign_at(
                        distance,
                        &name.lexeme,
                        value.clone(),
                        name.line,
                    )?;
                } else {
                    self.globals
                        .borrow_mut()
                        .assign(&name.lexeme, value.clone(), name.line)?;
                }

                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee_val = self.evaluate(callee)?;

                let mut arg_values: Vec<Value> = Vec::with_capacity(arguments.len());

                for argument in arguments {
                    arg_values.push(self.evaluate(argument)?);
                }

                self.call_value(callee_val, arg_values, paren)
            }

            Expr::Get { object, name } => {
                let object = self.evaluate(object)?;

                if let Value::Instance(instance) = &object {
                    Ok(LoxInstance::get(instance, name)?)
                } else {
                    Err(LoxError::runtime(name.line, "Only instances have properties.").into())
                }
            }

            Expr::Set {
                object,
                name,
                value,
            } => {
                let object = self.evaluate(object)?;

                let Value::Instance(instance) = object else {
                    return Err(
                        LoxError::runtime(name.line, "Only instances have fields.").into()
                    );
                };

                let value = self.evaluate(value)?;

                instance.borrow_mut().set(name, value.clone());

                Ok(value)
            }
        }
    }

    fn evaluate_unary(
        &mut self,
        operator: &Token,
        right: &Expr,
    ) -> std::result::Result<Value, Interrupt> {
        let value = self.evaluate(right)?;

        match operator.token_type {
            TokenType::MINUS => match value {
                Value::Number(n) => Ok(Value::Number(-n)),

                _ => Err(LoxError::runtime(operator.line, "Operand must be a number.").into()),
            },

            TokenType::BANG => Ok(Value::Bool(!is_truthy(&value))),

            _ => Err(LoxError::runtime(operator.line, "Invalid unary operator.").into()),
        }
    }

    fn evaluate_binary(
        &mut self,
        left: &Expr,
        operator: &Token,
        right: &Expr,
    ) -> std::result::Result<Value, Interrupt> {
        let left_val = self.evaluate(left)?;
        let right_val = self.evaluate(right)?;

        let numbers_err =
            || Interrupt::from(LoxError::runtime(operator.line, "Operands must be numbers."));

        match operator.token_type {
            TokenType::PLUS => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),

                (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),

                _ => Err(LoxError::runtime(
                    operator.line,
                    "Operands must be two numbers or two strings.",
                )
                .into()),
            },

            TokenType::MINUS => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a - b)),

                _ => Err(numbers_err()),
            },

            TokenType::STAR => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a * b)),

                _ => Err(numbers_err()),
            },

            // Division by zero is not an error: IEEE-754 semantics apply.
            TokenType::SLASH => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a / b)),

                _ => Err(numbers_err()),
            },

            TokenType::GREATER => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a > b)),

                _ => Err(numbers_err()),
            },

            TokenType::GREATER_EQUAL => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a >= b)),

                _ => Err(numbers_err()),
            },

            TokenType::LESS => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a < b)),

                _ => Err(numbers_err()),
            },

            TokenType::LESS_EQUAL => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a <= b)),

                _ => Err(numbers_err()),
            },

            TokenType::EQUAL_EQUAL => Ok(Value::Bool(is_equal(&left_val, &right_val))),

            TokenType::BANG_EQUAL => Ok(Value::Bool(!is_equal(&left_val, &right_val))),

            _ => Err(LoxError::runtime(operator.line, "Invalid binary operator.").into()),
        }
    }

    // ── calls ───────────────────────────────────────────────────────────

    fn call_value(
        &mut self,
        callee: Value,
        arguments: Vec<Value>,
        paren: &Token,
    ) -> std::result::Result<Value, Interrupt> {
        match callee {
            Value::NativeFunction { arity, func } => {
                check_arity(arity, arguments.len(), paren)?;

                func(&arguments).map_err(|msg| LoxError::runtime(paren.line, msg).into())
            }

            Value::Function(function) => {
                check_arity(function.arity(), arguments.len(), paren)?;

                Ok(self.call_function(&function, arguments)?)
            }

            Value::Class(class) => {
                check_arity(class.arity(), arguments.len(), paren)?;

                let instance = Rc::new(RefCell::new(LoxInstance::new(class.clone())));

                if let Some(init) = class.find_method("init") {
                    let bound = init.bind(Value::Instance(instance.clone()));
                    self.call_function(&bound, arguments)?;
                }

                Ok(Value::Instance(instance))
            }

            _ => Err(LoxError::runtime(
                paren.line,
                "Can only call functions and classes.",
            )
            .into()),
        }
    }

    /// Runs a user function: fresh activation frame parented at the captured
    /// closure, parameters bound left-to-right, body executed, and the
    /// return signal absorbed here.  Initializers always yield `this`.
    fn call_function(
        &mut self,
        function: &LoxFunction,
        arguments: Vec<Value>,
    ) -> Result<Value> {
        let mut frame = Environment::with_enclosing(function.closure.clone());

        for (param, argument) in function.declaration.params.iter().zip(arguments) {
            frame.define(&param.lexeme, argument);
        }

        let result = self.execute_block(&function.declaration.body, Rc::new(RefCell::new(frame)));

        let line = function.declaration.name.line;

        match result {
            Ok(()) => {
                if function.is_initializer {
                    function.closure.borrow().get_at(0, "this", line)
                } else {
                    Ok(Value::Nil)
                }
            }

            Err(Interrupt::Return(value)) => {
                if function.is_initializer {
                    function.closure.borrow().get_at(0, "this", line)
                } else {
                    Ok(value)
                }
            }

            Err(Interrupt::Error(e)) => Err(e),
        }
    }

    // ── variable access ─────────────────────────────────────────────────

    fn look_up_variable(&self, name: &Token, id: ExprId) -> Result<Value> {
        if let Some(&distance) = self.locals.get(&id) {
            self.environment
                .borrow()
                .get_at(distance, &name.lexeme, name.line)
        } else {
            self.globals.borrow().get(&name.lexeme, name.line)
        }
    }
}

fn check_arity(arity: usize, got: usize, paren: &Token) -> std::result::Result<(), Interrupt> {
    if arity != got {
        return Err(LoxError::runtime(
            paren.line,
            format!("Expected {} arguments but got {}.", arity, got),
        )
        .into());
    }

    Ok(())
}

/// `nil` and `false` are falsy; everything else is truthy.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Nil => false,

        Value::Bool(b) => *b,

        _ => true,
    }
}

fn is_equal(left: &Value, right: &Value) -> bool {
    left == right
}

fn clock_native(_args: &[Value]) -> NativeResult {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| format!("Clock error: {}", e))?
        .as_secs_f64();

    Ok(Value::Number(timestamp))
}
