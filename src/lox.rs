use std::io::Write;

use log::info;

use crate::error::LoxError;
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner::Scanner;

/// One interpreter session: a file run or an interactive loop.
///
/// Owns the evaluator (so globals and the resolver side-table persist across
/// REPL lines), the error flags the driver turns into exit codes, and the
/// expression-id watermark handed to each parser.
///
/// Front-end errors suppress the later stages; each stage still reports
/// every diagnostic it found.  Runtime errors are caught at the statement
/// boundary, printed, and flagged separately — in interactive mode the
/// session continues.
pub struct Lox<W: Write> {
    interpreter: Interpreter<W>,
    next_expr_id: usize,
    had_error: bool,
    had_runtime_error: bool,
}

impl<W: Write> Lox<W> {
    pub fn new(output: W) -> Self {
        Lox {
            interpreter: Interpreter::new(output),
            next_expr_id: 0,
            had_error: false,
            had_runtime_error: false,
        }
    }

    /// Run one source unit through the full pipeline.
    pub fn run(&mut self, source: &[u8]) {
        info!("Running {} bytes of source", source.len());

        let mut tokens = Vec::new();

        for item in Scanner::new(source) {
            match item {
                Ok(token) => tokens.push(token),
                Err(e) => self.report(&e),
            }
        }

        let mut parser = Parser::new(tokens, self.next_expr_id);
        let statements = parser.parse();
        self.next_expr_id = parser.next_id();

        for e in parser.take_errors() {
            self.report(&e);
        }

        if self.had_error {
            return;
        }

        let resolve_errors = Resolver::new(&mut self.interpreter).resolve(&statements);

        for e in &resolve_errors {
            self.report(e);
        }

        if self.had_error {
            return;
        }

        if let Err(e) = self.interpreter.interpret(&statements) {
            eprintln!("{}", e);
            self.had_runtime_error = true;
        }
    }

    fn report(&mut self, error: &LoxError) {
        eprintln!("{}", error);
        self.had_error = true;
    }

    pub fn had_error(&self) -> bool {
        self.had_error
    }

    pub fn had_runtime_error(&self) -> bool {
        self.had_runtime_error
    }

    /// Interactive sessions clear the syntax flag between lines so one typo
    /// does not poison the rest of the session.  The runtime flag stays.
    pub fn reset_error(&mut self) {
        self.had_error = false;
    }
}
