use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::environment::Environment;
use crate::error::{LoxError, Result};
use crate::expr::{Expr, ExprId};
use crate::stmt::Stmt;
use crate::token::{Token, TokenType};
use crate::value::{LoxFunction, Value};

/// Signal that unwinds evaluator frames.  `Return` is not an error: it
/// carries a return value up to the enclosing user-function call frame, the
/// only place that catches it.  Everything else propagates both variants.
pub enum Unwind {
    Return(Value),
    Error(LoxError),
}

impl From<LoxError> for Unwind {
    fn from(e: LoxError) -> Self {
        Unwind::Error(e)
    }
}

type Flow<T> = std::result::Result<T, Unwind>;

/// Tree-walking evaluator.  Holds the fixed global environment, the mutable
/// current-environment pointer, and the resolver's binding-distance table.
pub struct Interpreter {
    globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    locals: HashMap<ExprId, usize>,
    output: Box<dyn Write>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    /// Builds an interpreter whose `print` statements write to `output`.
    pub fn with_output(output: Box<dyn Write>) -> Self {
        let globals = Rc::new(RefCell::new(Environment::new()));

        globals.borrow_mut().define(
            "clock",
            Value::NativeFunction {
                name: "clock",
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

    // ── resolver callbacks ───────────────────────────────────────────────

    /// Note that the expression `id` refers to a local `depth` environment
    /// hops from its use site.
    pub fn note_local(&mut self, id: ExprId, depth: usize) {
        self.locals.insert(id, depth);
    }

    /// Globals are the absence of an entry; nothing to record.
    pub fn note_global(&mut self, _id: ExprId) {}

    /// Distance recorded for `id`, if it resolved to a local.
    pub fn local_depth(&self, id: ExprId) -> Option<usize> {
        self.locals.get(&id).copied()
    }

    // ── statement execution ──────────────────────────────────────────────

    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<()> {
        for stmt in statements {
            if let Err(unwind) = self.execute(stmt) {
                return Err(match unwind {
                    Unwind::Error(e) => e,
                    // Statically rejected by the resolver; kept as a runtime
                    // error in case a caller skips resolution.
                    Unwind::Return(_) => {
                        LoxError::runtime(0, "return", "Return outside of function.")
                    }
                });
            }
        }

        Ok(())
    }

    fn execute(&mut self, stmt: &Stmt) -> Flow<()> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;

                Ok(())
            }

            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;

                writeln!(self.output, "{}", value).map_err(LoxError::Io)?;

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

            Stmt::Block(statements) => {
                let environment =
                    Rc::new(RefCell::new(Environment::with_enclosing(self.environment.clone())));

                self.execute_block(statements, environment)
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

            Stmt::Function(decl) => {
                // The *current* environment is the closure: captures are
                // fixed at definition time.
                let function = Value::Function(Rc::new(LoxFunction {
                    declaration: decl.clone(),
                    closure: self.environment.clone(),
                }));

                self.environment
                    .borrow_mut()
                    .define(&decl.name.lexeme, function);

                Ok(())
            }

            Stmt::Return { value, .. } => {
                let value: Value = if let Some(expr) = value {
                    self.evaluate(expr)?
                } else {
                    Value::Nil
                };

                Err(Unwind::Return(value))
            }
        }
    }

    /// Runs `statements` with `environment` as the current scope, restoring
    /// the previous scope on every exit path: completion, error, or return.
    fn execute_block(
        &mut self,
        statements: &[Stmt],
        environment: Rc<RefCell<Environment>>,
    ) -> Flow<()> {
        let previous = std::mem::replace(&mut self.environment, environment);

        let result = statements.iter().try_for_each(|stmt| self.execute(stmt));

        self.environment = previous;

        result
    }

    // ── expression evaluation ────────────────────────────────────────────

    fn evaluate(&mut self, expr: &Expr) -> Flow<Value> {
        match expr {
            Expr::Literal(token) => self.evaluate_literal(token),

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

                // The deciding operand is returned unchanged, not coerced to
                // a boolean.
                let short_circuits = match operator.token_type {
                    TokenType::OR => is_truthy(&left_val),
                    _ => !is_truthy(&left_val),
                };

                if short_circuits {
                    Ok(left_val)
                } else {
                    self.evaluate(right)
                }
            }

            Expr::Variable { id, name } => self.look_up_variable(*id, name),

            Expr::Assign { id, name, value } => {
                let value = self.evaluate(value)?;

                match self.locals.get(id) {
                    Some(&distance) => self.environment.borrow_mut().assign_at(
                        distance,
                        &name.lexeme,
                        value.clone(),
                        name.line,
                    )?,
                    None => self.globals.borrow_mut().assign(
                        &name.lexeme,
                        value.clone(),
                        name.line,
                    )?,
                }

                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee_val = self.evaluate(callee)?;

                let mut args: Vec<Value> = Vec::with_capacity(arguments.len());
                for arg in arguments {
                    args.push(self.evaluate(arg)?);
                }

                self.call_value(&callee_val, args, paren)
            }
        }
    }

    fn evaluate_literal(&self, token: &Token) -> Flow<Value> {
        match &token.token_type {
            TokenType::NUMBER(n) => Ok(Value::Number(*n)),

            TokenType::STRING(s) => Ok(Value::String(s.clone())),

            TokenType::TRUE => Ok(Value::Bool(true)),

            TokenType::FALSE => Ok(Value::Bool(false)),

            TokenType::NIL => Ok(Value::Nil),

            _ => Err(LoxError::runtime(token.line, &token.lexeme, "Invalid literal.").into()),
        }
    }

    fn evaluate_unary(&mut self, operator: &Token, right: &Expr) -> Flow<Value> {
        let value: Value = self.evaluate(right)?;

        match operator.token_type {
            TokenType::MINUS => match value {
                Value::Number(n) => Ok(Value::Number(-n)),

                _ => Err(LoxError::runtime(
                    operator.line,
                    &operator.lexeme,
                    "Operand must be a number.",
                )
                .into()),
            },

            TokenType::BANG => Ok(Value::Bool(!is_truthy(&value))),

            _ => Err(LoxError::runtime(
                operator.line,
                &operator.lexeme,
                "Invalid unary operator.",
            )
            .into()),
        }
    }

    fn evaluate_binary(&mut self, left: &Expr, operator: &Token, right: &Expr) -> Flow<Value> {
        let left_val: Value = self.evaluate(left)?;
        let right_val: Value = self.evaluate(right)?;

        match operator.token_type {
            TokenType::PLUS => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),

                (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),

                _ => Err(LoxError::runtime(
                    operator.line,
                    &operator.lexeme,
                    "Operands must be two numbers or two strings.",
                )
                .into()),
            },

            TokenType::MINUS => {
                let (a, b) = number_operands(operator, left_val, right_val)?;
                Ok(Value::Number(a - b))
            }

            TokenType::STAR => {
                let (a, b) = number_operands(operator, left_val, right_val)?;
                Ok(Value::Number(a * b))
            }

            // IEEE-754 division: dividing by zero yields an infinity.
            TokenType::SLASH => {
                let (a, b) = number_operands(operator, left_val, right_val)?;
                Ok(Value::Number(a / b))
            }

            TokenType::GREATER => {
                let (a, b) = number_operands(operator, left_val, right_val)?;
                Ok(Value::Bool(a > b))
            }

            TokenType::GREATER_EQUAL => {
                let (a, b) = number_operands(operator, left_val, right_val)?;
                Ok(Value::Bool(a >= b))
            }

            TokenType::LESS => {
                let (a, b) = number_operands(operator, left_val, right_val)?;
                Ok(Value::Bool(a < b))
            }

            TokenType::LESS_EQUAL => {
                let (a, b) = number_operands(operator, left_val, right_val)?;
                Ok(Value::Bool(a <= b))
            }

            TokenType::EQUAL_EQUAL => Ok(Value::Bool(left_val == right_val)),

            TokenType::BANG_EQUAL => Ok(Value::Bool(left_val != right_val)),

            _ => Err(LoxError::runtime(
                operator.line,
                &operator.lexeme,
                "Invalid binary operator.",
            )
            .into()),
        }
    }

    fn look_up_variable(&self, id: ExprId, name: &Token) -> Flow<Value> {
        let value = match self.locals.get(&id) {
            Some(&distance) => {
                self.environment
                    .borrow()
                    .get_at(distance, &name.lexeme, name.line)?
            }
            None => self.globals.borrow().get(&name.lexeme, name.line)?,
        };

        Ok(value)
    }

    // ── calls ────────────────────────────────────────────────────────────

    fn call_value(&mut self, callee: &Value, args: Vec<Value>, paren: &Token) -> Flow<Value> {
        match callee {
            Value::NativeFunction { arity, func, .. } => {
                check_arity(*arity, args.len(), paren)?;

                Ok(func(&args)?)
            }

            Value::Function(function) => {
                check_arity(function.declaration.params.len(), args.len(), paren)?;

                self.call_function(function, args)
            }

            _ => Err(LoxError::runtime(
                paren.line,
                &paren.lexeme,
                "Can only call functions.",
            )
            .into()),
        }
    }

    /// Invokes a user function: parameters bind in a fresh environment whose
    /// parent is the function's *closure*, not the caller's scope.
    fn call_function(&mut self, function: &LoxFunction, args: Vec<Value>) -> Flow<Value> {
        let environment =
            Rc::new(RefCell::new(Environment::with_enclosing(function.closure.clone())));

        for (param, arg) in function.declaration.params.iter().zip(args) {
            environment.borrow_mut().define(&param.lexeme, arg);
        }

        match self.execute_block(&function.declaration.body, environment) {
            Ok(()) => Ok(Value::Nil),
            Err(Unwind::Return(value)) => Ok(value),
            Err(err) => Err(err),
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

// ── helpers ──────────────────────────────────────────────────────────────

/// Only `nil` and `false` are falsy.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Nil => false,

        Value::Bool(b) => *b,

        _ => true,
    }
}

fn number_operands(operator: &Token, left: Value, right: Value) -> Flow<(f64, f64)> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok((a, b)),

        _ => Err(LoxError::runtime(
            operator.line,
            &operator.lexeme,
            "Operands must be numbers.",
        )
        .into()),
    }
}

fn check_arity(arity: usize, got: usize, paren: &Token) -> Flow<()> {
    if got != arity {
        return Err(LoxError::runtime(
            paren.line,
            &paren.lexeme,
            format!("Expected {} arguments but got {}.", arity, got),
        )
        .into());
    }
    Ok(())
}

/// Milliseconds since the Unix epoch, as a number.
fn clock_native(_args: &[Value]) -> Result<Value> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| LoxError::runtime(0, "clock", format!("System clock error: {}", e)))?;

    Ok(Value::Number(now.as_millis() as f64))
}
