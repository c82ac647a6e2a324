use std::io;

use slox::error::LoxError;
use slox::expr::Expr;
use slox::interpreter::Interpreter;
use slox::parser::Parser;
use slox::resolver::Resolver;
use slox::scanner::Scanner;
use slox::stmt::Stmt;
use slox::token::Token;

fn resolve_source(source: &str) -> (Interpreter, Vec<Stmt>, Vec<LoxError>) {
    let tokens: Vec<Token> = Scanner::new(source.as_bytes())
        .filter_map(Result::ok)
        .collect();

    let (statements, errors) = Parser::new(tokens).parse();
    assert!(errors.is_empty(), "parse errors: {:?}", errors);

    let mut interpreter = Interpreter::with_output(Box::new(io::sink()));
    let resolve_errors = Resolver::new(&mut interpreter).resolve(&statements);

    (interpreter, statements, resolve_errors)
}

/// Collects `(lexeme, id)` for every Variable and Assign occurrence, in
/// source order.
fn collect_references(statements: &[Stmt], out: &mut Vec<(String, usize)>) {
    for stmt in statements {
        collect_stmt(stmt, out);
    }
}

fn collect_stmt(stmt: &Stmt, out: &mut Vec<(String, usize)>) {
    match stmt {
        Stmt::Expression(e) | Stmt::Print(e) => collect_expr(e, out),
        Stmt::Var { initializer, .. } => {
            if let Some(e) = initializer {
                collect_expr(e, out);
            }
        }
        Stmt::Block(stmts) => collect_references(stmts, out),
        Stmt::If {
            condition,
            then_branch,
            else_branch,
        } => {
            collect_expr(condition, out);
            collect_stmt(then_branch, out);
            if let Some(eb) = else_branch {
                collect_stmt(eb, out);
            }
        }
        Stmt::While { condition, body } => {
            collect_expr(condition, out);
            collect_stmt(body, out);
        }
        Stmt::Function(decl) => collect_references(&decl.body, out),
        Stmt::Return { value, .. } => {
            if let Some(e) = value {
                collect_expr(e, out);
            }
        }
    }
}

fn collect_expr(expr: &Expr, out: &mut Vec<(String, usize)>) {
    match expr {
        Expr::Literal(_) => {}
        Expr::Grouping(inner) => collect_expr(inner, out),
        Expr::Unary { right, .. } => collect_expr(right, out),
        Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
            collect_expr(left, out);
            collect_expr(right, out);
        }
        Expr::Variable { id, name } => out.push((name.lexeme.clone(), *id)),
        Expr::Assign { id, name, value } => {
            out.push((name.lexeme.clone(), *id));
            collect_expr(value, out);
        }
        Expr::Call {
            callee, arguments, ..
        } => {
            collect_expr(callee, out);
            for arg in arguments {
                collect_expr(arg, out);
            }
        }
    }
}

/// Depth recorded for the first reference with the given lexeme.
fn depth_of(
    interpreter: &Interpreter,
    references: &[(String, usize)],
    lexeme: &str,
) -> Option<usize> {
    let (_, id) = references
        .iter()
        .find(|(name, _)| name == lexeme)
        .unwrap_or_else(|| panic!("no reference to '{}'", lexeme));
    interpreter.local_depth(*id)
}

#[test]
fn nested_blocks_record_hop_counts() {
    let source = "
        var a = 1;
        {
          var b = 2;
          {
            print b;
            print a;
          }
        }
    ";
    let (interpreter, statements, errors) = resolve_source(source);
    assert!(errors.is_empty(), "resolve errors: {:?}", errors);

    let mut refs = Vec::new();
    collect_references(&statements, &mut refs);

    // `b` was declared one scope above its use; `a` is a global.
    assert_eq!(depth_of(&interpreter, &refs, "b"), Some(1));
    assert_eq!(depth_of(&interpreter, &refs, "a"), None);
}

#[test]
fn parameters_resolve_at_depth_zero() {
    let (interpreter, statements, errors) = resolve_source("fun f(x) { print x; }");
    assert!(errors.is_empty(), "resolve errors: {:?}", errors);

    let mut refs = Vec::new();
    collect_references(&statements, &mut refs);

    assert_eq!(depth_of(&interpreter, &refs, "x"), Some(0));
}

#[test]
fn closure_capture_crosses_function_scopes() {
    let source = "
        fun outer() {
          var v = 1;
          fun inner() {
            print v;
          }
        }
    ";
    let (interpreter, statements, errors) = resolve_source(source);
    assert!(errors.is_empty(), "resolve errors: {:?}", errors);

    let mut refs = Vec::new();
    collect_references(&statements, &mut refs);

    // From inner's body scope, `v` lives one function scope up.
    assert_eq!(depth_of(&interpreter, &refs, "v"), Some(1));
}

#[test]
fn assignment_targets_are_resolved_too() {
    let source = "
        fun counter() {
          var count = 0;
          fun bump() {
            count = count + 1;
          }
        }
    ";
    let (interpreter, statements, errors) = resolve_source(source);
    assert!(errors.is_empty(), "resolve errors: {:?}", errors);

    let mut refs = Vec::new();
    collect_references(&statements, &mut refs);

    // Both the assignment target and the read resolve one scope up.
    let depths: Vec<_> = refs
        .iter()
        .filter(|(name, _)| name == "count")
        .map(|(_, id)| interpreter.local_depth(*id))
        .collect();
    assert_eq!(depths, vec![Some(1), Some(1)]);
}

#[test]
fn duplicate_declaration_in_local_scope_is_an_error() {
    let (_, _, errors) = resolve_source("{ var a = 1; var a = 2; }");

    assert_eq!(errors.len(), 1);
    assert!(errors[0]
        .to_string()
        .contains("Variable already declared in this scope"));
}

#[test]
fn redeclaring_a_global_is_allowed() {
    let (_, _, errors) = resolve_source("var a = 1; var a = 2;");

    assert!(errors.is_empty(), "resolve errors: {:?}", errors);
}

#[test]
fn reading_a_variable_in_its_own_initializer_is_an_error() {
    let (_, _, errors) = resolve_source("{ var a = a; }");

    assert_eq!(errors.len(), 1);
    assert!(errors[0]
        .to_string()
        .contains("Cannot read local variable in its own initializer"));
}

#[test]
fn return_outside_function_is_an_error() {
    let (_, _, errors) = resolve_source("return 1;");

    assert_eq!(errors.len(), 1);
    assert!(errors[0]
        .to_string()
        .contains("'return' used outside of function"));
}

#[test]
fn return_inside_function_is_fine() {
    let (_, _, errors) = resolve_source("fun f() { return 1; }");

    assert!(errors.is_empty(), "resolve errors: {:?}", errors);
}

#[test]
fn resolver_keeps_walking_after_an_error() {
    // Both diagnostics surface from a single pass.
    let (_, _, errors) = resolve_source("return 1; { var a = 1; var a = 2; }");

    assert_eq!(errors.len(), 2);
}

#[test]
fn resolving_twice_produces_the_same_distances() {
    let source = "
        fun outer() {
          var v = 1;
          fun inner() {
            print v;
            v = v + 1;
          }
        }
    ";
    let (mut interpreter, statements, errors) = resolve_source(source);
    assert!(errors.is_empty(), "resolve errors: {:?}", errors);

    let mut refs = Vec::new();
    collect_references(&statements, &mut refs);

    let first: Vec<_> = refs
        .iter()
        .map(|(_, id)| interpreter.local_depth(*id))
        .collect();

    let second_errors = Resolver::new(&mut interpreter).resolve(&statements);
    assert!(second_errors.is_empty());

    let second: Vec<_> = refs
        .iter()
        .map(|(_, id)| interpreter.local_depth(*id))
        .collect();

    assert_eq!(first, second);
}
