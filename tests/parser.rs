use slox::ast_printer::AstPrinter;
use slox::error::LoxError;
use slox::expr::Expr;
use slox::parser::Parser;
use slox::scanner::Scanner;
use slox::stmt::Stmt;
use slox::token::Token;

fn parse_source(source: &str) -> (Vec<Stmt>, Vec<LoxError>) {
    let tokens: Vec<Token> = Scanner::new(source.as_bytes())
        .filter_map(Result::ok)
        .collect();
    Parser::new(tokens).parse()
}

/// Parses a single statement, failing the test on any diagnostic.
fn parse_stmt(source: &str) -> Stmt {
    let (mut statements, errors) = parse_source(source);
    assert!(errors.is_empty(), "parse errors: {:?}", errors);
    assert_eq!(statements.len(), 1);
    statements.remove(0)
}

/// Prefix form of the expression inside a single statement.
fn parse_expr_form(source: &str) -> String {
    match parse_stmt(source) {
        Stmt::Expression(expr) | Stmt::Print(expr) => AstPrinter::print(&expr),
        other => panic!("expected an expression statement, got {:?}", other),
    }
}

#[test]
fn multiplication_binds_tighter_than_addition() {
    assert_eq!(parse_expr_form("1 + 2 * 3;"), "(+ 1.0 (* 2.0 3.0))");
}

#[test]
fn grouping_overrides_precedence() {
    assert_eq!(parse_expr_form("(1 + 2) * 3;"), "(* (group (+ 1.0 2.0)) 3.0)");
}

#[test]
fn unary_operators_nest() {
    assert_eq!(parse_expr_form("!!true;"), "(! (! true))");
    assert_eq!(parse_expr_form("-1 - -2;"), "(- (- 1.0) (- 2.0))");
}

#[test]
fn comparison_is_left_associative() {
    assert_eq!(parse_expr_form("1 < 2 < 3;"), "(< (< 1.0 2.0) 3.0)");
}

#[test]
fn assignment_is_right_associative() {
    assert_eq!(parse_expr_form("a = b = c;"), "(= a (= b c))");
}

#[test]
fn and_binds_tighter_than_or() {
    assert_eq!(parse_expr_form("a or b and c;"), "(or a (and b c))");
}

#[test]
fn equality_is_looser_than_comparison() {
    assert_eq!(parse_expr_form("1 == 2 < 3;"), "(== 1.0 (< 2.0 3.0))");
}

#[test]
fn calls_chain_left_to_right() {
    assert_eq!(parse_expr_form("f(1)(2);"), "(call (call f 1.0) 2.0)");
}

#[test]
fn call_with_no_arguments() {
    assert_eq!(parse_expr_form("clock();"), "(call clock)");
}

#[test]
fn if_else_attaches_to_nearest_if() {
    let stmt = parse_stmt("if (a) print 1; else print 2;");
    assert_eq!(
        AstPrinter::print_stmt(&stmt),
        "(if a (print 1.0) (print 2.0))"
    );
}

#[test]
fn while_statement_shape() {
    let stmt = parse_stmt("while (i < 3) print i;");
    assert_eq!(
        AstPrinter::print_stmt(&stmt),
        "(while (< i 3.0) (print i))"
    );
}

#[test]
fn function_declaration_shape() {
    let stmt = parse_stmt("fun add(a, b) { return a + b; }");
    assert_eq!(
        AstPrinter::print_stmt(&stmt),
        "(fun add (a b) (return (+ a b)))"
    );
}

#[test]
fn for_loop_desugars_into_block_and_while() {
    let stmt = parse_stmt("for (var i = 0; i < 3; i = i + 1) print i;");
    assert_eq!(
        AstPrinter::print_stmt(&stmt),
        "(block (var i 0.0) (while (< i 3.0) (block (print i) (expr (= i (+ i 1.0))))))"
    );

    // The evaluator never sees a `for` node; the outer shape is a real block.
    match stmt {
        Stmt::Block(inner) => {
            assert_eq!(inner.len(), 2);
            assert!(matches!(inner[0], Stmt::Var { .. }));
            assert!(matches!(inner[1], Stmt::While { .. }));
        }
        other => panic!("expected a block, got {:?}", other),
    }
}

#[test]
fn for_loop_with_empty_clauses() {
    // No initializer: no wrapping block.  No condition: literal true.
    let stmt = parse_stmt("for (;;) print 1;");
    assert_eq!(AstPrinter::print_stmt(&stmt), "(while true (print 1.0))");
}

#[test]
fn for_loop_without_increment_keeps_bare_body() {
    let stmt = parse_stmt("for (var i = 0; i < 3;) print i;");
    assert_eq!(
        AstPrinter::print_stmt(&stmt),
        "(block (var i 0.0) (while (< i 3.0) (print i)))"
    );
}

#[test]
fn invalid_assignment_target_is_reported_not_fatal() {
    let (statements, errors) = parse_source("1 = 2;");

    assert_eq!(errors.len(), 1);
    assert!(errors[0].to_string().contains("Invalid assignment target."));
    assert!(errors[0].to_string().contains("at '='"));

    // The left-hand side is discarded; parsing continued to the semicolon.
    assert_eq!(statements.len(), 1);
}

#[test]
fn parser_synchronizes_and_reports_multiple_errors() {
    let (statements, errors) = parse_source("var = 1; print 2; var = 3;");

    assert_eq!(errors.len(), 2);
    for e in &errors {
        assert!(e.to_string().contains("Expect variable name."));
    }

    // The statement between the bad declarations still parsed.
    assert_eq!(statements.len(), 1);
    assert!(matches!(statements[0], Stmt::Print(_)));
}

#[test]
fn error_at_end_of_input_says_at_end() {
    let (_, errors) = parse_source("1 +");

    assert_eq!(errors.len(), 1);
    let rendered = errors[0].to_string();
    assert!(rendered.contains("at end"), "got: {}", rendered);
    assert!(rendered.contains("Expect expression."));
}

#[test]
fn more_than_255_arguments_is_reported() {
    let args = (0..256).map(|i| i.to_string()).collect::<Vec<_>>().join(", ");
    let source = format!("f({});", args);

    let (statements, errors) = parse_source(&source);

    assert_eq!(errors.len(), 1);
    assert!(errors[0]
        .to_string()
        .contains("Can't have more than 255 arguments."));

    // Reported but not fatal: the call still parsed with all its arguments.
    assert_eq!(statements.len(), 1);
    match &statements[0] {
        Stmt::Expression(Expr::Call { arguments, .. }) => assert_eq!(arguments.len(), 256),
        other => panic!("expected a call statement, got {:?}", other),
    }
}

#[test]
fn more_than_255_parameters_is_reported() {
    let params = (0..256).map(|i| format!("p{}", i)).collect::<Vec<_>>().join(", ");
    let source = format!("fun big({}) {{ }}", params);

    let (statements, errors) = parse_source(&source);

    assert_eq!(errors.len(), 1);
    assert!(errors[0]
        .to_string()
        .contains("Can't have more than 255 parameters."));
    assert_eq!(statements.len(), 1);
}

#[test]
fn block_statement_nests() {
    let stmt = parse_stmt("{ var a = 1; { print a; } }");
    assert_eq!(
        AstPrinter::print_stmt(&stmt),
        "(block (var a 1.0) (block (print a)))"
    );
}

#[test]
fn var_without_initializer() {
    let stmt = parse_stmt("var x;");
    assert_eq!(AstPrinter::print_stmt(&stmt), "(var x)");
}

#[test]
fn string_literal_round_trips_through_printer() {
    assert_eq!(parse_expr_form("\"hi\" + \"there\";"), "(+ hi there)");
}
