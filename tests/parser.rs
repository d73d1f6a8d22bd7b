use rox::ast::{Expr, LiteralValue, Stmt};
use rox::error::LoxError;
use rox::parser::Parser;
use rox::scanner::Scanner;
use rox::token::Token;

fn parse(source: &str) -> (Vec<Stmt>, Vec<LoxError>) {
    let tokens: Vec<Token> = Scanner::new(source.as_bytes())
        .filter_map(Result::ok)
        .collect();

    let mut parser = Parser::new(tokens, 0);
    let statements = parser.parse();
    let errors = parser.take_errors();

    (statements, errors)
}

fn parse_ok(source: &str) -> Vec<Stmt> {
    let (statements, errors) = parse(source);
    assert!(errors.is_empty(), "unexpected parse errors: {:?}", errors);
    statements
}

#[test]
fn multiplication_binds_tighter_than_addition() {
    let statements = parse_ok("1 + 2 * 3;");

    let Stmt::Expression(Expr::Binary {
        left,
        operator,
        right,
    }) = &statements[0]
    else {
        panic!("expected binary expression statement");
    };

    assert_eq!(operator.lexeme, "+");
    assert!(matches!(**left, Expr::Literal(LiteralValue::Number(n)) if n == 1.0));
    assert!(matches!(**right, Expr::Binary { ref operator, .. } if operator.lexeme == "*"));
}

#[test]
fn unary_is_right_recursive() {
    let statements = parse_ok("!!true;");

    let Stmt::Expression(Expr::Unary { operator, right }) = &statements[0] else {
        panic!("expected unary expression statement");
    };

    assert_eq!(operator.lexeme, "!");
    assert!(matches!(**right, Expr::Unary { .. }));
}

#[test]
fn calls_and_property_access_chain_postfix() {
    let statements = parse_ok("a.b(1).c;");

    // Outermost: `.c` on the call result; the call's callee is `a.b`.
    let Stmt::Expression(Expr::Get { object, name }) = &statements[0] else {
        panic!("expected property access");
    };

    assert_eq!(name.lexeme, "c");

    let Expr::Call { callee, arguments, .. } = &**object else {
        panic!("expected call under property access");
    };

    assert_eq!(arguments.len(), 1);
    assert!(matches!(**callee, Expr::Get { .. }));
}

#[test]
fn assignment_rewrites_variable_target() {
    let statements = parse_ok("a = 1;");

    assert!(matches!(
        &statements[0],
        Stmt::Expression(Expr::Assign { name, .. }) if name.lexeme == "a"
    ));
}

#[test]
fn assignment_rewrites_property_target_to_set() {
    let statements = parse_ok("a.b = 1;");

    assert!(matches!(
        &statements[0],
        Stmt::Expression(Expr::Set { name, .. }) if name.lexeme == "b"
    ));
}

#[test]
fn invalid_assignment_target_reports_without_discarding() {
    let (statements, errors) = parse("1 = 2;");

    assert_eq!(errors.len(), 1);
    assert!(errors[0].to_string().contains("Invalid assignment target."));

    // The statement itself survives: no panic-mode recovery for this error.
    assert_eq!(statements.len(), 1);
}

#[test]
fn for_loop_desugars_to_block_and_while() {
    let statements = parse_ok("for (var i = 0; i < 3; i = i + 1) print i;");

    let Stmt::Block(outer) = &statements[0] else {
        panic!("expected initializer block around the loop");
    };

    assert_eq!(outer.len(), 2);
    assert!(matches!(outer[0], Stmt::Var { .. }));

    let Stmt::While { condition, body } = &outer[1] else {
        panic!("expected while under initializer block");
    };

    assert!(matches!(condition, Expr::Binary { .. }));

    let Stmt::Block(inner) = &**body else {
        panic!("expected body block carrying the increment");
    };

    assert_eq!(inner.len(), 2);
    assert!(matches!(inner[0], Stmt::Print(_)));
    assert!(matches!(
        inner[1],
        Stmt::Expression(Expr::Assign { .. })
    ));
}

#[test]
fn empty_for_clauses_collapse_the_wrappers() {
    let statements = parse_ok("for (;;) print 1;");

    // No initializer: no outer block.  No increment: no inner block.
    let Stmt::While { condition, body } = &statements[0] else {
        panic!("expected a bare while loop");
    };

    assert!(matches!(condition, Expr::Literal(LiteralValue::True)));
    assert!(matches!(**body, Stmt::Print(_)));
}

#[test]
fn panic_mode_recovers_at_statement_boundary() {
    let (statements, errors) = parse("var = 1; print 2;");

    assert_eq!(errors.len(), 1);
    assert!(errors[0].to_string().contains("Expect variable name."));

    // The bad declaration contributes nothing; the next statement parses.
    assert_eq!(statements.len(), 1);
    assert!(matches!(statements[0], Stmt::Print(_)));
}

#[test]
fn each_bad_declaration_reports_separately() {
    let (statements, errors) = parse("var = 1; var = 2; print 3;");

    assert_eq!(errors.len(), 2);
    assert_eq!(statements.len(), 1);
}

#[test]
fn error_at_eof_renders_at_end() {
    let (_, errors) = parse("(1");

    assert_eq!(errors.len(), 1);

    let message = errors[0].to_string();
    assert!(
        message.contains(" at end: Expect ')' after expression."),
        "got: {}",
        message
    );
}

#[test]
fn error_at_token_renders_its_lexeme() {
    let (_, errors) = parse("print ;");

    assert_eq!(errors.len(), 1);
    assert!(errors[0]
        .to_string()
        .contains(" at ';': Expect expression."));
}

#[test]
fn super_is_reserved_but_has_no_grammar_rule() {
    let (_, errors) = parse("super.x;");

    assert_eq!(errors.len(), 1);
    assert!(errors[0]
        .to_string()
        .contains(" at 'super': Expect expression."));
}

#[test]
fn argument_list_is_capped_at_255() {
    let arguments: Vec<String> = (0..256).map(|i| format!("a{}", i)).collect();
    let source = format!("f({});", arguments.join(", "));

    let (statements, errors) = parse(&source);

    assert_eq!(errors.len(), 1);
    assert!(errors[0]
        .to_string()
        .contains("Can't have more than 255 arguments."));

    // The call still parses with every argument attached.
    let Stmt::Expression(Expr::Call { arguments, .. }) = &statements[0] else {
        panic!("expected call expression");
    };

    assert_eq!(arguments.len(), 256);
}

#[test]
fn parameter_list_is_capped_at_255() {
    let params: Vec<String> = (0..256).map(|i| format!("p{}", i)).collect();
    let source = format!("fun f({}) {{}}", params.join(", "));

    let (statements, errors) = parse(&source);

    assert_eq!(errors.len(), 1);
    assert!(errors[0]
        .to_string()
        .contains("Can't have more than 255 parameters."));
    assert_eq!(statements.len(), 1);
}

#[test]
fn class_declaration_collects_methods() {
    let statements = parse_ok("class A { init(x) {} m() {} }");

    let Stmt::Class { name, methods } = &statements[0] else {
        panic!("expected class declaration");
    };

    assert_eq!(name.lexeme, "A");
    assert_eq!(methods.len(), 2);
    assert_eq!(methods[0].name.lexeme, "init");
    assert_eq!(methods[0].params.len(), 1);
    assert_eq!(methods[1].name.lexeme, "m");
}

#[test]
fn expression_ids_stay_unique_across_parsers() {
    let tokens = |src: &str| -> Vec<Token> {
        Scanner::new(src.as_bytes())
            .filter_map(Result::ok)
            .collect()
    };

    let mut first = Parser::new(tokens("print a;"), 0);
    first.parse();
    let watermark = first.next_id();
    assert!(watermark > 0);

    // A second parser seeded with the watermark allocates fresh ids.
    let mut second = Parser::new(tokens("print b;"), watermark);
    let statements = second.parse();

    let Stmt::Print(Expr::Variable { id, .. }) = &statements[0] else {
        panic!("expected variable print");
    };

    assert_eq!(id.0, watermark);
}
