//! Session-level behavior: interactive state persistence and the error
//! flags the CLI turns into exit codes.

use rox::lox::Lox;

fn session(lines: &[&str]) -> (String, bool, bool) {
    let mut output: Vec<u8> = Vec::new();

    let (had_error, had_runtime_error) = {
        let mut lox = Lox::new(&mut output);

        for line in lines {
            lox.run(line.as_bytes());
        }

        (lox.had_error(), lox.had_runtime_error())
    };

    (
        String::from_utf8(output).expect("program output should be UTF-8"),
        had_error,
        had_runtime_error,
    )
}

#[test]
fn globals_persist_across_lines() {
    let (output, had_error, had_runtime_error) =
        session(&["var a = 1;", "a = a + 1;", "print a;"]);

    assert_eq!(output, "2\n");
    assert!(!had_error);
    assert!(!had_runtime_error);
}

#[test]
fn functions_survive_the_line_that_declared_them() {
    let (output, ..) = session(&[
        "fun double(x) { return x * 2; }",
        "print double(21);",
    ]);

    assert_eq!(output, "42\n");
}

#[test]
fn closures_keep_their_defining_line_alive() {
    let (output, ..) = session(&[
        "fun makeCounter() { var i = 0; fun count() { i = i + 1; print i; } return count; }",
        "var c = makeCounter();",
        "c();",
        "c();",
    ]);

    assert_eq!(output, "1\n2\n");
}

#[test]
fn later_lines_never_alias_earlier_local_slots() {
    // Each line gets fresh expression ids, so the side-table entry recorded
    // for the block-local `a` cannot be confused with the later global read.
    let (output, ..) = session(&[
        "{ var a = \"local\"; print a; }",
        "var a = \"global\"; print a;",
        "print a;",
    ]);

    assert_eq!(output, "local\nglobal\nglobal\n");
}

#[test]
fn syntax_error_suppresses_execution_and_sets_the_flag() {
    let (output, had_error, had_runtime_error) = session(&["print 1"]);

    assert_eq!(output, "");
    assert!(had_error);
    assert!(!had_runtime_error);
}

#[test]
fn resolution_error_suppresses_execution() {
    let (output, had_error, _) = session(&["return 1;"]);

    assert_eq!(output, "");
    assert!(had_error);
}

#[test]
fn reset_clears_the_syntax_flag_only() {
    let mut output: Vec<u8> = Vec::new();
    let mut lox = Lox::new(&mut output);

    lox.run(b"print oops;");
    assert!(lox.had_runtime_error());

    lox.run(b"print 1");
    assert!(lox.had_error());

    lox.reset_error();
    assert!(!lox.had_error());

    // A runtime error is sticky for the whole session.
    assert!(lox.had_runtime_error());
}

#[test]
fn runtime_error_does_not_end_the_session() {
    let (output, had_error, had_runtime_error) =
        session(&["print 1 + \"x\";", "print \"still here\";"]);

    assert_eq!(output, "still here\n");
    assert!(!had_error);
    assert!(had_runtime_error);
}
