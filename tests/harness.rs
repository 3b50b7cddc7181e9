//! End-to-end scenarios driven through the public API, the way an embedding
//! driver (a REPL or a script runner) would use the crate.

use std::rc::Rc;

use anyhow::{Result, ensure};

use treewalk::ast::{
    Block, Condition, Declare, DeclareList, Expr, FuncDef, OpCode, OpExpr, Stmt, VarExpr, While,
};
use treewalk::{Error, Interpreter, ResolveError, RuntimeError, Value};

fn int(value: i64) -> Expr {
    Expr::Int(value)
}

fn text(value: &str) -> Expr {
    Expr::Str(value.to_string())
}

fn var(name: &str) -> Expr {
    Expr::Var(VarExpr::new(name))
}

fn op(code: OpCode, args: Vec<Expr>) -> Expr {
    Expr::Op(OpExpr { op: code, args })
}

fn binary(code: OpCode, lhs: Expr, rhs: Expr) -> Expr {
    op(code, vec![lhs, rhs])
}

fn set(name: &str, value: Expr) -> Stmt {
    Stmt::Expr(binary(OpCode::Assign, var(name), value))
}

fn call(callee: Expr, args: Vec<Expr>) -> Expr {
    let mut all = vec![callee];
    all.extend(args);
    op(OpCode::Call, all)
}

fn declare(entries: Vec<(&str, Option<Expr>)>) -> Rc<DeclareList> {
    DeclareList::new(
        entries
            .into_iter()
            .map(|(name, init)| Declare {
                name: name.to_string(),
                init,
            })
            .collect(),
    )
}

fn func(params: &[&str], body: Vec<Stmt>) -> Expr {
    let params = if params.is_empty() {
        None
    } else {
        Some(declare(params.iter().map(|name| (*name, None)).collect()))
    };
    Expr::Func(FuncDef::new(params, Block::new(body)))
}

fn while_loop(test: Expr, body: Vec<Stmt>) -> Stmt {
    Stmt::While(While {
        test,
        body: Block::new(body),
    })
}

fn if_then(test: Expr, then_body: Vec<Stmt>) -> Stmt {
    Stmt::Condition(Condition {
        test,
        then_block: Block::new(then_body),
        orelse: None,
    })
}

fn run(interp: &mut Interpreter, stmts: Vec<Stmt>) -> Result<()> {
    for stmt in stmts {
        interp.eval_raw_stmt(&stmt)?;
    }
    Ok(())
}

#[test]
fn arithmetic_over_globals() -> Result<()> {
    let mut interp = Interpreter::new();
    interp.eval_raw_decl_list(&declare(vec![("a", Some(int(1))), ("b", Some(int(2)))]))?;
    let result = interp.eval_raw_exp(&binary(
        OpCode::Add,
        var("a"),
        binary(OpCode::Mul, var("b"), int(3)),
    ))?;
    ensure!(result == Value::Int(7), "got {}", interp.render(&result));
    Ok(())
}

#[test]
fn while_loop_builds_a_string() -> Result<()> {
    let mut interp = Interpreter::new();
    interp.eval_raw_decl_list(&declare(vec![("s", Some(text(""))), ("i", Some(int(0)))]))?;
    run(
        &mut interp,
        vec![while_loop(
            binary(OpCode::Lt, var("i"), int(3)),
            vec![
                set("s", binary(OpCode::Add, var("s"), text("x"))),
                set("i", binary(OpCode::Add, var("i"), int(1))),
            ],
        )],
    )?;
    let result = interp.eval_raw_exp(&var("s"))?;
    ensure!(result == Value::Str("xxx".to_string()));
    Ok(())
}

#[test]
fn counter_closure_keeps_private_state() -> Result<()> {
    let mut interp = Interpreter::new();
    interp.eval_raw_decl_list(&declare(vec![(
        "make",
        Some(func(
            &["n"],
            vec![Stmt::Return(Some(func(
                &[],
                vec![
                    set("n", binary(OpCode::Add, var("n"), int(1))),
                    Stmt::Return(Some(var("n"))),
                ],
            )))],
        )),
    )]))?;
    interp.eval_raw_decl_list(&declare(vec![("c", Some(call(var("make"), vec![int(10)])))]))?;
    run(
        &mut interp,
        vec![
            Stmt::Expr(call(var("c"), vec![])),
            Stmt::Expr(call(var("c"), vec![])),
        ],
    )?;
    let result = interp.eval_raw_exp(&call(var("c"), vec![]))?;
    ensure!(result == Value::Int(13));
    Ok(())
}

#[test]
fn list_updates_are_visible_through_the_binding() -> Result<()> {
    let mut interp = Interpreter::new();
    interp.eval_raw_decl_list(&declare(vec![(
        "xs",
        Some(Expr::List(vec![int(1), int(2), int(3)])),
    )]))?;
    run(
        &mut interp,
        vec![Stmt::Expr(binary(
            OpCode::Assign,
            binary(OpCode::Subscript, var("xs"), int(1)),
            binary(
                OpCode::Add,
                binary(OpCode::Subscript, var("xs"), int(0)),
                binary(OpCode::Subscript, var("xs"), int(2)),
            ),
        ))],
    )?;
    let result = interp.eval_raw_exp(&var("xs"))?;
    ensure!(interp.render(&result) == "[1, 4, 3]");
    Ok(())
}

#[test]
fn recursive_factorial() -> Result<()> {
    let mut interp = Interpreter::new();
    interp.eval_raw_decl_list(&declare(vec![(
        "fact",
        Some(func(
            &["n"],
            vec![
                if_then(
                    binary(OpCode::LtEq, var("n"), int(1)),
                    vec![Stmt::Return(Some(int(1)))],
                ),
                Stmt::Return(Some(binary(
                    OpCode::Mul,
                    var("n"),
                    call(var("fact"), vec![binary(OpCode::Sub, var("n"), int(1))]),
                ))),
            ],
        )),
    )]))?;
    let result = interp.eval_raw_exp(&call(var("fact"), vec![int(6)]))?;
    ensure!(result == Value::Int(720));
    Ok(())
}

#[test]
fn error_taxonomy_reaches_the_driver() {
    let mut interp = Interpreter::new();

    interp
        .eval_raw_decl_list(&declare(vec![("a", None)]))
        .expect("declaration");
    assert_eq!(
        interp
            .eval_raw_exp(&binary(OpCode::Add, var("a"), int(1)))
            .expect_err("null + int"),
        Error::Runtime(RuntimeError::UnsupportedBinary {
            op: "+",
            lhs: "null",
            rhs: "int"
        })
    );

    assert_eq!(
        interp
            .eval_raw_exp(&binary(OpCode::Div, int(1), int(0)))
            .expect_err("division by zero"),
        Error::Runtime(RuntimeError::ZeroDivision)
    );

    assert_eq!(
        interp
            .eval_raw_exp(&call(func(&[], vec![]), vec![int(1)]))
            .expect_err("arity mismatch"),
        Error::Runtime(RuntimeError::FunctionArityMismatch {
            expected: 0,
            found: 1
        })
    );

    assert_eq!(
        interp
            .eval_raw_exp(&var("z"))
            .expect_err("unbound name"),
        Error::Resolve(ResolveError::NoSuchName {
            name: "z".to_string()
        })
    );
}

#[test]
fn whole_program_execution_resolves_forward_references() -> Result<()> {
    // Script-runner path: the second global is visible to the first
    // statement's function body, as it would be anywhere inside one block.
    let mut interp = Interpreter::new();
    interp.eval_program(&[
        Stmt::DeclareList(declare(vec![(
            "double_of",
            Some(func(
                &["n"],
                vec![Stmt::Return(Some(call(
                    var("twice"),
                    vec![var("n")],
                )))],
            )),
        )])),
        Stmt::DeclareList(declare(vec![(
            "twice",
            Some(func(
                &["n"],
                vec![Stmt::Return(Some(binary(OpCode::Mul, var("n"), int(2))))],
            )),
        )])),
        Stmt::Expr(call(var("print"), vec![call(var("double_of"), vec![int(21)])])),
    ])?;
    ensure!(interp.take_output() == vec!["42".to_string()]);
    Ok(())
}

#[test]
fn repl_session_recovers_after_errors() -> Result<()> {
    let mut interp = Interpreter::new();

    interp.eval_raw_decl_list(&declare(vec![("total", Some(int(0)))]))?;
    // A failing statement must not poison the session.
    assert!(
        interp
            .eval_raw_stmt(&Stmt::Expr(binary(OpCode::Div, int(1), int(0))))
            .is_err()
    );
    run(
        &mut interp,
        vec![
            set("total", binary(OpCode::Add, var("total"), int(5))),
            Stmt::Expr(call(var("print"), vec![var("total")])),
        ],
    )?;
    ensure!(interp.take_output() == vec!["5".to_string()]);

    let result = interp.eval_raw_exp(&var("total"))?;
    ensure!(result == Value::Int(5));
    Ok(())
}

#[test]
fn dead_scopes_are_reclaimed_while_live_closures_survive() -> Result<()> {
    let mut interp = Interpreter::new();
    interp.collect_garbage();
    let baseline = interp.heap_size();

    // A closure stored only in its own dead scope is a cycle: collectable.
    run(
        &mut interp,
        vec![Stmt::Block(Block::new(vec![Stmt::DeclareList(declare(
            vec![("g", Some(func(&[], vec![Stmt::Return(Some(var("g")))])))],
        ))]))],
    )?;
    ensure!(interp.collect_garbage() > 0);
    ensure!(interp.heap_size() == baseline);

    // A closure reachable from a global keeps its captured frame alive.
    interp.eval_raw_decl_list(&declare(vec![(
        "make",
        Some(func(
            &["n"],
            vec![Stmt::Return(Some(func(
                &[],
                vec![
                    set("n", binary(OpCode::Add, var("n"), int(1))),
                    Stmt::Return(Some(var("n"))),
                ],
            )))],
        )),
    )]))?;
    interp.eval_raw_decl_list(&declare(vec![("c", Some(call(var("make"), vec![int(0)])))]))?;
    interp.collect_garbage();
    let result = interp.eval_raw_exp(&call(var("c"), vec![]))?;
    ensure!(result == Value::Int(1));
    Ok(())
}
