use super::*;
use crate::parser::ast::*;
use pretty_assertions::assert_eq;
use std::path::Path;

fn parse(source: &str) -> Crate {
    parse_source(source, Path::new("test.rl")).expect("parse failed")
}

fn parse_err(source: &str) -> String {
    let bag = parse_source(source, Path::new("test.rl")).expect_err("expected a parse error");
    bag.diagnostics()[0].code.clone()
}

fn only_function(krate: &Crate) -> &FunctionItem {
    let [Item::Function(f)] = krate.items.as_slice() else {
        panic!("expected exactly one function item")
    };
    f
}

fn tail_of(f: &FunctionItem) -> &Expr {
    f.body
        .as_ref()
        .and_then(|b| b.tail.as_ref())
        .expect("function has no tail expression")
}

#[test]
fn test_parse_function_signature() {
    let krate = parse("fn add(a: i32, b: i32) -> i32 { a + b }");
    let f = only_function(&krate);
    assert_eq!(f.name, "add");
    assert_eq!(f.params.len(), 2);
    assert_eq!(f.params[1].name, "b");
    assert!(f.ret.is_some());
    assert!(f.self_param.is_none());
}

#[test]
fn test_parse_struct_and_enum() {
    let krate = parse(
        r#"
struct Point {
    x: i32,
    y: i32,
}

enum Direction {
    North,
    South = 2,
}
"#,
    );
    let Item::Struct(s) = &krate.items[0] else {
        panic!("expected struct")
    };
    assert_eq!(s.name, "Point");
    assert_eq!(s.fields.len(), 2);
    let Item::Enum(e) = &krate.items[1] else {
        panic!("expected enum")
    };
    assert_eq!(e.variants.len(), 2);
    assert!(e.variants[1].discriminant.is_some());
}

#[test]
fn test_parse_impl_with_self_params() {
    let krate = parse(
        r#"
impl Point {
    const ORIGIN_X: i32 = 0;

    fn x(&self) -> i32 { self.x }
    fn set_x(&mut self, v: i32) { self.x = v; }
    fn consume(self) {}
}
"#,
    );
    let Item::Impl(i) = &krate.items[0] else {
        panic!("expected impl")
    };
    assert_eq!(i.target_name, "Point");
    assert_eq!(i.items.len(), 4);
    let AssocItem::Function(set_x) = &i.items[2] else {
        panic!("expected function")
    };
    let sp = set_x.self_param.as_ref().expect("missing self param");
    assert!(sp.is_ref);
    assert!(sp.is_mut);
    let AssocItem::Function(consume) = &i.items[3] else {
        panic!("expected function")
    };
    let sp = consume.self_param.as_ref().expect("missing self param");
    assert!(!sp.is_ref);
}

#[test]
fn test_precedence_mul_over_add() {
    let krate = parse("fn f() -> i32 { 1 + 2 * 3 }");
    let tail = tail_of(only_function(&krate));
    let ExprKind::Binary { op, rhs, .. } = &tail.kind else {
        panic!("expected binary expression")
    };
    assert_eq!(*op, BinaryOp::Add);
    assert!(matches!(
        rhs.kind,
        ExprKind::Binary {
            op: BinaryOp::Mul,
            ..
        }
    ));
}

#[test]
fn test_cast_binds_tighter_than_add() {
    let krate = parse("fn f() -> i32 { 1 as i32 + 2 }");
    let tail = tail_of(only_function(&krate));
    let ExprKind::Binary { op, lhs, .. } = &tail.kind else {
        panic!("expected binary expression")
    };
    assert_eq!(*op, BinaryOp::Add);
    assert!(matches!(lhs.kind, ExprKind::Cast { .. }));
}

#[test]
fn test_method_call_shape() {
    let krate = parse("fn f() { p.get(1)[0]; }");
    let f = only_function(&krate);
    let Some(Stmt::Expr { expr, .. }) = f.body.as_ref().map(|b| &b.stmts[0]) else {
        panic!("expected expression statement")
    };
    let ExprKind::Index { base, .. } = &expr.kind else {
        panic!("expected index")
    };
    let ExprKind::Call { callee, args } = &base.kind else {
        panic!("expected call")
    };
    assert_eq!(args.len(), 1);
    assert!(matches!(&callee.kind, ExprKind::Member { name, .. } if name == "get"));
}

#[test]
fn test_no_struct_literal_in_if_condition() {
    // `Name {` after `if` must start the then-block, not a struct literal
    let krate = parse("fn f(limit: bool) { if limit { } }");
    let f = only_function(&krate);
    let Some(Stmt::Expr { expr, .. }) = f.body.as_ref().map(|b| &b.stmts[0]) else {
        panic!("expected expression statement")
    };
    let ExprKind::If { cond, .. } = &expr.kind else {
        panic!("expected if")
    };
    assert!(matches!(cond.kind, ExprKind::Path(_)));
}

#[test]
fn test_struct_literal_in_let() {
    let krate = parse("fn f() { let p = Point { x: 1, y: 2 }; }");
    let f = only_function(&krate);
    let Some(Stmt::Let(l)) = f.body.as_ref().map(|b| &b.stmts[0]) else {
        panic!("expected let statement")
    };
    let init = l.init.as_ref().expect("no initializer");
    assert!(matches!(
        &init.kind,
        ExprKind::StructLit { name, fields } if name == "Point" && fields.len() == 2
    ));
}

#[test]
fn test_trailing_expression_becomes_tail() {
    let krate = parse("fn f() -> i32 { let x = 1; x }");
    let f = only_function(&krate);
    let body = f.body.as_ref().expect("no body");
    assert_eq!(body.stmts.len(), 1);
    assert!(body.tail.is_some());
}

#[test]
fn test_block_expression_statement_without_semicolon() {
    let krate = parse("fn f() { if true { } let x = 1; }");
    let f = only_function(&krate);
    let body = f.body.as_ref().expect("no body");
    assert_eq!(body.stmts.len(), 2);
    assert!(matches!(
        body.stmts[0],
        Stmt::Expr {
            has_semi: false,
            ..
        }
    ));
}

#[test]
fn test_array_types_and_literals() {
    let krate = parse("fn f() { let a: [i32; 4] = [0; 4]; let b = [1, 2, 3]; }");
    let f = only_function(&krate);
    let body = f.body.as_ref().expect("no body");
    let Stmt::Let(a) = &body.stmts[0] else {
        panic!("expected let")
    };
    assert!(matches!(
        a.ty.as_ref().map(|t| &t.kind),
        Some(TypeNodeKind::Array { .. })
    ));
    assert!(matches!(
        a.init.as_ref().map(|e| &e.kind),
        Some(ExprKind::ArrayRepeat { .. })
    ));
    let Stmt::Let(b) = &body.stmts[1] else {
        panic!("expected let")
    };
    assert!(matches!(
        b.init.as_ref().map(|e| &e.kind),
        Some(ExprKind::ArrayLit { elems }) if elems.len() == 3
    ));
}

#[test]
fn test_reference_types() {
    let krate = parse("fn f(a: &i32, b: &mut Point) {}");
    let f = only_function(&krate);
    assert!(matches!(
        f.params[0].ty.kind,
        TypeNodeKind::Reference { is_mut: false, .. }
    ));
    assert!(matches!(
        f.params[1].ty.kind,
        TypeNodeKind::Reference { is_mut: true, .. }
    ));
}

#[test]
fn test_match_with_guard_and_paths() {
    let krate = parse(
        r#"
fn f(c: Color) -> i32 {
    match c {
        Color::Red if true => 1,
        other => 0,
    }
}
"#,
    );
    let tail = tail_of(only_function(&krate));
    let ExprKind::Match { arms, .. } = &tail.kind else {
        panic!("expected match")
    };
    assert_eq!(arms.len(), 2);
    assert!(matches!(arms[0].pattern.kind, PatternKind::Path(_)));
    assert!(arms[0].guard.is_some());
    assert!(matches!(
        &arms[1].pattern.kind,
        PatternKind::Binding { name, .. } if name == "other"
    ));
}

#[test]
fn test_let_else_clause() {
    let krate = parse("fn f() { let x: i32 = 1 else { 2 }; }");
    let f = only_function(&krate);
    let Some(Stmt::Let(l)) = f.body.as_ref().map(|b| &b.stmts[0]) else {
        panic!("expected let")
    };
    assert!(l.else_block.is_some());
}

#[test]
fn test_break_with_and_without_value() {
    let krate = parse("fn f() { loop { break; } loop { break 1; } let done = 1; }");
    let f = only_function(&krate);
    let body = f.body.as_ref().expect("no body");
    let breaks: Vec<bool> = body
        .stmts
        .iter()
        .take(2)
        .map(|stmt| {
            let Stmt::Expr { expr, .. } = stmt else {
                panic!("expected expression statement")
            };
            let ExprKind::Loop { body } = &expr.kind else {
                panic!("expected loop")
            };
            let Some(Stmt::Expr { expr, .. }) = body.stmts.first() else {
                panic!("expected break statement")
            };
            let ExprKind::Break { value } = &expr.kind else {
                panic!("expected break")
            };
            value.is_some()
        })
        .collect();
    assert_eq!(breaks, vec![false, true]);
}

#[test]
fn test_missing_semicolon_is_rejected() {
    assert_eq!(parse_err("fn f() { let x = 1 let y = 2; }"), "E1001");
}

#[test]
fn test_unexpected_token_at_item_level() {
    assert_eq!(parse_err("42"), "E1001");
}

#[test]
fn test_expression_statement_needs_semicolon() {
    assert_eq!(parse_err("fn f() { 1 + 2 let x = 3; }"), "E1003");
}

#[test]
fn test_trait_items_parse_without_bodies() {
    let krate = parse(
        r#"
trait Shape {
    fn area(&self) -> i32;
    fn name(&self) -> string;
}
"#,
    );
    let Item::Trait(t) = &krate.items[0] else {
        panic!("expected trait")
    };
    assert_eq!(t.items.len(), 2);
    let AssocItem::Function(f) = &t.items[0] else {
        panic!("expected function")
    };
    assert!(f.body.is_none());
}
