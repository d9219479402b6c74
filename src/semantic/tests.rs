use super::*;
use crate::parser::ast::*;
use crate::parser::parse_source;
use pretty_assertions::assert_eq;
use std::path::Path;

fn parse(source: &str) -> Crate {
    parse_source(source, Path::new("test.rl")).expect("parse failed")
}

fn analyze_source(source: &str) -> Result<(Crate, Analysis), SemanticError> {
    let mut krate = parse(source);
    let analysis = analyze(&mut krate)?;
    Ok((krate, analysis))
}

fn check(source: &str) -> Result<(), SemanticError> {
    analyze_source(source).map(|_| ())
}

fn expect_error(source: &str) -> SemanticErrorKind {
    match check(source) {
        Err(e) => e.kind,
        Ok(()) => panic!("expected a semantic error"),
    }
}

fn function_body(krate: &Crate, index: usize) -> &Block {
    let Item::Function(f) = &krate.items[index] else {
        panic!("item {} is not a function", index)
    };
    f.body.as_ref().expect("function has no body")
}

fn let_stmt(block: &Block, index: usize) -> &LetStmt {
    let Stmt::Let(l) = &block.stmts[index] else {
        panic!("statement {} is not a let", index)
    };
    l
}

fn candidate_names(analysis: &Analysis, expr: &Expr) -> Vec<String> {
    expr.candidate_types
        .iter()
        .map(|t| analysis.types.display(*t))
        .collect()
}

// Forward references: the two-phase skeleton/bind split

#[test]
fn test_forward_reference() {
    let source = r#"
fn caller() -> i32 {
    callee()
}

fn callee() -> i32 {
    42
}
"#;
    assert!(check(source).is_ok());
}

#[test]
fn test_forward_reference_to_struct() {
    let source = r#"
fn make() -> Point {
    Point { x: 1, y: 2 }
}

struct Point {
    x: i32,
    y: i32,
}
"#;
    assert!(check(source).is_ok());
}

#[test]
fn test_nested_item_forward_reference() {
    let source = r#"
fn main() {
    let x = helper();
    fn helper() -> i32 { 7 }
    let y: i32 = x;
}
"#;
    assert!(check(source).is_ok());
}

// Literal defaulting and candidate narrowing

#[test]
fn test_literal_narrowed_by_let_type() {
    let source = r#"
fn main() {
    let x: u32 = 5;
}
"#;
    let (krate, analysis) = analyze_source(source).expect("analysis failed");
    let body = function_body(&krate, 0);
    let init = let_stmt(body, 0).init.as_ref().expect("no initializer");
    assert_eq!(candidate_names(&analysis, init), vec!["u32"]);
}

#[test]
fn test_unconstrained_literal_keeps_four_candidates() {
    let source = r#"
fn main() {
    let y = 5;
}
"#;
    let (krate, analysis) = analyze_source(source).expect("analysis failed");
    let body = function_body(&krate, 0);
    let init = let_stmt(body, 0).init.as_ref().expect("no initializer");
    assert_eq!(
        candidate_names(&analysis, init),
        vec!["i32", "u32", "isize", "usize"]
    );
}

#[test]
fn test_suffixed_literal_is_fixed() {
    let source = r#"
fn main() {
    let y = 5usize;
}
"#;
    let (krate, analysis) = analyze_source(source).expect("analysis failed");
    let body = function_body(&krate, 0);
    let init = let_stmt(body, 0).init.as_ref().expect("no initializer");
    assert_eq!(candidate_names(&analysis, init), vec!["usize"]);
}

// cap() algebra

#[test]
fn test_cap_narrows_integer_candidates() {
    let mut types = TypeArena::new();
    let never = types.primitive("never");
    let four = [
        types.primitive("i32"),
        types.primitive("u32"),
        types.primitive("isize"),
        types.primitive("usize"),
    ];
    let u32_ty = four[1];
    assert_eq!(check::cap(&types, never, &four, &[u32_ty]), vec![u32_ty]);
}

#[test]
fn test_cap_is_idempotent_and_order_preserving() {
    let mut types = TypeArena::new();
    let never = types.primitive("never");
    let four = vec![
        types.primitive("i32"),
        types.primitive("u32"),
        types.primitive("isize"),
        types.primitive("usize"),
    ];
    assert_eq!(check::cap(&types, never, &four, &four), four);

    let reversed: Vec<TypeId> = four.iter().rev().copied().collect();
    // Order of the left side wins; content is symmetric
    let ab = check::cap(&types, never, &four, &reversed);
    let ba = check::cap(&types, never, &reversed, &four);
    assert_eq!(ab, four);
    assert_eq!(ba, reversed);
}

#[test]
fn test_cap_never_is_identity() {
    let mut types = TypeArena::new();
    let never = types.primitive("never");
    let i32_ty = types.primitive("i32");
    let bool_ty = types.primitive("bool");
    assert_eq!(
        check::cap(&types, never, &[never], &[i32_ty, bool_ty]),
        vec![i32_ty, bool_ty]
    );
    assert_eq!(check::cap(&types, never, &[i32_ty], &[never]), vec![i32_ty]);
}

// Duplicate definitions

#[test]
fn test_duplicate_struct_field() {
    let source = r#"
struct P {
    x: i32,
    x: u32,
}
"#;
    assert_eq!(
        expect_error(source),
        SemanticErrorKind::DuplicateDefinition("x".to_string())
    );
}

#[test]
fn test_duplicate_method_in_impl() {
    let source = r#"
struct P {
    v: i32,
}

impl P {
    fn get(&self) -> i32 { self.v }
    fn get(&self) -> i32 { 1 }
}
"#;
    assert_eq!(
        expect_error(source),
        SemanticErrorKind::DuplicateDefinition("get".to_string())
    );
}

#[test]
fn test_duplicate_function_at_root() {
    let source = r#"
fn a() {}
fn a() {}
"#;
    assert_eq!(
        expect_error(source),
        SemanticErrorKind::DuplicateDefinition("a".to_string())
    );
}

#[test]
fn test_redeclaration_in_same_scope() {
    let source = r#"
fn main() {
    let x = 1;
    let x = 2;
}
"#;
    assert_eq!(
        expect_error(source),
        SemanticErrorKind::DuplicateDefinition("x".to_string())
    );
}

// Mutability

#[test]
fn test_assign_to_immutable() {
    let source = r#"
fn main() {
    let v = 1;
    v = 2;
}
"#;
    assert_eq!(expect_error(source), SemanticErrorKind::NotMutable);
}

#[test]
fn test_assign_to_mutable() {
    let source = r#"
fn main() {
    let mut v = 1;
    v = 2;
}
"#;
    assert!(check(source).is_ok());
}

#[test]
fn test_deferred_initialization() {
    let source = r#"
fn main() {
    let v: i32;
    v = 5;
}
"#;
    assert!(check(source).is_ok());
}

#[test]
fn test_deferred_initialization_only_once() {
    let source = r#"
fn main() {
    let v: i32;
    v = 5;
    v = 6;
}
"#;
    assert_eq!(expect_error(source), SemanticErrorKind::NotMutable);
}

#[test]
fn test_assignment_has_type_void() {
    let source = r#"
fn main() {
    let mut v = 1;
    let u: () = { v = 2 };
}
"#;
    // The block's tail is the assignment, so the block types as void
    assert!(check(source).is_ok());
}

// Constant folding

#[test]
fn test_constant_folding_round_trip() {
    let source = r#"
const N: usize = 2 + 3 * 4;

fn main() {
    let a: [i32; N] = [0; N];
}
"#;
    let (krate, analysis) = analyze_source(source).expect("analysis failed");
    assert_eq!(
        analysis.scopes.lookup_constant(ScopeTree::ROOT, "N"),
        Some(&ConstValue::Integer(14))
    );
    let body = function_body(&krate, 1);
    let l = let_stmt(body, 0);
    let ty = l.ty.as_ref().and_then(|t| t.resolved).expect("unresolved");
    assert_eq!(analysis.types.display(ty), "[i32; 14]");
    let init = l.init.as_ref().expect("no initializer");
    assert_eq!(candidate_names(&analysis, init), vec!["[i32; 14]"]);
}

#[test]
fn test_const_requires_compiler_known_initializer() {
    let source = r#"
fn f() -> i32 { 1 }

const N: i32 = f();
"#;
    assert_eq!(expect_error(source), SemanticErrorKind::NotConstEvaluable);
}

#[test]
fn test_const_of_non_numeric_type_is_not_folded() {
    let source = r#"
const GREETING: string = "hi";

fn main() {
    let s: string = GREETING;
}
"#;
    let (_, analysis) = analyze_source(source).expect("analysis failed");
    assert_eq!(
        analysis.scopes.lookup_constant(ScopeTree::ROOT, "GREETING"),
        None
    );
}

#[test]
fn test_const_type_mismatch() {
    let source = r#"
const N: i32 = true;
"#;
    assert!(matches!(
        expect_error(source),
        SemanticErrorKind::TypeMismatch(_)
    ));
}

#[test]
fn test_division_by_folded_zero_is_not_const() {
    let source = r#"
const BAD: i32 = 1 / (2 - 2);
"#;
    assert_eq!(expect_error(source), SemanticErrorKind::NotConstEvaluable);
}

#[test]
fn test_shift_and_bitwise_folding() {
    let source = r#"
const A: usize = 1 << 4;
const B: usize = A | 3;

fn main() {
    let x: [i32; B] = [0; B];
}
"#;
    let (_, analysis) = analyze_source(source).expect("analysis failed");
    assert_eq!(
        analysis.scopes.lookup_constant(ScopeTree::ROOT, "B"),
        Some(&ConstValue::Integer(19))
    );
}

// Loop context

#[test]
fn test_continue_outside_loop() {
    let source = r#"
fn main() {
    continue;
}
"#;
    assert_eq!(
        expect_error(source),
        SemanticErrorKind::BreakOrContinueOutsideLoop("continue")
    );
}

#[test]
fn test_continue_inside_loop() {
    let source = r#"
fn main() {
    loop {
        continue;
    }
}
"#;
    assert!(check(source).is_ok());
}

#[test]
fn test_break_outside_loop() {
    let source = r#"
fn main() {
    break;
}
"#;
    assert_eq!(
        expect_error(source),
        SemanticErrorKind::BreakOrContinueOutsideLoop("break")
    );
}

#[test]
fn test_break_with_value_in_while() {
    let source = r#"
fn main() {
    while true {
        break 1;
    }
}
"#;
    assert!(matches!(
        expect_error(source),
        SemanticErrorKind::InvalidOperand(_)
    ));
}

#[test]
fn test_loop_takes_break_type() {
    let source = r#"
fn main() {
    let x: i32 = loop {
        break 5;
    };
}
"#;
    assert!(check(source).is_ok());
}

#[test]
fn test_inconsistent_break_types() {
    let source = r#"
fn main() {
    let x = loop {
        if true {
            break 1;
        }
        break true;
    };
}
"#;
    assert!(matches!(
        expect_error(source),
        SemanticErrorKind::TypeMismatch(_)
    ));
}

#[test]
fn test_break_inside_nested_function_is_outside_loop() {
    let source = r#"
fn main() {
    loop {
        fn inner() {
            break;
        }
    }
}
"#;
    assert_eq!(
        expect_error(source),
        SemanticErrorKind::BreakOrContinueOutsideLoop("break")
    );
}

// Structs, impls and member access

#[test]
fn test_struct_impl_method_resolution() {
    let source = r#"
struct P {
    x: i32,
}

impl P {
    fn get(&self) -> i32 {
        self.x
    }
}

fn read(p: P) -> i32 {
    p.get()
}
"#;
    let (krate, analysis) = analyze_source(source).expect("analysis failed");
    let body = function_body(&krate, 2);
    let call = body.tail.as_ref().expect("no tail expression");
    assert_eq!(candidate_names(&analysis, call), vec!["i32"]);
}

#[test]
fn test_associated_function_and_self() {
    let source = r#"
struct P {
    x: i32,
}

impl P {
    fn make() -> Self {
        P { x: 0 }
    }
}

fn main() {
    let p: P = P::make();
}
"#;
    assert!(check(source).is_ok());
}

#[test]
fn test_associated_constant_as_array_length() {
    let source = r#"
struct P {
    x: i32,
}

impl P {
    const K: usize = 3;
}

fn main() {
    let a: [i32; P::K] = [0; P::K];
}
"#;
    let (krate, analysis) = analyze_source(source).expect("analysis failed");
    let body = function_body(&krate, 2);
    let ty = let_stmt(body, 0)
        .ty
        .as_ref()
        .and_then(|t| t.resolved)
        .expect("unresolved");
    assert_eq!(analysis.types.display(ty), "[i32; 3]");
}

#[test]
fn test_invalid_member_access() {
    let source = r#"
struct P {
    x: i32,
}

fn f(p: P) {
    p.y;
}
"#;
    assert!(matches!(
        expect_error(source),
        SemanticErrorKind::InvalidMemberAccess { member, .. } if member == "y"
    ));
}

#[test]
fn test_mut_self_method_requires_mutable_receiver() {
    let source = r#"
struct C {
    n: i32,
}

impl C {
    fn bump(&mut self) {
        self.n = self.n + 1;
    }
}

fn main() {
    let c = C { n: 0 };
    c.bump();
}
"#;
    assert_eq!(expect_error(source), SemanticErrorKind::NotMutable);
}

#[test]
fn test_mut_self_method_on_mutable_receiver() {
    let source = r#"
struct C {
    n: i32,
}

impl C {
    fn bump(&mut self) {
        self.n = self.n + 1;
    }
}

fn main() {
    let mut c = C { n: 0 };
    c.bump();
}
"#;
    assert!(check(source).is_ok());
}

#[test]
fn test_struct_literal_missing_field() {
    let source = r#"
struct P {
    x: i32,
    y: i32,
}

fn main() {
    let p = P { x: 1 };
}
"#;
    assert!(matches!(
        expect_error(source),
        SemanticErrorKind::TypeMismatch(_)
    ));
}

#[test]
fn test_member_access_through_reference() {
    let source = r#"
struct P {
    x: i32,
}

fn read(p: &P) -> i32 {
    p.x
}
"#;
    assert!(check(source).is_ok());
}

// Enumerations and match

#[test]
fn test_enum_variant_path_and_comparison() {
    let source = r#"
enum Color {
    Red,
    Green,
    Blue,
}

fn main() {
    let c: Color = Color::Red;
    let same: bool = c == Color::Red;
}
"#;
    assert!(check(source).is_ok());
}

#[test]
fn test_enum_discriminants_are_folded() {
    let source = r#"
enum Status {
    Ok = 0,
    NotFound = 404,
    Error,
}
"#;
    let (_, analysis) = analyze_source(source).expect("analysis failed");
    let ty = analysis
        .scopes
        .lookup(ScopeTree::ROOT, "Status")
        .expect("enum not declared")
        .ty;
    let values = &analysis.types.get(ty).value_map;
    assert_eq!(values.get("NotFound"), Some(&ConstValue::Integer(404)));
    assert_eq!(values.get("Error"), Some(&ConstValue::Integer(405)));
}

#[test]
fn test_match_arms_cap_to_common_type() {
    let source = r#"
enum Color {
    Red,
    Green,
}

fn pick(c: Color) -> i32 {
    match c {
        Color::Red => 1,
        _ => 0,
    }
}
"#;
    assert!(check(source).is_ok());
}

#[test]
fn test_match_binding_takes_scrutinee_type() {
    let source = r#"
fn double(x: i32) -> i32 {
    match x {
        0 => 0,
        n => n + n,
    }
}
"#;
    assert!(check(source).is_ok());
}

#[test]
fn test_match_incompatible_arms() {
    let source = r#"
fn main() {
    let x = match 1 {
        0 => true,
        _ => "no",
    };
}
"#;
    assert!(matches!(
        expect_error(source),
        SemanticErrorKind::TypeMismatch(_)
    ));
}

// Operators

#[test]
fn test_logical_and_requires_bool() {
    let source = r#"
fn main() {
    let b = 1 && 2;
}
"#;
    assert!(matches!(
        expect_error(source),
        SemanticErrorKind::InvalidOperand(_)
    ));
}

#[test]
fn test_condition_requires_bool() {
    let source = r#"
fn main() {
    if 1 {
    }
}
"#;
    assert!(matches!(
        expect_error(source),
        SemanticErrorKind::InvalidOperand(_)
    ));
}

#[test]
fn test_if_else_branch_mismatch() {
    let source = r#"
fn main() {
    let x = if true { 1 } else { false };
}
"#;
    assert!(matches!(
        expect_error(source),
        SemanticErrorKind::TypeMismatch(_)
    ));
}

#[test]
fn test_unary_minus_requires_signed() {
    let source = r#"
fn main() {
    let x: u32 = 5;
    let y = -x;
}
"#;
    assert!(matches!(
        expect_error(source),
        SemanticErrorKind::InvalidOperand(_)
    ));
}

#[test]
fn test_operator_narrowing_via_typed_operand() {
    let source = r#"
fn main() {
    let a: u32 = 2;
    let b = a + 3;
    let c: u32 = b;
}
"#;
    assert!(check(source).is_ok());
}

#[test]
fn test_shift_sides_are_independent() {
    let source = r#"
fn main() {
    let n: u32 = 1;
    let shifted: u32 = n << 3i32;
}
"#;
    assert!(check(source).is_ok());
}

#[test]
fn test_cast_narrows_literal() {
    let source = r#"
fn main() {
    let z: u32 = 5 as u32;
}
"#;
    assert!(check(source).is_ok());
}

// Calls

#[test]
fn test_undeclared_name() {
    let source = r#"
fn main() {
    missing();
}
"#;
    assert_eq!(
        expect_error(source),
        SemanticErrorKind::UndeclaredName("missing".to_string())
    );
}

#[test]
fn test_arity_mismatch() {
    let source = r#"
fn f(a: i32) {}

fn main() {
    f();
}
"#;
    assert_eq!(
        expect_error(source),
        SemanticErrorKind::ArityMismatch {
            expected: 1,
            found: 0
        }
    );
}

#[test]
fn test_argument_type_mismatch() {
    let source = r#"
fn f(a: i32) {}

fn main() {
    f(true);
}
"#;
    assert!(matches!(
        expect_error(source),
        SemanticErrorKind::TypeMismatch(_)
    ));
}

#[test]
fn test_call_on_non_function() {
    let source = r#"
fn main() {
    let x = 1;
    x();
}
"#;
    assert!(matches!(
        expect_error(source),
        SemanticErrorKind::InvalidOperand(_)
    ));
}

// References

#[test]
fn test_mutable_reference_satisfies_immutable_parameter() {
    let source = r#"
fn take(r: &i32) -> i32 {
    *r
}

fn main() {
    let mut v = 1;
    let x: i32 = take(&mut v);
}
"#;
    assert!(check(source).is_ok());
}

#[test]
fn test_immutable_reference_rejected_for_mutable_parameter() {
    let source = r#"
fn set(r: &mut i32) {
    *r = 3;
}

fn main() {
    let v = 1;
    set(&v);
}
"#;
    assert!(matches!(
        expect_error(source),
        SemanticErrorKind::TypeMismatch(_)
    ));
}

#[test]
fn test_assignment_through_mutable_reference_parameter() {
    let source = r#"
fn set(r: &mut i32) {
    *r = 3;
}
"#;
    assert!(check(source).is_ok());
}

// Indexing

#[test]
fn test_index_into_array() {
    let source = r#"
fn main() {
    let a = [1, 2, 3];
    let x: i32 = a[0];
}
"#;
    assert!(check(source).is_ok());
}

#[test]
fn test_index_base_must_be_array() {
    let source = r#"
fn main() {
    let x = 1;
    let y = x[0];
}
"#;
    assert!(matches!(
        expect_error(source),
        SemanticErrorKind::InvalidIndexBase(_)
    ));
}

#[test]
fn test_index_must_be_usize() {
    let source = r#"
fn main() {
    let a = [1, 2];
    let i: i32 = 0;
    let y = a[i];
}
"#;
    assert!(matches!(
        expect_error(source),
        SemanticErrorKind::TypeMismatch(_)
    ));
}

// Return types and diverging control flow

#[test]
fn test_early_return_matches_declared_type() {
    let source = r#"
fn f(flag: bool) -> i32 {
    if flag {
        return 1;
    }
    2
}
"#;
    assert!(check(source).is_ok());
}

#[test]
fn test_return_type_mismatch() {
    let source = r#"
fn f() -> i32 {
    true
}
"#;
    assert!(matches!(
        expect_error(source),
        SemanticErrorKind::TypeMismatch(_)
    ));
}

#[test]
fn test_inconsistent_returns() {
    let source = r#"
fn f(flag: bool) -> i32 {
    if flag {
        return 1;
    }
    return true;
}
"#;
    assert!(matches!(
        expect_error(source),
        SemanticErrorKind::TypeMismatch(_)
    ));
}

#[test]
fn test_statements_after_return_are_skipped() {
    let source = r#"
fn f() -> i32 {
    return 1;
    undeclared();
}
"#;
    assert!(check(source).is_ok());
}

// Builtins

#[test]
fn test_builtin_functions_and_methods() {
    let source = r#"
fn main() {
    print("hello");
    let s: string = get_string();
    let n: usize = s.len();
    let t: string = get_int().to_string();
    exit(0);
}
"#;
    assert!(check(source).is_ok());
}

// Scope tree shape

#[test]
fn test_scope_handles_recorded_on_nodes() {
    let source = r#"
struct P {
    x: i32,
}

impl P {
    fn get(&self) -> i32 {
        self.x
    }
}

fn main() {
    let a = {
        1
    };
}
"#;
    let (krate, _) = analyze_source(source).expect("analysis failed");
    assert_eq!(krate.scope, Some(ScopeTree::ROOT));
    let Item::Impl(i) = &krate.items[1] else {
        panic!("expected impl");
    };
    assert!(i.scope.is_some());
    let body = function_body(&krate, 2);
    assert!(body.scope.is_some());
    let init = let_stmt(body, 0).init.as_ref().expect("no initializer");
    let ExprKind::Block(inner) = &init.kind else {
        panic!("expected block initializer");
    };
    assert!(inner.scope.is_some());
    assert_ne!(inner.scope, body.scope);
}
