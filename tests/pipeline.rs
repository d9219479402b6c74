//! End-to-end tests: source text through the parser and all four semantic
//! passes.

use rill::parser::parse_source;
use rill::semantic::{self, SemanticErrorKind};
use std::path::Path;

fn analyze(source: &str) -> Result<(), semantic::SemanticError> {
    let mut krate = parse_source(source, Path::new("pipeline.rl")).expect("parse failed");
    semantic::analyze(&mut krate).map(|_| ())
}

#[test]
fn test_small_program_checks_clean() {
    let source = r#"
const CAPACITY: usize = 8 * 2;

struct Counter {
    value: i32,
    step: i32,
}

impl Counter {
    const START: i32 = 0;

    fn new(step: i32) -> Self {
        Counter { value: Counter::START, step: step }
    }

    fn tick(&mut self) {
        self.value = self.value + self.step;
    }

    fn current(&self) -> i32 {
        self.value
    }
}

enum Phase {
    Idle,
    Running,
    Done,
}

fn classify(total: i32) -> Phase {
    if total == 0 {
        Phase::Idle
    } else if total < 100 {
        Phase::Running
    } else {
        Phase::Done
    }
}

fn main() {
    let mut counter = Counter::new(7);
    let mut slots: [i32; CAPACITY] = [0; CAPACITY];
    let mut i: usize = 0;
    while i < 16 {
        counter.tick();
        slots[i] = counter.current();
        i = i + 1;
    }
    let phase = classify(counter.current());
    let label: string = match phase {
        Phase::Idle => "idle",
        Phase::Running => "running",
        Phase::Done => "done",
    };
    println(label);
    print_int(slots[0]);
    exit(0);
}
"#;
    assert!(analyze(source).is_ok());
}

#[test]
fn test_first_error_aborts_analysis() {
    let source = r#"
fn main() {
    let total = 1;
    total = 2;
    also_undeclared();
}
"#;
    // The mutability violation comes first; the undeclared call is never
    // reached
    let err = analyze(source).expect_err("expected an error");
    assert_eq!(err.kind, SemanticErrorKind::NotMutable);
}

#[test]
fn test_loop_value_feeds_binding() {
    let source = r#"
fn find_first_even(values: [u32; 4]) -> u32 {
    let mut i: usize = 0;
    let found: u32 = loop {
        if values[i] % 2 == 0 {
            break values[i];
        }
        i = i + 1;
    };
    found
}
"#;
    assert!(analyze(source).is_ok());
}
