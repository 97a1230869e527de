//! Whole-pipeline tests: compile a source program, execute it on the
//! machine, and check the halt status.

use crumb::{Vm, VmConfig, VmError};
use crumb_lang::compile;

fn run(source: &str) -> u32 {
    let image = compile(source).expect("program should compile");
    let mut vm = Vm::new(image, VmConfig::default()).expect("machine should initialize");
    vm.run().expect("program should halt")
}

fn run_result(source: &str) -> Result<u32, VmError> {
    let image = compile(source).expect("program should compile");
    let mut vm = Vm::new(image, VmConfig::default()).expect("machine should initialize");
    vm.run()
}

#[test]
fn minimal_program_exits_zero() {
    assert_eq!(run("int main() { return 0; }"), 0);
}

#[test]
fn constant_arithmetic() {
    assert_eq!(run("int main() { return 2 + 3; }"), 5);
    assert_eq!(run("int main() { return 2 + 3 * 4; }"), 14);
    assert_eq!(run("int main() { return (2 + 3) * 4; }"), 20);
    assert_eq!(run("int main() { return 7 / 2 + 7 % 2; }"), 4);
}

#[test]
fn unary_operators() {
    assert_eq!(run("int main() { return -5 + 10; }"), 5);
    assert_eq!(run("int main() { return +7; }"), 7);
    assert_eq!(run("int main() { return (int)!0; }"), 1);
    assert_eq!(run("int main() { return (int)!42; }"), 0);
    assert_eq!(run("int main() { return (~0 & 255); }"), 255);
}

#[test]
fn negative_status_wraps_as_unsigned() {
    assert_eq!(run("int main() { return -1; }"), u32::MAX);
}

#[test]
fn global_variable_with_initializer() {
    assert_eq!(run("int x = 5; int main() { return x; }"), 5);
    assert_eq!(run("int x = 2; int y = 40; int main() { return x + y; }"), 42);
}

#[test]
fn global_initializer_referencing_earlier_global() {
    assert_eq!(run("int x = 20; int y = x + 1; int main() { return y + x; }"), 41);
}

#[test]
fn uninitialized_global_defaults_to_zero() {
    assert_eq!(run("int x; int main() { return x; }"), 0);
}

#[test]
fn const_global() {
    assert_eq!(run("const int answer = 42; int main() { return answer; }"), 42);
}

#[test]
fn locals_and_assignment() {
    assert_eq!(run("int main() { int a = 3; int b; b = a + 4; return b; }"), 7);
    assert_eq!(run("int main() { int a; int b; a = b = 21; return a + b; }"), 42);
}

#[test]
fn compound_assignment() {
    assert_eq!(run("int main() { int a = 3; a += 4; return a; }"), 7);
    assert_eq!(run("int main() { int a = 12; a /= 2; a -= 1; a *= 3; return a; }"), 15);
}

#[test]
fn increment_and_decrement() {
    assert_eq!(run("int main() { int a = 5; a++; ++a; return a; }"), 7);
    assert_eq!(run("int main() { int a = 5; a--; return a; }"), 4);
    assert_eq!(run("int main() { int a = 5; int b = a++; return a * 100 + b; }"), 605);
    assert_eq!(run("int main() { int a = 5; int b = ++a; return a * 100 + b; }"), 606);
}

#[test]
fn if_and_else_branches() {
    assert_eq!(run("int main() { if (1 < 2) { return 7; } else { return 9; } }"), 7);
    assert_eq!(run("int main() { if (2 < 1) { return 7; } else { return 9; } }"), 9);
    assert_eq!(run("int main() { if (0) return 1; return 2; }"), 2);
}

#[test]
fn comparisons_yield_zero_or_one() {
    assert_eq!(run("int main() { return (int)(3 <= 3); }"), 1);
    assert_eq!(run("int main() { return (int)(3 > 3); }"), 0);
    assert_eq!(run("int main() { return (int)(3 != 4); }"), 1);
    assert_eq!(run("int main() { return (int)(3 == 4); }"), 0);
}

#[test]
fn logical_operators_short_circuit_to_bits() {
    assert_eq!(run("int main() { return (int)(1 && 2); }"), 1);
    assert_eq!(run("int main() { return (int)(1 && 0); }"), 0);
    assert_eq!(run("int main() { return (int)(0 || 5); }"), 1);
    assert_eq!(run("int main() { return (int)(0 || 0); }"), 0);
}

#[test]
fn ternary_selects_a_branch() {
    assert_eq!(run("int main() { return 1 ? 7 : 9; }"), 7);
    assert_eq!(run("int main() { return 0 ? 7 : 9; }"), 9);
}

#[test]
fn goto_loop_accumulates() {
    let source = "
        int main() {
            int i = 1;
            int total = 0;
        loop:
            if (i > 4) goto done;
            total = total + i;
            i = i + 1;
            goto loop;
        done:
            return total;
        }
    ";
    assert_eq!(run(source), 10);
}

#[test]
fn function_call_with_arguments() {
    let source = "
        int add(int a, int b) { return a + b; }
        int main() { return add(2, 3); }
    ";
    assert_eq!(run(source), 5);
}

#[test]
fn argument_order_is_left_to_right() {
    let source = "
        int sub(int a, int b) { return a - b; }
        int main() { return sub(10, 3); }
    ";
    assert_eq!(run(source), 7);
}

#[test]
fn nested_calls() {
    let source = "
        int add(int a, int b) { return a + b; }
        int main() { return add(add(1, 2), add(3, 4)); }
    ";
    assert_eq!(run(source), 10);
}

#[test]
fn void_function_call() {
    let source = "
        int x;
        void set(int value) { x = value; }
        int main() { set(31); return x + 11; }
    ";
    assert_eq!(run(source), 42);
}

#[test]
fn recursion_keeps_frames_separate() {
    let source = "
        int fact(int n) {
            if (n < 2) { return 1; }
            return n * fact(n - 1);
        }
        int main() { return fact(5); }
    ";
    assert_eq!(run(source), 120);
}

#[test]
fn parameters_shadow_globals() {
    let source = "
        int x = 9;
        int pick(int x) { return x; }
        int main() { return pick(3); }
    ";
    assert_eq!(run(source), 3);
}

#[test]
fn char_values_and_comparison() {
    let source = "
        int main() {
            char c = 'A';
            if (c == 'A') { return 1; }
            return 0;
        }
    ";
    assert_eq!(run(source), 1);
    assert_eq!(run("int main() { return (int)'A'; }"), 65);
    assert_eq!(run("int main() { return (int)'\\n'; }"), 10);
}

#[test]
fn float_arithmetic_truncates_on_cast() {
    assert_eq!(run("int main() { double d = 2.5; return (int)(d + d); }"), 5);
    assert_eq!(run("int main() { return (int)52.4; }"), 52);
    assert_eq!(run("int main() { float f = 1.5f; return (int)(f * 4.0f); }"), 6);
}

#[test]
fn unsigned_values() {
    assert_eq!(run("unsigned u = 7u; int main() { return (int)u; }"), 7);
    assert_eq!(run("int main() { unsigned char b = 200u; return (int)b; }"), 200);
}

#[test]
fn bitwise_operators() {
    assert_eq!(run("int main() { return 12 & 10; }"), 8);
    assert_eq!(run("int main() { return 12 | 3; }"), 15);
    assert_eq!(run("int main() { return 12 ^ 10; }"), 6);
}

#[test]
fn sizeof_folds_to_type_size() {
    assert_eq!(run("int main() { return sizeof 1; }"), 4);
    assert_eq!(run("int main() { double d; return sizeof d; }"), 8);
    assert_eq!(run("int main() { char c; return sizeof c; }"), 1);
}

#[test]
fn narrowing_conversion_applies_on_assignment() {
    // 300 narrows through the short's mask when stored into it.
    assert_eq!(run("int main() { short s = 300; return (int)s; }"), 300 & 0xFFFF);
    assert_eq!(run("int main() { char c = 'A'; return (int)c; }"), 65);
}

#[test]
fn runaway_recursion_faults_instead_of_corrupting() {
    let source = "
        void spin() { spin(); }
        int main() { spin(); return 0; }
    ";
    match run_result(source) {
        Err(VmError::Segfault { .. }) => {}
        other => panic!("expected a segfault, got {:?}", other),
    }
}

#[test]
fn division_by_zero_faults() {
    match run_result("int main() { int z = 0; return 1 / z; }") {
        Err(VmError::DivisionByZero { .. }) => {}
        other => panic!("expected DivisionByZero, got {:?}", other),
    }
}
