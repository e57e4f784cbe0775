use mylang::{CollectStringPrint, Object, Session};
use pretty_assertions::assert_eq;

fn run(code: &str) -> (Object, String) {
    let mut session = Session::new(CollectStringPrint::default());
    let value = session
        .eval(code, "test.my")
        .unwrap_or_else(|e| panic!("unexpected error: {e}\nin:\n{code}"));
    let output = session.print_mut().take_output();
    (value, output)
}

macro_rules! output_tests {
    ($($name:ident: $code:expr, $expected:expr;)*) => {
        $(
            #[test]
            fn $name() {
                let (_, output) = run($code);
                assert_eq!(output, $expected, "in:\n{}", $code);
            }
        )*
    }
}

macro_rules! error_tests {
    ($($name:ident: $code:expr, $kind:expr, $message:expr;)*) => {
        $(
            #[test]
            fn $name() {
                let mut session = Session::new(CollectStringPrint::default());
                match session.eval($code, "test.my") {
                    Ok(value) => panic!("expected an error, got {value:?}\nin:\n{}", $code),
                    Err(exception) => {
                        assert_eq!(exception.kind(), $kind, "in:\n{}", $code);
                        assert!(
                            exception.message().contains($message),
                            "message {:?} does not contain {:?}",
                            exception.message(),
                            $message,
                        );
                    }
                }
            }
        )*
    }
}

output_tests! {
    // Lexical scope: a closure reads its defining function's bindings.
    lexical_scope_closure: r#"
fun f1 {
    set f1v1=F1V1
    fun f11 { return {f1v1=$f1v1} }
    return f11()
}
echo f1()
"#, "{'f1v1'='F1V1'}\n";

    lexical_scope_one_liner:
        "fun f1 { set f1v1=F1V1; fun f11 { return {f1v1=$f1v1} } return f11() }; echo f1()",
        "{'f1v1'='F1V1'}\n";

    recursion_factorial:
        "fun fact n { if ($n <= 1) { return 1 }; return $n * fact($n - 1) }; echo fact 5",
        "120\n";

    operators_add: "echo (1 + 2 + 3)", "6\n";
    operators_not: "echo (!true)", "false\n";
    operators_float_product: "echo (0.3 * -4)", "-1.2\n";
    operators_mixed_exponent: "echo (2e2 + 3)", "203.0\n";
    operators_subtract: "echo (1.5 - 4)", "-2.5\n";
    operators_compare: "echo (2 >= 2) (1 > 2)", "true false\n";
    operators_division_exact: "echo (6 / 3)", "2\n";
    operators_division_float: "echo (7 / 2)", "3.5\n";
    operators_modulo: "echo (7 % 3)", "1\n";
    operators_string_equality: "echo (op \"==\" a a)", "true\n";
    operators_via_op: "echo (op \"+\" 1 2)", "3\n";

    class_method_self: r#"
class Animal {
    init name { set self.name=$name }
    fun speak { echo ($self.name + " makes a sound") }
}
a = Animal "Rex"
a.speak()
"#, "Rex makes a sound\n";

    class_instance_attrs_stay_per_instance: r#"
class Counter {
    init { set self.n=0 }
    fun bump { set self.n=($self.n + 1); return $self.n }
}
a = Counter()
b = Counter()
a.bump()
a.bump()
echo $a.n $b.n
"#, "2 0\n";

    class_inheritance_method_lookup: r#"
class Animal {
    fun speak { echo generic }
}
class Dog is Animal { }
d = Dog()
d.speak()
"#, "generic\n";

    class_str_method_drives_echo: r#"
class P {
    fun str { return custom }
}
p = P()
echo $p
"#, "custom\n";

    try_catch_binds_error:
        r#"try { throw Error "boom" } catch e { Error { echo ("caught: " + $e) } }"#,
        "caught: boom\n";

    try_catch_subclass_matches: r#"
error BaseE
error SubE base=$BaseE
try { throw SubE boom } catch e { BaseE { echo ("caught " + $e) } }
"#, "caught boom\n";

    try_catch_internal_errors_are_generic:
        "try { get missing } catch { Error { echo caught } }",
        "caught\n";

    try_catch_first_matching_clause_wins: r#"
error E1
error E2
try { throw E2 two } catch e {
    E1 { echo first }
    E2 E1 { echo second }
}
"#, "second\n";

    loop_while_break:
        "set x=3; loop { while ($x > 0); echo $x; set x=($x - 1) }; echo $x",
        "3\n2\n1\n0\n";

    loop_break_stops: r#"
set i=0
loop {
    set i=($i + 1)
    if ($i == 3) { break }
    echo $i
}
"#, "1\n2\n";

    loop_continue_skips: r#"
set i=0
loop {
    while ($i < 6)
    set i=($i + 1)
    if (($i % 2) == 0) { continue }
    echo $i
}
"#, "1\n3\n5\n";

    for_over_array: "for x in [10 20 30] { echo $x }", "10\n20\n30\n";
    for_over_string: "for c in \"ab\" { echo $c }", "a\nb\n";
    for_over_dict_keys: "set d={a=1 b=2}; for k in $d { echo $k }", "a\nb\n";

    if_two_arg_form: "if (1 < 2) { echo yes }; if (2 < 1) { echo no }", "yes\n";
    if_clause_list: r#"
fun f x {
    if {
        ($x == 1) { return _1 }
        ($x == 2) { return _2 }
        else { return other }
    }
}
echo f 1
echo f 2
echo f 5
"#, "_1\n_2\nother\n";

    path_set_get:
        "set d={a=1 b={c=3}}; set d.b.c=5; echo $d.b.c",
        "5\n";

    path_reads: r#"
set d={a=1 b={c=3 d=4}}
echo $d.a
echo $d.b
echo $d.b.c
"#, "1\n{'c'=3, 'd'=4}\n3\n";

    anchored_dots: r#"
set x=1
fun f {
    set x=2
    echo $.x
    echo $..x
}
f()
"#, "2\n1\n";

    echo_plain_words: "echo Hello world", "Hello world\n";
    echo_literals: "echo undefined null true 1.5", "undefined null true 1.5\n";
    echo_leading_callable_calls: "fun double n { return ($n * 2) }; echo double 21", "42\n";
    echo_leading_plain_word_stays_text: "echo double 21", "double 21\n";

    dict_repr: "echo {a=1 b={c=3}}", "{'a'=1, 'b'={'c'=3}}\n";
    array_repr: "echo [1 two 3.5]", "[1 'two' 3.5]\n";
    string_concat_coerces: "echo (\"n=\" + 5)", "n=5\n";
    string_escapes: "echo \"a\\tb\\u0041\"", "a\tbA\n";

    fun_repr: "fun foo { return 0 }; echo $foo", "{fun 'foo'}\n";
    class_repr: "class A { }; echo $A", "<class A>\n";

    symbol_binds_and_prints: "symbol tag; echo $tag", "<symbol tag>\n";
    symbols_are_identity: r#"
set a=(Symbol "t")
set b=(Symbol "t")
echo ($a == $b) ($a == $a)
"#, "false true\n";

    ref_obj_attribute: "set x=42; set r=(ref x); echo $r.obj", "42\n";
    ref_of_collapses: "set x=[1 2]; set r=(ref.of (ref.of $x)); echo ($r.obj == $x)", "true\n";
    ref_passes_value_to_call: "fun first a { return $a.0 }; echo (call &first [7 8])", "7\n";

    exec_block_value: "set x=(set t=5; $t); echo $x", "5\n";
    return_stops_statements: "fun f { return 1; echo nope }; echo f()", "1\n";
    return_without_value: "fun f { return }; echo f()", "undefined\n";

    conversions: r#"
echo (Int "42")
echo (Float 2)
echo (Bool 0)
echo (String 42)
"#, "42\n2.0\nfalse\n42\n";

    doc_of_builtin: "echo (doc ignore)", "Do nothing; ignores all arguments.\n";
    ignore_returns_undefined: "echo (ignore 1 2 3)", "undefined\n";

    call_builtin: "fun add a b { return ($a + $b) }; echo (call add 1 2)", "3\n";
    keyed_parameter_defaults: r#"
fun greet name greeting="hi" { return ($greeting + " " + $name) }
echo (greet world)
echo (greet world greeting=hey)
"#, "hi world\nhey world\n";

    context_flows_down_frames: r#"
fun inner {
    context c
    echo $c.setting
}
fun outer {
    context c
    set c.setting=on
    inner()
}
outer()
"#, "on\n";

    string_methods: "set s=\"a,b,c\"; set parts=(s.split \",\"); echo $parts (parts.len())", "['a' 'b' 'c'] 3\n";
    array_methods_mutation: "set a=[1]; a.append 2; a.append 3; echo $a (a.join \"+\")", "[1 2 3] 1+2+3\n";
    dict_methods: "set d={x=1}; echo (d.has x) (d.has y) (d.keys())", "true false ['x']\n";
    method_values_stay_bound: "set s=hi; set m=($s.upper); echo (call &m)", "HI\n";

    stdlib_io_module: "use \"io\"; io.write one; io.write \" two\"", "one two";
    stdlib_process_module: "use \"process\"; echo (process.output \"echo\" hi)", "hi\n\n";
    stdlib_util_module: r#"
use "util"
echo (util.max2 3 7)
echo (util.clamp 10 0 5)
echo (util.repeat ab 3)
"#, "7\n5\nababab\n";
}

error_tests! {
    lookup_missing_name: "echo $missing", "LookupError", "missing";
    lookup_ref_of_unbound: "ref nope", "LookupError", "nope";
    not_callable: "set x=5; x()", "TypeError", "not callable";
    get_arity: "get a b", "ArityError", "get takes exactly 1 argument";
    division_by_zero: "echo (1 / 0)", "ArithmeticError", "division by zero";
    integer_overflow: "echo (9223372036854775807 + 1)", "ArithmeticError", "integer overflow";
    parse_unclosed_paren: "echo (", "ParseError", "unexpected end of input";
    break_outside_loop: "break", "Error", "break is not inside a loop";
    throw_uncaught: "throw Error \"kaput\"", "Error", "kaput";
    custom_error_kind: "error MyErr; throw MyErr \"m\"", "MyErr", "m";
    catch_no_match_rethrows: r#"
error E1
error E2
try { throw E1 one } catch e { E2 { echo no } }
"#, "E1", "one";
    for_requires_iterable: "for x in 5 { echo $x }", "TypeError", "not iterable";
    set_attribute_on_scalar: "set x=1; set x.y=2", "TypeError", "cannot assign attribute";
}

#[test]
fn eval_returns_last_statement_value() {
    let (value, _) = run("set x=5; $x");
    assert_eq!(value, Object::Int(5));
}

#[test]
fn dict_literal_converts_to_object() {
    let (value, _) = run("{a=1 b=two}");
    assert_eq!(
        value,
        Object::Dict(vec![
            (Object::String("a".to_owned()), Object::Int(1)),
            (Object::String("b".to_owned()), Object::String("two".to_owned())),
        ])
    );
}

#[test]
fn session_state_persists_across_evals() {
    let mut session = Session::new(CollectStringPrint::default());
    session.eval("set x=1", "a").unwrap();
    session.eval("echo $x", "b").unwrap();
    assert_eq!(session.print_mut().output(), "1\n");
}

/// Helper for tests that need modules on disk.
fn module_dir(name: &str, files: &[(&str, &str)]) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("mylang-test-{}-{name}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    for (file, content) in files {
        std::fs::write(dir.join(file), content).unwrap();
    }
    dir
}

#[test]
fn use_binds_the_export_under_the_source_name() {
    let dir = module_dir("bind", &[("m.my", "export answer=42\n")]);
    let mut session = Session::new(CollectStringPrint::default());
    session.add_module_path(&dir);
    session.eval("use \"m\"; echo $m.answer", "test.my").unwrap();
    assert_eq!(session.print_mut().output(), "42\n");
}

#[test]
fn use_returns_the_identical_export_on_cache_hits() {
    let dir = module_dir("cache", &[("m.my", "export answer=42\n")]);
    let mut session = Session::new(CollectStringPrint::default());
    session.add_module_path(&dir);
    // Mutating through the first binding is visible through the second:
    // both are the same dict.
    session
        .eval("set a=(use \"m\"); set b=(use \"m\"); set a.extra=7; echo $b.extra", "test.my")
        .unwrap();
    assert_eq!(session.print_mut().output(), "7\n");
}

#[test]
fn use_cache_false_reevaluates_the_module() {
    let dir = module_dir("nocache", &[("noisy.my", "echo loaded\nexport answer=1\n")]);
    let mut session = Session::new(CollectStringPrint::default());
    session.add_module_path(&dir);
    session.eval("use \"noisy\"; use \"noisy\"", "test.my").unwrap();
    assert_eq!(session.print_mut().take_output(), "loaded\n");
    session.eval("use \"noisy\" use_cache=false", "test.my").unwrap();
    assert_eq!(session.print_mut().take_output(), "loaded\n");
}

#[test]
fn module_without_export_exposes_its_locals() {
    let dir = module_dir("locals", &[("plain.my", "set a=1\nset b=2\n")]);
    let mut session = Session::new(CollectStringPrint::default());
    session.add_module_path(&dir);
    session.eval("use \"plain\"; echo $plain.a $plain.b", "test.my").unwrap();
    assert_eq!(session.print_mut().output(), "1 2\n");
}

#[test]
fn module_return_value_wins_over_locals() {
    let dir = module_dir("ret", &[("r.my", "set ignored=1\nreturn {answer=9}\n")]);
    let mut session = Session::new(CollectStringPrint::default());
    session.add_module_path(&dir);
    session.eval("use \"r\"; echo $r.answer", "test.my").unwrap();
    assert_eq!(session.print_mut().output(), "9\n");
}

#[test]
fn uncaught_errors_carry_the_call_trace() {
    let mut session = Session::new(CollectStringPrint::default());
    let exception = session
        .eval("fun inner { throw Error \"deep\" }; fun outer { inner() }; outer()", "test.my")
        .unwrap_err();
    assert_eq!(exception.kind(), "Error");
    assert!(exception.trace().contains(&"inner".to_owned()), "trace: {:?}", exception.trace());
    assert!(exception.trace().contains(&"outer".to_owned()), "trace: {:?}", exception.trace());
}
