use super::*;
use crate::Error;

fn run_with(config: Config, src: &str) -> (Result<JsValue, Error>, Vec<String>) {
    let mut interp = Interpreter::new(config);
    let result = interp.eval_source(src);
    (result, interp.console_output().to_vec())
}

fn run(src: &str) -> (Result<JsValue, Error>, Vec<String>) {
    run_with(Config::default(), src)
}

fn logged(src: &str) -> Vec<String> {
    let (result, out) = run(src);
    if let Err(e) = result {
        panic!("script failed: {e}\n{src}");
    }
    out
}

fn uncaught(src: &str) -> String {
    match run(src).0 {
        Err(Error::Uncaught(msg)) => msg,
        Err(other) => panic!("expected an uncaught throw, got {other}"),
        Ok(v) => panic!("expected an uncaught throw, got {v}"),
    }
}

#[test]
fn second_guard_matches_after_first_rejects() {
    let out = logged(
        "function f() {
             { throw new TypeError('E1'); }
             catch (e) when (e instanceof RangeError) { console.log('range'); }
             catch (e) when (e instanceof TypeError) { console.log('type ' + e.message); }
         }
         f();",
    );
    assert_eq!(out, vec!["type E1"]);
}

#[test]
fn unmatched_throw_propagates_unchanged() {
    let out = logged(
        "let e2 = new Error('E2'); let got;
         try {
             { throw e2; }
             catch (e) when (false) { console.log('a'); }
             catch (e) when (0) { console.log('b'); }
         } catch (outer) { got = outer; }
         console.log(got === e2);",
    );
    assert_eq!(out, vec!["true"]);
    assert_eq!(
        uncaught("{ throw new Error('E2'); } catch (e) when (false) { }"),
        "Error: E2"
    );
}

#[test]
fn unconditional_clause_matches_classic_try() {
    let guarded = logged("{ throw new Error('E3'); } catch (err) { console.log(err.message); }");
    let classic = logged("try { throw new Error('E3'); } catch (err) { console.log(err.message); }");
    assert_eq!(guarded, vec!["E3"]);
    assert_eq!(guarded, classic);
}

#[test]
fn normal_completion_skips_catch_but_runs_finally() {
    let out = logged(
        "{ console.log('body'); }
         catch (e) { console.log('catch'); }
         finally { console.log('finally'); }",
    );
    assert_eq!(out, vec!["body", "finally"]);
}

#[test]
fn throw_from_matched_clause_replaces_original() {
    let out = logged(
        "try {
             { throw new Error('E4'); } catch (e) { throw new Error('E5'); }
         } catch (e) { console.log(e.message); }",
    );
    assert_eq!(out, vec!["E5"]);
}

#[test]
fn normal_finally_keeps_clause_return() {
    let out = logged(
        "function f() {
             { throw 'E6'; } catch (e) { return 'V'; } finally { console.log('cleanup'); }
         }
         console.log(f());",
    );
    assert_eq!(out, vec!["cleanup", "V"]);
}

#[test]
fn block_without_clauses_behaves_as_before() {
    assert_eq!(logged("{ let x = 1; { let x = 2; } console.log(x); }"), vec!["1"]);
    assert_eq!(
        uncaught("{ throw new RangeError('plain'); }"),
        "RangeError: plain"
    );
}

#[test]
fn rejected_binding_does_not_leak() {
    let out = logged(
        "try { { throw 1; } catch (leak) when (false) { } } catch { }
         console.log(typeof leak);",
    );
    assert_eq!(out, vec!["undefined"]);
}

#[test]
fn binding_failure_aborts_matching() {
    let out = logged(
        "try {
             { throw undefined; }
             catch ({ code }) { console.log('first'); }
             catch { console.log('second'); }
         } catch (e) { console.log(e instanceof TypeError, e.message); }",
    );
    assert_eq!(
        out,
        vec!["true Cannot destructure 'undefined' as it is undefined."]
    );
}

#[test]
fn destructured_binding_feeds_the_guard() {
    let out = logged(
        "function classify(err) {
             { throw err; }
             catch ({ code, retry = false }) when (code >= 500 && !retry) { return 'server'; }
             catch ([first, ...rest]) when (rest.length > 0) { return 'list ' + first; }
             catch (other) { return 'other'; }
         }
         console.log(classify({ code: 503 }), classify([1, 2]), classify('x'));",
    );
    assert_eq!(out, vec!["server list 1 other"]);
}

#[test]
fn guard_throw_skips_later_clauses() {
    let out = logged(
        "let tried = [];
         try {
             { throw 0; }
             catch (e) when (tried.push('one'), e.nope()) { }
             catch (e) { tried.push('two'); }
         } catch (err) { console.log(err.name, tried.join()); }",
    );
    assert_eq!(out, vec!["TypeError one"]);
}

#[test]
fn finally_overrides_rethrow_and_return() {
    let out = logged(
        "function swallow() { { throw 1; } catch (e) when (false) { } finally { return 'over'; } }
         function replace() { return 'value'; } finally { throw new Error('from finally'); }
         console.log(swallow());
         try { replace(); } catch (e) { console.log(e.message); }",
    );
    assert_eq!(out, vec!["over", "from finally"]);
}

#[test]
fn break_and_continue_bypass_catch_but_run_finally() {
    let out = logged(
        "let log = [];
         for (let i = 0; i < 3; i++) {
             if (i === 1) continue;
             if (i === 2) break;
             log.push(i);
         } catch (e) { log.push('never'); } finally { log.push('f' + i); }
         console.log(log.join());",
    );
    assert_eq!(out, vec!["0,f0,f1,f2"]);
}

#[test]
fn labeled_continue_runs_each_finally() {
    let out = logged(
        "let log = [];
         outer: for (let i = 0; i < 2; i++) {
             for (let j = 0; j < 2; j++) {
                 { if (j === 1) continue outer; log.push(`${i}${j}`); } finally { log.push('f'); }
             }
         }
         console.log(log.join(' '));",
    );
    assert_eq!(out, vec!["00 f f 10 f f"]);
}

#[test]
fn loop_body_is_guarded_per_iteration() {
    let out = logged(
        "let seen = [];
         for (const n of [1, 2, 3]) {
             if (n === 2) throw new Error('skip');
             seen.push(n);
         } catch (e) when (e.message === 'skip') { seen.push('handled'); }
         let i = 0;
         while (i < 3) { i++; if (i === 2) throw i; } catch (e) { seen.push('w' + e); }
         do { i--; if (i === 2) throw i; } catch (e) { seen.push('d' + e); } while (i > 1);
         console.log(seen.join());",
    );
    assert_eq!(out, vec!["1,handled,3,w2,d2"]);
}

#[test]
fn function_catch_sees_parameters_and_returns() {
    let out = logged(
        "function parse(input) {
             if (input === '') throw new RangeError('empty');
             return input.length;
         } catch (e) when (e instanceof RangeError) { return 'bad:' + input.length; }
         const arrowCaller = (s) => parse(s);
         console.log(parse('abc'), arrowCaller(''));",
    );
    assert_eq!(out, vec!["3 bad:0"]);
}

#[test]
fn function_catch_runs_outside_the_body_scope() {
    let out = logged(
        "let x = 'outer';
         function f(p) { throw 1; let x = 2; } catch (e) when (x === 'outer') { return 'ok ' + p; }
         function g() { const y = 1; throw y; } catch (e) { return typeof y; }
         console.log(f('p'), g());",
    );
    assert_eq!(out, vec!["ok p undefined"]);
}

#[test]
fn function_catch_rethrows_when_unmatched() {
    assert_eq!(
        uncaught(
            "function f(x) { throw new TypeError('t' + x); } catch (e) when (e instanceof RangeError) { }
             f(1);"
        ),
        "TypeError: t1"
    );
}

#[test]
fn class_catch_handles_static_block_throw() {
    let out = logged(
        "class Settings {
             static defaults = { verbose: false };
             static { throw new Error('static failed'); }
         } catch (e) { console.log('class: ' + e.message); }
         console.log(typeof Settings);
         const Lazy = class { static value = null.missing; } catch { };
         console.log(Lazy);",
    );
    assert_eq!(out, vec!["class: static failed", "undefined", "undefined"]);
}

#[test]
fn class_catch_handles_bad_heritage() {
    let out = logged(
        "const notAClass = 5;
         class Broken extends notAClass { } catch (e) when (e instanceof TypeError) { console.log(e.message); }",
    );
    assert_eq!(
        out,
        vec!["Class extends value 5 is not a constructor or null"]
    );
}

#[test]
fn switch_catch_handles_case_throw() {
    let out = logged(
        "function label(x) {
             switch (x) {
                 case 1: return 'one';
                 case 2: throw new Error('two');
                 default: return 'many';
             } catch (e) { return 'caught ' + e.message; }
         }
         console.log(label(1), label(2), label(3));
         let out = [];
         switch (1) { case 1: out.push('a'); break; case 2: out.push('b'); } finally { out.push('fin'); }
         out.push('after');
         console.log(out.join());",
    );
    assert_eq!(out, vec!["one caught two many", "a,fin,after"]);
}

#[test]
fn nested_guarded_block_rethrows_to_outer_handlers() {
    let out = logged(
        "try {
             { throw new Error('first'); }
             catch (e) {
                 { throw new TypeError('inner'); }
                 catch (f) when (f instanceof RangeError) { console.log('no'); }
             }
         } catch (outer) { console.log(outer.name + ': ' + outer.message); }
         { throw 1; } catch (e) {
             { throw e + 1; } catch (f) when (f === 2) { console.log('inner caught', f, e); }
         }",
    );
    assert_eq!(out, vec!["TypeError: inner", "inner caught 2 1"]);
}

#[test]
fn if_clauses_belong_to_the_consequent() {
    let out = logged(
        "function check(flag) {
             if (flag) { throw new Error('boom'); } catch (e) { return 'caught'; } else { return 'else'; }
         }
         console.log(check(true), check(false));",
    );
    assert_eq!(out, vec!["caught else"]);
}

#[test]
fn when_is_still_an_identifier() {
    let out = logged(
        "let when = 2;
         function when2(when) { return when * 2; }
         { throw when; } catch (e) when (e === when) { console.log(when2(when)); }",
    );
    assert_eq!(out, vec!["4"]);
}

#[test]
fn custom_error_classes_drive_guards() {
    let out = logged(
        "class HttpError extends Error {
             status = 0;
             constructor(status, message) {
                 super(message);
                 this.status = status;
                 this.name = 'HttpError';
             }
         }
         function load(code) {
             throw new HttpError(code, 'status ' + code);
         } catch (e) when (e instanceof HttpError && e.status >= 500) { return 'retry'; }
           catch (e) when (e instanceof HttpError) { return 'fail ' + e.message; }
         console.log(load(503), load(404));",
    );
    assert_eq!(out, vec!["retry fail status 404"]);
    assert_eq!(
        uncaught(
            "class AppError extends Error { constructor(m) { super(m); this.name = 'AppError'; } }
             throw new AppError('boom');"
        ),
        "AppError: boom"
    );
}

#[test]
fn classes_support_super_methods_and_fields() {
    let out = logged(
        "class A {
             tag = 'a';
             greet() { return 'A' + this.tag; }
             static make() { return new this(); }
         }
         class B extends A {
             extra = this.tag + '!';
             greet() { return super.greet() + 'B'; }
         }
         const b = B.make();
         console.log(b.greet(), b.extra, b instanceof A);",
    );
    assert_eq!(out, vec!["AaB a! true"]);
}

#[test]
fn super_survives_shadowing_locals() {
    let out = logged(
        "class A { constructor() { this.a = 1; } who() { return 'A'; } }
         class B extends A {
             constructor() { let __super__ = 5, __home_class__ = 6; super(); }
             who() { const __super_home__ = null; return super.who() + 'B'; }
         }
         const b = new B();
         console.log(b.a, b.who());",
    );
    assert_eq!(out, vec!["1 AB"]);
    assert_eq!(
        uncaught("class C { constructor() { super(); } } new C();"),
        "SyntaxError: 'super' keyword unexpected here"
    );
}

#[test]
fn class_constructor_requires_new() {
    assert_eq!(
        uncaught("class K { } K();"),
        "TypeError: Class constructor K cannot be invoked without 'new'"
    );
}

#[test]
fn runtime_errors_are_catchable_throws() {
    let out = logged(
        "{ console.log(x); let x = 1; } catch (e) { console.log(e.name, e.message); }
         const c = 1;
         { c = 2; } catch (e) when (e instanceof TypeError) { console.log(e.message); }
         { missing(); } catch (e) { console.log(e.message); }
         { const o = {}; o.run(); } catch (e) { console.log(e.message); }",
    );
    assert_eq!(
        out,
        vec![
            "ReferenceError Cannot access 'x' before initialization",
            "Assignment to constant variable.",
            "missing is not defined",
            "o.run is not a function",
        ]
    );
    assert_eq!(
        uncaught("null.x;"),
        "TypeError: Cannot read properties of null (reading 'x')"
    );
}

#[test]
fn huge_array_lengths_are_range_errors() {
    let out = logged(
        "var a = [1, 2];
         { a.length = 4294967296; } catch (e) when (e instanceof RangeError) { console.log(e.message); }
         { a.length = 4294967295; } catch (e) when (e instanceof RangeError) { console.log('capped'); }
         a[4e9] = 'far';
         a.length = 1;
         console.log(a.length, a[4e9]);",
    );
    assert_eq!(out, vec!["Invalid array length", "capped", "1 far"]);
}

#[test]
fn echoed_console_lines_are_counted_not_kept() {
    let config = Config {
        echo_console: true,
        ..Config::default()
    };
    let mut interp = Interpreter::new(config);
    for _ in 0..3 {
        let result = interp.eval_source("for (let i = 0; i < 50; i++) console.log(i);");
        assert!(result.is_ok());
    }
    assert!(interp.console_output().is_empty());
    assert_eq!(interp.console_line_count(), 150);
}

#[test]
fn call_depth_limit_is_a_guardable_range_error() {
    let config = Config {
        max_call_depth: 16,
        ..Config::default()
    };
    let (result, out) = run_with(
        config,
        "let depth = 0;
         function down() { depth++; return down(); }
         { down(); } catch (e) when (e instanceof RangeError) { console.log(e.message, depth); }",
    );
    assert!(result.is_ok());
    assert_eq!(out, vec!["Maximum call stack size exceeded 16"]);
}

#[test]
fn syntax_errors_surface_as_parse_errors() {
    let (result, out) = run("console.log('never'); { } catch (e) when () { }");
    assert!(matches!(result, Err(Error::Parse(_))));
    assert!(out.is_empty());
}

#[test]
fn global_scope_persists_across_evaluations() {
    let mut interp = Interpreter::new(Config::default());
    assert!(interp.eval_source("var count = 1; function bump() { count++; }").is_ok());
    assert!(interp.eval_source("bump(); bump();").is_ok());
    assert!(matches!(interp.eval_source("count"), Ok(JsValue::Number(n)) if n == 3.0));
}

#[test]
fn host_language_basics() {
    let out = logged(
        "const { a, b: [x, y = 4], ...rest } = { a: 1, b: [2], c: 3, d: 4 };
         console.log(a, x, y, rest);
         let total = 0;
         for (const k in { p: 1, q: 2 }) total += k.length;
         for (let i = 0; i < 3; i++) total += i;
         console.log(total, `t=${total * 2}`, typeof total, typeof undefinedName);
         const add = (m, n = 10) => m + n;
         console.log(add(1), add(1, 2), [1, ...[2, 3]].length, 2 ** 10, 7 % 3);
         let q = null;
         q ??= 'set';
         console.log(q, 'b' in { b: 1 }, 1 == '1', 1 === '1', [1, 2] + '');",
    );
    assert_eq!(
        out,
        vec![
            "1 2 4 { c: 3, d: 4 }",
            "5 t=10 number undefined",
            "11 3 3 1024 1",
            "set true true false 1,2",
        ]
    );
}

#[test]
fn closures_capture_per_iteration_bindings() {
    let out = logged(
        "const fns = [];
         for (let i = 0; i < 3; i++) fns.push(() => i);
         console.log(fns.map(f => f()).join());",
    );
    assert_eq!(out, vec!["0,1,2"]);
}
