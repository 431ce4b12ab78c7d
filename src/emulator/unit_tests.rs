use super::parser::{LuaParser, Rule};
use super::{LuaEmulator, LuaError, LuaValue};

use pest::consumes_to;
use pest::parses_to;
use pest::Parser;

fn eval(emulator: &LuaEmulator, fragment: &str) -> String {
    match emulator.evaluate(fragment) {
        Ok(text) => text,
        Err(e) => panic!("'{}' failed: {}", fragment, e),
    }
}

fn eval_one(fragment: &str) -> String {
    eval(&LuaEmulator::new(), fragment)
}

#[test]
fn test_name_token() {
    parses_to! {
        parser: LuaParser,
        input: "frontmost_1",
        rule: Rule::name,
        tokens: [
            name(0, 11)
        ]
    };
}

#[test]
fn test_keywords_are_not_names() {
    assert!(LuaParser::parse(Rule::name, "end").is_err());
    assert!(LuaParser::parse(Rule::name, "return").is_err());
    assert!(LuaParser::parse(Rule::name, "ending").is_ok());
}

#[test]
fn test_hex_and_exponent_numbers() {
    parses_to! {
        parser: LuaParser,
        input: "0x1F",
        rule: Rule::number,
        tokens: [
            number(0, 4)
        ]
    };
    assert_eq!(eval_one("0x1F"), "31");
    assert_eq!(eval_one("1e3"), "1000.0");
    assert_eq!(eval_one(".5"), "0.5");
}

#[test]
fn test_expression_values_are_tab_separated() {
    assert_eq!(eval_one("1 + 1"), "2");
    assert_eq!(eval_one("1, 'two', nil, true"), "1\ttwo\tnil\ttrue");
}

#[test]
fn test_operator_precedence() {
    assert_eq!(eval_one("1 + 2 * 3"), "7");
    assert_eq!(eval_one("-2 ^ 2"), "-4.0");
    assert_eq!(eval_one("2 ^ 3 ^ 2"), "512.0");
    assert_eq!(eval_one("'a' .. 'b' .. 1 + 2"), "ab3");
    assert_eq!(eval_one("1 < 2 and 2 < 3"), "true");
    assert_eq!(eval_one("nil or 'fallback'"), "fallback");
    assert_eq!(eval_one("not nil == true"), "true");
    assert_eq!(eval_one("7 // 2, 7 % 3, 7 / 2"), "3\t1\t3.5");
}

#[test]
fn test_float_rendering() {
    assert_eq!(eval_one("0.1 + 0.2"), "0.3");
    assert_eq!(eval_one("10 / 2"), "5.0");
    assert_eq!(eval_one("1e100"), "1e+100");
    assert_eq!(eval_one("math.huge, -math.huge"), "inf\t-inf");
    assert_eq!(eval_one("2.5e-7, 1e15, 0.0001"), "2.5e-07\t1e+15\t0.0001");
}

#[test]
fn test_float_rendering_rounds_before_choosing_layout() {
    assert_eq!(eval_one("99999999999999.9"), "1e+14");
    assert_eq!(eval_one("9.99999999999999e-5"), "0.0001");
    assert_eq!(eval_one("12345678901234.4"), "12345678901234.0");
}

#[test]
fn test_oversized_strings_are_runtime_errors() {
    let emulator = LuaEmulator::new();
    assert_eq!(
        emulator.evaluate("string.rep('x', 2^62)"),
        Err(LuaError::runtime("resulting string too large"))
    );
    assert_eq!(
        emulator.evaluate("string.rep('ab', 2^61, ',')"),
        Err(LuaError::runtime("resulting string too large"))
    );
    assert!(matches!(
        emulator.evaluate("string.format('%999999999999d', 1)"),
        Err(LuaError::Runtime(_))
    ));
    assert!(matches!(
        emulator.evaluate("string.format('%.999f', 1)"),
        Err(LuaError::Runtime(_))
    ));
    assert_eq!(eval(&emulator, "string.rep('ab', 3, ',')"), "ab,ab,ab");
    assert_eq!(eval(&emulator, "string.rep('x', 0)"), "");
    assert_eq!(eval(&emulator, "string.format('[%5d]', 42)"), "[   42]");
}

#[test]
fn test_globals_persist_between_fragments() {
    let emulator = LuaEmulator::new();
    assert_eq!(eval(&emulator, "answer = 42"), "");
    assert_eq!(eval(&emulator, "answer"), "42");
    assert_eq!(eval(&emulator, "undefined_global"), "nil");
}

#[test]
fn test_locals_do_not_leak_out_of_a_chunk() {
    let emulator = LuaEmulator::new();
    eval(&emulator, "local hidden = 1 shown = hidden + 1");
    assert_eq!(eval(&emulator, "hidden, shown"), "nil\t2");
}

#[test]
fn test_storage_template() {
    let emulator = LuaEmulator::new();
    eval(&emulator, "store = {}");
    eval(&emulator, "store[1] = (function () return 1 + 1 end)()");
    assert_eq!(eval(&emulator, "store[1]"), "2");
    eval(&emulator, "store[1] = nil");
    assert_eq!(eval(&emulator, "store[1]"), "nil");
}

#[test]
fn test_tables_and_length() {
    let emulator = LuaEmulator::new();
    eval(&emulator, "t = { 1, 2, 3, name = 'x', ['key with space'] = true; }");
    assert_eq!(eval(&emulator, "#t, t.name, t['key with space']"), "3\tx\ttrue");
    eval(&emulator, "t[4] = 'four'");
    assert_eq!(eval(&emulator, "#t"), "4");
    eval(&emulator, "t[2.0] = 'two'");
    assert_eq!(eval(&emulator, "t[2]"), "two");
}

#[test]
fn test_closures_capture_their_scope() {
    let emulator = LuaEmulator::new();
    eval(
        &emulator,
        "function counter() local n = 0 return function () n = n + 1 return n end end",
    );
    eval(&emulator, "c = counter()");
    eval(&emulator, "c()");
    assert_eq!(eval(&emulator, "c()"), "2");
}

#[test]
fn test_method_definitions_and_calls() {
    let emulator = LuaEmulator::new();
    eval(
        &emulator,
        "account = { balance = 10 }
         function account:deposit(n) self.balance = self.balance + n return self.balance end",
    );
    assert_eq!(eval(&emulator, "account:deposit(5)"), "15");
    assert_eq!(eval(&emulator, "account.deposit(account, 5)"), "20");
}

#[test]
fn test_control_flow() {
    let emulator = LuaEmulator::new();
    eval(
        &emulator,
        "total = 0
         for i = 1, 10 do
           if i % 2 == 0 then total = total + i elseif i == 5 then total = total + 100 end
         end
         local n = 3
         while n > 0 do total = total + 1 n = n - 1 end",
    );
    assert_eq!(eval(&emulator, "total"), "133");
    assert_eq!(eval(&emulator, "if total > 0 then return 'positive' else return 'other' end"), "positive");
}

#[test]
fn test_print_output_precedes_returned_values() {
    assert_eq!(eval_one("print('a', 1) return 'b'"), "a\t1\nb");
}

#[test]
fn test_string_library() {
    assert_eq!(eval_one("string.upper('abc'), ('abc'):len()"), "ABC\t3");
    assert_eq!(eval_one("string.sub('hello', 2, -2)"), "ell");
    assert_eq!(eval_one("string.sub('hello', -3)"), "llo");
    assert_eq!(eval_one("string.rep('ab', 3, '-')"), "ab-ab-ab");
    assert_eq!(eval_one("('abc'):reverse()"), "cba");
    assert_eq!(eval_one("string.format('%d items at %.2f%% (%s)', 3, 12.5, 'ok')"), "3 items at 12.50% (ok)");
    assert_eq!(eval_one("string.format('[%5s][%-3d]', 'ab', 7)"), "[   ab][7  ]");
}

#[test]
fn test_math_and_conversion_functions() {
    assert_eq!(eval_one("math.floor(3.7), math.ceil(3.2), math.abs(-4)"), "3\t4\t4");
    assert_eq!(eval_one("math.max(1, 9, 3), math.min(4, -2)"), "9\t-2");
    assert_eq!(eval_one("math.sqrt(16)"), "4.0");
    assert_eq!(eval_one("math.maxinteger + 1 == math.mininteger"), "true");
    assert_eq!(eval_one("tonumber('0x10'), tonumber('1.5'), tonumber('nope')"), "16\t1.5\tnil");
    assert_eq!(eval_one("type(nil), type({}), type(print), type('')"), "nil\ttable\tfunction\tstring");
    assert_eq!(eval_one("tostring(12) .. '!'"), "12!");
}

#[test]
fn test_table_library() {
    let emulator = LuaEmulator::new();
    eval(&emulator, "t = {'b'} table.insert(t, 'c') table.insert(t, 1, 'a')");
    assert_eq!(eval(&emulator, "table.concat(t, ', ')"), "a, b, c");
}

#[test]
fn test_string_escapes() {
    assert_eq!(eval_one(r#""tab\there""#), "tab\there");
    assert_eq!(eval_one(r#"'it\'s'"#), "it's");
    assert_eq!(eval_one(r#""\65\066""#), "AB");
    assert_eq!(eval_one(r#"#"a\\b""#), "3");
}

#[test]
fn test_runtime_errors() {
    let emulator = LuaEmulator::new();
    let err = emulator.evaluate("nothing.field").unwrap_err();
    assert_eq!(err, LuaError::runtime("attempt to index a nil value"));
    let err = emulator.evaluate("undefined_function()").unwrap_err();
    assert_eq!(err, LuaError::runtime("attempt to call a nil value"));
    let err = emulator.evaluate("{} < {}").unwrap_err();
    assert_eq!(err, LuaError::runtime("attempt to compare two table values"));
}

#[test]
fn test_syntax_errors() {
    let emulator = LuaEmulator::new();
    assert!(matches!(emulator.evaluate("1 +"), Err(LuaError::Syntax(_))));
    assert!(matches!(emulator.evaluate("x = = 1"), Err(LuaError::Syntax(_))));
    assert!(matches!(emulator.evaluate("1 = x"), Err(LuaError::Syntax(_))));
}

#[test]
fn test_runaway_recursion_is_an_error() {
    let emulator = LuaEmulator::new();
    eval(&emulator, "function loop(n) return loop(n + 1) end");
    let err = emulator.evaluate("loop(1)").unwrap_err();
    assert_eq!(err, LuaError::runtime("stack overflow"));
}

#[test]
fn test_history_and_globals_access() {
    let emulator = LuaEmulator::new();
    emulator.set_global("injected", LuaValue::Integer(5));
    eval(&emulator, "injected * 2");
    let _ = emulator.evaluate("broken(");
    assert_eq!(emulator.history(), vec!["injected * 2", "broken("]);
    assert_eq!(emulator.get_global("injected"), LuaValue::Integer(5));
    emulator.clear_history();
    assert!(emulator.history().is_empty());
}
