//! Builtin template functions
//!
//! The comparison, logic and formatting functions every template engine of
//! this family ships with, plus the common string, list, dictionary and
//! arithmetic helpers configuration templates lean on. Functions that take
//! a "subject" value expect it last so it can arrive through a pipe:
//! `{{ .Name | trimPrefix "www." }}`.

use std::cmp::Ordering;

use serde_json::{Map, Value};

use super::{expect_args, func, FuncMap, FunctionError};
use crate::template::value::{is_truthy, print_value, to_text, type_name, Num};

type Builtin = fn(&[Value]) -> Result<Value, FunctionError>;

const BUILTINS: &[(&str, Builtin)] = &[
    // logic and comparison
    ("and", and),
    ("or", or),
    ("not", not),
    ("eq", eq),
    ("ne", ne),
    ("lt", lt),
    ("le", le),
    ("gt", gt),
    ("ge", ge),
    // formatting
    ("len", len),
    ("index", index),
    ("print", print),
    ("printf", printf),
    ("println", println),
    // strings
    ("lower", lower),
    ("upper", upper),
    ("title", title),
    ("trim", trim),
    ("trimAll", trim_all),
    ("trimPrefix", trim_prefix),
    ("trimSuffix", trim_suffix),
    ("contains", contains),
    ("hasPrefix", has_prefix),
    ("hasSuffix", has_suffix),
    ("replace", replace),
    ("repeat", repeat),
    ("quote", quote),
    ("squote", squote),
    ("cat", cat),
    ("join", join),
    ("splitList", split_list),
    ("trunc", trunc),
    ("indent", indent),
    ("nindent", nindent),
    // lists and dictionaries
    ("list", list),
    ("dict", dict),
    ("keys", keys),
    ("hasKey", has_key),
    ("get", get),
    ("first", first),
    ("last", last),
    ("rest", rest),
    ("initial", initial),
    ("reverse", reverse),
    ("uniq", uniq),
    ("sortAlpha", sort_alpha),
    ("append", append),
    ("has", has),
    // defaults and conversion
    ("default", default),
    ("empty", empty),
    ("coalesce", coalesce),
    ("ternary", ternary),
    ("toString", to_string),
    ("int", int),
    ("float64", float64),
    ("toJson", to_json),
    // arithmetic
    ("add", add),
    ("add1", add1),
    ("sub", sub),
    ("mul", mul),
    ("div", div),
    ("mod", modulo),
    ("max", max),
    ("min", min),
];

/// The builtin library as a fresh [`FuncMap`]
pub fn builtin_functions() -> FuncMap {
    BUILTINS
        .iter()
        .map(|(name, f)| (name.to_string(), func(*f)))
        .collect()
}

fn at_least(name: &str, args: &[Value], n: usize) -> Result<(), FunctionError> {
    if args.len() >= n {
        Ok(())
    } else {
        Err(FunctionError::new(format!(
            "wrong number of args for {}: want at least {} got {}",
            name,
            n,
            args.len()
        )))
    }
}

fn as_list<'v>(name: &str, value: &'v Value) -> Result<&'v [Value], FunctionError> {
    match value {
        Value::Array(items) => Ok(items),
        other => Err(FunctionError::new(format!(
            "{} expects a list, got {}",
            name,
            type_name(other)
        ))),
    }
}

fn as_map<'v>(name: &str, value: &'v Value) -> Result<&'v Map<String, Value>, FunctionError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(FunctionError::new(format!(
            "{} expects a map, got {}",
            name,
            type_name(other)
        ))),
    }
}

fn as_int(name: &str, value: &Value) -> Result<i64, FunctionError> {
    match value {
        Value::Number(_) => match Num::from_value(value) {
            Some(Num::Int(i)) => Ok(i),
            Some(Num::Float(f)) => Ok(f as i64),
            None => Err(FunctionError::new(format!("{}: number out of range", name))),
        },
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| FunctionError::new(format!("{}: invalid integer {:?}", name, s))),
        Value::Bool(b) => Ok(i64::from(*b)),
        Value::Null => Ok(0),
        other => Err(FunctionError::new(format!(
            "{} expects an integer, got {}",
            name,
            type_name(other)
        ))),
    }
}

fn as_num(name: &str, value: &Value) -> Result<Num, FunctionError> {
    match value {
        Value::Number(_) => Num::from_value(value)
            .ok_or_else(|| FunctionError::new(format!("{}: number out of range", name))),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .map(Num::Int)
                .or_else(|_| s.parse::<f64>().map(Num::Float))
                .map_err(|_| FunctionError::new(format!("{}: invalid number {:?}", name, s)))
        }
        Value::Bool(b) => Ok(Num::Int(i64::from(*b))),
        Value::Null => Ok(Num::Int(0)),
        other => Err(FunctionError::new(format!(
            "{} expects a number, got {}",
            name,
            type_name(other)
        ))),
    }
}

fn num_value(num: Num) -> Value {
    match num {
        Num::Int(i) => Value::from(i),
        Num::Float(f) => Value::from(f),
    }
}

fn text(s: String) -> Result<Value, FunctionError> {
    Ok(Value::String(s))
}

// logic and comparison

fn and(args: &[Value]) -> Result<Value, FunctionError> {
    at_least("and", args, 1)?;
    Ok(args
        .iter()
        .find(|v| !is_truthy(v))
        .unwrap_or(&args[args.len() - 1])
        .clone())
}

fn or(args: &[Value]) -> Result<Value, FunctionError> {
    at_least("or", args, 1)?;
    Ok(args
        .iter()
        .find(|v| is_truthy(v))
        .unwrap_or(&args[args.len() - 1])
        .clone())
}

fn not(args: &[Value]) -> Result<Value, FunctionError> {
    expect_args("not", args, 1)?;
    Ok(Value::Bool(!is_truthy(&args[0])))
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (Num::from_value(a), Num::from_value(b)) {
        (Some(x), Some(y)) => match (x, y) {
            (Num::Int(x), Num::Int(y)) => x == y,
            _ => x.as_f64() == y.as_f64(),
        },
        _ => a == b,
    }
}

/// `eq a b c` is true when `a` equals any of the others
fn eq(args: &[Value]) -> Result<Value, FunctionError> {
    at_least("eq", args, 2)?;
    Ok(Value::Bool(args[1..].iter().any(|b| values_equal(&args[0], b))))
}

fn ne(args: &[Value]) -> Result<Value, FunctionError> {
    expect_args("ne", args, 2)?;
    Ok(Value::Bool(!values_equal(&args[0], &args[1])))
}

fn compare(name: &str, args: &[Value]) -> Result<Ordering, FunctionError> {
    expect_args(name, args, 2)?;
    let (a, b) = (&args[0], &args[1]);
    match (a, b) {
        (Value::String(x), Value::String(y)) => Ok(x.cmp(y)),
        _ => match (Num::from_value(a), Num::from_value(b)) {
            (Some(Num::Int(x)), Some(Num::Int(y))) => Ok(x.cmp(&y)),
            (Some(x), Some(y)) => x
                .as_f64()
                .partial_cmp(&y.as_f64())
                .ok_or_else(|| FunctionError::new("incomparable numbers")),
            _ => Err(FunctionError::new(format!(
                "incompatible types for comparison: {} and {}",
                type_name(a),
                type_name(b)
            ))),
        },
    }
}

fn lt(args: &[Value]) -> Result<Value, FunctionError> {
    Ok(Value::Bool(compare("lt", args)? == Ordering::Less))
}

fn le(args: &[Value]) -> Result<Value, FunctionError> {
    Ok(Value::Bool(compare("le", args)? != Ordering::Greater))
}

fn gt(args: &[Value]) -> Result<Value, FunctionError> {
    Ok(Value::Bool(compare("gt", args)? == Ordering::Greater))
}

fn ge(args: &[Value]) -> Result<Value, FunctionError> {
    Ok(Value::Bool(compare("ge", args)? != Ordering::Less))
}

// formatting

fn len(args: &[Value]) -> Result<Value, FunctionError> {
    expect_args("len", args, 1)?;
    let n = match &args[0] {
        Value::String(s) => s.len(),
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        other => {
            return Err(FunctionError::new(format!(
                "len of type {}",
                type_name(other)
            )))
        }
    };
    Ok(Value::from(n))
}

/// `index coll k1 k2 ...` walks nested lists and maps
fn index(args: &[Value]) -> Result<Value, FunctionError> {
    at_least("index", args, 1)?;
    let mut current = args[0].clone();
    for key in &args[1..] {
        current = match current {
            Value::Array(mut items) => {
                let i = as_int("index", key)?;
                if i < 0 || i as usize >= items.len() {
                    return Err(FunctionError::new(format!("index out of range: {}", i)));
                }
                items.swap_remove(i as usize)
            }
            Value::Object(mut map) => map.remove(&to_text(key)).unwrap_or(Value::Null),
            Value::Null => return Err(FunctionError::new("index of untyped nil")),
            other => {
                return Err(FunctionError::new(format!(
                    "can't index item of type {}",
                    type_name(&other)
                )))
            }
        };
    }
    Ok(current)
}

/// Spaces go between operands when neither side is a string
fn print(args: &[Value]) -> Result<Value, FunctionError> {
    let mut out = String::new();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 && !args[i - 1].is_string() && !arg.is_string() {
            out.push(' ');
        }
        out.push_str(&print_value(arg));
    }
    text(out)
}

fn println(args: &[Value]) -> Result<Value, FunctionError> {
    let mut out = args
        .iter()
        .map(print_value)
        .collect::<Vec<_>>()
        .join(" ");
    out.push('\n');
    text(out)
}

/// Quote a string with escapes, the way configuration formats accept it
fn quote_str(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s))
}

struct Directive {
    left: bool,
    zero: bool,
    plus: bool,
    width: Option<usize>,
    precision: Option<usize>,
}

impl Directive {
    fn pad(&self, body: String) -> String {
        let Some(width) = self.width else {
            return body;
        };
        let len = body.chars().count();
        if len >= width {
            return body;
        }
        let fill = width - len;
        if self.left {
            format!("{}{}", body, " ".repeat(fill))
        } else if self.zero {
            match body.strip_prefix('-') {
                Some(rest) => format!("-{}{}", "0".repeat(fill), rest),
                None => format!("{}{}", "0".repeat(fill), body),
            }
        } else {
            format!("{}{}", " ".repeat(fill), body)
        }
    }
}

fn bad_verb(verb: char, arg: &Value) -> String {
    format!("%!{}({}={})", verb, type_name(arg), print_value(arg))
}

fn format_arg(verb: char, directive: &Directive, arg: &Value) -> String {
    let sign = |s: String, non_negative: bool| {
        if directive.plus && non_negative {
            format!("+{}", s)
        } else {
            s
        }
    };
    match verb {
        'v' | 's' => {
            let mut s = print_value(arg);
            if let Some(p) = directive.precision {
                if verb == 's' {
                    s = s.chars().take(p).collect();
                }
            }
            s
        }
        'q' => quote_str(&to_text(arg)),
        't' => match arg {
            Value::Bool(b) => b.to_string(),
            other => bad_verb(verb, other),
        },
        'd' => match Num::from_value(arg) {
            Some(Num::Int(i)) => sign(i.to_string(), i >= 0),
            _ => bad_verb(verb, arg),
        },
        'f' | 'F' => match Num::from_value(arg) {
            Some(n) => {
                let f = n.as_f64();
                sign(format!("{:.*}", directive.precision.unwrap_or(6), f), f >= 0.0)
            }
            None => bad_verb(verb, arg),
        },
        'x' | 'X' => {
            let s = match arg {
                Value::String(s) => s.bytes().map(|b| format!("{:02x}", b)).collect(),
                _ => match Num::from_value(arg) {
                    Some(Num::Int(i)) if i < 0 => format!("-{:x}", i.unsigned_abs()),
                    Some(Num::Int(i)) => format!("{:x}", i),
                    _ => return bad_verb(verb, arg),
                },
            };
            if verb == 'X' {
                s.to_uppercase()
            } else {
                s
            }
        }
        _ => bad_verb(verb, arg),
    }
}

/// A subset of the classic `printf` verbs with flags, width and precision
fn printf(args: &[Value]) -> Result<Value, FunctionError> {
    at_least("printf", args, 1)?;
    let format = to_text(&args[0]);
    let operands = &args[1..];
    let mut next = 0;
    let mut out = String::new();
    let mut chars = format.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let mut directive = Directive {
            left: false,
            zero: false,
            plus: false,
            width: None,
            precision: None,
        };
        while let Some(&flag) = chars.peek() {
            match flag {
                '-' => directive.left = true,
                '0' => directive.zero = true,
                '+' => directive.plus = true,
                ' ' | '#' => {}
                _ => break,
            }
            chars.next();
        }
        let mut digits = String::new();
        while let Some(d) = chars.peek().filter(|d| d.is_ascii_digit()) {
            digits.push(*d);
            chars.next();
        }
        directive.width = digits.parse().ok();
        if chars.peek() == Some(&'.') {
            chars.next();
            let mut digits = String::new();
            while let Some(d) = chars.peek().filter(|d| d.is_ascii_digit()) {
                digits.push(*d);
                chars.next();
            }
            directive.precision = Some(digits.parse().unwrap_or(0));
        }

        let Some(verb) = chars.next() else {
            out.push_str("%!(NOVERB)");
            break;
        };
        if verb == '%' {
            out.push('%');
            continue;
        }
        match operands.get(next) {
            Some(arg) => {
                out.push_str(&directive.pad(format_arg(verb, &directive, arg)));
                next += 1;
            }
            None => out.push_str(&format!("%!{}(MISSING)", verb)),
        }
    }

    if next < operands.len() {
        let extra = operands[next..]
            .iter()
            .map(|v| format!("{}={}", type_name(v), print_value(v)))
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&format!("%!(EXTRA {})", extra));
    }
    text(out)
}

// strings

fn lower(args: &[Value]) -> Result<Value, FunctionError> {
    expect_args("lower", args, 1)?;
    text(to_text(&args[0]).to_lowercase())
}

fn upper(args: &[Value]) -> Result<Value, FunctionError> {
    expect_args("upper", args, 1)?;
    text(to_text(&args[0]).to_uppercase())
}

fn title(args: &[Value]) -> Result<Value, FunctionError> {
    expect_args("title", args, 1)?;
    let mut out = String::new();
    let mut at_word_start = true;
    for c in to_text(&args[0]).chars() {
        if at_word_start {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        at_word_start = !(c.is_alphanumeric() || c == '_');
    }
    text(out)
}

fn trim(args: &[Value]) -> Result<Value, FunctionError> {
    expect_args("trim", args, 1)?;
    text(to_text(&args[0]).trim().to_string())
}

fn trim_all(args: &[Value]) -> Result<Value, FunctionError> {
    expect_args("trimAll", args, 2)?;
    let cutset: Vec<char> = to_text(&args[0]).chars().collect();
    text(to_text(&args[1]).trim_matches(cutset.as_slice()).to_string())
}

fn trim_prefix(args: &[Value]) -> Result<Value, FunctionError> {
    expect_args("trimPrefix", args, 2)?;
    let (prefix, s) = (to_text(&args[0]), to_text(&args[1]));
    text(s.strip_prefix(prefix.as_str()).unwrap_or(&s).to_string())
}

fn trim_suffix(args: &[Value]) -> Result<Value, FunctionError> {
    expect_args("trimSuffix", args, 2)?;
    let (suffix, s) = (to_text(&args[0]), to_text(&args[1]));
    text(s.strip_suffix(suffix.as_str()).unwrap_or(&s).to_string())
}

fn contains(args: &[Value]) -> Result<Value, FunctionError> {
    expect_args("contains", args, 2)?;
    Ok(Value::Bool(to_text(&args[1]).contains(&to_text(&args[0]))))
}

fn has_prefix(args: &[Value]) -> Result<Value, FunctionError> {
    expect_args("hasPrefix", args, 2)?;
    Ok(Value::Bool(to_text(&args[1]).starts_with(&to_text(&args[0]))))
}

fn has_suffix(args: &[Value]) -> Result<Value, FunctionError> {
    expect_args("hasSuffix", args, 2)?;
    Ok(Value::Bool(to_text(&args[1]).ends_with(&to_text(&args[0]))))
}

fn replace(args: &[Value]) -> Result<Value, FunctionError> {
    expect_args("replace", args, 3)?;
    let (old, new) = (to_text(&args[0]), to_text(&args[1]));
    text(to_text(&args[2]).replace(&old, &new))
}

fn repeat(args: &[Value]) -> Result<Value, FunctionError> {
    expect_args("repeat", args, 2)?;
    let count = as_int("repeat", &args[0])?;
    if count < 0 {
        return Err(FunctionError::new("repeat: negative count"));
    }
    text(to_text(&args[1]).repeat(count as usize))
}

fn quote(args: &[Value]) -> Result<Value, FunctionError> {
    text(
        args.iter()
            .filter(|v| !v.is_null())
            .map(|v| quote_str(&to_text(v)))
            .collect::<Vec<_>>()
            .join(" "),
    )
}

fn squote(args: &[Value]) -> Result<Value, FunctionError> {
    text(
        args.iter()
            .filter(|v| !v.is_null())
            .map(|v| format!("'{}'", to_text(v)))
            .collect::<Vec<_>>()
            .join(" "),
    )
}

fn cat(args: &[Value]) -> Result<Value, FunctionError> {
    text(
        args.iter()
            .filter(|v| !v.is_null())
            .map(to_text)
            .collect::<Vec<_>>()
            .join(" "),
    )
}

fn join(args: &[Value]) -> Result<Value, FunctionError> {
    expect_args("join", args, 2)?;
    let sep = to_text(&args[0]);
    let joined = match &args[1] {
        Value::Array(items) => items
            .iter()
            .filter(|v| !v.is_null())
            .map(to_text)
            .collect::<Vec<_>>()
            .join(&sep),
        other => to_text(other),
    };
    text(joined)
}

fn split_list(args: &[Value]) -> Result<Value, FunctionError> {
    expect_args("splitList", args, 2)?;
    let parts = crate::strings::split(&to_text(&args[0]), &to_text(&args[1]));
    Ok(Value::Array(parts.into_iter().map(Value::String).collect()))
}

/// `trunc n s` keeps the first `n` chars, or the last `-n` when negative
fn trunc(args: &[Value]) -> Result<Value, FunctionError> {
    expect_args("trunc", args, 2)?;
    let n = as_int("trunc", &args[0])?;
    let chars: Vec<char> = to_text(&args[1]).chars().collect();
    let kept: String = if n >= 0 {
        chars.iter().take(n as usize).collect()
    } else {
        let skip = chars.len().saturating_sub(n.unsigned_abs() as usize);
        chars[skip..].iter().collect()
    };
    text(kept)
}

fn indent_text(name: &str, args: &[Value]) -> Result<String, FunctionError> {
    expect_args(name, args, 2)?;
    let width = as_int(name, &args[0])?.max(0) as usize;
    let pad = " ".repeat(width);
    Ok(to_text(&args[1])
        .split('\n')
        .map(|line| format!("{}{}", pad, line))
        .collect::<Vec<_>>()
        .join("\n"))
}

fn indent(args: &[Value]) -> Result<Value, FunctionError> {
    text(indent_text("indent", args)?)
}

fn nindent(args: &[Value]) -> Result<Value, FunctionError> {
    text(format!("\n{}", indent_text("nindent", args)?))
}

// lists and dictionaries

fn list(args: &[Value]) -> Result<Value, FunctionError> {
    Ok(Value::Array(args.to_vec()))
}

fn dict(args: &[Value]) -> Result<Value, FunctionError> {
    let mut map = Map::new();
    for pair in args.chunks(2) {
        let value = pair.get(1).cloned().unwrap_or_else(|| Value::String(String::new()));
        map.insert(to_text(&pair[0]), value);
    }
    Ok(Value::Object(map))
}

fn keys(args: &[Value]) -> Result<Value, FunctionError> {
    at_least("keys", args, 1)?;
    let mut names = Vec::new();
    for arg in args {
        names.extend(as_map("keys", arg)?.keys().cloned());
    }
    names.sort();
    Ok(Value::Array(names.into_iter().map(Value::String).collect()))
}

fn has_key(args: &[Value]) -> Result<Value, FunctionError> {
    expect_args("hasKey", args, 2)?;
    let map = as_map("hasKey", &args[0])?;
    Ok(Value::Bool(map.contains_key(&to_text(&args[1]))))
}

fn get(args: &[Value]) -> Result<Value, FunctionError> {
    expect_args("get", args, 2)?;
    let map = as_map("get", &args[0])?;
    Ok(map
        .get(&to_text(&args[1]))
        .cloned()
        .unwrap_or_else(|| Value::String(String::new())))
}

fn first(args: &[Value]) -> Result<Value, FunctionError> {
    expect_args("first", args, 1)?;
    Ok(as_list("first", &args[0])?.first().cloned().unwrap_or(Value::Null))
}

fn last(args: &[Value]) -> Result<Value, FunctionError> {
    expect_args("last", args, 1)?;
    Ok(as_list("last", &args[0])?.last().cloned().unwrap_or(Value::Null))
}

fn rest(args: &[Value]) -> Result<Value, FunctionError> {
    expect_args("rest", args, 1)?;
    let items = as_list("rest", &args[0])?;
    Ok(Value::Array(items.iter().skip(1).cloned().collect()))
}

fn initial(args: &[Value]) -> Result<Value, FunctionError> {
    expect_args("initial", args, 1)?;
    let items = as_list("initial", &args[0])?;
    let keep = items.len().saturating_sub(1);
    Ok(Value::Array(items[..keep].to_vec()))
}

fn reverse(args: &[Value]) -> Result<Value, FunctionError> {
    expect_args("reverse", args, 1)?;
    let mut items = as_list("reverse", &args[0])?.to_vec();
    items.reverse();
    Ok(Value::Array(items))
}

fn uniq(args: &[Value]) -> Result<Value, FunctionError> {
    expect_args("uniq", args, 1)?;
    let mut seen: Vec<&Value> = Vec::new();
    for item in as_list("uniq", &args[0])? {
        if !seen.iter().any(|s| values_equal(s, item)) {
            seen.push(item);
        }
    }
    Ok(Value::Array(seen.into_iter().cloned().collect()))
}

fn sort_alpha(args: &[Value]) -> Result<Value, FunctionError> {
    expect_args("sortAlpha", args, 1)?;
    let mut items: Vec<String> = match &args[0] {
        Value::Array(items) => items.iter().map(to_text).collect(),
        other => vec![to_text(other)],
    };
    items.sort();
    Ok(Value::Array(items.into_iter().map(Value::String).collect()))
}

fn append(args: &[Value]) -> Result<Value, FunctionError> {
    expect_args("append", args, 2)?;
    let mut items = as_list("append", &args[0])?.to_vec();
    items.push(args[1].clone());
    Ok(Value::Array(items))
}

/// `has needle list`
fn has(args: &[Value]) -> Result<Value, FunctionError> {
    expect_args("has", args, 2)?;
    let found = match &args[1] {
        Value::Array(items) => items.iter().any(|v| values_equal(v, &args[0])),
        Value::Null => false,
        other => {
            return Err(FunctionError::new(format!(
                "has expects a list, got {}",
                type_name(other)
            )))
        }
    };
    Ok(Value::Bool(found))
}

// defaults and conversion

/// `default fallback given` yields `fallback` when `given` is empty or absent
fn default(args: &[Value]) -> Result<Value, FunctionError> {
    at_least("default", args, 1)?;
    match args.get(1) {
        Some(given) if is_truthy(given) => Ok(given.clone()),
        _ => Ok(args[0].clone()),
    }
}

fn empty(args: &[Value]) -> Result<Value, FunctionError> {
    expect_args("empty", args, 1)?;
    Ok(Value::Bool(!is_truthy(&args[0])))
}

fn coalesce(args: &[Value]) -> Result<Value, FunctionError> {
    Ok(args
        .iter()
        .find(|v| is_truthy(v))
        .cloned()
        .unwrap_or(Value::Null))
}

/// `ternary if_true if_false condition`
fn ternary(args: &[Value]) -> Result<Value, FunctionError> {
    expect_args("ternary", args, 3)?;
    Ok(if is_truthy(&args[2]) {
        args[0].clone()
    } else {
        args[1].clone()
    })
}

fn to_string(args: &[Value]) -> Result<Value, FunctionError> {
    expect_args("toString", args, 1)?;
    text(to_text(&args[0]))
}

fn int(args: &[Value]) -> Result<Value, FunctionError> {
    expect_args("int", args, 1)?;
    if let Value::String(s) = &args[0] {
        if let Ok(f) = s.trim().parse::<f64>() {
            if s.trim().parse::<i64>().is_err() {
                return Ok(Value::from(f as i64));
            }
        }
    }
    Ok(Value::from(as_int("int", &args[0])?))
}

fn float64(args: &[Value]) -> Result<Value, FunctionError> {
    expect_args("float64", args, 1)?;
    Ok(Value::from(as_num("float64", &args[0])?.as_f64()))
}

fn to_json(args: &[Value]) -> Result<Value, FunctionError> {
    expect_args("toJson", args, 1)?;
    serde_json::to_string(&args[0])
        .map(Value::String)
        .map_err(|e| FunctionError::new(e.to_string()))
}

// arithmetic

fn fold_nums(
    name: &str,
    args: &[Value],
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value, FunctionError> {
    at_least(name, args, 1)?;
    let mut acc = as_num(name, &args[0])?;
    for arg in &args[1..] {
        let next = as_num(name, arg)?;
        acc = match (acc, next) {
            (Num::Int(a), Num::Int(b)) => Num::Int(
                int_op(a, b).ok_or_else(|| FunctionError::new(format!("{}: integer overflow", name)))?,
            ),
            (a, b) => Num::Float(float_op(a.as_f64(), b.as_f64())),
        };
    }
    Ok(num_value(acc))
}

fn add(args: &[Value]) -> Result<Value, FunctionError> {
    fold_nums("add", args, i64::checked_add, |a, b| a + b)
}

fn add1(args: &[Value]) -> Result<Value, FunctionError> {
    expect_args("add1", args, 1)?;
    fold_nums("add1", &[args[0].clone(), Value::from(1)], i64::checked_add, |a, b| a + b)
}

fn sub(args: &[Value]) -> Result<Value, FunctionError> {
    expect_args("sub", args, 2)?;
    fold_nums("sub", args, i64::checked_sub, |a, b| a - b)
}

fn mul(args: &[Value]) -> Result<Value, FunctionError> {
    fold_nums("mul", args, i64::checked_mul, |a, b| a * b)
}

fn div(args: &[Value]) -> Result<Value, FunctionError> {
    expect_args("div", args, 2)?;
    if as_num("div", &args[1])?.as_f64() == 0.0 {
        return Err(FunctionError::new("div: division by zero"));
    }
    fold_nums("div", args, i64::checked_div, |a, b| a / b)
}

fn modulo(args: &[Value]) -> Result<Value, FunctionError> {
    expect_args("mod", args, 2)?;
    let (a, b) = (as_int("mod", &args[0])?, as_int("mod", &args[1])?);
    a.checked_rem(b)
        .map(Value::from)
        .ok_or_else(|| FunctionError::new("mod: division by zero"))
}

fn max(args: &[Value]) -> Result<Value, FunctionError> {
    fold_nums("max", args, |a, b| Some(a.max(b)), f64::max)
}

fn min(args: &[Value]) -> Result<Value, FunctionError> {
    fold_nums("min", args, |a, b| Some(a.min(b)), f64::min)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;
    use serde_json::json;

    fn call(name: &str, args: &[Value]) -> Result<Value, FunctionError> {
        let funcs = builtin_functions();
        let f = funcs.get(name).expect("builtin should exist");
        (**f)(args)
    }

    fn ok(name: &str, args: &[Value]) -> Value {
        call(name, args).expect("call should succeed")
    }

    #[test]
    fn test_names_are_unique() {
        let names: HashSet<&str> = BUILTINS.iter().map(|(name, _)| *name).collect();
        assert_eq!(names.len(), BUILTINS.len());
    }

    #[test]
    fn test_and_or_return_operands() {
        assert_eq!(ok("and", &[json!(1), json!(""), json!(2)]), json!(""));
        assert_eq!(ok("and", &[json!(1), json!(2)]), json!(2));
        assert_eq!(ok("or", &[json!(0), json!("x")]), json!("x"));
        assert_eq!(ok("or", &[json!(0), json!(false)]), json!(false));
        assert_eq!(ok("not", &[json!([])]), json!(true));
    }

    #[test]
    fn test_equality_mixes_int_and_float() {
        assert_eq!(ok("eq", &[json!(1), json!(1.0)]), json!(true));
        assert_eq!(ok("eq", &[json!("a"), json!("b"), json!("a")]), json!(true));
        assert_eq!(ok("ne", &[json!("a"), json!("b")]), json!(true));
    }

    #[test]
    fn test_ordering() {
        assert_eq!(ok("lt", &[json!(1), json!(2)]), json!(true));
        assert_eq!(ok("ge", &[json!(2.5), json!(2)]), json!(true));
        assert_eq!(ok("gt", &[json!("b"), json!("a")]), json!(true));
        let err = call("lt", &[json!("a"), json!(1)]).unwrap_err();
        assert_eq!(err.message, "incompatible types for comparison: string and int");
    }

    #[test]
    fn test_len_and_index() {
        assert_eq!(ok("len", &[json!("abc")]), json!(3));
        assert_eq!(ok("len", &[json!({"a": 1})]), json!(1));
        assert!(call("len", &[json!(3)]).is_err());

        let data = json!({"a": [10, {"b": "deep"}]});
        assert_eq!(ok("index", &[data.clone(), json!("a"), json!(1), json!("b")]), json!("deep"));
        assert_eq!(ok("index", &[data.clone(), json!("zzz")]), json!(null));
        let err = call("index", &[json!([1]), json!(4)]).unwrap_err();
        assert_eq!(err.message, "index out of range: 4");
    }

    #[test]
    fn test_print_family() {
        assert_eq!(ok("print", &[json!("a"), json!(1), json!(2), json!("b")]), json!("a1 2b"));
        assert_eq!(ok("println", &[json!("a"), json!(1)]), json!("a 1\n"));
    }

    #[test]
    fn test_printf_verbs() {
        assert_eq!(
            ok("printf", &[json!("%s:%d"), json!("host"), json!(80)]),
            json!("host:80")
        );
        assert_eq!(ok("printf", &[json!("%q"), json!("a\"b")]), json!("\"a\\\"b\""));
        assert_eq!(ok("printf", &[json!("%.2f"), json!(1)]), json!("1.00"));
        assert_eq!(ok("printf", &[json!("%05d"), json!(-42)]), json!("-0042"));
        assert_eq!(ok("printf", &[json!("%-4s|"), json!("ab")]), json!("ab  |"));
        assert_eq!(ok("printf", &[json!("%x %X"), json!(255), json!("hi")]), json!("ff 6869"));
        assert_eq!(ok("printf", &[json!("%t %v"), json!(true), json!(null)]), json!("true <nil>"));
        assert_eq!(ok("printf", &[json!("100%%")]), json!("100%"));
    }

    #[test]
    fn test_printf_argument_mismatch() {
        assert_eq!(ok("printf", &[json!("%s %s"), json!("a")]), json!("a %!s(MISSING)"));
        assert_eq!(
            ok("printf", &[json!("%s"), json!("a"), json!(1)]),
            json!("a%!(EXTRA int=1)")
        );
        assert_eq!(ok("printf", &[json!("%d"), json!("x")]), json!("%!d(string=x)"));
    }

    #[test]
    fn test_string_helpers_take_subject_last() {
        assert_eq!(ok("trimPrefix", &[json!("www."), json!("www.a.com")]), json!("a.com"));
        assert_eq!(ok("trimSuffix", &[json!(".com"), json!("a.com")]), json!("a"));
        assert_eq!(ok("trimAll", &[json!("$"), json!("$5$")]), json!("5"));
        assert_eq!(ok("replace", &[json!("."), json!("-"), json!("a.b.c")]), json!("a-b-c"));
        assert_eq!(ok("contains", &[json!("b"), json!("abc")]), json!(true));
        assert_eq!(ok("hasPrefix", &[json!("a"), json!("abc")]), json!(true));
        assert_eq!(ok("hasSuffix", &[json!("x"), json!("abc")]), json!(false));
        assert_eq!(ok("repeat", &[json!(3), json!("ab")]), json!("ababab"));
        assert_eq!(ok("title", &[json!("hello wide-world")]), json!("Hello Wide-World"));
        assert_eq!(ok("upper", &[json!("abc")]), json!("ABC"));
        assert_eq!(ok("trim", &[json!("  x \n")]), json!("x"));
    }

    #[test]
    fn test_quoting_and_joining() {
        assert_eq!(ok("quote", &[json!("a"), json!(1)]), json!("\"a\" \"1\""));
        assert_eq!(ok("squote", &[json!("a")]), json!("'a'"));
        assert_eq!(ok("cat", &[json!("a"), json!(null), json!(2)]), json!("a 2"));
        assert_eq!(ok("join", &[json!(","), json!(["a", 1])]), json!("a,1"));
        assert_eq!(ok("splitList", &[json!(","), json!("a,b")]), json!(["a", "b"]));
    }

    #[test]
    fn test_trunc_and_indent() {
        assert_eq!(ok("trunc", &[json!(3), json!("abcdef")]), json!("abc"));
        assert_eq!(ok("trunc", &[json!(-2), json!("abcdef")]), json!("ef"));
        assert_eq!(ok("trunc", &[json!(10), json!("ab")]), json!("ab"));
        assert_eq!(ok("indent", &[json!(2), json!("a\nb")]), json!("  a\n  b"));
        assert_eq!(ok("nindent", &[json!(2), json!("a")]), json!("\n  a"));
    }

    #[test]
    fn test_list_helpers() {
        let items = json!(["b", "a", "b"]);
        assert_eq!(ok("first", &[items.clone()]), json!("b"));
        assert_eq!(ok("last", &[items.clone()]), json!("b"));
        assert_eq!(ok("rest", &[items.clone()]), json!(["a", "b"]));
        assert_eq!(ok("initial", &[items.clone()]), json!(["b", "a"]));
        assert_eq!(ok("reverse", &[items.clone()]), json!(["b", "a", "b"]));
        assert_eq!(ok("uniq", &[items.clone()]), json!(["b", "a"]));
        assert_eq!(ok("sortAlpha", &[items.clone()]), json!(["a", "b", "b"]));
        assert_eq!(ok("append", &[items.clone(), json!("c")]), json!(["b", "a", "b", "c"]));
        assert_eq!(ok("has", &[json!("a"), items.clone()]), json!(true));
        assert_eq!(ok("first", &[json!([])]), json!(null));
        assert_eq!(ok("list", &[json!(1), json!("x")]), json!([1, "x"]));
        assert!(call("first", &[json!("x")]).is_err());
    }

    #[test]
    fn test_dict_helpers() {
        let d = ok("dict", &[json!("b"), json!(2), json!("a"), json!(1)]);
        assert_eq!(d, json!({"a": 1, "b": 2}));
        assert_eq!(ok("keys", &[d.clone()]), json!(["a", "b"]));
        assert_eq!(ok("hasKey", &[d.clone(), json!("a")]), json!(true));
        assert_eq!(ok("get", &[d.clone(), json!("b")]), json!(2));
        assert_eq!(ok("get", &[d, json!("z")]), json!(""));
    }

    #[test]
    fn test_defaults() {
        assert_eq!(ok("default", &[json!("x"), json!("")]), json!("x"));
        assert_eq!(ok("default", &[json!("x"), json!("y")]), json!("y"));
        assert_eq!(ok("default", &[json!("x")]), json!("x"));
        assert_eq!(ok("empty", &[json!(0)]), json!(true));
        assert_eq!(ok("coalesce", &[json!(null), json!(""), json!("z")]), json!("z"));
        assert_eq!(ok("ternary", &[json!("y"), json!("n"), json!(false)]), json!("n"));
    }

    #[test]
    fn test_conversions() {
        assert_eq!(ok("toString", &[json!(12)]), json!("12"));
        assert_eq!(ok("int", &[json!("42")]), json!(42));
        assert_eq!(ok("int", &[json!("4.7")]), json!(4));
        assert_eq!(ok("int", &[json!(3.9)]), json!(3));
        assert_eq!(ok("float64", &[json!("1.5")]), json!(1.5));
        assert_eq!(ok("toJson", &[json!({"a": [1]})]), json!("{\"a\":[1]}"));
        assert!(call("int", &[json!("abc")]).is_err());
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(ok("add", &[json!(1), json!(2), json!(3)]), json!(6));
        assert_eq!(ok("add", &[json!(1), json!(0.5)]), json!(1.5));
        assert_eq!(ok("add1", &[json!(41)]), json!(42));
        assert_eq!(ok("sub", &[json!(5), json!(7)]), json!(-2));
        assert_eq!(ok("mul", &[json!(4), json!("3")]), json!(12));
        assert_eq!(ok("div", &[json!(7), json!(2)]), json!(3));
        assert_eq!(ok("mod", &[json!(7), json!(4)]), json!(3));
        assert_eq!(ok("max", &[json!(1), json!(9), json!(3)]), json!(9));
        assert_eq!(ok("min", &[json!(1), json!(-9)]), json!(-9));
        assert_eq!(call("div", &[json!(1), json!(0)]).unwrap_err().message, "div: division by zero");
        assert!(call("mod", &[json!(1), json!(0)]).is_err());
        assert!(call("add", &[json!(i64::MAX), json!(1)]).is_err());
    }
}
