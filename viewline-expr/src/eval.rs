//! Expression evaluation.
//!
//! Every evaluation runs against an [`EvalCtx`]: `object` is the
//! document that bare `$...` paths resolve against, `local` is the
//! document bound to `$$...` inside comprehension lambdas. Contexts are
//! passed by value so a parent's context is untouched when `@map` or
//! `@filter` push a local binding.
//!
//! Operators on missing paths see `null`; type mismatches and arity
//! violations fail with an `Expression` error naming the offending
//! node.

use serde_json::Value;
use tracing::trace;

use viewline_core::value::{self, Map};
use viewline_core::{Error, Result};

use crate::expression::{Expression, Literal};
use crate::path::Path;
use crate::selector::Selector;

/// The evaluation context.
#[derive(Debug, Clone, Copy)]
pub struct EvalCtx<'a> {
    /// The document `$...` paths resolve against.
    pub object: &'a Value,
    /// The document `$$...` paths resolve against, if any.
    pub local: Option<&'a Value>,
}

impl<'a> EvalCtx<'a> {
    /// A context with no local binding.
    pub fn new(object: &'a Value) -> Self {
        Self {
            object,
            local: None,
        }
    }

    /// A copy of this context with `local` bound to the given document.
    pub fn with_local(&self, local: &'a Value) -> Self {
        Self {
            object: self.object,
            local: Some(local),
        }
    }
}

impl Expression {
    /// Evaluates the expression against a context.
    pub fn evaluate(&self, ctx: &EvalCtx) -> Result<Value> {
        match self.eval(ctx) {
            Ok(v) => {
                trace!(expression = %self, result = %v, "eval ready");
                Ok(v)
            }
            Err(e @ Error::Expression { .. }) => Err(e),
            Err(e) => Err(Error::expression(self, e.to_string())),
        }
    }

    fn eval(&self, ctx: &EvalCtx) -> Result<Value> {
        match self.op.as_str() {
            "@null" => Ok(Value::Null),
            "@bool" => match &self.literal {
                Some(Literal::Bool(b)) => Ok(Value::Bool(*b)),
                _ => value::as_bool(&self.unary_arg(ctx)?).map(Value::Bool),
            },
            "@int" => match &self.literal {
                Some(Literal::Int(i)) => Ok(Value::from(*i)),
                _ => value::as_int(&self.unary_arg(ctx)?).map(Value::from),
            },
            "@float" => match &self.literal {
                Some(Literal::Float(f)) => Ok(Value::from(*f)),
                _ => value::as_float(&self.unary_arg(ctx)?).map(Value::from),
            },
            "@string" => match &self.literal {
                Some(Literal::String(s)) => resolve_string(s, ctx),
                _ => value::as_string(&self.unary_arg(ctx)?).map(Value::String),
            },
            "@list" => match &self.literal {
                Some(Literal::List(items)) => {
                    let vs = items
                        .iter()
                        .map(|e| e.evaluate(ctx))
                        .collect::<Result<Vec<_>>>()?;
                    Ok(Value::Array(vs))
                }
                _ => self.required_arg()?.evaluate(ctx),
            },
            "@dict" => match &self.literal {
                Some(Literal::Dict(entries)) => eval_dict(entries, ctx),
                _ => Err(Error::InvalidArguments(
                    "@dict takes a mapping literal".into(),
                )),
            },

            // logical
            "@not" => {
                let v = self.unary_arg(ctx)?;
                Ok(Value::Bool(!value::as_bool(&v)?))
            }
            "@and" => self.eval_junction(ctx, true),
            "@or" => self.eval_junction(ctx, false),
            "@eq" => {
                let args = self.eval_args(ctx, Some(2))?;
                Ok(Value::Bool(args[0] == args[1]))
            }
            "@neq" => {
                let args = self.eval_args(ctx, Some(2))?;
                Ok(Value::Bool(args[0] != args[1]))
            }
            "@lt" => self.eval_compare(ctx, |o| o.is_lt()),
            "@lte" => self.eval_compare(ctx, |o| o.is_le()),
            "@gt" => self.eval_compare(ctx, |o| o.is_gt()),
            "@gte" => self.eval_compare(ctx, |o| o.is_ge()),

            // numeric
            "@sum" => self.eval_fold(ctx, Num::add),
            "@mul" => self.eval_fold(ctx, Num::mul),
            "@sub" => {
                let [a, b] = self.two_nums(ctx)?;
                a.sub(b).map(Num::into_value)
            }
            "@div" => {
                let [a, b] = self.two_nums(ctx)?;
                a.div(b).map(Num::into_value)
            }
            "@mod" => {
                let [a, b] = self.two_nums(ctx)?;
                a.rem(b).map(Num::into_value)
            }
            "@abs" => Num::from_value(&self.unary_arg(ctx)?)?.abs().map(Num::into_value),
            "@neg" => Num::from_value(&self.unary_arg(ctx)?)?.neg().map(Num::into_value),

            // string
            "@concat" => {
                let args = self.eval_args(ctx, None)?;
                if args.is_empty() {
                    return Err(Error::InvalidArguments("@concat needs arguments".into()));
                }
                let mut out = String::new();
                for a in &args {
                    out.push_str(&value::as_string(a)?);
                }
                Ok(Value::String(out))
            }
            "@match" => {
                let args = self.eval_args(ctx, Some(2))?;
                let s = value::as_string(&args[0])?;
                let pattern = value::as_string(&args[1])?;
                let re = regex::Regex::new(&pattern)
                    .map_err(|e| Error::InvalidArguments(format!("bad regex {pattern:?}: {e}")))?;
                Ok(Value::Bool(re.is_match(&s)))
            }

            // collection
            "@len" => {
                let v = collection_arg(self.required_arg()?.evaluate(ctx)?);
                match &v {
                    Value::Array(items) => Ok(Value::from(items.len() as i64)),
                    Value::String(s) => Ok(Value::from(s.chars().count() as i64)),
                    other => Err(Error::InvalidArguments(format!(
                        "@len expects a list or string, got {other}"
                    ))),
                }
            }
            "@in" => {
                let args = self.eval_args(ctx, Some(2))?;
                let list = value::as_list(&args[1])?;
                Ok(Value::Bool(list.contains(&args[0])))
            }
            "@first" => {
                let v = collection_arg(self.required_arg()?.evaluate(ctx)?);
                Ok(value::as_list(&v)?.first().cloned().unwrap_or(Value::Null))
            }
            "@last" => {
                let v = collection_arg(self.required_arg()?.evaluate(ctx)?);
                Ok(value::as_list(&v)?.last().cloned().unwrap_or(Value::Null))
            }

            // document
            "@isnil" => Ok(Value::Bool(self.unary_arg(ctx)?.is_null())),
            "@exists" => Ok(Value::Bool(!self.unary_arg(ctx)?.is_null())),

            // selectors
            "@selector" => {
                let args = self.eval_args(ctx, Some(2))?;
                let selector = Selector::from_value(&args[0])?;
                selector.matches_value(&args[1]).map(Value::Bool)
            }

            // comprehensions
            "@map" => {
                let (lambda, list) = self.lambda_args(ctx)?;
                let mut out = Vec::with_capacity(list.len());
                for el in &list {
                    out.push(lambda.evaluate(&ctx.with_local(el))?);
                }
                Ok(Value::Array(out))
            }
            "@filter" => {
                let (lambda, list) = self.lambda_args(ctx)?;
                let mut out = Vec::new();
                for el in &list {
                    let keep = lambda.evaluate(&ctx.with_local(el))?;
                    if value::as_bool(&keep)? {
                        out.push(el.clone());
                    }
                }
                Ok(Value::Array(out))
            }

            other => Err(Error::InvalidArguments(format!("unknown operator {other}"))),
        }
    }

    fn required_arg(&self) -> Result<&Expression> {
        self.arg
            .as_deref()
            .ok_or_else(|| Error::InvalidArguments(format!("{} needs an argument", self.op)))
    }

    /// Evaluates the operand of a unary operator. A singleton list
    /// argument is unwrapped to its element, so `{"@abs": [-1]}` and
    /// `{"@abs": -1}` mean the same thing.
    fn unary_arg(&self, ctx: &EvalCtx) -> Result<Value> {
        let v = self.required_arg()?.evaluate(ctx)?;
        match v {
            Value::Array(mut items) if items.len() == 1 => Ok(items.remove(0)),
            other => Ok(other),
        }
    }

    /// Evaluates the materialized argument list, checking arity.
    fn eval_args(&self, ctx: &EvalCtx, arity: Option<usize>) -> Result<Vec<Value>> {
        let v = self.required_arg()?.evaluate(ctx)?;
        let Value::Array(items) = v else {
            return Err(Error::InvalidArguments(format!(
                "{} takes a list argument, got {v}",
                self.op
            )));
        };
        if let Some(n) = arity {
            if items.len() != n {
                return Err(Error::InvalidArguments(format!(
                    "{} takes {n} arguments, got {}",
                    self.op,
                    items.len()
                )));
            }
        }
        Ok(items)
    }

    /// Short-circuit `@and`/`@or`. `identity` is the result of the
    /// empty prefix: `true` for `@and`, `false` for `@or`.
    fn eval_junction(&self, ctx: &EvalCtx, identity: bool) -> Result<Value> {
        let arg = self.required_arg()?;
        if let Some(Literal::List(items)) = &arg.literal {
            if items.is_empty() {
                return Err(Error::InvalidArguments(format!(
                    "{} needs at least one argument",
                    self.op
                )));
            }
            for item in items {
                let v = value::as_bool(&item.evaluate(ctx)?)?;
                if v != identity {
                    return Ok(Value::Bool(v));
                }
            }
            return Ok(Value::Bool(identity));
        }
        // the argument list itself was computed, no short-circuiting
        let args = self.eval_args(ctx, None)?;
        if args.is_empty() {
            return Err(Error::InvalidArguments(format!(
                "{} needs at least one argument",
                self.op
            )));
        }
        for v in &args {
            let b = value::as_bool(v)?;
            if b != identity {
                return Ok(Value::Bool(b));
            }
        }
        Ok(Value::Bool(identity))
    }

    fn eval_compare(
        &self,
        ctx: &EvalCtx,
        accept: impl Fn(std::cmp::Ordering) -> bool,
    ) -> Result<Value> {
        let args = self.eval_args(ctx, Some(2))?;
        let ord = match (&args[0], &args[1]) {
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (a, b) => {
                let (a, b) = (Num::from_value(a)?, Num::from_value(b)?);
                a.compare(b)?
            }
        };
        Ok(Value::Bool(accept(ord)))
    }

    fn eval_fold(&self, ctx: &EvalCtx, fold: impl Fn(Num, Num) -> Result<Num>) -> Result<Value> {
        let args = self.eval_args(ctx, None)?;
        if args.is_empty() {
            return Err(Error::InvalidArguments(format!(
                "{} needs at least one argument",
                self.op
            )));
        }
        let mut acc = Num::from_value(&args[0])?;
        for v in &args[1..] {
            acc = fold(acc, Num::from_value(v)?)?;
        }
        Ok(acc.into_value())
    }

    fn two_nums(&self, ctx: &EvalCtx) -> Result<[Num; 2]> {
        let args = self.eval_args(ctx, Some(2))?;
        Ok([Num::from_value(&args[0])?, Num::from_value(&args[1])?])
    }

    /// The `[lambda, list]` argument pair of a comprehension: the
    /// lambda stays unevaluated, the list is materialized.
    fn lambda_args<'e>(&'e self, ctx: &EvalCtx) -> Result<(&'e Expression, Vec<Value>)> {
        let arg = self.required_arg()?;
        let Some(Literal::List(items)) = &arg.literal else {
            return Err(Error::InvalidArguments(format!(
                "{} takes [lambda, list] arguments",
                self.op
            )));
        };
        if items.len() != 2 {
            return Err(Error::InvalidArguments(format!(
                "{} takes [lambda, list] arguments, got {} entries",
                self.op,
                items.len()
            )));
        }
        let list = items[1].evaluate(ctx)?;
        let Value::Array(list) = list else {
            return Err(Error::InvalidArguments(format!(
                "{} expects its second argument to evaluate to a list, got {list}",
                self.op
            )));
        };
        Ok((&items[0], list))
    }
}

/// Resolves a string literal: `$...`/`$$...` activate JSONPath
/// semantics, anything else stays a plain string.
fn resolve_string(s: &str, ctx: &EvalCtx) -> Result<Value> {
    if let Some(local_path) = s.strip_prefix("$$") {
        let local = ctx.local.ok_or_else(|| {
            Error::InvalidArguments(format!("{s}: no local context for a $$ reference"))
        })?;
        let path = Path::parse(&format!("${local_path}"))?;
        return Ok(path.get(local).unwrap_or(Value::Null));
    }
    if s.starts_with('$') {
        let path = Path::parse(s)?;
        return Ok(path.get(ctx.object).unwrap_or(Value::Null));
    }
    Ok(Value::String(s.to_string()))
}

/// Evaluates a dict literal into a fresh document. Plain keys insert;
/// `$`-keys are setter paths constructing into the result, later
/// writes overlaying earlier ones.
fn eval_dict(entries: &[(String, Expression)], ctx: &EvalCtx) -> Result<Value> {
    let mut out = Value::Object(Map::new());
    for (key, sub) in entries {
        let v = sub.evaluate(ctx)?;
        if key.starts_with('$') {
            Path::parse(key)?.set(&mut out, v)?;
        } else if let Value::Object(m) = &mut out {
            m.insert(key.clone(), v);
        }
    }
    Ok(out)
}

/// Unwraps a singleton list-of-list argument so that unary collection
/// operators work both on `["$.path"]` and on a literal list.
fn collection_arg(v: Value) -> Value {
    if let Value::Array(items) = &v {
        if items.len() == 1 && items[0].is_array() {
            return items[0].clone();
        }
    }
    v
}

/// An int-preserving number: integer operands stay i64, any float
/// promotes the result.
#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn from_value(v: &Value) -> Result<Self> {
        if let Some(i) = v.as_i64() {
            return Ok(Num::Int(i));
        }
        if let Some(f) = v.as_f64() {
            return Ok(Num::Float(f));
        }
        Err(Error::InvalidArguments(format!("expected number, got {v}")))
    }

    fn into_value(self) -> Value {
        match self {
            Num::Int(i) => Value::from(i),
            Num::Float(f) => Value::from(f),
        }
    }

    fn compare(self, other: Num) -> Result<std::cmp::Ordering> {
        match (self, other) {
            (Num::Int(a), Num::Int(b)) => Ok(a.cmp(&b)),
            (a, b) => a
                .as_f64()
                .partial_cmp(&b.as_f64())
                .ok_or_else(|| Error::InvalidArguments("numbers are not comparable".into())),
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }

    fn add(self, other: Num) -> Result<Num> {
        match (self, other) {
            (Num::Int(a), Num::Int(b)) => a
                .checked_add(b)
                .map(Num::Int)
                .ok_or_else(|| Error::InvalidArguments("integer overflow".into())),
            (a, b) => Ok(Num::Float(a.as_f64() + b.as_f64())),
        }
    }

    fn mul(self, other: Num) -> Result<Num> {
        match (self, other) {
            (Num::Int(a), Num::Int(b)) => a
                .checked_mul(b)
                .map(Num::Int)
                .ok_or_else(|| Error::InvalidArguments("integer overflow".into())),
            (a, b) => Ok(Num::Float(a.as_f64() * b.as_f64())),
        }
    }

    fn sub(self, other: Num) -> Result<Num> {
        match (self, other) {
            (Num::Int(a), Num::Int(b)) => a
                .checked_sub(b)
                .map(Num::Int)
                .ok_or_else(|| Error::InvalidArguments("integer overflow".into())),
            (a, b) => Ok(Num::Float(a.as_f64() - b.as_f64())),
        }
    }

    fn div(self, other: Num) -> Result<Num> {
        match (self, other) {
            (Num::Int(a), Num::Int(b)) => {
                if b == 0 {
                    return Err(Error::InvalidArguments("division by zero".into()));
                }
                Ok(Num::Int(a / b))
            }
            (a, b) => {
                if b.as_f64() == 0.0 {
                    return Err(Error::InvalidArguments("division by zero".into()));
                }
                Ok(Num::Float(a.as_f64() / b.as_f64()))
            }
        }
    }

    fn rem(self, other: Num) -> Result<Num> {
        match (self, other) {
            (Num::Int(a), Num::Int(b)) => {
                if b == 0 {
                    return Err(Error::InvalidArguments("division by zero".into()));
                }
                Ok(Num::Int(a % b))
            }
            (a, b) => {
                if b.as_f64() == 0.0 {
                    return Err(Error::InvalidArguments("division by zero".into()));
                }
                Ok(Num::Float(a.as_f64() % b.as_f64()))
            }
        }
    }

    fn abs(self) -> Result<Num> {
        match self {
            Num::Int(i) => i
                .checked_abs()
                .map(Num::Int)
                .ok_or_else(|| Error::InvalidArguments("integer overflow".into())),
            Num::Float(f) => Ok(Num::Float(f.abs())),
        }
    }

    fn neg(self) -> Result<Num> {
        match self {
            Num::Int(i) => i
                .checked_neg()
                .map(Num::Int)
                .ok_or_else(|| Error::InvalidArguments("integer overflow".into())),
            Num::Float(f) => Ok(Num::Float(-f)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj1() -> Value {
        json!({
            "apiVersion": "view.viewline.dev/v1alpha1",
            "kind": "testview1",
            "metadata": {"namespace": "default", "name": "name"},
            "spec": {
                "a": 1,
                "b": {"c": 2},
                "x": [1, 2, 3, 4, 5],
            },
        })
    }

    fn obj2() -> Value {
        json!({
            "metadata": {"namespace": "default2", "name": "name"},
            "spec": [
                {"name": "name1", "a": 1, "b": {"c": 2}},
                {"name": "name2", "a": 2, "b": {"d": 3}},
            ],
        })
    }

    fn eval_on(obj: &Value, src: &str) -> Result<Value> {
        let exp: Expression = serde_json::from_str(src).expect("expression parses");
        exp.evaluate(&EvalCtx::new(obj))
    }

    fn eval(src: &str) -> Value {
        eval_on(&obj1(), src).expect("expression evaluates")
    }

    #[test]
    fn terminal_literals() {
        assert_eq!(eval("true"), json!(true));
        assert_eq!(eval("10"), json!(10));
        assert_eq!(eval("10.12"), json!(10.12));
        assert_eq!(eval(r#""a10""#), json!("a10"));
    }

    #[test]
    fn jsonpath_rvalues() {
        assert_eq!(eval(r#""$.metadata.name""#), json!("name"));
        assert_eq!(eval(r#""$.metadata.namespace""#), json!("default"));
        assert_eq!(eval(r#""$.spec.a""#), json!(1));
        assert_eq!(eval(r#""$[\"spec\"][\"a\"]""#), json!(1));
        assert_eq!(eval(r#""$.spec.b""#), json!({"c": 2}));
        assert_eq!(eval(r#""$""#), obj1());
        assert_eq!(eval(r#""$.""#), obj1());
    }

    #[test]
    fn jsonpath_filter_rvalues() {
        assert_eq!(
            eval_on(&obj2(), r#""$.spec[?(@.name == 'name1')].b""#).unwrap(),
            json!({"c": 2})
        );
        assert_eq!(
            eval_on(&obj2(), r#""$.spec[?(@.name == 'name2')]""#).unwrap(),
            json!({"name": "name2", "a": 2, "b": {"d": 3}})
        );
        // several matches: the last one that resolves wins
        assert_eq!(
            eval_on(&obj2(), r#""$.spec[?(@.name in ['name1', 'name2'])].b.d""#).unwrap(),
            json!(3)
        );
    }

    #[test]
    fn missing_paths_are_null() {
        assert_eq!(eval(r#""$.spec.missing""#), json!(null));
        assert_eq!(eval(r#""$.spec.a.deeper""#), json!(null));
    }

    #[test]
    fn setter_with_path_key() {
        assert_eq!(eval(r#"{"$.y[3]": 12}"#), json!({"y": [null, null, null, 12]}));
    }

    #[test]
    fn setter_with_path_key_and_value() {
        assert_eq!(
            eval(r#"{"$.y.z": "$.spec.b"}"#),
            json!({"y": {"z": {"c": 2}}})
        );
    }

    #[test]
    fn root_ref_as_right_value() {
        assert_eq!(eval(r#"{"a": "$"}"#), json!({"a": obj1()}));
        assert_eq!(eval(r#"{"a": "$."}"#), json!({"a": obj1()}));
    }

    #[test]
    fn root_ref_as_left_value() {
        assert_eq!(eval(r#"{"$.": {"a": "b"}}"#), json!({"a": "b"}));
        assert_eq!(eval(r#"{"$.": {"a": 1}}"#), json!({"a": 1}));
        assert!(eval_on(&obj1(), r#"{"$.": "a"}"#).is_err());
    }

    #[test]
    fn setter_with_multiple_paths() {
        assert_eq!(
            eval(r#"{"$.spec.y": "aaa", "$.spec.b.d": 12}"#),
            json!({"spec": {"y": "aaa", "b": {"d": 12}}})
        );
        assert_eq!(
            eval(r#"{"$.spec.y": "aaa", "$.spec.b.c": "$.spec.b.c", "$.spec.b.d": 12}"#),
            json!({"spec": {"y": "aaa", "b": {"c": 2, "d": 12}}})
        );
    }

    #[test]
    fn isnil_and_exists() {
        assert_eq!(eval(r#"{"@isnil": 1}"#), json!(false));
        assert_eq!(eval(r#"{"@isnil": "$.spec.missing"}"#), json!(true));
        assert_eq!(eval(r#"{"@exists": "$.metadata.annotations.ann"}"#), json!(false));
        assert_eq!(eval(r#"{"@exists": "$.spec.b.c"}"#), json!(true));
    }

    #[test]
    fn logical_operators() {
        assert_eq!(eval(r#"{"@not": false}"#), json!(true));
        assert_eq!(eval(r#"{"@and": [{"@eq": [10, 10]}, {"@lt": [1, 2]}]}"#), json!(true));
        assert_eq!(eval(r#"{"@or": [false, true, true, false]}"#), json!(true));
        assert_eq!(eval(r#"{"@and": [true, false]}"#), json!(false));
    }

    #[test]
    fn junctions_short_circuit() {
        // the invalid second operand is never evaluated
        assert_eq!(eval(r#"{"@and": [false, {"@div": [1, 0]}]}"#), json!(false));
        assert_eq!(eval(r#"{"@or": [true, {"@div": [1, 0]}]}"#), json!(true));
    }

    #[test]
    fn equality_is_structural() {
        assert_eq!(eval(r#"{"@eq": [10, 10]}"#), json!(true));
        assert_eq!(eval(r#"{"@eq": [{"a": 1}, {"a": 1}]}"#), json!(true));
        assert_eq!(eval(r#"{"@neq": [{"a": 1}, {"a": 2}]}"#), json!(true));
        assert_eq!(eval(r#"{"@eq": ["$.spec.b", {"c": 2}]}"#), json!(true));
    }

    #[test]
    fn arity_is_checked_at_evaluation() {
        assert!(eval_on(&obj1(), r#"{"@eq": 10}"#).is_err());
        assert!(eval_on(&obj1(), r#"{"@eq": [1, 2, 3]}"#).is_err());
        assert!(eval_on(&obj1(), r#"{"@made-up-op": 1}"#).is_err());
    }

    #[test]
    fn comparisons() {
        assert_eq!(eval(r#"{"@lt": ["$.spec.a", "$.spec.b.c"]}"#), json!(true));
        assert_eq!(eval(r#"{"@lte": [2, 2]}"#), json!(true));
        assert_eq!(eval(r#"{"@gt": [2.5, 2]}"#), json!(true));
        assert_eq!(eval(r#"{"@gte": ["b", "a"]}"#), json!(true));
        assert!(eval_on(&obj1(), r#"{"@lt": ["a", 1]}"#).is_err());
    }

    #[test]
    fn arithmetic_preserves_ints() {
        assert_eq!(eval(r#"{"@sum": [1, 2, 3]}"#), json!(6));
        assert_eq!(eval(r#"{"@sum": [1, 2.5]}"#), json!(3.5));
        assert_eq!(eval(r#"{"@mul": [2, 3, 4]}"#), json!(24));
        assert_eq!(eval(r#"{"@sub": [5, 7]}"#), json!(-2));
        assert_eq!(eval(r#"{"@div": [7, 2]}"#), json!(3));
        assert_eq!(eval(r#"{"@div": [7.0, 2]}"#), json!(3.5));
        assert_eq!(eval(r#"{"@mod": [7, 3]}"#), json!(1));
        assert_eq!(eval(r#"{"@abs": -3}"#), json!(3));
        assert_eq!(eval(r#"{"@neg": 3}"#), json!(-3));
        assert!(eval_on(&obj1(), r#"{"@div": [1, 0]}"#).is_err());
    }

    #[test]
    fn string_operators() {
        assert_eq!(eval(r#"{"@concat": ["ab", "ba"]}"#), json!("abba"));
        assert_eq!(eval(r#"{"@concat": ["n-", "$.spec.a"]}"#), json!("n-1"));
        assert_eq!(eval(r#"{"@match": ["user@example.com", "^[a-z]+@[a-z.]+$"]}"#), json!(true));
        assert_eq!(eval(r#"{"@match": ["nope", "^[0-9]+$"]}"#), json!(false));
        assert!(eval_on(&obj1(), r#"{"@match": ["x", "("]}"#).is_err());
    }

    #[test]
    fn collection_operators() {
        assert_eq!(eval(r#"{"@len": [1, 2, 3]}"#), json!(3));
        assert_eq!(eval(r#"{"@len": ["$.spec.x"]}"#), json!(5));
        assert_eq!(eval(r#"{"@eq": [{"@len": ["$.spec.x"]}, 5]}"#), json!(true));
        assert_eq!(eval(r#"{"@first": "$.spec.x"}"#), json!(1));
        assert_eq!(eval(r#"{"@last": "$.spec.x"}"#), json!(5));
        assert_eq!(eval(r#"{"@in": [1, [1, 2, 3]]}"#), json!(true));
        assert_eq!(eval(r#"{"@in": [4, [1, 2, 3]]}"#), json!(false));
        assert_eq!(eval(r#"{"@in": ["a", [1, 2, 3]]}"#), json!(false));
        assert_eq!(eval(r#"{"@in": ["nginx", ["apache", "nginx", "nginx"]]}"#), json!(true));
    }

    #[test]
    fn list_expressions() {
        assert_eq!(eval(r#"{"@list": [1, 2, 3]}"#), json!([1, 2, 3]));
        assert_eq!(
            eval(r#"{"@list": [{"@eq": [10, 10]}, {"@and": [true, false]}]}"#),
            json!([true, false])
        );
    }

    #[test]
    fn dict_literals() {
        assert_eq!(
            eval(r#"{"a": 1, "b": {"c": "x"}}"#),
            json!({"a": 1, "b": {"c": "x"}})
        );
        assert_eq!(
            eval(r#"{"@dict": {"x": {"a": 1, "b": 2}}}"#),
            json!({"x": {"a": 1, "b": 2}})
        );
        assert_eq!(
            eval(r#"{"dummy": [1, 2, 3], "another-dummy": "a"}"#),
            json!({"dummy": [1, 2, 3], "another-dummy": "a"})
        );
        assert_eq!(
            eval(r#"{"dummy": [1, 2, 3], "x": {"@eq": ["a", "b"]}}"#),
            json!({"dummy": [1, 2, 3], "x": false})
        );
        assert_eq!(
            eval(r#"{"another-dummy": [{"a": 1, "b": 2.2}, {"x": [1, 2, 3]}]}"#),
            json!({"another-dummy": [{"a": 1, "b": 2.2}, {"x": [1, 2, 3]}]})
        );
        assert_eq!(
            eval(r#"{"a": 1.1, "b": {"@sum": [1, 2]}, "c": {"@concat": ["ab", "ba"]}}"#),
            json!({"a": 1.1, "b": 3, "c": "abba"})
        );
        assert_eq!(
            eval(r#"{"a": 1, "b": {"c": {"@eq": [1, 1]}}}"#),
            json!({"a": 1, "b": {"c": true}})
        );
    }

    #[test]
    fn selector_expressions() {
        assert_eq!(
            eval(r#"{"@selector": [{"matchLabels": {"app": "nginx"}}, {"app": "nginx"}]}"#),
            json!(true)
        );
        assert_eq!(
            eval(r#"{"@selector": [{"app": "nginx"}, {"app": "nginx"}]}"#),
            json!(true)
        );

        let mut labeled = obj1();
        Path::parse("$.metadata.labels")
            .unwrap()
            .set(&mut labeled, json!({"app": "nginx"}))
            .unwrap();
        let src = r#"{"@selector": [{"matchExpressions": [{"key": "app", "operator": "In", "values": ["nginx", "httpd"]}]}, "$.metadata.labels"]}"#;
        assert_eq!(eval_on(&labeled, src).unwrap(), json!(true));

        Path::parse("$.metadata.labels")
            .unwrap()
            .set(&mut labeled, json!({"app": "apache"}))
            .unwrap();
        assert_eq!(eval_on(&labeled, src).unwrap(), json!(false));
    }

    #[test]
    fn filter_with_local_context() {
        assert_eq!(
            eval(r#"{"@filter": [{"@eq": ["$$", 12]}, [12, 23]]}"#),
            json!([12])
        );
        assert_eq!(
            eval(r#"{"@filter": [{"@eq": ["$$.", 12]}, [12, 23]]}"#),
            json!([12])
        );
    }

    #[test]
    fn filter_sees_both_contexts() {
        let src = r#"{"@filter": [
            {"@eq": ["$.metadata.namespace", "$$.metadata.namespace"]},
            [{"metadata": {"namespace": "default"}}, {"metadata": {"namespace": "default2"}}, 12]
        ]}"#;
        assert_eq!(
            eval(src),
            json!([{"metadata": {"namespace": "default"}}])
        );
    }

    #[test]
    fn filter_over_a_path_list() {
        assert_eq!(
            eval(r#"{"@filter": [{"@exists": "$$"}, "$.spec.x"]}"#),
            json!([1, 2, 3, 4, 5])
        );
    }

    #[test]
    fn map_expressions() {
        assert_eq!(
            eval(r#"{"@map": [{"x": 1}, [12, 23]]}"#),
            json!([{"x": 1}, {"x": 1}])
        );
        assert_eq!(
            eval(r#"{"@map": [{"@lte": ["$$", 17]}, [12, 23]]}"#),
            json!([true, false])
        );
    }

    #[test]
    fn local_context_requires_a_comprehension() {
        assert!(eval_on(&obj1(), r#""$$.metadata.name""#).is_err());
    }

    #[test]
    fn coercions() {
        assert_eq!(eval(r#"{"@bool": {"@eq": [10, 10]}}"#), json!(true));
        assert_eq!(eval(r#"{"@string": 12}"#), json!("12"));
        assert_eq!(eval(r#"{"@int": "$.spec.a"}"#), json!(1));
        assert_eq!(eval(r#"{"@float": 2}"#), json!(2.0));
        assert!(eval_on(&obj1(), r#"{"@int": "abc"}"#).is_err());
    }
}
