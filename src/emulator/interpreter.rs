//! Tree-walking evaluation of parsed fragments.
//!
//! Globals live in a table owned by the [`Interpreter`] and survive across
//! fragments; locals live in a chain of [`Environment`] frames that only
//! exist while a chunk or function runs.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::ast::{BinaryOperator, Block, Expr, FunctionBody, Statement, TableField, UnaryOperator};
use super::error::LuaError;
use super::operations;
use super::stdlib;
use super::value::{LuaFunction, LuaValue, TableRef};

pub type EnvRef = Rc<RefCell<Environment>>;

const MAX_CALL_DEPTH: usize = 100;

/// A frame of local variables.
pub struct Environment {
    vars: HashMap<String, LuaValue>,
    parent: Option<EnvRef>,
}

impl Environment {
    pub fn new_root() -> EnvRef {
        Rc::new(RefCell::new(Environment {
            vars: HashMap::new(),
            parent: None,
        }))
    }

    pub fn child(parent: &EnvRef) -> EnvRef {
        Rc::new(RefCell::new(Environment {
            vars: HashMap::new(),
            parent: Some(Rc::clone(parent)),
        }))
    }

    pub fn declare(env: &EnvRef, name: &str, value: LuaValue) {
        env.borrow_mut().vars.insert(name.to_string(), value);
    }

    fn lookup(env: &EnvRef, name: &str) -> Option<LuaValue> {
        let mut current = Some(Rc::clone(env));
        while let Some(frame) = current {
            let frame = frame.borrow();
            if let Some(value) = frame.vars.get(name) {
                return Some(value.clone());
            }
            current = frame.parent.clone();
        }
        None
    }

    /// Assigns to the nearest frame that declares `name`. Returns false when none does.
    fn assign(env: &EnvRef, name: &str, value: &LuaValue) -> bool {
        let mut current = Some(Rc::clone(env));
        while let Some(frame) = current {
            let mut frame = frame.borrow_mut();
            if let Some(slot) = frame.vars.get_mut(name) {
                *slot = value.clone();
                return true;
            }
            current = frame.parent.clone();
        }
        false
    }
}

/// Completion of a block.
pub enum Flow {
    Normal,
    Return(Vec<LuaValue>),
}

pub struct Interpreter {
    globals: TableRef,
    output: Vec<String>,
    depth: usize,
}

impl Interpreter {
    pub fn new() -> Self {
        let globals = Rc::new(RefCell::new(Default::default()));
        stdlib::install(&globals);
        Interpreter {
            globals,
            output: Vec::new(),
            depth: 0,
        }
    }

    pub fn globals(&self) -> &TableRef {
        &self.globals
    }

    pub fn get_global(&self, name: &str) -> LuaValue {
        self.globals.borrow().get_str(name)
    }

    pub fn set_global(&self, name: &str, value: LuaValue) {
        self.globals.borrow_mut().set_str(name, value);
    }

    /// Records a line of `print` output.
    pub fn print_line(&mut self, line: String) {
        self.output.push(line);
    }

    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }

    /// Runs a top-level chunk in a fresh local scope.
    pub fn run_chunk(&mut self, block: &Block) -> Result<Vec<LuaValue>, LuaError> {
        self.depth = 0;
        let env = Environment::new_root();
        match self.exec_block(block, &env)? {
            Flow::Return(values) => Ok(values),
            Flow::Normal => Ok(vec![]),
        }
    }

    /// Evaluates a top-level expression list.
    pub fn run_expressions(&mut self, exprs: &[Expr]) -> Result<Vec<LuaValue>, LuaError> {
        self.depth = 0;
        let env = Environment::new_root();
        self.eval_list(exprs, &env)
    }

    pub fn exec_block(&mut self, block: &Block, env: &EnvRef) -> Result<Flow, LuaError> {
        for statement in &block.statements {
            if let Flow::Return(values) = self.exec_statement(statement, env)? {
                return Ok(Flow::Return(values));
            }
        }
        match &block.ret {
            Some(exprs) => Ok(Flow::Return(self.eval_list(exprs, env)?)),
            None => Ok(Flow::Normal),
        }
    }

    fn exec_statement(&mut self, statement: &Statement, env: &EnvRef) -> Result<Flow, LuaError> {
        match statement {
            Statement::Local { names, values } => {
                let values = self.eval_list(values, env)?;
                for (i, name) in names.iter().enumerate() {
                    let value = values.get(i).cloned().unwrap_or(LuaValue::Nil);
                    Environment::declare(env, name, value);
                }
            }
            Statement::Assign { targets, values } => {
                let values = self.eval_list(values, env)?;
                for (i, target) in targets.iter().enumerate() {
                    let value = values.get(i).cloned().unwrap_or(LuaValue::Nil);
                    self.assign(target, value, env)?;
                }
            }
            Statement::Call(expr) => {
                self.eval_multi(expr, env)?;
            }
            Statement::If {
                branches,
                otherwise,
            } => {
                for (condition, body) in branches {
                    if self.eval(condition, env)?.is_truthy() {
                        return self.exec_block(body, &Environment::child(env));
                    }
                }
                if let Some(body) = otherwise {
                    return self.exec_block(body, &Environment::child(env));
                }
            }
            Statement::While { condition, body } => {
                while self.eval(condition, env)?.is_truthy() {
                    if let Flow::Return(values) = self.exec_block(body, &Environment::child(env))? {
                        return Ok(Flow::Return(values));
                    }
                }
            }
            Statement::NumericFor {
                variable,
                start,
                limit,
                step,
                body,
            } => return self.exec_numeric_for(variable, start, limit, step.as_ref(), body, env),
            Statement::Function { path, method, body } => {
                let closure = self.make_closure(body, env);
                let mut names = path.iter().map(String::as_str).collect::<Vec<_>>();
                if let Some(method) = method {
                    names.push(method.as_str());
                }
                match names.split_last() {
                    Some((last, [])) => self.assign_name(last, closure, env),
                    Some((last, prefix)) => {
                        let mut target = self.lookup(prefix[0], env);
                        for name in &prefix[1..] {
                            target = self.index(&target, &LuaValue::string(name))?;
                        }
                        self.set_index(&target, LuaValue::string(last), closure)?;
                    }
                    None => return Err(LuaError::syntax("function name expected")),
                }
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_numeric_for(
        &mut self,
        variable: &str,
        start: &Expr,
        limit: &Expr,
        step: Option<&Expr>,
        body: &Block,
        env: &EnvRef,
    ) -> Result<Flow, LuaError> {
        let start = self.eval(start, env)?;
        let limit = self.eval(limit, env)?;
        let step = match step {
            Some(step) => self.eval(step, env)?,
            None => LuaValue::Integer(1),
        };
        if let (Some(LuaValue::Integer(start)), Some(LuaValue::Integer(limit)), Some(LuaValue::Integer(step))) =
            (start.to_number(), limit.to_number(), step.to_number())
        {
            if step == 0 {
                return Err(LuaError::runtime("'for' step is zero"));
            }
            let mut i = start;
            while (step > 0 && i <= limit) || (step < 0 && i >= limit) {
                let frame = Environment::child(env);
                Environment::declare(&frame, variable, LuaValue::Integer(i));
                if let Flow::Return(values) = self.exec_block(body, &frame)? {
                    return Ok(Flow::Return(values));
                }
                i = match i.checked_add(step) {
                    Some(next) => next,
                    None => break,
                };
            }
            return Ok(Flow::Normal);
        }
        let (start, limit, step) = match (start.to_f64(), limit.to_f64(), step.to_f64()) {
            (Some(a), Some(b), Some(c)) => (a, b, c),
            _ => return Err(LuaError::runtime("'for' initial value must be a number")),
        };
        if step == 0.0 {
            return Err(LuaError::runtime("'for' step is zero"));
        }
        let mut i = start;
        while (step > 0.0 && i <= limit) || (step < 0.0 && i >= limit) {
            let frame = Environment::child(env);
            Environment::declare(&frame, variable, LuaValue::Float(i));
            if let Flow::Return(values) = self.exec_block(body, &frame)? {
                return Ok(Flow::Return(values));
            }
            i += step;
        }
        Ok(Flow::Normal)
    }

    fn assign(&mut self, target: &Expr, value: LuaValue, env: &EnvRef) -> Result<(), LuaError> {
        match target {
            Expr::Name(name) => {
                self.assign_name(name, value, env);
                Ok(())
            }
            Expr::Index { target, key } => {
                let object = self.eval(target, env)?;
                let key = self.eval(key, env)?;
                self.set_index(&object, key, value)
            }
            _ => Err(LuaError::syntax("cannot assign to this expression")),
        }
    }

    fn assign_name(&mut self, name: &str, value: LuaValue, env: &EnvRef) {
        if !Environment::assign(env, name, &value) {
            self.set_global(name, value);
        }
    }

    fn lookup(&self, name: &str, env: &EnvRef) -> LuaValue {
        Environment::lookup(env, name).unwrap_or_else(|| self.get_global(name))
    }

    fn make_closure(&self, body: &Rc<FunctionBody>, env: &EnvRef) -> LuaValue {
        LuaValue::Function(Rc::new(LuaFunction::Closure {
            body: Rc::clone(body),
            env: Rc::clone(env),
        }))
    }

    pub fn eval(&mut self, expr: &Expr, env: &EnvRef) -> Result<LuaValue, LuaError> {
        match expr {
            Expr::Nil => Ok(LuaValue::Nil),
            Expr::Boolean(b) => Ok(LuaValue::Boolean(*b)),
            Expr::Integer(i) => Ok(LuaValue::Integer(*i)),
            Expr::Float(f) => Ok(LuaValue::Float(*f)),
            Expr::Str(s) => Ok(LuaValue::String(Rc::clone(s))),
            Expr::Table(fields) => self.eval_table(fields, env),
            Expr::Function(body) => Ok(self.make_closure(body, env)),
            Expr::Name(name) => Ok(self.lookup(name, env)),
            Expr::Index { target, key } => {
                let object = self.eval(target, env)?;
                let key = self.eval(key, env)?;
                self.index(&object, &key)
            }
            Expr::Call { .. } | Expr::MethodCall { .. } => Ok(self
                .eval_multi(expr, env)?
                .into_iter()
                .next()
                .unwrap_or(LuaValue::Nil)),
            Expr::Paren(inner) => self.eval(inner, env),
            Expr::Unary { operator, operand } => {
                let value = self.eval(operand, env)?;
                match operator {
                    UnaryOperator::Minus => operations::negate(&value),
                    UnaryOperator::Not => Ok(LuaValue::Boolean(!value.is_truthy())),
                    UnaryOperator::Length => operations::length(&value),
                }
            }
            Expr::Binary {
                operator,
                left,
                right,
            } => {
                let left = self.eval(left, env)?;
                match operator {
                    BinaryOperator::And => {
                        if left.is_truthy() {
                            self.eval(right, env)
                        } else {
                            Ok(left)
                        }
                    }
                    BinaryOperator::Or => {
                        if left.is_truthy() {
                            Ok(left)
                        } else {
                            self.eval(right, env)
                        }
                    }
                    BinaryOperator::Concat => operations::concat(&left, &self.eval(right, env)?),
                    BinaryOperator::Equal
                    | BinaryOperator::NotEqual
                    | BinaryOperator::LessThan
                    | BinaryOperator::LessThanEqual
                    | BinaryOperator::GreaterThan
                    | BinaryOperator::GreaterThanEqual => {
                        operations::compare(*operator, &left, &self.eval(right, env)?)
                    }
                    _ => operations::arithmetic(*operator, &left, &self.eval(right, env)?),
                }
            }
        }
    }

    /// Evaluates an expression keeping every result of a call.
    pub fn eval_multi(&mut self, expr: &Expr, env: &EnvRef) -> Result<Vec<LuaValue>, LuaError> {
        match expr {
            Expr::Call { callee, args } => {
                let function = self.eval(callee, env)?;
                let args = self.eval_list(args, env)?;
                self.call(&function, args)
            }
            Expr::MethodCall {
                receiver,
                method,
                args,
            } => {
                let receiver = self.eval(receiver, env)?;
                let function = self.index(&receiver, &LuaValue::string(method))?;
                let mut all_args = vec![receiver];
                all_args.extend(self.eval_list(args, env)?);
                self.call(&function, all_args)
            }
            _ => Ok(vec![self.eval(expr, env)?]),
        }
    }

    /// Evaluates a list of expressions; only the last one may expand to several values.
    pub fn eval_list(&mut self, exprs: &[Expr], env: &EnvRef) -> Result<Vec<LuaValue>, LuaError> {
        let mut values = Vec::with_capacity(exprs.len());
        for (i, expr) in exprs.iter().enumerate() {
            if i + 1 == exprs.len() {
                values.extend(self.eval_multi(expr, env)?);
            } else {
                values.push(self.eval(expr, env)?);
            }
        }
        Ok(values)
    }

    fn eval_table(&mut self, fields: &[TableField], env: &EnvRef) -> Result<LuaValue, LuaError> {
        let table = LuaValue::new_table();
        let mut position = 1;
        for (i, field) in fields.iter().enumerate() {
            match field {
                TableField::Positional(expr) => {
                    let values = if i + 1 == fields.len() {
                        self.eval_multi(expr, env)?
                    } else {
                        vec![self.eval(expr, env)?]
                    };
                    for value in values {
                        self.set_index(&table, LuaValue::Integer(position), value)?;
                        position += 1;
                    }
                }
                TableField::Named(name, expr) => {
                    let value = self.eval(expr, env)?;
                    self.set_index(&table, LuaValue::string(name), value)?;
                }
                TableField::Keyed(key, expr) => {
                    let key = self.eval(key, env)?;
                    let value = self.eval(expr, env)?;
                    self.set_index(&table, key, value)?;
                }
            }
        }
        Ok(table)
    }

    pub fn index(&mut self, target: &LuaValue, key: &LuaValue) -> Result<LuaValue, LuaError> {
        match target {
            LuaValue::Table(t) => Ok(t.borrow().get(key)),
            LuaValue::String(_) => match self.get_global("string") {
                LuaValue::Table(string_lib) => Ok(string_lib.borrow().get(key)),
                _ => Ok(LuaValue::Nil),
            },
            other => Err(LuaError::Runtime(format!(
                "attempt to index a {} value",
                other.type_name()
            ))),
        }
    }

    pub fn set_index(&mut self, target: &LuaValue, key: LuaValue, value: LuaValue) -> Result<(), LuaError> {
        match target {
            LuaValue::Table(t) => t.borrow_mut().set(key, value),
            other => Err(LuaError::Runtime(format!(
                "attempt to index a {} value",
                other.type_name()
            ))),
        }
    }

    pub fn call(&mut self, function: &LuaValue, args: Vec<LuaValue>) -> Result<Vec<LuaValue>, LuaError> {
        let function = match function {
            LuaValue::Function(f) => Rc::clone(f),
            other => {
                return Err(LuaError::Runtime(format!(
                    "attempt to call a {} value",
                    other.type_name()
                )))
            }
        };
        match &*function {
            LuaFunction::Native { func, .. } => func(self, args),
            LuaFunction::Closure { body, env } => {
                if self.depth >= MAX_CALL_DEPTH {
                    return Err(LuaError::runtime("stack overflow"));
                }
                let frame = Environment::child(env);
                let mut args = args.into_iter();
                for param in &body.params {
                    Environment::declare(&frame, param, args.next().unwrap_or(LuaValue::Nil));
                }
                self.depth += 1;
                let flow = self.exec_block(&body.body, &frame);
                self.depth -= 1;
                match flow? {
                    Flow::Return(values) => Ok(values),
                    Flow::Normal => Ok(vec![]),
                }
            }
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}
