use std::rc::Rc;

use pest::iterators::{Pair, Pairs};
use pest::Parser;
use pest_derive::Parser;

use super::ast::*;
use super::error::LuaError;
use super::value::{parse_number, LuaValue};

#[derive(Parser)]
#[grammar = "emulator/lua.pest"] // relative to src
pub struct LuaParser;

/// Parse a fragment as a statement chunk.
pub fn parse_chunk(source: &str) -> Result<Block, LuaError> {
    let pairs = LuaParser::parse(Rule::chunk, source).map_err(syntax_error)?;
    for pair in entry_pairs(pairs) {
        if pair.as_rule() == Rule::block {
            return build_block(pair);
        }
    }
    Ok(Block::default())
}

/// Parse a fragment as a comma separated list of expressions.
pub fn parse_expression_list(source: &str) -> Result<Vec<Expr>, LuaError> {
    let pairs = LuaParser::parse(Rule::expr_chunk, source).map_err(syntax_error)?;
    for pair in entry_pairs(pairs) {
        if pair.as_rule() == Rule::expr_list {
            return build_expr_list(pair);
        }
    }
    Err(LuaError::syntax("expression expected"))
}

fn entry_pairs(mut pairs: Pairs<Rule>) -> Pairs<Rule> {
    match pairs.next() {
        Some(entry) => entry.into_inner(),
        None => pairs,
    }
}

fn syntax_error(e: pest::error::Error<Rule>) -> LuaError {
    LuaError::Syntax(e.to_string())
}

fn unexpected(pair: &Pair<Rule>) -> LuaError {
    let (line, col) = pair.as_span().start_pos().line_col();
    LuaError::Syntax(format!(
        "unexpected {:?} near '{}' at {}:{}",
        pair.as_rule(),
        pair.as_str(),
        line,
        col
    ))
}

fn is_keyword_token(rule: Rule) -> bool {
    matches!(
        rule,
        Rule::kw_do
            | Rule::kw_else
            | Rule::kw_elseif
            | Rule::kw_end
            | Rule::kw_for
            | Rule::kw_function
            | Rule::kw_if
            | Rule::kw_local
            | Rule::kw_return
            | Rule::kw_then
            | Rule::kw_while
    )
}

/// Inner pairs of `pair` without the keyword tokens.
fn significant(pair: Pair<Rule>) -> impl Iterator<Item = Pair<Rule>> {
    pair.into_inner().filter(|p| !is_keyword_token(p.as_rule()))
}

fn build_block(pair: Pair<Rule>) -> Result<Block, LuaError> {
    let mut block = Block::default();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::return_stat => {
                block.ret = Some(match significant(inner).next() {
                    Some(list) => build_expr_list(list)?,
                    None => vec![],
                });
            }
            _ => block.statements.push(build_statement(inner)?),
        }
    }
    Ok(block)
}

fn build_statement(pair: Pair<Rule>) -> Result<Statement, LuaError> {
    match pair.as_rule() {
        Rule::local_stat => {
            let mut names = vec![];
            let mut values = vec![];
            for inner in significant(pair) {
                match inner.as_rule() {
                    Rule::name_list => names = build_name_list(inner),
                    Rule::expr_list => values = build_expr_list(inner)?,
                    _ => return Err(unexpected(&inner)),
                }
            }
            Ok(Statement::Local { names, values })
        }
        Rule::assign_stat => {
            let mut targets = vec![];
            let mut values = vec![];
            for inner in pair.into_inner() {
                match inner.as_rule() {
                    Rule::var_list => {
                        for var in inner.into_inner() {
                            let target = build_expr(var.clone())?;
                            if !target.is_assignable() {
                                return Err(LuaError::Syntax(format!(
                                    "cannot assign to '{}'",
                                    var.as_str()
                                )));
                            }
                            targets.push(target);
                        }
                    }
                    Rule::expr_list => values = build_expr_list(inner)?,
                    _ => return Err(unexpected(&inner)),
                }
            }
            Ok(Statement::Assign { targets, values })
        }
        Rule::call_stat => {
            let text = pair.as_str().to_string();
            let inner = first_inner(pair)?;
            let call = build_expr(inner)?;
            if call.is_call() {
                Ok(Statement::Call(call))
            } else {
                Err(LuaError::Syntax(format!("syntax error near '{}'", text)))
            }
        }
        Rule::if_stat => {
            let mut inner = significant(pair);
            let mut branches = vec![];
            let mut otherwise = None;
            let condition = build_expr(next_pair(&mut inner)?)?;
            let body = build_block(next_pair(&mut inner)?)?;
            branches.push((condition, body));
            for clause in inner {
                match clause.as_rule() {
                    Rule::elseif_clause => {
                        let mut parts = significant(clause);
                        let condition = build_expr(next_pair(&mut parts)?)?;
                        let body = build_block(next_pair(&mut parts)?)?;
                        branches.push((condition, body));
                    }
                    Rule::else_clause => {
                        let mut parts = significant(clause);
                        otherwise = Some(build_block(next_pair(&mut parts)?)?);
                    }
                    _ => return Err(unexpected(&clause)),
                }
            }
            Ok(Statement::If {
                branches,
                otherwise,
            })
        }
        Rule::while_stat => {
            let mut inner = significant(pair);
            let condition = build_expr(next_pair(&mut inner)?)?;
            let body = build_block(next_pair(&mut inner)?)?;
            Ok(Statement::While { condition, body })
        }
        Rule::for_stat => {
            let mut variable = String::new();
            let mut bounds = vec![];
            let mut body = None;
            for inner in significant(pair) {
                match inner.as_rule() {
                    Rule::name => variable = inner.as_str().to_string(),
                    Rule::expr => bounds.push(build_expr(inner)?),
                    Rule::block => body = Some(build_block(inner)?),
                    _ => return Err(unexpected(&inner)),
                }
            }
            let mut bounds = bounds.into_iter();
            match (bounds.next(), bounds.next(), body) {
                (Some(start), Some(limit), Some(body)) => Ok(Statement::NumericFor {
                    variable,
                    start,
                    limit,
                    step: bounds.next(),
                    body,
                }),
                _ => Err(LuaError::syntax("malformed 'for' statement")),
            }
        }
        Rule::function_stat => {
            let mut path = vec![];
            let mut method = None;
            let mut params = vec![];
            let mut body = None;
            for inner in significant(pair) {
                match inner.as_rule() {
                    Rule::func_name => {
                        for part in inner.into_inner() {
                            match part.as_rule() {
                                Rule::name => path.push(part.as_str().to_string()),
                                Rule::method_name => {
                                    method = Some(first_inner(part)?.as_str().to_string())
                                }
                                _ => return Err(unexpected(&part)),
                            }
                        }
                    }
                    Rule::name_list => params = build_name_list(inner),
                    Rule::block => body = Some(build_block(inner)?),
                    _ => return Err(unexpected(&inner)),
                }
            }
            if method.is_some() {
                params.insert(0, "self".to_string());
            }
            let body = body.ok_or_else(|| LuaError::syntax("function body expected"))?;
            Ok(Statement::Function {
                path,
                method,
                body: Rc::new(FunctionBody { params, body }),
            })
        }
        _ => Err(unexpected(&pair)),
    }
}

fn build_name_list(pair: Pair<Rule>) -> Vec<String> {
    pair.into_inner().map(|n| n.as_str().to_string()).collect()
}

fn build_expr_list(pair: Pair<Rule>) -> Result<Vec<Expr>, LuaError> {
    pair.into_inner().map(build_expr).collect()
}

fn first_inner(pair: Pair<Rule>) -> Result<Pair<Rule>, LuaError> {
    let err = unexpected(&pair);
    pair.into_inner().next().ok_or(err)
}

fn next_pair<'i, I: Iterator<Item = Pair<'i, Rule>>>(iter: &mut I) -> Result<Pair<'i, Rule>, LuaError> {
    iter.next()
        .ok_or_else(|| LuaError::syntax("unexpected end of statement"))
}

fn build_expr(pair: Pair<Rule>) -> Result<Expr, LuaError> {
    match pair.as_rule() {
        Rule::expr | Rule::simple_expr | Rule::primary_expr => build_expr(first_inner(pair)?),
        Rule::or_expr
        | Rule::and_expr
        | Rule::cmp_expr
        | Rule::add_expr
        | Rule::mul_expr => build_left_chain(pair),
        Rule::concat_expr => build_concat_chain(pair),
        Rule::unary_expr => {
            let mut inner = pair.into_inner();
            let first = next_pair(&mut inner)?;
            if first.as_rule() != Rule::unary_op {
                return build_expr(first);
            }
            let operator = match first.as_str().trim() {
                "-" => UnaryOperator::Minus,
                "#" => UnaryOperator::Length,
                _ => UnaryOperator::Not,
            };
            let operand = build_expr(next_pair(&mut inner)?)?;
            Ok(match (operator, operand) {
                (UnaryOperator::Minus, Expr::Integer(i)) => Expr::Integer(i.wrapping_neg()),
                (UnaryOperator::Minus, Expr::Float(f)) => Expr::Float(-f),
                (operator, operand) => Expr::Unary {
                    operator,
                    operand: Box::new(operand),
                },
            })
        }
        Rule::pow_expr => {
            let mut inner = pair.into_inner();
            let base = build_expr(next_pair(&mut inner)?)?;
            match inner.next() {
                Some(_pow_op) => {
                    let exponent = build_expr(next_pair(&mut inner)?)?;
                    Ok(Expr::Binary {
                        operator: BinaryOperator::Power,
                        left: Box::new(base),
                        right: Box::new(exponent),
                    })
                }
                None => Ok(base),
            }
        }
        Rule::nil_lit => Ok(Expr::Nil),
        Rule::true_lit => Ok(Expr::Boolean(true)),
        Rule::false_lit => Ok(Expr::Boolean(false)),
        Rule::number => match parse_number(pair.as_str()) {
            Some(LuaValue::Integer(i)) => Ok(Expr::Integer(i)),
            Some(LuaValue::Float(f)) => Ok(Expr::Float(f)),
            _ => Err(LuaError::Syntax(format!(
                "malformed number near '{}'",
                pair.as_str()
            ))),
        },
        Rule::string => {
            let body = first_inner(pair)?;
            Ok(Expr::Str(unescape(body.as_str())?.into()))
        }
        Rule::table_ctor => {
            let mut fields = vec![];
            for field in pair.into_inner() {
                fields.push(match field.as_rule() {
                    Rule::positional_field => TableField::Positional(build_expr(first_inner(field)?)?),
                    Rule::named_field => {
                        let mut inner = field.into_inner();
                        let key = next_pair(&mut inner)?.as_str().to_string();
                        TableField::Named(key, build_expr(next_pair(&mut inner)?)?)
                    }
                    Rule::keyed_field => {
                        let mut inner = field.into_inner();
                        let key = build_expr(next_pair(&mut inner)?)?;
                        TableField::Keyed(key, build_expr(next_pair(&mut inner)?)?)
                    }
                    _ => return Err(unexpected(&field)),
                });
            }
            Ok(Expr::Table(fields))
        }
        Rule::function_def => {
            let mut params = vec![];
            let mut body = None;
            for inner in significant(pair) {
                match inner.as_rule() {
                    Rule::name_list => params = build_name_list(inner),
                    Rule::block => body = Some(build_block(inner)?),
                    _ => return Err(unexpected(&inner)),
                }
            }
            let body = body.ok_or_else(|| LuaError::syntax("function body expected"))?;
            Ok(Expr::Function(Rc::new(FunctionBody { params, body })))
        }
        Rule::suffixed_expr => {
            let mut inner = pair.into_inner();
            let mut expr = build_expr(next_pair(&mut inner)?)?;
            for suffix in inner {
                expr = match suffix.as_rule() {
                    Rule::field_suffix => Expr::Index {
                        target: Box::new(expr),
                        key: Box::new(Expr::Str(first_inner(suffix)?.as_str().into())),
                    },
                    Rule::index_suffix => Expr::Index {
                        target: Box::new(expr),
                        key: Box::new(build_expr(first_inner(suffix)?)?),
                    },
                    Rule::method_suffix => {
                        let mut parts = suffix.into_inner();
                        let method = next_pair(&mut parts)?.as_str().to_string();
                        let args = build_call_args(next_pair(&mut parts)?)?;
                        Expr::MethodCall {
                            receiver: Box::new(expr),
                            method,
                            args,
                        }
                    }
                    Rule::call_suffix => Expr::Call {
                        callee: Box::new(expr),
                        args: build_call_args(suffix)?,
                    },
                    _ => return Err(unexpected(&suffix)),
                };
            }
            Ok(expr)
        }
        Rule::paren_expr => Ok(Expr::Paren(Box::new(build_expr(first_inner(pair)?)?))),
        Rule::name => Ok(Expr::Name(pair.as_str().to_string())),
        _ => Err(unexpected(&pair)),
    }
}

fn build_call_args(pair: Pair<Rule>) -> Result<Vec<Expr>, LuaError> {
    match pair.into_inner().next() {
        None => Ok(vec![]),
        Some(inner) if inner.as_rule() == Rule::expr_list => build_expr_list(inner),
        Some(inner) => Ok(vec![build_expr(inner)?]),
    }
}

/// Folds `a op b op c` left to right.
fn build_left_chain(pair: Pair<Rule>) -> Result<Expr, LuaError> {
    let mut inner = pair.into_inner();
    let mut left = build_expr(next_pair(&mut inner)?)?;
    while let Some(op) = inner.next() {
        let operator = binary_operator(&op)?;
        let right = build_expr(next_pair(&mut inner)?)?;
        left = Expr::Binary {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        };
    }
    Ok(left)
}

/// `..` is right associative.
fn build_concat_chain(pair: Pair<Rule>) -> Result<Expr, LuaError> {
    let mut operands = vec![];
    for inner in pair.into_inner() {
        if inner.as_rule() != Rule::concat_op {
            operands.push(build_expr(inner)?);
        }
    }
    let mut operands = operands.into_iter().rev();
    let mut right = operands
        .next()
        .ok_or_else(|| LuaError::syntax("expression expected"))?;
    for left in operands {
        right = Expr::Binary {
            operator: BinaryOperator::Concat,
            left: Box::new(left),
            right: Box::new(right),
        };
    }
    Ok(right)
}

fn binary_operator(pair: &Pair<Rule>) -> Result<BinaryOperator, LuaError> {
    Ok(match pair.as_str().trim() {
        "or" => BinaryOperator::Or,
        "and" => BinaryOperator::And,
        "==" => BinaryOperator::Equal,
        "~=" => BinaryOperator::NotEqual,
        "<=" => BinaryOperator::LessThanEqual,
        ">=" => BinaryOperator::GreaterThanEqual,
        "<" => BinaryOperator::LessThan,
        ">" => BinaryOperator::GreaterThan,
        "+" => BinaryOperator::Add,
        "-" => BinaryOperator::Subtract,
        "*" => BinaryOperator::Multiply,
        "/" => BinaryOperator::Divide,
        "//" => BinaryOperator::FloorDivide,
        "%" => BinaryOperator::Modulo,
        _ => return Err(unexpected(pair)),
    })
}

/// Resolve the escape sequences of a quoted string body.
fn unescape(body: &str) -> Result<String, LuaError> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('a') => out.push('\u{7}'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('v') => out.push('\u{b}'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some('\n') => out.push('\n'),
            Some(d) if d.is_ascii_digit() => {
                let mut code = d.to_digit(10).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|n| n.to_digit(10)) {
                        Some(n) => {
                            code = code * 10 + n;
                            chars.next();
                        }
                        None => break,
                    }
                }
                let c = char::from_u32(code)
                    .filter(|_| code <= 255)
                    .ok_or_else(|| LuaError::Syntax(format!("decimal escape too large near '\\{}'", code)))?;
                out.push(c);
            }
            Some(other) => {
                return Err(LuaError::Syntax(format!(
                    "invalid escape sequence '\\{}'",
                    other
                )))
            }
            None => return Err(LuaError::syntax("unfinished string")),
        }
    }
    Ok(out)
}
