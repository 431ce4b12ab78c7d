//! Arithmetic, comparison and other operator semantics.

use std::cmp::Ordering;
use std::rc::Rc;

use super::ast::BinaryOperator;
use super::error::LuaError;
use super::value::LuaValue;

pub fn arithmetic(
    operator: BinaryOperator,
    left: &LuaValue,
    right: &LuaValue,
) -> Result<LuaValue, LuaError> {
    let (a, b) = match (left.to_number(), right.to_number()) {
        (Some(a), Some(b)) => (a, b),
        (None, _) => return Err(arithmetic_error(left)),
        (_, None) => return Err(arithmetic_error(right)),
    };
    if let (LuaValue::Integer(x), LuaValue::Integer(y)) = (&a, &b) {
        let (x, y) = (*x, *y);
        match operator {
            BinaryOperator::Add => return Ok(LuaValue::Integer(x.wrapping_add(y))),
            BinaryOperator::Subtract => return Ok(LuaValue::Integer(x.wrapping_sub(y))),
            BinaryOperator::Multiply => return Ok(LuaValue::Integer(x.wrapping_mul(y))),
            BinaryOperator::FloorDivide => {
                if y == 0 {
                    return Err(LuaError::runtime("attempt to perform 'n//0'"));
                }
                let q = x.wrapping_div(y);
                let q = if x.wrapping_rem(y) != 0 && ((x < 0) != (y < 0)) {
                    q - 1
                } else {
                    q
                };
                return Ok(LuaValue::Integer(q));
            }
            BinaryOperator::Modulo => {
                if y == 0 {
                    return Err(LuaError::runtime("attempt to perform 'n%%0'"));
                }
                let r = x.wrapping_rem(y);
                let r = if r != 0 && ((r < 0) != (y < 0)) { r + y } else { r };
                return Ok(LuaValue::Integer(r));
            }
            _ => {}
        }
    }
    let x = as_float(&a);
    let y = as_float(&b);
    Ok(LuaValue::Float(match operator {
        BinaryOperator::Add => x + y,
        BinaryOperator::Subtract => x - y,
        BinaryOperator::Multiply => x * y,
        BinaryOperator::Divide => x / y,
        BinaryOperator::FloorDivide => (x / y).floor(),
        BinaryOperator::Modulo => {
            let r = x % y;
            if r != 0.0 && ((r < 0.0) != (y < 0.0)) {
                r + y
            } else {
                r
            }
        }
        BinaryOperator::Power => x.powf(y),
        _ => return Err(LuaError::runtime("invalid arithmetic operator")),
    }))
}

pub fn negate(value: &LuaValue) -> Result<LuaValue, LuaError> {
    match value.to_number() {
        Some(LuaValue::Integer(i)) => Ok(LuaValue::Integer(i.wrapping_neg())),
        Some(LuaValue::Float(f)) => Ok(LuaValue::Float(-f)),
        _ => Err(arithmetic_error(value)),
    }
}

pub fn length(value: &LuaValue) -> Result<LuaValue, LuaError> {
    match value {
        LuaValue::String(s) => Ok(LuaValue::Integer(s.len() as i64)),
        LuaValue::Table(t) => Ok(LuaValue::Integer(t.borrow().length())),
        other => Err(LuaError::Runtime(format!(
            "attempt to get length of a {} value",
            other.type_name()
        ))),
    }
}

pub fn concat(left: &LuaValue, right: &LuaValue) -> Result<LuaValue, LuaError> {
    match (left.to_lua_string(), right.to_lua_string()) {
        (Some(a), Some(b)) => {
            let mut joined = String::with_capacity(a.len() + b.len());
            joined.push_str(&a);
            joined.push_str(&b);
            Ok(LuaValue::String(Rc::from(joined)))
        }
        (None, _) => Err(concat_error(left)),
        (_, None) => Err(concat_error(right)),
    }
}

pub fn compare(
    operator: BinaryOperator,
    left: &LuaValue,
    right: &LuaValue,
) -> Result<LuaValue, LuaError> {
    let result = match operator {
        BinaryOperator::Equal => left.raw_equals(right),
        BinaryOperator::NotEqual => !left.raw_equals(right),
        _ => {
            let ordering = order(left, right)?;
            match operator {
                BinaryOperator::LessThan => ordering == Some(Ordering::Less),
                BinaryOperator::LessThanEqual => {
                    matches!(ordering, Some(Ordering::Less) | Some(Ordering::Equal))
                }
                BinaryOperator::GreaterThan => ordering == Some(Ordering::Greater),
                BinaryOperator::GreaterThanEqual => {
                    matches!(ordering, Some(Ordering::Greater) | Some(Ordering::Equal))
                }
                _ => return Err(LuaError::runtime("invalid comparison operator")),
            }
        }
    };
    Ok(LuaValue::Boolean(result))
}

/// `None` means unordered (a NaN was involved).
pub fn order(left: &LuaValue, right: &LuaValue) -> Result<Option<Ordering>, LuaError> {
    match (left, right) {
        (LuaValue::Integer(a), LuaValue::Integer(b)) => Ok(Some(a.cmp(b))),
        (LuaValue::Integer(_), LuaValue::Float(_))
        | (LuaValue::Float(_), LuaValue::Integer(_))
        | (LuaValue::Float(_), LuaValue::Float(_)) => Ok(as_float(left).partial_cmp(&as_float(right))),
        (LuaValue::String(a), LuaValue::String(b)) => Ok(Some(a.cmp(b))),
        _ => {
            let (a, b) = (left.type_name(), right.type_name());
            Err(LuaError::Runtime(if a == b {
                format!("attempt to compare two {} values", a)
            } else {
                format!("attempt to compare {} with {}", a, b)
            }))
        }
    }
}

fn as_float(value: &LuaValue) -> f64 {
    match value {
        LuaValue::Integer(i) => *i as f64,
        LuaValue::Float(f) => *f,
        _ => f64::NAN,
    }
}

fn arithmetic_error(value: &LuaValue) -> LuaError {
    LuaError::Runtime(format!(
        "attempt to perform arithmetic on a {} value",
        value.type_name()
    ))
}

fn concat_error(value: &LuaValue) -> LuaError {
    LuaError::Runtime(format!(
        "attempt to concatenate a {} value",
        value.type_name()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_arithmetic_stays_integral() {
        let r = arithmetic(BinaryOperator::Add, &LuaValue::Integer(1), &LuaValue::Integer(1)).unwrap();
        assert_eq!(r, LuaValue::Integer(2));
        assert!(matches!(r, LuaValue::Integer(_)));
    }

    #[test]
    fn test_division_is_always_float() {
        let r = arithmetic(BinaryOperator::Divide, &LuaValue::Integer(7), &LuaValue::Integer(2)).unwrap();
        assert!(matches!(r, LuaValue::Float(f) if f == 3.5));
    }

    #[test]
    fn test_floor_division_and_modulo_follow_the_divisor_sign() {
        let q = arithmetic(BinaryOperator::FloorDivide, &LuaValue::Integer(-7), &LuaValue::Integer(2)).unwrap();
        assert!(matches!(q, LuaValue::Integer(-4)));
        let r = arithmetic(BinaryOperator::Modulo, &LuaValue::Integer(-7), &LuaValue::Integer(2)).unwrap();
        assert!(matches!(r, LuaValue::Integer(1)));
        let r = arithmetic(BinaryOperator::Modulo, &LuaValue::Integer(7), &LuaValue::Integer(-2)).unwrap();
        assert!(matches!(r, LuaValue::Integer(-1)));
    }

    #[test]
    fn test_integer_division_by_zero_fails() {
        let r = arithmetic(BinaryOperator::Modulo, &LuaValue::Integer(1), &LuaValue::Integer(0));
        assert!(r.is_err());
    }

    #[test]
    fn test_numeric_strings_are_coerced() {
        let r = arithmetic(BinaryOperator::Add, &LuaValue::string("10"), &LuaValue::Integer(1)).unwrap();
        assert!(matches!(r, LuaValue::Integer(11)));
        let err = arithmetic(BinaryOperator::Add, &LuaValue::string("ten"), &LuaValue::Integer(1)).unwrap_err();
        assert_eq!(
            err,
            LuaError::runtime("attempt to perform arithmetic on a string value")
        );
    }

    #[test]
    fn test_concat_numbers_and_strings() {
        let r = concat(&LuaValue::string("n="), &LuaValue::Float(1.5)).unwrap();
        assert_eq!(r.to_string(), "n=1.5");
        assert!(concat(&LuaValue::Nil, &LuaValue::string("x")).is_err());
    }

    #[test]
    fn test_mixed_comparisons() {
        let r = compare(BinaryOperator::LessThan, &LuaValue::Integer(1), &LuaValue::Float(1.5)).unwrap();
        assert_eq!(r, LuaValue::Boolean(true));
        let r = compare(BinaryOperator::Equal, &LuaValue::Integer(2), &LuaValue::Float(2.0)).unwrap();
        assert_eq!(r, LuaValue::Boolean(true));
        assert!(compare(BinaryOperator::LessThan, &LuaValue::Integer(1), &LuaValue::string("2")).is_err());
    }
}
