//! Arithmetic expressions for CUSTOM formulas.
//!
//! Expressions are parsed once into an [`Expr`] tree and evaluated in `f64`
//! against a variable lookup. Supported syntax:
//! - numbers (`12`, `0.5`, `1e3`), identifiers (`level`, user constants,
//!   `pi`, `e`)
//! - `+ - * / ^` with the usual precedence, `^` right-associative, unary `-`
//! - calls: `exp ln log log10 sqrt abs floor ceil round pow min max`
//!
//! ## Examples
//!
//! ```
//! use leveling_core::formula::expr::Expr;
//!
//! let expr = Expr::parse("100 * (level - 1) ^ 2").unwrap();
//! let value = expr.eval(&|name: &str| (name == "level").then_some(5.0));
//! assert_eq!(value, 1600.0);
//! ```

mod parser;

use std::collections::BTreeSet;

use crate::error::Result;

/// Parsed expression tree.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Number(f64),
    Var(String),
    Neg(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        func: Function,
        args: Vec<Expr>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

/// Built-in functions callable from expressions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Function {
    Exp,
    Ln,
    Log10,
    Sqrt,
    Abs,
    Floor,
    Ceil,
    Round,
    Pow,
    Min,
    Max,
}

impl Function {
    pub fn from_name(name: &str) -> Option<Self> {
        let func = match name {
            "exp" => Self::Exp,
            "ln" | "log" => Self::Ln,
            "log10" => Self::Log10,
            "sqrt" => Self::Sqrt,
            "abs" => Self::Abs,
            "floor" => Self::Floor,
            "ceil" => Self::Ceil,
            "round" => Self::Round,
            "pow" => Self::Pow,
            "min" => Self::Min,
            "max" => Self::Max,
            _ => return None,
        };
        Some(func)
    }

    /// Accepted argument count as an inclusive range.
    pub fn arity(self) -> (usize, usize) {
        match self {
            Self::Pow => (2, 2),
            Self::Min | Self::Max => (1, usize::MAX),
            _ => (1, 1),
        }
    }

    fn apply(self, args: &[f64]) -> f64 {
        match self {
            Self::Exp => args[0].exp(),
            Self::Ln => args[0].ln(),
            Self::Log10 => args[0].log10(),
            Self::Sqrt => args[0].sqrt(),
            Self::Abs => args[0].abs(),
            Self::Floor => args[0].floor(),
            Self::Ceil => args[0].ceil(),
            Self::Round => args[0].round(),
            Self::Pow => args[0].powf(args[1]),
            Self::Min => args.iter().copied().fold(f64::INFINITY, f64::min),
            Self::Max => args.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

/// Identifiers resolved without a user definition.
pub const BUILTIN_CONSTANTS: [(&str, f64); 2] =
    [("pi", std::f64::consts::PI), ("e", std::f64::consts::E)];

impl Expr {
    pub fn parse(source: &str) -> Result<Self> {
        parser::parse(source)
    }

    /// Evaluates the tree. Unresolved variables fall back to the built-in
    /// constants and then to NaN.
    pub fn eval(&self, lookup: &dyn Fn(&str) -> Option<f64>) -> f64 {
        match self {
            Expr::Number(value) => *value,
            Expr::Var(name) => lookup(name)
                .or_else(|| builtin_constant(name))
                .unwrap_or(f64::NAN),
            Expr::Neg(inner) => -inner.eval(lookup),
            Expr::Binary { op, lhs, rhs } => {
                let (a, b) = (lhs.eval(lookup), rhs.eval(lookup));
                match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => a / b,
                    BinaryOp::Pow => a.powf(b),
                }
            }
            Expr::Call { func, args } => {
                let values: Vec<f64> = args.iter().map(|arg| arg.eval(lookup)).collect();
                func.apply(&values)
            }
        }
    }

    /// Names of every variable referenced by the tree.
    pub fn variables(&self) -> BTreeSet<&str> {
        let mut names = BTreeSet::new();
        self.collect_variables(&mut names);
        names
    }

    fn collect_variables<'a>(&'a self, names: &mut BTreeSet<&'a str>) {
        match self {
            Expr::Number(_) => {}
            Expr::Var(name) => {
                names.insert(name.as_str());
            }
            Expr::Neg(inner) => inner.collect_variables(names),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_variables(names);
                rhs.collect_variables(names);
            }
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.collect_variables(names);
                }
            }
        }
    }
}

fn builtin_constant(name: &str) -> Option<f64> {
    BUILTIN_CONSTANTS
        .iter()
        .find(|(builtin, _)| *builtin == name)
        .map(|&(_, value)| value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval_with_level(source: &str, level: f64) -> f64 {
        Expr::parse(source)
            .unwrap()
            .eval(&|name: &str| (name == "level").then_some(level))
    }

    #[test]
    fn precedence_and_associativity() {
        assert_eq!(eval_with_level("1 + 2 * 3", 0.0), 7.0);
        assert_eq!(eval_with_level("(1 + 2) * 3", 0.0), 9.0);
        assert_eq!(eval_with_level("2 ^ 3 ^ 2", 0.0), 512.0);
        assert_eq!(eval_with_level("-2 ^ 2", 0.0), -4.0);
        assert_eq!(eval_with_level("2 ^ -1", 0.0), 0.5);
        assert_eq!(eval_with_level("10 - 4 - 3", 0.0), 3.0);
        assert_eq!(eval_with_level("12 / 3 / 2", 0.0), 2.0);
    }

    #[test]
    fn functions_and_constants() {
        assert_eq!(eval_with_level("pow(level, 2)", 4.0), 16.0);
        assert_eq!(eval_with_level("max(1, level, 3)", 7.0), 7.0);
        assert_eq!(eval_with_level("min(level, 3)", 7.0), 3.0);
        assert_eq!(eval_with_level("floor(2.7) + ceil(2.1)", 0.0), 5.0);
        assert!((eval_with_level("ln(e)", 0.0) - 1.0).abs() < 1e-12);
        assert!((eval_with_level("log10(1000)", 0.0) - 3.0).abs() < 1e-12);
        assert!((eval_with_level("exp(0.12 * (level - 1)) * 100", 1.0) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn scientific_literals() {
        assert_eq!(eval_with_level("1.5e3", 0.0), 1500.0);
        assert_eq!(eval_with_level("25E-2 * 8", 0.0), 2.0);
    }

    #[test]
    fn reports_variables() {
        let expr = Expr::parse("exp(a * (level - 1)) * b / c").unwrap();
        let names: Vec<&str> = expr.variables().into_iter().collect();
        assert_eq!(names, vec!["a", "b", "c", "level"]);
    }

    #[test]
    fn rejects_malformed_input() {
        for source in [
            "", "1 +", "(1 + 2", "1 + 2)", "foo(1)", "pow(1)", "min()", "2 $ 3", "1 2", "sqrt 4",
        ] {
            assert!(Expr::parse(source).is_err(), "accepted {source:?}");
        }
    }
}
