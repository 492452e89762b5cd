// Copyright 2017 Matthew Plant. This file is part of iris-collision.
//
// iris-collision is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// iris-collision is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with iris-collision. If not, see <http://www.gnu.org/licenses/>.

//! Symbolic variables and expressions.
//!
//! Expressions are immutable trees with shared subterms. Construction folds
//! constants and drops additive and multiplicative identities, which keeps
//! the expressions produced by forward kinematics readable: fixed joints and
//! zero offsets vanish instead of piling up `0 * x` terms.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{Add, Mul, Neg, Sub};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{ExpressionError, ExpressionResult};
use crate::scalar::Scalar;

static NEXT_VARIABLE_ID: AtomicUsize = AtomicUsize::new(0);

/// A named symbolic variable. Two variables are equal only if one was cloned
/// from the other, regardless of their names.
#[derive(Clone)]
pub struct Variable {
    id: usize,
    name: Arc<str>,
}

impl Variable {
    pub fn new(name: &str) -> Self {
        Variable {
            id: NEXT_VARIABLE_ID.fetch_add(1, Ordering::Relaxed),
            name: Arc::from(name),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for Variable {
    fn eq(&self, other: &Variable) -> bool {
        self.id == other.id
    }
}

impl Eq for Variable {}

impl Hash for Variable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.id)
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Values assigned to variables for evaluation.
#[derive(Clone, Debug, Default)]
pub struct Environment {
    values: HashMap<Variable, f64>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
        }
    }

    pub fn insert(&mut self, var: Variable, value: f64) {
        self.values.insert(var, value);
    }

    pub fn get(&self, var: &Variable) -> Option<f64> {
        self.values.get(var).cloned()
    }
}

impl FromIterator<(Variable, f64)> for Environment {
    fn from_iter<I: IntoIterator<Item = (Variable, f64)>>(iter: I) -> Self {
        Environment {
            values: iter.into_iter().collect(),
        }
    }
}

/// A symbolic scalar expression.
#[derive(Clone, Debug, PartialEq)]
pub enum Expression {
    Constant(f64),
    Variable(Variable),
    Sum(Arc<Expression>, Arc<Expression>),
    Product(Arc<Expression>, Arc<Expression>),
    Negation(Arc<Expression>),
    Sin(Arc<Expression>),
    Cos(Arc<Expression>),
}

impl Expression {
    pub fn constant_value(&self) -> Option<f64> {
        match *self {
            Expression::Constant(c) => Some(c),
            _ => None,
        }
    }

    fn is_constant_equal_to(&self, v: f64) -> bool {
        self.constant_value() == Some(v)
    }

    /// Evaluates the expression with the variables bound in `env`.
    pub fn evaluate(&self, env: &Environment) -> ExpressionResult<f64> {
        Ok(match self {
            Expression::Constant(c) => *c,
            Expression::Variable(v) => env
                .get(v)
                .ok_or_else(|| ExpressionError::UnboundVariable(v.name().to_string()))?,
            Expression::Sum(a, b) => a.evaluate(env)? + b.evaluate(env)?,
            Expression::Product(a, b) => a.evaluate(env)? * b.evaluate(env)?,
            Expression::Negation(a) => -a.evaluate(env)?,
            Expression::Sin(a) => a.evaluate(env)?.sin(),
            Expression::Cos(a) => a.evaluate(env)?.cos(),
        })
    }

    /// Returns the free variables in order of first appearance.
    pub fn variables(&self) -> Vec<Variable> {
        fn collect(e: &Expression, seen: &mut HashSet<usize>, out: &mut Vec<Variable>) {
            match e {
                Expression::Constant(_) => (),
                Expression::Variable(v) => {
                    if seen.insert(v.id()) {
                        out.push(v.clone());
                    }
                }
                Expression::Sum(a, b) | Expression::Product(a, b) => {
                    collect(a, seen, out);
                    collect(b, seen, out);
                }
                Expression::Negation(a) | Expression::Sin(a) | Expression::Cos(a) => {
                    collect(a, seen, out)
                }
            }
        }
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        collect(self, &mut seen, &mut out);
        out
    }
}

impl From<f64> for Expression {
    fn from(c: f64) -> Self {
        Expression::Constant(c)
    }
}

impl From<Variable> for Expression {
    fn from(v: Variable) -> Self {
        Expression::Variable(v)
    }
}

impl<'a> From<&'a Variable> for Expression {
    fn from(v: &'a Variable) -> Self {
        Expression::Variable(v.clone())
    }
}

impl Add for Expression {
    type Output = Expression;

    fn add(self, rhs: Expression) -> Expression {
        match (self.constant_value(), rhs.constant_value()) {
            (Some(a), Some(b)) => Expression::Constant(a + b),
            (Some(a), None) if a == 0.0 => rhs,
            (None, Some(b)) if b == 0.0 => self,
            _ => Expression::Sum(Arc::new(self), Arc::new(rhs)),
        }
    }
}

impl Sub for Expression {
    type Output = Expression;

    fn sub(self, rhs: Expression) -> Expression {
        self + -rhs
    }
}

impl Mul for Expression {
    type Output = Expression;

    fn mul(self, rhs: Expression) -> Expression {
        if self.is_constant_equal_to(0.0) || rhs.is_constant_equal_to(0.0) {
            return Expression::Constant(0.0);
        }
        match (self.constant_value(), rhs.constant_value()) {
            (Some(a), Some(b)) => Expression::Constant(a * b),
            (Some(a), None) if a == 1.0 => rhs,
            (None, Some(b)) if b == 1.0 => self,
            (Some(a), None) if a == -1.0 => -rhs,
            (None, Some(b)) if b == -1.0 => -self,
            _ => Expression::Product(Arc::new(self), Arc::new(rhs)),
        }
    }
}

impl Neg for Expression {
    type Output = Expression;

    fn neg(self) -> Expression {
        match self {
            Expression::Constant(c) => Expression::Constant(-c),
            Expression::Negation(inner) => (*inner).clone(),
            other => Expression::Negation(Arc::new(other)),
        }
    }
}

impl Scalar for Expression {
    fn from_f64(value: f64) -> Self {
        Expression::Constant(value)
    }

    fn sin(&self) -> Self {
        match self.constant_value() {
            Some(c) => Expression::Constant(c.sin()),
            None => Expression::Sin(Arc::new(self.clone())),
        }
    }

    fn cos(&self) -> Self {
        match self.constant_value() {
            Some(c) => Expression::Constant(c.cos()),
            None => Expression::Cos(Arc::new(self.clone())),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Expression::Constant(c) => write!(f, "{}", c),
            Expression::Variable(v) => write!(f, "{}", v),
            Expression::Sum(a, b) => match **b {
                Expression::Negation(ref nb) => write!(f, "({} - {})", a, nb),
                _ => write!(f, "({} + {})", a, b),
            },
            Expression::Product(a, b) => write!(f, "({} * {})", a, b),
            Expression::Negation(a) => write!(f, "-{}", a),
            Expression::Sin(a) => write!(f, "sin({})", a),
            Expression::Cos(a) => write!(f, "cos({})", a),
        }
    }
}

#[cfg(test)]
mod tests {
    mod symbolic {
        use approx::assert_abs_diff_eq;

        use crate::error::ExpressionError;
        use crate::scalar::Scalar;
        use crate::symbolic::*;

        #[test]
        fn test_identities_fold_away() {
            let x = Variable::new("x");
            let e = Expression::from(&x) * Expression::from(1.0) + Expression::from(0.0);
            assert!(matches!(e, Expression::Variable(ref v) if *v == x));
            let z = Expression::from(&x) * Expression::from(0.0);
            assert_eq!(z.constant_value(), Some(0.0));
            let c = Expression::from(2.0).cos();
            assert_abs_diff_eq!(c.constant_value().unwrap(), 2.0f64.cos());
        }

        #[test]
        fn test_evaluate() {
            let x = Variable::new("x");
            let y = Variable::new("y");
            let e = Expression::from(&x).sin() * Expression::from(&y) - Expression::from(3.0);
            let env: Environment = vec![(x.clone(), 0.5), (y.clone(), 2.0)].into_iter().collect();
            assert_abs_diff_eq!(e.evaluate(&env).unwrap(), 0.5f64.sin() * 2.0 - 3.0);
            assert_eq!(e.variables(), vec![x, y]);
        }

        #[test]
        fn test_unbound_variable() {
            let x = Variable::new("q0");
            let e = Expression::from(&x) + Expression::from(1.0);
            assert_eq!(
                e.evaluate(&Environment::new()),
                Err(ExpressionError::UnboundVariable("q0".to_string()))
            );
        }

        #[test]
        fn test_display() {
            let x = Variable::new("x");
            let e = Expression::from(&x) - Expression::from(&x).cos();
            assert_eq!(format!("{}", e), "(x - cos(x))");
        }
    }
}
