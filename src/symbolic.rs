//! A minimal symbolic-expression / interval algebra standing in for the real
//! compiler front end's expression simplifier and bounds inference (spec
//! §4.3a, §9 "Symbolic expressions").
//!
//! This is deliberately small: enough to express clamp/extend region-computed
//! patterns and affine producer-coordinate footprints, nothing more. A real
//! port would either re-wrap the host compiler's IR or grow this module; we
//! chose to reimplement rather than wrap, per the open question in
//! `DESIGN.md`.

use crate::span::Span;
use std::collections::HashMap;

/// A symbolic scalar expression over named integer variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Var(String),
    Const(i64),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    /// Multiplication by a compile-time-constant coefficient.
    MulConst(i64, Box<Expr>),
    Max(Box<Expr>, Box<Expr>),
    Min(Box<Expr>, Box<Expr>),
    /// Clamp `expr` into the constant range `[lo, hi]`.
    Clamp(Box<Expr>, i64, i64),
}

impl Expr {
    pub fn var(name: impl Into<String>) -> Self {
        Expr::Var(name.into())
    }

    pub fn constant(value: i64) -> Self {
        Expr::Const(value)
    }

    pub fn add(self, other: Expr) -> Self {
        Expr::Add(Box::new(self), Box::new(other))
    }

    pub fn sub(self, other: Expr) -> Self {
        Expr::Sub(Box::new(self), Box::new(other))
    }

    pub fn scale(self, factor: i64) -> Self {
        Expr::MulConst(factor, Box::new(self))
    }

    pub fn max(self, other: Expr) -> Self {
        Expr::Max(Box::new(self), Box::new(other))
    }

    pub fn min(self, other: Expr) -> Self {
        Expr::Min(Box::new(self), Box::new(other))
    }

    pub fn clamp(self, lo: i64, hi: i64) -> Self {
        Expr::Clamp(Box::new(self), lo, hi)
    }

    /// Whether evaluating this expression's max side required resolving a
    /// [`Expr::Max`] node the simplifier could not prove redundant. Used to
    /// set the `uses_max` flag on an edge's affine decomposition.
    pub fn contains_max(&self) -> bool {
        match self {
            Expr::Max(_, _) => true,
            Expr::Var(_) | Expr::Const(_) => false,
            Expr::Add(a, b) | Expr::Sub(a, b) | Expr::Min(a, b) => {
                a.contains_max() || b.contains_max()
            }
            Expr::MulConst(_, a) => a.contains_max(),
            Expr::Clamp(a, _, _) => a.contains_max(),
        }
    }
}

/// A binding of variable names to the [`Span`] of values they range over.
pub type Bindings = HashMap<String, Span>;

/// Evaluate `expr`'s interval given `env`, by propagating `Span`s through
/// each monotonic operator. Sound (every bound is an over-approximation of
/// the true range) but not always tight, like the real compiler's interval
/// arithmetic.
pub fn eval(expr: &Expr, env: &Bindings) -> Span {
    match expr {
        Expr::Const(c) => Span::single_point(*c),
        Expr::Var(name) => env.get(name).copied().unwrap_or_else(Span::empty),
        Expr::Add(a, b) => {
            let (a, b) = (eval(a, env), eval(b, env));
            Span::new(a.min() + b.min(), a.max() + b.max(), a.constant_extent() && b.constant_extent())
        }
        Expr::Sub(a, b) => {
            let (a, b) = (eval(a, env), eval(b, env));
            Span::new(a.min() - b.max(), a.max() - b.min(), a.constant_extent() && b.constant_extent())
        }
        Expr::MulConst(k, a) => {
            let a = eval(a, env);
            if *k >= 0 {
                Span::new(k * a.min(), k * a.max(), a.constant_extent())
            } else {
                Span::new(k * a.max(), k * a.min(), a.constant_extent())
            }
        }
        Expr::Max(a, b) => {
            let (a, b) = (eval(a, env), eval(b, env));
            Span::new(a.min().max(b.min()), a.max().max(b.max()), a.constant_extent() && b.constant_extent())
        }
        Expr::Min(a, b) => {
            let (a, b) = (eval(a, env), eval(b, env));
            Span::new(a.min().min(b.min()), a.max().min(b.max()), a.constant_extent() && b.constant_extent())
        }
        Expr::Clamp(a, lo, hi) => {
            let a = eval(a, env);
            Span::new(a.min().clamp(*lo, *hi), a.max().clamp(*lo, *hi), true)
        }
    }
}

/// A symbolic interval: a pair of scalar expressions describing the lower
/// and upper bound of a region/loop dimension as functions of other named
/// variables (e.g. a consumer's loop variables).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interval {
    pub min_expr: Expr,
    pub max_expr: Expr,
}

impl Interval {
    pub fn new(min_expr: Expr, max_expr: Expr) -> Self {
        Interval { min_expr, max_expr }
    }

    pub fn constant(lo: i64, hi: i64) -> Self {
        Interval { min_expr: Expr::Const(lo), max_expr: Expr::Const(hi) }
    }

    /// Substitute `env` into both bounds and union the resulting spans into
    /// a single concrete `Span`, exactly as `Edge::expand_footprint` does
    /// for one producer dimension.
    pub fn substitute(&self, env: &Bindings) -> Span {
        let lo = eval(&self.min_expr, env).min();
        let hi = eval(&self.max_expr, env).max();
        let constant_extent = is_constant_extent(&self.min_expr, &self.max_expr);
        Span::new(lo, hi, constant_extent)
    }
}

/// Structural affine decomposition of `expr` with respect to `var`:
/// returns `Some((coeff, constant))` iff `expr` is built only from `var`,
/// integer constants, `Add`/`Sub`/`MulConst` (so `coeff * var + constant`),
/// with no other variable and no `Max`/`Min`/`Clamp` node. Any other shape
/// returns `None` — a sound, conservative "not affine" answer (the caller
/// always has the general `eval` path as a fallback).
pub fn affine_decompose(expr: &Expr, var: &str) -> Option<(i64, i64)> {
    match expr {
        Expr::Const(c) => Some((0, *c)),
        Expr::Var(name) if name == var => Some((1, 0)),
        Expr::Var(_) => None,
        Expr::Add(a, b) => {
            let (ca, ka) = affine_decompose(a, var)?;
            let (cb, kb) = affine_decompose(b, var)?;
            Some((ca + cb, ka + kb))
        }
        Expr::Sub(a, b) => {
            let (ca, ka) = affine_decompose(a, var)?;
            let (cb, kb) = affine_decompose(b, var)?;
            Some((ca - cb, ka - kb))
        }
        Expr::MulConst(k, a) => {
            let (ca, ka) = affine_decompose(a, var)?;
            Some((k * ca, k * ka))
        }
        Expr::Max(_, _) | Expr::Min(_, _) | Expr::Clamp(_, _, _) => None,
    }
}

/// Whether `min_expr`/`max_expr` are guaranteed to differ by a compile-time
/// constant regardless of any variable binding: true when both sides are
/// affine in every variable they mention with identical per-variable
/// coefficients. Falls back to `false` (not provably constant) rather than
/// risking a false positive.
fn is_constant_extent(min_expr: &Expr, max_expr: &Expr) -> bool {
    let vars_min = collect_vars(min_expr);
    let vars_max = collect_vars(max_expr);
    if vars_min != vars_max {
        return false;
    }
    vars_min.iter().all(|v| {
        let a = affine_decompose(min_expr, v);
        let b = affine_decompose(max_expr, v);
        matches!((a, b), (Some((ca, _)), Some((cb, _))) if ca == cb)
    })
}

fn collect_vars(expr: &Expr) -> std::collections::BTreeSet<String> {
    let mut out = std::collections::BTreeSet::new();
    fn walk(expr: &Expr, out: &mut std::collections::BTreeSet<String>) {
        match expr {
            Expr::Var(name) => {
                out.insert(name.clone());
            }
            Expr::Const(_) => {}
            Expr::Add(a, b) | Expr::Sub(a, b) | Expr::Max(a, b) | Expr::Min(a, b) => {
                walk(a, out);
                walk(b, out);
            }
            Expr::MulConst(_, a) | Expr::Clamp(a, _, _) => walk(a, out),
        }
    }
    walk(expr, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, Span)]) -> Bindings {
        pairs.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
    }

    #[test]
    fn affine_decompose_recovers_coeff_and_constant() {
        // 2*x - 1
        let expr = Expr::var("x").scale(2).sub(Expr::constant(1));
        assert_eq!(affine_decompose(&expr, "x"), Some((2, -1)));
    }

    #[test]
    fn affine_decompose_rejects_clamp() {
        let expr = Expr::var("x").clamp(0, 10);
        assert_eq!(affine_decompose(&expr, "x"), None);
    }

    #[test]
    fn interval_substitute_widens_by_stencil_radius() {
        // A 3-tap stencil: min = x - 1, max = x + 1, over x in [0, 9].
        let interval = Interval::new(
            Expr::var("x").sub(Expr::constant(1)),
            Expr::var("x").add(Expr::constant(1)),
        );
        let span = interval.substitute(&env(&[("x", Span::new(0, 9, true))]));
        assert_eq!(span.min(), -1);
        assert_eq!(span.max(), 10);
        assert!(span.constant_extent());
    }

    #[test]
    fn eval_is_monotone_in_input_span_width() {
        let expr = Expr::var("x").scale(2).add(Expr::constant(3));
        let narrow = eval(&expr, &env(&[("x", Span::new(2, 2, true))]));
        let wide = eval(&expr, &env(&[("x", Span::new(0, 4, true))]));
        assert!(wide.min() <= narrow.min());
        assert!(wide.max() >= narrow.max());
    }
}
