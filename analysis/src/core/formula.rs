//! Model formulas of the form `y ~ a + b + a*b`.
//!
//! Only numeric factors are supported. `a*b` expands to `a + b + a:b`,
//! `a:b` is the elementwise product, and `-1` or `+0` drops the intercept.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const INTERCEPT: &str = "Intercept";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormulaError {
    #[error("formula {0:?} has no `~`")]
    MissingTilde(String),
    #[error("formula {0:?} has an empty response")]
    EmptyResponse(String),
    #[error("formula {formula:?} has an empty term near {near:?}")]
    EmptyTerm { formula: String, near: String },
    #[error("formula {formula:?}: invalid factor name {factor:?}")]
    InvalidFactor { formula: String, factor: String },
    #[error("formula {0:?} has no terms")]
    NoTerms(String),
}

/// One column of the design matrix: the product of its factors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub factors: Vec<String>,
}

impl Term {
    pub fn name(&self) -> String {
        if self.factors.is_empty() {
            return INTERCEPT.to_string();
        }
        self.factors.join(":")
    }

    pub fn degree(&self) -> usize {
        self.factors.len()
    }

    fn same_factors(&self, other: &Term) -> bool {
        let mut mine = self.factors.clone();
        let mut theirs = other.factors.clone();
        mine.sort();
        theirs.sort();
        mine == theirs
    }
}

/// Parsed formula with expanded, ordered terms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Formula {
    source: String,
    response: String,
    terms: Vec<Term>,
}

impl Formula {
    pub fn parse(source: &str) -> Result<Self, FormulaError> {
        let (lhs, rhs) = source
            .split_once('~')
            .ok_or_else(|| FormulaError::MissingTilde(source.to_string()))?;
        let response = lhs.trim();
        if response.is_empty() {
            return Err(FormulaError::EmptyResponse(source.to_string()));
        }
        validate_factor(source, response)?;

        let mut intercept = true;
        let mut expanded: Vec<Term> = Vec::new();
        for (index, chunk) in split_additive(rhs).into_iter().enumerate() {
            let (negated, body) = chunk;
            let body = body.trim();
            if body.is_empty() {
                // A leading `-` produces an empty first chunk.
                if index == 0 && negated.is_none() {
                    continue;
                }
                return Err(FormulaError::EmptyTerm {
                    formula: source.to_string(),
                    near: rhs.trim().to_string(),
                });
            }
            match (negated, body) {
                (Some(true), "1") | (_, "0") => intercept = false,
                (_, "1") => intercept = true,
                (Some(true), other) => {
                    for term in expand_product(source, other)? {
                        expanded.retain(|existing| !existing.same_factors(&term));
                    }
                }
                (_, other) => expanded.extend(expand_product(source, other)?),
            }
        }

        let mut terms: Vec<Term> = Vec::new();
        for term in expanded {
            if !terms.iter().any(|existing| existing.same_factors(&term)) {
                terms.push(term);
            }
        }
        // Stable sort keeps first-appearance order within each degree.
        terms.sort_by_key(Term::degree);
        if intercept {
            terms.insert(0, Term { factors: Vec::new() });
        }
        if terms.is_empty() {
            return Err(FormulaError::NoTerms(source.to_string()));
        }

        Ok(Self {
            source: source.trim().to_string(),
            response: response.to_string(),
            terms,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn response(&self) -> &str {
        &self.response
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    pub fn term_names(&self) -> Vec<String> {
        self.terms.iter().map(Term::name).collect()
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Split the right-hand side on top-level `+`/`-`.
///
/// Each chunk is tagged with `Some(true)` if preceded by `-`, `Some(false)`
/// if preceded by `+`, and `None` for the first chunk.
fn split_additive(rhs: &str) -> Vec<(Option<bool>, &str)> {
    let mut chunks = Vec::new();
    let mut sign = None;
    let mut start = 0;
    for (index, ch) in rhs.char_indices() {
        if ch == '+' || ch == '-' {
            chunks.push((sign, &rhs[start..index]));
            sign = Some(ch == '-');
            start = index + ch.len_utf8();
        }
    }
    chunks.push((sign, &rhs[start..]));
    chunks
}

/// Expand `a*b:c` into its terms: every subset of `*` operands, each operand
/// itself a `:` product.
fn expand_product(source: &str, body: &str) -> Result<Vec<Term>, FormulaError> {
    let mut operands: Vec<Vec<String>> = Vec::new();
    for operand in body.split('*') {
        let mut factors = Vec::new();
        for factor in operand.split(':') {
            let factor = factor.trim();
            validate_factor(source, factor)?;
            factors.push(factor.to_string());
        }
        operands.push(factors);
    }

    let mut terms: Vec<Term> = Vec::new();
    for size in 1..=operands.len() {
        for combo in combinations(operands.len(), size) {
            let mut factors: Vec<String> = Vec::new();
            for index in combo {
                for factor in &operands[index] {
                    if !factors.contains(factor) {
                        factors.push(factor.clone());
                    }
                }
            }
            terms.push(Term { factors });
        }
    }
    Ok(terms)
}

/// Index combinations of `size` out of `n`, in lexicographic order.
fn combinations(n: usize, size: usize) -> Vec<Vec<usize>> {
    fn walk(
        start: usize,
        n: usize,
        size: usize,
        current: &mut Vec<usize>,
        out: &mut Vec<Vec<usize>>,
    ) {
        if current.len() == size {
            out.push(current.clone());
            return;
        }
        for index in start..n {
            current.push(index);
            walk(index + 1, n, size, current, out);
            current.pop();
        }
    }
    let mut out = Vec::new();
    walk(0, n, size, &mut Vec::with_capacity(size), &mut out);
    out
}

fn validate_factor(source: &str, factor: &str) -> Result<(), FormulaError> {
    let valid = !factor.is_empty()
        && factor
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '.')
        && !factor.starts_with(|ch: char| ch.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(FormulaError::InvalidFactor {
            formula: source.to_string(),
            factor: factor.to_string(),
        })
    }
}
