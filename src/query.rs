/*
 * Copyright 2026 The ramfs-core authors
 *
 * This file is part of ramfs-core.
 *
 * ramfs-core is free software: you can redistribute it and/or modify it under the
 * terms of the GNU General Public License as published by the Free Software
 * Foundation, either version 3 of the License, or (at your option) any later
 * version.
 *
 * ramfs-core is distributed in the hope that it will be useful, but WITHOUT ANY
 * WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR
 * A PARTICULAR PURPOSE. See the GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License along with
 * ramfs-core. If not, see <https://www.gnu.org/licenses/>.
 */

//! The live query engine: parse an expression, pick the cheapest
//! index to drive each leaf from, evaluate, and — for live queries — incrementally
//! re-evaluate as the volume mutates.
//!
//! The grammar is `or := and ('||' and)*`, `and := term ('&&' term)*`, `term :=
//! '!' '(' or ')' | '(' or ')' | equation`, `equation := attr op literal` with `op`
//! one of `==`, `!=`, `<`, `<=`, `>`, `>=`. Literals are either a bare token or a
//! quoted string (`'...'`/`"..."`, `\` escapes the quote character and `\` itself);
//! unquoted literals that contain `*`, `?`, `[` are shell-glob patterns, only legal
//! with `==`/`!=`.
//!
//! `!(...)` is folded away at parse time via De Morgan's laws rather than carried as
//! a runtime negation node, so the evaluator never needs a "not" case.

use crate::index::AttrKey;
use crate::node::AttrType;

/// One comparison operator.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Op {
    /// Applies this operator between two already-resolved keys. Shared by the
    /// evaluator's scan fallback and by `Volume`'s single-node override source used
    /// during live-query re-evaluation.
    pub fn apply(self, lhs: &AttrKey, rhs: &AttrKey) -> bool {
        match self {
            Op::Eq => lhs == rhs,
            Op::Ne => lhs != rhs,
            Op::Lt => lhs < rhs,
            Op::Le => lhs <= rhs,
            Op::Gt => lhs > rhs,
            Op::Ge => lhs >= rhs,
        }
    }

    /// The operator De Morgan's laws turn this one into under negation.
    fn negate(self) -> Self {
        match self {
            Op::Eq => Op::Ne,
            Op::Ne => Op::Eq,
            Op::Lt => Op::Ge,
            Op::Le => Op::Gt,
            Op::Gt => Op::Le,
            Op::Ge => Op::Lt,
        }
    }
}

/// A parsed literal value, before it is resolved against a particular attribute's
/// declared type.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// An unquoted or quoted string literal. May contain glob wildcards.
    Text(String),
    Number(f64),
}

impl Literal {
    fn is_glob(&self) -> bool {
        match self {
            Literal::Text(s) => s.contains(['*', '?', '[']),
            Literal::Number(_) => false,
        }
    }

    /// Index into this literal's first wildcard character, used for scoring pattern
    /// equations: fewer wildcards, appearing later, score higher.
    fn first_wildcard_pos(&self) -> usize {
        match self {
            Literal::Text(s) => s.find(['*', '?', '[']).unwrap_or(s.len()),
            Literal::Number(_) => 0,
        }
    }
}

/// A leaf comparison, e.g. `size > 100` or `name == "*.txt"`.
#[derive(Debug, Clone, PartialEq)]
pub struct Equation {
    pub attribute: String,
    pub op: Op,
    pub literal: Literal,
}

/// A parsed query expression tree. `!(...)` is eliminated during
/// parsing via [`Term::negate`], so this tree only ever carries positive nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Equation(Equation),
    And(Box<Term>, Box<Term>),
    Or(Box<Term>, Box<Term>),
}

impl Term {
    /// De Morgan complement: `!(a && b) == !a || !b`, `!(a || b) == !a && !b`,
    /// `!(attr op lit) == attr op.negate() lit`.
    fn negate(self) -> Term {
        match self {
            Term::Equation(eq) => Term::Equation(Equation { op: eq.op.negate(), ..eq }),
            Term::And(a, b) => Term::Or(Box::new(a.negate()), Box::new(b.negate())),
            Term::Or(a, b) => Term::And(Box::new(a.negate()), Box::new(b.negate())),
        }
    }
}

/// Parse error: the query string is malformed.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
#[error("malformed query at byte {pos}: {message}")]
pub struct ParseError {
    pub pos: usize,
    pub message: String,
}

struct Parser<'a> {
    src: &'a [u8],
    pos: usize,
}

fn err(pos: usize, message: &str) -> ParseError {
    ParseError { pos, message: message.to_string() }
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src: src.as_bytes(), pos: 0 }
    }

    fn skip_ws(&mut self) {
        while self.pos < self.src.len() && self.src[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn eat(&mut self, s: &str) -> bool {
        self.skip_ws();
        if self.src[self.pos..].starts_with(s.as_bytes()) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn parse_or(&mut self) -> Result<Term, ParseError> {
        let mut left = self.parse_and()?;
        loop {
            self.skip_ws();
            if self.eat("||") {
                let right = self.parse_and()?;
                left = Term::Or(Box::new(left), Box::new(right));
            } else {
                break;
            }
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Term, ParseError> {
        let mut left = self.parse_term()?;
        loop {
            self.skip_ws();
            if self.eat("&&") {
                let right = self.parse_term()?;
                left = Term::And(Box::new(left), Box::new(right));
            } else {
                break;
            }
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Term, ParseError> {
        self.skip_ws();
        if self.eat("!") {
            self.skip_ws();
            if !self.eat("(") {
                return Err(err(self.pos, "expected '(' after '!'"));
            }
            let inner = self.parse_or()?;
            self.skip_ws();
            if !self.eat(")") {
                return Err(err(self.pos, "expected ')'"));
            }
            return Ok(inner.negate());
        }
        self.skip_ws();
        if self.eat("(") {
            let inner = self.parse_or()?;
            self.skip_ws();
            if !self.eat(")") {
                return Err(err(self.pos, "expected ')'"));
            }
            return Ok(inner);
        }
        self.parse_equation()
    }

    fn parse_token(&mut self) -> Result<String, ParseError> {
        self.skip_ws();
        match self.peek() {
            Some(q @ (b'\'' | b'"')) => {
                self.pos += 1;
                let mut out = String::new();
                loop {
                    match self.peek() {
                        None => return Err(err(self.pos, "unterminated quoted literal")),
                        Some(b'\\') => {
                            self.pos += 1;
                            match self.peek() {
                                Some(c) => {
                                    out.push(c as char);
                                    self.pos += 1;
                                }
                                None => return Err(err(self.pos, "dangling escape")),
                            }
                        }
                        Some(c) if c == q => {
                            self.pos += 1;
                            break;
                        }
                        Some(c) => {
                            out.push(c as char);
                            self.pos += 1;
                        }
                    }
                }
                Ok(out)
            }
            _ => {
                let start = self.pos;
                while let Some(c) = self.peek() {
                    if c.is_ascii_whitespace() || c == b'(' || c == b')' {
                        break;
                    }
                    // Stop before a bare `&&`/`||` so an unquoted literal doesn't
                    // swallow the next operator.
                    if self.src[self.pos..].starts_with(b"&&") || self.src[self.pos..].starts_with(b"||") {
                        break;
                    }
                    self.pos += 1;
                }
                if start == self.pos {
                    return Err(err(self.pos, "expected a token"));
                }
                Ok(String::from_utf8_lossy(&self.src[start..self.pos]).into_owned())
            }
        }
    }

    fn parse_op(&mut self) -> Result<Op, ParseError> {
        self.skip_ws();
        for (s, op) in [("==", Op::Eq), ("!=", Op::Ne), ("<=", Op::Le), (">=", Op::Ge), ("<", Op::Lt), (">", Op::Gt)] {
            if self.eat(s) {
                return Ok(op);
            }
        }
        Err(err(self.pos, "expected a comparison operator"))
    }

    fn parse_equation(&mut self) -> Result<Term, ParseError> {
        let attribute = self.parse_token()?;
        let op = self.parse_op()?;
        let literal_tok = self.parse_token()?;
        let literal = match literal_tok.parse::<f64>() {
            Ok(n) if !literal_tok.contains(['*', '?', '[']) => Literal::Number(n),
            _ => Literal::Text(literal_tok),
        };
        Ok(Term::Equation(Equation { attribute, op, literal }))
    }
}

/// Parses a query string into a [`Term`] tree.
pub fn parse(src: &str) -> Result<Term, ParseError> {
    let mut p = Parser::new(src);
    let term = p.parse_or()?;
    p.skip_ws();
    if p.pos != p.src.len() {
        return Err(err(p.pos, "trailing input"));
    }
    Ok(term)
}

/// Matches `text` against a shell-style glob `pattern`: `*` (any run), `?` (any
/// one), `[abc]`/`[a-z]`/`[^abc]` (one of/not of a character class). Used for
/// pattern equality/inequality leaves.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    fn class_match(class: &[char], c: char) -> bool {
        let (negate, class) = if class.first() == Some(&'^') { (true, &class[1..]) } else { (false, class) };
        let mut i = 0;
        let mut hit = false;
        while i < class.len() {
            if i + 2 < class.len() && class[i + 1] == '-' {
                if class[i] <= c && c <= class[i + 2] {
                    hit = true;
                }
                i += 3;
            } else {
                if class[i] == c {
                    hit = true;
                }
                i += 1;
            }
        }
        hit != negate
    }

    fn go(p: &[char], t: &[char]) -> bool {
        match p.first() {
            None => t.is_empty(),
            Some('*') => go(&p[1..], t) || (!t.is_empty() && go(p, &t[1..])),
            Some('?') => !t.is_empty() && go(&p[1..], &t[1..]),
            Some('[') => {
                let Some(end) = p.iter().position(|c| *c == ']') else {
                    return !t.is_empty() && p[0] == t[0] && go(&p[1..], &t[1..]);
                };
                if t.is_empty() {
                    return false;
                }
                class_match(&p[1..end], t[0]) && go(&p[end + 1..], &t[1..])
            }
            Some(c) => !t.is_empty() && *c == t[0] && go(&p[1..], &t[1..]),
        }
    }

    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    go(&p, &t)
}

/// A hook the query engine uses to reach into a volume's indices and actual node
/// data without depending on `crate::volume` directly (kept as a trait so the
/// evaluator and the scorer stay independently testable).
pub trait QueryIndexSource {
    /// The on-disk type of `name`, if an index or well-known field exists for it.
    fn attr_type(&self, name: &str) -> Option<AttrType>;
    /// Number of entries the index over `name` holds, for scoring.
    /// `None` if there is no index (forces a full scan, score 0).
    fn index_size(&self, name: &str) -> Option<usize>;
    /// Evaluates `attribute op literal` against every node in the volume by full
    /// scan, returning the matching node ids. Used when no index accelerates the
    /// leaf, or as the fallback the indexed path is checked against in tests.
    fn scan(&self, attribute: &str, op: Op, key: &AttrKey) -> Vec<crate::ids::NodeId>;
    /// As [`Self::scan`], but only for a glob pattern leaf (`==`/`!=` only).
    fn scan_pattern(&self, attribute: &str, pattern: &str, negate: bool) -> Vec<crate::ids::NodeId>;
}

/// One leaf's resolved key, ready for scoring/evaluation, or a glob pattern.
#[derive(Debug, Clone)]
enum Resolved {
    Key(AttrKey),
    Pattern(String),
}

fn resolve_literal(attr_type: AttrType, literal: &Literal) -> Option<Resolved> {
    match (attr_type, literal) {
        (_, Literal::Text(s)) if literal.is_glob() => Some(Resolved::Pattern(s.clone())),
        (AttrType::String, Literal::Text(s)) => Some(Resolved::Key(AttrKey::Bytes(s.clone().into_bytes()))),
        (AttrType::Int32, Literal::Number(n)) => Some(Resolved::Key(AttrKey::I32(*n as i32))),
        (AttrType::Int64, Literal::Number(n)) => Some(Resolved::Key(AttrKey::I64(*n as i64))),
        (AttrType::UInt32, Literal::Number(n)) => Some(Resolved::Key(AttrKey::U32(*n as u32))),
        (AttrType::UInt64, Literal::Number(n)) => Some(Resolved::Key(AttrKey::U64(*n as u64))),
        (AttrType::Float, Literal::Number(n)) => Some(Resolved::Key(AttrKey::F32(*n as f32))),
        (AttrType::Double, Literal::Number(n)) => Some(Resolved::Key(AttrKey::F64(*n))),
        _ => None,
    }
}

/// Scores one leaf equation the way the original scorer does: `!=` always scores
/// 0 (it can never drive an index seek, only a full scan), an indexed exact match
/// on a non-pattern value scores highest (2048), a glob pattern scores by how much
/// of its prefix is a fixed literal (`wildcard_pos * 8`), and any other indexed
/// comparison scores a flat 5. All non-zero scores are then scaled by
/// `2 MiB / index_size`, so a smaller (more selective) index scores higher.
fn score_equation(eq: &Equation, source: &dyn QueryIndexSource) -> u64 {
    if matches!(eq.op, Op::Ne) {
        return 0;
    }
    let Some(index_size) = source.index_size(&eq.attribute) else { return 0 };
    if index_size == 0 {
        return 0;
    }
    let base = if eq.literal.is_glob() {
        if matches!(eq.op, Op::Eq) {
            (eq.literal.first_wildcard_pos() as u64) << 3
        } else {
            0
        }
    } else if matches!(eq.op, Op::Eq) {
        2048
    } else {
        5
    };
    if base == 0 {
        return 0;
    }
    base.saturating_mul(2 * 1024 * 1024) / (index_size as u64)
}

/// Scores a whole term: an equation's own score, or for `and`/`or` nodes a
/// combination of both children's scores. `and` takes the higher-scoring child
/// (see [`Query::plan`], which only ever walks that one branch); `or` takes the
/// *lower*-scoring child, since an `or` must still visit both branches and is
/// therefore only as cheap as its worse side.
fn score_term(term: &Term, source: &dyn QueryIndexSource) -> u64 {
    match term {
        Term::Equation(eq) => score_equation(eq, source),
        Term::And(a, b) => score_term(a, source).max(score_term(b, source)),
        Term::Or(a, b) => score_term(a, source).min(score_term(b, source)),
    }
}

/// A compiled, evaluated query. Construction walks the whole tree
/// once and materializes the full result set rather than streaming lazily, and
/// exposes the result through an ordinary iterator.
pub struct Query {
    term: Term,
    results: Vec<crate::ids::NodeId>,
    cursor: usize,
    live: bool,
}

impl Query {
    pub fn compile(expr: &str, source: &dyn QueryIndexSource) -> Result<Self, ParseError> {
        let term = parse(expr)?;
        let results = evaluate(&term, source);
        Ok(Self { term, results, cursor: 0, live: false })
    }

    pub fn set_live(&mut self, live: bool) {
        self.live = live;
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    /// Yields one match at a time, advancing the cursor.
    pub fn get_next_entry(&mut self) -> Option<crate::ids::NodeId> {
        let r = self.results.get(self.cursor).copied();
        if r.is_some() {
            self.cursor += 1;
        }
        r
    }

    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    /// Re-evaluates against the node's old and new attribute value and reports
    /// whether the match set gained or lost this node, per this four-case table:
    ///
    /// | old matches | new matches | name changed | outcome |
    /// |---|---|---|---|
    /// | yes | yes | yes | `Removed` then `Created` (entry moved, same node) |
    /// | yes | yes | no | nothing |
    /// | no | yes | — | `Created` |
    /// | yes | no | — | `Removed` |
    /// | no | no | — | nothing |
    pub fn live_update(&mut self, node: crate::ids::NodeId, old_matches: bool, new_matches: bool, name_changed: bool) -> LiveUpdate {
        if !self.live {
            return LiveUpdate::None;
        }
        match (old_matches, new_matches, name_changed) {
            (true, true, true) => {
                self.results.retain(|n| *n != node);
                self.results.push(node);
                LiveUpdate::Replaced
            }
            (true, true, false) => LiveUpdate::None,
            (false, true, _) => {
                self.results.push(node);
                LiveUpdate::Created
            }
            (true, false, _) => {
                self.results.retain(|n| *n != node);
                LiveUpdate::Removed
            }
            (false, false, _) => LiveUpdate::None,
        }
    }

    pub fn term(&self) -> &Term {
        &self.term
    }
}

/// What a [`Query::live_update`] call changed about the match set.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum LiveUpdate {
    None,
    Created,
    Removed,
    /// Entry was both removed and re-created (its name changed while still
    /// matching), per the live-update table above.
    Replaced,
}

fn matches_node(eq: &Equation, node: crate::ids::NodeId, source: &dyn QueryIndexSource) -> bool {
    let Some(attr_type) = source.attr_type(&eq.attribute) else { return false };
    let Some(resolved) = resolve_literal(attr_type, &eq.literal) else { return false };
    match resolved {
        Resolved::Pattern(p) => {
            let hits = source.scan_pattern(&eq.attribute, &p, matches!(eq.op, Op::Ne));
            hits.contains(&node)
        }
        Resolved::Key(key) => {
            let hits = source.scan(&eq.attribute, eq.op, &key);
            hits.contains(&node)
        }
    }
}

/// Evaluates a leaf equation against the whole volume using whichever path
/// `source` exposes; `Equation` leaves never need to choose between index and scan
/// themselves since `source.scan`/`scan_pattern` already encapsulate that (an
/// unindexed attribute degrades to a full scan transparently).
fn eval_equation(eq: &Equation, source: &dyn QueryIndexSource) -> Vec<crate::ids::NodeId> {
    let Some(attr_type) = source.attr_type(&eq.attribute) else { return Vec::new() };
    let Some(resolved) = resolve_literal(attr_type, &eq.literal) else { return Vec::new() };
    match resolved {
        Resolved::Pattern(p) => source.scan_pattern(&eq.attribute, &p, matches!(eq.op, Op::Ne)),
        Resolved::Key(key) => source.scan(&eq.attribute, eq.op, &key),
    }
}

/// Evaluates a full term tree. `Or` always evaluates both sides (a result may
/// match through either branch); `And` evaluates the higher-scoring side first and
/// only probes the other side's leaves against that reduced candidate set — the
/// eager-materialization equivalent of the original's stack-based `Rewind`, which
/// pushes only the cheaper child for an `and` node and re-checks the other side
/// per-candidate during iteration.
fn evaluate(term: &Term, source: &dyn QueryIndexSource) -> Vec<crate::ids::NodeId> {
    match term {
        Term::Equation(eq) => eval_equation(eq, source),
        Term::Or(a, b) => {
            let mut left = evaluate(a, source);
            let right = evaluate(b, source);
            for n in right {
                if !left.contains(&n) {
                    left.push(n);
                }
            }
            left
        }
        Term::And(a, b) => {
            let (cheap, expensive) = if score_term(b, source) > score_term(a, source) { (b, a) } else { (a, b) };
            let cheap_set = evaluate(cheap, source);
            cheap_set.into_iter().filter(|n| term_matches(expensive, *n, source)).collect()
        }
    }
}

/// Re-checks a single node against an arbitrary subterm, used by `And`'s
/// narrow-then-verify evaluation strategy above, and by `Volume::live_update`
/// to re-evaluate a whole expression against a hypothetical old/new field value.
pub fn term_matches(term: &Term, node: crate::ids::NodeId, source: &dyn QueryIndexSource) -> bool {
    match term {
        Term::Equation(eq) => matches_node(eq, node, source),
        Term::And(a, b) => term_matches(a, node, source) && term_matches(b, node, source),
        Term::Or(a, b) => term_matches(a, node, source) || term_matches(b, node, source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::NodeId;
    use std::cell::RefCell;
    use std::collections::HashMap;

    struct FakeSource {
        types: HashMap<String, AttrType>,
        sizes: HashMap<String, usize>,
        values: RefCell<HashMap<NodeId, HashMap<String, AttrKey>>>,
        names: RefCell<HashMap<NodeId, String>>,
    }

    impl QueryIndexSource for FakeSource {
        fn attr_type(&self, name: &str) -> Option<AttrType> {
            self.types.get(name).copied()
        }
        fn index_size(&self, name: &str) -> Option<usize> {
            self.sizes.get(name).copied()
        }
        fn scan(&self, attribute: &str, op: Op, key: &AttrKey) -> Vec<NodeId> {
            self.values
                .borrow()
                .iter()
                .filter(|(_, attrs)| {
                    attrs.get(attribute).is_some_and(|v| match op {
                        Op::Eq => v == key,
                        Op::Ne => v != key,
                        Op::Lt => v < key,
                        Op::Le => v <= key,
                        Op::Gt => v > key,
                        Op::Ge => v >= key,
                    })
                })
                .map(|(n, _)| *n)
                .collect()
        }
        fn scan_pattern(&self, attribute: &str, pattern: &str, negate: bool) -> Vec<NodeId> {
            self.names
                .borrow()
                .iter()
                .filter(|(n, name)| {
                    let _ = n;
                    glob_match(pattern, name) != negate
                })
                .map(|(n, _)| *n)
                .collect()
        }
    }

    fn sample() -> FakeSource {
        let mut types = HashMap::new();
        types.insert("size".to_string(), AttrType::UInt64);
        types.insert("name".to_string(), AttrType::String);
        let mut sizes = HashMap::new();
        sizes.insert("size".to_string(), 3);
        sizes.insert("name".to_string(), 3);
        let mut values = HashMap::new();
        let mut names = HashMap::new();
        for (i, (sz, nm)) in [(10u64, "a.txt"), (200, "b.bin"), (5000, "c.txt")].into_iter().enumerate() {
            let id = NodeId::new((i + 1) as u64);
            let mut attrs = HashMap::new();
            attrs.insert("size".to_string(), AttrKey::U64(sz));
            values.insert(id, attrs);
            names.insert(id, nm.to_string());
        }
        FakeSource { types, sizes, values: RefCell::new(values), names: RefCell::new(names) }
    }

    #[test]
    fn parses_simple_and_or() {
        let t = parse("size > 100 && name == \"*.txt\"").unwrap();
        assert!(matches!(t, Term::And(_, _)));
        let t2 = parse("size < 5 || size > 1000").unwrap();
        assert!(matches!(t2, Term::Or(_, _)));
    }

    #[test]
    fn negated_group_applies_de_morgan() {
        let t = parse("!(size > 100 && size < 1000)").unwrap();
        // becomes (size <= 100) || (size >= 1000)
        match t {
            Term::Or(a, b) => {
                assert!(matches!(*a, Term::Equation(Equation { op: Op::Le, .. })));
                assert!(matches!(*b, Term::Equation(Equation { op: Op::Ge, .. })));
            }
            _ => panic!("expected Or after De Morgan"),
        }
    }

    #[test]
    fn evaluates_numeric_comparison() {
        let source = sample();
        let q = Query::compile("size > 100", &source).unwrap();
        let mut ids: Vec<u64> = q.results.iter().map(|n| n.raw()).collect();
        ids.sort();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn evaluates_glob_pattern() {
        let source = sample();
        let q = Query::compile("name == \"*.txt\"", &source).unwrap();
        let mut ids: Vec<u64> = q.results.iter().map(|n| n.raw()).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn and_narrows_to_intersection() {
        let source = sample();
        let q = Query::compile("size > 100 && name == \"*.txt\"", &source).unwrap();
        let ids: Vec<u64> = q.results.iter().map(|n| n.raw()).collect();
        assert_eq!(ids, vec![3]);
    }

    #[test]
    fn live_update_created_and_removed() {
        let source = sample();
        let mut q = Query::compile("size > 100", &source).unwrap();
        q.set_live(true);
        let n = NodeId::new(99);
        assert_eq!(q.live_update(n, false, true, false), LiveUpdate::Created);
        assert!(q.results.contains(&n));
        assert_eq!(q.live_update(n, true, false, false), LiveUpdate::Removed);
        assert!(!q.results.contains(&n));
    }

    #[test]
    fn live_update_rename_while_still_matching_replaces() {
        let source = sample();
        let mut q = Query::compile("size > 100", &source).unwrap();
        q.set_live(true);
        let n = NodeId::new(2);
        assert_eq!(q.live_update(n, true, true, true), LiveUpdate::Replaced);
    }

    #[test]
    fn glob_match_handles_star_question_and_class() {
        assert!(glob_match("*.txt", "report.txt"));
        assert!(!glob_match("*.txt", "report.bin"));
        assert!(glob_match("f??.log", "f12.log"));
        assert!(glob_match("[a-c]x", "bx"));
        assert!(!glob_match("[^a-c]x", "bx"));
    }

    #[test]
    fn score_equation_matches_spec_cases() {
        let source = sample();
        let scale = |base: u64| base.saturating_mul(2 * 1024 * 1024) / 3;

        // `!=` always scores 0, even though "size" has an index.
        let ne = Equation { attribute: "size".to_string(), op: Op::Ne, literal: Literal::Number(100.0) };
        assert_eq!(score_equation(&ne, &source), 0);

        // Non-glob `==` scores 2048, scaled by 2 MiB / index_size.
        let eq = Equation { attribute: "size".to_string(), op: Op::Eq, literal: Literal::Number(100.0) };
        assert_eq!(score_equation(&eq, &source), scale(2048));

        // Pattern equality scores `wildcard_pos << 3`, scaled the same way.
        let pattern = Equation {
            attribute: "name".to_string(),
            op: Op::Eq,
            literal: Literal::Text("b*.txt".to_string()),
        };
        assert_eq!(score_equation(&pattern, &source), scale(1 << 3));

        // Any other comparison (e.g. `>`) scores a flat 5, scaled.
        let gt = Equation { attribute: "size".to_string(), op: Op::Gt, literal: Literal::Number(100.0) };
        assert_eq!(score_equation(&gt, &source), scale(5));
    }

    #[test]
    fn score_term_uses_max_for_and_and_min_for_or() {
        let source = sample();
        let high = Term::Equation(Equation {
            attribute: "size".to_string(),
            op: Op::Eq,
            literal: Literal::Number(100.0),
        });
        let low = Term::Equation(Equation {
            attribute: "size".to_string(),
            op: Op::Ne,
            literal: Literal::Number(100.0),
        });
        let high_score = score_term(&high, &source);
        let low_score = score_term(&low, &source);
        assert!(high_score > low_score);

        let and = Term::And(Box::new(high.clone()), Box::new(low.clone()));
        assert_eq!(score_term(&and, &source), high_score);

        let or = Term::Or(Box::new(high), Box::new(low));
        assert_eq!(score_term(&or, &source), low_score);
    }

    #[test]
    fn bad_query_string_is_rejected() {
        assert!(parse("size >").is_err());
        assert!(parse("size > 1 &&").is_err());
        assert!(parse("!size > 1").is_err());
    }
}
