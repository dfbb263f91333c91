use std::collections::HashMap;
use std::sync::Arc;

use crate::atom::Atom;
use crate::error::Error;
use crate::term::{List, ListBuilder, Map, Term, TermKind, Var};

/// Variable bindings accumulated by pattern matches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Binding {
    vars: HashMap<Atom, Term>,
}

impl Binding {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name` to `value`, returning any previous binding.
    pub fn bind(&mut self, name: Atom, value: Term) -> Option<Term> {
        self.vars.insert(name, value)
    }

    #[must_use]
    pub fn get(&self, name: Atom) -> Option<&Term> {
        self.vars.get(&name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Inserts from `other` every binding whose name is not already
    /// present; existing bindings win.
    pub fn merge(&mut self, other: &Binding) {
        for (name, value) in &other.vars {
            self.vars.entry(*name).or_insert_with(|| value.clone());
        }
    }

    pub fn clear(&mut self) {
        self.vars.clear();
    }
}

/// Matches `pattern` against the concrete `value`, extending `binding` with
/// whatever the pattern's variables capture.
///
/// A failed match leaves `binding` exactly as it was: additions made while
/// descending are rolled back.
pub fn match_term(pattern: &Term, value: &Term, binding: &mut Binding) -> bool {
    let mut added = Vec::new();
    if do_match(pattern, value, binding, &mut added) {
        true
    } else {
        for name in added {
            binding.vars.remove(&name);
        }
        false
    }
}

fn do_match(pattern: &Term, value: &Term, binding: &mut Binding, added: &mut Vec<Atom>) -> bool {
    match pattern {
        Term::Var(var) => match_var(var, value, binding, added),
        Term::Tuple(pe) => match value {
            Term::Tuple(ve) if pe.len() == ve.len() => pe
                .iter()
                .zip(ve.iter())
                .all(|(p, v)| do_match(p, v, binding, added)),
            _ => false,
        },
        Term::List(pl) => match value {
            Term::List(vl) => match_list(pl, vl, binding, added),
            _ => false,
        },
        Term::Map(pm) => match value {
            // Subset semantics: every pattern key must be present with a
            // matching value; extra concrete keys are fine.
            Term::Map(vm) => pm.iter().all(|(k, pv)| {
                vm.get(k)
                    .is_some_and(|vv| do_match(pv, vv, binding, added))
            }),
            _ => false,
        },
        _ => pattern == value,
    }
}

fn match_var(var: &Var, value: &Term, binding: &mut Binding, added: &mut Vec<Atom>) -> bool {
    if var.is_wildcard() {
        return hint_allows(var.hint(), value);
    }
    if let Some(bound) = binding.get(var.name()) {
        if !hint_allows(var.hint(), value) {
            return false;
        }
        return bound_matches(var.hint(), bound, value);
    }
    if !hint_allows(var.hint(), value) {
        return false;
    }
    binding.bind(var.name(), value.clone());
    added.push(var.name());
    true
}

/// A numeric hint lets integers and floats stand in for each other; any
/// other hint pins the kind exactly.
fn hint_allows(hint: Option<TermKind>, value: &Term) -> bool {
    match hint {
        None => true,
        Some(TermKind::Long | TermKind::Double) => value.is_number(),
        Some(kind) => value.kind() == kind,
    }
}

fn bound_matches(hint: Option<TermKind>, bound: &Term, value: &Term) -> bool {
    if matches!(hint, Some(TermKind::Long | TermKind::Double))
        && bound.is_number()
        && value.is_number()
    {
        return numeric_value(bound) == numeric_value(value);
    }
    bound == value
}

fn numeric_value(term: &Term) -> f64 {
    match term {
        Term::Long(v) => *v as f64,
        Term::Double(v) => *v,
        _ => f64::NAN,
    }
}

fn match_list(pl: &List, vl: &List, binding: &mut Binding, added: &mut Vec<Atom>) -> bool {
    let prefix = pl.elements().len();
    if prefix > vl.elements().len() {
        return false;
    }
    for (p, v) in pl.elements().iter().zip(vl.elements()) {
        if !do_match(p, v, binding, added) {
            return false;
        }
    }
    match pl.tail() {
        None => prefix == vl.elements().len() && vl.tail().is_none(),
        Some(pt) => {
            let rest = vl.elements()[prefix..].to_vec();
            let remainder = if rest.is_empty() {
                vl.tail().cloned().unwrap_or_else(Term::nil)
            } else {
                Term::list_with_tail(rest, vl.tail().cloned().unwrap_or_else(Term::nil))
            };
            do_match(pt, &remainder, binding, added)
        }
    }
}

/// Substitutes bound variables in `pattern`, yielding a concrete term.
/// Unbound (and wildcard) variables fail with [`Error::Unbound`].
pub fn apply(pattern: &Term, binding: &Binding) -> Result<Term, Error> {
    match pattern {
        Term::Var(v) => binding
            .get(v.name())
            .cloned()
            .ok_or(Error::Unbound(v.name())),
        Term::Tuple(elems) => {
            let subst: Result<Vec<Term>, Error> =
                elems.iter().map(|e| apply(e, binding)).collect();
            Ok(Term::tuple(subst?))
        }
        Term::List(l) => {
            let elems: Result<Vec<Term>, Error> =
                l.elements().iter().map(|e| apply(e, binding)).collect();
            let tail = match l.tail() {
                None => Term::nil(),
                Some(t) => apply(t, binding)?,
            };
            Ok(Term::list_with_tail(elems?, tail))
        }
        Term::Map(m) => {
            let mut out = Map::new();
            for (k, v) in m.iter() {
                out.insert(apply(k, binding)?, apply(v, binding)?);
            }
            Ok(Term::map(out))
        }
        other => Ok(other.clone()),
    }
}

impl Term {
    /// Parses the textual pattern form, e.g. `"{ok, A::int(), B}"`.
    pub fn format(input: &str) -> Result<Term, Error> {
        Parser::new(input).parse()
    }

    /// [`match_term`] with `self` as the pattern.
    pub fn matches(&self, value: &Term, binding: &mut Binding) -> bool {
        match_term(self, value, binding)
    }

    /// [`apply`] with `self` as the pattern.
    pub fn apply(&self, binding: &Binding) -> Result<Term, Error> {
        apply(self, binding)
    }
}

/// Recursive-descent parser for the textual pattern form.
struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn parse(mut self) -> Result<Term, Error> {
        let term = self.term()?;
        self.skip_ws();
        if self.pos != self.src.len() {
            return Err(self.fail("trailing input"));
        }
        Ok(term)
    }

    fn fail(&self, what: &str) -> Error {
        Error::bad_arg(format!("pattern parse error at {}: {what}", self.pos))
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &str) -> Result<(), Error> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.fail(&format!("expected '{token}'")))
        }
    }

    fn term(&mut self) -> Result<Term, Error> {
        self.skip_ws();
        match self.peek().ok_or_else(|| self.fail("unexpected end"))? {
            '{' => self.tuple(),
            '[' => self.list(),
            '#' => self.map(),
            '<' => self.binary(),
            '"' => self.string(),
            '\'' => self.quoted_atom(),
            c if c.is_ascii_digit() || c == '-' || c == '+' => self.number(),
            c if c.is_ascii_lowercase() => self.bare_atom(),
            c if c.is_ascii_uppercase() || c == '_' => self.variable(),
            c => Err(self.fail(&format!("unexpected character '{c}'"))),
        }
    }

    fn tuple(&mut self) -> Result<Term, Error> {
        self.expect("{")?;
        let mut elems = Vec::new();
        self.skip_ws();
        if !self.eat("}") {
            loop {
                elems.push(self.term()?);
                self.skip_ws();
                if self.eat(",") {
                    continue;
                }
                self.expect("}")?;
                break;
            }
        }
        Ok(Term::tuple(elems))
    }

    fn list(&mut self) -> Result<Term, Error> {
        self.expect("[")?;
        let mut list = ListBuilder::new();
        self.skip_ws();
        if self.eat("]") {
            return Ok(list.close());
        }
        loop {
            list.push(self.term()?);
            self.skip_ws();
            if self.eat(",") {
                continue;
            }
            if self.eat("|") {
                let tail = self.term()?;
                self.skip_ws();
                self.expect("]")?;
                return Ok(list.close_with_tail(tail));
            }
            self.expect("]")?;
            return Ok(list.close());
        }
    }

    fn map(&mut self) -> Result<Term, Error> {
        self.expect("#")?;
        self.expect("{")?;
        let mut map = Map::new();
        self.skip_ws();
        if !self.eat("}") {
            loop {
                let key = self.term()?;
                self.skip_ws();
                self.expect("=>")?;
                let value = self.term()?;
                map.insert(key, value);
                self.skip_ws();
                if self.eat(",") {
                    continue;
                }
                self.expect("}")?;
                break;
            }
        }
        Ok(Term::map(map))
    }

    fn binary(&mut self) -> Result<Term, Error> {
        self.expect("<<")?;
        self.skip_ws();
        if self.eat(">>") {
            return Ok(Term::binary(&[]));
        }
        if self.peek() == Some('"') {
            let text = self.quoted_body('"')?;
            self.skip_ws();
            self.expect(">>")?;
            return Ok(Term::binary(text.as_bytes()));
        }
        let mut bytes = Vec::new();
        loop {
            self.skip_ws();
            let n = match self.number()? {
                Term::Long(v) if (0..=255).contains(&v) => v as u8,
                _ => return Err(self.fail("binary element out of range")),
            };
            bytes.push(n);
            self.skip_ws();
            if self.eat(",") {
                continue;
            }
            self.expect(">>")?;
            return Ok(Term::binary(&bytes));
        }
    }

    fn quoted_body(&mut self, quote: char) -> Result<String, Error> {
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump().ok_or_else(|| self.fail("unterminated quote"))? {
                '\\' => match self.bump().ok_or_else(|| self.fail("unterminated escape"))? {
                    'n' => out.push('\n'),
                    'r' => out.push('\r'),
                    't' => out.push('\t'),
                    c => out.push(c),
                },
                c if c == quote => return Ok(out),
                c => out.push(c),
            }
        }
    }

    fn string(&mut self) -> Result<Term, Error> {
        let body = self.quoted_body('"')?;
        Ok(Term::string(&body))
    }

    fn quoted_atom(&mut self) -> Result<Term, Error> {
        let body = self.quoted_body('\'')?;
        Term::atom(&body)
    }

    fn number(&mut self) -> Result<Term, Error> {
        let start = self.pos;
        if matches!(self.peek(), Some('-' | '+')) {
            self.bump();
        }
        let mut is_float = false;
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' => {
                    self.bump();
                }
                '.' if !is_float && self.rest()[1..].starts_with(|d: char| d.is_ascii_digit()) => {
                    is_float = true;
                    self.bump();
                }
                'e' | 'E' if self.pos > start => {
                    is_float = true;
                    self.bump();
                    if matches!(self.peek(), Some('-' | '+')) {
                        self.bump();
                    }
                }
                _ => break,
            }
        }
        let text = &self.src[start..self.pos];
        if is_float {
            text.parse()
                .map(Term::Double)
                .map_err(|_| self.fail("malformed float"))
        } else {
            text.parse()
                .map(Term::Long)
                .map_err(|_| self.fail("malformed integer"))
        }
    }

    fn ident(&mut self) -> &'a str {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_' || c == '@')
        {
            self.bump();
        }
        &self.src[start..self.pos]
    }

    fn bare_atom(&mut self) -> Result<Term, Error> {
        let name = self.ident();
        match name {
            "true" => Ok(Term::Bool(true)),
            "false" => Ok(Term::Bool(false)),
            _ => Term::atom(name),
        }
    }

    fn variable(&mut self) -> Result<Term, Error> {
        let name = Atom::new(self.ident())?;
        if self.eat("::") {
            let kind_name = self.ident();
            let kind = hint_kind(kind_name).ok_or_else(|| {
                self.fail(&format!("unknown type hint '{kind_name}'"))
            })?;
            self.expect("(")?;
            self.skip_ws();
            self.expect(")")?;
            return Ok(Term::Var(Arc::new(Var::with_hint(name, kind))));
        }
        Ok(Term::Var(Arc::new(Var::new(name))))
    }
}

fn hint_kind(name: &str) -> Option<TermKind> {
    Some(match name {
        "int" | "integer" | "long" => TermKind::Long,
        "float" | "double" => TermKind::Double,
        "bool" | "boolean" => TermKind::Bool,
        "atom" => TermKind::Atom,
        "str" | "string" => TermKind::String,
        "binary" => TermKind::Binary,
        "pid" => TermKind::Pid,
        "port" => TermKind::Port,
        "ref" | "reference" => TermKind::Ref,
        "tuple" => TermKind::Tuple,
        "list" => TermKind::List,
        "map" => TermKind::Map,
        _ => return None,
    })
}
