use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::atom::Atom;
use crate::error::Error;
use crate::ident::{Pid, Port, Ref};
use crate::trace::Trace;

/// The tag of a [`Term`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TermKind {
    Undefined,
    Long,
    Double,
    Bool,
    Atom,
    String,
    Binary,
    Pid,
    Port,
    Ref,
    Tuple,
    List,
    Map,
    Trace,
    Var,
}

impl TermKind {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Long => "int",
            Self::Double => "float",
            Self::Bool => "bool",
            Self::Atom => "atom",
            Self::String => "string",
            Self::Binary => "binary",
            Self::Pid => "pid",
            Self::Port => "port",
            Self::Ref => "ref",
            Self::Tuple => "tuple",
            Self::List => "list",
            Self::Map => "map",
            Self::Trace => "trace",
            Self::Var => "var",
        }
    }
}

impl fmt::Display for TermKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The body of a list term: elements plus an optional non-nil tail.
///
/// A `List` with no elements and no tail is nil. A non-`None` tail makes the
/// list improper; improper lists are first-class values here and nothing
/// about them is dropped on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct List {
    elems: Vec<Term>,
    tail: Option<Term>,
}

impl List {
    #[must_use]
    pub fn elements(&self) -> &[Term] {
        &self.elems
    }

    #[must_use]
    pub fn tail(&self) -> Option<&Term> {
        self.tail.as_ref()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.elems.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.elems.is_empty() && self.tail.is_none()
    }

    #[must_use]
    pub fn is_proper(&self) -> bool {
        self.tail.is_none()
    }
}

/// The body of a map term: entries kept sorted by canonical term order,
/// keys unique, duplicate inserts keeping the last value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Map {
    entries: BTreeMap<Term, Term>,
}

impl Map {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (Term, Term)>) -> Self {
        let mut map = Self::new();
        for (k, v) in pairs {
            map.insert(k, v);
        }
        map
    }

    pub fn insert(&mut self, key: Term, value: Term) -> Option<Term> {
        self.entries.insert(key, value)
    }

    #[must_use]
    pub fn get(&self, key: &Term) -> Option<&Term> {
        self.entries.get(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Term, &Term)> {
        self.entries.iter()
    }
}

/// A pattern variable: a name plus an optional kind hint.
///
/// The name `_` is the wildcard; it matches anything and binds nothing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Var {
    name: Atom,
    hint: Option<TermKind>,
}

impl Var {
    pub fn new(name: Atom) -> Self {
        Self { name, hint: None }
    }

    pub fn with_hint(name: Atom, hint: TermKind) -> Self {
        Self {
            name,
            hint: Some(hint),
        }
    }

    #[must_use]
    pub fn name(&self) -> Atom {
        self.name
    }

    #[must_use]
    pub fn hint(&self) -> Option<TermKind> {
        self.hint
    }

    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        &*self.name.name() == "_"
    }
}

/// A runtime value: the tagged sum over every kind the wire format can
/// carry, plus pattern variables and the default `Undefined` state.
///
/// Scalar kinds own their payload inline; composite kinds share their body
/// behind an `Arc`, so cloning a term is cheap and bodies are immutable
/// once a term is observable.
#[derive(Debug, Clone, Default)]
pub enum Term {
    #[default]
    Undefined,
    Long(i64),
    Double(f64),
    Bool(bool),
    Atom(Atom),
    String(Arc<str>),
    Binary(Arc<[u8]>),
    Pid(Arc<Pid>),
    Port(Arc<Port>),
    Ref(Arc<Ref>),
    Tuple(Arc<[Term]>),
    List(Arc<List>),
    Map(Arc<Map>),
    Trace(Arc<Trace>),
    Var(Arc<Var>),
}

pub(crate) static UNDEFINED_TERM: Term = Term::Undefined;

impl Term {
    /// The empty proper list.
    #[must_use]
    pub fn nil() -> Self {
        Self::List(Arc::new(List {
            elems: Vec::new(),
            tail: None,
        }))
    }

    pub fn atom(name: &str) -> Result<Self, Error> {
        Ok(Self::Atom(Atom::new(name)?))
    }

    #[must_use]
    pub fn string(s: &str) -> Self {
        Self::String(Arc::from(s))
    }

    #[must_use]
    pub fn binary(bytes: &[u8]) -> Self {
        Self::Binary(Arc::from(bytes))
    }

    #[must_use]
    pub fn tuple(elems: Vec<Term>) -> Self {
        Self::Tuple(Arc::from(elems))
    }

    #[must_use]
    pub fn list(elems: Vec<Term>) -> Self {
        Self::List(Arc::new(List { elems, tail: None }))
    }

    /// A cons with an explicit tail. A proper-list tail is spliced in; a
    /// nil tail yields a proper list; anything else is kept as an improper
    /// tail. With no elements the tail itself is the result.
    #[must_use]
    pub fn list_with_tail(elems: Vec<Term>, tail: Term) -> Self {
        ListBuilder::from_elems(elems).close_with_tail(tail)
    }

    #[must_use]
    pub fn map(map: Map) -> Self {
        Self::Map(Arc::new(map))
    }

    #[must_use]
    pub fn var(v: Var) -> Self {
        Self::Var(Arc::new(v))
    }

    #[must_use]
    pub fn kind(&self) -> TermKind {
        match self {
            Self::Undefined => TermKind::Undefined,
            Self::Long(_) => TermKind::Long,
            Self::Double(_) => TermKind::Double,
            Self::Bool(_) => TermKind::Bool,
            Self::Atom(_) => TermKind::Atom,
            Self::String(_) => TermKind::String,
            Self::Binary(_) => TermKind::Binary,
            Self::Pid(_) => TermKind::Pid,
            Self::Port(_) => TermKind::Port,
            Self::Ref(_) => TermKind::Ref,
            Self::Tuple(_) => TermKind::Tuple,
            Self::List(_) => TermKind::List,
            Self::Map(_) => TermKind::Map,
            Self::Trace(_) => TermKind::Trace,
            Self::Var(_) => TermKind::Var,
        }
    }

    /// False only for the default-constructed term: finished list and tuple
    /// bodies are the only ones reachable through a `Term`.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        !matches!(self, Self::Undefined)
    }

    #[must_use]
    pub fn is_nil(&self) -> bool {
        matches!(self, Self::List(l) if l.is_nil())
    }

    #[must_use]
    pub fn is_number(&self) -> bool {
        matches!(self, Self::Long(_) | Self::Double(_))
    }

    fn wrong(&self, expected: TermKind) -> Error {
        Error::WrongType {
            expected,
            actual: self.kind(),
        }
    }

    pub fn to_long(&self) -> Result<i64, Error> {
        match self {
            Self::Long(v) => Ok(*v),
            _ => Err(self.wrong(TermKind::Long)),
        }
    }

    pub fn to_double(&self) -> Result<f64, Error> {
        match self {
            Self::Double(v) => Ok(*v),
            _ => Err(self.wrong(TermKind::Double)),
        }
    }

    pub fn to_bool(&self) -> Result<bool, Error> {
        match self {
            Self::Bool(v) => Ok(*v),
            _ => Err(self.wrong(TermKind::Bool)),
        }
    }

    pub fn to_atom(&self) -> Result<Atom, Error> {
        match self {
            Self::Atom(a) => Ok(*a),
            _ => Err(self.wrong(TermKind::Atom)),
        }
    }

    pub fn as_string(&self) -> Result<&str, Error> {
        match self {
            Self::String(s) => Ok(s),
            _ => Err(self.wrong(TermKind::String)),
        }
    }

    pub fn as_binary(&self) -> Result<&[u8], Error> {
        match self {
            Self::Binary(b) => Ok(b),
            _ => Err(self.wrong(TermKind::Binary)),
        }
    }

    pub fn as_pid(&self) -> Result<&Pid, Error> {
        match self {
            Self::Pid(p) => Ok(p),
            _ => Err(self.wrong(TermKind::Pid)),
        }
    }

    pub fn as_port(&self) -> Result<&Port, Error> {
        match self {
            Self::Port(p) => Ok(p),
            _ => Err(self.wrong(TermKind::Port)),
        }
    }

    pub fn as_reference(&self) -> Result<&Ref, Error> {
        match self {
            Self::Ref(r) => Ok(r),
            _ => Err(self.wrong(TermKind::Ref)),
        }
    }

    pub fn as_tuple(&self) -> Result<&[Term], Error> {
        match self {
            Self::Tuple(t) => Ok(t),
            _ => Err(self.wrong(TermKind::Tuple)),
        }
    }

    pub fn as_list(&self) -> Result<&List, Error> {
        match self {
            Self::List(l) => Ok(l),
            _ => Err(self.wrong(TermKind::List)),
        }
    }

    pub fn as_map(&self) -> Result<&Map, Error> {
        match self {
            Self::Map(m) => Ok(m),
            _ => Err(self.wrong(TermKind::Map)),
        }
    }

    pub fn as_trace(&self) -> Result<&Trace, Error> {
        match self {
            Self::Trace(t) => Ok(t),
            _ => Err(self.wrong(TermKind::Trace)),
        }
    }

    pub fn as_var(&self) -> Result<&Var, Error> {
        match self {
            Self::Var(v) => Ok(v),
            _ => Err(self.wrong(TermKind::Var)),
        }
    }

    /// Rank in the canonical cross-kind order. Nil sorts in its own slot
    /// between maps and strings.
    fn rank(&self) -> u8 {
        match self {
            Self::Undefined => 0,
            Self::Long(_) | Self::Double(_) => 1,
            Self::Bool(_) => 2,
            Self::Atom(_) => 3,
            Self::Ref(_) => 4,
            Self::Port(_) => 5,
            Self::Pid(_) => 6,
            Self::Tuple(_) => 7,
            Self::Map(_) => 8,
            Self::List(l) if l.is_nil() => 9,
            Self::String(_) => 10,
            Self::List(_) => 11,
            Self::Binary(_) => 12,
            Self::Trace(_) => 13,
            Self::Var(_) => 14,
        }
    }
}

impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        use Term::*;

        match (self, other) {
            (Undefined, Undefined) => true,
            (Long(a), Long(b)) => a == b,
            (Double(a), Double(b)) => a.to_bits() == b.to_bits(),
            (Bool(a), Bool(b)) => a == b,
            (Atom(a), Atom(b)) => a == b,
            (String(a), String(b)) => a == b,
            (Binary(a), Binary(b)) => a == b,
            (Pid(a), Pid(b)) => a == b,
            (Port(a), Port(b)) => a == b,
            (Ref(a), Ref(b)) => a == b,
            (Tuple(a), Tuple(b)) => a == b,
            (List(a), List(b)) => a == b,
            (Map(a), Map(b)) => a == b,
            (Trace(a), Trace(b)) => a == b,
            (Var(a), Var(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Term {}

impl PartialOrd for Term {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Term {
    /// The canonical total term order:
    /// number < bool < atom < ref < port < pid < tuple < map < nil <
    /// string < list < binary < trace < var. Within a kind the natural
    /// order applies; integers and floats compare by promoted value, with
    /// an exact tie ordering the integer first so the order stays
    /// consistent with structural equality.
    fn cmp(&self, other: &Self) -> Ordering {
        use Term::*;

        match (self, other) {
            (Long(a), Long(b)) => a.cmp(b),
            (Double(a), Double(b)) => a.total_cmp(b),
            (Long(a), Double(b)) => (*a as f64).total_cmp(b).then(Ordering::Less),
            (Double(a), Long(b)) => a.total_cmp(&(*b as f64)).then(Ordering::Greater),
            (Bool(a), Bool(b)) => a.cmp(b),
            (Atom(a), Atom(b)) => a.cmp(b),
            (Ref(a), Ref(b)) => a.cmp(b),
            (Port(a), Port(b)) => a.cmp(b),
            (Pid(a), Pid(b)) => a.cmp(b),
            (Tuple(a), Tuple(b)) => a.iter().cmp(b.iter()),
            (Map(a), Map(b)) => a
                .entries
                .len()
                .cmp(&b.entries.len())
                .then_with(|| a.entries.iter().cmp(b.entries.iter())),
            (List(a), List(b)) => match (a.is_nil(), b.is_nil()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                (false, false) => a
                    .elems
                    .len()
                    .cmp(&b.elems.len())
                    .then_with(|| a.elems.iter().cmp(b.elems.iter()))
                    .then_with(|| a.tail.as_ref().cmp(&b.tail.as_ref())),
            },
            (String(a), String(b)) => a.cmp(b),
            (Binary(a), Binary(b)) => a.cmp(b),
            (Trace(a), Trace(b)) => a.cmp(b),
            (Var(a), Var(b)) => a.cmp(b),
            (Undefined, Undefined) => Ordering::Equal,
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl From<i64> for Term {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}

impl From<i32> for Term {
    fn from(v: i32) -> Self {
        Self::Long(v.into())
    }
}

impl From<f64> for Term {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<bool> for Term {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<Atom> for Term {
    fn from(v: Atom) -> Self {
        Self::Atom(v)
    }
}

impl From<&str> for Term {
    fn from(v: &str) -> Self {
        Self::string(v)
    }
}

impl From<Pid> for Term {
    fn from(v: Pid) -> Self {
        Self::Pid(Arc::new(v))
    }
}

impl From<Port> for Term {
    fn from(v: Port) -> Self {
        Self::Port(Arc::new(v))
    }
}

impl From<Ref> for Term {
    fn from(v: Ref) -> Self {
        Self::Ref(Arc::new(v))
    }
}

impl From<Trace> for Term {
    fn from(v: Trace) -> Self {
        Self::Trace(Arc::new(v))
    }
}

impl From<Var> for Term {
    fn from(v: Var) -> Self {
        Self::Var(Arc::new(v))
    }
}

fn atom_needs_quotes(name: &str) -> bool {
    match name.chars().next() {
        None => true,
        Some(first) => !first.is_ascii_lowercase() || name.contains(' '),
    }
}

fn fmt_quoted(f: &mut fmt::Formatter<'_>, quote: char, body: &str) -> fmt::Result {
    write!(f, "{quote}")?;
    for ch in body.chars() {
        match ch {
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c if c == quote => write!(f, "\\{quote}")?,
            c => write!(f, "{c}")?,
        }
    }
    write!(f, "{quote}")
}

fn fmt_double(f: &mut fmt::Formatter<'_>, v: f64) -> fmt::Result {
    // Shortest representation that round-trips, with a forced decimal
    // point on integral values.
    if v.is_finite() && v == v.trunc() && v.abs() < 1e16 {
        write!(f, "{v:.1}")
    } else {
        write!(f, "{v}")
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Long(v) => write!(f, "{v}"),
            Self::Double(v) => fmt_double(f, *v),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Atom(a) => {
                let name = a.name();
                if atom_needs_quotes(&name) {
                    fmt_quoted(f, '\'', &name)
                } else {
                    f.write_str(&name)
                }
            }
            Self::String(s) => fmt_quoted(f, '"', s),
            Self::Binary(b) => {
                f.write_str("<<")?;
                if !b.is_empty() && b.iter().all(|c| (0x20..=0x7e).contains(c)) {
                    let text: String = b.iter().map(|&c| c as char).collect();
                    fmt_quoted(f, '"', &text)?;
                } else {
                    for (i, byte) in b.iter().enumerate() {
                        if i > 0 {
                            f.write_str(",")?;
                        }
                        write!(f, "{byte}")?;
                    }
                }
                f.write_str(">>")
            }
            Self::Pid(p) => write!(f, "{p}"),
            Self::Port(p) => write!(f, "{p}"),
            Self::Ref(r) => write!(f, "{r}"),
            Self::Tuple(elems) => {
                f.write_str("{")?;
                for (i, e) in elems.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{e}")?;
                }
                f.write_str("}")
            }
            Self::List(l) => {
                f.write_str("[")?;
                for (i, e) in l.elems.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{e}")?;
                }
                if let Some(tail) = &l.tail {
                    write!(f, "|{tail}")?;
                }
                f.write_str("]")
            }
            Self::Map(m) => {
                f.write_str("#{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{k} => {v}")?;
                }
                f.write_str("}")
            }
            Self::Trace(t) => write!(f, "{t}"),
            Self::Var(v) => {
                write!(f, "{}", v.name)?;
                if let Some(hint) = v.hint {
                    write!(f, "::{}()", hint.name())?;
                }
                Ok(())
            }
        }
    }
}

/// Incremental assembly of a fixed-arity tuple. The result only becomes a
/// [`Term`] once exactly `arity` elements have been pushed.
#[derive(Debug)]
pub struct TupleBuilder {
    arity: usize,
    elems: Vec<Term>,
}

impl TupleBuilder {
    #[must_use]
    pub fn new(arity: usize) -> Self {
        Self {
            arity,
            elems: Vec::with_capacity(arity),
        }
    }

    pub fn push(&mut self, term: Term) -> Result<(), Error> {
        if self.elems.len() == self.arity {
            return Err(Error::bad_arg(format!(
                "tuple already holds all {} elements",
                self.arity
            )));
        }
        self.elems.push(term);
        Ok(())
    }

    pub fn finish(self) -> Result<Term, Error> {
        if self.elems.len() != self.arity {
            return Err(Error::bad_arg(format!(
                "tuple holds {} of {} elements",
                self.elems.len(),
                self.arity
            )));
        }
        Ok(Term::Tuple(Arc::from(self.elems)))
    }
}

/// Incremental assembly of a list. The body is unobservable until one of
/// the close operations produces the [`Term`].
#[derive(Debug, Default)]
pub struct ListBuilder {
    elems: Vec<Term>,
}

impl ListBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_elems(elems: Vec<Term>) -> Self {
        Self { elems }
    }

    pub fn push(&mut self, term: Term) {
        self.elems.push(term);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.elems.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    /// Closes as a proper list.
    #[must_use]
    pub fn close(self) -> Term {
        Term::List(Arc::new(List {
            elems: self.elems,
            tail: None,
        }))
    }

    /// Closes with an explicit tail, splicing proper-list tails so cons
    /// semantics hold: `[a|[b]]` is `[a,b]`, `[a|b]` stays improper, and
    /// with no elements the tail itself is the result.
    #[must_use]
    pub fn close_with_tail(mut self, tail: Term) -> Term {
        match tail {
            Term::List(l) => {
                self.elems.extend(l.elements().iter().cloned());
                Term::List(Arc::new(List {
                    elems: self.elems,
                    tail: l.tail().cloned(),
                }))
            }
            t if self.elems.is_empty() => t,
            t => Term::List(Arc::new(List {
                elems: self.elems,
                tail: Some(t),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atom(name: &str) -> Term {
        Term::atom(name).unwrap()
    }

    #[test]
    fn default_term_is_uninitialized() {
        let t = Term::default();
        assert_eq!(t.kind(), TermKind::Undefined);
        assert!(!t.is_initialized());
        assert_eq!(t, Term::Undefined);
        assert_ne!(t, Term::Long(0));
    }

    #[test]
    fn scalar_equality_is_bitwise() {
        assert_eq!(Term::Long(5), Term::Long(5));
        assert_ne!(Term::Long(1), Term::Double(1.0));
        assert_eq!(Term::Double(f64::NAN), Term::Double(f64::NAN));
        assert_ne!(Term::Double(0.0), Term::Double(-0.0));
    }

    #[test]
    fn wrong_type_accessor() {
        let t = Term::Long(3);
        assert_eq!(t.to_long().unwrap(), 3);
        assert_eq!(
            t.to_bool(),
            Err(Error::WrongType {
                expected: TermKind::Bool,
                actual: TermKind::Long
            })
        );
    }

    #[test]
    fn cross_kind_order() {
        let seq = vec![
            Term::Long(99),
            Term::Bool(false),
            atom("zebra"),
            Term::from(Ref::new("a@h", &[1], 0).unwrap()),
            Term::from(Port::new("a@h", 1, 0).unwrap()),
            Term::from(Pid::new("a@h", 1, 1, 0).unwrap()),
            Term::tuple(vec![Term::Long(1)]),
            Term::map(Map::from_pairs([(Term::Long(1), Term::Long(2))])),
            Term::nil(),
            Term::string("a"),
            Term::list(vec![Term::Long(1)]),
            Term::binary(b"a"),
        ];
        for pair in seq.windows(2) {
            assert!(pair[0] < pair[1], "{} !< {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn numeric_order_promotes() {
        assert!(Term::Long(1) < Term::Double(1.5));
        assert!(Term::Double(0.5) < Term::Long(1));
        assert!(Term::Long(2) > Term::Double(1.5));
        // Exact ties put the integer first, keeping the order total.
        assert!(Term::Long(1) < Term::Double(1.0));
        assert!(Term::Double(1.0) > Term::Long(1));
    }

    #[test]
    fn tuple_order_is_elementwise() {
        let a = Term::tuple(vec![Term::Long(1), Term::Long(2)]);
        let b = Term::tuple(vec![Term::Long(1), Term::Long(3)]);
        let c = Term::tuple(vec![Term::Long(1)]);
        assert!(a < b);
        assert!(c < a);
    }

    #[test]
    fn list_order_is_size_then_elementwise() {
        let short = Term::list(vec![Term::Long(9)]);
        let long = Term::list(vec![Term::Long(1), Term::Long(1)]);
        assert!(short < long);
        let a = Term::list(vec![Term::Long(1), Term::Long(2)]);
        let b = Term::list(vec![Term::Long(1), Term::Long(3)]);
        assert!(a < b);
    }

    #[test]
    fn map_keys_sort_and_collapse() {
        let mut m = Map::new();
        m.insert(atom("b"), Term::Long(1));
        m.insert(atom("a"), Term::Long(2));
        m.insert(atom("b"), Term::Long(3));
        assert_eq!(m.len(), 2);
        let keys: Vec<String> = m.iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(keys, ["a", "b"]);
        assert_eq!(m.get(&atom("b")), Some(&Term::Long(3)));
    }

    #[test]
    fn tuple_builder_enforces_arity() {
        let mut b = TupleBuilder::new(2);
        b.push(Term::Long(1)).unwrap();
        let incomplete = TupleBuilder::new(2);
        assert!(incomplete.finish().is_err());
        b.push(Term::Long(2)).unwrap();
        let t = b.finish().unwrap();
        assert_eq!(t.as_tuple().unwrap().len(), 2);
    }

    #[test]
    fn cons_splices_proper_tails() {
        let t = Term::list_with_tail(
            vec![Term::Long(1)],
            Term::list(vec![Term::Long(2), Term::Long(3)]),
        );
        let l = t.as_list().unwrap();
        assert!(l.is_proper());
        assert_eq!(l.len(), 3);

        let improper = Term::list_with_tail(vec![Term::Long(1)], atom("x"));
        let l = improper.as_list().unwrap();
        assert!(!l.is_proper());
        assert_eq!(improper.to_string(), "[1|x]");

        let bare = Term::list_with_tail(vec![], atom("x"));
        assert_eq!(bare, atom("x"));
    }

    #[test]
    fn printing_matches_canonical_text() {
        assert_eq!(atom("abc").to_string(), "abc");
        assert_eq!(atom("Big").to_string(), "'Big'");
        assert_eq!(atom("two words").to_string(), "'two words'");
        assert_eq!(Term::Bool(true).to_string(), "true");
        assert_eq!(Term::string("x").to_string(), "\"x\"");
        assert_eq!(Term::binary(b"abc").to_string(), "<<\"abc\">>");
        assert_eq!(Term::binary(&[1, 2, 3]).to_string(), "<<1,2,3>>");
        assert_eq!(Term::binary(&[]).to_string(), "<<>>");
        assert_eq!(
            Term::tuple(vec![atom("abc"), atom("efg")]).to_string(),
            "{abc,efg}"
        );
        assert_eq!(Term::nil().to_string(), "[]");
        assert_eq!(
            Term::list(vec![Term::Long(1), Term::Long(2)]).to_string(),
            "[1,2]"
        );
        assert_eq!(Term::Double(1.0).to_string(), "1.0");
        assert_eq!(Term::Double(1.25).to_string(), "1.25");
        let m = Map::from_pairs([(Term::Long(1), Term::Long(2)), (atom("a"), Term::Long(3))]);
        assert_eq!(Term::map(m).to_string(), "#{1 => 2,a => 3}");
        let v = Var::with_hint(Atom::new("A").unwrap(), TermKind::Long);
        assert_eq!(Term::var(v).to_string(), "A::int()");
    }
}
