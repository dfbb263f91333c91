use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use crate::error::Error;

/// Hard cap on the number of interned atoms for the lifetime of the process.
pub const MAX_ATOMS: usize = 1024 * 1024;

/// Longest allowed atom name, in bytes.
pub const MAX_ATOM_LEN: usize = 255;

/// A handle to an interned identifier: a dense index into the process-wide
/// atom table. Two atoms are equal iff their indices are equal; ordering is
/// lexicographic over the interned name.
///
/// Index 0 is the empty atom. Entries are never reclaimed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Atom(u32);

struct Table {
    names: Vec<Arc<str>>,
    index: HashMap<Arc<str>, u32>,
}

static TABLE: OnceLock<RwLock<Table>> = OnceLock::new();

fn table() -> &'static RwLock<Table> {
    TABLE.get_or_init(|| {
        let empty: Arc<str> = Arc::from("");
        let mut index = HashMap::new();
        index.insert(Arc::clone(&empty), 0);
        RwLock::new(Table {
            names: vec![empty],
            index,
        })
    })
}

impl Atom {
    /// The reserved empty atom.
    pub const EMPTY: Self = Self(0);

    /// Interns `name`, returning the existing handle when the name has been
    /// seen before. The empty name maps to index 0 without touching the
    /// table.
    ///
    /// Fails with [`Error::BadArgument`] for names over [`MAX_ATOM_LEN`]
    /// bytes and [`Error::TableFull`] once the table is saturated.
    pub fn new(name: &str) -> Result<Self, Error> {
        if name.is_empty() {
            return Ok(Self::EMPTY);
        }
        if name.len() > MAX_ATOM_LEN {
            return Err(Error::bad_arg(format!(
                "atom name is {} bytes, limit is {MAX_ATOM_LEN}",
                name.len()
            )));
        }
        {
            let t = table().read().unwrap_or_else(PoisonError::into_inner);
            if let Some(&ix) = t.index.get(name) {
                return Ok(Self(ix));
            }
        }
        let mut t = table().write().unwrap_or_else(PoisonError::into_inner);
        // A racing caller may have inserted the same name between the read
        // and write locks; the second check keeps indices unique.
        if let Some(&ix) = t.index.get(name) {
            return Ok(Self(ix));
        }
        if t.names.len() >= MAX_ATOMS {
            return Err(Error::TableFull);
        }
        let ix = t.names.len() as u32;
        let name: Arc<str> = Arc::from(name);
        t.names.push(Arc::clone(&name));
        t.index.insert(name, ix);
        Ok(Self(ix))
    }

    /// The dense table index behind this handle.
    #[must_use]
    pub fn index(self) -> u32 {
        self.0
    }

    /// The interned name.
    ///
    /// Panics on an index that never came out of [`Atom::new`]; such a
    /// handle cannot be constructed through the public API.
    #[must_use]
    pub fn name(self) -> Arc<str> {
        let t = table().read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&t.names[self.0 as usize])
    }

    #[must_use]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl PartialOrd for Atom {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Atom {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.0 == other.0 {
            return Ordering::Equal;
        }
        self.name().cmp(&other.name())
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

#[test]
fn test_intern_is_stable() {
    let a = Atom::new("zzz_stable").unwrap();
    let b = Atom::new("zzz_stable").unwrap();
    assert_eq!(a, b);
    assert_eq!(a.index(), b.index());
    assert_eq!(&*a.name(), "zzz_stable");
}

#[test]
fn test_empty_atom_is_index_zero() {
    assert_eq!(Atom::new("").unwrap().index(), 0);
    assert_eq!(Atom::EMPTY.index(), 0);
    assert_eq!(&*Atom::EMPTY.name(), "");
}

#[test]
fn test_distinct_names_distinct_indices() {
    let a = Atom::new("zzz_left").unwrap();
    let b = Atom::new("zzz_right").unwrap();
    assert_ne!(a.index(), b.index());
}

#[test]
fn test_name_too_long() {
    let long = "x".repeat(256);
    assert!(matches!(
        Atom::new(&long),
        Err(Error::BadArgument(_))
    ));
    assert!(Atom::new(&"x".repeat(255)).is_ok());
}

#[test]
fn test_ordering_is_lexicographic() {
    let a = Atom::new("zzz_apple").unwrap();
    let b = Atom::new("zzz_banana").unwrap();
    assert!(a < b);
    assert_eq!(a.cmp(&a), Ordering::Equal);
}

#[test]
fn test_racing_lookups_agree() {
    let handles: Vec<_> = (0..8)
        .map(|_| std::thread::spawn(|| Atom::new("zzz_raced").unwrap().index()))
        .collect();
    let indices: Vec<u32> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(indices.windows(2).all(|w| w[0] == w[1]));
}
