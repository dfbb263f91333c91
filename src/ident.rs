use std::fmt;

use crate::atom::Atom;
use crate::error::Error;

/// Pid and port id fields carry 28 significant bits.
pub(crate) const ID_MASK: u32 = 0x0fff_ffff;

/// A reference carries between one and three 32-bit id words.
pub const MAX_REF_IDS: usize = 3;

/// Checks that `node` names a node: 1..=255 bytes with an `@` separator.
fn check_node(node: Atom) -> Result<Atom, Error> {
    let name = node.name();
    if name.is_empty() || !name.contains('@') {
        return Err(Error::bad_arg(format!(
            "'{name}' is not a node name (expected name@host)"
        )));
    }
    Ok(node)
}

/// A process identifier: (node, id, serial, creation).
///
/// The id is masked to its low 28 bits at construction. Creation is kept at
/// full 32-bit width; legacy encodings that only have room for 2 bits mask
/// it on emission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pid {
    node: Atom,
    id: u32,
    serial: u32,
    creation: u32,
}

impl Pid {
    pub fn new(node: &str, id: u32, serial: u32, creation: u32) -> Result<Self, Error> {
        Self::from_parts(Atom::new(node)?, id, serial, creation)
    }

    pub fn from_parts(node: Atom, id: u32, serial: u32, creation: u32) -> Result<Self, Error> {
        Ok(Self {
            node: check_node(node)?,
            id: id & ID_MASK,
            serial,
            creation,
        })
    }

    #[must_use]
    pub fn node(&self) -> Atom {
        self.node
    }

    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[must_use]
    pub fn serial(&self) -> u32 {
        self.serial
    }

    #[must_use]
    pub fn creation(&self) -> u32 {
        self.creation
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#Pid<{}.{}.{}>", self.node, self.id, self.serial)
    }
}

/// A runtime-managed I/O endpoint identifier: (node, id, creation).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Port {
    node: Atom,
    id: u32,
    creation: u32,
}

impl Port {
    pub fn new(node: &str, id: u32, creation: u32) -> Result<Self, Error> {
        Self::from_parts(Atom::new(node)?, id, creation)
    }

    pub fn from_parts(node: Atom, id: u32, creation: u32) -> Result<Self, Error> {
        Ok(Self {
            node: check_node(node)?,
            id: id & ID_MASK,
            creation,
        })
    }

    #[must_use]
    pub fn node(&self) -> Atom {
        self.node
    }

    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[must_use]
    pub fn creation(&self) -> u32 {
        self.creation
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#Port<{}.{}>", self.node, self.id)
    }
}

/// A unique opaque token: (node, 1..=3 id words, creation).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ref {
    node: Atom,
    ids: Vec<u32>,
    creation: u32,
}

impl Ref {
    pub fn new(node: &str, ids: &[u32], creation: u32) -> Result<Self, Error> {
        Self::from_parts(Atom::new(node)?, ids.to_vec(), creation)
    }

    pub fn from_parts(node: Atom, ids: Vec<u32>, creation: u32) -> Result<Self, Error> {
        if ids.is_empty() || ids.len() > MAX_REF_IDS {
            return Err(Error::bad_arg(format!(
                "reference has {} id words, expected 1..={MAX_REF_IDS}",
                ids.len()
            )));
        }
        Ok(Self {
            node: check_node(node)?,
            ids,
            creation,
        })
    }

    #[must_use]
    pub fn node(&self) -> Atom {
        self.node
    }

    #[must_use]
    pub fn ids(&self) -> &[u32] {
        &self.ids
    }

    #[must_use]
    pub fn creation(&self) -> u32 {
        self.creation
    }
}

impl fmt::Display for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#Ref<{}", self.node)?;
        for id in &self.ids {
            write!(f, ".{id}")?;
        }
        f.write_str(">")
    }
}

#[test]
fn test_pid_masks_id() {
    let pid = Pid::new("a@h", 0xffff_ffff, 2, 3).unwrap();
    assert_eq!(pid.id(), ID_MASK);
    assert_eq!(pid.serial(), 2);
    assert_eq!(pid.creation(), 3);
}

#[test]
fn test_creation_keeps_full_width() {
    let pid = Pid::new("a@h", 1, 0, 0xdead_beef).unwrap();
    assert_eq!(pid.creation(), 0xdead_beef);
}

#[test]
fn test_node_name_requires_separator() {
    assert!(Pid::new("nohost", 1, 2, 3).is_err());
    assert!(Port::new("", 1, 0).is_err());
    assert!(Ref::new("ok@host", &[1], 0).is_ok());
}

#[test]
fn test_ref_id_arity() {
    assert!(Ref::new("a@h", &[], 0).is_err());
    assert!(Ref::new("a@h", &[1, 2, 3, 4], 0).is_err());
    assert!(Ref::new("a@h", &[1, 2, 3], 0).is_ok());
}

#[test]
fn test_display_forms() {
    let pid = Pid::new("a@h", 1, 2, 3).unwrap();
    assert_eq!(pid.to_string(), "#Pid<a@h.1.2>");
    let port = Port::new("a@h", 5, 0).unwrap();
    assert_eq!(port.to_string(), "#Port<a@h.5>");
    let r = Ref::new("a@h", &[7, 8], 0).unwrap();
    assert_eq!(r.to_string(), "#Ref<a@h.7.8>");
}
