use num_enum::TryFromPrimitive;

/// The version byte prefixed to every top-level term on the wire. Nested
/// terms never carry it.
pub const VERSION: u8 = 131;

/// External term format opcodes.
///
/// The decoder accepts every listed tag; the encoder emits the narrowest
/// fit and, for pids, ports, and references, the canonical newer variants
/// with full-width creation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum Tag {
    NewFloat = 70,
    NewPid = 88,
    NewPort = 89,
    NewerRef = 90,
    SmallInteger = 97,
    Integer = 98,
    Float = 99,
    Atom = 100,
    Ref = 101,
    Port = 102,
    Pid = 103,
    SmallTuple = 104,
    LargeTuple = 105,
    Nil = 106,
    String = 107,
    List = 108,
    Binary = 109,
    SmallBig = 110,
    LargeBig = 111,
    NewRef = 114,
    SmallAtom = 115,
    Map = 116,
    AtomUtf8 = 118,
    SmallAtomUtf8 = 119,
}

#[test]
fn test_tag_from_byte() {
    assert_eq!(Tag::try_from(106u8), Ok(Tag::Nil));
    assert_eq!(Tag::try_from(97u8), Ok(Tag::SmallInteger));
    assert!(Tag::try_from(0u8).is_err());
}
