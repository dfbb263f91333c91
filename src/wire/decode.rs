use std::str;
use std::sync::Arc;

use crate::atom::{Atom, MAX_ATOM_LEN};
use crate::bytes::Cursor;
use crate::error::Error;
use crate::ident::{Pid, Port, Ref};
use crate::term::{ListBuilder, Map, Term, TupleBuilder};

use super::tag::{Tag, VERSION};

/// Decodes one version-prefixed term from the front of `buf`, returning the
/// term and the number of bytes consumed.
///
/// Decoding is all-or-nothing: on failure nothing escapes but the
/// [`Error::Decode`] describing where and why.
pub fn decode(buf: &[u8]) -> Result<(Term, usize), Error> {
    let mut cur = Cursor::new(buf);
    let version = cur.read_u8()?;
    if version != VERSION {
        return Err(Error::decode(format!("bad version byte {version}"), 0));
    }
    let term = decode_term(&mut cur)?;
    Ok((term, cur.position()))
}

/// Decodes one unprefixed (nested) term at the cursor.
pub fn decode_term(cur: &mut Cursor<'_>) -> Result<Term, Error> {
    let at = cur.position();
    let byte = cur.read_u8()?;
    let tag =
        Tag::try_from(byte).map_err(|_| Error::decode(format!("unknown tag {byte}"), at))?;
    match tag {
        Tag::SmallInteger => Ok(Term::Long(cur.read_u8()?.into())),
        Tag::Integer => Ok(Term::Long(cur.read_i32()?.into())),
        Tag::Float => read_old_float(cur),
        Tag::NewFloat => Ok(Term::Double(cur.read_f64()?)),
        Tag::Atom | Tag::AtomUtf8 => {
            let len = cur.read_u16()? as usize;
            read_atom_body(cur, len).map(atom_term)
        }
        Tag::SmallAtom | Tag::SmallAtomUtf8 => {
            let len = cur.read_u8()? as usize;
            read_atom_body(cur, len).map(atom_term)
        }
        Tag::SmallBig => {
            let n = cur.read_u8()? as usize;
            read_big(cur, n)
        }
        Tag::LargeBig => {
            let n = cur.read_u32()? as usize;
            read_big(cur, n)
        }
        Tag::String => read_string(cur),
        Tag::Binary => {
            let len = cur.read_u32()? as usize;
            Ok(Term::binary(cur.take(len)?))
        }
        Tag::SmallTuple => {
            let arity = cur.read_u8()? as usize;
            read_tuple(cur, arity)
        }
        Tag::LargeTuple => {
            let arity = cur.read_u32()? as usize;
            read_tuple(cur, arity)
        }
        Tag::Nil => Ok(Term::nil()),
        Tag::List => read_list(cur),
        Tag::Map => read_map(cur),
        Tag::Pid => {
            let node = read_atom(cur)?;
            let id = cur.read_u32()?;
            let serial = cur.read_u32()?;
            let creation = cur.read_u8()?.into();
            build(at, Pid::from_parts(node, id, serial, creation))
        }
        Tag::NewPid => {
            let node = read_atom(cur)?;
            let id = cur.read_u32()?;
            let serial = cur.read_u32()?;
            let creation = cur.read_u32()?;
            build(at, Pid::from_parts(node, id, serial, creation))
        }
        Tag::Port => {
            let node = read_atom(cur)?;
            let id = cur.read_u32()?;
            let creation = cur.read_u8()?.into();
            build(at, Port::from_parts(node, id, creation))
        }
        Tag::NewPort => {
            let node = read_atom(cur)?;
            let id = cur.read_u32()?;
            let creation = cur.read_u32()?;
            build(at, Port::from_parts(node, id, creation))
        }
        Tag::Ref => {
            let node = read_atom(cur)?;
            let id = cur.read_u32()?;
            let creation = cur.read_u8()?.into();
            build(at, Ref::from_parts(node, vec![id], creation))
        }
        Tag::NewRef => {
            let n = cur.read_u16()? as usize;
            let node = read_atom(cur)?;
            let creation = cur.read_u8()?.into();
            let ids = read_ref_ids(cur, n)?;
            build(at, Ref::from_parts(node, ids, creation))
        }
        Tag::NewerRef => {
            let n = cur.read_u16()? as usize;
            let node = read_atom(cur)?;
            let creation = cur.read_u32()?;
            let ids = read_ref_ids(cur, n)?;
            build(at, Ref::from_parts(node, ids, creation))
        }
    }
}

/// Maps a constructor failure (bad node name, id arity) onto a decode
/// error anchored at the term's tag byte.
fn build<T: Into<Term>>(at: usize, parts: Result<T, Error>) -> Result<Term, Error> {
    parts.map(Into::into).map_err(|e| Error::decode(e.to_string(), at))
}

fn atom_term(atom: Atom) -> Term {
    match &*atom.name() {
        "true" => Term::Bool(true),
        "false" => Term::Bool(false),
        _ => Term::Atom(atom),
    }
}

fn read_atom_body(cur: &mut Cursor<'_>, len: usize) -> Result<Atom, Error> {
    let at = cur.position();
    if len > MAX_ATOM_LEN {
        return Err(Error::decode(format!("atom name of {len} bytes"), at));
    }
    let bytes = cur.take(len)?;
    let name =
        str::from_utf8(bytes).map_err(|_| Error::decode("atom name is not utf-8", at))?;
    Atom::new(name)
}

/// Reads a nested term that must be an atom (pid/port/ref node fields).
fn read_atom(cur: &mut Cursor<'_>) -> Result<Atom, Error> {
    let at = cur.position();
    let byte = cur.read_u8()?;
    let len = match Tag::try_from(byte) {
        Ok(Tag::Atom | Tag::AtomUtf8) => cur.read_u16()? as usize,
        Ok(Tag::SmallAtom | Tag::SmallAtomUtf8) => cur.read_u8()? as usize,
        _ => return Err(Error::decode(format!("expected an atom, found tag {byte}"), at)),
    };
    read_atom_body(cur, len)
}

fn read_ref_ids(cur: &mut Cursor<'_>, n: usize) -> Result<Vec<u32>, Error> {
    let mut ids = Vec::with_capacity(n.min(4));
    for _ in 0..n {
        ids.push(cur.read_u32()?);
    }
    Ok(ids)
}

/// The 31-byte zero-padded `%.20e` ASCII float.
fn read_old_float(cur: &mut Cursor<'_>) -> Result<Term, Error> {
    let at = cur.position();
    let bytes = cur.take(31)?;
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    let text = str::from_utf8(&bytes[..end])
        .map_err(|_| Error::decode("float text is not ascii", at))?;
    let value: f64 = text
        .trim()
        .parse()
        .map_err(|_| Error::decode("malformed float text", at))?;
    Ok(Term::Double(value))
}

fn read_string(cur: &mut Cursor<'_>) -> Result<Term, Error> {
    let at = cur.position();
    let len = cur.read_u16()? as usize;
    let bytes = cur.take(len)?;
    let text =
        str::from_utf8(bytes).map_err(|_| Error::decode("string is not utf-8", at))?;
    Ok(Term::String(Arc::from(text)))
}

/// Big integers carry a little-endian magnitude; anything that does not fit
/// a 64-bit signed value is an overflow.
fn read_big(cur: &mut Cursor<'_>, n: usize) -> Result<Term, Error> {
    let at = cur.position();
    let sign = cur.read_u8()?;
    if sign > 1 {
        return Err(Error::decode(format!("bad big integer sign {sign}"), at));
    }
    let digits = cur.take(n)?;
    let mut magnitude: u64 = 0;
    for (i, &digit) in digits.iter().enumerate() {
        if digit != 0 {
            if i >= 8 {
                return Err(Error::decode("integer overflow", at));
            }
            magnitude |= u64::from(digit) << (8 * i);
        }
    }
    let value = if sign == 0 {
        i64::try_from(magnitude).map_err(|_| Error::decode("integer overflow", at))?
    } else if magnitude > 1 << 63 {
        return Err(Error::decode("integer overflow", at));
    } else {
        magnitude.wrapping_neg() as i64
    };
    Ok(Term::Long(value))
}

fn read_tuple(cur: &mut Cursor<'_>, arity: usize) -> Result<Term, Error> {
    if arity > cur.remaining() {
        return Err(cur.error(format!("tuple arity {arity} exceeds input")));
    }
    let mut tuple = TupleBuilder::new(arity);
    for _ in 0..arity {
        tuple.push(decode_term(cur)?)?;
    }
    tuple.finish()
}

fn read_map(cur: &mut Cursor<'_>) -> Result<Term, Error> {
    let arity = cur.read_u32()? as usize;
    if arity > cur.remaining() {
        return Err(cur.error(format!("map arity {arity} exceeds input")));
    }
    // The wire pairs need not arrive sorted; insertion sorts and the last
    // duplicate wins.
    let mut map = Map::new();
    for _ in 0..arity {
        let key = decode_term(cur)?;
        let value = decode_term(cur)?;
        map.insert(key, value);
    }
    Ok(Term::map(map))
}

fn read_list(cur: &mut Cursor<'_>) -> Result<Term, Error> {
    let n = cur.read_u32()? as usize;
    if n > cur.remaining() {
        return Err(cur.error(format!("list length {n} exceeds input")));
    }
    let mut list = ListBuilder::new();
    for _ in 0..n {
        list.push(decode_term(cur)?);
    }
    let tail = decode_term(cur)?;
    if tail.is_nil() {
        let elems = list.close();
        if let Some(text) = as_char_list(&elems, n) {
            return Ok(Term::String(Arc::from(text)));
        }
        return Ok(elems);
    }
    Ok(list.close_with_tail(tail))
}

/// A proper list of integers in 0..=255 (at most 65535 of them) is the
/// other wire spelling of a string.
fn as_char_list(term: &Term, n: usize) -> Option<String> {
    if n == 0 || n > usize::from(u16::MAX) {
        return None;
    }
    let list = term.as_list().ok()?;
    let mut text = String::with_capacity(n);
    for elem in list.elements() {
        match elem {
            Term::Long(v) if (0..=255).contains(v) => text.push(char::from(*v as u8)),
            _ => return None,
        }
    }
    Some(text)
}
