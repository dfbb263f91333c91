use crate::bytes::Writer;
use crate::error::Error;
use crate::ident::Pid;
use crate::term::{List, Term};
use crate::trace::Trace;

use super::tag::{Tag, VERSION};

/// Longest string payload the dedicated string opcode can carry; longer
/// strings fall back to a list of character codes.
const MAX_STRING_EXT: usize = u16::MAX as usize;

/// Encodes one term with the version byte prefixed.
///
/// `Var` and `Undefined` terms are not wire values and fail with
/// [`Error::Encode`].
pub fn encode(term: &Term) -> Result<Vec<u8>, Error> {
    let mut w = Writer::with_capacity(encode_size(term)? + 1);
    w.put_u8(VERSION);
    write_term(term, &mut w);
    Ok(w.into_vec())
}

/// The exact number of bytes [`encode`] will emit for `term`, excluding
/// the version byte.
pub fn encode_size(term: &Term) -> Result<usize, Error> {
    match term {
        Term::Undefined => Err(Error::Encode("cannot encode an undefined term".into())),
        Term::Var(_) => Err(Error::Encode("cannot encode a pattern variable".into())),
        Term::Long(v) => Ok(long_size(*v)),
        Term::Double(_) => Ok(9),
        Term::Bool(v) => Ok(atom_size(if *v { 4 } else { 5 })),
        Term::Atom(a) => Ok(atom_size(a.name().len())),
        Term::String(s) => {
            let bytes = s.len();
            if bytes <= MAX_STRING_EXT {
                Ok(3 + bytes)
            } else {
                Ok(5 + s.chars().map(|c| long_size(i64::from(u32::from(c)))).sum::<usize>() + 1)
            }
        }
        Term::Binary(b) => Ok(5 + b.len()),
        Term::Pid(p) => Ok(1 + atom_size(p.node().name().len()) + 12),
        Term::Port(p) => Ok(1 + atom_size(p.node().name().len()) + 8),
        Term::Ref(r) => Ok(3 + atom_size(r.node().name().len()) + 4 + 4 * r.ids().len()),
        Term::Tuple(elems) => {
            let header = if elems.len() <= u8::MAX as usize { 2 } else { 5 };
            sum_sizes(elems.iter(), header)
        }
        Term::List(l) => {
            if l.is_nil() {
                return Ok(1);
            }
            let body = sum_sizes(l.elements().iter(), 5)?;
            let tail = match l.tail() {
                None => 1,
                Some(t) => encode_size(t)?,
            };
            Ok(body + tail)
        }
        Term::Map(m) => {
            let mut total = 5;
            for (k, v) in m.iter() {
                total += encode_size(k)? + encode_size(v)?;
            }
            Ok(total)
        }
        Term::Trace(t) => Ok(2 + trace_body_size(t)),
    }
}

fn sum_sizes<'a>(
    elems: impl Iterator<Item = &'a Term>,
    header: usize,
) -> Result<usize, Error> {
    let mut total = header;
    for e in elems {
        total += encode_size(e)?;
    }
    Ok(total)
}

fn long_size(v: i64) -> usize {
    if (0..=255).contains(&v) {
        2
    } else if i32::try_from(v).is_ok() {
        5
    } else {
        3 + big_digits(v.unsigned_abs()).1
    }
}

fn atom_size(name_len: usize) -> usize {
    2 + name_len
}

fn trace_body_size(t: &Trace) -> usize {
    long_size(i64::from(t.flags().bits()))
        + long_size(t.label())
        + long_size(t.serial())
        + 1
        + atom_size(t.from().node().name().len())
        + 12
        + long_size(t.prev())
}

/// Little-endian magnitude digits and their count.
fn big_digits(mut magnitude: u64) -> ([u8; 8], usize) {
    let mut digits = [0u8; 8];
    let mut n = 0;
    while magnitude > 0 {
        digits[n] = (magnitude & 0xff) as u8;
        magnitude >>= 8;
        n += 1;
    }
    (digits, n)
}

/// Emits one unprefixed term. Callers validate the term tree with
/// [`encode_size`] first; every arm here is infallible.
pub(crate) fn write_term(term: &Term, w: &mut Writer) {
    match term {
        // Unreachable after the encode_size pass; emitted as the empty
        // atom to keep this path total.
        Term::Undefined | Term::Var(_) => write_atom_name("", w),
        Term::Long(v) => write_long(*v, w),
        Term::Double(v) => {
            w.put_u8(Tag::NewFloat as u8);
            w.put_f64(*v);
        }
        Term::Bool(v) => write_atom_name(if *v { "true" } else { "false" }, w),
        Term::Atom(a) => write_atom_name(&a.name(), w),
        Term::String(s) => {
            if s.len() <= MAX_STRING_EXT {
                w.put_u8(Tag::String as u8);
                w.put_u16(s.len() as u16);
                w.put_slice(s.as_bytes());
            } else {
                w.put_u8(Tag::List as u8);
                w.put_u32(s.chars().count() as u32);
                for c in s.chars() {
                    write_long(i64::from(u32::from(c)), w);
                }
                w.put_u8(Tag::Nil as u8);
            }
        }
        Term::Binary(b) => {
            w.put_u8(Tag::Binary as u8);
            w.put_u32(b.len() as u32);
            w.put_slice(b);
        }
        Term::Pid(p) => write_pid(p, w),
        Term::Port(p) => {
            w.put_u8(Tag::NewPort as u8);
            write_atom_name(&p.node().name(), w);
            w.put_u32(p.id());
            w.put_u32(p.creation());
        }
        Term::Ref(r) => {
            w.put_u8(Tag::NewerRef as u8);
            w.put_u16(r.ids().len() as u16);
            write_atom_name(&r.node().name(), w);
            w.put_u32(r.creation());
            for &id in r.ids() {
                w.put_u32(id);
            }
        }
        Term::Tuple(elems) => {
            write_tuple_header(elems.len(), w);
            for e in elems.iter() {
                write_term(e, w);
            }
        }
        Term::List(l) => write_list(l, w),
        Term::Map(m) => {
            w.put_u8(Tag::Map as u8);
            w.put_u32(m.len() as u32);
            for (k, v) in m.iter() {
                write_term(k, w);
                write_term(v, w);
            }
        }
        Term::Trace(t) => {
            write_tuple_header(5, w);
            write_long(i64::from(t.flags().bits()), w);
            write_long(t.label(), w);
            write_long(t.serial(), w);
            write_pid(t.from(), w);
            write_long(t.prev(), w);
        }
    }
}

fn write_tuple_header(arity: usize, w: &mut Writer) {
    if arity <= u8::MAX as usize {
        w.put_u8(Tag::SmallTuple as u8);
        w.put_u8(arity as u8);
    } else {
        w.put_u8(Tag::LargeTuple as u8);
        w.put_u32(arity as u32);
    }
}

fn write_long(v: i64, w: &mut Writer) {
    if (0..=255).contains(&v) {
        w.put_u8(Tag::SmallInteger as u8);
        w.put_u8(v as u8);
    } else if let Ok(small) = i32::try_from(v) {
        w.put_u8(Tag::Integer as u8);
        w.put_i32(small);
    } else {
        let (digits, n) = big_digits(v.unsigned_abs());
        w.put_u8(Tag::SmallBig as u8);
        w.put_u8(n as u8);
        w.put_u8(u8::from(v < 0));
        w.put_slice(&digits[..n]);
    }
}

fn write_atom_name(name: &str, w: &mut Writer) {
    // Interned names never exceed 255 bytes.
    w.put_u8(Tag::SmallAtom as u8);
    w.put_u8(name.len() as u8);
    w.put_slice(name.as_bytes());
}

fn write_pid(p: &Pid, w: &mut Writer) {
    w.put_u8(Tag::NewPid as u8);
    write_atom_name(&p.node().name(), w);
    w.put_u32(p.id());
    w.put_u32(p.serial());
    w.put_u32(p.creation());
}

fn write_list(l: &List, w: &mut Writer) {
    if l.is_nil() {
        w.put_u8(Tag::Nil as u8);
        return;
    }
    w.put_u8(Tag::List as u8);
    w.put_u32(l.elements().len() as u32);
    for e in l.elements() {
        write_term(e, w);
    }
    match l.tail() {
        None => w.put_u8(Tag::Nil as u8),
        Some(t) => write_term(t, w),
    }
}
