use std::ops::RangeFrom;

use nom::bytes::complete::take;
use nom::error::{make_error, Error, ErrorKind, ParseError};
use nom::number::complete::{be_u16, be_u24, be_u8};
use nom::{Err, IResult, InputIter, InputLength, Parser, Slice};

/// Apply `f` until the input is exhausted, collecting into a Vec.
///
/// Unlike `nom::multi::many0` any error from `f` is propagated, since every
/// list in the TLS wire format is length delimited and must parse completely.
pub fn many0<'a, O, F>(mut f: F) -> impl FnMut(&'a [u8]) -> IResult<&'a [u8], Vec<O>>
where
    F: Parser<&'a [u8], O, Error<&'a [u8]>>,
{
    move |mut i: &'a [u8]| {
        let mut acc = Vec::new();
        while !i.is_empty() {
            let len = i.len();
            let (i1, o) = f.parse(i)?;

            // infinite loop check: the parser must always consume
            if i1.len() == len {
                return Err(Err::Error(Error::from_error_kind(i, ErrorKind::Many0)));
            }

            i = i1;
            acc.push(o);
        }
        Ok((i, acc))
    }
}

/// Like [`many0`] but requires at least one element.
pub fn many1<'a, O, F>(f: F) -> impl FnMut(&'a [u8]) -> IResult<&'a [u8], Vec<O>>
where
    F: Parser<&'a [u8], O, Error<&'a [u8]>>,
{
    let mut inner = many0(f);
    move |i: &'a [u8]| {
        let (rest, acc) = inner(i)?;
        if acc.is_empty() {
            return Err(Err::Error(Error::from_error_kind(i, ErrorKind::Many1)));
        }
        Ok((rest, acc))
    }
}

/// Run `f` over a sub slice and require it to consume everything.
pub fn all_consuming<'a, O, F>(mut f: F) -> impl FnMut(&'a [u8]) -> IResult<&'a [u8], O>
where
    F: Parser<&'a [u8], O, Error<&'a [u8]>>,
{
    move |i: &'a [u8]| {
        let (rest, o) = f.parse(i)?;
        if !rest.is_empty() {
            return Err(Err::Failure(Error::new(rest, ErrorKind::LengthValue)));
        }
        Ok((rest, o))
    }
}

/// Opaque vector with a one byte length prefix.
pub fn vec_u8(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let (input, len) = be_u8(input)?;
    take(len as usize)(input)
}

/// Opaque vector with a two byte length prefix.
pub fn vec_u16(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let (input, len) = be_u16(input)?;
    take(len as usize)(input)
}

/// Opaque vector with a three byte length prefix.
pub fn vec_u24(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let (input, len) = be_u24(input)?;
    take(len as usize)(input)
}

pub fn be_u48<I, E: ParseError<I>>(input: I) -> IResult<I, u64, E>
where
    I: Slice<RangeFrom<usize>> + InputIter<Item = u8> + InputLength,
{
    let bound: usize = 6;

    if input.input_len() < bound {
        Err(Err::Error(make_error(input, ErrorKind::Eof)))
    } else {
        let mut res = 0u64;

        for byte in input.iter_elements().take(bound) {
            res = (res << 8) + byte as u64;
        }

        Ok((input.slice(bound..), res))
    }
}
