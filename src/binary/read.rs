#![allow(missing_docs)]

//! Parse binary data
//!
//! Everything in a layout table is read through two types. A `ReadScope` is a window onto the
//! table that can be re-based at an offset, which is how the offsets stored in the table are
//! followed. A `ReadCtxt` is a cursor that consumes big-endian values from a scope. Structures
//! describe how they are read by implementing `ReadBinary`, or `ReadBinaryDep` when they need
//! values read earlier (a value format, the units per em) to know their own shape.

use crate::binary::U16Be;
use crate::error::ParseError;
use crate::size;
use std::cmp;
use std::fmt;
use std::marker::PhantomData;

#[derive(Debug, Copy, Clone)]
pub struct ReadEof {}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ReadScope<'a> {
    base: usize,
    data: &'a [u8],
}

#[derive(Clone)]
pub struct ReadCtxt<'a> {
    scope: ReadScope<'a>,
    offset: usize,
}

pub trait ReadBinary {
    type HostType<'a>: Sized; // default = Self

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError>;
}

pub trait ReadBinaryDep {
    type Args<'a>: Copy;
    type HostType<'a>: Sized; // default = Self

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        args: Self::Args<'a>,
    ) -> Result<Self::HostType<'a>, ParseError>;
}

pub trait ReadFixedSizeDep: ReadBinaryDep {
    /// The number of bytes consumed by `ReadBinaryDep::read`.
    fn size(args: Self::Args<'_>) -> usize;
}

/// A value that is always encoded in exactly `SIZE` bytes.
pub trait ReadFixed {
    type HostType: Sized; // default = Self

    const SIZE: usize;

    /// Decode the value. `bytes` is always exactly `SIZE` bytes long.
    fn from_be_slice(bytes: &[u8]) -> Self::HostType;
}

pub trait ReadFrom {
    type ReadType: ReadFixed;
    fn read_from(value: <Self::ReadType as ReadFixed>::HostType) -> Self;
}

impl<T> ReadFixed for T
where
    T: ReadFrom,
{
    type HostType = T;

    const SIZE: usize = T::ReadType::SIZE;

    fn from_be_slice(bytes: &[u8]) -> T {
        T::read_from(T::ReadType::from_be_slice(bytes))
    }
}

impl<T> ReadBinary for T
where
    T: ReadFixed,
{
    type HostType<'a> = T::HostType;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        let bytes = ctxt.read_slice(T::SIZE)?;
        Ok(T::from_be_slice(bytes))
    }
}

impl<T> ReadBinaryDep for T
where
    T: ReadBinary,
{
    type Args<'a> = ();
    type HostType<'a> = T::HostType<'a>;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        (): Self::Args<'_>,
    ) -> Result<Self::HostType<'a>, ParseError> {
        T::read(ctxt)
    }
}

impl<T> ReadFixedSizeDep for T
where
    T: ReadFixed,
{
    fn size((): ()) -> usize {
        T::SIZE
    }
}

/// A lazily decoded array of fixed size items.
#[derive(Clone)]
pub struct ReadArray<'a, T: ReadFixedSizeDep> {
    scope: ReadScope<'a>,
    length: usize,
    stride: usize,
    args: T::Args<'a>,
}

pub struct ReadArrayIter<'a, T: ReadFixed> {
    data: &'a [u8],
    index: usize,
    length: usize,
    stride: usize,
    phantom: PhantomData<T>,
}

pub struct ReadArrayDepIter<'a, 'b, T: ReadFixedSizeDep> {
    array: &'b ReadArray<'a, T>,
    index: usize,
}

impl<'a> ReadScope<'a> {
    pub fn new(data: &'a [u8]) -> ReadScope<'a> {
        let base = 0;
        ReadScope { base, data }
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// The absolute position of this scope in the data it was created from.
    pub fn base(&self) -> usize {
        self.base
    }

    /// A scope starting `offset` bytes into this one.
    ///
    /// An offset past the end yields an empty scope, so reading from it fails with
    /// `ParseError::BadEof`.
    pub fn offset(&self, offset: usize) -> ReadScope<'a> {
        let base = self.base + offset;
        let data = self.data.get(offset..).unwrap_or(&[]);
        ReadScope { base, data }
    }

    pub fn offset_length(&self, offset: usize, length: usize) -> Result<ReadScope<'a>, ParseError> {
        if offset < self.data.len() || length == 0 {
            let data = self.data.get(offset..).unwrap_or(&[]);
            match data.get(..length) {
                Some(data) => Ok(ReadScope {
                    base: self.base + offset,
                    data,
                }),
                None => Err(ParseError::BadEof),
            }
        } else {
            Err(ParseError::BadOffset)
        }
    }

    pub fn ctxt(&self) -> ReadCtxt<'a> {
        ReadCtxt::new(*self)
    }

    pub fn read<T: ReadBinaryDep<Args<'a> = ()>>(&self) -> Result<T::HostType<'a>, ParseError> {
        self.ctxt().read::<T>()
    }

    pub fn read_dep<T: ReadBinaryDep>(
        &self,
        args: T::Args<'a>,
    ) -> Result<T::HostType<'a>, ParseError> {
        self.ctxt().read_dep::<T>(args)
    }
}

impl<'a> ReadCtxt<'a> {
    /// ReadCtxt is constructed by calling `ReadScope::ctxt`.
    fn new(scope: ReadScope<'a>) -> ReadCtxt<'a> {
        ReadCtxt { scope, offset: 0 }
    }

    pub fn check(&self, cond: bool) -> Result<(), ParseError> {
        match cond {
            true => Ok(()),
            false => Err(ParseError::BadValue),
        }
    }

    /// Check a sub-table format tag, returning `ParseError::BadFormat` if `false`.
    ///
    /// ```
    /// use allsorts_layout::binary::read::ReadScope;
    /// use allsorts_layout::error::ParseError;
    ///
    /// let scope = ReadScope::new(&[0, 3]);
    /// let mut ctxt = scope.ctxt();
    /// let format = ctxt.read_u16be().unwrap();
    ///
    /// assert!(ctxt.check_format(format, format == 3).is_ok());
    /// assert_eq!(ctxt.check_format(format, format == 1), Err(ParseError::BadFormat(3)));
    /// ```
    pub fn check_format(&self, format: u16, cond: bool) -> Result<(), ParseError> {
        match cond {
            true => Ok(()),
            false => Err(ParseError::BadFormat(format)),
        }
    }

    pub fn check_version(&self, cond: bool) -> Result<(), ParseError> {
        match cond {
            true => Ok(()),
            false => Err(ParseError::BadVersion),
        }
    }

    pub fn scope(&self) -> ReadScope<'a> {
        self.scope.offset(self.offset)
    }

    /// Absolute position of the cursor.
    pub fn position(&self) -> usize {
        self.scope.base + self.offset
    }

    pub fn read<T: ReadBinaryDep<Args<'a> = ()>>(&mut self) -> Result<T::HostType<'a>, ParseError> {
        T::read_dep(self, ())
    }

    pub fn read_dep<T: ReadBinaryDep>(
        &mut self,
        args: T::Args<'a>,
    ) -> Result<T::HostType<'a>, ParseError> {
        T::read_dep(self, args)
    }

    pub fn skip(&mut self, length: usize) -> Result<(), ReadEof> {
        self.read_slice(length).map(|_| ())
    }

    fn read_bytes<const N: usize>(&mut self) -> Result<[u8; N], ReadEof> {
        let mut bytes = [0; N];
        bytes.copy_from_slice(self.read_slice(N)?);
        Ok(bytes)
    }

    pub fn read_u16be(&mut self) -> Result<u16, ReadEof> {
        self.read_bytes().map(u16::from_be_bytes)
    }

    pub fn read_i16be(&mut self) -> Result<i16, ReadEof> {
        self.read_bytes().map(i16::from_be_bytes)
    }

    pub fn read_u32be(&mut self) -> Result<u32, ReadEof> {
        self.read_bytes().map(u32::from_be_bytes)
    }

    /// Read a 4-byte tag.
    pub fn read_tag(&mut self) -> Result<u32, ReadEof> {
        self.read_u32be()
    }

    pub fn read_array<T: ReadFixed>(
        &mut self,
        length: usize,
    ) -> Result<ReadArray<'a, T>, ParseError> {
        let byte_length = length.checked_mul(T::SIZE).ok_or(ParseError::BadValue)?;
        let scope = self.read_scope(byte_length)?;
        Ok(ReadArray {
            scope,
            length,
            stride: T::SIZE,
            args: (),
        })
    }

    /// Read an array of at most `length` items, stopping early if the data runs out.
    ///
    /// Some fonts (Mangal, for one) declare more class ranges than they contain.
    pub fn read_array_upto_hack<T: ReadFixed>(
        &mut self,
        length: usize,
    ) -> Result<ReadArray<'a, T>, ParseError> {
        let avail_bytes = self.scope.data.len().saturating_sub(self.offset);
        let max_length = avail_bytes / T::SIZE;
        self.read_array(cmp::min(length, max_length))
    }

    pub fn read_array_dep<T: ReadFixedSizeDep>(
        &mut self,
        length: usize,
        args: T::Args<'a>,
    ) -> Result<ReadArray<'a, T>, ParseError> {
        let stride = T::size(args);
        let byte_length = length.checked_mul(stride).ok_or(ParseError::BadValue)?;
        let scope = self.read_scope(byte_length)?;
        Ok(ReadArray {
            scope,
            length,
            stride,
            args,
        })
    }

    pub fn read_scope(&mut self, length: usize) -> Result<ReadScope<'a>, ReadEof> {
        match self.scope.offset_length(self.offset, length) {
            Ok(scope) => {
                self.offset += length;
                Ok(scope)
            }
            Err(_) => Err(ReadEof {}),
        }
    }

    pub fn read_slice(&mut self, length: usize) -> Result<&'a [u8], ReadEof> {
        let scope = self.read_scope(length)?;
        Ok(scope.data)
    }
}

impl<'a, T: ReadFixedSizeDep> ReadArray<'a, T> {
    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn read_item(&self, index: usize) -> Result<T::HostType<'a>, ParseError> {
        if index < self.length {
            let scope = self.scope.offset_length(index * self.stride, self.stride)?;
            T::read_dep(&mut scope.ctxt(), self.args)
        } else {
            Err(ParseError::BadIndex)
        }
    }

    pub fn get_item(&self, index: usize) -> Option<<T as ReadFixed>::HostType>
    where
        T: ReadFixed,
    {
        if index < self.length {
            let start = index * self.stride;
            let bytes = self.scope.data.get(start..start + T::SIZE)?;
            Some(T::from_be_slice(bytes))
        } else {
            None
        }
    }

    pub fn to_vec(&self) -> Vec<<T as ReadFixed>::HostType>
    where
        T: ReadFixed,
    {
        self.iter().collect()
    }

    pub fn read_to_vec(&self) -> Result<Vec<T::HostType<'a>>, ParseError> {
        self.iter_res().collect()
    }

    pub fn iter(&self) -> ReadArrayIter<'a, T>
    where
        T: ReadFixed,
    {
        ReadArrayIter {
            data: self.scope.data,
            index: 0,
            length: self.length,
            stride: self.stride,
            phantom: PhantomData,
        }
    }

    pub fn iter_res<'b>(&'b self) -> ReadArrayDepIter<'a, 'b, T> {
        ReadArrayDepIter {
            array: self,
            index: 0,
        }
    }
}

impl<'a, 'b, T: ReadFixed> IntoIterator for &'b ReadArray<'a, T> {
    type Item = T::HostType;
    type IntoIter = ReadArrayIter<'a, T>;
    fn into_iter(self) -> ReadArrayIter<'a, T> {
        self.iter()
    }
}

impl<'a, T: ReadFixed> Iterator for ReadArrayIter<'a, T> {
    type Item = T::HostType;

    fn next(&mut self) -> Option<T::HostType> {
        if self.index >= self.length {
            return None;
        }
        let start = self.index * self.stride;
        let bytes = self.data.get(start..start + T::SIZE)?;
        self.index += 1;
        Some(T::from_be_slice(bytes))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.length - self.index;
        (remaining, Some(remaining))
    }
}

impl<'a, T: ReadFixed> ExactSizeIterator for ReadArrayIter<'a, T> {}

impl<'a, 'b, T: ReadFixedSizeDep> Iterator for ReadArrayDepIter<'a, 'b, T> {
    type Item = Result<T::HostType<'a>, ParseError>;

    fn next(&mut self) -> Option<Result<T::HostType<'a>, ParseError>> {
        if self.index < self.array.len() {
            let result = self.array.read_item(self.index);
            self.index += 1;
            Some(result)
        } else {
            None
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.array.len().saturating_sub(self.index);
        (remaining, Some(remaining))
    }
}

impl ReadFixed for U16Be {
    type HostType = u16;

    const SIZE: usize = size::U16;

    fn from_be_slice(bytes: &[u8]) -> u16 {
        u16::from_be_bytes([bytes[0], bytes[1]])
    }
}

impl<T1, T2> ReadFixed for (T1, T2)
where
    T1: ReadFixed,
    T2: ReadFixed,
{
    type HostType = (T1::HostType, T2::HostType);

    const SIZE: usize = T1::SIZE + T2::SIZE;

    fn from_be_slice(bytes: &[u8]) -> Self::HostType {
        let (b1, b2) = bytes.split_at(T1::SIZE);
        (T1::from_be_slice(b1), T2::from_be_slice(b2))
    }
}

impl<T1, T2, T3> ReadFixed for (T1, T2, T3)
where
    T1: ReadFixed,
    T2: ReadFixed,
    T3: ReadFixed,
{
    type HostType = (T1::HostType, T2::HostType, T3::HostType);

    const SIZE: usize = T1::SIZE + T2::SIZE + T3::SIZE;

    fn from_be_slice(bytes: &[u8]) -> Self::HostType {
        let (b1, rest) = bytes.split_at(T1::SIZE);
        let (b2, b3) = rest.split_at(T2::SIZE);
        (
            T1::from_be_slice(b1),
            T2::from_be_slice(b2),
            T3::from_be_slice(b3),
        )
    }
}

impl<'a, T> fmt::Debug for ReadArray<'a, T>
where
    T: ReadFixedSizeDep,
    T::HostType<'a>: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        let mut list = f.debug_list();
        for item in self.iter_res() {
            list.entry(&item.map_err(|_| fmt::Error)?);
        }
        list.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_big_endian_values() {
        let data = [0x00, 0x2A, 0xFF, 0xFE, 0x6C, 0x61, 0x74, 0x6E, 0x01];
        let mut ctxt = ReadScope::new(&data).ctxt();
        assert_eq!(ctxt.read_u16be().unwrap(), 42);
        assert_eq!(ctxt.read_i16be().unwrap(), -2);
        assert_eq!(ctxt.read_tag().unwrap(), u32::from_be_bytes(*b"latn"));
        assert_eq!(ctxt.position(), 8);
        assert!(ctxt.read_u16be().is_err());
    }

    #[test]
    fn test_offset_past_end_is_empty() {
        let data = [0, 1, 0, 2];
        let scope = ReadScope::new(&data).offset(10);
        assert_eq!(scope.read::<U16Be>(), Err(ParseError::BadEof));
        assert_eq!(scope.base(), 10);
    }

    #[test]
    fn test_skip() {
        let data = [0, 1, 0, 2, 0, 3];
        let mut ctxt = ReadScope::new(&data).ctxt();
        ctxt.skip(4).unwrap();
        assert_eq!(ctxt.read_u16be().unwrap(), 3);
        assert!(ctxt.skip(1).is_err());
    }

    #[test]
    fn test_read_array_of_tuples() {
        let data = [0, 1, 0, 2, 0, 3, 0, 4, 0, 5, 0, 6];
        let mut ctxt = ReadScope::new(&data).ctxt();
        let array = ctxt.read_array::<(U16Be, U16Be, U16Be)>(2).unwrap();
        assert_eq!(array.to_vec(), vec![(1, 2, 3), (4, 5, 6)]);
        assert_eq!(array.get_item(2), None);
    }

    #[test]
    fn test_read_array_upto_hack() {
        let data = [0, 1, 0, 2, 0, 3];
        let mut ctxt = ReadScope::new(&data).ctxt();
        let array = ctxt.read_array_upto_hack::<U16Be>(100).unwrap();
        assert_eq!(array.len(), 3);
    }
}
