use std::fmt;
use std::ops::{Index, IndexMut};

/// A 4-bit unsigned integer (nibble).
///
/// Register indices and keypad keys are both nibbles.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[allow(non_camel_case_types)]
pub struct u4(u8);

impl u4 {
    /// Creates a new `u4` from a `u8`.
    ///
    /// Panics if the value is greater than 0x0F.
    pub const fn new(value: u8) -> Self {
        assert!(value <= 0x0F, "u4 value must be in range 0x0-0xF");
        Self(value)
    }

    /// Creates a `u4` from the low four bits of `value`.
    pub const fn from_low_bits(value: u16) -> Self {
        Self((value & 0x000F) as u8)
    }

    pub const fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for u4 {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value <= 0x0F { Ok(Self(value)) } else { Err(value) }
    }
}

impl From<u4> for usize {
    fn from(v: u4) -> usize {
        v.0 as usize
    }
}

impl From<u4> for u8 {
    fn from(v: u4) -> u8 {
        v.0
    }
}

impl fmt::LowerHex for u4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl<T> Index<u4> for [T; 16] {
    type Output = T;

    fn index(&self, index: u4) -> &Self::Output {
        &self[index.0 as usize]
    }
}

impl<T> IndexMut<u4> for [T; 16] {
    fn index_mut(&mut self, index: u4) -> &mut Self::Output {
        &mut self[index.0 as usize]
    }
}

/// A 12-bit unsigned integer, the width of an `nnn` address operand.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[allow(non_camel_case_types)]
pub struct u12(u16);

impl u12 {
    /// Creates a `u12` from the low twelve bits of `value`.
    pub const fn from_low_bits(value: u16) -> Self {
        Self(value & 0x0FFF)
    }

    pub const fn get(self) -> u16 {
        self.0
    }
}

impl From<u12> for u16 {
    fn from(v: u12) -> u16 {
        v.0
    }
}

impl fmt::LowerHex for u12 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nibble_conversions() {
        assert_eq!(u4::try_from(0x0F), Ok(u4::new(0xF)));
        assert_eq!(u4::try_from(0x10), Err(0x10));
        assert_eq!(u4::from_low_bits(0xABCD), u4::new(0xD));
        assert_eq!(format!("{:x}", u4::new(0xA)), "a");
    }

    #[test]
    fn address_keeps_low_twelve_bits() {
        let addr = u12::from_low_bits(0xF234);
        assert_eq!(addr.get(), 0x234);
        assert_eq!(format!("{addr:03x}"), "234");
        assert_eq!(format!("{:03x}", u12::from_low_bits(0x00A)), "00a");
    }
}
