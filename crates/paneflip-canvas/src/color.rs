#![forbid(unsafe_code)]

//! Opaque 24-bit colors.

use std::fmt;
use std::str::FromStr;

/// An RGB color. Alpha is implicitly `0xFF` wherever a color is stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const WHITE: Self = Self::rgb(0xFF, 0xFF, 0xFF);

    #[inline]
    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Byte layout of this color inside a canvas pixel unit.
    ///
    /// The framebuffer is little endian XRGB, so the bytes land as blue,
    /// green, red, then a constant opaque alpha.
    #[inline]
    #[must_use]
    pub const fn to_bgra(self) -> [u8; 4] {
        [self.b, self.g, self.r, 0xFF]
    }

    #[inline]
    #[must_use]
    pub const fn from_bgra(px: [u8; 4]) -> Self {
        Self::rgb(px[2], px[1], px[0])
    }
}

/// Error returned when a string is not of the form `#RRGGBB`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseColorError {
    /// The leading `#` is missing.
    MissingHash,
    /// Not exactly six characters after the `#`.
    BadLength(usize),
    /// A character after the `#` is not a hex digit.
    BadDigit(char),
}

impl fmt::Display for ParseColorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingHash => write!(f, "color must start with '#'"),
            Self::BadLength(n) => write!(f, "color needs 6 hex digits, got {n}"),
            Self::BadDigit(c) => write!(f, "invalid hex digit {c:?} in color"),
        }
    }
}

impl std::error::Error for ParseColorError {}

impl FromStr for Color {
    type Err = ParseColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix('#').ok_or(ParseColorError::MissingHash)?;
        let count = digits.chars().count();
        if count != 6 {
            return Err(ParseColorError::BadLength(count));
        }
        if let Some(bad) = digits.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(ParseColorError::BadDigit(bad));
        }
        // Six validated hex digits always fit.
        let packed = u32::from_str_radix(digits, 16).map_err(|_| ParseColorError::BadLength(count))?;
        Ok(Self::rgb(
            (packed >> 16) as u8,
            ((packed >> 8) & 0xFF) as u8,
            (packed & 0xFF) as u8,
        ))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}
