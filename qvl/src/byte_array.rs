//! Fixed-size byte array newtypes for measurement and identifier fields.
//!
//! Mirrors the `ByteArray` trait convention used across the quote formats:
//! a `#[repr(transparent)]` wrapper around `[u8; N]` with hex `Display`,
//! `Debug`, and (de)serialization from hex strings.

use std::{array::TryFromSliceError, fmt};

use ref_cast::RefCast;

use crate::hex::{self, DecodeError, HexDisplay};

/// A type represented in memory as a fixed-size byte array.
pub trait ByteArray<const N: usize>:
    Copy + fmt::Debug + Eq + std::hash::Hash + RefCast<From = [u8; N]> + Sized
{
    fn from_array(array: [u8; N]) -> Self;
    fn to_array(&self) -> [u8; N];
    fn as_array(&self) -> &[u8; N];

    fn from_array_ref(array: &[u8; N]) -> &Self {
        Self::ref_cast(array)
    }
    fn as_slice(&self) -> &[u8] {
        self.as_array().as_slice()
    }
    fn try_from_slice(slice: &[u8]) -> Result<Self, TryFromSliceError> {
        <[u8; N]>::try_from(slice).map(Self::from_array)
    }
    fn hex_display(&self) -> HexDisplay<'_> {
        hex::display(self.as_slice())
    }
    fn try_from_hexstr(s: &str) -> Result<Self, DecodeError> {
        let mut out = [0u8; N];
        hex::decode_to_slice(s, &mut out)?;
        Ok(Self::from_array(out))
    }
}

macro_rules! define_byte_array {
    ($name:ident, $n:expr, $doc:expr) => {
        #[doc = $doc]
        #[derive(Copy, Clone, Eq, PartialEq, Hash, RefCast)]
        #[repr(transparent)]
        pub struct $name(pub [u8; $n]);

        impl $name {
            pub const LEN: usize = $n;

            pub const fn new(bytes: [u8; $n]) -> Self {
                Self(bytes)
            }
        }

        impl ByteArray<$n> for $name {
            fn from_array(array: [u8; $n]) -> Self {
                Self(array)
            }
            fn to_array(&self) -> [u8; $n] {
                self.0
            }
            fn as_array(&self) -> &[u8; $n] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.hex_display(), f)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}(\"{}\")", stringify!($name), self.hex_display())
            }
        }
    };
}

define_byte_array!(Measurement32, 32, "A 32-byte measurement (MRENCLAVE, MRSIGNER, SEV-SNP family-id).");
define_byte_array!(Measurement48, 48, "A 48-byte measurement (MRTD, MRSEAM, RTMR, SEV-SNP measurement).");
define_byte_array!(Fmspc, 6, "Family-Model-Stepping-Platform-Customization identifier.");
define_byte_array!(CpuSvn, 16, "Platform CPU SVN vector.");
define_byte_array!(ReportData64, 64, "A 64-byte report_data field.");
define_byte_array!(ChipId, 64, "AMD SEV-SNP chip identifier.");
