//! Scalar text decoders.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use oxide_express_path::parse_bool;

use super::BindError;

/// A value parsed from a single raw string.
///
/// Implement it for your own types to bind them from any scope:
///
/// ```
/// use oxide_express::bind::{BindError, TextDecode};
///
/// struct Level(u8);
///
/// impl TextDecode for Level {
///     const KIND: &'static str = "level";
///
///     fn decode_text(raw: &str) -> Result<Self, BindError> {
///         match raw {
///             "low" => Ok(Self(1)),
///             "high" => Ok(Self(9)),
///             _ => Err(BindError::decode(raw, Self::KIND)),
///         }
///     }
/// }
///
/// assert!(Level::decode_text("medium").is_err());
/// ```
///
/// Integers, floats, `bool`, `char` and the chrono types are built in.
/// Complex numbers are not, since std has none; bind them through your own
/// type:
///
/// ```
/// use oxide_express::bind::{BindError, TextDecode};
///
/// #[derive(Debug, PartialEq)]
/// struct Complex {
///     re: f64,
///     im: f64,
/// }
///
/// impl TextDecode for Complex {
///     const KIND: &'static str = "complex";
///
///     fn decode_text(raw: &str) -> Result<Self, BindError> {
///         let invalid = || BindError::decode(raw, Self::KIND);
///         let body = raw.strip_suffix('i').ok_or_else(invalid)?;
///         let split = body.rfind(['+', '-']).filter(|&i| i > 0).ok_or_else(invalid)?;
///         let re = body[..split].parse().map_err(|_| invalid())?;
///         let im = body[split..].trim_start_matches('+').parse().map_err(|_| invalid())?;
///         Ok(Self { re, im })
///     }
/// }
///
/// assert_eq!(Complex::decode_text("1.5-2i").unwrap(), Complex { re: 1.5, im: -2.0 });
/// assert!(Complex::decode_text("1.5").is_err());
/// ```
pub trait TextDecode: Sized + 'static {
    /// Name used in decode error messages.
    const KIND: &'static str;

    /// Parses `raw`.
    fn decode_text(raw: &str) -> Result<Self, BindError>;
}

macro_rules! from_str_decode {
    ($($ty:ty => $kind:literal),* $(,)?) => {
        $(
            impl TextDecode for $ty {
                const KIND: &'static str = $kind;

                fn decode_text(raw: &str) -> Result<Self, BindError> {
                    raw.parse().map_err(|_| BindError::decode(raw, Self::KIND))
                }
            }
        )*
    };
}

from_str_decode! {
    i8 => "i8",
    i16 => "i16",
    i32 => "i32",
    i64 => "i64",
    i128 => "i128",
    isize => "isize",
    u8 => "u8",
    u16 => "u16",
    u32 => "u32",
    u64 => "u64",
    u128 => "u128",
    usize => "usize",
    f32 => "f32",
    f64 => "f64",
    char => "char",
    NaiveDateTime => "time",
    NaiveDate => "date",
    NaiveTime => "time",
}

impl TextDecode for bool {
    const KIND: &'static str = "bool";

    fn decode_text(raw: &str) -> Result<Self, BindError> {
        parse_bool(raw).ok_or_else(|| BindError::decode(raw, Self::KIND))
    }
}

impl TextDecode for String {
    const KIND: &'static str = "string";

    fn decode_text(raw: &str) -> Result<Self, BindError> {
        Ok(raw.to_string())
    }
}

impl TextDecode for Box<str> {
    const KIND: &'static str = "string";

    fn decode_text(raw: &str) -> Result<Self, BindError> {
        Ok(raw.into())
    }
}

impl TextDecode for Box<[u8]> {
    const KIND: &'static str = "bytes";

    fn decode_text(raw: &str) -> Result<Self, BindError> {
        Ok(raw.as_bytes().into())
    }
}

/// RFC 3339, e.g. `2024-05-01T10:00:00Z`.
impl TextDecode for DateTime<FixedOffset> {
    const KIND: &'static str = "time";

    fn decode_text(raw: &str) -> Result<Self, BindError> {
        Self::parse_from_rfc3339(raw).map_err(|_| BindError::decode(raw, Self::KIND))
    }
}

impl TextDecode for DateTime<Utc> {
    const KIND: &'static str = "time";

    fn decode_text(raw: &str) -> Result<Self, BindError> {
        DateTime::<FixedOffset>::decode_text(raw).map(|t| t.with_timezone(&Utc))
    }
}
