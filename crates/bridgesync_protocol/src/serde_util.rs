//! Serde helpers for wire-compatible field encodings.

/// Serializes a `bool` as `0`/`1` and accepts integers, booleans, or the
/// strings `"0"`/`"1"` when deserializing.
///
/// The partner site exchanges preference flags as integers; locally they are
/// plain booleans.
pub mod bool_as_int {
    use serde::de::{self, Deserializer, Unexpected};
    use serde::Serializer;

    /// Serializes the flag as `0` or `1`.
    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }

    /// Deserializes from an integer, boolean, or numeric string.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        struct Visitor;

        impl serde::de::Visitor<'_> for Visitor {
            type Value = bool;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("0, 1, a boolean, or a numeric string")
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<bool, E> {
                Ok(v)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<bool, E> {
                Ok(v != 0)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<bool, E> {
                Ok(v != 0)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<bool, E> {
                match v {
                    "0" => Ok(false),
                    "1" => Ok(true),
                    _ => Err(E::invalid_value(Unexpected::Str(v), &self)),
                }
            }
        }

        deserializer.deserialize_any(Visitor)
    }
}
