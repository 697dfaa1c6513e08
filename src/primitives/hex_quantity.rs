use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serializer};

/// Integer fields are written as `0x`-prefixed hex quantities, the shape other
/// consensus clients use for `uint64` in JSON. Plain integers still decode.
#[derive(Deserialize)]
#[serde(untagged)]
enum Quantity {
    Number(u64),
    Text(String),
}

pub(crate) fn serialize<S>(value: &u64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format!("{value:#x}"))
}

pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match Quantity::deserialize(deserializer)? {
        Quantity::Number(value) => Ok(value),
        Quantity::Text(raw) => {
            let digits = raw
                .strip_prefix("0x")
                .or_else(|| raw.strip_prefix("0X"))
                .ok_or_else(|| {
                    D::Error::custom(format!("expected 0x-prefixed quantity, got {raw:?}"))
                })?;
            u64::from_str_radix(digits, 16)
                .map_err(|err| D::Error::custom(format!("invalid hex quantity {raw:?}: {err}")))
        }
    }
}
