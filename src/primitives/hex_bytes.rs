use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serializer};

pub(crate) fn serialize<S, const N: usize>(bytes: &[u8; N], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
}

pub(crate) fn deserialize<'de, D, const N: usize>(deserializer: D) -> Result<[u8; N], D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let digits = raw.strip_prefix("0x").unwrap_or(&raw);
    let mut bytes = [0u8; N];
    hex::decode_to_slice(digits, &mut bytes).map_err(|err| {
        D::Error::custom(format!("expected {N} hex-encoded bytes, got {raw:?}: {err}"))
    })?;
    Ok(bytes)
}
