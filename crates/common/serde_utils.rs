//! Serde helpers for the hex encodings used by genesis files and state test tooling.
use serde::{Deserialize, Deserializer, Serializer, de::Error};

fn strip_0x(value: &str) -> &str {
    value.strip_prefix("0x").unwrap_or(value)
}

fn decode_hex_bytes<E: Error>(value: &str) -> Result<Vec<u8>, E> {
    crate::utils::decode_hex(value).map_err(|e| E::custom(e.to_string()))
}

pub mod u256 {
    use super::*;
    use ethereum_types::U256;

    pub(crate) fn parse<E: Error>(value: &str) -> Result<U256, E> {
        if value.starts_with("0x") {
            U256::from_str_radix(strip_0x(value), 16)
                .map_err(|_| E::custom("Failed to deserialize u256 value"))
        } else {
            U256::from_dec_str(value).map_err(|e| E::custom(e.to_string()))
        }
    }

    /// Accepts `0x` prefixed hex or decimal, writes `0x` prefixed hex.
    pub mod hex_or_dec_str {
        use super::*;

        pub fn deserialize<'de, D>(d: D) -> Result<U256, D::Error>
        where
            D: Deserializer<'de>,
        {
            parse(&String::deserialize(d)?)
        }

        pub fn serialize<S>(value: &U256, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            serializer.serialize_str(&format!("{value:#x}"))
        }
    }

    pub mod hex_str_opt {
        use super::*;
        use serde::Serialize;

        pub fn serialize<S>(value: &Option<U256>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            Option::<String>::serialize(&value.map(|v| format!("{v:#x}")), serializer)
        }

        pub fn deserialize<'de, D>(d: D) -> Result<Option<U256>, D::Error>
        where
            D: Deserializer<'de>,
        {
            match Option::<String>::deserialize(d)? {
                Some(s) if !s.is_empty() => parse(&s).map(Some),
                _ => Ok(None),
            }
        }
    }

    /// Storage maps keyed and valued by hex or decimal strings.
    pub mod storage_map {
        use super::*;
        use std::collections::BTreeMap;

        pub fn deserialize<'de, D>(d: D) -> Result<BTreeMap<U256, U256>, D::Error>
        where
            D: Deserializer<'de>,
        {
            BTreeMap::<String, String>::deserialize(d)?
                .into_iter()
                .map(|(key, value)| Ok((parse(&key)?, parse(&value)?)))
                .collect()
        }

        pub fn serialize<S>(value: &BTreeMap<U256, U256>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            use serde::ser::SerializeMap;
            let mut map = serializer.serialize_map(Some(value.len()))?;
            for (key, value) in value {
                map.serialize_entry(
                    &format!("0x{}", hex::encode(key.to_big_endian())),
                    &format!("0x{}", hex::encode(value.to_big_endian())),
                )?;
            }
            map.end()
        }
    }
}

macro_rules! quantity_module {
    ($name:ident, $ty:ty, $label:literal) => {
        pub mod $name {
            use super::*;

            pub(crate) fn parse<E: Error>(value: &str) -> Result<$ty, E> {
                let parsed = if value.starts_with("0x") {
                    <$ty>::from_str_radix(strip_0x(value), 16)
                } else {
                    value.parse()
                };
                parsed.map_err(|_| E::custom(concat!("Failed to deserialize ", $label, " value")))
            }

            /// Reads a hex string (decimal also accepted), writes `0x` prefixed hex.
            pub mod hex_str {
                use super::*;

                pub fn deserialize<'de, D>(d: D) -> Result<$ty, D::Error>
                where
                    D: Deserializer<'de>,
                {
                    let value = String::deserialize(d)?;
                    if value.starts_with("0x") {
                        parse(&value)
                    } else {
                        <$ty>::from_str_radix(&value, 16)
                            .map_err(|_| D::Error::custom(concat!("Failed to deserialize ", $label, " value")))
                    }
                }

                pub fn serialize<S>(value: &$ty, serializer: S) -> Result<S::Ok, S::Error>
                where
                    S: Serializer,
                {
                    serializer.serialize_str(&format!("{value:#x}"))
                }
            }

            pub mod hex_or_dec_str {
                use super::*;

                pub fn deserialize<'de, D>(d: D) -> Result<$ty, D::Error>
                where
                    D: Deserializer<'de>,
                {
                    parse(&String::deserialize(d)?)
                }

                pub fn serialize<S>(value: &$ty, serializer: S) -> Result<S::Ok, S::Error>
                where
                    S: Serializer,
                {
                    serializer.serialize_str(&format!("{value:#x}"))
                }
            }

            pub mod hex_str_opt {
                use super::*;
                use serde::Serialize;

                pub fn serialize<S>(value: &Option<$ty>, serializer: S) -> Result<S::Ok, S::Error>
                where
                    S: Serializer,
                {
                    Option::<String>::serialize(&value.map(|v| format!("{v:#x}")), serializer)
                }

                pub fn deserialize<'de, D>(d: D) -> Result<Option<$ty>, D::Error>
                where
                    D: Deserializer<'de>,
                {
                    match Option::<String>::deserialize(d)? {
                        Some(s) if !s.is_empty() => parse(&s).map(Some),
                        _ => Ok(None),
                    }
                }
            }
        }
    };
}

// The primitive path keeps the module name from shadowing the type
quantity_module!(u64, core::primitive::u64, "u64");

/// Serializes to and deserializes from 0x prefixed hex string
pub mod bytes {
    use super::*;
    use ::bytes::Bytes;

    pub fn deserialize<'de, D>(d: D) -> Result<Bytes, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(d)?;
        decode_hex_bytes(&value).map(Bytes::from)
    }

    pub fn serialize<S>(value: &Bytes, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("0x{}", hex::encode(value)))
    }
}

#[cfg(test)]
mod tests {
    use ::bytes::Bytes;
    use ethereum_types::U256;
    use serde::{Deserialize, Serialize};
    use std::collections::BTreeMap;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Quantities {
        #[serde(with = "super::u64::hex_or_dec_str")]
        nonce: u64,
        #[serde(with = "super::u256::hex_or_dec_str")]
        balance: U256,
        #[serde(default, with = "super::u64::hex_str_opt")]
        base_fee: Option<u64>,
        #[serde(with = "super::bytes")]
        code: Bytes,
        #[serde(default, with = "super::u256::storage_map")]
        storage: BTreeMap<U256, U256>,
    }

    #[test]
    fn hex_and_decimal_quantities() {
        let json = r#"{
            "nonce": "12",
            "balance": "0x0de0b6b3a7640000",
            "base_fee": "0x7",
            "code": "0x6001",
            "storage": {"0x01": "2"}
        }"#;
        let parsed: Quantities = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.nonce, 12);
        assert_eq!(parsed.balance, U256::exp10(18));
        assert_eq!(parsed.base_fee, Some(7));
        assert_eq!(parsed.code, Bytes::from_static(&[0x60, 0x01]));
        assert_eq!(parsed.storage.get(&U256::one()), Some(&U256::from(2)));

        let written = serde_json::to_value(&parsed).unwrap();
        assert_eq!(written["nonce"], "0xc");
        assert_eq!(written["balance"], "0xde0b6b3a7640000");
        let reparsed: Quantities = serde_json::from_value(written).unwrap();
        assert_eq!(reparsed, parsed);
    }

    #[test]
    fn missing_optional_quantity() {
        let json = r#"{"nonce": "0x0", "balance": "0", "code": "0x"}"#;
        let parsed: Quantities = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.base_fee, None);
        assert!(parsed.code.is_empty());
        assert!(parsed.storage.is_empty());
    }

    #[test]
    fn rejects_garbage() {
        let json = r#"{"nonce": "0xzz", "balance": "0", "code": "0x"}"#;
        assert!(serde_json::from_str::<Quantities>(json).is_err());
    }
}
