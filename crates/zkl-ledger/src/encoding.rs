//! Serde helpers: byte strings travel as lowercase hex.

pub(crate) mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};
    use zkl_core::{from_hex, to_hex};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&to_hex(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        from_hex(&s).map_err(serde::de::Error::custom)
    }
}

pub(crate) mod hex_bytes_vec {
    use serde::{Deserialize, Deserializer, Serializer};
    use zkl_core::{from_hex, to_hex};

    pub fn serialize<S: Serializer>(items: &[Vec<u8>], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(items.iter().map(|b| to_hex(b)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<Vec<u8>>, D::Error> {
        let items = Vec::<String>::deserialize(deserializer)?;
        items
            .iter()
            .map(|s| from_hex(s).map_err(serde::de::Error::custom))
            .collect()
    }
}
