//! Snowflake id newtypes for guild objects.
//!
//! Config files carry ids as JSON strings (snowflakes overflow JavaScript
//! numbers), so deserialization accepts either a string or an integer and
//! serialization always writes a string.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

fn deserialize_snowflake<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawSnowflake {
        Number(u64),
        Text(String),
    }

    match RawSnowflake::deserialize(deserializer)? {
        RawSnowflake::Number(value) => Ok(value),
        RawSnowflake::Text(value) => value
            .trim()
            .parse::<u64>()
            .map_err(|error| de::Error::custom(format!("invalid snowflake '{value}': {error}"))),
    }
}

macro_rules! snowflake_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub u64);

        impl $name {
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                raw.trim().parse::<u64>().map(Self)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.0.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                deserialize_snowflake(deserializer).map(Self)
            }
        }
    };
}

snowflake_id!(
    /// Guild (server) id. Also the id of the guild's `@everyone` role.
    GuildId
);
snowflake_id!(
    /// Channel id. Voice channels, stage channels, and categories share this space.
    ChannelId
);
snowflake_id!(UserId);
snowflake_id!(RoleId);
snowflake_id!(MessageId);

impl GuildId {
    /// Discord gives the `@everyone` role the guild's own id.
    pub const fn everyone_role(self) -> RoleId {
        RoleId(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_snowflake_accepts_string_and_number() {
        let from_text: ChannelId =
            serde_json::from_str("\"1315075287754608782\"").expect("string snowflake");
        let from_number: ChannelId = serde_json::from_str("42").expect("numeric snowflake");
        assert_eq!(from_text, ChannelId(1_315_075_287_754_608_782));
        assert_eq!(from_number, ChannelId(42));
        assert_eq!(
            serde_json::to_string(&from_text).expect("serialize"),
            "\"1315075287754608782\""
        );
    }

    #[test]
    fn regression_snowflake_rejects_non_numeric_text() {
        let error = serde_json::from_str::<RoleId>("\"everyone\"").expect_err("must reject");
        assert!(error.to_string().contains("invalid snowflake 'everyone'"));
    }
}
