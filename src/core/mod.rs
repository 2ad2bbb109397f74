/// Declares a unit type that (de)serializes as exactly one string.
///
/// Used for the literal tags of the wire protocol (`"2.0"`, `"request_credential"`, ...).
macro_rules! literal_tag {
    ($(#[$meta:meta])* $name:ident = $value:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
        pub struct $name;

        impl $name {
            pub const VALUE: &'static str = $value;
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(Self::VALUE)
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let value = String::deserialize(deserializer)?;
                if value == Self::VALUE {
                    Ok(Self)
                } else {
                    Err(serde::de::Error::invalid_value(
                        serde::de::Unexpected::Str(&value),
                        &Self::VALUE,
                    ))
                }
            }
        }
    };
}

pub mod credential_spec;
pub mod host;
pub mod presentation;
pub mod principal;
pub mod request;
pub mod response;
pub mod schema;
pub mod token;
