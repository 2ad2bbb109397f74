use std::any::type_name;

use serde::de::DeserializeOwned;
use serde_json::Value as Json;
use url::Url;

use crate::error::SchemaError;

use super::{
    presentation::{CredentialsV1Context, VerifiablePresentationType},
    request::{JsonRpcVersion, RequestCredentialMethod},
    response::{FlowReadyMethod, ProtocolErrorVersion},
};

/// A declarative description of the structure a JSON value must have.
///
/// Validation is structural only: objects tolerate members their schema does not mention, while
/// required members and literal tags must be present and exact. A [Schema::Union] tries its
/// variants in declaration order and accepts the first one that matches.
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    String,
    Number,
    /// A number without a fractional part.
    Integer,
    /// A string that parses as an absolute URL.
    Url,
    /// A string that parses as a textual principal.
    Principal,
    Literal(Json),
    Array {
        items: Box<Schema>,
        min_items: usize,
    },
    /// An object with arbitrary keys whose values all match the inner schema.
    Record(Box<Schema>),
    Object(ObjectSchema),
    Union(Vec<Schema>),
}

/// Whether an object member must, may, or must not be present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Required,
    Optional,
    Absent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    name: &'static str,
    aliases: Vec<&'static str>,
    presence: Presence,
    schema: Schema,
}

/// The members of an object schema, in declaration order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectSchema {
    fields: Vec<Field>,
}

impl ObjectSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a member that must be present and match `schema`.
    pub fn required(self, name: &'static str, schema: impl Into<Schema>) -> Self {
        self.field(name, Presence::Required, schema.into())
    }

    /// Declare a member that, when present, must match `schema`.
    pub fn optional(self, name: &'static str, schema: impl Into<Schema>) -> Self {
        self.field(name, Presence::Optional, schema.into())
    }

    /// Declare a member that must not be present.
    pub fn absent(self, name: &'static str) -> Self {
        self.field(name, Presence::Absent, Schema::Object(ObjectSchema::new()))
    }

    /// Accept `alias` as an alternative key for the most recently declared member.
    pub fn alias(mut self, alias: &'static str) -> Self {
        if let Some(field) = self.fields.last_mut() {
            field.aliases.push(alias);
        }
        self
    }

    fn field(mut self, name: &'static str, presence: Presence, schema: Schema) -> Self {
        self.fields.push(Field {
            name,
            aliases: vec![],
            presence,
            schema,
        });
        self
    }
}

impl From<ObjectSchema> for Schema {
    fn from(value: ObjectSchema) -> Self {
        Schema::Object(value)
    }
}

impl Schema {
    pub fn literal(value: impl Into<Json>) -> Self {
        Schema::Literal(value.into())
    }

    pub fn array(items: impl Into<Schema>) -> Self {
        Schema::Array {
            items: Box::new(items.into()),
            min_items: 0,
        }
    }

    pub fn non_empty_array(items: impl Into<Schema>) -> Self {
        Schema::Array {
            items: Box::new(items.into()),
            min_items: 1,
        }
    }

    pub fn record(values: impl Into<Schema>) -> Self {
        Schema::Record(Box::new(values.into()))
    }

    pub fn union(variants: impl IntoIterator<Item = Schema>) -> Self {
        Schema::Union(variants.into_iter().collect())
    }

    /// Check `value` against this schema.
    pub fn check(&self, value: &Json) -> Result<(), SchemaError> {
        self.check_at(value, "$")
    }

    fn check_at(&self, value: &Json, path: &str) -> Result<(), SchemaError> {
        let mismatch = || SchemaError {
            path: path.to_owned(),
            expected: self.describe(),
            received: describe_value(value),
        };

        match self {
            Schema::String if value.is_string() => Ok(()),
            Schema::Number if value.is_number() => Ok(()),
            Schema::Integer if value.is_i64() || value.is_u64() => Ok(()),
            Schema::Url => match value.as_str().map(Url::parse) {
                Some(Ok(_)) => Ok(()),
                _ => Err(mismatch()),
            },
            Schema::Principal => match value.as_str().map(candid::Principal::from_text) {
                Some(Ok(_)) => Ok(()),
                _ => Err(mismatch()),
            },
            Schema::Literal(expected) if expected == value => Ok(()),
            Schema::Array { items, min_items } => {
                let arr = value.as_array().ok_or_else(mismatch)?;
                if arr.len() < *min_items {
                    return Err(SchemaError {
                        path: path.to_owned(),
                        expected: self.describe(),
                        received: format!("array of {} item(s)", arr.len()),
                    });
                }
                arr.iter()
                    .enumerate()
                    .try_for_each(|(i, item)| items.check_at(item, &format!("{path}[{i}]")))
            }
            Schema::Record(values) => value
                .as_object()
                .ok_or_else(mismatch)?
                .iter()
                .try_for_each(|(key, item)| values.check_at(item, &format!("{path}.{key}"))),
            Schema::Object(object) => {
                let obj = value.as_object().ok_or_else(mismatch)?;
                for field in &object.fields {
                    // Every key the member may appear under is checked, not only the first found.
                    let members: Vec<(&str, &Json)> = std::iter::once(field.name)
                        .chain(field.aliases.iter().copied())
                        .filter_map(|key| obj.get(key).map(|member| (key, member)))
                        .collect();

                    match (field.presence, members.first()) {
                        (Presence::Required, None) => {
                            return Err(SchemaError {
                                path: format!("{path}.{}", field.name),
                                expected: field.schema.describe(),
                                received: "nothing".to_owned(),
                            })
                        }
                        (Presence::Absent, Some((key, member))) => {
                            return Err(SchemaError {
                                path: format!("{path}.{key}"),
                                expected: "no value".to_owned(),
                                received: describe_value(member),
                            })
                        }
                        (Presence::Required | Presence::Optional, Some(_)) => {
                            for (key, member) in &members {
                                field.schema.check_at(member, &format!("{path}.{key}"))?;
                            }
                        }
                        (Presence::Optional | Presence::Absent, None) => {}
                    }
                }
                Ok(())
            }
            Schema::Union(variants) => {
                if variants
                    .iter()
                    .any(|variant| variant.check_at(value, path).is_ok())
                {
                    Ok(())
                } else {
                    Err(mismatch())
                }
            }
            _ => Err(mismatch()),
        }
    }

    /// A short human readable description of what this schema accepts.
    pub fn describe(&self) -> String {
        match self {
            Schema::String => "string".to_owned(),
            Schema::Number => "number".to_owned(),
            Schema::Integer => "integer".to_owned(),
            Schema::Url => "URL".to_owned(),
            Schema::Principal => "principal".to_owned(),
            Schema::Literal(value) => value.to_string(),
            Schema::Array { items, min_items: 0 } => format!("array of {}", items.describe()),
            Schema::Array { items, .. } => format!("non-empty array of {}", items.describe()),
            Schema::Record(values) => format!("record of {}", values.describe()),
            Schema::Object(_) => "object".to_owned(),
            Schema::Union(variants) => format!(
                "one of ({})",
                variants
                    .iter()
                    .map(Schema::describe)
                    .collect::<Vec<_>>()
                    .join(" | ")
            ),
        }
    }
}

fn describe_value(value: &Json) -> String {
    match value {
        Json::Null => "null".to_owned(),
        Json::Bool(_) => "boolean".to_owned(),
        Json::Number(n) => format!("number {n}"),
        Json::String(s) => format!("string {s:?}"),
        Json::Array(_) => "array".to_owned(),
        Json::Object(_) => "object".to_owned(),
    }
}

/// Validate `value` against `schema` and, on success, deserialize it into `T`.
///
/// The typed deserialization can still reject values the schema accepted (e.g. an integer out of
/// range), in which case the error points at the offending member.
pub fn validate<T: DeserializeOwned>(schema: &Schema, value: &Json) -> Result<T, SchemaError> {
    schema.check(value)?;

    serde_path_to_error::deserialize(value).map_err(|e| {
        let path = e.path().to_string();
        SchemaError {
            path: if path == "." {
                "$".to_owned()
            } else {
                format!("$.{path}")
            },
            expected: type_name::<T>()
                .rsplit("::")
                .next()
                .unwrap_or_default()
                .to_owned(),
            received: e.into_inner().to_string(),
        }
    })
}

/// A wire or token payload type with a declared [Schema].
pub trait Validate: DeserializeOwned {
    fn schema() -> Schema;

    fn parse(value: &Json) -> Result<Self, SchemaError> {
        validate(&Self::schema(), value)
    }
}

fn protocol_version() -> Schema {
    Schema::literal(JsonRpcVersion::VALUE)
}

fn request_id() -> Schema {
    Schema::union([Schema::Number, Schema::String])
}

/// `{ method: "vc-flow-ready" }`. Any other member, the protocol version included, is ignored.
pub fn flow_ready() -> Schema {
    ObjectSchema::new()
        .required("method", Schema::literal(FlowReadyMethod::VALUE))
        .into()
}

pub fn credential_spec() -> Schema {
    ObjectSchema::new()
        .required("credentialType", Schema::String)
        .optional(
            "arguments",
            Schema::record(Schema::union([Schema::String, Schema::Integer])),
        )
        .into()
}

pub fn flow_request() -> Schema {
    ObjectSchema::new()
        .required("id", request_id())
        .required("jsonrpc", protocol_version())
        .alias("protocolVersion")
        .required("method", Schema::literal(RequestCredentialMethod::VALUE))
        .required(
            "params",
            ObjectSchema::new()
                .required(
                    "issuer",
                    ObjectSchema::new()
                        .required("origin", Schema::Url)
                        .optional("canisterId", Schema::Principal),
                )
                .required("credentialSpec", credential_spec())
                .required("credentialSubject", Schema::Principal)
                .optional("derivationOrigin", Schema::String),
        )
        .into()
}

/// The `result` member of a response: exactly one of a presentation or an error.
pub fn flow_result() -> Schema {
    Schema::union([
        ObjectSchema::new()
            .required("verifiablePresentation", Schema::String)
            .absent("error")
            .into(),
        ObjectSchema::new()
            .required(
                "error",
                ObjectSchema::new()
                    .required("version", Schema::literal(ProtocolErrorVersion::VALUE))
                    .required("code", Schema::String),
            )
            .absent("verifiablePresentation")
            .into(),
    ])
}

pub fn flow_response() -> Schema {
    ObjectSchema::new()
        .optional("id", request_id())
        .optional("jsonrpc", protocol_version())
        .alias("protocolVersion")
        .required("result", flow_result())
        .into()
}

pub fn verifiable_presentation() -> Schema {
    ObjectSchema::new()
        .required("iss", Schema::String)
        .required(
            "vp",
            ObjectSchema::new()
                .required("@context", Schema::literal(CredentialsV1Context::VALUE))
                .required("type", Schema::literal(VerifiablePresentationType::VALUE))
                .required("verifiableCredential", Schema::non_empty_array(Schema::String)),
        )
        .into()
}

/// The closed set of credential subjects, in resolution order.
pub fn credential_subject() -> Schema {
    Schema::union([
        ObjectSchema::new()
            .optional("id", Schema::String)
            .required(
                "InternetIdentityIdAlias",
                ObjectSchema::new().required("hasIdAlias", Schema::String),
            )
            .into(),
        ObjectSchema::new()
            .optional("id", Schema::String)
            .required(
                "GitcoinPassportScore",
                Schema::union([
                    ObjectSchema::new()
                        .required("minScore", Schema::Number)
                        .into(),
                    Schema::Number,
                ]),
            )
            .into(),
    ])
}

pub fn verifiable_credential() -> Schema {
    ObjectSchema::new()
        .required("exp", Schema::Integer)
        .required("iss", Schema::String)
        .required("nbf", Schema::Integer)
        .required("jti", Schema::String)
        .required("sub", Schema::String)
        .required(
            "vc",
            ObjectSchema::new()
                .required("@context", Schema::literal(CredentialsV1Context::VALUE))
                .required("type", Schema::array(Schema::String))
                .required("credentialSubject", credential_subject()),
        )
        .into()
}
