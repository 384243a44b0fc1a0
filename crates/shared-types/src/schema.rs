//! # Contract Schema Model
//!
//! A contract's ABI describes how to decode its action payloads and table
//! rows from wire bytes into structured JSON. The model here is the decoded,
//! cacheable form: name→type maps plus the struct definitions the codec
//! walks field by field.
//!
//! The ABI itself travels in canonical JSON form (and hex-wrapped JSON in
//! the `account` delta), so serde handles (de)serialization of the schema;
//! only payload decoding touches the binary codec.

use crate::codec::{ByteReader, CodecError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;

/// Which schema namespace a lookup targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchemaKind {
    Action,
    Table,
}

impl SchemaKind {
    /// Field label used in diagnostics, matching the index document fields.
    #[must_use]
    pub fn field(self) -> &'static str {
        match self {
            Self::Action => "action",
            Self::Table => "table",
        }
    }
}

/// One field of a struct definition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

/// A named struct: an ordered field list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructDef {
    pub name: String,
    pub fields: Vec<FieldDef>,
}

/// A contract's decoded ABI.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AbiDefinition {
    /// Action name → struct type.
    #[serde(default)]
    pub actions: HashMap<String, String>,
    /// Table name → struct type.
    #[serde(default)]
    pub tables: HashMap<String, String>,
    /// Struct type → definition.
    #[serde(default)]
    pub structs: HashMap<String, StructDef>,
}

impl AbiDefinition {
    /// Resolve the struct type backing an action or table name.
    #[must_use]
    pub fn type_for(&self, kind: SchemaKind, name: &str) -> Option<&str> {
        match kind {
            SchemaKind::Action => self.actions.get(name).map(String::as_str),
            SchemaKind::Table => self.tables.get(name).map(String::as_str),
        }
    }

    /// Decode a hex payload against a named type.
    pub fn decode_hex(&self, type_name: &str, payload: &str) -> Result<Value, CodecError> {
        let raw = hex::decode(payload).map_err(|_| CodecError::InvalidUtf8(0))?;
        self.decode(type_name, &raw)
    }

    /// Decode a binary payload against a named type.
    ///
    /// The whole buffer must be consumed; trailing bytes mean the schema
    /// does not actually match the payload.
    pub fn decode(&self, type_name: &str, payload: &[u8]) -> Result<Value, CodecError> {
        let mut reader = ByteReader::new(payload);
        let value = self.decode_type(type_name, &mut reader)?;
        if reader.remaining() > 0 {
            return Err(CodecError::UnexpectedEof {
                offset: reader.position(),
                wanted: 0,
            });
        }
        Ok(value)
    }

    fn decode_type(&self, type_name: &str, reader: &mut ByteReader<'_>) -> Result<Value, CodecError> {
        // suffix modifiers first: arrays, then optionals
        if let Some(inner) = type_name.strip_suffix("[]") {
            let len = reader.read_varuint32()? as usize;
            let mut items = Vec::with_capacity(len.min(4096));
            for _ in 0..len {
                items.push(self.decode_type(inner, reader)?);
            }
            return Ok(Value::Array(items));
        }
        if let Some(inner) = type_name.strip_suffix('?') {
            return match reader.read_bool()? {
                true => self.decode_type(inner, reader),
                false => Ok(Value::Null),
            };
        }

        match type_name {
            "bool" => Ok(json!(reader.read_bool()?)),
            "uint8" => Ok(json!(reader.read_u8()?)),
            "uint16" => Ok(json!(reader.read_u16()?)),
            "uint32" => Ok(json!(reader.read_u32()?)),
            // 64-bit values are stringified in JSON documents, as the node does
            "uint64" => Ok(json!(reader.read_u64()?.to_string())),
            "int64" => Ok(json!(reader.read_i64()?.to_string())),
            "varuint32" => Ok(json!(reader.read_varuint32()?)),
            "name" | "account_name" => Ok(json!(reader.read_name()?)),
            "string" => Ok(json!(reader.read_string()?)),
            "bytes" => Ok(json!(hex::encode(reader.read_bytes()?))),
            "checksum256" => Ok(json!(reader.read_checksum256()?)),
            "time_point_sec" => Ok(json!(reader.read_u32()?)),
            "asset" => decode_asset(reader),
            "symbol" => decode_symbol(reader),
            other => {
                let def = self
                    .structs
                    .get(other)
                    .ok_or_else(|| CodecError::UnsupportedType(other.to_string()))?;
                let mut obj = serde_json::Map::with_capacity(def.fields.len());
                for field in &def.fields {
                    let value = self.decode_type(&field.type_name, reader)?;
                    obj.insert(field.name.clone(), value);
                }
                Ok(Value::Object(obj))
            }
        }
    }
}

/// Decode `{precision, code}` from the packed symbol u64.
fn symbol_parts(raw: u64) -> (u8, String) {
    let precision = (raw & 0xff) as u8;
    let mut code = String::new();
    let mut rest = raw >> 8;
    while rest > 0 {
        let c = (rest & 0xff) as u8;
        if c == 0 {
            break;
        }
        code.push(c as char);
        rest >>= 8;
    }
    (precision, code)
}

fn decode_symbol(reader: &mut ByteReader<'_>) -> Result<Value, CodecError> {
    let (precision, code) = symbol_parts(reader.read_u64()?);
    Ok(json!(format!("{precision},{code}")))
}

fn decode_asset(reader: &mut ByteReader<'_>) -> Result<Value, CodecError> {
    let amount = reader.read_i64()?;
    let (precision, code) = symbol_parts(reader.read_u64()?);
    let scale = 10i64.pow(u32::from(precision));
    // Integer division drops the sign once the magnitude falls below the
    // scale, so render it explicitly.
    let sign = if amount < 0 { "-" } else { "" };
    let whole = (amount / scale).unsigned_abs();
    let frac = (amount % scale).unsigned_abs();
    let rendered = if precision == 0 {
        format!("{sign}{whole} {code}")
    } else {
        format!("{sign}{whole}.{frac:0width$} {code}", width = precision as usize)
    };
    Ok(json!(rendered))
}

/// A cached schema version: the ABI plus the block range it applies to.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContractSchema {
    pub account: String,
    /// First block this version is known to apply from.
    pub valid_from: u64,
    /// Block of the next version, when one exists. `None` means valid
    /// indefinitely (head-block fetch fallback).
    pub valid_until: Option<u64>,
    pub abi: AbiDefinition,
}

impl ContractSchema {
    /// Whether this version covers `block_num`.
    #[must_use]
    pub fn covers(&self, block_num: u64) -> bool {
        block_num >= self.valid_from && self.valid_until.is_none_or(|until| block_num < until)
    }
}
