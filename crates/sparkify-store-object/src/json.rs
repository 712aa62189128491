//! JSON decoding with schema inference.
//!
//! A file may hold JSON Lines or any sequence of whitespace-separated
//! objects, pretty-printed or not. The schema is inferred over every object
//! of every file, so a key that only some files carry is still a column.
//! Columns are sorted by name; one that only ever held null is `Utf8`.

use datafusion::arrow::{
  datatypes::{DataType, Field, Schema},
  json::reader::infer_json_schema_from_iterator,
};
use serde_json::Value as JsonValue;

use crate::{Error, Result};

/// Parse every top-level object in `bytes`. `path` is only used for errors.
pub fn parse_objects(path: &str, bytes: &[u8]) -> Result<Vec<JsonValue>> {
  serde_json::Deserializer::from_slice(bytes)
    .into_iter::<JsonValue>()
    .map(|item| {
      let value = item.map_err(|source| Error::Json {
        path: path.to_owned(),
        source,
      })?;
      match value {
        JsonValue::Object(_) => Ok(value),
        other => Err(Error::NotAnObject {
          path:  path.to_owned(),
          found: json_kind(&other),
        }),
      }
    })
    .collect()
}

pub fn infer_schema(files: &[Vec<JsonValue>]) -> Result<Schema> {
  let inferred = infer_json_schema_from_iterator(files.iter().flatten().map(Ok))?;
  let mut fields: Vec<Field> = inferred
    .fields()
    .iter()
    .map(|f| match f.data_type() {
      DataType::Null => Field::new(f.name(), DataType::Utf8, true),
      _ => f.as_ref().clone(),
    })
    .collect();
  fields.sort_by(|a, b| a.name().cmp(b.name()));
  Ok(Schema::new(fields))
}

fn json_kind(value: &JsonValue) -> &'static str {
  match value {
    JsonValue::Null => "null",
    JsonValue::Bool(_) => "boolean",
    JsonValue::Number(_) => "number",
    JsonValue::String(_) => "string",
    JsonValue::Array(_) => "array",
    JsonValue::Object(_) => "object",
  }
}
