//! Hive-style partition directories: `column=value` path segments.
//!
//! The writer names directories after a column's text, so only integer and
//! string columns read back as what was written. A null value lands in
//! [`DEFAULT_PARTITION`].

use datafusion::{
  arrow::datatypes::DataType,
  prelude::{Expr, cast, coalesce, ident, lit},
  scalar::ScalarValue,
};

pub const DEFAULT_PARTITION: &str = "__HIVE_DEFAULT_PARTITION__";

pub fn is_supported(data_type: &DataType) -> bool {
  data_type.is_integer()
    || matches!(
      data_type,
      DataType::Null | DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View
    )
}

/// Column `name` as the text of its directory segment.
pub fn hive_value(name: &str) -> Expr {
  coalesce(vec![
    cast(ident(name), DataType::Utf8),
    lit(DEFAULT_PARTITION),
  ])
  .alias(name)
}

/// Split an (encoded) path segment into `(column, raw value)`. The value is
/// `None` for the default partition. Segments without `=` yield `None`.
pub fn decode_segment(part: &str) -> Option<(String, Option<String>)> {
  let decoded = urlencoding::decode(part)
    .map(|s| s.into_owned())
    .unwrap_or_else(|_| part.to_owned());
  let (column, value) = decoded.split_once('=')?;
  if column.is_empty() {
    return None;
  }
  let value = (value != DEFAULT_PARTITION).then(|| value.to_owned());
  Some((column.to_owned(), value))
}

/// `Int64` when every present value parses as an integer, else `Utf8`.
pub fn infer_type<'a>(
  values: impl IntoIterator<Item = &'a Option<String>>,
) -> DataType {
  let mut seen_any = false;
  for value in values.into_iter().flatten() {
    seen_any = true;
    if value.parse::<i64>().is_err() {
      return DataType::Utf8;
    }
  }
  if seen_any { DataType::Int64 } else { DataType::Utf8 }
}

pub fn parse_value(raw: Option<&str>, data_type: &DataType) -> ScalarValue {
  match data_type {
    DataType::Int64 => ScalarValue::Int64(raw.and_then(|s| s.parse().ok())),
    _ => ScalarValue::Utf8(raw.map(str::to_owned)),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn segments_are_percent_decoded() {
    assert_eq!(
      decode_segment("artist_id_partition=2000"),
      Some(("artist_id_partition".into(), Some("2000".into())))
    );
    assert_eq!(
      decode_segment("name=AC%2FDC"),
      Some(("name".into(), Some("AC/DC".into())))
    );
  }

  #[test]
  fn default_partition_reads_as_null() {
    assert_eq!(
      decode_segment("year=__HIVE_DEFAULT_PARTITION__"),
      Some(("year".into(), None))
    );
  }

  #[test]
  fn plain_segments_are_not_partitions() {
    assert_eq!(decode_segment("songs"), None);
    assert_eq!(decode_segment("=x"), None);
  }

  #[test]
  fn type_inference_prefers_integers() {
    let ints = [Some("2000".to_owned()), None, Some("-1".to_owned())];
    assert_eq!(infer_type(&ints), DataType::Int64);
    let mixed = [Some("2000".to_owned()), Some("A1".to_owned())];
    assert_eq!(infer_type(&mixed), DataType::Utf8);
    assert_eq!(infer_type(&[None]), DataType::Utf8);

    assert_eq!(parse_value(Some("11"), &DataType::Int64), ScalarValue::Int64(Some(11)));
    assert_eq!(parse_value(None, &DataType::Int64), ScalarValue::Int64(None));
    assert_eq!(
      parse_value(Some("AR1"), &DataType::Utf8),
      ScalarValue::Utf8(Some("AR1".into()))
    );
  }

  #[test]
  fn only_integers_and_strings_partition() {
    assert!(is_supported(&DataType::Int64));
    assert!(is_supported(&DataType::UInt16));
    assert!(is_supported(&DataType::Utf8));
    assert!(!is_supported(&DataType::Float64));
    assert!(!is_supported(&DataType::Boolean));
    assert!(!is_supported(&DataType::Timestamp(
      datafusion::arrow::datatypes::TimeUnit::Second,
      None
    )));
  }
}
