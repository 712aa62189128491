//! Dataframe verbs with no DataFusion built-in.

use std::sync::Arc;

use datafusion::{
  arrow::{
    array::{ArrayRef, Int64Array, RecordBatch},
    datatypes::{DataType, Field, Schema},
  },
  datasource::MemTable,
  prelude::{DataFrame, SessionContext},
};

use crate::{Error, Result};

/// Bits of a monotonic id reserved for the row index within a partition.
pub const ROW_BITS: u32 = 33;

/// Append a non-null `Int64` column `name` holding
/// `(partition << ROW_BITS) + row`.
///
/// Every partition of the physical plan numbers its own rows, so ids are
/// unique and increase in (partition, row) order with no coordination between
/// partitions. They are not contiguous. The numbered rows are held in memory,
/// one in-memory partition per plan partition.
pub async fn with_monotonic_id(
  ctx: &SessionContext,
  df: DataFrame,
  name: &str,
) -> Result<DataFrame> {
  if df.schema().has_column_with_unqualified_name(name) {
    return Err(Error::DuplicateColumn(name.to_owned()));
  }

  let planned = Arc::new(Schema::from(df.schema()));
  let partitions = df.collect_partitioned().await?;
  let input = partitions
    .iter()
    .flatten()
    .next()
    .map_or(planned, RecordBatch::schema);

  let mut fields = input.fields().to_vec();
  fields.push(Arc::new(Field::new(name, DataType::Int64, false)));
  let schema = Arc::new(Schema::new(fields));

  let mut numbered = Vec::with_capacity(partitions.len().max(1));
  for (p, batches) in partitions.into_iter().enumerate() {
    let base = (p as i64) << ROW_BITS;
    let mut row = 0i64;
    let mut out = Vec::with_capacity(batches.len());
    for batch in batches {
      let len = batch.num_rows() as i64;
      if row + len > 1 << ROW_BITS {
        return Err(Error::IdRangeExhausted { partition: p });
      }
      let ids: ArrayRef =
        Arc::new(Int64Array::from_iter_values((row..row + len).map(|r| base + r)));
      row += len;

      let mut columns = batch.columns().to_vec();
      columns.push(ids);
      out.push(RecordBatch::try_new(schema.clone(), columns)?);
    }
    numbered.push(out);
  }
  if numbered.is_empty() {
    numbered.push(Vec::new());
  }

  let table = MemTable::try_new(schema, numbered)?;
  Ok(ctx.read_table(Arc::new(table))?)
}
