//! Epoch-millisecond conversion and calendar decomposition, all in UTC, as
//! DataFusion expressions.

use datafusion::{
  arrow::datatypes::{DataType, TimeUnit},
  prelude::{Expr, cast, date_part, floor, lit, try_cast},
};

/// `floor(ts / 1000)` seconds since the epoch, as a timestamp. Numbers and
/// strings holding a number are accepted; anything else yields null.
pub fn start_time(ts: Expr) -> Expr {
  let seconds = floor(try_cast(ts, DataType::Float64) / lit(1000.0));
  cast(
    try_cast(seconds, DataType::Int64),
    DataType::Timestamp(TimeUnit::Second, None),
  )
}

/// The derived calendar columns of `start`, in output order.
pub fn fields(start: Expr) -> [(&'static str, Expr); 6] {
  [
    ("hour", part("hour", start.clone())),
    ("day", part("day", start.clone())),
    ("week", part("week", start.clone())),
    ("month", part("month", start.clone())),
    ("year", part("year", start.clone())),
    ("weekday", weekday(start)),
  ]
}

/// One calendar field as `Int64`. `week` is the ISO-8601 week: weeks start on
/// Monday and week 1 holds the year's first Thursday.
pub fn part(name: &str, start: Expr) -> Expr {
  cast(date_part(lit(name), start), DataType::Int64)
}

/// 1 = Sunday through 7 = Saturday.
pub fn weekday(start: Expr) -> Expr { part("dow", start) + lit(1i64) }
