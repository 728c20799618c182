use std::path::Path;

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Date32Type, Date64Type, Float64Type, Int64Type, TimeUnit};
use arrow::datatypes::Schema;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use tracing::debug;

use crate::snapshot::{Column, ColumnData, LoadError};

const MILLIS_PER_DAY: i64 = 86_400_000;
const PANDAS_METADATA_KEY: &str = "pandas";

/// Columns decoded from a parquet file, minus any index the writer stored alongside them.
#[derive(Debug)]
pub struct ParquetColumns {
    pub columns: Vec<Column>,
    pub index_columns: Vec<String>,
}

pub fn read_columns(path: &Path, data: Bytes) -> Result<ParquetColumns, LoadError> {
    let parquet_err = |source| LoadError::Parquet {
        path: path.to_path_buf(),
        source,
    };
    let arrow_err = |source| LoadError::Arrow {
        path: path.to_path_buf(),
        source,
    };

    let builder = ParquetRecordBatchReaderBuilder::try_new(data).map_err(parquet_err)?;
    let schema = builder.schema().clone();
    let index_columns = pandas_index_columns(&schema);
    if !index_columns.is_empty() {
        debug!(
            "{} stores index columns {:?}; they are not features",
            path.display(),
            index_columns
        );
    }
    let reader = builder.build().map_err(parquet_err)?;

    let mut slots: Vec<Option<Column>> = schema
        .fields()
        .iter()
        .map(|field| {
            let name = field.name();
            if index_columns.iter().any(|idx| idx == name) {
                None
            } else {
                Some(Column::new(name.clone(), empty_data(field.data_type())))
            }
        })
        .collect();

    for batch in reader {
        let batch = batch.map_err(arrow_err)?;
        for (slot, array) in slots.iter_mut().zip(batch.columns()) {
            if let Some(column) = slot {
                append_array(&mut column.data, array).map_err(arrow_err)?;
            }
        }
    }
    Ok(ParquetColumns {
        columns: slots.into_iter().flatten().collect(),
        index_columns,
    })
}

/// Named index columns from pandas' schema metadata. Range indexes are stored
/// as metadata only and have no field, so they are ignored here.
fn pandas_index_columns(schema: &Schema) -> Vec<String> {
    let Some(raw) = schema.metadata().get(PANDAS_METADATA_KEY) else {
        return Vec::new();
    };
    let Ok(meta) = serde_json::from_str::<serde_json::Value>(raw) else {
        return Vec::new();
    };
    meta.get("index_columns")
        .and_then(|v| v.as_array())
        .map(|entries| {
            entries
                .iter()
                .filter_map(|e| e.as_str())
                .filter(|name| schema.field_with_name(name).is_ok())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn empty_data(data_type: &DataType) -> ColumnData {
    match data_type {
        dt if dt.is_numeric() => ColumnData::Numeric(Vec::new()),
        DataType::Boolean => ColumnData::Boolean(Vec::new()),
        DataType::Date32 | DataType::Date64 | DataType::Timestamp(_, _) => {
            ColumnData::Datetime(Vec::new())
        }
        _ => ColumnData::Categorical(Vec::new()),
    }
}

fn append_array(data: &mut ColumnData, array: &ArrayRef) -> Result<(), arrow::error::ArrowError> {
    match data {
        ColumnData::Numeric(values) => {
            let floats = cast(array, &DataType::Float64)?;
            let floats = floats.as_primitive::<Float64Type>();
            values.extend(floats.iter().map(|v| v.filter(|f| !f.is_nan())));
        }
        ColumnData::Boolean(values) => {
            values.extend(array.as_boolean().iter());
        }
        ColumnData::Datetime(values) => values.extend(datetime_millis(array)?),
        ColumnData::Categorical(values) => match array.data_type() {
            DataType::Utf8 => {
                values.extend(array.as_string::<i32>().iter().map(|v| v.map(str::to_string)))
            }
            DataType::LargeUtf8 => {
                values.extend(array.as_string::<i64>().iter().map(|v| v.map(str::to_string)))
            }
            DataType::Dictionary(_, _) => {
                let strings = cast(array, &DataType::Utf8)?;
                values.extend(strings.as_string::<i32>().iter().map(|v| v.map(str::to_string)));
            }
            _ => {
                let formatter = ArrayFormatter::try_new(array.as_ref(), &FormatOptions::default())?;
                for idx in 0..array.len() {
                    if array.is_null(idx) {
                        values.push(None);
                    } else {
                        values.push(Some(formatter.value(idx).to_string()));
                    }
                }
            }
        },
    }
    Ok(())
}

fn datetime_millis(array: &ArrayRef) -> Result<Vec<Option<i64>>, arrow::error::ArrowError> {
    let out = match array.data_type() {
        DataType::Date32 => array
            .as_primitive::<Date32Type>()
            .iter()
            .map(|v| v.map(|days| i64::from(days) * MILLIS_PER_DAY))
            .collect(),
        DataType::Date64 => array.as_primitive::<Date64Type>().iter().collect(),
        DataType::Timestamp(unit, _) => {
            let raw = cast(array, &DataType::Int64)?;
            let scale = |v: i64| match unit {
                TimeUnit::Second => v.saturating_mul(1_000),
                TimeUnit::Millisecond => v,
                TimeUnit::Microsecond => v / 1_000,
                TimeUnit::Nanosecond => v / 1_000_000,
            };
            raw.as_primitive::<Int64Type>()
                .iter()
                .map(|v| v.map(scale))
                .collect()
        }
        other => {
            return Err(arrow::error::ArrowError::CastError(format!(
                "{other} is not a datetime type"
            )))
        }
    };
    Ok(out)
}
