//! Type mapping between SQL Server and PostgreSQL.
//!
//! The mapping is static and conservative: source schemas are legacy
//! systems the operator cannot change, so every ambiguous case resolves
//! toward preserving data. Types missing from the map but naming a valid
//! PostgreSQL type pass through verbatim; anything else is rejected.

use crate::error::{MigrateError, Result};

/// Static SQL Server -> PostgreSQL type table.
///
/// Entries with a baked-in precision (money types) never take a length
/// parameter; the char family does, see [`LENGTH_PARAM_TYPES`].
pub const TYPE_MAP: &[(&str, &str)] = &[
    ("bigint", "bigint"),
    ("binary", "bytea"),
    ("bit", "boolean"),
    ("char", "char"),
    ("date", "date"),
    ("datetime", "timestamp"),
    ("datetime2", "timestamp"),
    ("datetimeoffset", "timestamptz"),
    ("decimal", "decimal"),
    ("float", "double precision"),
    ("image", "bytea"),
    ("int", "int"),
    ("money", "numeric(19,4)"),
    ("nchar", "char"),
    ("ntext", "text"),
    ("numeric", "numeric"),
    ("nvarchar", "varchar"),
    ("real", "real"),
    ("smalldatetime", "timestamp"),
    ("smallint", "smallint"),
    ("smallmoney", "numeric(10,4)"),
    ("text", "text"),
    ("time", "time"),
    // SQL Server timestamp is a rowversion, not a point in time
    ("timestamp", "bytea"),
    ("tinyint", "smallint"),
    ("uniqueidentifier", "uuid"),
    ("varbinary", "bytea"),
    ("varchar", "varchar"),
    ("xml", "xml"),
];

/// Source types whose mapped PostgreSQL type takes a `(length)` suffix.
const LENGTH_PARAM_TYPES: &[&str] = &["char", "nchar", "varchar", "nvarchar"];

/// PostgreSQL type names accepted verbatim when they take a length.
const PG_TYPES_WITH_LENGTH: &[&str] = &["varchar", "char", "decimal", "numeric"];

/// PostgreSQL type names accepted verbatim without a length.
const PG_TYPES_WITHOUT_LENGTH: &[&str] = &[
    "int",
    "text",
    "date",
    "timestamp",
    "smallint",
    "bigint",
    "boolean",
    "bytea",
    "json",
    "jsonb",
    "uuid",
    "serial",
    "bigserial",
    "real",
    "double precision",
];

/// Map a SQL Server column type to a PostgreSQL type expression.
///
/// `length` is the catalog `CHARACTER_MAXIMUM_LENGTH`; `Some(-1)` marks an
/// unbounded variable-length column (`varchar(max)` and friends), which
/// maps to `text` with the length dropped.
///
/// Unknown types that are not allow-listed PostgreSQL type names return
/// [`MigrateError::UnknownType`]; the caller decides whether that aborts
/// the table.
pub fn map_type(source_type: &str, length: Option<i32>) -> Result<String> {
    let mut ty = source_type.to_lowercase();
    let mut length = length;

    if length == Some(-1) && matches!(ty.as_str(), "varchar" | "nvarchar") {
        ty = "text".to_string();
        length = None;
    }

    if let Some((_, pg_type)) = TYPE_MAP.iter().find(|(ms, _)| *ms == ty) {
        if LENGTH_PARAM_TYPES.contains(&ty.as_str()) {
            if let Some(n) = length {
                return Ok(format!("{}({})", pg_type, n));
            }
        }
        return Ok((*pg_type).to_string());
    }

    if PG_TYPES_WITH_LENGTH.contains(&ty.as_str())
        || PG_TYPES_WITHOUT_LENGTH.contains(&ty.as_str())
    {
        return Ok(ty);
    }

    Err(MigrateError::UnknownType(source_type.to_string()))
}
