//! Schema registry: the static table catalog shared by every compiler.

pub mod registry;

pub use registry::{
    ColumnDef, ColumnType, SchemaKind, SchemaNames, SchemaRegistry, TableDef, FACT_TABLE,
    GROUP_COUNT,
};
