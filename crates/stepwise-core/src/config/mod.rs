//! Agent configuration: key schema, value encoding versions and the
//! materializer that turns raw rows into a typed record.

mod materialize;
mod schema;
mod upgrade;

pub use materialize::{ConfigurationMaterializer, MaterializedConfiguration};
pub use schema::{ConfigKey, ValueKind};
pub use upgrade::{
    CONFIG_SCHEMA_VERSION, LEGACY_SCHEMA_VERSION, parse_list_literal, upgrade_value,
};
