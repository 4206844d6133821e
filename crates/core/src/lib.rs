pub mod config;
pub mod error;
pub mod events;
pub mod field_value;
pub mod ids;
pub mod path;

pub use config::{ColumnNames, TreeConfig};
pub use error::CoreError;
pub use events::{ChangeEvent, ChangeOperation};
pub use field_value::{Attributes, FieldValue};
pub use ids::NodeId;
pub use path::PathCodec;
