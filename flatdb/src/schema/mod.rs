mod json_schema;
mod loader;
mod normalize;
mod raw;
mod types;

pub use loader::{load_schema, Loader};
pub use types::*;

use crate::format::FieldOrder;

impl Schema {
    /// Field-ordering projection of a type, as consumed by the formatter.
    pub fn field_order(&self, type_name: &str) -> Option<FieldOrder> {
        self.get_type(type_name)
            .and_then(|t| FieldOrder::from_fields(&t.fields))
    }
}
