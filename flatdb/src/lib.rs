pub mod error;
pub mod value;
pub mod scalar;
pub mod schema;
pub mod store;
pub mod validation;
pub mod format;
mod util;

pub use error::{FlatDbError, Result};
pub use value::{Map, Value};
pub use schema::{
    load_schema, FieldDefinition, FieldKind, IdentifierPattern, IdentifierSpec, IncludeDirective,
    Schema, TypeDefinition,
};
pub use store::{Collection, Object, Store};
pub use validation::{validate, Phase, ValidateOptions, ValidationError, ValidationResult};
pub use format::{format_bytes, format_file, FieldOrder, FormatResult};
