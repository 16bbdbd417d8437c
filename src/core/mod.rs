pub mod error;
pub mod property;
pub mod value;

pub use error::{Result, StoreError};
pub use property::{CONTENT_PROPERTY, Property, find_property, validate_properties};
pub use value::Value;
