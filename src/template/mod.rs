//! DOCX template handling: where templates come from, whether they are
//! well-formed, and which data fields they reference.

pub mod container;
pub mod fields;
pub mod resolver;

pub use container::{validate, ValidationResult};
pub use fields::{cross_check, extract_fields, FieldSet};
pub use resolver::{
    FetchError, ResolveError, ResolvedTemplate, SourceMode, TemplateResolver, TemplateSource,
};
