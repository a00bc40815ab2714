pub mod common;
pub mod data_source;
pub mod error;
pub mod output_schema;
pub mod query;
pub mod schema;

pub use common::*;
pub use data_source::*;
pub use error::*;
pub use output_schema::*;
pub use query::*;
pub use schema::*;
