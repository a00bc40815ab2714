pub mod json_path;
pub mod parse;
pub mod run;
pub mod sanitize;
pub mod validate;

pub use json_path::*;
pub use parse::*;
pub use run::*;
pub use sanitize::*;
pub use validate::*;
