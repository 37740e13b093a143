pub mod dataset;
pub mod result;
pub mod value;

pub use dataset::Dataset;
pub use result::ResultSet;
pub use value::Value;
