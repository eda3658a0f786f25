pub mod types;
pub mod filter;
pub mod filter_where;
pub mod filter_order;
pub mod params;
pub mod error;

pub use types::*;
pub use filter::Filter;
pub use params::ListParams;
pub use error::FilterError;
