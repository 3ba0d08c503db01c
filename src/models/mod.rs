pub mod access;
pub mod asset_item;
pub mod media_filter;

pub use access::*;
pub use asset_item::*;
pub use media_filter::*;
