pub mod router;
pub mod split;
pub mod types;

pub use router::{quote_pool, route_swap};
pub use split::analyze_split;
pub use types::*;
