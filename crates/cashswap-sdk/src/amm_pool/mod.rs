pub mod contract;
pub mod math;
pub mod params;
pub mod tx;
pub mod unlock;
