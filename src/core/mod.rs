pub mod artifact;
pub mod domain;
pub mod errors;
pub mod judge;
pub mod pool;
pub mod traits;
