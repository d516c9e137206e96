pub mod risk;
pub mod scorer;

pub use risk::*;
pub use scorer::*;
