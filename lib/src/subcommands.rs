pub use inspect::*;
pub use predict::*;
pub use train::*;

pub mod inspect;
pub mod predict;
pub mod train;
