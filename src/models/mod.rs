pub mod document;
pub mod enums;
pub mod farm;

pub use document::*;
pub use enums::*;
pub use farm::*;
