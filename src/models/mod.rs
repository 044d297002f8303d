pub mod gallery;
pub mod gemini;
pub mod generation;
pub mod reference;

pub use gallery::*;
pub use generation::*;
pub use reference::*;
