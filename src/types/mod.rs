pub mod chart;
pub mod recommendation;
pub mod signals;

pub use chart::*;
pub use recommendation::*;
pub use signals::*;
