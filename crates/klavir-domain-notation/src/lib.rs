pub mod model;
pub mod parser;
pub mod pitch;
pub mod tempo;
pub mod timing;

pub use model::*;
pub use parser::*;
pub use pitch::*;
pub use tempo::*;
pub use timing::*;
