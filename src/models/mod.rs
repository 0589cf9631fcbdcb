pub mod beach;
pub mod forecast;
pub mod location;
pub mod lunar;
pub mod score;
pub mod tide;
pub mod weather;

pub use beach::*;
pub use forecast::*;
pub use location::*;
pub use lunar::*;
pub use score::*;
pub use tide::*;
pub use weather::*;
