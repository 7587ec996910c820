pub mod gap;
pub mod horizon;
pub mod score;
pub mod series;
pub mod signal;
pub mod tick;
pub mod value;

pub use gap::*;
pub use horizon::*;
pub use score::*;
pub use series::*;
pub use signal::*;
pub use tick::*;
pub use value::*;
