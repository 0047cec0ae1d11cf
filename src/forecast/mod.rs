pub mod cities;
pub mod export;
pub mod projector;
pub mod scenario;
pub mod summary;

pub use cities::*;
pub use projector::*;
pub use scenario::*;
pub use summary::*;
