pub mod helpers;

pub use helpers::*;
pub use mock_engine::*;
pub use mock_server::*;
