pub mod replay;
pub mod traits;
