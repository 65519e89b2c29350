pub mod leads;
pub use self::leads::*;
