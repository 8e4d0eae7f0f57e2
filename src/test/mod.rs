mod accounts;
mod sessions;
pub mod utils;

pub use utils::test_db;
pub use utils::test_utils;
