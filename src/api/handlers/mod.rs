pub mod flows;
pub use self::flows::{confirm, exchange, issue, upload};

pub mod health;
pub use self::health::health;

pub mod types;
