pub mod docs;
pub mod health;
pub mod ocr;

pub use docs::usage;
pub use health::health_check;
pub use ocr::recognize;
