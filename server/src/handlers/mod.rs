// Module declaration file for handlers/

pub mod detect;
pub mod enroll;
pub mod health;
pub mod ready;
pub mod verify;

pub use detect::detect_handler;
pub use enroll::enroll_handler;
pub use health::health_handler;
pub use ready::ready_handler;
pub use verify::verify_handler;
