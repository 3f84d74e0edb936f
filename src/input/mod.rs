pub mod gesture;
pub mod touch;

pub use gesture::GestureRecognizer;
