pub mod draw;
pub mod fill;
pub mod shapes;
pub mod text;
