pub mod axes;
pub mod canvas;
pub mod color;
pub mod compositor;
pub mod text;
