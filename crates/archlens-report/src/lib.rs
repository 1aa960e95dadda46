pub mod dot;
pub mod json;
pub mod text;

pub use dot::{generate_dot, render, RenderError, RenderFormat};
