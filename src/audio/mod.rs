pub mod decoder;

pub use decoder::load_mono;
