pub mod pixel;
pub mod public;
pub mod republish;
