pub mod localized;
pub mod potential;
