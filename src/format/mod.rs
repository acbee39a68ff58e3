//! On-disk formats produced by the tiler.
//!
//! Tile images are encoded by the `image` crate. The pyramidal TIFF
//! container is written with the `tiff` crate's directory encoder and read
//! back by a minimal directory walker for validation.

pub mod tiff;
