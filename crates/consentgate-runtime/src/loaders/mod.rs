//! Individual pixel loaders.
//!
//! To add an integration:
//! 1. Create a new file in this directory
//! 2. Implement the PixelLoader trait
//! 3. Add `pub mod <name>;` here
//! 4. Register it in create_default_registry() in ../lib.rs

pub mod linkedin;
pub mod meta;
