//! Prompt templates
//!
//! All system prompts ship embedded in the binary; user prompts are assembled
//! inline by the blocks that use them.

pub mod embedded;

pub use embedded::get_embedded;
