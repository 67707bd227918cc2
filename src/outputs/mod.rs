//! Output of normalized contributions.
//!
//! # Submodules
//!
//! - [`json`]: Writes contributions as a JSON array to a file or stdout
//!
//! # Output Structure
//!
//! ```text
//! [
//!   { "type": "donation", "title": "...", "amount": 7517993, ... },
//!   ...
//! ]
//! ```

pub mod json;
