//! Template parsing, expansion, and directory rendering.

pub mod engine;
pub mod error;
pub mod parser;

use std::collections::HashMap;

pub use engine::{PlannedFile, expand, plan, render_all, render_str};
pub use error::{Error, Position, Result};
pub use parser::{ParseOptions, Segment, Template, parse, parse_with};

/// Variable name to replacement value.
pub type Vars = HashMap<String, String>;
