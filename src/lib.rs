//! `tplgen`: `{{ name }}` template expansion and file scaffolding.
//!
//! The core is the pure pair [`parse`] / [`expand`]:
//!
//! ```
//! use tplgen::{Vars, expand, parse};
//!
//! let tpl = parse("public class {{name}}ServiceImpl implements {{name}}Service {}")?;
//! let vars: Vars = [("name".to_string(), "Order".to_string())].into();
//! assert_eq!(
//!     expand(&tpl, &vars)?,
//!     "public class OrderServiceImpl implements OrderService {}"
//! );
//! # Ok::<(), tplgen::Error>(())
//! ```
//!
//! Everything else ([`cache`], [`vars`], directory rendering) is layered on top.

pub mod cache;
pub mod ctx;
pub mod render;
pub mod transaction;
pub mod vars;

pub use cache::TemplateCache;
pub use render::{Error, ParseOptions, Result, Template, Vars, expand, parse, parse_with};
