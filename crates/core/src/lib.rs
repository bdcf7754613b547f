//! Core types shared by every tendril crate.
//!
//! - **Descriptions**: immutable declarative trees with a type tag, a
//!   property map and ordered children
//! - **Property values**: primitives plus identity-compared event handlers
//! - **Errors**: one typed error enum and a `Result` alias
//!
//! # Example
//!
//! ```
//! use tendril_core::{build, leaf, Child, Props};
//!
//! let tree = build(
//!     "div",
//!     Props::new().with("id", "foo"),
//!     vec![
//!         Child::from(build("a", Props::new(), ["bar"])?),
//!         Child::from(leaf("b")?),
//!     ],
//! )?;
//! assert_eq!(tree.node_count(), 4);
//! # Ok::<(), tendril_core::Error>(())
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod description;
pub mod error;
pub mod result;
pub mod value;

pub use description::{
    build, leaf, text, Child, Description, ElementType, CHILDREN_KEY, TEXT_VALUE_KEY,
};
pub use error::Error;
pub use result::{Result, ResultExt};
pub use value::{Handler, PropValue, Props};
