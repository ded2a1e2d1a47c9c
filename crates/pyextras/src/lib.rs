//! Renders a notice telling documentation readers that a module, class or
//! function needs one of the package's extras, including how to install it.
//!
//! The requirement list comes from exactly one source: a requirements file,
//! a `__pkginfo__.py` module, `setup.cfg`, one of two `pyproject.toml`
//! tables, or the directive body itself. Entries are validated as dependency
//! specifiers and printed in one canonical, sorted form.
//!
//! The host documentation generator owns the directive lifecycle and node
//! tree; this crate exposes the directive surface as a plain function,
//! [`directive::render`], plus a CLI wrapper around it.

pub use crate::config::Config;
pub use crate::directive::{DirectiveError, ExtraRequest};
pub use crate::render::make_node_content;

pub mod config;
pub mod directive;
pub mod render;
