//! # Authentication Module
//!
//! The authentication-to-signature validation engine: given a document and
//! the ids of the keys that signed a change to it, decide whether those are
//! exactly the keys the document's policy requires.
//!
//! - **validator**: the two async entry points, plain
//!   ([`validate_authentication`]) and update/rotation
//!   ([`validate_authentication_on_rotation`]).
//! - **requirements**: the [`RequiredSigners`] multiset with explicit
//!   [`Provenance`] per entry, and the three comparisons over it.
//! - **error**: [`ValidationResult`] / [`InvalidReason`] for policy
//!   outcomes, [`ValidationError`] for resolution failures.

pub mod error;
pub mod requirements;
pub mod validator;

pub use error::{InvalidReason, ValidationError, ValidationResult};
pub use requirements::{Provenance, RequiredSigners};
pub use validator::{validate_authentication, validate_authentication_on_rotation};
