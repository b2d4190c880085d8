//! Page validation module
//!
//! Decides whether a loaded page carries directory content, estimates how
//! many contacts it lists, and fingerprints its text so a paginator that
//! silently loops back to page 1 can be spotted.

mod validator;

pub use validator::{
    assess, fingerprint, PageValidator, PageVerdict, ValidatorConfig, FINGERPRINT_PREFIX_CHARS,
};
