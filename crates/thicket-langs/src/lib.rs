//! Hand-assembled grammar tables for tests and demos.
//!
//! Each language is built once and shared, so repeated calls return equal
//! [`Language`] handles.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

use std::sync::LazyLock;

use thicket_core::Language;

pub mod ambiguous;
pub mod arithmetic;
pub mod toy;

#[cfg(test)]
mod lib_tests;

macro_rules! define_langs {
    ($($fn_name:ident => $module:ident),* $(,)?) => {
        $(
            pub fn $fn_name() -> Language {
                static LANG: LazyLock<Language> = LazyLock::new(|| {
                    $module::build().expect(concat!(stringify!($module), " tables are well-formed"))
                });
                LANG.clone()
            }
        )*

        pub fn from_name(name: &str) -> Option<Language> {
            match name.to_ascii_lowercase().as_str() {
                $(stringify!($fn_name) => Some($fn_name()),)*
                _ => None,
            }
        }

        pub fn all() -> Vec<Language> {
            vec![$($fn_name()),*]
        }
    };
}

define_langs! {
    arithmetic => arithmetic,
    ambiguous => ambiguous,
    toy => toy,
}
