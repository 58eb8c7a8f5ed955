pub mod common;
pub mod traits;
pub mod web;

#[cfg(test)]
pub mod mock;

pub use traits::{Selector, SessionFactory, UiDriver};
