//! Locator strategy chains: ordered fallbacks for finding one logical control.

pub mod chain;
pub mod result;

pub use chain::{Interaction, LocatorChain, Strategy};
pub use result::{Located, LocatorError};
