pub mod codec;
pub mod error;
pub mod model;
pub mod sorter;
pub mod source;
pub mod store;
pub mod writer;

#[cfg(test)]
mod fixtures;
