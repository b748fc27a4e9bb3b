pub mod catalog;
pub mod consensus;
pub mod demo;
pub mod extract;
pub mod study;
