pub mod common;

mod hydration;
