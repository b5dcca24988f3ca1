//! Canned [`Compiler`](crate::core::traits::compiler::Compiler) and
//! [`Runner`](crate::core::traits::runner::Runner) implementations with a
//! configurable delay, for exercising the pool and facade without a toolchain.
pub mod compiler;
pub mod runner;
