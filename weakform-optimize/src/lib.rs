/// Vector functions and numerical differentiation
pub mod calculus;
