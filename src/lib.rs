//! Quadrature-based weak-form assembly for conforming finite element spaces.
//!
//! A [`mesh::Mesh`] and an [`element::FEType`] define a [`space::FESpace`]. Weak forms
//! combine test and trial spaces, [`evaluate::DiffOperator`]s and a pointwise
//! [`action::Action`], and are assembled into a [`assembly::BlockSystem`] either directly
//! or through the [`operators::PdeOperator`] dispatch.

pub mod action;
pub mod assembly;
pub mod connectivity;
pub mod element;
pub mod error;
pub mod estimate;
pub mod evaluate;
pub mod geometry;
pub mod interpolate;
pub mod mesh;
pub mod operators;
pub mod quadrature;
pub mod solve;
pub mod space;
pub mod transform;

pub mod optimize {
    pub use weakform_optimize::*;
}

#[cfg(feature = "proptest")]
pub mod proptest;

pub use error::Error;
pub use weakform_traits::Real;

pub extern crate nalgebra;
pub extern crate nalgebra_sparse;
