//! `dr-session` - Inference sessions over an initialized delegate tier.
//!
//! An `InferenceSession` owns the interpreter and backend handles chosen by
//! `dr_delegate::DelegateInitializer`, caches tensor metadata once, and
//! turns each output into `f32` data after every predict.

pub mod error;
pub mod session;

pub use error::{Result, SessionError};
pub use session::InferenceSession;
