//! Readback: pulling the safety-critical values out of an instruction,
//! voicing the pilot's reply, and checking that what came back matches.

pub mod session;
pub mod validator;

pub use session::{AtcInstruction, ReadbackSession, SessionError};
pub use validator::{
    extract_elements, generate_readback, validate, ElementKind, Elements, Mismatch, ReadbackCheck,
};
