//! Access ordering for the shared image.
//!
//! The trace kernel writes the image and the presentation pass reads it.
//! Within a frame the two accesses must never overlap: the image is bound
//! for writing, written by one dispatch, fenced by a barrier, and only then
//! bound for reading and presented.

use std::fmt;

use thiserror::Error;

/// Operations a frame performs on the shared image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOp {
    BindWrite,
    Dispatch,
    Barrier,
    BindRead,
    Present,
}

/// Where the shared image is within the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SharedImageState {
    #[default]
    Idle,
    BoundForWrite,
    Dispatched,
    Barriered,
    BoundForRead,
}

/// An image operation was issued out of order.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Cannot {op} while the shared image is {state}")]
pub struct AccessError {
    pub state: SharedImageState,
    pub op: ImageOp,
}

impl SharedImageState {
    /// Apply `op`, moving to the next state or failing if `op` is not the
    /// one operation allowed from the current state.
    pub fn apply(&mut self, op: ImageOp) -> Result<(), AccessError> {
        use SharedImageState::*;

        let next = match (*self, op) {
            (Idle, ImageOp::BindWrite) => BoundForWrite,
            (BoundForWrite, ImageOp::Dispatch) => Dispatched,
            (Dispatched, ImageOp::Barrier) => Barriered,
            (Barriered, ImageOp::BindRead) => BoundForRead,
            (BoundForRead, ImageOp::Present) => Idle,
            (state, op) => return Err(AccessError { state, op }),
        };
        *self = next;
        Ok(())
    }

    /// Abandon the current frame.
    pub fn reset(&mut self) {
        *self = SharedImageState::Idle;
    }

    /// True if the compute kernel may write the image.
    pub fn is_writable(&self) -> bool {
        *self == SharedImageState::BoundForWrite
    }

    /// True if the presentation pass may sample the image.
    pub fn is_readable(&self) -> bool {
        *self == SharedImageState::BoundForRead
    }
}

impl fmt::Display for ImageOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImageOp::BindWrite => "bind for write",
            ImageOp::Dispatch => "dispatch",
            ImageOp::Barrier => "insert a barrier",
            ImageOp::BindRead => "bind for read",
            ImageOp::Present => "present",
        };
        f.write_str(name)
    }
}

impl fmt::Display for SharedImageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SharedImageState::Idle => "idle",
            SharedImageState::BoundForWrite => "bound for write",
            SharedImageState::Dispatched => "dispatched",
            SharedImageState::Barriered => "behind a barrier",
            SharedImageState::BoundForRead => "bound for read",
        };
        f.write_str(name)
    }
}
