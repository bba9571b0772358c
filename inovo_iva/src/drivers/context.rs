use serde::{Deserialize, Serialize};

use crate::SessionError;

/// Observable state of a [`ContextStack`].
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackState {
    Idle,
    Depth(usize),
}

/// Count of contexts open on the controller.
///
/// The controller holds the actual stack; this mirror exists so a pop
/// without a matching push is caught locally instead of being sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextStack {
    depth: usize,
}

impl ContextStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self) {
        self.depth += 1;
    }

    pub fn pop(&mut self) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.depth -= 1;
        Ok(())
    }

    /// Fails with `EmptyContextStack` if there is nothing to pop.
    pub fn ensure_open(&self) -> Result<(), SessionError> {
        if self.depth == 0 {
            return Err(SessionError::EmptyContextStack);
        }
        Ok(())
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_idle(&self) -> bool {
        self.depth == 0
    }

    pub fn state(&self) -> StackState {
        match self.depth {
            0 => StackState::Idle,
            n => StackState::Depth(n),
        }
    }
}
