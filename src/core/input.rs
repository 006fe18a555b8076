/// Input gate and the player actions the runner understands.

/// Whether a "proceed" request is honoured right now. Only the runner
/// opens or closes it; hosts read it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputGate {
    open: bool,
}

impl InputGate {
    pub fn open(&mut self) {
        self.open = true;
    }

    pub fn close(&mut self) {
        self.open = false;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }
}

/// A player action, already translated from raw key or pointer input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    /// Skip the reveal if typing, otherwise move on.
    Proceed,
    /// Pick a branch option.
    Choose(usize),
    ToggleAuto,
    ToggleDialogueBox,
}

/// What an [`InputAction`] ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOutcome {
    /// The current line was shown in full.
    Skipped,
    /// Traversal moved to another node.
    Advanced,
    /// Auto-play is now in the given state.
    AutoToggled(bool),
    /// The dialogue box is now visible (true) or hidden.
    BoxToggled(bool),
    /// The action is not allowed at the moment.
    Ignored,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_starts_closed() {
        let gate = InputGate::default();
        assert!(!gate.is_open());
    }

    #[test]
    fn gate_open_close() {
        let mut gate = InputGate::default();
        gate.open();
        assert!(gate.is_open());
        gate.close();
        assert!(!gate.is_open());
    }
}
