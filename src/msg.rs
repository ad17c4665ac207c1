use std::path::PathBuf;

/// All possible messages that drive state transitions.
#[derive(Debug)]
pub enum Msg {
    // -- Input
    Command(String),

    // -- File I/O
    StateChanged(PathBuf),

    // -- System
    Quit,
}
