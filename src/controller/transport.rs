//! Transport commands accepted from control surfaces

use std::time::Duration;

use crate::model::{RepeatState, Track};

/// Instruction from the UI, the system media controls or hardware buttons
#[derive(Clone, Debug, PartialEq)]
pub enum TransportCommand {
    Play,
    Pause,
    TogglePlayPause,
    Stop,
    Seek(Duration),
    SkipNext,
    SkipPrevious,
    SkipTo(usize),
    Enqueue(Track),
    RemoveAt(usize),
    LoadQueue(Vec<Track>),
    SetRepeat(RepeatState),
    CycleRepeat,
    SetShuffle(bool),
    ToggleShuffle,
}

/// Drop seeks superseded by a later seek in the same batch.
///
/// Other commands keep their relative order.
pub fn coalesce(commands: Vec<TransportCommand>) -> Vec<TransportCommand> {
    let last_seek = commands
        .iter()
        .rposition(|c| matches!(c, TransportCommand::Seek(_)));

    commands
        .into_iter()
        .enumerate()
        .filter(|(i, c)| !matches!(c, TransportCommand::Seek(_)) || Some(*i) == last_seek)
        .map(|(_, c)| c)
        .collect()
}
