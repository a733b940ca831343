//! Playback state machine
//!
//! The transition table is the single authority on state changes: every
//! reachable (state, event) pair not present here is rejected by the
//! controller (no-op, logged) rather than silently accepted. The table
//! is immutable process-wide; per-attempt data lives in `attempt`.

use vireo_common::events::PlaybackState;

/// Events driving the playback state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// A load was requested
    Play,
    /// First position update arrived from the backend
    LoadComplete,
    /// Enough data to play (position advanced or engine cleared its
    /// buffering flag)
    BufferComplete,
    /// Mid-playback stall
    BufferStart,
    Pause,
    Resume,
    /// Explicit stop or engine exit
    Stop,
    /// Engine reached end of media
    PlaybackEnd,
    ErrorOccurred,
    /// Leave the error state without retrying
    Recover,
}

impl std::fmt::Display for PlaybackEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PlaybackEvent::Play => "play",
            PlaybackEvent::LoadComplete => "load-complete",
            PlaybackEvent::BufferComplete => "buffer-complete",
            PlaybackEvent::BufferStart => "buffer-start",
            PlaybackEvent::Pause => "pause",
            PlaybackEvent::Resume => "resume",
            PlaybackEvent::Stop => "stop",
            PlaybackEvent::PlaybackEnd => "playback-end",
            PlaybackEvent::ErrorOccurred => "error",
            PlaybackEvent::Recover => "recover",
        };
        write!(f, "{}", name)
    }
}

/// Look up the transition for (state, event)
///
/// Returns None when the pair is not in the table; the caller must treat
/// that as a rejected event.
pub fn next_state(state: PlaybackState, event: PlaybackEvent) -> Option<PlaybackState> {
    use PlaybackEvent::*;
    use PlaybackState::*;

    match (state, event) {
        (Idle, Play) => Some(Loading),

        (Loading, LoadComplete) => Some(Buffering),
        (Loading, Stop) => Some(Idle),

        (Buffering, BufferComplete) => Some(Playing),
        (Buffering, Pause) => Some(Paused),
        (Buffering, Stop) | (Buffering, PlaybackEnd) => Some(Idle),

        (Playing, BufferStart) => Some(Buffering),
        (Playing, Pause) => Some(Paused),
        (Playing, Stop) | (Playing, PlaybackEnd) => Some(Idle),

        (Paused, Resume) => Some(Playing),
        (Paused, Stop) | (Paused, PlaybackEnd) => Some(Idle),

        // Errors are accepted from every non-error state
        (Idle, ErrorOccurred)
        | (Loading, ErrorOccurred)
        | (Buffering, ErrorOccurred)
        | (Playing, ErrorOccurred)
        | (Paused, ErrorOccurred) => Some(Error),

        (Error, Recover) => Some(Idle),
        (Error, Play) => Some(Loading),

        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PlaybackEvent::*;
    use PlaybackState::*;

    const ALL_STATES: [PlaybackState; 6] = [Idle, Loading, Buffering, Playing, Paused, Error];
    const ALL_EVENTS: [PlaybackEvent; 10] = [
        Play,
        LoadComplete,
        BufferComplete,
        BufferStart,
        Pause,
        Resume,
        Stop,
        PlaybackEnd,
        ErrorOccurred,
        Recover,
    ];

    #[test]
    fn test_happy_path() {
        assert_eq!(next_state(Idle, Play), Some(Loading));
        assert_eq!(next_state(Loading, LoadComplete), Some(Buffering));
        assert_eq!(next_state(Buffering, BufferComplete), Some(Playing));
        assert_eq!(next_state(Playing, PlaybackEnd), Some(Idle));
    }

    #[test]
    fn test_stall_roundtrip() {
        assert_eq!(next_state(Playing, BufferStart), Some(Buffering));
        assert_eq!(next_state(Buffering, BufferComplete), Some(Playing));
    }

    #[test]
    fn test_pause_resume() {
        assert_eq!(next_state(Playing, Pause), Some(Paused));
        assert_eq!(next_state(Buffering, Pause), Some(Paused));
        assert_eq!(next_state(Paused, Resume), Some(Playing));
    }

    #[test]
    fn test_error_recovery() {
        for state in [Idle, Loading, Buffering, Playing, Paused] {
            assert_eq!(next_state(state, ErrorOccurred), Some(Error));
        }
        assert_eq!(next_state(Error, Recover), Some(Idle));
        assert_eq!(next_state(Error, Play), Some(Loading));
        // Error does not re-enter itself
        assert_eq!(next_state(Error, ErrorOccurred), None);
    }

    #[test]
    fn test_rejected_pairs() {
        // Spot checks on pairs that must not be in the table
        assert_eq!(next_state(Idle, Stop), None);
        assert_eq!(next_state(Idle, Pause), None);
        assert_eq!(next_state(Loading, BufferComplete), None);
        assert_eq!(next_state(Loading, Play), None);
        assert_eq!(next_state(Playing, Play), None);
        assert_eq!(next_state(Playing, LoadComplete), None);
        assert_eq!(next_state(Playing, Resume), None);
        assert_eq!(next_state(Paused, Pause), None);
        assert_eq!(next_state(Paused, BufferStart), None);
        assert_eq!(next_state(Error, Stop), None);
        assert_eq!(next_state(Error, Recover), Some(Idle));
    }

    #[test]
    fn test_every_pair_total() {
        // The lookup is total: every pair either maps to a state or is
        // rejected, and only Play/ErrorOccurred leave Idle.
        for state in ALL_STATES {
            for event in ALL_EVENTS {
                let next = next_state(state, event);
                if state == Idle {
                    let leaves = matches!(event, Play | ErrorOccurred);
                    assert_eq!(next.is_some(), leaves, "({:?}, {:?})", state, event);
                }
                if let Some(next) = next {
                    // No transition targets the same state
                    assert_ne!(next, state, "({:?}, {:?})", state, event);
                }
            }
        }
    }
}
