use tokio::time::Instant;

/// Power/playback state, owned by the controller
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PowerState {
    Off,
    Playing,
    Paused,
}

/// Raw touch record forwarded by the touch monitor
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TouchEvent {
    Press(Instant),
    Release(Instant),
}

/// Resolved tap gesture
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Gesture {
    SingleTap,
    DoubleTap,
}

/// Change of the power switch level between two polls
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwitchEdge {
    BecameOn,
    BecameOff,
}
