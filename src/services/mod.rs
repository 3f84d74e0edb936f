pub mod process_group;
pub mod reaper;
pub mod supervisor;
pub mod switch_monitor;
pub mod transition;

pub use reaper::ChildReaper;
pub use supervisor::PlaybackSupervisor;
pub use switch_monitor::SwitchMonitor;
pub use transition::TransitionEffect;
