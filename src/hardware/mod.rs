pub mod framebuffer;
pub mod gpio;

pub use framebuffer::Framebuffer;
pub use gpio::{Backlight, RaspiGpio, SwitchProvider, SysfsGpio};
