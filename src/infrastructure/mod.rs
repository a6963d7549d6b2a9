pub mod ui_driver;

pub use ui_driver::{ElementRef, PortalDriver, UiDriver};
