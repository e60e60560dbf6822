pub mod ascii_preview;
pub mod console;
pub mod login;
pub mod radar;

pub use ascii_preview::AsciiRenderer;
pub use console::TerminalConsole;
pub use login::{Credentials, Feature};
pub use radar::{RadarChart, SvgChartWriter};
