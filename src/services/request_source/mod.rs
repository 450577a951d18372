//! RequestSource: responsibility and boundaries
//!
//! Sources translate external user input (stdin commands, a scripted demo) into
//! PanelRequest values and push them into the controller channel.
//! They MUST NOT touch panel state or the window system directly.

mod dry_run;
mod stdin;
mod r#trait;

pub use self::r#trait::{create_request_source, RequestSourceTrait};
pub use self::stdin::parse_command;
