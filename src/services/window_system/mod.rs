//! WindowSystem: responsibility and boundaries
//!
//! This module and its submodules are responsible ONLY for talking to the host
//! windowing subsystem (windows, processes, icons, monitors, cursor).
//! It MUST NOT contain filtering, classification or placement decisions; those
//! belong to SnapshotProvider, GroupManager and the placement engine.

mod dry_run;
mod pixels;
mod r#trait;
#[cfg(windows)]
mod win32;

pub use self::dry_run::{DryRunWindowSystem, FakeProcess, FakeWindow};
pub use self::r#trait::{
    create_window_system, IconOwnership, RawIcon, ScopedIcon, WindowStyle, WindowSystem,
};
