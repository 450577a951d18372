pub mod activation;
pub mod group_manager;
pub mod group_store;
pub mod grouping;
pub mod panel_controller;
pub mod placement;
pub mod presenter;
pub mod request_source;
pub mod snapshot;
pub mod window_system;

pub use group_manager::GroupManager;
pub use group_store::GroupStore;
pub use grouping::GroupingEngine;
pub use panel_controller::PanelController;
pub use presenter::LogPresenter;
pub use request_source::create_request_source;
pub use snapshot::SnapshotProvider;
pub use window_system::create_window_system;
