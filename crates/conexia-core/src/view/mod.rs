//! View controllers
//!
//! Pure derivations (pagination, duplicate-name check, view mode) plus the
//! controllers that dispatch user actions to the gateway. Controllers never
//! write to a store's list; the store's subscription does that.

pub mod controller;
pub mod pagination;
pub mod training;
pub mod view_mode;

pub use controller::{AddDialog, ListStatus, ProjectView, ProjectViewController, is_duplicate_name};
pub use pagination::{PAGE_SIZE, Pagination, total_pages};
pub use training::{DeleteRequest, TrainingAction, TrainingBoard, actions_for};
pub use view_mode::{VIEW_MODE_KEY, ViewMode};
