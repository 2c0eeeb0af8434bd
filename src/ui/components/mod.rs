mod scroll_trigger;
mod search_controller;
mod tag_navigator;

pub use scroll_trigger::{LoadMoreTarget, ScrollTrigger, Sentinel, Viewport};
pub use search_controller::SearchController;
pub use tag_navigator::{NavState, TagNavigator};
