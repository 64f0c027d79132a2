pub mod dispatch;
pub mod evaluate;
pub mod html;
pub mod pack;
pub mod scan;

pub use dispatch::dispatch;
