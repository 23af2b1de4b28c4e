mod common;
mod event;
mod rankings;
mod team;

pub use common::*;
pub use event::*;
pub use rankings::*;
pub use team::*;
