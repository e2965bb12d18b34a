mod add_status;
mod live;

pub use add_status::add_status;
pub use live::live;
