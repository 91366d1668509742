pub mod prelude;

pub mod resource_lock;
