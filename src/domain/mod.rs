// Domain layer: booking data model and ports (interfaces) to the outside world.

pub mod model;
pub mod outcome;
pub mod ports;
