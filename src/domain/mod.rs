// Domain layer: request/response values and the model collaborator port.

pub mod model;
pub mod ports;
