pub mod entities;
pub mod normalizer;
pub mod ports;
pub mod value_objects;
