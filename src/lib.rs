//! WEDGETRACE - angle propagation through a stack of wedged, partially
//! reflective mirrors, and the inverse problem of recovering the wedge
//! geometry from observed reflection angles.

pub mod error;
pub mod fit;
pub mod mirror;
pub mod operator;
pub mod output;
pub mod settings;
pub mod stack;
pub mod surface;
pub mod wedge;
