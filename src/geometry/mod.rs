pub mod path;
pub mod point;
pub mod primitive;

pub use path::{BoundingBox, Path};
pub use point::{FixedPoint, Point};
pub use primitive::{
    Aperture, ApertureMacro, ApertureShape, ArcDirection, FlashShape, MacroPrimitive, Polarity,
    Primitive, TraceInterpolation,
};
