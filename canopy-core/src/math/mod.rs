mod bounds;
pub use self::bounds::*;

mod affine;
pub use self::affine::*;
