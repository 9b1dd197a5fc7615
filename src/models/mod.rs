pub mod allergy;
pub mod enums;
pub mod lab;
pub mod radiology;
pub mod share;
pub mod vital_sign;

pub use allergy::*;
pub use enums::*;
pub use lab::*;
pub use radiology::*;
pub use share::*;
pub use vital_sign::*;
