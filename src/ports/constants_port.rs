//! Constants source port.

use crate::domain::constants::Constants;
use crate::domain::error::KsauError;

pub trait ConstantsPort {
    fn load_constants(&self) -> Result<Constants, KsauError>;
}
