// Pure rule engine: no I/O, safe to call from anywhere
pub mod scoring {
    pub use crate::scoring::*;
}

pub mod categorization {
    pub use crate::categorization::*;
}

pub mod sentiment {
    pub use crate::sentiment::*;
}

pub mod email_generator {
    pub use crate::email_generator::*;
}

pub mod access {
    pub use crate::access::*;
}
