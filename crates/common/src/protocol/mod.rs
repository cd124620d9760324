// Messages exchanged with the host at the engine boundary.

pub mod signal;
