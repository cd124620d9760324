// termlight-common: shared types and protocol for the termlight workspace

pub mod protocol;
pub mod types;
