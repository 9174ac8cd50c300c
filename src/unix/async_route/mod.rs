mod tokio;
pub(crate) use tokio::*;
