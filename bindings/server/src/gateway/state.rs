use std::sync::Arc;

use facematch::Verifier;

#[derive(Clone)]
pub struct AppState {
    pub verifier: Arc<Verifier>,

    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(verifier: Arc<Verifier>, max_body_bytes: usize) -> Self {
        Self {
            verifier,
            max_body_bytes,
        }
    }
}
