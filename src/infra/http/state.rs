use std::sync::Arc;

use crate::application::blog::BlogApi;
use crate::domain::forms::ValidationPolicy;

#[derive(Clone)]
pub struct HttpState {
    pub blog: BlogApi,
    pub validation: Arc<ValidationPolicy>,
}

impl HttpState {
    pub fn new(blog: BlogApi, validation: ValidationPolicy) -> Self {
        Self {
            blog,
            validation: Arc::new(validation),
        }
    }
}
