use std::sync::Arc;

use crate::evaluation::FlagEvaluationService;

#[derive(Clone)]
pub struct AppState {
    pub evaluator: Arc<FlagEvaluationService>,
}
