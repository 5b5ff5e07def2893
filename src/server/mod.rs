pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;

use std::sync::Arc;

use crate::judge::CompilerService;
use crate::testcases::TestCaseLoader;

pub use routes::create_router;

pub struct AppState {
    pub service: Arc<CompilerService>,
    pub store: Arc<dyn TestCaseLoader>,
}
