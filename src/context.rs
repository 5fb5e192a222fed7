//! Per-request context shared by every unit in a run.

use std::sync::Arc;

use crate::app::App;
use crate::request::Request;
use crate::response::Response;

/// What a middleware unit gets to work with: the request, the response being
/// written, and the application that owns the chain (for settings lookups).
///
/// One `Context` exists per request. It is created by [`App::run`] and owned
/// by that run alone, so the `resolved` flag and path params on `req` never
/// leak between requests.
pub struct Context {
    pub req: Request,
    pub res: Response,
    pub app: Arc<App>,
}

impl Context {
    pub fn new(req: Request, res: Response, app: Arc<App>) -> Self {
        Self { req, res, app }
    }
}
