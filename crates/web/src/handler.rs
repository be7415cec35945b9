use std::error::Error;
use std::fmt;
use std::future::Future;

use async_trait::async_trait;
use ferry_http::protocol::body::ReqBody;
use http::{Request, Response};

use crate::body::ResponseBody;

/// A handler registered in a [`DispatchTable`](crate::dispatch::DispatchTable).
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn invoke(&self, request: Request<ReqBody>) -> Result<Response<ResponseBody>, Box<dyn Error + Send + Sync>>;
}

/// an async Fn holder, see [`handler_fn`]
pub struct FnHandler<F> {
    f: F,
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}

/// Wraps an async function so it can be registered in a dispatch table.
///
/// Any response body convertible into [`ResponseBody`] is accepted.
pub fn handler_fn<F, Fut, B, E>(f: F) -> FnHandler<F>
where
    F: Fn(Request<ReqBody>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response<B>, E>> + Send,
    B: Into<ResponseBody> + Send,
    E: Into<Box<dyn Error + Send + Sync>> + Send,
{
    FnHandler { f }
}

#[async_trait]
impl<F, Fut, B, E> RequestHandler for FnHandler<F>
where
    F: Fn(Request<ReqBody>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response<B>, E>> + Send,
    B: Into<ResponseBody> + Send,
    E: Into<Box<dyn Error + Send + Sync>> + Send,
{
    async fn invoke(&self, request: Request<ReqBody>) -> Result<Response<ResponseBody>, Box<dyn Error + Send + Sync>> {
        let response = (self.f)(request).await.map_err(Into::into)?;
        Ok(response.map(Into::into))
    }
}
