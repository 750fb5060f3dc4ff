//! 结果改写阶段。

use std::{borrow::Cow, sync::Arc};

use spark_link::{FetchResult, Forward, Link, LinkError, LinkOutcome, Operation, RequestHandler};

type MapFn = dyn Fn(&Operation, FetchResult) -> FetchResult + Send + Sync;

/// 转发后逐个改写下游产出的结果，错误原样透传。
///
/// 改写函数收到的是转发时的操作，可据此读取变量或上下文。
#[derive(Clone)]
pub struct MapResultLink {
    transform: Arc<MapFn>,
}

impl MapResultLink {
    pub fn new<F>(transform: F) -> Self
    where
        F: Fn(&Operation, FetchResult) -> FetchResult + Send + Sync + 'static,
    {
        Self {
            transform: Arc::new(transform),
        }
    }
}

impl RequestHandler for MapResultLink {
    fn request(&self, operation: Operation, forward: Option<Forward>) -> LinkOutcome {
        let forward = forward.ok_or_else(|| LinkError::missing_forward(self.name()))?;
        let stream = forward.call(operation.clone())?;
        let transform = Arc::clone(&self.transform);
        Ok(Some(
            stream.map_results(move |result| transform(&operation, result)),
        ))
    }

    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("map_results")
    }
}

/// 以闭包构造结果改写阶段。
pub fn map_results<F>(transform: F) -> Link
where
    F: Fn(&Operation, FetchResult) -> FetchResult + Send + Sync + 'static,
{
    Link::new(MapResultLink::new(transform))
}
