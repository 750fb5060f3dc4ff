//! 结果流 [`ResultStream`] 与结果记录 [`FetchResult`]。
//!
//! # 教案式说明
//! - **意图（Why）**：Link 的产出是“零到多个结果，随后一个错误或完成”的可取消异步序列；以
//!   `futures::Stream` 表达，取消即 `Drop`，内层流的所有权随外层流一起释放。
//! - **逻辑（How）**：[`ResultStream`] 包装 `BoxStream<'static, Result<FetchResult, LinkError>>`，并在产出
//!   第一个 `Err` 后强制结束，保证“错误即终止”的语义不依赖内层实现的自觉。
//! - **契约（What）**：构造入口 `empty`/`of`/`once`/`from_error`/`from_future`/`channel` 覆盖同步、
//!   单值异步与推送式三种来源；`into_first`/`into_first_and_rest` 提供单值适配。

use std::{
    fmt,
    future::Future,
    pin::Pin,
    task::{Context as TaskContext, Poll},
};

use futures::{
    FutureExt, Stream, StreamExt, future,
    channel::mpsc::{self, UnboundedSender},
    stream::{self, BoxStream},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    diagnostics::{self, Diagnostic},
    error::{LinkError, Result},
};

/// 终端 Link 产出的结果记录。
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Map<String, Value>>,
}

impl FetchResult {
    /// 仅携带载荷的结果。
    pub fn data(data: Value) -> Self {
        Self {
            data: Some(data),
            ..Self::default()
        }
    }

    pub fn with_errors(mut self, errors: Vec<Value>) -> Self {
        self.errors = Some(errors);
        self
    }

    pub fn with_extensions(mut self, extensions: Map<String, Value>) -> Self {
        self.extensions = Some(extensions);
        self
    }
}

/// 结果流中的单个元素。
pub type StreamItem = Result<FetchResult, LinkError>;

/// 可取消的结果流。
pub struct ResultStream {
    inner: BoxStream<'static, StreamItem>,
    terminated: bool,
}

impl ResultStream {
    /// 包装任意满足约束的流。
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = StreamItem> + Send + 'static,
    {
        Self {
            inner: stream.boxed(),
            terminated: false,
        }
    }

    /// 立即完成、不产出任何结果。
    pub fn empty() -> Self {
        Self::new(stream::empty())
    }

    /// 依次同步产出给定结果后完成。
    pub fn of<I>(results: I) -> Self
    where
        I: IntoIterator<Item = FetchResult>,
        I::IntoIter: Send + 'static,
    {
        Self::new(stream::iter(results).map(Ok))
    }

    /// 产出一个结果后完成。
    pub fn once(result: FetchResult) -> Self {
        Self::of([result])
    }

    /// 立即以错误结束。
    pub fn from_error(error: LinkError) -> Self {
        Self::new(stream::once(async move { Err(error) }))
    }

    /// 以单值 Future 的结果构造流：`Ok` 产出一个结果后完成，`Err` 以错误结束。
    pub fn from_future<F>(future: F) -> Self
    where
        F: Future<Output = StreamItem> + Send + 'static,
    {
        Self::new(future.into_stream())
    }

    /// 推送式来源：返回发射端与对应的结果流。
    ///
    /// 结果流被丢弃后，[`Emitter::is_closed`] 返回 `true`，发射端据此停止产出并释放资源。
    pub fn channel() -> (Emitter, Self) {
        let (sender, receiver) = mpsc::unbounded();
        (Emitter { sender }, Self::new(receiver))
    }

    /// 对每个成功结果做变换，错误原样透传。
    pub fn map_results<F>(self, mut transform: F) -> Self
    where
        F: FnMut(FetchResult) -> FetchResult + Send + 'static,
    {
        Self::new(self.map(move |item| item.map(&mut transform)))
    }

    /// 观察每个元素而不改变它。
    pub fn inspect<F>(self, observe: F) -> Self
    where
        F: FnMut(&StreamItem) + Send + 'static,
    {
        Self::new(StreamExt::inspect(self, observe))
    }

    /// 单值适配：返回第一个结果。
    ///
    /// # 契约说明（What）
    /// - 拿到第一个结果即返回，不等待流结束；其余部分随 `self` 一起析构，即取消订阅；
    /// - 在任何结果之前出现的错误作为 `Err` 返回；
    /// - 流未产出任何结果即完成时返回 `Ok(None)`。
    ///
    /// 需要继续观察后续结果时使用 [`ResultStream::into_first_and_rest`]。
    pub async fn into_first(self) -> Result<Option<FetchResult>> {
        let (first, _rest) = self.into_first_and_rest().await?;
        Ok(first)
    }

    /// 返回第一个结果与剩余部分。
    ///
    /// # 契约说明（What）
    /// - 第一个结果到达即返回，剩余部分由调用方决定是否驱动；
    /// - 剩余部分每产出一个结果发出一次 [`Diagnostic::MultipleResults`]，结果本身被丢弃；
    ///   其中出现的错误记录 `debug` 日志后结束剩余部分；
    /// - 在任何结果之前出现的错误作为 `Err` 返回；流未产出任何结果即完成时返回 `(None, 空流)`。
    pub async fn into_first_and_rest(mut self) -> Result<(Option<FetchResult>, ResultStream)> {
        match self.next().await {
            Some(Ok(first)) => {
                let rest = self.filter_map(|item| {
                    match item {
                        Ok(_) => diagnostics::emit(Diagnostic::MultipleResults),
                        Err(error) => {
                            tracing::debug!(
                                code = error.code(),
                                "ignoring error after first result"
                            );
                        }
                    }
                    future::ready(None::<StreamItem>)
                });
                Ok((Some(first), ResultStream::new(rest)))
            }
            Some(Err(error)) => Err(error),
            None => Ok((None, ResultStream::empty())),
        }
    }

    /// 驱动流至结束并丢弃全部元素。
    pub async fn drain(mut self) {
        while self.next().await.is_some() {}
    }

    /// 收集全部结果；遇到错误即返回该错误。
    pub async fn collect_results(mut self) -> Result<Vec<FetchResult>> {
        let mut results = Vec::new();
        while let Some(item) = self.next().await {
            results.push(item?);
        }
        Ok(results)
    }
}

impl Stream for ResultStream {
    type Item = StreamItem;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        if self.terminated {
            return Poll::Ready(None);
        }
        match self.inner.poll_next_unpin(cx) {
            Poll::Ready(Some(Err(error))) => {
                self.terminated = true;
                Poll::Ready(Some(Err(error)))
            }
            Poll::Ready(None) => {
                self.terminated = true;
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

impl fmt::Debug for ResultStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultStream")
            .field("terminated", &self.terminated)
            .finish_non_exhaustive()
    }
}

/// 推送式结果流的发射端。
#[derive(Clone, Debug)]
pub struct Emitter {
    sender: UnboundedSender<StreamItem>,
}

impl Emitter {
    /// 推送一个结果；流已关闭时返回 `false`。
    pub fn next(&self, result: FetchResult) -> bool {
        self.sender.unbounded_send(Ok(result)).is_ok()
    }

    /// 推送错误并关闭流。
    pub fn error(&self, error: LinkError) {
        let _ = self.sender.unbounded_send(Err(error));
        self.sender.close_channel();
    }

    /// 完成并关闭流。
    pub fn complete(&self) {
        self.sender.close_channel();
    }

    /// 消费端是否已取消订阅或流已关闭。
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
