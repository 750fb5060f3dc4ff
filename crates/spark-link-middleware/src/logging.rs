use std::{
    borrow::Cow,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

use futures::{StreamExt, future, stream};
use spark_link::{
    Forward, Link, LinkError, LinkOutcome, Operation, RequestHandler, ResultStream, StreamItem,
};
use tracing::Level;

/// 日志目标，所有记录共用，便于在订阅端按目标过滤。
const TARGET: &str = "spark_link_middleware::logging";

/// 微秒数超出 `u64` 时取 `u64::MAX`。
fn saturating_micros(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX)
}

macro_rules! event_at {
    ($level:expr, $($rest:tt)+) => {
        match $level {
            level if level == Level::ERROR => tracing::error!(target: TARGET, $($rest)+),
            level if level == Level::WARN => tracing::warn!(target: TARGET, $($rest)+),
            level if level == Level::INFO => tracing::info!(target: TARGET, $($rest)+),
            level if level == Level::DEBUG => tracing::debug!(target: TARGET, $($rest)+),
            _ => tracing::trace!(target: TARGET, $($rest)+),
        }
    };
}

/// 日志阶段的配置。
///
/// # 教案式说明
/// - **意图（Why）**：不同链路对日志量的容忍度不同，级别与是否逐条记录结果应可外部调整。
/// - **结构（How）**：`label` 作为 `link` 字段写入每条记录，用于区分同一进程内的多条链路；
///   `level` 控制开始、结果与完成事件的级别；`log_results` 决定是否逐条记录结果。
/// - **契约（What）**：错误事件恒以 `ERROR` 级别输出，不受 `level` 影响。
/// - **风险提示（Trade-offs）**：高频链路打开 `log_results` 且使用 `INFO` 级别可能造成日志风暴。
#[derive(Clone, Debug)]
pub struct LoggingLinkConfig {
    pub label: Cow<'static, str>,
    pub level: Level,
    pub log_results: bool,
}

impl Default for LoggingLinkConfig {
    fn default() -> Self {
        Self {
            label: Cow::Borrowed("logging"),
            level: Level::DEBUG,
            log_results: true,
        }
    }
}

/// 记录操作开始、每个结果、错误与完成的转发阶段。
///
/// # 契约说明（What）
/// - 不改变操作与结果，只观察；
/// - 完成事件仅在结果流正常结束时输出，流以错误结束时输出错误事件；
/// - 下游同步返回的错误在记录后原样传播。
#[derive(Clone, Debug, Default)]
pub struct LoggingLink {
    config: LoggingLinkConfig,
}

impl LoggingLink {
    pub fn new(config: LoggingLinkConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LoggingLinkConfig {
        &self.config
    }

    /// 转换为可组合的 [`Link`]，标签取自配置。
    pub fn into_link(self) -> Link {
        let label = self.config.label.clone();
        Link::new(self).with_label(label)
    }
}

impl RequestHandler for LoggingLink {
    fn request(&self, operation: Operation, forward: Option<Forward>) -> LinkOutcome {
        let forward = forward.ok_or_else(|| LinkError::missing_forward(self.name()))?;
        let label = self.config.label.clone();
        let level = self.config.level;
        let operation_name = operation
            .operation_name()
            .unwrap_or("anonymous")
            .to_owned();
        event_at!(
            level,
            link = %label,
            operation = %operation_name,
            "link operation started"
        );

        let downstream = match forward.call(operation) {
            Ok(downstream) => downstream,
            Err(error) => {
                tracing::error!(
                    target: TARGET,
                    link = %label,
                    operation = %operation_name,
                    code = error.code(),
                    error = %error,
                    "link operation rejected"
                );
                return Err(error);
            }
        };

        let started = Instant::now();
        let results = Arc::new(AtomicUsize::new(0));
        let observed = {
            let label = label.clone();
            let operation_name = operation_name.clone();
            let results = Arc::clone(&results);
            let log_results = self.config.log_results;
            downstream.inspect(move |item| match item {
                Ok(_) => {
                    let index = results.fetch_add(1, Ordering::Relaxed);
                    if log_results {
                        event_at!(
                            level,
                            link = %label,
                            operation = %operation_name,
                            index,
                            "link operation produced result"
                        );
                    }
                }
                Err(error) => tracing::error!(
                    target: TARGET,
                    link = %label,
                    operation = %operation_name,
                    code = error.code(),
                    error = %error,
                    "link operation failed"
                ),
            })
        };
        let completion = stream::once(async move {
            event_at!(
                level,
                link = %label,
                operation = %operation_name,
                results = results.load(Ordering::Relaxed),
                elapsed_us = saturating_micros(started.elapsed()),
                "link operation completed"
            );
            None::<StreamItem>
        })
        .filter_map(future::ready);

        Ok(Some(ResultStream::new(observed.chain(completion))))
    }

    fn name(&self) -> Cow<'static, str> {
        self.config.label.clone()
    }
}
