//! 链路诊断：构造期与执行期的非致命告警。
//!
//! # 教案式说明
//! - **意图（Why）**：拼接到终止 Link 之后的组合不会生效、请求文档形态无法识别，这类问题不应中断执行，
//!   但必须被看见；集中在此模块发出，避免各处手写日志拼装。
//! - **逻辑（How）**：[`emit`] 依次查找当前线程的作用域 Sink（[`scoped`] 安装）、进程级 Sink
//!   （[`install_global`] 安装），都不存在时回退到 [`TracingSink`]，以 `WARN` 级别写入 `tracing`。
//! - **契约（What）**：告警文本模板是对外契约的一部分，见 [`Diagnostic::message`]；两类安装入口都返回守卫，
//!   守卫析构时恢复安装前的状态。
//! - **风险提示（Trade-offs）**：作用域 Sink 只覆盖当前线程；在其他线程轮询结果流时产生的告警会落到进程级 Sink。

use std::{cell::RefCell, fmt, marker::PhantomData, sync::Arc};

use parking_lot::{Mutex, RwLock};

/// 默认 Sink 写入日志时使用的 target。
pub const DIAGNOSTICS_TARGET: &str = "spark_link::diagnostics";

/// 一条诊断。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Diagnostic {
    /// 在终止 Link 上继续 `concat`/`split`，组合被丢弃。`link` 为该 Link 的调试表示。
    TerminatingConcat { link: String },
    /// 请求文档缺失，或既不是字符串也不是已解析的文档 AST。
    UnrecognizedDocument,
    /// 单值适配器（[`crate::stream::ResultStream::into_first`]）收到了多个结果。
    MultipleResults,
}

impl Diagnostic {
    /// 稳定诊断码。
    pub fn code(&self) -> &'static str {
        match self {
            Diagnostic::TerminatingConcat { .. } => "link.diagnostic.terminating_concat",
            Diagnostic::UnrecognizedDocument => "link.diagnostic.unrecognized_document",
            Diagnostic::MultipleResults => "link.diagnostic.multiple_results",
        }
    }

    /// 告警文本，与既有消费方约定的模板逐字一致。
    pub fn message(&self) -> String {
        match self {
            Diagnostic::TerminatingConcat { link } => format!(
                "You are calling concat on a terminating link, which will have no effect {link}"
            ),
            Diagnostic::UnrecognizedDocument => {
                "query should either be a string or GraphQL AST".to_owned()
            }
            Diagnostic::MultipleResults => {
                "Promise Wrapper does not support multiple results from Observable".to_owned()
            }
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// 诊断输出能力。
///
/// 实现方必须是线程安全的；`emit` 在构造链路或轮询结果流的线程上同步调用，不应阻塞。
pub trait DiagnosticSink: Send + Sync + 'static {
    fn emit(&self, diagnostic: &Diagnostic);
}

/// 默认 Sink：以 `WARN` 级别写入 `tracing`，附带 `code` 字段。
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&self, diagnostic: &Diagnostic) {
        tracing::warn!(
            target: DIAGNOSTICS_TARGET,
            code = diagnostic.code(),
            "{}",
            diagnostic
        );
    }
}

/// 把诊断记录在内存中的 Sink，主要用于测试断言。
#[derive(Debug, Default)]
pub struct RecordingSink {
    records: Mutex<Vec<Diagnostic>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// 取出并清空已记录的诊断。
    pub fn take(&self) -> Vec<Diagnostic> {
        core::mem::take(&mut *self.records.lock())
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// 统计某一诊断码出现的次数。
    pub fn count(&self, code: &str) -> usize {
        self.records
            .lock()
            .iter()
            .filter(|diagnostic| diagnostic.code() == code)
            .count()
    }
}

impl DiagnosticSink for RecordingSink {
    fn emit(&self, diagnostic: &Diagnostic) {
        self.records.lock().push(diagnostic.clone());
    }
}

/// 丢弃全部诊断的 Sink。
#[derive(Clone, Copy, Debug, Default)]
pub struct SilentSink;

impl DiagnosticSink for SilentSink {
    fn emit(&self, _diagnostic: &Diagnostic) {}
}

static GLOBAL_SINK: RwLock<Option<Arc<dyn DiagnosticSink>>> = parking_lot::const_rwlock(None);

thread_local! {
    static SCOPED_SINKS: RefCell<Vec<Arc<dyn DiagnosticSink>>> = const { RefCell::new(Vec::new()) };
}

/// 发出一条诊断。
pub fn emit(diagnostic: Diagnostic) {
    let scoped = SCOPED_SINKS.with(|sinks| sinks.borrow().last().cloned());
    if let Some(sink) = scoped {
        sink.emit(&diagnostic);
        return;
    }
    let global = GLOBAL_SINK.read().clone();
    match global {
        Some(sink) => sink.emit(&diagnostic),
        None => TracingSink.emit(&diagnostic),
    }
}

/// 在当前线程上安装作用域 Sink，守卫析构时弹出。
///
/// # 契约说明（What）
/// - 作用域可嵌套，最内层生效；
/// - 守卫不可跨线程移动（`!Send`），必须在安装它的线程上析构，保证栈式恢复顺序。
#[must_use = "守卫析构后作用域 Sink 立即失效"]
pub fn scoped(sink: Arc<dyn DiagnosticSink>) -> ScopedSinkGuard {
    SCOPED_SINKS.with(|sinks| sinks.borrow_mut().push(sink));
    ScopedSinkGuard {
        _not_send: PhantomData,
    }
}

/// [`scoped`] 返回的守卫。
#[derive(Debug)]
pub struct ScopedSinkGuard {
    _not_send: PhantomData<*const ()>,
}

impl Drop for ScopedSinkGuard {
    fn drop(&mut self) {
        SCOPED_SINKS.with(|sinks| {
            sinks.borrow_mut().pop();
        });
    }
}

/// 安装进程级 Sink，返回的守卫析构时恢复安装前的 Sink。
///
/// # 风险提示（Trade-offs）
/// - 进程级状态被同一进程内的所有线程共享；并发测试应优先使用 [`scoped`]。
#[must_use = "守卫析构后会恢复此前的进程级 Sink"]
pub fn install_global(sink: Arc<dyn DiagnosticSink>) -> GlobalSinkGuard {
    let previous = GLOBAL_SINK.write().replace(sink);
    GlobalSinkGuard { previous }
}

/// [`install_global`] 返回的守卫。
pub struct GlobalSinkGuard {
    previous: Option<Arc<dyn DiagnosticSink>>,
}

impl fmt::Debug for GlobalSinkGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalSinkGuard")
            .field("restores_previous", &self.previous.is_some())
            .finish()
    }
}

impl Drop for GlobalSinkGuard {
    fn drop(&mut self) {
        *GLOBAL_SINK.write() = self.previous.take();
    }
}
