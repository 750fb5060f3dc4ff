//! Link 单元：链路中的一个可组合阶段。
//!
//! # 教案式说明
//! - **意图（Why）**：链路阶段有两种写法，一是直接给出处理函数（函数变体 [`FunctionLink`]），二是实现
//!   [`RequestHandler`] 的有状态对象（对象变体 [`Link`]）；组合算子必须一视同仁。
//! - **逻辑（How）**：[`LinkUnit`] 是两种变体的封闭枚举，二者都满足
//!   `handle(operation, forward) -> Result<Option<ResultStream>, LinkError>` 契约；函数变体在需要时
//!   规范化为对象变体。
//! - **契约（What）**：
//!   - 返回 `Ok(None)` 等价于立即完成的空流；
//!   - 同步返回的 `Err` 不被本层捕获，直接传播给 `execute` 的调用方；
//!   - “终止”标记在构造时一次性确定：函数变体由闭包形状（参数个数）决定，对象变体由
//!     [`RequestHandler::is_terminating`] 显式声明，缺省为保守的 `false`。
//! - **风险提示（Trade-offs）**：标记是对声明形状的静态判断，不是运行期行为的证明；
//!   条件性不转发的 Handler 仍被视为非终止。

use std::{borrow::Cow, fmt, sync::Arc};

use crate::{
    compose,
    error::{LinkError, Result},
    operation::Operation,
    stream::ResultStream,
};

/// Handler 的产出：`Ok(None)` 表示“什么也没有产出”。
pub type LinkOutcome = Result<Option<ResultStream>>;

type ForwardFn = dyn Fn(Operation) -> Result<ResultStream> + Send + Sync;
type TerminatingFn = dyn Fn(Operation) -> LinkOutcome + Send + Sync;
type ForwardingFn = dyn Fn(Operation, Option<Forward>) -> LinkOutcome + Send + Sync;

/// 指向链路中下一个单元的续延。
///
/// 可多次调用，每次调用独立产生一个结果流；下一个单元返回 `None` 时得到空流。
#[derive(Clone)]
pub struct Forward {
    next: Arc<ForwardFn>,
}

impl Forward {
    pub fn new<F>(next: F) -> Self
    where
        F: Fn(Operation) -> Result<ResultStream> + Send + Sync + 'static,
    {
        Self {
            next: Arc::new(next),
        }
    }

    /// 以指定单元作为下一跳，`then` 为该单元自身的续延。
    pub(crate) fn to(link: Link, then: Option<Forward>) -> Self {
        Self::new(move |operation| {
            Ok(link
                .request(operation, then.clone())?
                .unwrap_or_else(ResultStream::empty))
        })
    }

    /// 将操作交给下一个单元。
    pub fn call(&self, operation: Operation) -> Result<ResultStream> {
        (self.next)(operation)
    }
}

impl fmt::Debug for Forward {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Forward").finish_non_exhaustive()
    }
}

/// 对象变体的处理契约。
///
/// # 契约说明（What）
/// - `request` 可以在转发前修改操作的上下文；改写 `variables`/`query`/`extensions` 需构造新的 Operation；
/// - `forward` 为 `None` 表示当前单元位于链路末尾；
/// - 从不转发的实现应覆写 [`RequestHandler::is_terminating`] 返回 `true`，以便组合期诊断生效。
pub trait RequestHandler: Send + Sync + 'static {
    fn request(&self, operation: Operation, forward: Option<Forward>) -> LinkOutcome;

    /// 该处理器是否从不转发。
    fn is_terminating(&self) -> bool {
        false
    }

    /// 供诊断输出使用的名称。
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("anonymous")
    }
}

/// 对象变体：携带处理器与构造期确定的终止标记。
#[derive(Clone)]
pub struct Link {
    handler: Arc<dyn RequestHandler>,
    terminating: bool,
    label: Option<Cow<'static, str>>,
}

impl Link {
    /// 以处理器构造，终止标记取自 [`RequestHandler::is_terminating`]。
    pub fn new<H>(handler: H) -> Self
    where
        H: RequestHandler,
    {
        let terminating = handler.is_terminating();
        Self::with_flag(Arc::new(handler), terminating)
    }

    pub(crate) fn with_flag(handler: Arc<dyn RequestHandler>, terminating: bool) -> Self {
        Self {
            handler,
            terminating,
            label: None,
        }
    }

    /// 恒等转发：把操作原样交给下一个单元；没有下一个单元时返回配置错误。
    pub fn identity() -> Self {
        Self::new(Identity)
    }

    /// 透传：有下一个单元时原样转发，否则产出空流。
    pub fn passthrough() -> Self {
        Self::new(Passthrough)
    }

    /// 终止函数变体的便捷构造，见 [`FunctionLink::terminating`]。
    pub fn terminating<F>(handler: F) -> Self
    where
        F: Fn(Operation) -> LinkOutcome + Send + Sync + 'static,
    {
        FunctionLink::terminating(handler).into()
    }

    /// 转发函数变体的便捷构造，见 [`FunctionLink::forwarding`]。
    pub fn forwarding<F>(handler: F) -> Self
    where
        F: Fn(Operation, Option<Forward>) -> LinkOutcome + Send + Sync + 'static,
    {
        FunctionLink::forwarding(handler).into()
    }

    /// 为诊断输出附加可读标签。
    pub fn with_label(mut self, label: impl Into<Cow<'static, str>>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn label(&self) -> Cow<'static, str> {
        self.label.clone().unwrap_or_else(|| self.handler.name())
    }

    pub fn is_terminating(&self) -> bool {
        self.terminating
    }

    /// 处理一个操作。
    pub fn request(&self, operation: Operation, forward: Option<Forward>) -> LinkOutcome {
        self.handler.request(operation, forward)
    }

    /// `compose::concat(self, next)` 的方法形式。
    pub fn concat(&self, next: impl Into<LinkUnit>) -> Link {
        compose::concat(self.clone(), next)
    }

    /// `concat(self, split(test, left, right))` 的方法形式。
    pub fn split<P>(&self, test: P, left: impl Into<LinkUnit>, right: impl Into<LinkUnit>) -> Link
    where
        P: Fn(&Operation) -> bool + Send + Sync + 'static,
    {
        self.concat(compose::split(test, left, right))
    }

    /// `concat(self, when(test, left))` 的方法形式。
    pub fn when<P>(&self, test: P, left: impl Into<LinkUnit>) -> Link
    where
        P: Fn(&Operation) -> bool + Send + Sync + 'static,
    {
        self.concat(compose::when(test, left))
    }
}

impl Default for Link {
    /// 未指定处理器时采用恒等转发。
    fn default() -> Self {
        Self::identity()
    }
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link")
            .field("label", &self.label())
            .field("terminating", &self.terminating)
            .finish()
    }
}

impl FromIterator<LinkUnit> for Link {
    /// 与 [`compose::from`] 同义。
    fn from_iter<I: IntoIterator<Item = LinkUnit>>(units: I) -> Self {
        compose::from(units)
    }
}

struct Identity;

impl RequestHandler for Identity {
    fn request(&self, operation: Operation, forward: Option<Forward>) -> LinkOutcome {
        let forward = forward.ok_or_else(|| LinkError::missing_forward(self.name()))?;
        forward.call(operation).map(Some)
    }

    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("identity")
    }
}

struct Passthrough;

impl RequestHandler for Passthrough {
    fn request(&self, operation: Operation, forward: Option<Forward>) -> LinkOutcome {
        match forward {
            Some(forward) => forward.call(operation).map(Some),
            None => Ok(Some(ResultStream::empty())),
        }
    }

    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("passthrough")
    }
}

#[derive(Clone)]
enum FunctionShape {
    Terminating(Arc<TerminatingFn>),
    Forwarding(Arc<ForwardingFn>),
}

/// 函数变体：以闭包直接给出处理逻辑。
///
/// 闭包的参数个数即终止标记的依据：单参数闭包只接收操作，无从转发，因此是终止的；
/// 双参数闭包接收续延，被视为非终止。
#[derive(Clone)]
pub struct FunctionLink {
    shape: FunctionShape,
}

impl FunctionLink {
    /// 单参数（终止）函数。
    pub fn terminating<F>(handler: F) -> Self
    where
        F: Fn(Operation) -> LinkOutcome + Send + Sync + 'static,
    {
        Self {
            shape: FunctionShape::Terminating(Arc::new(handler)),
        }
    }

    /// 双参数（转发）函数。
    pub fn forwarding<F>(handler: F) -> Self
    where
        F: Fn(Operation, Option<Forward>) -> LinkOutcome + Send + Sync + 'static,
    {
        Self {
            shape: FunctionShape::Forwarding(Arc::new(handler)),
        }
    }

    /// 闭包声明的参数个数。
    pub fn arity(&self) -> usize {
        match self.shape {
            FunctionShape::Terminating(_) => 1,
            FunctionShape::Forwarding(_) => 2,
        }
    }

    pub fn is_terminating(&self) -> bool {
        self.arity() < 2
    }

    pub fn handle(&self, operation: Operation, forward: Option<Forward>) -> LinkOutcome {
        match &self.shape {
            FunctionShape::Terminating(handler) => handler(operation),
            FunctionShape::Forwarding(handler) => handler(operation, forward),
        }
    }
}

impl fmt::Debug for FunctionLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionLink")
            .field("arity", &self.arity())
            .finish()
    }
}

impl RequestHandler for FunctionLink {
    fn request(&self, operation: Operation, forward: Option<Forward>) -> LinkOutcome {
        self.handle(operation, forward)
    }

    fn is_terminating(&self) -> bool {
        FunctionLink::is_terminating(self)
    }

    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("function")
    }
}

impl From<FunctionLink> for Link {
    fn from(function: FunctionLink) -> Self {
        Link::new(function)
    }
}

/// 两种变体的封闭枚举，组合算子只面向它的统一契约。
#[derive(Clone, Debug)]
pub enum LinkUnit {
    Function(FunctionLink),
    Object(Link),
}

impl LinkUnit {
    pub fn is_terminating(&self) -> bool {
        match self {
            LinkUnit::Function(function) => function.is_terminating(),
            LinkUnit::Object(link) => link.is_terminating(),
        }
    }

    pub fn handle(&self, operation: Operation, forward: Option<Forward>) -> LinkOutcome {
        match self {
            LinkUnit::Function(function) => function.handle(operation, forward),
            LinkUnit::Object(link) => link.request(operation, forward),
        }
    }

    /// 规范化为对象变体。
    pub fn into_link(self) -> Link {
        match self {
            LinkUnit::Function(function) => function.into(),
            LinkUnit::Object(link) => link,
        }
    }
}

impl From<Link> for LinkUnit {
    fn from(link: Link) -> Self {
        LinkUnit::Object(link)
    }
}

impl From<&Link> for LinkUnit {
    fn from(link: &Link) -> Self {
        LinkUnit::Object(link.clone())
    }
}

impl From<FunctionLink> for LinkUnit {
    fn from(function: FunctionLink) -> Self {
        LinkUnit::Function(function)
    }
}
