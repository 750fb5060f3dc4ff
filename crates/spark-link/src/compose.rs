//! 组合算子：`concat`、`split`/`when`、`from` 与 `empty`。
//!
//! # 教案式说明
//! - **意图（Why）**：链路在执行前以纯同步方式装配；组合从不修改已有单元，总是返回新的 [`Link`]。
//! - **逻辑（How）**：
//!   1. `concat(a, b)`：`a` 终止时发出诊断并原样返回 `a`；否则返回新单元，其续延指向 `b`，
//!      终止标记继承自 `b`；
//!   2. `split(test, l, r)`：按谓词把 `(operation, forward)` 整体派发给某一分支；两分支都终止时组合体终止；
//!   3. `from(units)`：自左向右反复 `concat`；空列表返回 [`empty`]。
//! - **契约（What）**：诊断只在构造期发出，终止标记构造后不再改变。

use std::{borrow::Cow, sync::Arc};

use crate::{
    diagnostics::{self, Diagnostic},
    link::{Forward, Link, LinkOutcome, LinkUnit, RequestHandler},
    operation::Operation,
    stream::ResultStream,
};

type Predicate = dyn Fn(&Operation) -> bool + Send + Sync;

/// 顺序拼接两个单元。
pub fn concat(first: impl Into<LinkUnit>, second: impl Into<LinkUnit>) -> Link {
    let first = first.into().into_link();
    if first.is_terminating() {
        diagnostics::emit(Diagnostic::TerminatingConcat {
            link: format!("{first:?}"),
        });
        return first;
    }

    let second = second.into().into_link();
    let terminating = second.is_terminating();
    Link::with_flag(Arc::new(Concat { first, second }), terminating)
}

struct Concat {
    first: Link,
    second: Link,
}

impl RequestHandler for Concat {
    fn request(&self, operation: Operation, forward: Option<Forward>) -> LinkOutcome {
        let then = if self.second.is_terminating() {
            None
        } else {
            forward
        };
        let to_second = Forward::to(self.second.clone(), then);
        Ok(Some(
            self.first
                .request(operation, Some(to_second))?
                .unwrap_or_else(ResultStream::empty),
        ))
    }

    fn name(&self) -> Cow<'static, str> {
        Cow::Owned(format!(
            "concat({}, {})",
            self.first.label(),
            self.second.label()
        ))
    }
}

/// 按谓词在两个单元之间分支。
pub fn split<P>(test: P, left: impl Into<LinkUnit>, right: impl Into<LinkUnit>) -> Link
where
    P: Fn(&Operation) -> bool + Send + Sync + 'static,
{
    let left = left.into().into_link();
    let right = right.into().into_link();
    let terminating = left.is_terminating() && right.is_terminating();
    Link::with_flag(
        Arc::new(Split {
            test: Arc::new(test),
            left,
            right,
            terminating,
        }),
        terminating,
    )
}

/// 省略右分支的 [`split`]：谓词为假时原样透传。
pub fn when<P>(test: P, left: impl Into<LinkUnit>) -> Link
where
    P: Fn(&Operation) -> bool + Send + Sync + 'static,
{
    split(test, left, Link::passthrough())
}

struct Split {
    test: Arc<Predicate>,
    left: Link,
    right: Link,
    terminating: bool,
}

impl RequestHandler for Split {
    fn request(&self, operation: Operation, forward: Option<Forward>) -> LinkOutcome {
        let branch = if (self.test)(&operation) {
            &self.left
        } else {
            &self.right
        };
        let forward = if self.terminating { None } else { forward };
        Ok(Some(
            branch
                .request(operation, forward)?
                .unwrap_or_else(ResultStream::empty),
        ))
    }

    fn is_terminating(&self) -> bool {
        self.terminating
    }

    fn name(&self) -> Cow<'static, str> {
        Cow::Owned(format!(
            "split({}, {})",
            self.left.label(),
            self.right.label()
        ))
    }
}

/// 自左向右折叠一组单元。
///
/// 空列表得到 [`empty`]；单元素列表得到该元素本身（函数变体被规范化为 [`Link`]）。
/// 折叠过程中每遇到一次“终止单元之后仍有单元”就发出一次诊断。
pub fn from<I>(units: I) -> Link
where
    I: IntoIterator,
    I::Item: Into<LinkUnit>,
{
    let mut units = units.into_iter().map(Into::into);
    let Some(first) = units.next() else {
        return empty();
    };
    units.fold(first.into_link(), |chain, next| concat(chain, next))
}

/// 忽略操作与续延、立即完成的终止单元。
pub fn empty() -> Link {
    Link::new(Empty)
}

struct Empty;

impl RequestHandler for Empty {
    fn request(&self, _operation: Operation, _forward: Option<Forward>) -> LinkOutcome {
        Ok(Some(ResultStream::empty()))
    }

    fn is_terminating(&self) -> bool {
        true
    }

    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("empty")
    }
}
