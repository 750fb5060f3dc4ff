//! Operation 携带的可变旁路上下文。
//!
//! # 教案式说明
//! - **意图（Why）**：上游 Link 在转发前写入的信息（鉴权头、追踪标记、计数等）必须对下游可见，
//!   同时上下文不能作为 Operation 的普通字段被随意改写。
//! - **逻辑（How）**：[`Context`] 是一个共享句柄，内部以 `parking_lot::Mutex` 守护映射与“是否已暴露”标记；
//!   读取总是返回快照，写入总是浅合并。
//! - **契约（What）**：只有 [`Context::get`]、[`Context::merge`]、[`Context::update`] 三个入口能触碰上下文；
//!   克隆句柄即是刻意的别名，两个句柄观察同一份数据。

use std::{fmt, sync::Arc};

use parking_lot::Mutex;
use serde_json::{Map, Value};

/// 上下文映射类型。
pub type ContextMap = Map<String, Value>;

#[derive(Debug, Default)]
struct ContextState {
    values: ContextMap,
    exposed: bool,
}

/// 上下文句柄。
#[derive(Clone, Default)]
pub struct Context {
    state: Arc<Mutex<ContextState>>,
}

impl Context {
    /// 空上下文，首次写入前不暴露。
    pub fn new() -> Self {
        Self::default()
    }

    /// 以调用方提供的映射为初始值，立即暴露。
    pub fn seeded(values: ContextMap) -> Self {
        Self {
            state: Arc::new(Mutex::new(ContextState {
                values,
                exposed: true,
            })),
        }
    }

    /// 当前上下文的快照。
    pub fn get(&self) -> ContextMap {
        self.state.lock().values.clone()
    }

    /// 读取单个键。
    pub fn value(&self, key: &str) -> Option<Value> {
        self.state.lock().values.get(key).cloned()
    }

    /// 将 `partial` 浅合并进上下文，同名键被覆盖。
    pub fn merge(&self, partial: ContextMap) {
        let mut state = self.state.lock();
        state.values.extend(partial);
        state.exposed = true;
    }

    /// 以当前快照计算增量后浅合并。
    ///
    /// `derive` 在锁外执行，其中可以读取同一上下文；`derive` 执行期间的并发写入可能被覆盖。
    pub fn update<F>(&self, derive: F)
    where
        F: FnOnce(&ContextMap) -> ContextMap,
    {
        let snapshot = self.get();
        self.merge(derive(&snapshot));
    }

    /// 上下文是否已作为 Operation 的可枚举字段暴露（被播种或至少写入过一次）。
    pub fn is_exposed(&self) -> bool {
        self.state.lock().exposed
    }

    /// 两个句柄是否指向同一份上下文。
    pub fn ptr_eq(&self, other: &Context) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Context")
            .field("values", &state.values)
            .field("exposed", &state.exposed)
            .finish()
    }
}
