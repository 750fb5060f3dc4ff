//! 组合算子的行为契约。

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use futures::executor::block_on;
use serde_json::{Value, json};
use spark_link::{
    ContextMap, FetchResult, FunctionLink, Link, LinkError, LinkUnit, Operation, RecordingSink,
    Request, ResultStream, concat, diagnostics, empty, execute, from, split, when,
};

fn partial(value: Value) -> ContextMap {
    match value {
        Value::Object(map) => map,
        _ => unreachable!("测试输入必须是对象"),
    }
}

fn request() -> Request {
    Request::new("query Sample { sample }")
}

fn results(link: impl Into<LinkUnit>) -> Vec<FetchResult> {
    block_on(
        execute(link, request())
            .expect("执行不应同步失败")
            .collect_results(),
    )
    .expect("不应出现流错误")
}

fn forward_or_empty() -> Link {
    Link::forwarding(|op, forward| match forward {
        Some(forward) => forward.call(op).map(Some),
        None => Ok(Some(ResultStream::empty())),
    })
}

fn data_of(value: Value) -> Link {
    Link::terminating(move |_| Ok(Some(ResultStream::once(FetchResult::data(value.clone())))))
}

/// 三段链路：A 写入上下文，B 基于上下文累加后转发，C 读取上下文产出结果。
///
/// # 教案式说明
/// - **测试目标（Why）**：验证转发严格按拼接顺序进行，且上游在转发前的上下文写入对下游可见；
/// - **验收契约（What）**：恰好产出一个 `{data: 3}` 后完成。
#[test]
fn context_written_upstream_is_visible_downstream() {
    let a = FunctionLink::forwarding(|op, forward| {
        op.set_context(partial(json!({ "add": 1 })));
        forward
            .ok_or_else(|| LinkError::missing_forward("a"))?
            .call(op)
            .map(Some)
    });
    let b = FunctionLink::forwarding(|op, forward| {
        op.update_context(|current| {
            let add = current.get("add").and_then(Value::as_i64).unwrap_or_default();
            partial(json!({ "add": add + 2 }))
        });
        forward
            .ok_or_else(|| LinkError::missing_forward("b"))?
            .call(op)
            .map(Some)
    });
    let c = FunctionLink::terminating(|op| {
        let add = op.get_context().get("add").cloned().unwrap_or(Value::Null);
        Ok(Some(ResultStream::once(FetchResult::data(add))))
    });

    assert_eq!(results(from([a, b, c])), vec![FetchResult::data(json!(3))]);
}

#[test]
fn concat_onto_terminating_link_is_a_warned_no_op() {
    let sink = RecordingSink::new();
    let _guard = diagnostics::scoped(sink.clone());

    let calls = Arc::new(AtomicUsize::new(0));
    let counted = {
        let calls = Arc::clone(&calls);
        Link::forwarding(move |op, forward| {
            calls.fetch_add(1, Ordering::SeqCst);
            forward.map(|forward| forward.call(op)).transpose()
        })
    };

    let terminal = data_of(json!({ "x": 1 }));
    let composed = concat(terminal.clone(), counted);

    assert_eq!(sink.count("link.diagnostic.terminating_concat"), 1);
    assert!(composed.is_terminating());
    assert_eq!(results(composed), results(terminal));
    assert_eq!(calls.load(Ordering::SeqCst), 0, "被丢弃的单元不应被调用");
    assert_eq!(sink.len(), 1, "执行阶段不应追加组合诊断");
}

#[test]
fn terminating_concat_diagnostic_carries_the_link() {
    let sink = RecordingSink::new();
    let _guard = diagnostics::scoped(sink.clone());

    let _ = data_of(json!(1)).with_label("http").concat(forward_or_empty());

    let message = sink.take().pop().expect("应记录一条诊断").message();
    assert_eq!(
        message,
        r#"You are calling concat on a terminating link, which will have no effect Link { label: "http", terminating: true }"#
    );
}

#[test]
fn split_true_behaves_like_left() {
    let left = data_of(json!("left"));
    let right = data_of(json!("right"));
    assert_eq!(results(split(|_| true, left.clone(), right.clone())), results(left));
    assert_eq!(results(split(|_| false, data_of(json!("left")), right.clone())), results(right));
}

#[test]
fn split_false_without_right_forwards_unchanged() {
    let seen = Arc::new(parking_lot::Mutex::new(None::<Operation>));
    let recorder = {
        let seen = Arc::clone(&seen);
        Link::terminating(move |op| {
            *seen.lock() = Some(op);
            Ok(Some(ResultStream::once(FetchResult::data(json!("next")))))
        })
    };

    let link = when(|_| false, data_of(json!("branch"))).concat(recorder);

    assert_eq!(results(link), vec![FetchResult::data(json!("next"))]);
    let forwarded = seen.lock().take().expect("应转发到下一个单元");
    assert_eq!(forwarded.operation_name(), None);
    assert_eq!(forwarded.query().as_text(), Some("query Sample { sample }"));
}

#[test]
fn split_dispatches_on_operation_fields() {
    let link = split(
        |op| op.variables().contains_key("id"),
        data_of(json!("by-id")),
        data_of(json!("list")),
    );
    let by_id = block_on(
        execute(&link, request().with_variables(partial(json!({ "id": 1 }))))
            .expect("执行")
            .into_first(),
    )
    .expect("无流错误");
    assert_eq!(by_id, Some(FetchResult::data(json!("by-id"))));
    assert_eq!(results(&link), vec![FetchResult::data(json!("list"))]);
}

#[test]
fn split_returning_nothing_completes_empty() {
    let link = when(|_| true, FunctionLink::terminating(|_| Ok(None)));
    assert!(results(link).is_empty());
}

#[test]
fn terminating_split_triggers_diagnostic_on_further_composition() {
    let sink = RecordingSink::new();
    let _guard = diagnostics::scoped(sink.clone());

    let both = split(|_| true, data_of(json!(1)), data_of(json!(2)));
    assert!(both.is_terminating());
    assert!(sink.is_empty());

    let _ = both.when(|_| true, forward_or_empty());
    let _ = concat(both, forward_or_empty());
    assert_eq!(sink.count("link.diagnostic.terminating_concat"), 2);
}

#[test]
fn from_empty_list_is_empty() {
    let link = from(Vec::<Link>::new());
    assert!(link.is_terminating());
    assert!(results(link).is_empty());
    assert!(results(empty()).is_empty());
}

#[test]
fn from_single_forwarding_function_equals_the_function() {
    let function = FunctionLink::forwarding(|_op, _forward| {
        Ok(Some(ResultStream::once(FetchResult::data(json!("self")))))
    });
    let folded = from([function.clone()]);
    assert!(!folded.is_terminating());
    assert_eq!(results(folded), results(function));
}

#[test]
fn from_mixes_function_and_object_variants() {
    let prefix = FunctionLink::forwarding(|op, forward| {
        op.set_context(partial(json!({ "via": "function" })));
        forward
            .ok_or_else(|| LinkError::missing_forward("prefix"))?
            .call(op)
            .map(Some)
    });
    let terminal = Link::terminating(|op| {
        Ok(Some(ResultStream::once(FetchResult::data(Value::Object(
            op.get_context(),
        )))))
    });
    let units: [LinkUnit; 2] = [prefix.into(), terminal.into()];
    let link: Link = units.into_iter().collect();

    assert_eq!(
        results(link),
        vec![FetchResult::data(json!({ "via": "function" }))]
    );
}

#[test]
fn non_terminating_tail_without_continuation_is_configuration_error() {
    let link = concat(forward_or_empty(), Link::default());
    let err = execute(link, request()).expect_err("末尾的恒等转发必须失败");
    assert!(err.is_configuration());
}

#[test]
fn forwarding_proceeds_left_to_right_regardless_of_nesting() {
    let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let step = |name: &'static str| {
        let order = Arc::clone(&order);
        Link::forwarding(move |op, forward| {
            order.lock().push(name);
            forward
                .ok_or_else(|| LinkError::missing_forward(name))?
                .call(op)
                .map(Some)
        })
    };
    let tail = Link::terminating(|_| Ok(None));

    let left_nested = concat(concat(step("a"), step("b")), concat(step("c"), tail.clone()));
    results(left_nested);
    assert_eq!(*order.lock(), ["a", "b", "c"]);

    order.lock().clear();
    let right_nested = concat(step("a"), concat(step("b"), concat(step("c"), tail)));
    results(right_nested);
    assert_eq!(*order.lock(), ["a", "b", "c"]);
}

#[test]
fn handlers_may_forward_more_than_once() {
    let twice = Link::forwarding(|op, forward| {
        let forward = forward.ok_or_else(|| LinkError::missing_forward("twice"))?;
        let first = forward.call(op.clone())?;
        let second = forward.call(op)?;
        Ok(Some(ResultStream::new(futures::StreamExt::chain(first, second))))
    });
    let counter = Arc::new(AtomicUsize::new(0));
    let numbered = {
        let counter = Arc::clone(&counter);
        Link::terminating(move |_| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            Ok(Some(ResultStream::once(FetchResult::data(json!(n)))))
        })
    };

    assert_eq!(
        results(twice.concat(numbered)),
        vec![FetchResult::data(json!(0)), FetchResult::data(json!(1))]
    );
}

#[test]
fn composition_never_mutates_existing_links() {
    let base = forward_or_empty();
    let _extended = base.concat(data_of(json!(1)));
    assert!(!base.is_terminating(), "原单元的终止标记不应改变");
    assert!(results(&base).is_empty());
}
