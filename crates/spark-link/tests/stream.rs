//! 结果流的取消、单值适配与推送式来源。

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use futures::{FutureExt, StreamExt, executor::block_on};
use serde_json::json;
use spark_link::{
    Diagnostic, Emitter, FetchResult, Link, LinkError, RecordingSink, Request, ResultStream,
    diagnostics, execute,
};

#[test]
fn dropping_the_stream_cancels_the_producer() {
    let emitter_slot = Arc::new(parking_lot::Mutex::new(None::<Emitter>));
    let terminal = {
        let emitter_slot = Arc::clone(&emitter_slot);
        Link::terminating(move |_| {
            let (emitter, stream) = ResultStream::channel();
            *emitter_slot.lock() = Some(emitter);
            Ok(Some(stream))
        })
    };
    let wrapper = Link::forwarding(|op, forward| {
        let forward = forward.ok_or_else(|| LinkError::missing_forward("wrapper"))?;
        Ok(Some(forward.call(op)?.map_results(|result| result)))
    });

    let mut stream = execute(wrapper.concat(terminal), Request::new("{ a }")).expect("执行");
    let emitter = emitter_slot.lock().take().expect("终端应已创建发射端");

    assert!(emitter.next(FetchResult::data(json!(1))));
    let first = block_on(stream.next()).map(|item| item.expect("无流错误"));
    assert_eq!(first, Some(FetchResult::data(json!(1))));
    assert!(!emitter.is_closed());

    drop(stream);
    assert!(emitter.is_closed(), "外层流析构后内层来源应感知取消");
    assert!(!emitter.next(FetchResult::data(json!(2))));
}

#[test]
fn emitter_error_terminates_the_stream() {
    let (emitter, stream) = ResultStream::channel();
    assert!(emitter.next(FetchResult::data(json!("a"))));
    emitter.error(LinkError::failed("upstream reset"));
    assert!(!emitter.next(FetchResult::data(json!("b"))));

    let items = block_on(stream.collect::<Vec<_>>());
    assert_eq!(items.len(), 2);
    assert!(matches!(items[1], Err(LinkError::Failed { .. })));
}

#[test]
fn emitter_complete_finishes_without_error() {
    let (emitter, stream) = ResultStream::channel();
    emitter.next(FetchResult::data(json!(1)));
    emitter.complete();
    let results = block_on(stream.collect_results()).expect("正常完成");
    assert_eq!(results, vec![FetchResult::data(json!(1))]);
}

#[test]
fn into_first_resolves_while_the_source_stays_open() {
    let (emitter, stream) = ResultStream::channel();
    assert!(emitter.next(FetchResult::data(json!("first"))));

    let first = stream
        .into_first()
        .now_or_never()
        .expect("首个结果已就绪时不应继续挂起")
        .expect("无流错误");

    assert_eq!(first, Some(FetchResult::data(json!("first"))));
    assert!(emitter.is_closed(), "单值适配返回后应取消订阅");
}

#[test]
fn rest_after_first_warns_about_additional_results() {
    let sink = RecordingSink::new();
    let _guard = diagnostics::scoped(sink.clone());

    let stream = ResultStream::of([
        FetchResult::data(json!(1)),
        FetchResult::data(json!(2)),
        FetchResult::data(json!(3)),
    ]);
    let (first, rest) = block_on(stream.into_first_and_rest()).expect("无流错误");

    assert_eq!(first, Some(FetchResult::data(json!(1))));
    assert!(sink.is_empty(), "剩余部分未被驱动前不应发出诊断");

    block_on(rest.drain());
    assert_eq!(
        sink.take(),
        vec![Diagnostic::MultipleResults, Diagnostic::MultipleResults]
    );
    assert_eq!(
        Diagnostic::MultipleResults.message(),
        "Promise Wrapper does not support multiple results from Observable"
    );
}

#[test]
fn rest_after_first_ends_quietly_on_error() {
    let sink = RecordingSink::new();
    let _guard = diagnostics::scoped(sink.clone());

    let (emitter, stream) = ResultStream::channel();
    emitter.next(FetchResult::data(json!(1)));
    emitter.error(LinkError::failed("late"));

    let (first, rest) = block_on(stream.into_first_and_rest()).expect("错误出现在首个结果之后");
    assert_eq!(first, Some(FetchResult::data(json!(1))));
    assert!(block_on(rest.collect::<Vec<_>>()).is_empty());
    assert!(sink.is_empty());
}

#[test]
fn into_first_surfaces_errors_before_any_result() {
    let err = block_on(ResultStream::from_error(LinkError::failed("down")).into_first())
        .expect_err("首个元素即错误");
    assert_eq!(err.code(), "link.stream.failed");
    assert_eq!(block_on(ResultStream::empty().into_first()).expect("空流"), None);
}

#[test]
fn from_future_resolves_to_a_single_result() {
    let resolved = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&resolved);
    let stream = ResultStream::from_future(async move {
        flag.store(true, Ordering::SeqCst);
        Ok(FetchResult::data(json!("late")))
    });
    assert!(!resolved.load(Ordering::SeqCst), "Future 在被轮询前不应执行");

    let results = block_on(stream.collect_results()).expect("无流错误");
    assert!(resolved.load(Ordering::SeqCst));
    assert_eq!(results, vec![FetchResult::data(json!("late"))]);
}

#[test]
fn inspect_observes_every_item() {
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let observer = Arc::clone(&seen);
    let stream = ResultStream::of([FetchResult::data(json!(1)), FetchResult::data(json!(2))])
        .inspect(move |item| observer.lock().push(item.is_ok()));
    let results = block_on(stream.collect_results()).expect("无流错误");
    assert_eq!(results.len(), 2);
    assert_eq!(*seen.lock(), [true, true]);
}
