use crossbeam_channel::Receiver;
use loopscope::config::HookOptions;
use loopscope::context::RequestContext;
use loopscope::diagnostics::{ChannelSink, FanoutSink, LongOperation};
use loopscope::domain::{Duration, RequestId, TaskId, TaskKind, Timestamp};
use loopscope::hook::{install_with_sink, HookHandle, LifecycleObserver};
use serde_json::{json, Value};
use std::rc::Rc;

const MS: u64 = 1_000_000;

fn installed(threshold_ms: u64) -> (HookHandle<Value>, Receiver<LongOperation>) {
    let (tx, rx) = crossbeam_channel::unbounded();
    let options = HookOptions {
        long_operation_threshold_ms: threshold_ms,
        ..HookOptions::default()
    };
    let hook = install_with_sink(options, ChannelSink::new(tx));
    hook.enable();
    (hook, rx)
}

fn at(ms: u64) -> Timestamp {
    Timestamp(ms * MS)
}

#[test]
fn test_child_timer_is_charged_to_its_request() {
    let (hook, _rx) = installed(100);
    let (r1, t2) = (TaskId(1), TaskId(2));

    hook.on_created(r1, TaskKind::RequestRoot, None, at(0));
    let c1 = hook.create_request_context(&r1, json!({"path": "/"}));
    c1.set_request_id(RequestId(1));

    hook.on_created(t2, TaskKind::Timer, Some(r1), at(0));
    assert!(Rc::ptr_eq(&hook.context_for(t2).unwrap(), &c1));

    hook.on_before(t2, at(5));
    hook.on_after(t2, at(17));

    assert_eq!(hook.owning_request_root(t2), Some(r1));
    assert_eq!(c1.total_cpu_time(), Duration::from_millis(12));
    assert_eq!(c1.cpu_time_for(t2), Duration::from_millis(12));
    assert_eq!(hook.request_cpu_time(r1), Duration::from_millis(12));

    hook.on_destroyed(t2, at(17));
    hook.on_destroyed(r1, at(17));
    assert!(hook.lookup(r1).is_none());
    assert!(hook.lookup(t2).is_none());
    assert!(hook.context_for(r1).is_none());
    assert!(hook.context_for(t2).is_none());
    assert_eq!(hook.live_entries().total(), 0);

    // The caller's reference outlives every binding
    assert_eq!(c1.request_id(), Some(RequestId(1)));
}

#[test]
fn test_rebind_charges_foreign_continuation_to_request() {
    let (hook, _rx) = installed(100);
    let (r1, other_root, q) = (TaskId(1), TaskId(10), TaskId(11));

    hook.on_created(r1, TaskKind::RequestRoot, None, at(0));
    let c1 = hook.create_request_context(&r1, json!({"request": 1}));

    // The queue runs the continuation from an unrelated request's task
    hook.on_created(other_root, TaskKind::RequestRoot, None, at(0));
    let other = hook.create_request_context(&other_root, json!({"request": 2}));
    hook.on_created(q, TaskKind::QueueTask, Some(other_root), at(1));
    assert!(Rc::ptr_eq(&hook.current_request_context(&q).unwrap(), &other));

    hook.on_before(q, at(2));
    assert!(hook.rebind_current_task(&q, &c1));
    assert!(Rc::ptr_eq(&hook.current_request_context(&q).unwrap(), &c1));
    assert!(!hook.rebind_current_task(&q, &c1));
    hook.on_after(q, at(9));

    assert_ne!(hook.owning_request_root(q), Some(r1));
    assert_eq!(c1.cpu_time_for(q), Duration::from_millis(7));
    assert_eq!(other.total_cpu_time(), Duration::ZERO);

    // Tasks created after the rebind inherit the new context
    let child = TaskId(12);
    hook.on_created(child, TaskKind::Timer, Some(q), at(9));
    assert!(Rc::ptr_eq(&hook.context_for(child).unwrap(), &c1));
}

#[test]
fn test_threshold_emits_only_for_runs_over_it() {
    let (hook, rx) = installed(100);
    let root = TaskId(1);
    hook.on_created(root, TaskKind::RequestRoot, None, at(0));
    let context = hook.create_request_context(&root, json!({}));
    context.set_request_id(RequestId(7));

    let slow = TaskId(2);
    hook.on_created(slow, TaskKind::Timer, Some(root), at(0));
    assert!(hook.add_tag(&slow, "serialize"));
    hook.on_before(slow, at(0));
    hook.on_after(slow, at(150));

    let fast = TaskId(3);
    hook.on_created(fast, TaskKind::Timer, Some(root), at(150));
    hook.on_before(fast, at(150));
    hook.on_after(fast, at(249));

    let ops: Vec<LongOperation> = rx.try_iter().collect();
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].task_id, 2);
    assert_eq!(ops[0].request_root_id, Some(1));
    assert_eq!(ops[0].request_id, Some(7));
    assert_eq!(ops[0].duration_ms, 150.0);
    assert_eq!(ops[0].tags, vec!["serialize".to_string()]);
    assert_eq!(
        ops[0].to_string(),
        "[150] Long synchronous operation (150.00ms)! \
         requestRootId: 1, taskId: 2, tags: [serialize]"
    );
}

#[test]
fn test_walk_through_destroyed_task_finds_no_root() {
    let (hook, _rx) = installed(100);
    hook.on_created(TaskId(1), TaskKind::RequestRoot, None, at(0));
    hook.on_created(TaskId(2), TaskKind::Timer, Some(TaskId(1)), at(0));
    hook.on_created(TaskId(3), TaskKind::Timer, Some(TaskId(2)), at(0));
    assert_eq!(hook.owning_request_root(TaskId(3)), Some(TaskId(1)));

    hook.on_destroyed(TaskId(2), at(1));
    assert_eq!(hook.owning_request_root(TaskId(3)), None);

    // Per-task time is still recorded without a root
    hook.on_before(TaskId(3), at(1));
    hook.on_after(TaskId(3), at(4));
    assert_eq!(hook.task_cpu_time(TaskId(3)), Duration::from_millis(3));
    assert_eq!(hook.request_cpu_time(TaskId(1)), Duration::ZERO);
}

#[test]
fn test_context_metadata_is_caller_defined() {
    #[derive(serde::Serialize)]
    struct Meta {
        user: &'static str,
    }

    let hook: HookHandle<Meta> = install_with_sink(HookOptions::default(), FanoutSink::new());
    hook.enable();
    hook.on_created(TaskId(1), TaskKind::RequestRoot, None, at(0));
    let context: Rc<RequestContext<Meta>> =
        hook.create_request_context(&TaskId(1), Meta { user: "ada" });
    assert_eq!(context.metadata().user, "ada");
    assert_eq!(context.report().metadata, json!({"user": "ada"}));
}

#[test]
fn test_disabled_hook_records_nothing() {
    let (hook, rx) = installed(1);
    hook.disable();
    hook.on_created(TaskId(1), TaskKind::RequestRoot, None, at(0));
    hook.on_before(TaskId(1), at(0));
    hook.on_after(TaskId(1), at(50));
    assert!(hook.lookup(TaskId(1)).is_none());
    assert_eq!(hook.task_cpu_time(TaskId(1)), Duration::ZERO);
    assert!(rx.is_empty());
}

#[test]
fn test_context_created_before_enable_leaves_nothing_behind() {
    let hook: HookHandle<Value> = install_with_sink(HookOptions::default(), FanoutSink::new());
    hook.on_created(TaskId(1), TaskKind::RequestRoot, None, at(0));
    let context = hook.create_request_context(&TaskId(1), json!({"early": true}));
    assert!(!hook.rebind_current_task(&TaskId(1), &context));
    hook.on_destroyed(TaskId(1), at(1));

    assert!(hook.context_for(TaskId(1)).is_none());
    assert_eq!(hook.live_entries().total(), 0);
    assert_eq!(context.root_task_id(), TaskId(1));
}
